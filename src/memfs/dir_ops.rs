/*!
 * Directory Operations
 * Create, open and list children of an in-memory directory
 */

use super::handle::MemHandle;
use super::iter::MemDirIter;
use super::node::{Content, Node};
use crate::traits::{DirIter, Directory, Handle};
use crate::types::*;

fn not_a_directory(name: &str) -> FsError {
    FsError::NotADirectory {
        layer: Layer::MEMFS,
        path: name.to_string(),
    }
}

impl MemHandle {
    /// Insert a fresh node under this directory
    fn insert(&mut self, name: &Name, kind: Kind, perms: Mode, content: Content) -> FsResult<Box<dyn Handle>> {
        let dir = self.node()?.clone();
        let child = {
            let mut guard = dir.write();
            let children = guard.children_mut().ok_or_else(|| not_a_directory(name.as_str()))?;
            if children.contains_key(name) {
                return Err(FsError::AlreadyExists {
                    layer: Layer::MEMFS,
                    path: name.to_string(),
                });
            }
            let child = Node::new(self.shared.alloc_id(), kind, perms, content).into_ref();
            children.insert(name.clone(), child.clone());
            guard.touch_modified();
            child
        };

        let mode = if kind == Kind::RegularFile {
            OpenMode::read_write()
        } else {
            OpenMode::read_only()
        };
        Ok(Box::new(MemHandle::new(child, mode, self.shared.clone())))
    }
}

impl Directory for MemHandle {
    fn create(&mut self, name: &Name, kind: Kind, perms: Mode) -> FsResult<Box<dyn Handle>> {
        let content = match kind {
            Kind::RegularFile => Content::File(Vec::new()),
            Kind::Directory => Content::Directory(Default::default()),
            Kind::Symlink => {
                return Err(FsError::InvalidArgument {
                    layer: Layer::MEMFS,
                    message: "symlinks are created with Directory::symlink".to_string(),
                })
            }
            Kind::Fifo | Kind::Socket | Kind::BlockDevice | Kind::CharDevice => Content::Inert,
        };
        self.insert(name, kind, perms, content)
    }

    fn symlink(&mut self, name: &Name, target: &str) -> FsResult<Box<dyn Handle>> {
        if target.is_empty() || target.contains('\0') {
            return Err(FsError::InvalidArgument {
                layer: Layer::MEMFS,
                message: format!("invalid symlink target {:?}", target),
            });
        }
        self.insert(
            name,
            Kind::Symlink,
            Mode::from_bits(0o777),
            Content::Symlink(target.to_string()),
        )
    }

    fn open(&mut self, name: &Name, mode: OpenMode) -> FsResult<Box<dyn Handle>> {
        mode.validate()?;
        let dir = self.node()?.clone();

        let child = if mode.will_create() {
            let mut guard = dir.write();
            let children = guard.children_mut().ok_or_else(|| not_a_directory(name.as_str()))?;
            match children.get(name) {
                Some(_) if mode.create_new => {
                    return Err(FsError::AlreadyExists {
                        layer: Layer::MEMFS,
                        path: name.to_string(),
                    })
                }
                Some(existing) => existing.clone(),
                None => {
                    let child = Node::new(
                        self.shared.alloc_id(),
                        Kind::RegularFile,
                        Mode::FILE_DEFAULT,
                        Content::File(Vec::new()),
                    )
                    .into_ref();
                    children.insert(name.clone(), child.clone());
                    guard.touch_modified();
                    child
                }
            }
        } else {
            let guard = dir.read();
            let children = guard.children().ok_or_else(|| not_a_directory(name.as_str()))?;
            children.get(name).cloned().ok_or_else(|| FsError::NotFound {
                layer: Layer::MEMFS,
                path: name.to_string(),
            })?
        };

        if mode.truncate {
            let mut node = child.write();
            if let Content::File(data) = &mut node.content {
                let freed = data.len() as u64;
                data.clear();
                self.shared.release(freed);
                node.touch_modified();
            }
        }

        Ok(Box::new(MemHandle::new(child, mode, self.shared.clone())))
    }

    fn read(&mut self) -> FsResult<Box<dyn DirIter + '_>> {
        let dir = self.node()?;
        let guard = dir.read();
        let children = guard.children().ok_or_else(|| not_a_directory("."))?;
        let snapshot = children
            .iter()
            .map(|(name, node)| (name.clone(), node.clone()))
            .collect();
        Ok(Box::new(MemDirIter::new(snapshot)))
    }
}
