/*!
 * In-Memory Cabinet
 * Volatile tree of reference-counted nodes, for tests and scratch storage
 */

mod dir_ops;
mod file_ops;
mod handle;
mod iter;
mod node;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::config::MemoryConfig;
use crate::traits::{Cabinet, Handle};
use crate::types::*;
use handle::MemHandle;
use node::{Content, Node, NodeRef};

/// State shared by a cabinet and every handle it yields
#[derive(Debug)]
pub(super) struct Shared {
    next_id: AtomicU64,
    open_handles: AtomicUsize,
    capacity: Option<u64>,
    used: AtomicU64,
    /// Serializes renames, the only operation holding two directory locks
    rename_lock: Mutex<()>,
}

impl Shared {
    fn new(capacity: Option<u64>) -> Self {
        Self {
            // id 1 is the root
            next_id: AtomicU64::new(2),
            open_handles: AtomicUsize::new(0),
            capacity,
            used: AtomicU64::new(0),
            rename_lock: Mutex::new(()),
        }
    }

    pub(super) fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(super) fn handle_opened(&self) {
        self.open_handles.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn handle_closed(&self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }

    /// Check if space is available and reserve it atomically
    pub(super) fn reserve(&self, additional: u64) -> FsResult<()> {
        let Some(max) = self.capacity else {
            self.used.fetch_add(additional, Ordering::SeqCst);
            return Ok(());
        };
        loop {
            let current = self.used.load(Ordering::SeqCst);
            let wanted = current.saturating_add(additional);
            if wanted > max {
                return Err(FsError::OutOfSpace { layer: Layer::MEMFS });
            }
            if self
                .used
                .compare_exchange(current, wanted, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    pub(super) fn release(&self, amount: u64) {
        // saturating: bytes of an orphaned file may be released twice
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                Some(used.saturating_sub(amount))
            });
    }
}

/// In-memory cabinet
///
/// Clones share the same tree. Supports every [`Kind`]; fifos, sockets and
/// devices are inert placeholders (devices are created as 0/0). Permission
/// bits are recorded but not enforced.
#[derive(Debug, Clone)]
pub struct MemCabinet {
    root: NodeRef,
    shared: Arc<Shared>,
}

impl MemCabinet {
    /// Create an empty, unbounded cabinet
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create with a limit on total file bytes
    pub fn with_capacity(max_bytes: u64) -> Self {
        Self::build(Some(max_bytes))
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::build(config.capacity)
    }

    fn build(capacity: Option<u64>) -> Self {
        debug!(capacity = ?capacity, "Creating in-memory cabinet");
        let root = Node::new(
            1,
            Kind::Directory,
            Mode::DIR_DEFAULT,
            Content::Directory(Default::default()),
        );
        Self {
            root: root.into_ref(),
            shared: Arc::new(Shared::new(capacity)),
        }
    }

    /// Number of handles currently open across the whole cabinet
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.shared.open_handles.load(Ordering::SeqCst)
    }

    /// Total bytes held by regular files
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.shared.used.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn capacity(&self) -> Option<u64> {
        self.shared.capacity
    }

    /// Walk to a directory by plain names; symlinks are not followed
    fn walk_dir(&self, names: &[Name]) -> FsResult<NodeRef> {
        let mut current = self.root.clone();
        for (depth, name) in names.iter().enumerate() {
            let next = {
                let guard = current.read();
                let children = guard.children().ok_or_else(|| FsError::NotADirectory {
                    layer: Layer::MEMFS,
                    path: FsPath::from_names(names[..depth].to_vec()).to_string(),
                })?;
                children.get(name).cloned().ok_or_else(|| FsError::NotFound {
                    layer: Layer::MEMFS,
                    path: FsPath::from_names(names[..=depth].to_vec()).to_string(),
                })?
            };
            current = next;
        }
        if current.read().kind() != Kind::Directory {
            return Err(FsError::NotADirectory {
                layer: Layer::MEMFS,
                path: FsPath::from_names(names.to_vec()).to_string(),
            });
        }
        Ok(current)
    }
}

impl Default for MemCabinet {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(message: &str) -> FsError {
    FsError::InvalidArgument {
        layer: Layer::MEMFS,
        message: message.to_string(),
    }
}

/// Refuse replacements posix rename(2) would refuse
fn check_replace(moving: &NodeRef, existing: Option<&NodeRef>, dest: &FsPath) -> FsResult<()> {
    let Some(existing) = existing else {
        return Ok(());
    };
    let moving_kind = moving.read().kind();
    let existing = existing.read();
    match (moving_kind, existing.kind()) {
        (Kind::Directory, Kind::Directory) => {
            if existing.children().is_some_and(|c| !c.is_empty()) {
                return Err(invalid("destination directory is not empty"));
            }
            Ok(())
        }
        (Kind::Directory, _) => Err(FsError::NotADirectory {
            layer: Layer::MEMFS,
            path: dest.to_string(),
        }),
        (kind, Kind::Directory) => Err(FsError::KindMismatch {
            layer: Layer::MEMFS,
            expected: kind,
            actual: Kind::Directory,
        }),
        _ => Ok(()),
    }
}

impl Cabinet for MemCabinet {
    fn layer(&self) -> Layer {
        Layer::MEMFS
    }

    fn open_root(&self) -> FsResult<Box<dyn Handle>> {
        Ok(Box::new(MemHandle::new(
            self.root.clone(),
            OpenMode::read_only(),
            self.shared.clone(),
        )))
    }

    fn rename(&self, old: &FsPath, dest: &FsPath) -> FsResult<()> {
        let (old_parent, old_name) = old
            .split_last()
            .ok_or_else(|| invalid("cannot rename the root"))?;
        let (dest_parent, dest_name) = dest
            .split_last()
            .ok_or_else(|| invalid("cannot replace the root"))?;
        if dest.len() > old.len() && dest.names().starts_with(old.names()) {
            return Err(invalid("cannot move a directory into itself"));
        }
        if old.len() > dest.len() && old.names().starts_with(dest.names()) {
            return Err(invalid("cannot replace an ancestor of the source"));
        }

        let _serial = self.shared.rename_lock.lock();
        let src_dir = self.walk_dir(old_parent)?;
        let dst_dir = self.walk_dir(dest_parent)?;
        let not_found = || FsError::NotFound {
            layer: Layer::MEMFS,
            path: old.to_string(),
        };

        let replaced = if Arc::ptr_eq(&src_dir, &dst_dir) {
            let mut dir = src_dir.write();
            let children = dir.children_mut().ok_or_else(not_found)?;
            let moving = children.get(old_name).cloned().ok_or_else(not_found)?;
            if old_name == dest_name {
                return Ok(());
            }
            check_replace(&moving, children.get(dest_name), dest)?;
            children.remove(old_name);
            let replaced = children.insert(dest_name.clone(), moving);
            dir.touch_modified();
            replaced
        } else {
            let mut src = src_dir.write();
            let mut dst = dst_dir.write();
            let src_children = src.children_mut().ok_or_else(not_found)?;
            let moving = src_children.get(old_name).cloned().ok_or_else(not_found)?;
            let dst_children = dst.children_mut().ok_or_else(not_found)?;
            check_replace(&moving, dst_children.get(dest_name), dest)?;
            src_children.remove(old_name);
            let replaced = dst_children.insert(dest_name.clone(), moving);
            src.touch_modified();
            dst.touch_modified();
            replaced
        };

        if let Some(replaced) = replaced {
            self.shared.release(replaced.read().stored_bytes());
        }
        debug!(from = %old, to = %dest, "Renamed entry");
        Ok(())
    }
}
