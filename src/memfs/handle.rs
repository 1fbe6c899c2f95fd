/*!
 * Memory Handles
 * Open capability to one node, counted against the cabinet while open
 */

use std::sync::Arc;

use super::node::NodeRef;
use super::Shared;
use crate::traits::{Directory, File, Handle, Xattrs};
use crate::types::*;

/// Handle to one in-memory node
///
/// Caches only the node reference; the handle keeps working after its entry
/// is renamed.
pub(super) struct MemHandle {
    node: Option<NodeRef>,
    kind: Kind,
    pub(super) mode: OpenMode,
    pub(super) pos: u64,
    pub(super) shared: Arc<Shared>,
}

impl MemHandle {
    pub fn new(node: NodeRef, mode: OpenMode, shared: Arc<Shared>) -> Self {
        let kind = node.read().kind();
        shared.handle_opened();
        Self {
            node: Some(node),
            kind,
            mode,
            pos: 0,
            shared,
        }
    }

    /// The node, or `Closed`
    #[inline]
    pub(super) fn node(&self) -> FsResult<&NodeRef> {
        self.node
            .as_ref()
            .ok_or(FsError::Closed { layer: Layer::MEMFS })
    }

    fn expect_kind(&self, expected: Kind) -> FsResult<()> {
        self.node()?;
        if self.kind != expected {
            return Err(FsError::KindMismatch {
                layer: Layer::MEMFS,
                expected,
                actual: self.kind,
            });
        }
        Ok(())
    }
}

impl Handle for MemHandle {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn read_metadata(&self, out: &mut Metadata) -> FsResult<()> {
        self.node()?.read().fill(out);
        Ok(())
    }

    fn as_file(&mut self) -> FsResult<&mut dyn File> {
        self.expect_kind(Kind::RegularFile)?;
        Ok(self)
    }

    fn as_dir(&mut self) -> FsResult<&mut dyn Directory> {
        self.expect_kind(Kind::Directory)?;
        Ok(self)
    }

    fn close(&mut self) -> FsResult<()> {
        if self.node.take().is_some() {
            self.shared.handle_closed();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.node.is_none()
    }

    fn xattrs(&mut self) -> FsResult<&mut dyn Xattrs> {
        self.node()?;
        Ok(self)
    }
}

impl Drop for MemHandle {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Keys come back sorted
impl Xattrs for MemHandle {
    fn supported(&self) -> bool {
        true
    }

    fn enumerate(&self) -> FsResult<Vec<String>> {
        Ok(self.node()?.read().xattrs.keys().cloned().collect())
    }

    fn lookup(&self, key: &str) -> FsResult<Option<Vec<u8>>> {
        Ok(self.node()?.read().xattrs.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> FsResult<()> {
        if key.is_empty() {
            return Err(FsError::InvalidArgument {
                layer: Layer::MEMFS,
                message: "xattr key cannot be empty".to_string(),
            });
        }
        self.node()?
            .write()
            .xattrs
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> FsResult<()> {
        match self.node()?.write().xattrs.remove(key) {
            Some(_) => Ok(()),
            None => Err(FsError::NotFound {
                layer: Layer::MEMFS,
                path: key.to_string(),
            }),
        }
    }
}
