/*!
 * Memory Nodes
 * Internal representation of entries in the in-memory tree
 */

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::types::{Kind, Metadata, Mode, Name};

pub(super) type NodeRef = Arc<RwLock<Node>>;

/// Per-kind payload
#[derive(Debug)]
pub(super) enum Content {
    File(Vec<u8>),
    Directory(BTreeMap<Name, NodeRef>),
    Symlink(String),
    /// Fifos, sockets and devices carry no data here
    Inert,
}

/// One entry of the tree
///
/// `meta.size` and `meta.linkname` are derived from `content` when read and
/// are not kept current on the node itself.
#[derive(Debug)]
pub(super) struct Node {
    pub meta: Metadata,
    pub content: Content,
    pub xattrs: BTreeMap<String, Vec<u8>>,
}

impl Node {
    pub fn new(id: u64, kind: Kind, perms: Mode, content: Content) -> Self {
        let now = SystemTime::now();
        Self {
            meta: Metadata {
                kind,
                id,
                perms,
                created: now,
                modified: now,
                accessed: now,
                ..Default::default()
            },
            content,
            xattrs: BTreeMap::new(),
        }
    }

    pub fn into_ref(self) -> NodeRef {
        Arc::new(RwLock::new(self))
    }

    #[inline]
    pub fn kind(&self) -> Kind {
        self.meta.kind
    }

    pub fn children(&self) -> Option<&BTreeMap<Name, NodeRef>> {
        match &self.content {
            Content::Directory(children) => Some(children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut BTreeMap<Name, NodeRef>> {
        match &mut self.content {
            Content::Directory(children) => Some(children),
            _ => None,
        }
    }

    /// Bytes held by this node and counted against the capacity
    pub fn stored_bytes(&self) -> u64 {
        match &self.content {
            Content::File(data) => data.len() as u64,
            _ => 0,
        }
    }

    /// Copy metadata into caller storage, deriving size and linkname
    pub fn fill(&self, out: &mut Metadata) {
        out.kind = self.meta.kind;
        out.id = self.meta.id;
        out.perms = self.meta.perms;
        out.uid = self.meta.uid;
        out.gid = self.meta.gid;
        out.devmajor = self.meta.devmajor;
        out.devminor = self.meta.devminor;
        out.created = self.meta.created;
        out.modified = self.meta.modified;
        out.accessed = self.meta.accessed;
        match &self.content {
            Content::File(data) => {
                out.size = data.len() as u64;
                out.linkname.clear();
            }
            Content::Symlink(target) => {
                out.size = target.len() as u64;
                out.set_linkname(target);
            }
            Content::Directory(children) => {
                out.size = children.len() as u64;
                out.linkname.clear();
            }
            Content::Inert => {
                out.size = 0;
                out.linkname.clear();
            }
        }
    }

    #[inline]
    pub fn touch_modified(&mut self) {
        self.meta.modified = SystemTime::now();
    }

    #[inline]
    pub fn touch_accessed(&mut self) {
        self.meta.accessed = SystemTime::now();
    }
}
