/*!
 * Directory Iterator
 * Snapshot iteration with metadata refilled into embedded storage
 */

use super::node::NodeRef;
use crate::traits::DirIter;
use crate::types::*;

/// Iterates the children present when `read()` was called
pub(super) struct MemDirIter {
    entries: std::vec::IntoIter<(Name, NodeRef)>,
    name: Name,
    meta: Metadata,
    done: bool,
}

impl MemDirIter {
    pub fn new(entries: Vec<(Name, NodeRef)>) -> Self {
        Self {
            entries: entries.into_iter(),
            name: Name::placeholder(),
            meta: Metadata::default(),
            done: false,
        }
    }

    fn advance(&mut self) -> Option<NodeRef> {
        if self.done {
            return None;
        }
        match self.entries.next() {
            Some((name, node)) => {
                self.name = name;
                Some(node)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl DirIter for MemDirIter {
    fn next_entry(&mut self) -> Option<FsResult<(&Name, &Metadata)>> {
        let node = self.advance()?;
        node.read().fill(&mut self.meta);
        Some(Ok((&self.name, &self.meta)))
    }

    fn next_brief(&mut self) -> Option<FsResult<&Name>> {
        self.advance()?;
        Some(Ok(&self.name))
    }

    fn done(&self) -> bool {
        self.done
    }
}
