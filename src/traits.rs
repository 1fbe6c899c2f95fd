/*!
 * Cabinet Traits
 * Handle-based filesystem abstraction shared by every backend and wrapper
 */

use std::io::{Read, Seek, Write};

use crate::types::*;

/// Access to a swatch of a filesystem
///
/// A cabinet may be backed by a real posix filesystem, by memory, or by
/// anything else that fits these traits. It is a factory for handles, not a
/// held resource.
///
/// If the backing store can be reached some other way (the common case for
/// any host filesystem), nothing here can rule out conflicting mutations
/// between serial calls. That contract has to be enforced outside the crate.
pub trait Cabinet: Send + Sync {
    /// Layer tag used in this backend's errors
    fn layer(&self) -> Layer;

    /// Open the root directory
    fn open_root(&self) -> FsResult<Box<dyn Handle>>;

    /// Move an entry, both paths addressed from the root
    ///
    /// The final names are taken literally, never followed.
    fn rename(&self, old: &FsPath, dest: &FsPath) -> FsResult<()>;
}

/// An open capability to one entry
///
/// A handle exclusively owns its backend resource. Dropping an open handle
/// closes it.
pub trait Handle: Send {
    fn kind(&self) -> Kind;

    /// Fill `out` with this entry's metadata
    ///
    /// Implementations overwrite every field and refill `linkname` in place,
    /// so repeated calls into one buffer do not allocate once it is warm.
    fn read_metadata(&self, out: &mut Metadata) -> FsResult<()>;

    /// Allocating convenience over [`read_metadata`](Handle::read_metadata)
    fn metadata(&self) -> FsResult<Metadata> {
        let mut metadata = Metadata::default();
        self.read_metadata(&mut metadata)?;
        Ok(metadata)
    }

    /// Specialize to a file; `KindMismatch` unless the kind is RegularFile
    fn as_file(&mut self) -> FsResult<&mut dyn File>;

    /// Specialize to a directory; `KindMismatch` unless the kind is Directory
    fn as_dir(&mut self) -> FsResult<&mut dyn Directory>;

    /// Release the backend resource
    ///
    /// Idempotent. Every other operation on a closed handle fails with `Closed`.
    fn close(&mut self) -> FsResult<()>;

    fn is_closed(&self) -> bool;

    /// Extended attribute access
    fn xattrs(&mut self) -> FsResult<&mut dyn Xattrs>;
}

/// Directory view of a handle
pub trait Directory {
    /// Create a new entry of the given kind
    ///
    /// Symlinks are made with [`symlink`](Directory::symlink) instead.
    fn create(&mut self, name: &Name, kind: Kind, perms: Mode) -> FsResult<Box<dyn Handle>>;

    /// Create a symlink pointing at `target`
    fn symlink(&mut self, name: &Name, target: &str) -> FsResult<Box<dyn Handle>>;

    /// Open a child
    ///
    /// Never follows a final symlink: opening one yields a Symlink handle.
    fn open(&mut self, name: &Name, mode: OpenMode) -> FsResult<Box<dyn Handle>>;

    /// Iterate the entries, excluding `.` and `..`
    fn read(&mut self) -> FsResult<Box<dyn DirIter + '_>>;
}

/// Lending directory iterator
///
/// Entries are borrowed from storage inside the iterator, which is refilled
/// on every step. Once exhausted, both methods keep returning `None`.
pub trait DirIter {
    fn next_entry(&mut self) -> Option<FsResult<(&Name, &Metadata)>>;

    /// Name only, skipping the metadata read
    fn next_brief(&mut self) -> Option<FsResult<&Name>>;

    fn done(&self) -> bool;
}

/// File view of a handle
pub trait File: Read + Write + Seek + Send {
    /// Read at an absolute offset without moving the cursor
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> FsResult<usize>;

    fn set_len(&mut self, size: u64) -> FsResult<()>;

    /// Flush data and metadata to the backing store
    fn sync(&mut self) -> FsResult<()>;
}

/// Extended attributes
///
/// Kept apart from [`Metadata`] because most real filesystems need one call
/// per attribute.
pub trait Xattrs {
    fn supported(&self) -> bool;

    /// Attribute keys, unordered unless a backend documents otherwise
    fn enumerate(&self) -> FsResult<Vec<String>>;

    fn lookup(&self, key: &str) -> FsResult<Option<Vec<u8>>>;

    fn set(&mut self, key: &str, value: &[u8]) -> FsResult<()>;

    fn remove(&mut self, key: &str) -> FsResult<()>;
}

/// Xattr accessor for backends without attribute support
#[derive(Debug, Clone)]
pub struct Unsupported {
    layer: Layer,
}

impl Unsupported {
    pub fn new(layer: Layer) -> Self {
        Self { layer }
    }

    fn refuse(&self) -> FsError {
        FsError::NotSupported {
            layer: self.layer.clone(),
            message: "extended attributes".to_string(),
        }
    }
}

impl Xattrs for Unsupported {
    fn supported(&self) -> bool {
        false
    }

    fn enumerate(&self) -> FsResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn lookup(&self, _key: &str) -> FsResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set(&mut self, _key: &str, _value: &[u8]) -> FsResult<()> {
        Err(self.refuse())
    }

    fn remove(&mut self, _key: &str) -> FsResult<()> {
        Err(self.refuse())
    }
}

/// Walk plain names down from an open directory
///
/// Symlinks are never followed: a symlink in the middle of the path is a
/// non-directory like any other and fails with `NotADirectory`, and a final
/// symlink is returned as-is. Intermediate handles are closed as the walk
/// moves on.
pub fn lookup_path(dir: &mut dyn Handle, path: &[Name]) -> FsResult<Box<dyn Handle>> {
    let Some((first, rest)) = path.split_first() else {
        return Err(FsError::InvalidArgument {
            layer: Layer::PATH,
            message: "lookup_path needs at least one name".to_string(),
        });
    };

    let mut current = dir.as_dir()?.open(first, OpenMode::read_only())?;
    for (depth, name) in rest.iter().enumerate() {
        if current.kind() != Kind::Directory {
            return Err(FsError::NotADirectory {
                layer: Layer::PATH,
                path: FsPath::from_names(path[..=depth].to_vec()).to_string(),
            });
        }
        let next = current.as_dir()?.open(name, OpenMode::read_only())?;
        current.close()?;
        current = next;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_xattrs() {
        let mut xattrs = Unsupported::new(Layer::OSFS);
        assert!(!xattrs.supported());
        assert!(xattrs.enumerate().unwrap().is_empty());
        assert_eq!(xattrs.lookup("user.test").unwrap(), None);

        let err = xattrs.set("user.test", b"value").unwrap_err();
        assert!(matches!(err, FsError::NotSupported { .. }));
        assert_eq!(err.layer(), &Layer::OSFS);
        assert!(xattrs.remove("user.test").is_err());
    }
}
