/*!
 * Host Cabinet
 * Passthrough to a directory of the host filesystem
 */

#[cfg(target_os = "linux")]
mod xattr;

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{DirBuilderExt, FileExt, FileTypeExt, MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

use crate::config::LocalConfig;
#[cfg(not(target_os = "linux"))]
use crate::traits::Unsupported;
use crate::traits::{Cabinet, DirIter, Directory, File, Handle, Xattrs};
use crate::types::*;

/// Host filesystem cabinet
///
/// Every handle keeps the host path it was opened at. The host kernel follows
/// symlinks in intermediate components of those paths; wrap this cabinet in a
/// [`Sandbox`](crate::sandbox::Sandbox) to confine traversal.
#[derive(Debug, Clone)]
pub struct LocalCabinet {
    root: PathBuf,
    readonly: bool,
}

impl LocalCabinet {
    /// Create a cabinet rooted at an existing host directory
    pub fn new(root: impl AsRef<Path>) -> FsResult<Self> {
        Self::build(root.as_ref(), false)
    }

    /// Create a cabinet that refuses every mutation with `ReadOnly`
    pub fn readonly(root: impl AsRef<Path>) -> FsResult<Self> {
        Self::build(root.as_ref(), true)
    }

    pub fn from_config(root: impl AsRef<Path>, config: &LocalConfig) -> FsResult<Self> {
        Self::build(root.as_ref(), config.readonly)
    }

    fn build(root: &Path, readonly: bool) -> FsResult<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| io_error(e, format!("canonicalize {}", root.display())))?;
        let meta = fs::metadata(&root).map_err(|e| io_error(e, root.display().to_string()))?;
        if !meta.is_dir() {
            return Err(FsError::NotADirectory {
                layer: Layer::OSFS,
                path: root.display().to_string(),
            });
        }
        info!(root = %root.display(), readonly, "Opened host cabinet");
        Ok(Self { root, readonly })
    }

    /// Canonical host directory backing the cabinet root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Host path for a cabinet path
    #[must_use]
    pub fn host_path(&self, path: &FsPath) -> PathBuf {
        let mut host = self.root.clone();
        for name in path.names() {
            host.push(name.as_str());
        }
        host
    }
}

/// Convert std::io::Error to FsError
fn io_error(e: io::Error, context: impl Into<String>) -> FsError {
    FsError::from_io(Layer::OSFS, e, context)
}

fn kind_of(file_type: fs::FileType) -> Kind {
    if file_type.is_dir() {
        Kind::Directory
    } else if file_type.is_symlink() {
        Kind::Symlink
    } else if file_type.is_fifo() {
        Kind::Fifo
    } else if file_type.is_socket() {
        Kind::Socket
    } else if file_type.is_block_device() {
        Kind::BlockDevice
    } else if file_type.is_char_device() {
        Kind::CharDevice
    } else {
        Kind::RegularFile
    }
}

#[cfg(target_os = "linux")]
fn split_rdev(rdev: u64) -> (u64, u64) {
    (nix::sys::stat::major(rdev), nix::sys::stat::minor(rdev))
}

/// Device numbers are only decoded on Linux
#[cfg(not(target_os = "linux"))]
fn split_rdev(_rdev: u64) -> (u64, u64) {
    (0, 0)
}

/// Fill `out` from an lstat/fstat result, reading the link target for symlinks
fn fill_metadata(out: &mut Metadata, meta: &fs::Metadata, path: &Path) -> FsResult<()> {
    let kind = kind_of(meta.file_type());
    out.kind = kind;
    out.id = meta.ino();
    out.perms = Mode::from_bits(meta.mode());
    out.uid = meta.uid();
    out.gid = meta.gid();
    out.size = meta.len();
    (out.devmajor, out.devminor) = if kind.is_device() {
        split_rdev(meta.rdev())
    } else {
        (0, 0)
    };
    // not every host records a birth time
    out.created = meta.created().unwrap_or(SystemTime::UNIX_EPOCH);
    out.modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    out.accessed = meta.accessed().unwrap_or(SystemTime::UNIX_EPOCH);

    if kind == Kind::Symlink {
        let target = fs::read_link(path)
            .map_err(|e| io_error(e, format!("readlink {}", path.display())))?;
        let Some(text) = target.to_str() else {
            return Err(FsError::InvalidName {
                layer: Layer::OSFS,
                name: target.to_string_lossy().into_owned(),
                reason: "symlink target is not valid UTF-8".to_string(),
            });
        };
        out.set_linkname(text);
    } else {
        out.linkname.clear();
    }
    Ok(())
}

impl Cabinet for LocalCabinet {
    fn layer(&self) -> Layer {
        Layer::OSFS
    }

    fn open_root(&self) -> FsResult<Box<dyn Handle>> {
        Ok(Box::new(LocalHandle::new(
            self.root.clone(),
            Kind::Directory,
            None,
            self.readonly,
        )))
    }

    fn rename(&self, old: &FsPath, dest: &FsPath) -> FsResult<()> {
        if self.readonly {
            return Err(FsError::ReadOnly { layer: Layer::OSFS });
        }
        if old.is_root() || dest.is_root() {
            return Err(FsError::InvalidArgument {
                layer: Layer::OSFS,
                message: "cannot rename the root".to_string(),
            });
        }
        let from = self.host_path(old);
        let to = self.host_path(dest);
        fs::rename(&from, &to).map_err(|e| {
            io_error(e, format!("rename {} -> {}", from.display(), to.display()))
        })?;
        debug!(from = %old, to = %dest, "Renamed host entry");
        Ok(())
    }
}

/// Handle to one host entry
///
/// Regular files hold an open descriptor; every other kind is reached
/// through its path on demand.
pub struct LocalHandle {
    path: PathBuf,
    kind: Kind,
    file: Option<fs::File>,
    closed: bool,
    readonly: bool,
    #[cfg(not(target_os = "linux"))]
    unsupported: Unsupported,
}

impl LocalHandle {
    fn new(path: PathBuf, kind: Kind, file: Option<fs::File>, readonly: bool) -> Self {
        Self {
            path,
            kind,
            file,
            closed: false,
            readonly,
            #[cfg(not(target_os = "linux"))]
            unsupported: Unsupported::new(Layer::OSFS),
        }
    }

    /// Host path this handle was opened at
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    fn check_open(&self) -> FsResult<()> {
        if self.closed {
            return Err(FsError::Closed { layer: Layer::OSFS });
        }
        Ok(())
    }

    fn check_write(&self) -> FsResult<()> {
        self.check_open()?;
        if self.readonly {
            return Err(FsError::ReadOnly { layer: Layer::OSFS });
        }
        Ok(())
    }

    fn expect_kind(&self, expected: Kind) -> FsResult<()> {
        self.check_open()?;
        if self.kind != expected {
            return Err(FsError::KindMismatch {
                layer: Layer::OSFS,
                expected,
                actual: self.kind,
            });
        }
        Ok(())
    }

    fn descriptor(&mut self) -> FsResult<&mut fs::File> {
        self.check_open()?;
        self.file.as_mut().ok_or(FsError::Closed { layer: Layer::OSFS })
    }

    fn child(&self, name: &Name) -> PathBuf {
        self.path.join(name.as_str())
    }

    fn handle(&self, path: PathBuf, kind: Kind, file: Option<fs::File>) -> Box<dyn Handle> {
        Box::new(LocalHandle::new(path, kind, file, self.readonly))
    }
}

/// Open a regular file without following a final symlink
fn open_file(path: &Path, mode: OpenMode, perms: Mode) -> io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    // the kernel needs some access mode
    let read = mode.read || !mode.is_writable();
    options
        .read(read)
        .write(mode.write)
        .append(mode.append)
        .truncate(mode.truncate)
        .create(mode.create)
        .create_new(mode.create_new)
        .mode(u32::from(perms.raw()))
        .custom_flags(libc::O_NOFOLLOW);
    options.open(path)
}

impl Handle for LocalHandle {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn read_metadata(&self, out: &mut Metadata) -> FsResult<()> {
        self.check_open()?;
        let meta = match &self.file {
            Some(file) => file.metadata(),
            None => fs::symlink_metadata(&self.path),
        }
        .map_err(|e| io_error(e, format!("stat {}", self.path.display())))?;
        fill_metadata(out, &meta, &self.path)
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
        self.closed = true;
        // dropping the descriptor closes it
        self.file = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    #[cfg(target_os = "linux")]
    fn xattrs(&mut self) -> FsResult<&mut dyn Xattrs> {
        self.check_open()?;
        Ok(self)
    }

    #[cfg(not(target_os = "linux"))]
    fn xattrs(&mut self) -> FsResult<&mut dyn Xattrs> {
        self.check_open()?;
        Ok(&mut self.unsupported)
    }
}

impl Directory for LocalHandle {
    fn create(&mut self, name: &Name, kind: Kind, perms: Mode) -> FsResult<Box<dyn Handle>> {
        self.check_write()?;
        let path = self.child(name);
        let context = || format!("create {}", path.display());
        match kind {
            Kind::RegularFile => {
                let mode = OpenMode {
                    read: true,
                    ..OpenMode::create_new()
                };
                let file = open_file(&path, mode, perms).map_err(|e| io_error(e, context()))?;
                Ok(self.handle(path, kind, Some(file)))
            }
            Kind::Directory => {
                fs::DirBuilder::new()
                    .mode(u32::from(perms.raw()))
                    .create(&path)
                    .map_err(|e| io_error(e, context()))?;
                Ok(self.handle(path, kind, None))
            }
            Kind::Fifo => {
                let mode = nix::sys::stat::Mode::from_bits_truncate(perms.raw().into());
                nix::unistd::mkfifo(&path, mode)
                    .map_err(|errno| io_error(io::Error::from(errno), context()))?;
                Ok(self.handle(path, kind, None))
            }
            Kind::Symlink => Err(FsError::InvalidArgument {
                layer: Layer::OSFS,
                message: "symlinks are created with Directory::symlink".to_string(),
            }),
            Kind::Socket | Kind::BlockDevice | Kind::CharDevice => Err(FsError::NotSupported {
                layer: Layer::OSFS,
                message: format!("creating a {}", kind.describe()),
            }),
        }
    }

    fn symlink(&mut self, name: &Name, target: &str) -> FsResult<Box<dyn Handle>> {
        self.check_write()?;
        if target.is_empty() || target.contains('\0') {
            return Err(FsError::InvalidArgument {
                layer: Layer::OSFS,
                message: format!("invalid symlink target {:?}", target),
            });
        }
        let path = self.child(name);
        std::os::unix::fs::symlink(target, &path)
            .map_err(|e| io_error(e, format!("symlink {}", path.display())))?;
        Ok(self.handle(path, Kind::Symlink, None))
    }

    fn open(&mut self, name: &Name, mode: OpenMode) -> FsResult<Box<dyn Handle>> {
        self.check_open()?;
        mode.validate()?;
        if self.readonly && (mode.is_writable() || mode.will_create()) {
            return Err(FsError::ReadOnly { layer: Layer::OSFS });
        }

        let path = self.child(name);
        let context = || path.display().to_string();
        match fs::symlink_metadata(&path) {
            Ok(_) if mode.create_new => Err(FsError::AlreadyExists {
                layer: Layer::OSFS,
                path: context(),
            }),
            Ok(meta) => {
                let kind = kind_of(meta.file_type());
                let file = if kind == Kind::RegularFile {
                    let existing = OpenMode {
                        create: false,
                        ..mode
                    };
                    let file = open_file(&path, existing, Mode::FILE_DEFAULT)
                        .map_err(|e| io_error(e, context()))?;
                    Some(file)
                } else {
                    None
                };
                Ok(self.handle(path, kind, file))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && mode.will_create() => {
                let file = open_file(&path, mode, Mode::FILE_DEFAULT)
                    .map_err(|e| io_error(e, context()))?;
                Ok(self.handle(path, Kind::RegularFile, Some(file)))
            }
            Err(e) => Err(io_error(e, context())),
        }
    }

    fn read(&mut self) -> FsResult<Box<dyn DirIter + '_>> {
        self.check_open()?;
        let inner = fs::read_dir(&self.path)
            .map_err(|e| io_error(e, format!("read_dir {}", self.path.display())))?;
        Ok(Box::new(LocalDirIter {
            inner,
            name: Name::placeholder(),
            meta: Metadata::default(),
            done: false,
        }))
    }
}

impl Read for LocalHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.descriptor().map_err(FsError::into_io)?.read(buf)
    }
}

impl Write for LocalHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.readonly {
            return Err(FsError::ReadOnly { layer: Layer::OSFS }.into_io());
        }
        self.descriptor().map_err(FsError::into_io)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.descriptor().map_err(FsError::into_io)?.flush()
    }
}

impl Seek for LocalHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.descriptor().map_err(FsError::into_io)?.seek(pos)
    }
}

impl File for LocalHandle {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        let path = self.path.display().to_string();
        self.descriptor()?
            .read_at(buf, offset)
            .map_err(|e| io_error(e, format!("pread {}", path)))
    }

    fn set_len(&mut self, size: u64) -> FsResult<()> {
        self.check_write()?;
        let path = self.path.display().to_string();
        self.descriptor()?
            .set_len(size)
            .map_err(|e| io_error(e, format!("truncate {}", path)))
    }

    fn sync(&mut self) -> FsResult<()> {
        let path = self.path.display().to_string();
        self.descriptor()?
            .sync_all()
            .map_err(|e| io_error(e, format!("fsync {}", path)))
    }
}

#[cfg(target_os = "linux")]
impl Xattrs for LocalHandle {
    fn supported(&self) -> bool {
        !self.closed && xattr::supported(&self.path)
    }

    fn enumerate(&self) -> FsResult<Vec<String>> {
        self.check_open()?;
        xattr::list(&self.path)
    }

    fn lookup(&self, key: &str) -> FsResult<Option<Vec<u8>>> {
        self.check_open()?;
        xattr::get(&self.path, key)
    }

    fn set(&mut self, key: &str, value: &[u8]) -> FsResult<()> {
        self.check_write()?;
        xattr::set(&self.path, key, value)
    }

    fn remove(&mut self, key: &str) -> FsResult<()> {
        self.check_write()?;
        xattr::remove(&self.path, key)
    }
}

/// Streams `read_dir`, refilling one name and one metadata record
struct LocalDirIter {
    inner: fs::ReadDir,
    name: Name,
    meta: Metadata,
    done: bool,
}

impl LocalDirIter {
    fn advance(&mut self) -> Option<FsResult<fs::DirEntry>> {
        if self.done {
            return None;
        }
        let entry = match self.inner.next() {
            None => {
                self.done = true;
                return None;
            }
            Some(Err(e)) => return Some(Err(io_error(e, "read_dir entry"))),
            Some(Ok(entry)) => entry,
        };
        let file_name = entry.file_name();
        let Some(text) = file_name.to_str() else {
            return Some(Err(FsError::InvalidName {
                layer: Layer::OSFS,
                name: file_name.to_string_lossy().into_owned(),
                reason: "name is not valid UTF-8".to_string(),
            }));
        };
        if let Err(e) = self.name.set(text) {
            return Some(Err(e));
        }
        Some(Ok(entry))
    }
}

impl DirIter for LocalDirIter {
    fn next_entry(&mut self) -> Option<FsResult<(&Name, &Metadata)>> {
        let entry = match self.advance()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e)),
        };
        let path = entry.path();
        let filled = fs::symlink_metadata(&path)
            .map_err(|e| io_error(e, format!("stat {}", path.display())))
            .and_then(|meta| fill_metadata(&mut self.meta, &meta, &path));
        match filled {
            Ok(()) => Some(Ok((&self.name, &self.meta))),
            Err(e) => Some(Err(e)),
        }
    }

    fn next_brief(&mut self) -> Option<FsResult<&Name>> {
        match self.advance()? {
            Ok(_) => Some(Ok(&self.name)),
            Err(e) => Some(Err(e)),
        }
    }

    fn done(&self) -> bool {
        self.done
    }
}
