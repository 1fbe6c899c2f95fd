/*!
 * Host Extended Attributes
 * l*xattr calls, never following a final symlink
 */

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

use crate::limits::XATTR_LIST_BUFFER;
use crate::types::{FsError, FsResult, Layer};

fn c_string(bytes: &[u8], what: &str) -> FsResult<CString> {
    CString::new(bytes).map_err(|_| FsError::InvalidArgument {
        layer: Layer::OSFS,
        message: format!("{} contains a null byte", what),
    })
}

/// The host filesystem has no extended attributes
fn is_unsupported(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(code) if code == libc::ENOTSUP || code == libc::EOPNOTSUPP)
}

/// Map a failed l*xattr call; ENOTSUP becomes NotSupported
fn host_error(err: io::Error, context: &str, path: &Path) -> FsError {
    if is_unsupported(&err) {
        return FsError::NotSupported {
            layer: Layer::OSFS,
            message: format!("extended attributes on {}", path.display()),
        };
    }
    FsError::from_io(Layer::OSFS, err, format!("{} {}", context, path.display()))
}

fn last_error(context: &str, path: &Path) -> FsError {
    host_error(io::Error::last_os_error(), context, path)
}

/// False when the host filesystem answers ENOTSUP
pub(super) fn supported(path: &Path) -> bool {
    let Ok(c_path) = c_string(path.as_os_str().as_bytes(), "path") else {
        return false;
    };
    // SAFETY: c_path is NUL-terminated; a null buffer of size 0 only queries the length
    let n = unsafe { libc::llistxattr(c_path.as_ptr(), ptr::null_mut(), 0) };
    n >= 0 || !is_unsupported(&io::Error::last_os_error())
}

/// Keys in the order the kernel reports them; empty without host support
pub(super) fn list(path: &Path) -> FsResult<Vec<String>> {
    match list_keys(path) {
        Err(FsError::NotSupported { .. }) => Ok(Vec::new()),
        other => other,
    }
}

fn list_keys(path: &Path) -> FsResult<Vec<String>> {
    let c_path = c_string(path.as_os_str().as_bytes(), "path")?;
    let mut buf = vec![0u8; XATTR_LIST_BUFFER];
    loop {
        // SAFETY: buf is valid for writes of buf.len() bytes
        let n = unsafe { libc::llistxattr(c_path.as_ptr(), buf.as_mut_ptr().cast(), buf.len()) };
        if n >= 0 {
            buf.truncate(n as usize);
            break;
        }
        if io::Error::last_os_error().raw_os_error() != Some(libc::ERANGE) {
            return Err(last_error("llistxattr", path));
        }
        // SAFETY: size query only
        let needed = unsafe { libc::llistxattr(c_path.as_ptr(), ptr::null_mut(), 0) };
        if needed < 0 {
            return Err(last_error("llistxattr", path));
        }
        buf.resize(needed as usize, 0);
    }

    Ok(buf
        .split(|b| *b == 0)
        .filter(|key| !key.is_empty())
        .map(|key| String::from_utf8_lossy(key).into_owned())
        .collect())
}

/// `None` when the key is absent or the host has no attribute support
pub(super) fn get(path: &Path, key: &str) -> FsResult<Option<Vec<u8>>> {
    match get_value(path, key) {
        Err(FsError::NotSupported { .. }) => Ok(None),
        other => other,
    }
}

fn get_value(path: &Path, key: &str) -> FsResult<Option<Vec<u8>>> {
    let c_path = c_string(path.as_os_str().as_bytes(), "path")?;
    let c_key = c_string(key.as_bytes(), "xattr key")?;
    loop {
        // SAFETY: size query only
        let size = unsafe { libc::lgetxattr(c_path.as_ptr(), c_key.as_ptr(), ptr::null_mut(), 0) };
        if size < 0 {
            if io::Error::last_os_error().raw_os_error() == Some(libc::ENODATA) {
                return Ok(None);
            }
            return Err(last_error("lgetxattr", path));
        }

        let mut value = vec![0u8; size as usize];
        // SAFETY: value is valid for writes of value.len() bytes
        let n = unsafe {
            libc::lgetxattr(
                c_path.as_ptr(),
                c_key.as_ptr(),
                value.as_mut_ptr().cast(),
                value.len(),
            )
        };
        if n >= 0 {
            value.truncate(n as usize);
            return Ok(Some(value));
        }
        match io::Error::last_os_error().raw_os_error() {
            // value grew between the two calls
            Some(libc::ERANGE) => continue,
            Some(libc::ENODATA) => return Ok(None),
            _ => return Err(last_error("lgetxattr", path)),
        }
    }
}

pub(super) fn set(path: &Path, key: &str, value: &[u8]) -> FsResult<()> {
    let c_path = c_string(path.as_os_str().as_bytes(), "path")?;
    let c_key = c_string(key.as_bytes(), "xattr key")?;
    // SAFETY: value is valid for reads of value.len() bytes
    let rc = unsafe {
        libc::lsetxattr(
            c_path.as_ptr(),
            c_key.as_ptr(),
            value.as_ptr().cast(),
            value.len(),
            0,
        )
    };
    if rc < 0 {
        return Err(last_error("lsetxattr", path));
    }
    Ok(())
}

pub(super) fn remove(path: &Path, key: &str) -> FsResult<()> {
    let c_path = c_string(path.as_os_str().as_bytes(), "path")?;
    let c_key = c_string(key.as_bytes(), "xattr key")?;
    // SAFETY: both strings are NUL-terminated
    let rc = unsafe { libc::lremovexattr(c_path.as_ptr(), c_key.as_ptr()) };
    if rc < 0 {
        if io::Error::last_os_error().raw_os_error() == Some(libc::ENODATA) {
            return Err(FsError::NotFound {
                layer: Layer::OSFS,
                path: format!("{}: {}", path.display(), key),
            });
        }
        return Err(last_error("lremovexattr", path));
    }
    Ok(())
}
