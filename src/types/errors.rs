/*!
 * Cabinet Error Types
 * Structured errors tagged with the layer that reported them
 */

use super::kind::Kind;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::io;
use thiserror::Error;

/// Cabinet operation result
///
/// # Must Use
/// Filesystem operations can fail and must be handled to prevent data loss
#[must_use = "filesystem operations can fail and must be handled"]
pub type FsResult<T> = Result<T, FsError>;

/// Identity of the layer that produced an error
///
/// Renders as the `<layer>` in `"<layer> reports: ..."`, so a caller can tell
/// "osfs reports: not found" from "sandbox reports: breakout" even through
/// several wrappers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Layer(Cow<'static, str>);

impl Layer {
    pub const MEMFS: Layer = Layer(Cow::Borrowed("memfs"));
    pub const OSFS: Layer = Layer(Cow::Borrowed("osfs"));
    pub const SANDBOX: Layer = Layer(Cow::Borrowed("sandbox"));
    /// Name and path parsing, before any backend is involved
    pub const PATH: Layer = Layer(Cow::Borrowed("path"));
    pub const CONFIG: Layer = Layer(Cow::Borrowed("config"));

    /// Layer for a custom backend
    pub fn custom(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw platform error number
///
/// Displays as `ENOENT/2`, or `UNKNOWN/<n>` when the number has no known name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OsCode(pub i32);

impl OsCode {
    /// Symbolic name of the code, if the platform knows one
    #[must_use]
    pub fn symbol(&self) -> Option<String> {
        match nix::errno::Errno::from_raw(self.0) {
            nix::errno::Errno::UnknownErrno => None,
            errno => Some(format!("{:?}", errno)),
        }
    }
}

impl fmt::Display for OsCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.symbol() {
            Some(symbol) => write!(f, "{}/{}", symbol, self.0),
            None => write!(f, "UNKNOWN/{}", self.0),
        }
    }
}

/// Cabinet errors
///
/// Every variant names the layer that reported it. Delegate errors travel
/// through wrappers unchanged; only a wrapper's own checks produce its tag.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum FsError {
    #[error("{layer} reports: not found: {path}")]
    #[diagnostic(code(cabinet::not_found))]
    NotFound { layer: Layer, path: String },

    #[error("{layer} reports: already exists: {path}")]
    #[diagnostic(code(cabinet::already_exists))]
    AlreadyExists { layer: Layer, path: String },

    #[error("{layer} reports: kind mismatch: expected {}, handle is a {}", .expected.describe(), .actual.describe())]
    #[diagnostic(
        code(cabinet::kind_mismatch),
        help("Check Handle::kind() before specializing with as_file() or as_dir().")
    )]
    KindMismatch {
        layer: Layer,
        expected: Kind,
        actual: Kind,
    },

    #[error("{layer} reports: permission denied: {path}")]
    #[diagnostic(code(cabinet::permission_denied))]
    PermissionDenied { layer: Layer, path: String },

    #[error("{layer} reports: not a directory: {path}")]
    #[diagnostic(code(cabinet::not_a_directory))]
    NotADirectory { layer: Layer, path: String },

    #[error("{layer} reports: breakout: {path} resolves outside the sandbox root")]
    #[diagnostic(
        code(cabinet::breakout),
        help("A symlink (or '..') on this path leads outside the sandbox root.")
    )]
    Breakout { layer: Layer, path: String },

    #[error("{layer} reports: too many levels of symbolic links at {path}")]
    #[diagnostic(code(cabinet::symlink_loop))]
    SymlinkLoop { layer: Layer, path: String },

    #[error("{layer} reports: invalid name {name:?}: {reason}")]
    #[diagnostic(code(cabinet::invalid_name))]
    InvalidName {
        layer: Layer,
        name: String,
        reason: String,
    },

    #[error("{layer} reports: invalid argument: {message}")]
    #[diagnostic(code(cabinet::invalid_argument))]
    InvalidArgument { layer: Layer, message: String },

    #[error("{layer} reports: not supported: {message}")]
    #[diagnostic(code(cabinet::not_supported))]
    NotSupported { layer: Layer, message: String },

    #[error("{layer} reports: handle is closed")]
    #[diagnostic(
        code(cabinet::closed),
        help("The handle was closed; open the entry again.")
    )]
    Closed { layer: Layer },

    #[error("{layer} reports: read-only cabinet")]
    #[diagnostic(code(cabinet::read_only))]
    ReadOnly { layer: Layer },

    #[error("{layer} reports: out of space")]
    #[diagnostic(code(cabinet::out_of_space))]
    OutOfSpace { layer: Layer },

    #[error("{layer} reports: {code}: {context}")]
    #[diagnostic(code(cabinet::os))]
    Os {
        layer: Layer,
        code: OsCode,
        context: String,
    },

    #[error("{layer} reports: {message}")]
    #[diagnostic(code(cabinet::backend))]
    Backend { layer: Layer, message: String },
}

impl FsError {
    /// The layer that reported this error
    #[must_use]
    pub fn layer(&self) -> &Layer {
        match self {
            FsError::NotFound { layer, .. }
            | FsError::AlreadyExists { layer, .. }
            | FsError::KindMismatch { layer, .. }
            | FsError::PermissionDenied { layer, .. }
            | FsError::NotADirectory { layer, .. }
            | FsError::Breakout { layer, .. }
            | FsError::SymlinkLoop { layer, .. }
            | FsError::InvalidName { layer, .. }
            | FsError::InvalidArgument { layer, .. }
            | FsError::NotSupported { layer, .. }
            | FsError::Closed { layer }
            | FsError::ReadOnly { layer }
            | FsError::OutOfSpace { layer }
            | FsError::Os { layer, .. }
            | FsError::Backend { layer, .. } => layer,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_breakout(&self) -> bool {
        matches!(self, FsError::Breakout { .. })
    }

    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }

    /// Convert a std::io::Error, keeping the errno when there is one
    pub fn from_io(layer: Layer, err: io::Error, context: impl Into<String>) -> Self {
        use io::ErrorKind;
        let context = context.into();
        match err.kind() {
            ErrorKind::NotFound => FsError::NotFound {
                layer,
                path: context,
            },
            ErrorKind::PermissionDenied => FsError::PermissionDenied {
                layer,
                path: context,
            },
            ErrorKind::AlreadyExists => FsError::AlreadyExists {
                layer,
                path: context,
            },
            _ => match err.raw_os_error() {
                Some(code) => FsError::Os {
                    layer,
                    code: OsCode(code),
                    context,
                },
                None => FsError::Backend {
                    layer,
                    message: format!("{}: {}", context, err),
                },
            },
        }
    }

    /// Convert for the std::io trait boundary (Read, Write, Seek)
    pub fn into_io(self) -> io::Error {
        use io::ErrorKind;
        let kind = match &self {
            FsError::NotFound { .. } => ErrorKind::NotFound,
            FsError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            FsError::PermissionDenied { .. } | FsError::ReadOnly { .. } => {
                ErrorKind::PermissionDenied
            }
            FsError::InvalidName { .. } | FsError::InvalidArgument { .. } => {
                ErrorKind::InvalidInput
            }
            FsError::NotSupported { .. } => ErrorKind::Unsupported,
            FsError::Os { code, .. } => return io::Error::from_raw_os_error(code.0),
            _ => ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }
}
