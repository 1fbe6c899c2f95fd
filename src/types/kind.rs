/*!
 * Entry Kind
 * The closed set of filesystem entry types
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a filesystem entry
///
/// The set is closed: code branching on a `Kind` should match exhaustively.
/// Hardlinks are not a kind; they are a relationship between entries of one
/// cabinet, visible only through [`Metadata::id`](super::Metadata::id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    #[default]
    RegularFile,
    Directory,
    Symlink,
    Fifo,
    Socket,
    BlockDevice,
    CharDevice,
}

impl Kind {
    /// All kinds, in tag order
    pub const ALL: [Kind; 7] = [
        Kind::RegularFile,
        Kind::Directory,
        Kind::Symlink,
        Kind::Fifo,
        Kind::Socket,
        Kind::BlockDevice,
        Kind::CharDevice,
    ];

    /// One-letter tag as printed by `ls -l` and `find -type`
    #[inline]
    #[must_use]
    pub const fn as_char(&self) -> char {
        match self {
            Kind::RegularFile => 'f',
            Kind::Directory => 'd',
            Kind::Symlink => 'l',
            Kind::Fifo => 'p',
            Kind::Socket => 's',
            Kind::BlockDevice => 'b',
            Kind::CharDevice => 'c',
        }
    }

    /// Long human-readable name
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Kind::RegularFile => "regular file",
            Kind::Directory => "directory",
            Kind::Symlink => "symlink",
            Kind::Fifo => "fifo",
            Kind::Socket => "socket",
            Kind::BlockDevice => "block device",
            Kind::CharDevice => "char device",
        }
    }

    /// Check if major/minor device numbers are meaningful for this kind
    #[inline]
    #[must_use]
    pub const fn is_device(&self) -> bool {
        matches!(self, Kind::BlockDevice | Kind::CharDevice)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}
