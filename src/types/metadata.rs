/*!
 * Entry Metadata
 * Posix-style attributes of one entry, without extended attributes
 */

use super::kind::Kind;
use super::mode::Mode;
use super::serde_helpers::{is_default, is_zero_u64, system_time_micros};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Entry metadata
///
/// Extended attributes are deliberately absent: on most real filesystems they
/// cost a syscall per attribute, so they live behind
/// [`Handle::xattrs`](crate::traits::Handle::xattrs) instead.
///
/// Timestamp caveats:
/// - `created` generally cannot be set, only read, and some hosts don't record it.
/// - `accessed` may be coarsened or never updated (`noatime`, `relatime`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Metadata {
    pub kind: Kind,
    /// Backend-scoped identity; equal ids within one cabinet mean the same entry
    #[serde(skip_serializing_if = "is_zero_u64", default)]
    pub id: u64,
    #[serde(skip_serializing_if = "is_default", default)]
    pub perms: Mode,
    #[serde(skip_serializing_if = "is_default", default)]
    pub uid: u32,
    #[serde(skip_serializing_if = "is_default", default)]
    pub gid: u32,
    #[serde(skip_serializing_if = "is_zero_u64", default)]
    pub size: u64,
    /// Target of a symlink; empty for every other kind
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub linkname: String,
    /// Device numbers; zero unless the kind is a device
    #[serde(skip_serializing_if = "is_zero_u64", default)]
    pub devmajor: u64,
    #[serde(skip_serializing_if = "is_zero_u64", default)]
    pub devminor: u64,
    #[serde(with = "system_time_micros")]
    pub created: SystemTime,
    #[serde(with = "system_time_micros")]
    pub modified: SystemTime,
    #[serde(with = "system_time_micros")]
    pub accessed: SystemTime,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            kind: Kind::RegularFile,
            id: 0,
            perms: Mode::default(),
            uid: 0,
            gid: 0,
            size: 0,
            linkname: String::new(),
            devmajor: 0,
            devminor: 0,
            created: SystemTime::UNIX_EPOCH,
            modified: SystemTime::UNIX_EPOCH,
            accessed: SystemTime::UNIX_EPOCH,
        }
    }
}

impl Metadata {
    /// Check if this is a directory
    ///
    /// # Performance
    /// Hot path - called for every component during path resolution
    #[inline(always)]
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, Kind::Directory)
    }

    /// Check if this is a regular file
    #[inline(always)]
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self.kind, Kind::RegularFile)
    }

    /// Check if this is a symbolic link
    #[inline(always)]
    #[must_use]
    pub const fn is_symlink(&self) -> bool {
        matches!(self.kind, Kind::Symlink)
    }

    /// Overwrite every field from `other`, reusing this record's string buffer
    pub fn copy_from(&mut self, other: &Metadata) {
        self.kind = other.kind;
        self.id = other.id;
        self.perms = other.perms;
        self.uid = other.uid;
        self.gid = other.gid;
        self.size = other.size;
        self.set_linkname(&other.linkname);
        self.devmajor = other.devmajor;
        self.devminor = other.devminor;
        self.created = other.created;
        self.modified = other.modified;
        self.accessed = other.accessed;
    }

    /// Replace the link target in place
    ///
    /// Keeps the existing allocation when it is large enough, which is what
    /// makes repeated `read_metadata` calls into one buffer allocation-free.
    #[inline]
    pub fn set_linkname(&mut self, target: &str) {
        self.linkname.clear();
        self.linkname.push_str(target);
    }
}
