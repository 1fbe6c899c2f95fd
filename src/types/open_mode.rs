/*!
 * Open Mode
 * How a child entry is opened from a directory
 */

use super::errors::{FsError, FsResult, Layer};
use super::serde_helpers::is_false;
use serde::{Deserialize, Serialize};

/// Open flags for [`Directory::open`](crate::traits::Directory::open)
///
/// Only true flags are serialized. `create` and `create_new` only ever
/// produce regular files; other kinds go through `Directory::create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct OpenMode {
    #[serde(skip_serializing_if = "is_false")]
    pub read: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub write: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub append: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub truncate: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub create: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub create_new: bool,
}

impl OpenMode {
    #[inline]
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn write_only() -> Self {
        Self {
            write: true,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// write + create
    #[inline]
    #[must_use]
    pub fn create() -> Self {
        Self {
            write: true,
            create: true,
            ..Default::default()
        }
    }

    /// write + create_new (fails if the entry exists)
    #[inline]
    #[must_use]
    pub fn create_new() -> Self {
        Self {
            write: true,
            create_new: true,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.write || self.append
    }

    #[inline]
    #[must_use]
    pub const fn will_create(&self) -> bool {
        self.create || self.create_new
    }

    /// Reject contradictory combinations
    #[must_use = "validation result must be checked"]
    pub fn validate(&self) -> FsResult<()> {
        let message = if self.create_new && !self.is_writable() {
            "create_new requires write flag"
        } else if self.create && !self.is_writable() {
            "create requires write flag"
        } else if self.truncate && !self.write {
            "truncate requires write flag"
        } else if self.append && self.truncate {
            "cannot use both append and truncate"
        } else {
            return Ok(());
        };
        Err(FsError::InvalidArgument {
            layer: Layer::PATH,
            message: message.to_string(),
        })
    }
}
