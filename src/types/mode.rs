/*!
 * Permission Mode
 * The familiar posix 0777 bitmask, detached from any host representation
 */

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const RWX: &[u8; 9] = b"rwxrwxrwx";

/// Owner/group/other read-write-execute bits
///
/// Only the low nine bits are ever significant. Setuid, setgid and sticky are
/// not tracked here.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mode {
    bits: u16,
}

impl Mode {
    /// rw-r--r--
    pub const FILE_DEFAULT: Mode = Mode::from_bits(0o644);
    /// rwxr-xr-x
    pub const DIR_DEFAULT: Mode = Mode::from_bits(0o755);

    /// Build a mode from raw bits, masking everything above 0o777
    #[inline]
    #[must_use]
    pub const fn from_bits(raw: u32) -> Self {
        Self {
            bits: (raw & 0o777) as u16,
        }
    }

    /// Raw permission bits (always <= 0o777)
    #[inline]
    #[must_use]
    pub const fn raw(&self) -> u16 {
        self.bits
    }

    /// Check if the owner write bit is clear
    #[inline(always)]
    #[must_use]
    pub const fn is_readonly(&self) -> bool {
        self.bits & 0o200 == 0
    }

    /// Check if any execute bit is set
    #[inline(always)]
    #[must_use]
    pub const fn is_executable(&self) -> bool {
        self.bits & 0o111 != 0
    }

    /// Owner triplet (rwx)
    #[inline]
    #[must_use]
    pub const fn owner(&self) -> u16 {
        (self.bits >> 6) & 0o7
    }

    /// Group triplet (rwx)
    #[inline]
    #[must_use]
    pub const fn group(&self) -> u16 {
        (self.bits >> 3) & 0o7
    }

    /// Other triplet (rwx)
    #[inline]
    #[must_use]
    pub const fn other(&self) -> u16 {
        self.bits & 0o7
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = [b'-'; 9];
        for (i, letter) in RWX.iter().enumerate() {
            if self.bits & (1 << (8 - i)) != 0 {
                buf[i] = *letter;
            }
        }
        // buf only ever holds ASCII from RWX or '-'
        f.write_str(std::str::from_utf8(&buf).map_err(|_| fmt::Error)?)
    }
}

impl From<u32> for Mode {
    fn from(raw: u32) -> Self {
        Self::from_bits(raw)
    }
}

impl Serialize for Mode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.bits)
    }
}

/// Deserialize and validate permission bits (must be <= 0o777)
impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u32::deserialize(deserializer)?;
        if raw > 0o777 {
            return Err(serde::de::Error::custom(format!(
                "invalid permission mode: 0o{:o} exceeds maximum 0o777",
                raw
            )));
        }
        Ok(Self::from_bits(raw))
    }
}
