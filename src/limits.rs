/*!
 * Cabinet Limits and Constants
 *
 * Centralized location for limits and defaults shared by the backends and
 * the sandbox.
 *
 * - Security-relevant constants are marked with [SECURITY]
 * - Linux-compatible values are marked with [LINUX-COMPAT]
 */

// =============================================================================
// SANDBOX RESOLUTION
// =============================================================================

/// Maximum symlinks followed while resolving one path (40)
/// [SECURITY] Bounds work per resolution and turns cycles into SymlinkLoop
/// [LINUX-COMPAT] Same as Linux MAXSYMLINKS
pub const MAX_SYMLINK_HOPS: u32 = 40;

/// Follow a symlink in the final component of `open_path` by default
pub const FOLLOW_FINAL_SYMLINK: bool = true;

// =============================================================================
// BACKENDS
// =============================================================================

/// Initial buffer for llistxattr (4KB)
/// Grown on ERANGE; most files have a handful of short keys
pub const XATTR_LIST_BUFFER: usize = 4 * 1024;

/// Default in-memory cabinet capacity (unbounded)
pub const DEFAULT_MEMFS_CAPACITY: Option<u64> = None;

/// Largest in-memory file, in bytes
/// [SECURITY] Offsets past this are refused before any allocation
/// Bounded by what a single Vec can address
pub const MAX_MEMFS_FILE_SIZE: u64 = isize::MAX as u64;

// =============================================================================
// ENVIRONMENT OVERRIDES
// =============================================================================

pub const ENV_MAX_SYMLINK_HOPS: &str = "CABINET_MAX_SYMLINK_HOPS";
pub const ENV_FOLLOW_FINAL_SYMLINK: &str = "CABINET_FOLLOW_FINAL_SYMLINK";
pub const ENV_READONLY: &str = "CABINET_READONLY";
pub const ENV_MEMFS_CAPACITY: &str = "CABINET_MEMFS_CAPACITY";
/// Switches `init_tracing` to JSON output
pub const ENV_TRACE_JSON: &str = "CABINET_TRACE_JSON";
