/*!
 * Cabinet Filesystem Library
 * Handle-based filesystem abstraction with in-memory, host and sandboxing cabinets
 */

pub mod config;
pub mod limits;
pub mod logging;
pub mod memfs;
#[cfg(unix)]
pub mod osfs;
pub mod sandbox;
pub mod traits;
pub mod types;

// Re-exports
pub use config::{CabinetConfig, LocalConfig, MemoryConfig, SandboxConfig};
pub use logging::init_tracing;
pub use memfs::MemCabinet;
#[cfg(unix)]
pub use osfs::LocalCabinet;
pub use sandbox::{Sandbox, SandboxHandle};
pub use traits::{lookup_path, Cabinet, DirIter, Directory, File, Handle, Unsupported, Xattrs};
pub use types::*;
