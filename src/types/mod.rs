/*!
 * Cabinet Types
 * Platform-independent values shared by every backend
 */

mod errors;
mod kind;
mod metadata;
mod mode;
mod name;
mod open_mode;
pub(crate) mod serde_helpers;

pub use errors::{FsError, FsResult, Layer, OsCode};
pub use kind::Kind;
pub use metadata::Metadata;
pub use mode::Mode;
pub use name::{FsPath, Name};
pub use open_mode::OpenMode;
