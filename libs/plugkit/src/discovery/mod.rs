//! Finding extension directories on disk.
//!
//! [`scan`] walks the extension root and every nested dependency directory,
//! [`dedupe`] keeps the outermost copy of each logical name.

mod dedupe;
mod path;
mod scanner;

pub use dedupe::dedupe;
pub use path::ExtensionPath;
pub use scanner::scan;
