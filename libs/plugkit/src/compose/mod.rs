//! Folding loaded extensions into one application surface.

mod composer;
mod permissions;
mod static_files;

pub use composer::{ApplicationComposer, ComposedApplication, CoreSurface};
pub use permissions::{group_orphaned_permissions, ORPHAN_GROUP_LABEL};
pub use static_files::{static_fallback, static_roots};
