//! # Plugkit - Extension Loading and Route Composition
//!
//! Discovers extension packages on disk, loads their declarative configuration
//! and merges their contributions into a single application surface.
//!
//! ## Pipeline
//!
//! - **Scan**: walk the extension root, recursing into nested dependency directories
//! - **Dedupe**: keep the outermost copy of every logical extension name
//! - **Load**: instantiate the main module, probe `public/`, `i18n/`, `conf.json`
//!   and `package.json` concurrently, decode routes into route tables
//! - **Compose**: mount routers, merge menus, permissions and static roots
//!
//! ## Basic Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use plugkit::{load_all, ApplicationComposer, ControllerRegistry, ExtensionCatalog, LoaderContext};
//!
//! let ctx = Arc::new(LoaderContext::new(
//!     Default::default(),
//!     Arc::new(ExtensionCatalog::discover()),
//!     Arc::new(ControllerRegistry::discover()),
//! ));
//! let extensions = load_all(ctx, "node_modules".as_ref()).await?;
//!
//! let mut composer = ApplicationComposer::new(Default::default());
//! for extension in extensions {
//!     composer.mount(extension);
//! }
//! composer.start_all().await;
//! let app = composer.finish();
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

// Re-export inventory for link-time registration
pub use inventory;

pub mod config;
pub mod contracts;
pub mod error;
pub mod registry;

pub mod compose;
pub mod discovery;
pub mod loader;
pub mod routes;

pub use config::{DiscoveryOptions, Environment, LoaderOptions};
pub use contracts::{
    EntityDeclaration, EntityRegistrar, Extension, ExtensionContext, RouteGroup,
    EXTENSION_API_VERSION,
};
pub use error::{ConfError, DiscoveryError, ExtensionLoadError, ResolveError, RouteDecodeError};
pub use registry::{
    ControllerRegistration, ExtensionCatalog, ExtensionFactory, ExtensionRegistration,
};

pub use compose::{ApplicationComposer, ComposedApplication, CoreSurface};
pub use discovery::{dedupe, scan, ExtensionPath};
pub use loader::{
    load_all, load_core_surface, load_extension, BackOfficeManifest, ExtensionDescriptor,
    ExtensionRouters, LoaderContext, MenuEntry, PackageMetadata, Permission, PermissionEntry,
    PermissionGroup,
};
pub use routes::{
    apply_routes, decode_routes, Action, Controller, ControllerRegistry, ControllerResolver,
    RouteMethod, RouteRecord, RouteRegistrar, RouteSpec, RouteTable, RouteTarget,
};
