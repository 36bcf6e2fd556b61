//! Loading extensions: one directory at a time ([`load_extension`]) or a
//! whole tree at once ([`load_all`]).

mod batch;
mod conf;
mod core;
mod descriptor;
mod extension;

use std::sync::Arc;

pub use batch::load_all;
pub use conf::{MenuEntry, PackageMetadata, Permission, PermissionEntry, PermissionGroup};
pub use core::load_core_surface;
pub use descriptor::{BackOfficeManifest, ExtensionDescriptor, ExtensionRouters};
pub use extension::load_extension;

use crate::config::LoaderOptions;
use crate::contracts::EntityRegistrar;
use crate::registry::ExtensionCatalog;
use crate::routes::ControllerResolver;

/// Shared, read-only inputs of every extension load in a batch.
#[derive(Clone)]
pub struct LoaderContext {
    pub options: LoaderOptions,
    pub catalog: Arc<ExtensionCatalog>,
    pub controllers: Arc<dyn ControllerResolver>,
    pub entities: Option<Arc<dyn EntityRegistrar>>,
}

impl std::fmt::Debug for LoaderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderContext")
            .field("options", &self.options)
            .field("catalog", &self.catalog)
            .field("has_entity_registrar", &self.entities.is_some())
            .finish()
    }
}

impl LoaderContext {
    pub fn new(
        options: LoaderOptions,
        catalog: Arc<ExtensionCatalog>,
        controllers: Arc<dyn ControllerResolver>,
    ) -> Self {
        Self {
            options,
            catalog,
            controllers,
            entities: None,
        }
    }

    pub fn with_entity_registrar(mut self, registrar: Arc<dyn EntityRegistrar>) -> Self {
        self.entities = Some(registrar);
        self
    }
}
