use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Version of the [`Extension`] contract this host understands.
pub const EXTENSION_API_VERSION: u32 = 1;

/// The three routers an extension can contribute to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteGroup {
    Public,
    Admin,
    WebService,
}

impl RouteGroup {
    pub const ALL: [RouteGroup; 3] = [RouteGroup::Public, RouteGroup::Admin, RouteGroup::WebService];

    /// Key of the group inside the `routes` section of `conf.json`.
    pub fn conf_key(&self) -> &'static str {
        match self {
            RouteGroup::Public => "public",
            RouteGroup::Admin => "admin",
            RouteGroup::WebService => "ws",
        }
    }
}

/// Main object of an extension.
///
/// An extension without a registered factory still contributes its static
/// assets, translations and configuration; implementing this trait only adds
/// executable behavior.
#[async_trait]
pub trait Extension: Send + Sync + 'static {
    fn api_version(&self) -> u32 {
        EXTENSION_API_VERSION
    }

    /// Routers the extension wants attached before its routes are applied.
    fn route_groups(&self) -> &'static [RouteGroup] {
        &RouteGroup::ALL
    }

    /// Runs once every extension of the batch has been loaded.
    async fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any;
}

/// What a factory learns about the extension it instantiates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionContext {
    pub name: String,
    pub path: PathBuf,
    pub mount_path: String,
}

impl ExtensionContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }
}

/// One entry of the `entities` section, with its module path made absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDeclaration {
    pub name: String,
    pub module: PathBuf,
}

/// Collaborator that owns entity storage. Loaders only hand declarations over.
pub trait EntityRegistrar: Send + Sync {
    fn register_entities(&self, extension: &str, entities: &[EntityDeclaration]);
}
