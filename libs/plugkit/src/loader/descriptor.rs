use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::conf::{MenuEntry, PackageMetadata, PermissionEntry};
use crate::contracts::{EntityDeclaration, Extension, RouteGroup};
use crate::discovery::ExtensionPath;
use crate::routes::{RouteRecord, RouteTable};

/// Routers attached to an extension, one per route group it declared.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRouters {
    pub public: Option<RouteTable>,
    pub admin: Option<RouteTable>,
    pub web_service: Option<RouteTable>,
}

impl ExtensionRouters {
    /// One empty table per listed group.
    pub fn for_groups(groups: &[RouteGroup]) -> Self {
        let mut routers = Self::default();
        for group in groups {
            *routers.slot_mut(*group) = Some(RouteTable::new());
        }
        routers
    }

    pub fn get(&self, group: RouteGroup) -> Option<&RouteTable> {
        match group {
            RouteGroup::Public => self.public.as_ref(),
            RouteGroup::Admin => self.admin.as_ref(),
            RouteGroup::WebService => self.web_service.as_ref(),
        }
    }

    pub fn take(&mut self, group: RouteGroup) -> Option<RouteTable> {
        self.slot_mut(group).take()
    }

    fn slot_mut(&mut self, group: RouteGroup) -> &mut Option<RouteTable> {
        match group {
            RouteGroup::Public => &mut self.public,
            RouteGroup::Admin => &mut self.admin,
            RouteGroup::WebService => &mut self.web_service,
        }
    }
}

/// Script and style files one extension contributes to the back office.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackOfficeManifest {
    pub extension: String,
    pub mount_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_lib_files: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_files: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css_files: Option<Vec<String>>,
}

/// A loaded extension.
///
/// Configuration-derived fields stay `None` when the configuration does not
/// declare them, so "declares nothing" and "declares an empty list" differ.
#[derive(Clone, Default)]
pub struct ExtensionDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub mount_path: String,
    pub instance: Option<Arc<dyn Extension>>,
    pub routers: ExtensionRouters,

    pub public_directory: Option<PathBuf>,
    pub i18n_directory: Option<PathBuf>,

    pub routes: Option<Vec<RouteRecord>>,
    pub admin_routes: Option<Vec<RouteRecord>>,
    pub web_service_routes: Option<Vec<RouteRecord>>,

    pub menu: Option<Vec<MenuEntry>>,
    pub permissions: Option<Vec<PermissionEntry>>,
    pub web_service_scopes: Option<Value>,
    pub script_lib_files: Option<Value>,
    pub script_files: Option<Vec<String>>,
    pub css_files: Option<Vec<String>>,
    pub views_folders: Option<Vec<PathBuf>>,
    pub images_folders: Option<Vec<PathBuf>>,
    pub images_style: Option<IndexMap<String, Value>>,
    pub entities: Option<Vec<EntityDeclaration>>,
    pub custom: Option<Value>,

    pub version: Option<PackageMetadata>,
}

impl std::fmt::Debug for ExtensionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = |routes: &Option<Vec<RouteRecord>>| routes.as_ref().map(Vec::len);
        f.debug_struct("ExtensionDescriptor")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("mount_path", &self.mount_path)
            .field("has_instance", &self.instance.is_some())
            .field("public_directory", &self.public_directory)
            .field("i18n_directory", &self.i18n_directory)
            .field("routes", &count(&self.routes))
            .field("admin_routes", &count(&self.admin_routes))
            .field("web_service_routes", &count(&self.web_service_routes))
            .field("menu", &self.menu.as_ref().map(Vec::len))
            .field("permissions", &self.permissions.as_ref().map(Vec::len))
            .field("version", &self.version)
            .finish()
    }
}

impl ExtensionDescriptor {
    /// Empty descriptor positioned at `candidate`.
    pub fn new(candidate: &ExtensionPath) -> Self {
        Self {
            name: candidate.name.clone(),
            path: candidate.path.clone(),
            mount_path: candidate.mount_path(),
            ..Default::default()
        }
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    pub fn routes_for(&self, group: RouteGroup) -> Option<&[RouteRecord]> {
        match group {
            RouteGroup::Public => self.routes.as_deref(),
            RouteGroup::Admin => self.admin_routes.as_deref(),
            RouteGroup::WebService => self.web_service_routes.as_deref(),
        }
    }

    /// `None` when the extension declares no back-office files at all.
    pub fn back_office_manifest(&self) -> Option<BackOfficeManifest> {
        if self.script_lib_files.is_none() && self.script_files.is_none() && self.css_files.is_none() {
            return None;
        }
        Some(BackOfficeManifest {
            extension: self.name.clone(),
            mount_path: self.mount_path.clone(),
            script_lib_files: self.script_lib_files.clone(),
            script_files: self.script_files.clone(),
            css_files: self.css_files.clone(),
        })
    }
}
