use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use axum::Router;
use futures::FutureExt;
use indexmap::IndexMap;
use serde_json::Value;

use super::permissions::group_orphaned_permissions;
use super::static_files::{static_fallback, static_roots};
use crate::config::Environment;
use crate::contracts::RouteGroup;
use crate::error::panic_message;
use crate::loader::{BackOfficeManifest, ExtensionDescriptor, MenuEntry, PermissionEntry};
use crate::routes::RouteTable;

/// Contributions of the host itself, mounted before any extension.
#[derive(Debug, Default)]
pub struct CoreSurface {
    /// Host installation directory; dev-mode client scripts live below it.
    pub root_directory: Option<PathBuf>,
    pub menu: Vec<MenuEntry>,
    pub permissions: Vec<PermissionEntry>,
    pub views_folders: Vec<PathBuf>,
    pub public_directory: Option<PathBuf>,
    pub images_folders: Vec<PathBuf>,
    pub images_style: IndexMap<String, Value>,
    pub routes: RouteTable,
    pub admin_routes: RouteTable,
    pub web_service_routes: RouteTable,
}

/// The merged application, ready to be served.
pub struct ComposedApplication {
    /// Public and admin routes with the static-file fallback.
    pub router: Router,
    pub web_service_router: Router,
    /// Sorted by weight; entries without a weight count as 0.
    pub menu: Vec<MenuEntry>,
    pub permissions: Vec<PermissionEntry>,
    pub views_folders: Vec<PathBuf>,
    /// Core directory first, then extensions in mount order.
    pub public_directories: Vec<PathBuf>,
    /// Roots served by the static fallback, in lookup order.
    pub static_roots: Vec<PathBuf>,
    pub images_folders: Vec<PathBuf>,
    pub images_style: IndexMap<String, Value>,
    /// Web-service scopes keyed by extension name.
    pub web_service_scopes: IndexMap<String, Value>,
    pub manifests: Vec<BackOfficeManifest>,
    pub extensions: Vec<ExtensionDescriptor>,
}

impl std::fmt::Debug for ComposedApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedApplication")
            .field("menu", &self.menu.len())
            .field("permissions", &self.permissions.len())
            .field("public_directories", &self.public_directories)
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

/// Accumulates extension contributions in mount order.
pub struct ApplicationComposer {
    router: Router,
    admin_router: Router,
    web_service_router: Router,
    environment: Environment,
    core_root: Option<PathBuf>,
    core_public: Option<PathBuf>,
    menu: Vec<MenuEntry>,
    permissions: Vec<PermissionEntry>,
    views_folders: Vec<PathBuf>,
    extension_publics: Vec<PathBuf>,
    images_folders: Vec<PathBuf>,
    images_style: IndexMap<String, Value>,
    web_service_scopes: IndexMap<String, Value>,
    manifests: Vec<BackOfficeManifest>,
    extensions: Vec<ExtensionDescriptor>,
}

impl ApplicationComposer {
    pub fn new(core: CoreSurface) -> Self {
        Self {
            router: core.routes.into_router(),
            admin_router: core.admin_routes.into_router(),
            web_service_router: core.web_service_routes.into_router(),
            environment: Environment::default(),
            core_root: core.root_directory,
            core_public: core.public_directory,
            menu: core.menu,
            permissions: core.permissions,
            views_folders: core.views_folders,
            extension_publics: Vec::new(),
            images_folders: core.images_folders,
            images_style: core.images_style,
            web_service_scopes: IndexMap::new(),
            manifests: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Environment deciding which static roots are served. Defaults to dev.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Fold one extension in. Routers are nested at its mount path; the admin
    /// router ends up under `/admin` + mount path.
    pub fn mount(&mut self, mut descriptor: ExtensionDescriptor) -> &mut Self {
        let mount_path = descriptor.mount_path.clone();

        for group in RouteGroup::ALL {
            let Some(table) = descriptor.routers.take(group) else {
                continue;
            };
            if table.is_empty() {
                continue;
            }
            let target = match group {
                RouteGroup::Public => &mut self.router,
                RouteGroup::Admin => &mut self.admin_router,
                RouteGroup::WebService => &mut self.web_service_router,
            };
            nest_into(target, &mount_path, table.into_router(), &descriptor.name);
        }

        if let Some(dir) = &descriptor.public_directory {
            self.extension_publics.push(dir.clone());
        }
        if let Some(menu) = &descriptor.menu {
            self.menu.extend(menu.iter().cloned());
        }
        if let Some(folders) = &descriptor.views_folders {
            self.views_folders.extend(folders.iter().cloned());
        }
        if let Some(folders) = &descriptor.images_folders {
            self.images_folders.extend(folders.iter().cloned());
        }
        if let Some(styles) = &descriptor.images_style {
            for (name, style) in styles {
                self.images_style.insert(name.clone(), style.clone());
            }
        }
        if let Some(permissions) = &descriptor.permissions {
            self.permissions.extend(permissions.iter().cloned());
        }
        if let Some(scopes) = &descriptor.web_service_scopes {
            self.web_service_scopes.insert(descriptor.name.clone(), scopes.clone());
        }
        if let Some(manifest) = descriptor.back_office_manifest() {
            self.manifests.push(manifest);
        }

        tracing::info!(extension = %descriptor.name, mount_path = %mount_path, "Extension mounted");
        self.extensions.push(descriptor);
        self
    }

    pub fn extensions(&self) -> &[ExtensionDescriptor] {
        &self.extensions
    }

    /// Call `start()` on every mounted instance, in mount order. Failures are
    /// logged and do not stop the others.
    pub async fn start_all(&self) {
        for descriptor in &self.extensions {
            let Some(instance) = &descriptor.instance else {
                continue;
            };
            match AssertUnwindSafe(instance.start()).catch_unwind().await {
                Ok(Ok(())) => tracing::info!(extension = %descriptor.name, "Extension started"),
                Ok(Err(err)) => {
                    tracing::error!(extension = %descriptor.name, error = %err, "Extension failed to start")
                }
                Err(payload) => tracing::error!(
                    extension = %descriptor.name,
                    reason = %panic_message(payload.as_ref()),
                    "Extension panicked while starting"
                ),
            }
        }
    }

    pub fn finish(self) -> ComposedApplication {
        let mut router = self.router;
        nest_into(&mut router, "/admin", self.admin_router, "admin");
        let roots = static_roots(
            self.core_public.as_deref(),
            self.core_root.as_deref(),
            &self.extension_publics,
            self.environment,
        );
        let router = router.fallback(static_fallback(roots.clone()));
        let public_directories = self.core_public.into_iter().chain(self.extension_publics).collect();

        let mut menu = self.menu;
        menu.sort_by_key(|entry| entry.weight.unwrap_or(0));

        ComposedApplication {
            router,
            web_service_router: self.web_service_router,
            menu,
            permissions: group_orphaned_permissions(self.permissions),
            views_folders: self.views_folders,
            public_directories,
            static_roots: roots,
            images_folders: self.images_folders,
            images_style: self.images_style,
            web_service_scopes: self.web_service_scopes,
            manifests: self.manifests,
            extensions: self.extensions,
        }
    }
}

/// Nest `inner` at `path`; a conflicting nest is logged and skipped.
fn nest_into(target: &mut Router, path: &str, inner: Router, owner: &str) {
    let attempt = target.clone();
    match catch_unwind(AssertUnwindSafe(|| attempt.nest(path, inner))) {
        Ok(next) => *target = next,
        Err(payload) => tracing::error!(
            extension = owner,
            path,
            reason = %panic_message(payload.as_ref()),
            "Router rejected nested routes"
        ),
    }
}
