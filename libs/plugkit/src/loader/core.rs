use std::path::Path;

use super::conf::{decode_conf, read_json_object};
use crate::compose::CoreSurface;
use crate::config::LoaderOptions;
use crate::routes::{apply_routes, ControllerResolver, RouteTable};

/// Load the host's own surface from `root`.
///
/// `root` is canonicalized so the surface only carries absolute paths. Uses
/// the same configuration format as extensions. Only menu, permissions,
/// views, images, public directory and routes are taken; a missing or broken
/// configuration yields an empty surface.
pub async fn load_core_surface(
    root: &Path,
    options: &LoaderOptions,
    resolver: &dyn ControllerResolver,
) -> CoreSurface {
    let mut surface = CoreSurface::default();

    let root = match tokio::fs::canonicalize(root).await {
        Ok(root) => root,
        Err(err) => {
            tracing::warn!(root = %root.display(), error = %err, "Core root unreadable; empty core surface");
            return surface;
        }
    };
    surface.root_directory = Some(root.clone());
    let root = root.as_path();

    let public_dir = root.join(&options.public_dir);
    if tokio::fs::metadata(&public_dir).await.is_ok_and(|m| m.is_dir()) {
        surface.public_directory = Some(public_dir);
    }

    let conf_path = root.join(&options.conf_file);
    let doc = match read_json_object(&conf_path).await {
        Ok(Some(doc)) => doc,
        Ok(None) => {
            tracing::debug!(path = %conf_path.display(), "No core configuration");
            return surface;
        }
        Err(err) => {
            tracing::warn!(path = %conf_path.display(), error = %err, "Core configuration ignored");
            return surface;
        }
    };

    let conf = decode_conf(root, &doc, options.environment, resolver, "core");
    surface.menu = conf.menu.unwrap_or_default();
    surface.permissions = conf.permissions.unwrap_or_default();
    surface.views_folders = conf.views_folders.unwrap_or_default();
    surface.images_folders = conf.images_folders.unwrap_or_default();
    surface.images_style = conf.images_style.unwrap_or_default();
    surface.routes = table_of(conf.routes.as_deref());
    surface.admin_routes = table_of(conf.admin_routes.as_deref());
    surface.web_service_routes = table_of(conf.web_service_routes.as_deref());

    tracing::info!(
        routes = surface.routes.len(),
        admin_routes = surface.admin_routes.len(),
        menu = surface.menu.len(),
        "Core surface loaded"
    );
    surface
}

fn table_of(records: Option<&[crate::routes::RouteRecord]>) -> RouteTable {
    let mut table = RouteTable::new();
    if let Some(records) = records {
        apply_routes(records, Some(&mut table));
    }
    table
}
