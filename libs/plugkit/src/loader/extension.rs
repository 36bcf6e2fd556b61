use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Instrument;

use super::conf::{decode_conf, read_json_object, read_package, DecodedConf};
use super::{ExtensionDescriptor, ExtensionRouters, LoaderContext};
use crate::contracts::{ExtensionContext, RouteGroup};
use crate::discovery::ExtensionPath;
use crate::routes::{apply_routes, RouteRegistrar};

/// Load one extension directory.
///
/// Never fails: a broken main module, an unparsable configuration file or an
/// unreadable package file are logged and the corresponding fields stay unset.
pub async fn load_extension(ctx: &LoaderContext, candidate: &ExtensionPath) -> ExtensionDescriptor {
    let span = tracing::info_span!("load_extension", extension = %candidate.name);
    load_inner(ctx, candidate).instrument(span).await
}

async fn load_inner(ctx: &LoaderContext, candidate: &ExtensionPath) -> ExtensionDescriptor {
    let mut descriptor = ExtensionDescriptor::new(candidate);
    attach_instance(ctx, &mut descriptor);

    let opts = &ctx.options;
    let root = candidate.path.as_path();
    let conf_path = root.join(&opts.conf_file);
    let package_path = root.join(&opts.package_file);

    let (public_directory, i18n_directory, conf, package) = tokio::join!(
        probe_dir(root.join(&opts.public_dir)),
        probe_dir(root.join(&opts.i18n_dir)),
        load_conf(ctx, root, &conf_path, &candidate.name),
        read_package(&package_path),
    );

    descriptor.public_directory = public_directory;
    descriptor.i18n_directory = i18n_directory;
    descriptor.version = match package {
        Ok(version) => version,
        Err(err) => {
            tracing::warn!(path = %package_path.display(), error = %err, "Ignoring unreadable package metadata");
            None
        }
    };

    if let Some(conf) = conf {
        apply_conf(ctx, &mut descriptor, conf);
    }
    apply_route_groups(&mut descriptor);

    tracing::info!(
        mount_path = %descriptor.mount_path,
        has_instance = descriptor.has_instance(),
        "Extension loaded"
    );
    descriptor
}

fn attach_instance(ctx: &LoaderContext, descriptor: &mut ExtensionDescriptor) {
    let ext_ctx = ExtensionContext {
        name: descriptor.name.clone(),
        path: descriptor.path.clone(),
        mount_path: descriptor.mount_path.clone(),
    };

    match ctx.catalog.instantiate(&ext_ctx) {
        Ok(Some(instance)) => {
            descriptor.routers = ExtensionRouters::for_groups(instance.route_groups());
            descriptor.instance = Some(Arc::from(instance));
        }
        Ok(None) => {
            tracing::info!(path = %descriptor.path.display(), "Extension has no main module");
        }
        Err(err) => {
            tracing::error!(path = %descriptor.path.display(), error = %err, "Error while loading extension main module");
        }
    }
}

async fn probe_dir(path: PathBuf) -> Option<PathBuf> {
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => Some(path),
        _ => None,
    }
}

async fn load_conf(ctx: &LoaderContext, root: &Path, conf_path: &Path, extension: &str) -> Option<DecodedConf> {
    match read_json_object(conf_path).await {
        Ok(Some(doc)) => Some(decode_conf(
            root,
            &doc,
            ctx.options.environment,
            ctx.controllers.as_ref(),
            extension,
        )),
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(path = %conf_path.display(), error = %err, "Extension configuration ignored");
            None
        }
    }
}

fn apply_conf(ctx: &LoaderContext, descriptor: &mut ExtensionDescriptor, conf: DecodedConf) {
    descriptor.custom = conf.custom;
    descriptor.web_service_scopes = conf.web_service_scopes;
    descriptor.permissions = conf.permissions;
    descriptor.views_folders = conf.views_folders;
    descriptor.images_folders = conf.images_folders;
    descriptor.images_style = conf.images_style;
    descriptor.routes = conf.routes;
    descriptor.admin_routes = conf.admin_routes;
    descriptor.web_service_routes = conf.web_service_routes;
    descriptor.menu = conf.menu;
    descriptor.script_lib_files = conf.script_lib_files;
    descriptor.script_files = conf.script_files;
    descriptor.css_files = conf.css_files;

    if let Some(entities) = &conf.entities {
        match &ctx.entities {
            Some(registrar) => registrar.register_entities(&descriptor.name, entities),
            None => tracing::debug!(count = entities.len(), "No entity registrar; entities kept on descriptor only"),
        }
    }
    descriptor.entities = conf.entities;
}

/// Apply decoded route groups to the routers attached with the instance.
fn apply_route_groups(descriptor: &mut ExtensionDescriptor) {
    let ExtensionDescriptor {
        routes,
        admin_routes,
        web_service_routes,
        routers,
        ..
    } = descriptor;

    let groups = [
        (RouteGroup::Public, routes.as_deref(), routers.public.as_mut()),
        (RouteGroup::Admin, admin_routes.as_deref(), routers.admin.as_mut()),
        (RouteGroup::WebService, web_service_routes.as_deref(), routers.web_service.as_mut()),
    ];

    for (group, records, table) in groups {
        let Some(records) = records else {
            continue;
        };
        match table {
            Some(table) => apply_routes(records, Some(table as &mut dyn RouteRegistrar)),
            None if !records.is_empty() => tracing::debug!(
                group = group.conf_key(),
                count = records.len(),
                "No router attached; routes kept on descriptor only"
            ),
            None => {}
        }
    }
}
