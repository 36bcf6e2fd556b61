use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use plugkit::{
    load_all, load_core_surface, ApplicationComposer, ComposedApplication, ControllerRegistry,
    DiscoveryOptions, Environment, ExtensionCatalog, ExtensionDescriptor, LoaderContext,
    LoaderOptions, RouteGroup,
};
use plugkit_bootstrap::{AppConfig, CliArgs};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

mod registered_extensions;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Plugkit Server - hosts extensions discovered on disk
#[derive(Parser)]
#[command(name = "plugkit-server")]
#[command(about = "Plugkit Server - hosts extensions discovered on disk")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Extension root directory (overrides config)
    #[arg(short, long)]
    extensions: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration and exit
    Check,
    /// Load extensions, print what was found and exit
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        extensions: cli.extensions.as_ref().map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (APP__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.clone().unwrap_or_default();
    plugkit_bootstrap::logging::init_logging_unified(&logging_config, Path::new(&config.server.home_dir));

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config),
        Commands::List => list_extensions(config).await,
    }
}

fn loader_options(config: &AppConfig) -> Result<LoaderOptions> {
    let ext = &config.extensions;
    let environment = Environment::parse(&ext.environment)
        .ok_or_else(|| anyhow!("extensions.environment must be 'dev' or 'prod', got '{}'", ext.environment))?;

    Ok(LoaderOptions {
        discovery: DiscoveryOptions {
            prefix: ext.prefix.clone(),
            deps_dir: ext.deps_dir.clone(),
        },
        conf_file: ext.conf_file.clone(),
        package_file: ext.package_file.clone(),
        environment,
        ..LoaderOptions::default()
    })
}

fn loader_context(config: &AppConfig) -> Result<Arc<LoaderContext>> {
    let options = loader_options(config)?;
    let catalog = Arc::new(ExtensionCatalog::discover());
    let controllers = Arc::new(ControllerRegistry::discover_with_prefix(options.discovery.prefix.clone()));
    Ok(Arc::new(LoaderContext::new(options, catalog, controllers)))
}

async fn load_extensions(config: &AppConfig, ctx: &Arc<LoaderContext>) -> Result<Vec<ExtensionDescriptor>> {
    let root = config.extensions_root();
    load_all(ctx.clone(), &root)
        .await
        .with_context(|| format!("Failed to load extensions from {}", root.display()))
}

async fn compose(config: &AppConfig) -> Result<ComposedApplication> {
    let ctx = loader_context(config)?;

    let mut core_options = ctx.options.clone();
    core_options.conf_file = config.core.conf_file.clone();
    let core = load_core_surface(&config.core_root(), &core_options, ctx.controllers.as_ref()).await;

    let extensions = load_extensions(config, &ctx).await?;

    let mut composer = ApplicationComposer::new(core).environment(ctx.options.environment);
    for descriptor in extensions {
        composer.mount(descriptor);
    }
    composer.start_all().await;
    Ok(composer.finish())
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Plugkit Server starting");
    let app = compose(&config).await?;
    tracing::info!(
        extensions = app.extensions.len(),
        menu = app.menu.len(),
        permissions = app.permissions.len(),
        "Application composed"
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            plugkit_bootstrap::shutdown_signal().await;
            cancel.cancel();
        }
    });

    let host = &config.server.host;
    let public = serve(
        bind(host, config.server.port).await?,
        app.router.layer(TraceLayer::new_for_http()),
        cancel.clone(),
    );

    match config.server.web_service_port {
        Some(port) => {
            let web_service = serve(
                bind(host, port).await?,
                app.web_service_router.layer(TraceLayer::new_for_http()),
                cancel.clone(),
            );
            tokio::try_join!(public, web_service)?;
        }
        None => {
            let ws_routes: usize = app
                .extensions
                .iter()
                .filter_map(|e| e.routes_for(RouteGroup::WebService))
                .map(<[_]>::len)
                .sum();
            if ws_routes > 0 {
                tracing::warn!(routes = ws_routes, "server.web_service_port not set; web-service routes are not served");
            }
            public.await?;
        }
    }

    tracing::info!("Plugkit Server stopped");
    Ok(())
}

async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "Listening");
    Ok(listener)
}

async fn serve(listener: TcpListener, router: axum::Router, cancel: CancellationToken) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("HTTP server failed")
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration…");
    loader_options(&config)?;
    let root = config.extensions_root();
    if !root.is_dir() {
        tracing::warn!(root = %root.display(), "Extension root does not exist yet");
    }
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

async fn list_extensions(config: AppConfig) -> Result<()> {
    let ctx = loader_context(&config)?;
    let extensions = load_extensions(&config, &ctx).await?;

    if extensions.is_empty() {
        println!("No extensions found in {}", config.extensions_root().display());
        return Ok(());
    }

    for ext in &extensions {
        let count = |group| ext.routes_for(group).map_or(0, <[_]>::len);
        let version = ext
            .version
            .as_ref()
            .map(|v| v.version.as_str())
            .filter(|v| !v.is_empty())
            .unwrap_or("-");
        println!(
            "{:<24} {:<32} {:<10} main={:<5} public={} admin={} ws={}",
            ext.name,
            ext.mount_path,
            version,
            ext.has_instance(),
            count(RouteGroup::Public),
            count(RouteGroup::Admin),
            count(RouteGroup::WebService),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_options_follow_extension_config() {
        let mut config = AppConfig::default();
        config.extensions.prefix = "ext-".to_string();
        config.extensions.environment = "production".to_string();

        let opts = loader_options(&config).unwrap();
        assert_eq!(opts.discovery.prefix, "ext-");
        assert_eq!(opts.discovery.deps_dir, "node_modules");
        assert_eq!(opts.environment, Environment::Prod);
        assert_eq!(opts.public_dir, "public");
    }

    #[test]
    fn unknown_environment_rejected() {
        let mut config = AppConfig::default();
        config.extensions.environment = "staging".to_string();
        let err = loader_options(&config).unwrap_err();
        assert!(err.to_string().contains("staging"));
    }

    #[tokio::test]
    async fn compose_serves_host_controllers() {
        use tower::ServiceExt;

        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("conf.json"),
            r#"{"routes": {"public": {"get /status": "app/server/controllers/StatusController.statusAction"}}}"#,
        )
        .unwrap();
        std::fs::create_dir_all(tmp.path().join("node_modules")).unwrap();

        let mut config = AppConfig::default();
        config.core.root_dir = tmp.path().to_string_lossy().to_string();
        config.extensions.root_dir = tmp.path().join("node_modules").to_string_lossy().to_string();

        let app = compose(&config).await.unwrap();
        let response = app
            .router
            .oneshot(
                http::Request::builder()
                    .uri("/status")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
    }
}
