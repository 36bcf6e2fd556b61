use crate::config::{LoggingConfig, Section};
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use parking_lot::Mutex;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

// Keeps the non-blocking console worker alive for the whole process.
static CONSOLE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;

/// `None` means "not configured", letting the caller pick the fallback.
fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warn" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        "off" | "none" => Some(LevelFilter::OFF),
        _ => None,
    }
}

/// True if `target` is `prefix` itself or a module below it.
fn target_matches(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

// ================= rotating file sinks =================

type SharedRotator = Arc<Mutex<FileRotate<AppendTimestamp>>>;

struct RoutedWriter(Option<SharedRotator>);

impl Write for RoutedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.0 {
            Some(file) => file.lock().write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.0 {
            Some(file) => file.lock().flush(),
            None => Ok(()),
        }
    }
}

/// Picks a log file by event target; the longest matching subsystem prefix wins.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<SharedRotator>,
    by_prefix: Vec<(String, SharedRotator)>,
}

impl FileRouter {
    fn resolve(&self, target: &str) -> Option<SharedRotator> {
        self.by_prefix
            .iter()
            .find(|(prefix, _)| target_matches(target, prefix))
            .map(|(_, file)| file.clone())
            .or_else(|| self.default.clone())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_prefix.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = RoutedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RoutedWriter(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        RoutedWriter(self.resolve(meta.target()))
    }
}

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn open_rotator(section: &Section, base_dir: &Path) -> std::io::Result<Option<SharedRotator>> {
    if section.file.trim().is_empty() {
        return Ok(None);
    }

    let log_path = resolve_log_path(&section.file, base_dir);
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // An explicit backup count takes precedence over the age limit.
    let limit = match section.max_backups {
        Some(n) => FileLimit::MaxFiles(n),
        None => FileLimit::Age(chrono::Duration::days(i64::from(section.max_age_days.unwrap_or(1)))),
    };
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) as usize * 1024 * 1024;

    let rotator = FileRotate::new(
        &log_path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        None,
    );
    Ok(Some(Arc::new(Mutex::new(rotator))))
}

fn build_file_router(cfg: &LoggingConfig, base_dir: &Path) -> FileRouter {
    let mut router = FileRouter::default();

    for (name, section) in cfg {
        let rotator = match open_rotator(section, base_dir) {
            Ok(Some(rotator)) => rotator,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("Failed to open log file '{}' for subsystem '{name}': {e}", section.file);
                continue;
            }
        };
        if name == DEFAULT_SECTION {
            router.default = Some(rotator);
        } else {
            router.by_prefix.push((name.clone(), rotator));
        }
    }

    router.by_prefix.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    router
}

// ================= per-sink level targets =================

#[derive(Clone, Copy)]
enum Sink {
    Console,
    File { has_default_file: bool },
}

fn build_targets(cfg: &LoggingConfig, sink: Sink) -> Targets {
    let level_of = |section: &Section| match sink {
        Sink::Console => parse_level(&section.console_level),
        Sink::File { .. } => parse_level(&section.file_level),
    };

    let fallback = match sink {
        Sink::Console => LevelFilter::INFO,
        Sink::File { has_default_file: true } => LevelFilter::INFO,
        Sink::File { has_default_file: false } => LevelFilter::OFF,
    };
    let default_level = cfg.get(DEFAULT_SECTION).and_then(level_of).unwrap_or(fallback);

    let mut targets = Targets::new().with_default(default_level);
    for (name, section) in cfg {
        if name == DEFAULT_SECTION {
            continue;
        }
        // A subsystem writes to a file only when it names one.
        if matches!(sink, Sink::File { .. }) && section.file.trim().is_empty() {
            continue;
        }
        if let Some(level) = level_of(section) {
            targets = targets.with_target(name.clone(), level);
        }
    }
    targets
}

// ================= public init =================

/// Install the global subscriber: human-readable console output plus JSON
/// files routed per subsystem. `RUST_LOG`, when set, caps both sinks.
///
/// Relative log file paths are resolved against `base_dir`.
pub fn init_logging_unified(cfg: &LoggingConfig, base_dir: &Path) {
    // Bridge `log` → `tracing` *before* installing the subscriber
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    if cfg.is_empty() {
        init_minimal();
        return;
    }

    let file_router = build_file_router(cfg, base_dir);
    let console_targets = build_targets(cfg, Sink::Console);
    let file_targets = build_targets(
        cfg,
        Sink::File {
            has_default_file: file_router.default.is_some(),
        },
    );

    let env = EnvFilter::try_from_default_env().ok();

    let (nb_stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = CONSOLE_GUARD.set(guard);

    let console_layer = fmt::layer()
        .with_writer(nb_stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console_targets);

    let file_layer = (!file_router.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(file_router)
            .with_filter(file_targets)
    });

    let _ = Registry::default()
        .with(env)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

fn init_minimal() {
    let env = EnvFilter::try_from_default_env().ok();
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let _ = Registry::default().with(env).with(fmt_layer).try_init();
}
