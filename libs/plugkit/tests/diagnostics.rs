//! Skipped routes and broken main modules leave a log line behind.

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use plugkit::{
    decode_routes, load_extension, Controller, ControllerRegistry, Extension, ExtensionCatalog,
    ExtensionContext, ExtensionPath, LoaderContext, LoaderOptions, RouteSpec,
};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Captured;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn subscriber(out: &Captured) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_writer(out.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish()
}

async fn index() -> &'static str {
    "index"
}

#[test]
fn skipped_route_entries_are_logged() {
    let mut registry = ControllerRegistry::default();
    registry.register("controllers/Test", Controller::new().action("index", index));
    let spec: RouteSpec = serde_json::from_str(
        r#"{
            "patch /x": "controllers/Test.index",
            "get /y": "controllersTest",
            "get /ok": "controllers/Test.index"
        }"#,
    )
    .unwrap();

    let out = Captured::default();
    let records = tracing::subscriber::with_default(subscriber(&out), || {
        decode_routes(Path::new("/srv/plugkit-example"), &spec, &registry)
    });
    assert_eq!(records.len(), 1);

    let logs = out.text();
    assert!(logs.contains("WARN"), "{logs}");
    assert!(logs.contains("Skipping invalid route key"), "{logs}");
    assert!(logs.contains("patch /x"), "{logs}");
    assert!(logs.contains("Skipping unresolvable route action"), "{logs}");
    assert!(logs.contains("controllersTest"), "{logs}");
    assert!(!logs.contains("get /ok"), "{logs}");
}

#[tokio::test]
async fn broken_main_module_is_logged_as_error() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("plugkit-broken");
    std::fs::create_dir_all(&dir).unwrap();

    let mut catalog = ExtensionCatalog::new();
    catalog
        .register("broken", |_ctx: &ExtensionContext| -> anyhow::Result<Box<dyn Extension>> {
            panic!("cannot construct")
        })
        .unwrap();
    let ctx = LoaderContext::new(
        LoaderOptions::default(),
        Arc::new(catalog),
        Arc::new(ControllerRegistry::default()),
    );
    let candidate = ExtensionPath::top_level(&dir, "broken");

    let out = Captured::default();
    let _guard = tracing::subscriber::set_default(subscriber(&out));
    let descriptor = load_extension(&ctx, &candidate).await;
    assert!(!descriptor.has_instance());

    let logs = out.text();
    assert!(logs.contains("ERROR"), "{logs}");
    assert!(logs.contains("Error while loading extension main module"), "{logs}");
    assert!(logs.contains("cannot construct"), "{logs}");
    assert!(logs.contains("broken"), "{logs}");
}
