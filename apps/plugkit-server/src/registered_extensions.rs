// Controllers the host provides to its own conf.json and to every extension.
// Linked through inventory; `ControllerRegistry::discover()` picks them up.

use axum::Json;
use plugkit::{Controller, ControllerRegistration};
use serde_json::{json, Value};

async fn status() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn status_controller() -> Controller {
    Controller::new()
        .action("statusAction", status)
        .action("versionAction", version)
}

plugkit::inventory::submit! {
    ControllerRegistration {
        scope: None,
        module: "app/server/controllers/StatusController",
        build: status_controller,
    }
}
