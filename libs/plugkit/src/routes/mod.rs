//! Route declarations: decoding `conf.json` route mappings, resolving handler
//! references and registering the result on routers.

mod action;
mod applier;
mod decoder;
mod resolver;
mod table;

pub use action::{Action, Controller};
pub use applier::{apply_routes, RouteRegistrar};
pub use decoder::{decode_routes, parse_route_key, RouteMethod, RouteRecord, RouteSpec, RouteTarget};
pub use resolver::{ControllerRegistry, ControllerResolver};
pub use table::{to_axum_path, RouteTable};
