use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::Controller;
use crate::error::ResolveError;
use crate::registry::ControllerRegistration;

/// Resolves the module half of a `module.action` reference.
pub trait ControllerResolver: Send + Sync {
    /// `base_path` is the root directory of the extension declaring the route.
    fn resolve(&self, base_path: &Path, module: &str) -> Result<Arc<Controller>, ResolveError>;

    /// Resolve `module` and pick `action` from it.
    fn resolve_action(
        &self,
        base_path: &Path,
        module: &str,
        action: &str,
    ) -> Result<super::Action, ResolveError> {
        let controller = self.resolve(base_path, module)?;
        controller
            .get(action)
            .cloned()
            .ok_or_else(|| ResolveError::ActionNotFound {
                module: module.to_string(),
                action: action.to_string(),
            })
    }
}

/// In-memory controller modules, optionally scoped to one extension.
///
/// The scope of a lookup is the logical name of `base_path`'s directory, so
/// `controllers/Test` declared by `plugkit-example` first matches the entry
/// registered for scope `example`, then the unscoped one.
#[derive(Debug, Clone)]
pub struct ControllerRegistry {
    prefix: String,
    scoped: HashMap<(String, String), Arc<Controller>>,
    global: HashMap<String, Arc<Controller>>,
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self::new(crate::DiscoveryOptions::default().prefix)
    }
}

impl ControllerRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            scoped: HashMap::new(),
            global: HashMap::new(),
        }
    }

    /// Collect every [`ControllerRegistration`] linked into the binary.
    pub fn discover() -> Self {
        Self::default().with_registrations()
    }

    /// Like [`discover`](Self::discover) but with a non-default extension prefix.
    pub fn discover_with_prefix(prefix: impl Into<String>) -> Self {
        Self::new(prefix).with_registrations()
    }

    fn with_registrations(mut self) -> Self {
        for reg in ::inventory::iter::<ControllerRegistration> {
            let controller = (reg.build)();
            match reg.scope {
                Some(scope) => self.register_scoped(scope, reg.module, controller),
                None => self.register(reg.module, controller),
            };
        }
        tracing::debug!(
            scoped = self.scoped.len(),
            global = self.global.len(),
            "Controller registry discovered"
        );
        self
    }

    /// Register a controller visible to every extension.
    pub fn register(&mut self, module: &str, controller: Controller) -> &mut Self {
        let key = normalize_module(module);
        if self.global.insert(key, Arc::new(controller)).is_some() {
            tracing::warn!(module, "Controller module registered twice; keeping the last one");
        }
        self
    }

    /// Register a controller visible only to the extension named `scope`.
    pub fn register_scoped(&mut self, scope: &str, module: &str, controller: Controller) -> &mut Self {
        let key = (scope.to_string(), normalize_module(module));
        if self.scoped.insert(key, Arc::new(controller)).is_some() {
            tracing::warn!(scope, module, "Scoped controller module registered twice; keeping the last one");
        }
        self
    }

    fn scope_of(&self, base_path: &Path) -> Option<String> {
        let dir_name = base_path.file_name()?.to_str()?;
        Some(
            dir_name
                .strip_prefix(self.prefix.as_str())
                .unwrap_or(dir_name)
                .to_string(),
        )
    }
}

impl ControllerResolver for ControllerRegistry {
    fn resolve(&self, base_path: &Path, module: &str) -> Result<Arc<Controller>, ResolveError> {
        let key = normalize_module(module);
        if let Some(scope) = self.scope_of(base_path) {
            if let Some(found) = self.scoped.get(&(scope, key.clone())) {
                return Ok(found.clone());
            }
        }
        self.global
            .get(&key)
            .cloned()
            .ok_or_else(|| ResolveError::ModuleNotFound {
                module: module.to_string(),
            })
    }
}

/// `./controllers\Test.js` and `controllers/Test` name the same module.
fn normalize_module(module: &str) -> String {
    let mut m = module.trim().replace('\\', "/");
    while let Some(rest) = m.strip_prefix("./") {
        m = rest.to_string();
    }
    for ext in [".js", ".rs"] {
        if let Some(stem) = m.strip_suffix(ext) {
            m = stem.to_string();
            break;
        }
    }
    m.trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn scoped() -> &'static str {
        "scoped"
    }

    async fn global() -> &'static str {
        "global"
    }

    #[test]
    fn normalizes_module_paths() {
        assert_eq!(normalize_module("./controllers/Test.js"), "controllers/Test");
        assert_eq!(normalize_module("controllers\\Test"), "controllers/Test");
        assert_eq!(normalize_module("/app/server/Ctrl.rs"), "app/server/Ctrl");
    }

    #[test]
    fn scoped_entry_shadows_global_one() {
        let mut reg = ControllerRegistry::default();
        reg.register("controllers/Test", Controller::new().action("get", global));
        reg.register_scoped("example", "controllers/Test", Controller::new().action("get", scoped));

        let base = Path::new("/srv/node_modules/plugkit-example");
        let scoped_action = reg.resolve_action(base, "controllers/Test", "get").unwrap();
        let other = reg
            .resolve_action(Path::new("/srv/node_modules/plugkit-other"), "controllers/Test", "get")
            .unwrap();
        assert!(!scoped_action.same_handler(&other));
        assert!(reg.resolve(base, "./controllers/Test.js").is_ok());
    }

    #[test]
    fn missing_module_and_action_are_distinct_errors() {
        let mut reg = ControllerRegistry::default();
        reg.register("controllers/Test", Controller::new().action("get", global));
        let base = Path::new("/srv/plugkit-example");

        assert_eq!(
            reg.resolve_action(base, "controllers/Nope", "get").unwrap_err(),
            ResolveError::ModuleNotFound {
                module: "controllers/Nope".into()
            }
        );
        assert_eq!(
            reg.resolve_action(base, "controllers/Test", "post").unwrap_err(),
            ResolveError::ActionNotFound {
                module: "controllers/Test".into(),
                action: "post".into()
            }
        );
    }
}
