use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::contracts::{Extension, ExtensionContext, EXTENSION_API_VERSION};
use crate::error::{panic_message, ExtensionLoadError};
use crate::routes::Controller;

/// Builds the main object of one extension.
pub type ExtensionFactory =
    Arc<dyn Fn(&ExtensionContext) -> anyhow::Result<Box<dyn Extension>> + Send + Sync>;

/// Link-time registration of an extension main module, keyed by logical name.
///
/// ```rust,ignore
/// plugkit::inventory::submit! {
///     plugkit::ExtensionRegistration {
///         name: "example",
///         factory: |_ctx| Ok(Box::new(Example::default())),
///     }
/// }
/// ```
pub struct ExtensionRegistration {
    pub name: &'static str,
    pub factory: fn(&ExtensionContext) -> anyhow::Result<Box<dyn Extension>>,
}

inventory::collect!(ExtensionRegistration);

/// Link-time registration of a controller module.
///
/// `scope` is the logical name of the extension owning the module; `None`
/// makes the controller visible to every extension and to the host.
pub struct ControllerRegistration {
    pub scope: Option<&'static str>,
    pub module: &'static str,
    pub build: fn() -> Controller,
}

inventory::collect!(ControllerRegistration);

/// Main-module factories known to the host, keyed by extension logical name.
#[derive(Default, Clone)]
pub struct ExtensionCatalog {
    factories: HashMap<String, ExtensionFactory>,
}

impl std::fmt::Debug for ExtensionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ExtensionCatalog")
            .field("extensions", &names)
            .finish()
    }
}

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every [`ExtensionRegistration`] linked into the binary.
    pub fn discover() -> Self {
        let mut catalog = Self::default();
        for reg in ::inventory::iter::<ExtensionRegistration> {
            let factory = reg.factory;
            if let Err(err) = catalog.register(reg.name, move |ctx: &ExtensionContext| factory(ctx)) {
                tracing::error!(extension = reg.name, error = %err, "Ignoring duplicate extension registration");
            }
        }
        tracing::debug!(count = catalog.len(), "Extension catalog discovered");
        catalog
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), ExtensionLoadError>
    where
        F: Fn(&ExtensionContext) -> anyhow::Result<Box<dyn Extension>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(ExtensionLoadError::DuplicateRegistration(name));
        }
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    pub fn has_main(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Run the factory registered for `ctx.name`.
    ///
    /// `Ok(None)` means the extension has no main module. Errors, panics and
    /// api version mismatches are reported as [`ExtensionLoadError`].
    pub fn instantiate(
        &self,
        ctx: &ExtensionContext,
    ) -> Result<Option<Box<dyn Extension>>, ExtensionLoadError> {
        let Some(factory) = self.factories.get(&ctx.name) else {
            return Ok(None);
        };

        let instance = match catch_unwind(AssertUnwindSafe(|| factory(ctx))) {
            Ok(Ok(instance)) => instance,
            Ok(Err(source)) => {
                return Err(ExtensionLoadError::Factory {
                    extension: ctx.name.clone(),
                    source,
                })
            }
            Err(payload) => {
                return Err(ExtensionLoadError::Panicked {
                    extension: ctx.name.clone(),
                    message: panic_message(payload.as_ref()),
                })
            }
        };

        let found = instance.api_version();
        if found != EXTENSION_API_VERSION {
            return Err(ExtensionLoadError::ApiVersionMismatch {
                extension: ctx.name.clone(),
                expected: EXTENSION_API_VERSION,
                found,
            });
        }
        Ok(Some(instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Dummy {
        version: u32,
    }

    #[async_trait::async_trait]
    impl Extension for Dummy {
        fn api_version(&self) -> u32 {
            self.version
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn ctx(name: &str) -> ExtensionContext {
        ExtensionContext {
            name: name.to_string(),
            path: PathBuf::from("/tmp").join(name),
            mount_path: format!("/{name}"),
        }
    }

    #[test]
    fn missing_factory_means_no_instance() {
        let catalog = ExtensionCatalog::new();
        assert!(catalog.instantiate(&ctx("example")).unwrap().is_none());
    }

    #[test]
    fn conformant_factory_yields_instance() {
        let mut catalog = ExtensionCatalog::new();
        catalog
            .register("example", |_ctx: &ExtensionContext| {
                Ok(Box::new(Dummy { version: EXTENSION_API_VERSION }) as Box<dyn Extension>)
            })
            .unwrap();

        let instance = catalog.instantiate(&ctx("example")).unwrap().unwrap();
        assert!(instance.as_any().downcast_ref::<Dummy>().is_some());
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut catalog = ExtensionCatalog::new();
        let factory = |_ctx: &ExtensionContext| {
            Ok(Box::new(Dummy { version: EXTENSION_API_VERSION }) as Box<dyn Extension>)
        };
        catalog.register("example", factory).unwrap();
        let err = catalog.register("example", factory).unwrap_err();
        match err {
            ExtensionLoadError::DuplicateRegistration(name) => assert_eq!(name, "example"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn version_mismatch_rejected() {
        let mut catalog = ExtensionCatalog::new();
        catalog
            .register("old", |_ctx: &ExtensionContext| {
                Ok(Box::new(Dummy { version: 0 }) as Box<dyn Extension>)
            })
            .unwrap();

        match catalog.instantiate(&ctx("old")) {
            Err(ExtensionLoadError::ApiVersionMismatch { found, expected, .. }) => {
                assert_eq!(found, 0);
                assert_eq!(expected, EXTENSION_API_VERSION);
            }
            other => panic!("expected ApiVersionMismatch, got: {:?}", other.map(|o| o.is_some())),
        }
    }

    #[test]
    fn panicking_factory_is_caught() {
        let mut catalog = ExtensionCatalog::new();
        catalog
            .register("broken", |_ctx: &ExtensionContext| -> anyhow::Result<Box<dyn Extension>> {
                panic!("constructor exploded")
            })
            .unwrap();

        match catalog.instantiate(&ctx("broken")) {
            Err(ExtensionLoadError::Panicked { extension, message }) => {
                assert_eq!(extension, "broken");
                assert!(message.contains("constructor exploded"));
            }
            other => panic!("expected Panicked, got: {:?}", other.map(|o| o.is_some())),
        }
    }

    #[test]
    fn failing_factory_reports_source() {
        let mut catalog = ExtensionCatalog::new();
        catalog
            .register("failing", |_ctx: &ExtensionContext| -> anyhow::Result<Box<dyn Extension>> {
                anyhow::bail!("missing dependency")
            })
            .unwrap();

        let err = catalog.instantiate(&ctx("failing")).err().unwrap();
        assert!(matches!(err, ExtensionLoadError::Factory { .. }));
        assert_eq!(err.to_string(), "factory for extension 'failing' failed");
    }
}
