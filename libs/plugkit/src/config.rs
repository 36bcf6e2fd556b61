use serde::{Deserialize, Serialize};

/// Naming conventions used while walking an extension tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryOptions {
    /// Directory-name prefix marking an extension, e.g. `plugkit-example`.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Nested dependency directory looked up inside every extension.
    #[serde(default = "default_deps_dir")]
    pub deps_dir: String,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            deps_dir: default_deps_dir(),
        }
    }
}

impl DiscoveryOptions {
    /// Strip the extension prefix from a directory name.
    ///
    /// Returns `None` when the name does not carry the prefix or nothing is left after it.
    pub fn logical_name<'a>(&self, dir_name: &'a str) -> Option<&'a str> {
        dir_name
            .strip_prefix(self.prefix.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// Environment used to select back-office script manifests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }

    /// Parse `dev`/`development` and `prod`/`production`, case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Some(Environment::Dev),
            "prod" | "production" => Some(Environment::Prod),
            _ => None,
        }
    }
}

/// Everything the loaders need to know about the on-disk layout of an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderOptions {
    #[serde(flatten)]
    pub discovery: DiscoveryOptions,
    #[serde(default = "default_conf_file")]
    pub conf_file: String,
    #[serde(default = "default_package_file")]
    pub package_file: String,
    #[serde(default = "default_public_dir")]
    pub public_dir: String,
    #[serde(default = "default_i18n_dir")]
    pub i18n_dir: String,
    #[serde(default)]
    pub environment: Environment,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            discovery: DiscoveryOptions::default(),
            conf_file: default_conf_file(),
            package_file: default_package_file(),
            public_dir: default_public_dir(),
            i18n_dir: default_i18n_dir(),
            environment: Environment::default(),
        }
    }
}

fn default_prefix() -> String {
    "plugkit-".to_string()
}

fn default_deps_dir() -> String {
    "node_modules".to_string()
}

fn default_conf_file() -> String {
    "conf.json".to_string()
}

fn default_package_file() -> String {
    "package.json".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

fn default_i18n_dir() -> String {
    "i18n".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_name_strips_prefix() {
        let opts = DiscoveryOptions::default();
        assert_eq!(opts.logical_name("plugkit-example"), Some("example"));
        assert_eq!(opts.logical_name("plugkit-"), None);
        assert_eq!(opts.logical_name("example"), None);
    }

    #[test]
    fn environment_parse_accepts_long_forms() {
        assert_eq!(Environment::parse("Production"), Some(Environment::Prod));
        assert_eq!(Environment::parse("dev"), Some(Environment::Dev));
        assert_eq!(Environment::parse("staging"), None);
    }

    #[test]
    fn loader_options_fill_defaults() {
        let opts: LoaderOptions = serde_json::from_str(r#"{"prefix": "ext-"}"#).unwrap();
        assert_eq!(opts.discovery.prefix, "ext-");
        assert_eq!(opts.discovery.deps_dir, "node_modules");
        assert_eq!(opts.conf_file, "conf.json");
        assert_eq!(opts.environment, Environment::Dev);
    }
}
