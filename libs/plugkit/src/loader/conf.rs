use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Environment;
use crate::contracts::{EntityDeclaration, RouteGroup};
use crate::error::ConfError;
use crate::routes::{decode_routes, ControllerResolver, RouteRecord, RouteSpec};

/// A back-office menu entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuEntry {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_menu: Option<Vec<MenuEntry>>,
    /// Keys the host does not interpret, passed through to the UI.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionGroup {
    pub label: String,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionEntry {
    Group(PermissionGroup),
    Single(Permission),
}

/// `name` and `version` from the package file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageProcessing {
    #[serde(default)]
    images_folders: Option<Vec<String>>,
    #[serde(default)]
    images_style: Option<IndexMap<String, Value>>,
}

/// Everything decoded from one configuration document.
#[derive(Debug, Default)]
pub(crate) struct DecodedConf {
    pub custom: Option<Value>,
    pub web_service_scopes: Option<Value>,
    pub permissions: Option<Vec<PermissionEntry>>,
    pub views_folders: Option<Vec<PathBuf>>,
    pub images_folders: Option<Vec<PathBuf>>,
    pub images_style: Option<IndexMap<String, Value>>,
    pub routes: Option<Vec<RouteRecord>>,
    pub admin_routes: Option<Vec<RouteRecord>>,
    pub web_service_routes: Option<Vec<RouteRecord>>,
    pub entities: Option<Vec<EntityDeclaration>>,
    pub menu: Option<Vec<MenuEntry>>,
    pub script_lib_files: Option<Value>,
    pub script_files: Option<Vec<String>>,
    pub css_files: Option<Vec<String>>,
}

/// Read a JSON object from `path`. A missing file is `Ok(None)`.
pub(crate) async fn read_json_object(path: &Path) -> Result<Option<Map<String, Value>>, ConfError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let value: Value = serde_json::from_slice(&bytes).map_err(|source| ConfError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(ConfError::NotAnObject {
            path: path.to_path_buf(),
        }),
    }
}

pub(crate) async fn read_package(path: &Path) -> Result<Option<PackageMetadata>, ConfError> {
    let Some(doc) = read_json_object(path).await? else {
        return Ok(None);
    };
    serde_json::from_value(Value::Object(doc))
        .map(Some)
        .map_err(|source| ConfError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Decode every known section of `doc`. Sections are independent: a malformed
/// one is logged and left unset.
pub(crate) fn decode_conf(
    base: &Path,
    doc: &Map<String, Value>,
    environment: Environment,
    resolver: &dyn ControllerResolver,
    extension: &str,
) -> DecodedConf {
    let mut out = DecodedConf {
        custom: section(doc, "custom", extension),
        web_service_scopes: section(doc, "webServiceScopes", extension),
        permissions: section(doc, "permissions", extension),
        views_folders: section::<Vec<String>>(doc, "viewsFolders", extension)
            .map(|folders| resolve_all(base, folders)),
        ..Default::default()
    };

    if let Some(images) = section::<ImageProcessing>(doc, "imageProcessing", extension) {
        out.images_folders = images.images_folders.map(|folders| resolve_all(base, folders));
        out.images_style = images.images_style;
    }

    if let Some(routes) = object_section(doc, "routes", extension) {
        for group in RouteGroup::ALL {
            let decoded = section::<RouteSpec>(routes, group.conf_key(), extension)
                .map(|spec| decode_routes(base, &spec, resolver));
            match group {
                RouteGroup::Public => out.routes = decoded,
                RouteGroup::Admin => out.admin_routes = decoded,
                RouteGroup::WebService => out.web_service_routes = decoded,
            }
        }
    }

    out.entities = section::<IndexMap<String, String>>(doc, "entities", extension).map(|entities| {
        entities
            .into_iter()
            .map(|(name, module)| EntityDeclaration {
                name,
                module: base.join(module),
            })
            .collect()
    });

    if let Some(back_office) = object_section(doc, "backOffice", extension) {
        out.menu = section(back_office, "menu", extension);
        out.script_lib_files = section(back_office, "scriptLibFiles", extension);
        out.script_files = object_section(back_office, "scriptFiles", extension)
            .and_then(|by_env| section(by_env, environment.as_str(), extension));
        out.css_files = section(back_office, "cssFiles", extension);
    }

    out
}

/// Deserialize `doc[key]`. Missing or `null` is `None`; malformed is logged.
fn section<T: DeserializeOwned>(doc: &Map<String, Value>, key: &str, extension: &str) -> Option<T> {
    match doc.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(extension, section = key, error = %err, "Ignoring malformed configuration section");
                None
            }
        },
    }
}

fn object_section<'a>(doc: &'a Map<String, Value>, key: &str, extension: &str) -> Option<&'a Map<String, Value>> {
    match doc.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            tracing::warn!(extension, section = key, "Ignoring configuration section that is not an object");
            None
        }
    }
}

fn resolve_all(base: &Path, folders: Vec<String>) -> Vec<PathBuf> {
    folders.into_iter().map(|folder| base.join(folder)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{Controller, ControllerRegistry};
    use serde_json::json;

    async fn noop() {}

    fn doc(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn registry() -> ControllerRegistry {
        let mut reg = ControllerRegistry::default();
        reg.register("controllers/Test", Controller::new().action("index", noop));
        reg
    }

    #[test]
    fn malformed_section_does_not_hide_others() {
        let base = Path::new("/srv/plugkit-example");
        let conf = doc(json!({
            "permissions": "not-a-list",
            "viewsFolders": ["views"],
            "custom": {"answer": 42},
            "backOffice": {
                "menu": [{"label": "Videos", "path": "videos", "weight": 10, "icon": "film"}],
                "scriptFiles": {"dev": ["a.js"], "prod": ["a.min.js"]},
                "cssFiles": 12
            }
        }));

        let decoded = decode_conf(base, &conf, Environment::Prod, &registry(), "example");
        assert!(decoded.permissions.is_none());
        assert_eq!(decoded.views_folders, Some(vec![base.join("views")]));
        assert_eq!(decoded.custom, Some(json!({"answer": 42})));
        assert!(decoded.css_files.is_none());
        assert_eq!(decoded.script_files, Some(vec!["a.min.js".to_string()]));

        let menu = decoded.menu.unwrap();
        assert_eq!(menu[0].weight, Some(10));
        assert_eq!(menu[0].extra.get("icon"), Some(&json!("film")));
    }

    #[test]
    fn absent_sections_stay_unset() {
        let decoded = decode_conf(Path::new("/x"), &doc(json!({})), Environment::Dev, &registry(), "x");
        assert!(decoded.routes.is_none());
        assert!(decoded.menu.is_none());
        assert!(decoded.views_folders.is_none());
        assert!(decoded.entities.is_none());
    }

    #[test]
    fn empty_lists_are_kept() {
        let decoded = decode_conf(
            Path::new("/x"),
            &doc(json!({"viewsFolders": [], "routes": {"public": {}}})),
            Environment::Dev,
            &registry(),
            "x",
        );
        assert_eq!(decoded.views_folders, Some(Vec::new()));
        assert_eq!(decoded.routes.map(|r| r.len()), Some(0));
        assert!(decoded.admin_routes.is_none());
    }

    #[test]
    fn permissions_accept_groups_and_singles() {
        let decoded = decode_conf(
            Path::new("/x"),
            &doc(json!({"permissions": [
                {"label": "Videos", "permissions": [{"id": "video-read", "name": "Read"}]},
                {"id": "video-admin", "paths": ["get /videos*"]}
            ]})),
            Environment::Dev,
            &registry(),
            "x",
        );

        let permissions = decoded.permissions.unwrap();
        assert!(matches!(&permissions[0], PermissionEntry::Group(g) if g.label == "Videos"));
        assert!(matches!(&permissions[1], PermissionEntry::Single(p) if p.id == "video-admin"));
    }

    #[test]
    fn entities_and_images_resolve_against_base() {
        let base = Path::new("/srv/plugkit-example");
        let decoded = decode_conf(
            base,
            &doc(json!({
                "entities": {"video": "app/server/models/VideoModel"},
                "imageProcessing": {
                    "imagesFolders": ["assets/images"],
                    "imagesStyle": {"thumb": "thumb_200"}
                }
            })),
            Environment::Dev,
            &registry(),
            "example",
        );

        assert_eq!(
            decoded.entities,
            Some(vec![EntityDeclaration {
                name: "video".into(),
                module: base.join("app/server/models/VideoModel"),
            }])
        );
        assert_eq!(decoded.images_folders, Some(vec![base.join("assets/images")]));
        assert_eq!(decoded.images_style.unwrap()["thumb"], json!("thumb_200"));
    }

    #[tokio::test]
    async fn read_json_object_distinguishes_missing_and_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(read_json_object(&tmp.path().join("conf.json")).await.unwrap().is_none());

        let broken = tmp.path().join("broken.json");
        tokio::fs::write(&broken, b"{ not json").await.unwrap();
        assert!(matches!(
            read_json_object(&broken).await,
            Err(ConfError::Parse { .. })
        ));

        let list = tmp.path().join("list.json");
        tokio::fs::write(&list, b"[1, 2]").await.unwrap();
        assert!(matches!(
            read_json_object(&list).await,
            Err(ConfError::NotAnObject { .. })
        ));
    }
}
