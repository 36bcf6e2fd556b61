use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use http::header::{HeaderValue, CACHE_CONTROL};
use http::{Method, StatusCode};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::config::Environment;

const STATIC_CACHE_CONTROL: &str = "public, max-age=86400";

/// Unbundled client scripts, served from the source tree in dev mode only.
const CORE_DEV_SCRIPTS: &str = "app/client/admin/js";
const EXTENSION_DEV_SCRIPTS: [&str; 2] = ["app/client/front/js", "app/client/admin/js"];

type FallbackFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Ordered roots for [`static_fallback`].
///
/// The core public directory comes first, then each extension public
/// directory in mount order. In [`Environment::Dev`] the core root's admin
/// scripts follow the core public directory, and every extension public
/// directory is followed by the front and admin scripts next to it.
pub fn static_roots(
    core_public: Option<&Path>,
    core_root: Option<&Path>,
    extension_publics: &[PathBuf],
    environment: Environment,
) -> Vec<PathBuf> {
    let dev = environment == Environment::Dev;
    let mut roots = Vec::new();

    roots.extend(core_public.map(Path::to_path_buf));
    if dev {
        roots.extend(core_root.map(|root| root.join(CORE_DEV_SCRIPTS)));
    }

    for public in extension_publics {
        roots.push(public.clone());
        if !dev {
            continue;
        }
        if let Some(ext_root) = public.parent() {
            roots.extend(EXTENSION_DEV_SCRIPTS.iter().map(|dir| ext_root.join(dir)));
        }
    }
    roots
}

/// Router fallback serving files from `roots`, first root that has the file wins.
pub fn static_fallback(
    roots: Vec<PathBuf>,
) -> impl Fn(Request) -> FallbackFuture + Clone + Send + Sync + 'static {
    let roots: Arc<[PathBuf]> = roots.into();
    move |req: Request| {
        let roots = roots.clone();
        Box::pin(async move { serve_from(&roots, req).await })
    }
}

async fn serve_from(roots: &[PathBuf], req: Request) -> Response {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return StatusCode::NOT_FOUND.into_response();
    }
    let (parts, _body) = req.into_parts();

    for root in roots {
        let attempt = Request::from_parts(parts.clone(), Body::empty());
        let resp = match ServeDir::new(root).oneshot(attempt).await {
            Ok(resp) => resp,
            Err(never) => match never {},
        };
        if resp.status() == StatusCode::NOT_FOUND {
            continue;
        }

        let mut resp = resp.map(Body::new);
        if resp.status().is_success() {
            resp.headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static(STATIC_CACHE_CONTROL));
        }
        return resp;
    }

    StatusCode::NOT_FOUND.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn get(uri: &str) -> Request {
        http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn earlier_root_shadows_later_one() {
        let core = tempfile::tempdir().unwrap();
        let ext = tempfile::tempdir().unwrap();
        fs::write(core.path().join("app.js"), "core").unwrap();
        fs::write(ext.path().join("app.js"), "extension").unwrap();
        fs::write(ext.path().join("only.js"), "only").unwrap();

        let fallback = static_fallback(vec![core.path().to_path_buf(), ext.path().to_path_buf()]);

        let resp = fallback(get("/app.js")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(CACHE_CONTROL).unwrap(),
            STATIC_CACHE_CONTROL
        );
        assert_eq!(text(resp).await, "core");
        assert_eq!(text(fallback(get("/only.js")).await).await, "only");
        assert_eq!(fallback(get("/missing.js")).await.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn dev_roots_follow_their_public_directory() {
        let core_public = Path::new("/srv/app/public");
        let core_root = Path::new("/srv/app");
        let publics = vec![
            PathBuf::from("/srv/ext/plugkit-a/public"),
            PathBuf::from("/srv/ext/plugkit-b/public"),
        ];

        let dev = static_roots(Some(core_public), Some(core_root), &publics, Environment::Dev);
        let expected: Vec<PathBuf> = [
            "/srv/app/public",
            "/srv/app/app/client/admin/js",
            "/srv/ext/plugkit-a/public",
            "/srv/ext/plugkit-a/app/client/front/js",
            "/srv/ext/plugkit-a/app/client/admin/js",
            "/srv/ext/plugkit-b/public",
            "/srv/ext/plugkit-b/app/client/front/js",
            "/srv/ext/plugkit-b/app/client/admin/js",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();
        assert_eq!(dev, expected);

        let prod = static_roots(Some(core_public), Some(core_root), &publics, Environment::Prod);
        assert_eq!(prod, vec![core_public.to_path_buf(), publics[0].clone(), publics[1].clone()]);
    }

    #[tokio::test]
    async fn dev_mode_serves_client_scripts_next_to_public() {
        let ext = tempfile::tempdir().unwrap();
        let public = ext.path().join("public");
        fs::create_dir_all(&public).unwrap();
        fs::create_dir_all(ext.path().join("app/client/admin/js")).unwrap();
        fs::write(ext.path().join("app/client/admin/js/admin.js"), "admin").unwrap();

        let publics = vec![public];
        let dev = static_fallback(static_roots(None, None, &publics, Environment::Dev));
        assert_eq!(text(dev(get("/admin.js")).await).await, "admin");

        let prod = static_fallback(static_roots(None, None, &publics, Environment::Prod));
        assert_eq!(prod(get("/admin.js")).await.status(), StatusCode::NOT_FOUND);
    }
}
