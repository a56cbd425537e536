//! Bundled single-page UI.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Empty};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tracing::warn;

use super::body::{empty, BoxError, GatewayBody};

/// Entry document served for every path that is not an asset.
pub const INDEX_FILE: &str = "index.html";

/// Serves assets by exact path and falls back to the entry document.
#[derive(Clone)]
pub struct StaticUi {
    root: Option<PathBuf>,
    dir: Option<ServeDir<ServeFile>>,
}

impl StaticUi {
    /// UI served from `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let dir = ServeDir::new(&root).fallback(ServeFile::new(root.join(INDEX_FILE)));
        Self {
            root: Some(root),
            dir: Some(dir),
        }
    }

    /// No UI; every static request is answered with 404.
    pub fn disabled() -> Self {
        Self {
            root: None,
            dir: None,
        }
    }

    /// Directory assets are served from.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Serve a GET or HEAD request.
    pub async fn serve<B>(self, request: Request<B>) -> Response<GatewayBody> {
        let Some(dir) = self.dir else {
            return not_found();
        };
        let request = request.map(|_| Empty::<Bytes>::new());
        match dir.oneshot(request).await {
            Ok(response) => response.map(|body| body.map_err(BoxError::from).boxed_unsync()),
            Err(e) => {
                warn!(error = %e, "Failed to serve UI asset");
                let mut response = Response::new(empty());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}

fn not_found() -> Response<GatewayBody> {
    let mut response = Response::new(empty());
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}
