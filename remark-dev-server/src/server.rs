//! HTTP responder over the mirror plus the hot-reload socket endpoint.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use remark_core::{MemFs, TemplateRenderer, memfs::normalize};
use tracing::{debug, info};

use crate::clients::ClientRegistry;

pub const HOT_RELOAD_PATH: &str = "/hot-reload";
const ROOT_DOCUMENT: &str = "/index.html";
const HOT_RELOAD_SCRIPT: &str = include_str!("../assets/hot-reload.html");

#[derive(Clone)]
pub(crate) struct AppState {
    mirror: MemFs,
    clients: ClientRegistry,
    out_dir: PathBuf,
    reload_script: Arc<str>,
}

impl AppState {
    pub(crate) fn new(mirror: MemFs, clients: ClientRegistry, out_dir: &Path, port: u16) -> Self {
        Self {
            mirror,
            clients,
            out_dir: normalize(out_dir),
            reload_script: hot_reload_script(port).into(),
        }
    }
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route(HOT_RELOAD_PATH, get(websocket_handler))
        .fallback(serve_mirror)
        .with_state(state)
}

/// The `<script>` block appended to the root document.
pub fn hot_reload_script(port: u16) -> String {
    let mut renderer = TemplateRenderer::new();
    renderer.add_to_context("PORT", port.to_string());
    renderer.render(HOT_RELOAD_SCRIPT.trim_end())
}

/// Strip query and fragment, force a leading slash, and map the root to
/// `/index.html`.
pub fn normalize_request_path(raw: &str) -> String {
    let path = raw.split(['?', '#']).next().unwrap_or_default();
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    if path == "/" {
        ROOT_DOCUMENT.to_string()
    } else {
        path
    }
}

/// Where `request_path` lives in the mirror, if it stays inside `out_dir`.
fn resolve(out_dir: &Path, request_path: &str) -> Option<PathBuf> {
    let resolved = normalize(&out_dir.join(request_path.trim_start_matches('/')));
    (resolved.starts_with(out_dir) && resolved != out_dir).then_some(resolved)
}

pub fn content_type(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "md" => "text/markdown",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "pdf" => "application/pdf",
        _ => "text/plain",
    }
}

async fn serve_mirror(State(state): State<AppState>, uri: Uri) -> Response {
    let raw = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let request_path = normalize_request_path(raw);

    let Some(mut body) = resolve(&state.out_dir, &request_path).and_then(|file| state.mirror.get(file))
    else {
        debug!(path = %request_path, "not in mirror");
        return StatusCode::NOT_FOUND.into_response();
    };

    if request_path == ROOT_DOCUMENT {
        body.push(b'\n');
        body.extend_from_slice(state.reload_script.as_bytes());
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type(&request_path).to_string()),
            (header::CONTENT_LENGTH, body.len().to_string()),
        ],
        body,
    )
        .into_response()
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_connection(socket, state.clients))
}

async fn websocket_connection(mut socket: WebSocket, clients: ClientRegistry) {
    let (id, mut updates) = clients.register();
    info!(client = id, "hot reload client connected");

    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Some(update) => {
                        if socket.send(Message::Text(update.into())).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    clients.unregister(id);
    info!(client = id, "hot reload client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> (Router, MemFs) {
        let mirror = MemFs::new();
        mirror.write_file("docs/index.html", b"<html>deck</html>").unwrap();
        mirror.write_file("docs/styles.css", b"body { color: red; }").unwrap();
        mirror.write_file("docs/img/logo.png", &[137, 80, 78, 71]).unwrap();
        mirror.write_file("src/secret.md", b"hidden").unwrap();

        let state = AppState::new(mirror.clone(), ClientRegistry::new(), Path::new("./docs"), 31337);
        (router(state), mirror)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>, Option<String>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let header_value = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .map(|v| v.to_str().unwrap().to_string())
        };
        let content_type = header_value(header::CONTENT_TYPE);
        let content_length = header_value(header::CONTENT_LENGTH);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();
        (status, content_type, body, content_length)
    }

    #[test]
    fn test_normalize_request_path() {
        assert_eq!(normalize_request_path(""), "/index.html");
        assert_eq!(normalize_request_path("/"), "/index.html");
        assert_eq!(normalize_request_path("/?x=1"), "/index.html");
        assert_eq!(normalize_request_path("styles.css"), "/styles.css");
        assert_eq!(normalize_request_path("/styles.css?reload=123"), "/styles.css");
        assert_eq!(normalize_request_path("/a/b.js#frag"), "/a/b.js");
    }

    #[test]
    fn test_resolve_stays_inside_out_dir() {
        let out = Path::new("docs");
        assert_eq!(resolve(out, "/index.html"), Some(PathBuf::from("docs/index.html")));
        assert_eq!(resolve(out, "/../src/secret.md"), None);
        assert_eq!(resolve(out, "/.."), None);
    }

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type("/index.html"), "text/html");
        assert_eq!(content_type("/styles.CSS"), "text/css");
        assert_eq!(content_type("/remark-init-script.js"), "application/javascript");
        assert_eq!(content_type("/fonts/a.woff2"), "font/woff2");
        assert_eq!(content_type("/LICENSE"), "text/plain");
        assert_eq!(content_type("/notes.xyz"), "text/plain");
    }

    #[test]
    fn test_hot_reload_script_uses_port() {
        let script = hot_reload_script(4000);
        assert!(script.starts_with("<script>"));
        assert!(script.ends_with("</script>"));
        assert!(script.contains(":4000/hot-reload"));
        assert!(!script.contains("{{PORT}}"));
    }

    #[tokio::test]
    async fn test_root_and_index_are_the_same_document() {
        let (app, _) = app();
        let root = get(app.clone(), "/").await;
        let index = get(app, "/index.html").await;

        assert_eq!(root.0, StatusCode::OK);
        assert_eq!(root.2, index.2);
        assert_eq!(root.1.as_deref(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_root_document_gets_reload_script() {
        let (app, mirror) = app();
        let (_, _, body, length) = get(app, "/index.html").await;
        let body = String::from_utf8(body).unwrap();

        assert!(body.starts_with("<html>deck</html>\n<script>"));
        assert!(body.contains("ws://"));
        assert_eq!(length, Some(body.len().to_string()));
        // the stored copy is untouched
        assert_eq!(mirror.get("docs/index.html").unwrap(), b"<html>deck</html>");
    }

    #[tokio::test]
    async fn test_mirror_round_trip() {
        let (app, mirror) = app();
        mirror.write_file("docs/notes.txt", b"fresh bytes").unwrap();

        let (status, content_type, body, length) = get(app.clone(), "/notes.txt?cache=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("text/plain"));
        assert_eq!(body, b"fresh bytes");
        assert_eq!(length, Some("11".to_string()));

        let (_, content_type, body, _) = get(app, "/img/logo.png").await;
        assert_eq!(content_type.as_deref(), Some("image/png"));
        assert_eq!(body, vec![137, 80, 78, 71]);
    }

    #[tokio::test]
    async fn test_missing_path_is_empty_404() {
        let (app, _) = app();
        let (status, _, body, _) = get(app, "/nope.js").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_directory_is_not_served() {
        let (app, _) = app();
        let (status, _, _, _) = get(app, "/img").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
