//! Path resolution and content serving.
//!
//! # Responsibilities
//! - Resolve request paths against the static root (directory indexes,
//!   `.tpl`/`.html` suffix fallback)
//! - Serve static bytes through the file cache
//! - Render `.tpl` pages with the per-request symbol table
//! - Produce the stock error pages (400/403/404/429/500)
//!
//! # Design Decisions
//! - Resolution precedence: directory index (`index.tpl`, `index.html`),
//!   exact path, `path.tpl`, `path.html`, not-found
//! - Paths with `..` segments resolve to not-found; the static root is
//!   the trust boundary
//! - Rendered pages stream as one chunked body with an explicit
//!   terminating chunk

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWrite};

use crate::catalog::TitleCatalog;
use crate::http::connection::{HttpConnection, Request};
use crate::http::response::reason_phrase;
use crate::net::state::ServerState;
use crate::template::{self, RenderError, SymbolTable};

/// Outcome of resolving a request path against the static root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Serve the file verbatim.
    Static(PathBuf),
    /// Render the file as a template.
    Template(PathBuf),
    NotFound,
}

/// Resolve a request path to on-disk content.
pub fn resolve(root: &Path, request_path: &str) -> Resolved {
    if request_path.split('/').any(|segment| segment == "..") {
        return Resolved::NotFound;
    }
    let full = root.join(request_path.trim_start_matches('/'));

    if full.is_dir() {
        for index in ["index.tpl", "index.html"] {
            let candidate = full.join(index);
            if candidate.is_file() {
                return classify(candidate);
            }
        }
        return Resolved::NotFound;
    }
    if full.is_file() {
        return classify(full);
    }
    let tpl = with_suffix(&full, ".tpl");
    if tpl.is_file() {
        return Resolved::Template(tpl);
    }
    let html = with_suffix(&full, ".html");
    if html.is_file() {
        return Resolved::Static(html);
    }
    Resolved::NotFound
}

fn classify(path: PathBuf) -> Resolved {
    if path.extension().is_some_and(|ext| ext == "tpl") {
        Resolved::Template(path)
    } else {
        Resolved::Static(path)
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Content type by file extension.
pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") | Some("tpl") => "text/html",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Serve one parsed request.
pub async fn serve<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut HttpConnection<S>,
    req: &Request,
    state: &ServerState,
) -> std::io::Result<()> {
    match resolve(&state.config.http.root_dir, &req.path) {
        Resolved::NotFound => not_found(conn, &req.path).await,
        Resolved::Static(path) => match state.cache.read(&path).await {
            Ok(bytes) => {
                conn.respond(200, &[("Content-Type", content_type(&path))], &bytes)
                    .await
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Static read failed");
                read_failure(conn).await
            }
        },
        Resolved::Template(path) => match state.cache.read(&path).await {
            Ok(bytes) => {
                let source = String::from_utf8_lossy(&bytes);
                let mut syms = page_symbols(req, state);
                match template::render(&source, &mut syms) {
                    Ok(page) => {
                        conn.respond_chunked(200, &[("Content-Type", "text/html")]).await?;
                        conn.write_chunk(page.as_bytes()).await?;
                        conn.finish_chunked().await
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            code = e.code(),
                            "Template render failed"
                        );
                        render_failure(conn, e).await
                    }
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Template read failed");
                read_failure(conn).await
            }
        },
    }
}

/// Symbols every rendered page sees: the defaults plus the current
/// install queue.
fn page_symbols(req: &Request, state: &ServerState) -> SymbolTable {
    let mut syms = SymbolTable::with_defaults(req.header("user-agent").unwrap_or(""));
    let queued = state.catalog.queued();
    let empty = queued.is_empty();
    syms.register_array(
        "queue-names",
        queued.iter().map(|t| t.name.clone()).collect(),
    );
    syms.register_array(
        "queue-ids",
        queued.iter().map(|t| format!("{:016x}", t.id)).collect(),
    );
    syms.register_bool_fn("queue-empty?", move |_, _| Ok(empty));
    syms
}

const HTML: [(&str, &str); 1] = [("Content-Type", "text/html")];

fn page(status: u16, detail: &str) -> String {
    let reason = reason_phrase(status);
    format!(
        "<html><head><title>{status} {reason}</title></head>\
         <body><h1>{status} {reason}</h1><p>{detail}</p></body></html>",
    )
}

/// 400 page for unparseable requests.
pub async fn bad_request<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut HttpConnection<S>,
) -> std::io::Result<()> {
    let body = page(400, "The request could not be understood.");
    conn.respond(400, &HTML, body.as_bytes()).await
}

/// 404 page naming the missing resource.
pub async fn not_found<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut HttpConnection<S>,
    path: &str,
) -> std::io::Result<()> {
    let body = page(
        404,
        &format!("The requested resource {} could not be found.", path),
    );
    conn.respond(404, &HTML, body.as_bytes()).await
}

/// 403 page for untrusted client addresses.
pub async fn forbidden<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut HttpConnection<S>,
) -> std::io::Result<()> {
    let body = page(403, "This host has not been trusted by the operator.");
    conn.respond(403, &HTML, body.as_bytes()).await
}

/// 429 page served while another handler holds the busy slot. Prefers
/// `/busy.html` from the static root, with a built-in fallback.
pub async fn serve_busy<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut HttpConnection<S>,
    state: &ServerState,
) -> std::io::Result<()> {
    let busy_page = state.config.http.root_dir.join("busy.html");
    let body = match state.cache.read(&busy_page).await {
        Ok(bytes) => bytes.to_vec(),
        Err(_) => page(
            429,
            "The server is handling another request. Try again shortly.",
        )
        .into_bytes(),
    };
    conn.respond(429, &HTML, &body).await
}

/// 500 page reporting the numeric render-failure code.
async fn render_failure<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut HttpConnection<S>,
    err: RenderError,
) -> std::io::Result<()> {
    let body = page(500, &format!("Template rendering failed with code {}.", err.code()));
    conn.respond(500, &HTML, body.as_bytes()).await
}

async fn read_failure<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut HttpConnection<S>,
) -> std::io::Result<()> {
    let body = page(500, "The resolved file could not be read.");
    conn.respond(500, &HTML, body.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), b"<html>home</html>").unwrap();
        std::fs::write(dir.path().join("queue.tpl"), b"[[if x]][[end]]").unwrap();
        std::fs::write(dir.path().join("about.html"), b"<html>about</html>").unwrap();
        std::fs::create_dir(dir.path().join("admin")).unwrap();
        std::fs::write(dir.path().join("admin/index.tpl"), b"tpl").unwrap();
        dir
    }

    #[test]
    fn test_root_falls_back_to_index_html() {
        let dir = root();
        assert_eq!(
            resolve(dir.path(), "/"),
            Resolved::Static(dir.path().join("index.html"))
        );
    }

    #[test]
    fn test_directory_prefers_index_tpl() {
        let dir = root();
        assert_eq!(
            resolve(dir.path(), "/admin"),
            Resolved::Template(dir.path().join("admin/index.tpl"))
        );
    }

    #[test]
    fn test_exact_path() {
        let dir = root();
        assert_eq!(
            resolve(dir.path(), "/about.html"),
            Resolved::Static(dir.path().join("about.html"))
        );
    }

    #[test]
    fn test_tpl_suffix_fallback_before_html() {
        let dir = root();
        // Both queue.tpl and about.html exist; bare names resolve through
        // the suffix chain.
        assert_eq!(
            resolve(dir.path(), "/queue"),
            Resolved::Template(dir.path().join("queue.tpl"))
        );
        assert_eq!(
            resolve(dir.path(), "/about"),
            Resolved::Static(dir.path().join("about.html"))
        );
    }

    #[test]
    fn test_missing_is_not_found() {
        let dir = root();
        assert_eq!(resolve(dir.path(), "/missing.html"), Resolved::NotFound);
    }

    #[test]
    fn test_parent_traversal_rejected() {
        let dir = root();
        assert_eq!(resolve(dir.path(), "/../queue.tpl"), Resolved::NotFound);
        assert_eq!(resolve(dir.path(), "/a/../../queue"), Resolved::NotFound);
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type(Path::new("a.html")), "text/html");
        assert_eq!(content_type(Path::new("a.tpl")), "text/html");
        assert_eq!(content_type(Path::new("a.css")), "text/css");
        assert_eq!(content_type(Path::new("a.bin")), "application/octet-stream");
    }
}
