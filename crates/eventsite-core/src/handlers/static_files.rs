//! Static file serving handler
//!
//! Serves the built frontend bundle. Paths that are not files on disk
//! but belong to a client-side page route get the application shell
//! (`index.html`) so deep links and reloads work with history routing.

use crate::{Method, Request, Response, ResponseBuilder, StatusCode};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

type PagePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Static file configuration
#[derive(Clone)]
pub struct StaticFileConfig {
    pub root: PathBuf,
    /// Application shell file name
    pub index: String,
    /// Cache max-age in seconds for everything except the shell
    pub max_age: u32,
    pub etag: bool,
    /// Serve dot files
    pub hidden: bool,
}

impl Default for StaticFileConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index: "index.html".to_string(),
            max_age: 86400,
            etag: true,
            hidden: false,
        }
    }
}

impl StaticFileConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = name.into();
        self
    }

    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = seconds;
        self
    }

    pub fn etag(mut self, enabled: bool) -> Self {
        self.etag = enabled;
        self
    }
}

/// Static file handler
#[derive(Clone)]
pub struct StaticFiles {
    config: StaticFileConfig,
    page_route: Option<PagePredicate>,
}

impl StaticFiles {
    pub fn new(config: StaticFileConfig) -> Self {
        Self {
            config,
            page_route: None,
        }
    }

    pub fn serve(root: impl Into<PathBuf>) -> Self {
        Self::new(StaticFileConfig::new(root))
    }

    /// Serve the shell for every path `is_page` accepts
    pub fn history_fallback(mut self, is_page: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.page_route = Some(Arc::new(is_page));
        self
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Path of the application shell
    pub fn index_path(&self) -> PathBuf {
        self.config.root.join(&self.config.index)
    }

    pub fn index_exists(&self) -> bool {
        self.index_path().is_file()
    }

    /// Handle a `GET`/`HEAD` request
    ///
    /// File on disk first, then the page-route fallback, then `404`.
    pub async fn handle(&self, req: &Request) -> Response {
        if !req.method.is_read() {
            return ResponseBuilder::new(StatusCode::METHOD_NOT_ALLOWED)
                .header("Allow", "GET, HEAD")
                .build();
        }

        if let Some(path) = self.sanitize_path(&req.path) {
            let full_path = self.config.root.join(&path);
            if let Ok(meta) = tokio::fs::metadata(&full_path).await {
                let file = if meta.is_dir() {
                    full_path.join(&self.config.index)
                } else {
                    full_path
                };
                if let Ok(meta) = tokio::fs::metadata(&file).await {
                    if meta.is_file() {
                        return self.serve_file(&file, &meta, req).await;
                    }
                }
            }
        }

        let is_page = self
            .page_route
            .as_ref()
            .is_some_and(|is_page| is_page(&req.path));
        if is_page {
            let index = self.index_path();
            match tokio::fs::metadata(&index).await {
                Ok(meta) if meta.is_file() => return self.serve_file(&index, &meta, req).await,
                _ => tracing::warn!(path = %req.path, index = %index.display(), "page route but no application shell"),
            }
        }

        Response::not_found()
    }

    /// Strip the leading slash and refuse traversal and dot files
    fn sanitize_path(&self, path: &str) -> Option<PathBuf> {
        let path = path.trim_start_matches('/');

        if !self.config.hidden && path.split('/').any(|s| s.starts_with('.') && s != ".") {
            return None;
        }

        let mut result = PathBuf::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(c) => result.push(c),
                Component::ParentDir | Component::Prefix(_) => return None,
                Component::RootDir | Component::CurDir => {}
            }
        }
        Some(result)
    }

    async fn serve_file(&self, path: &Path, meta: &std::fs::Metadata, req: &Request) -> Response {
        let etag = self.config.etag.then(|| generate_etag(meta));

        if let (Some(etag), Some(if_none_match)) = (&etag, req.header("if-none-match")) {
            if if_none_match.split(',').any(|t| t.trim() == etag || t.trim() == "*") {
                return ResponseBuilder::new(StatusCode::NOT_MODIFIED)
                    .header("ETag", etag.clone())
                    .build();
            }
        }

        let content = match tokio::fs::read(path).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to read static file");
                return Response::not_found();
            }
        };

        let is_shell = path.file_name().is_some_and(|n| n == self.config.index.as_str());
        let cache_control = if is_shell || self.config.max_age == 0 {
            "no-cache".to_string()
        } else {
            format!("public, max-age={}", self.config.max_age)
        };

        let mut builder = ResponseBuilder::new(StatusCode::OK)
            .header("Content-Type", mime_type(path))
            .header("Content-Length", content.len().to_string())
            .header("Cache-Control", cache_control);
        if let Some(etag) = etag {
            builder = builder.header("ETag", etag);
        }

        if req.method == Method::Head {
            builder.build()
        } else {
            builder.body(content).build()
        }
    }
}

fn generate_etag(meta: &std::fs::Metadata) -> String {
    use std::time::UNIX_EPOCH;

    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    format!("\"{:x}-{:x}\"", mtime, meta.len())
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "webmanifest" => "application/manifest+json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",

        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "avif" => "image/avif",

        "mp4" => "video/mp4",
        "webm" => "video/webm",

        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",

        "pdf" => "application/pdf",
        "wasm" => "application/wasm",

        _ => "application/octet-stream",
    }
}
