//! Static asset resolution
//!
//! Maps request paths onto files below a fixed asset root. Resolution happens
//! on every request; nothing is cached.

use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Content type sent for the HTML pages
pub const HTML_CONTENT_TYPE: &str = "text/html";

/// Fallback when the extension gives no hint
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("not found: {0}")]
    NotFound(String),
}

/// Pages served under fixed names. Each has a compiled-in copy used when the
/// asset root does not provide one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Index,
    Composer,
    Error,
}

impl Page {
    pub fn file_name(self) -> &'static str {
        match self {
            Page::Index => "index.html",
            Page::Composer => "message.html",
            Page::Error => "error.html",
        }
    }

    pub fn builtin(self) -> &'static str {
        match self {
            Page::Index => include_str!("../http/index.html"),
            Page::Composer => include_str!("../http/message.html"),
            Page::Error => include_str!("../http/error.html"),
        }
    }

    /// Named page for a request path, if any
    pub fn for_path(request_path: &str) -> Option<Page> {
        match request_path {
            "/" | "" => Some(Page::Index),
            "/message.html" => Some(Page::Composer),
            _ => None,
        }
    }
}

/// A request path resolved to a readable file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct StaticFileResolver {
    root: PathBuf,
}

impl StaticFileResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a URL path (query string already removed) to a file under the
    /// asset root.
    ///
    /// `/` and `/message.html` map to their page files first. Anything that is
    /// missing, not a regular file, or lies outside the root is `NotFound`.
    pub fn resolve(&self, request_path: &str) -> Result<ResolvedFile, ResolveError> {
        let relative = match Page::for_path(request_path) {
            Some(page) => page.file_name(),
            None => request_path.trim_start_matches('/'),
        };

        let path = self
            .contain(relative)
            .ok_or_else(|| ResolveError::NotFound(request_path.to_string()))?;

        Ok(ResolvedFile {
            content_type: content_type_for(&path),
            path,
        })
    }

    /// Read a named page from the asset root, falling back to the built-in copy.
    pub async fn page(&self, page: Page) -> Vec<u8> {
        let path = self.root.join(page.file_name());
        match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read page, using built-in copy");
                }
                page.builtin().as_bytes().to_vec()
            }
        }
    }

    fn contain(&self, relative: &str) -> Option<PathBuf> {
        if relative.is_empty() {
            return None;
        }

        let relative = Path::new(relative);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }

        let candidate = self.root.join(relative);

        // Symlinks may still point outside the root.
        let root = self.root.canonicalize().ok()?;
        let canonical = candidate.canonicalize().ok()?;
        if !canonical.starts_with(&root) || !canonical.is_file() {
            return None;
        }

        Some(canonical)
    }
}

fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn asset_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>index</h1>").unwrap();
        fs::write(dir.path().join("message.html"), "<form></form>").unwrap();
        fs::write(dir.path().join("style.css"), "body {}").unwrap();
        fs::write(dir.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        fs::write(dir.path().join("notes.unknownext"), "?").unwrap();
        fs::create_dir(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("js/app.js"), "let a = 1;").unwrap();
        dir
    }

    #[test]
    fn test_named_pages() {
        let dir = asset_root();
        let resolver = StaticFileResolver::new(dir.path());

        let index = resolver.resolve("/").unwrap();
        assert!(index.path.ends_with("index.html"));
        assert_eq!(index.content_type, "text/html");

        let composer = resolver.resolve("/message.html").unwrap();
        assert!(composer.path.ends_with("message.html"));
    }

    #[test]
    fn test_content_type_from_extension() {
        let dir = asset_root();
        let resolver = StaticFileResolver::new(dir.path());

        assert_eq!(resolver.resolve("/style.css").unwrap().content_type, "text/css");
        assert_eq!(resolver.resolve("/logo.png").unwrap().content_type, "image/png");
        assert!(resolver
            .resolve("/js/app.js")
            .unwrap()
            .content_type
            .contains("javascript"));
    }

    #[test]
    fn test_unknown_extension_falls_back() {
        let dir = asset_root();
        let resolver = StaticFileResolver::new(dir.path());

        let resolved = resolver.resolve("/notes.unknownext").unwrap();
        assert_eq!(resolved.content_type, DEFAULT_CONTENT_TYPE);
        assert!(resolved.path.exists());
    }

    #[test]
    fn test_missing_file_and_directory() {
        let dir = asset_root();
        let resolver = StaticFileResolver::new(dir.path());

        assert_eq!(
            resolver.resolve("/nonexistent.png"),
            Err(ResolveError::NotFound("/nonexistent.png".to_string()))
        );
        assert!(resolver.resolve("/js").is_err());
        assert!(resolver.resolve("/js/").is_err());
    }

    #[test]
    fn test_traversal_is_not_found() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("http");
        fs::create_dir(&root).unwrap();
        fs::write(outer.path().join("secret.txt"), "secret").unwrap();
        fs::write(root.join("ok.txt"), "ok").unwrap();

        let resolver = StaticFileResolver::new(&root);
        assert!(resolver.resolve("/ok.txt").is_ok());
        assert!(resolver.resolve("/../secret.txt").is_err());
        assert!(resolver.resolve("/./../secret.txt").is_err());
        assert!(resolver.resolve("//etc/passwd").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_not_found() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("http");
        fs::create_dir(&root).unwrap();
        fs::write(outer.path().join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(outer.path().join("secret.txt"), root.join("link.txt"))
            .unwrap();

        let resolver = StaticFileResolver::new(&root);
        assert!(resolver.resolve("/link.txt").is_err());
    }

    #[tokio::test]
    async fn test_page_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = StaticFileResolver::new(dir.path());

        let body = resolver.page(Page::Error).await;
        assert_eq!(body, Page::Error.builtin().as_bytes());

        fs::write(dir.path().join("error.html"), "custom").unwrap();
        assert_eq!(resolver.page(Page::Error).await, b"custom");
    }

    #[test]
    fn test_builtin_composer_reconnects_before_sending() {
        let page = Page::Composer.builtin();

        // Idle connections are closed by the relay, so the page must reopen
        // its socket instead of writing to a closed one.
        assert!(page.contains("function connect()"));
        assert!(page.contains("readyState === WebSocket.OPEN"));
        assert!(page.contains("addEventListener(\"open\", flush)"));

        // "Sent." is only reported from the flush that actually sends.
        let flush = page.find("function flush()").unwrap();
        let submit = page.find("form.addEventListener(\"submit\"").unwrap();
        let sent = page.find("\"Sent.\"").unwrap();
        assert!(flush < sent && sent < submit);
        assert_eq!(page.matches("\"Sent.\"").count(), 1);
    }
}
