//! Text vs binary classification for downloaded files.

use std::path::Path;

/// Extensions of files the rewrite passes operate on.
const REWRITABLE_EXTENSIONS: &[&str] = &["html", "htm", "css", "js"];

/// Check if a file is one of the HTML/CSS/JS files the rewrite passes visit.
pub fn is_rewritable_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            REWRITABLE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Decide whether downloaded content should be treated as text.
///
/// The upstream `Content-Type` wins when it is specific; generic or missing
/// types fall back to guessing from the local path.
pub fn is_text_content(content_type: Option<&str>, path: &Path) -> bool {
    if let Some(ct) = content_type {
        let essence = ct.split(';').next().unwrap_or("").trim().to_lowercase();
        if !essence.is_empty() && essence != "application/octet-stream" {
            return is_text_mime(&essence);
        }
    }

    mime_guess::from_path(path)
        .first()
        .is_some_and(|mime| is_text_mime(mime.essence_str()))
}

/// Whether downloaded content is an HTML page.
pub fn is_html_content(content_type: Option<&str>, path: &Path) -> bool {
    let declared_html = content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("text/html"));

    declared_html
        || path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}

fn is_text_mime(mime: &str) -> bool {
    let mime = mime.to_lowercase();
    mime.starts_with("text/")
        || mime.ends_with("+xml")
        || mime.ends_with("+json")
        || matches!(
            mime.as_str(),
            "application/javascript"
                | "application/x-javascript"
                | "application/ecmascript"
                | "application/json"
                | "application/xml"
                | "application/xhtml+xml"
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_detection() {
        assert!(is_html_content(Some("text/html; charset=utf-8"), Path::new("a")));
        assert!(is_html_content(None, Path::new("blog/index.HTM")));
        assert!(!is_html_content(Some("text/css"), Path::new("site.css")));
    }

    #[test]
    fn rewritable_extensions() {
        assert!(is_rewritable_path(Path::new("a/index.html")));
        assert!(is_rewritable_path(Path::new("style.CSS")));
        assert!(is_rewritable_path(Path::new("app.js")));
        assert!(!is_rewritable_path(Path::new("logo.png")));
        assert!(!is_rewritable_path(Path::new("README")));
    }

    #[test]
    fn content_type_wins() {
        assert!(is_text_content(
            Some("text/html; charset=iso-8859-1"),
            Path::new("x.bin")
        ));
        assert!(!is_text_content(Some("image/png"), Path::new("x.html")));
        assert!(is_text_content(
            Some("application/javascript"),
            Path::new("x")
        ));
        assert!(is_text_content(Some("image/svg+xml"), Path::new("x")));
    }

    #[test]
    fn falls_back_to_path() {
        assert!(is_text_content(None, Path::new("a/style.css")));
        assert!(is_text_content(
            Some("application/octet-stream"),
            Path::new("index.html")
        ));
        assert!(!is_text_content(None, Path::new("photo.jpg")));
        assert!(!is_text_content(None, Path::new("noext")));
    }
}
