//! Mapping captured URLs to paths inside the backup directory.

/// Characters that cannot appear in a file name on common filesystems.
const ILLEGAL_CHARS: &[char] = &[':', '*', '?', '&', '=', '<', '>', '\\', '|', '"'];

/// The part of a captured URL after `scheme://host/`.
///
/// Returns `None` when the URL has fewer than three `/`-separated parts, so
/// there is no host to strip. The site root yields an empty string.
pub fn file_id(original_url: &str) -> Option<String> {
    let parts: Vec<&str> = original_url.split('/').collect();
    if parts.len() < 3 {
        return None;
    }
    Some(parts.get(3..).map(|rest| rest.join("/")).unwrap_or_default())
}

/// Normalized local path for a captured URL, or `None` if it is malformed.
///
/// Percent-encoding is decoded, filesystem-illegal characters are escaped as
/// `%xx`, and directory-like paths map to `index.html`. Paths that would
/// escape the backup directory are rejected.
pub fn local_path(original_url: &str) -> Option<String> {
    let id = file_id(original_url)?;
    if id.is_empty() {
        return Some("index.html".to_string());
    }

    let decoded = match urlencoding::decode(&id) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => id.clone(),
    };

    let segments: Vec<String> = decoded.split('/').map(escape_segment).collect();
    if segments.iter().any(|s| s == "..") {
        return None;
    }

    let is_dir = decoded.ends_with('/')
        || segments
            .last()
            .map(|last| !last.contains('.'))
            .unwrap_or(true);

    let mut path = segments
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("/");

    if is_dir {
        if path.is_empty() {
            return Some("index.html".to_string());
        }
        path.push_str("/index.html");
    }

    Some(path)
}

fn escape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if ILLEGAL_CHARS.contains(&c) || c.is_control() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02x}", byte));
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_strips_scheme_and_host() {
        assert_eq!(
            file_id("http://www.thomaston4thofjuly.com:80/pix/Flair4.jpg").as_deref(),
            Some("pix/Flair4.jpg")
        );
        assert_eq!(file_id("https://example.com").as_deref(), Some(""));
        assert_eq!(file_id("https://example.com/").as_deref(), Some(""));
        assert_eq!(file_id("example.com"), None);
        assert_eq!(file_id(""), None);
    }

    #[test]
    fn files_keep_their_name() {
        assert_eq!(
            local_path("https://example.com/assets/site.css").as_deref(),
            Some("assets/site.css")
        );
        assert_eq!(
            local_path("http://www.thomaston4thofjuly.com:80/sponsors.cfm").as_deref(),
            Some("sponsors.cfm")
        );
    }

    #[test]
    fn directories_map_to_index() {
        assert_eq!(local_path("https://example.com/").as_deref(), Some("index.html"));
        assert_eq!(local_path("https://example.com").as_deref(), Some("index.html"));
        assert_eq!(
            local_path("https://example.com/blog/").as_deref(),
            Some("blog/index.html")
        );
        assert_eq!(
            local_path("https://example.com/blog/post").as_deref(),
            Some("blog/post/index.html")
        );
    }

    #[test]
    fn decodes_and_escapes() {
        assert_eq!(
            local_path("https://example.com/my%20file.pdf").as_deref(),
            Some("my file.pdf")
        );
        assert_eq!(
            local_path("https://example.com/page.php?id=2").as_deref(),
            Some("page.php%3fid%3d2")
        );
        assert_eq!(
            local_path("https://example.com/a%3Ab.txt").as_deref(),
            Some("a%3ab.txt")
        );
    }

    #[test]
    fn rejects_escaping_paths() {
        assert_eq!(local_path("https://example.com/../etc/passwd"), None);
        assert_eq!(local_path("https://example.com/a/%2E%2E/b.txt"), None);
    }
}
