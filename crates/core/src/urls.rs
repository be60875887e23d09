//! URL helpers: host extraction, filename extraction, and Hugging Face
//! download-URL canonicalization.

/// Extract the lowercased host from an http(s) URL.
///
/// Strips scheme, userinfo, port, path, query, and fragment. Returns
/// `None` when the URL has no scheme or an empty host.
pub fn host_of(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host = authority.rsplit('@').next().unwrap_or("");
    let host = host.split(':').next().unwrap_or("");
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

/// Extract a filename from a URL by taking the last non-empty path segment.
///
/// Strips query parameters and fragments. Returns an empty string when the
/// URL path has no usable segment (the caller decides whether that is an
/// error).
pub fn filename_from_url(url: &str) -> String {
    let clean = url.split(['?', '#']).next().unwrap_or(url);
    let path = if let Some(rest) = clean
        .strip_prefix("https://")
        .or_else(|| clean.strip_prefix("http://"))
    {
        rest.find('/').map(|i| &rest[i..]).unwrap_or("")
    } else {
        clean
    };
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("").to_string()
}

/// Convert a Hugging Face `blob` page URL to the equivalent `resolve`
/// URL so it can be downloaded directly. Any other URL passes through
/// unchanged.
pub fn canonicalize_hf_url(url: &str) -> String {
    let Some(host_idx) = url.find("huggingface.co/") else {
        return url.to_string();
    };
    let rest = &url[host_idx + "huggingface.co/".len()..];
    let mut parts = rest.splitn(3, '/');
    let (Some(owner), Some(repo), Some(tail)) = (parts.next(), parts.next(), parts.next()) else {
        return url.to_string();
    };
    match tail.strip_prefix("blob/") {
        Some(stripped) => format!(
            "{}huggingface.co/{owner}/{repo}/resolve/{stripped}",
            &url[..host_idx]
        ),
        None => url.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- host_of -------------------------------------------------------------

    #[test]
    fn host_simple() {
        assert_eq!(host_of("https://example.com/file"), Some("example.com".into()));
    }

    #[test]
    fn host_lowercased_and_port_stripped() {
        assert_eq!(
            host_of("https://HuggingFace.co:443/x/y"),
            Some("huggingface.co".into())
        );
    }

    #[test]
    fn host_missing_scheme() {
        assert_eq!(host_of("example.com/file"), None);
        assert_eq!(host_of("ftp://example.com/file"), None);
    }

    #[test]
    fn host_empty() {
        assert_eq!(host_of("https:///path"), None);
    }

    // -- filename_from_url ---------------------------------------------------

    #[test]
    fn filename_simple() {
        assert_eq!(
            filename_from_url("https://example.com/models/my_model.safetensors"),
            "my_model.safetensors"
        );
    }

    #[test]
    fn filename_strips_query_and_fragment() {
        assert_eq!(filename_from_url("https://example.com/file.ckpt?token=abc"), "file.ckpt");
        assert_eq!(filename_from_url("https://example.com/file.pt#frag"), "file.pt");
    }

    #[test]
    fn filename_empty_path() {
        assert_eq!(filename_from_url("https://example.com/"), "");
        assert_eq!(filename_from_url("https://example.com"), "");
    }

    // -- canonicalize_hf_url -------------------------------------------------

    #[test]
    fn blob_url_becomes_resolve_url() {
        assert_eq!(
            canonicalize_hf_url("https://huggingface.co/org/repo/blob/main/model.safetensors"),
            "https://huggingface.co/org/repo/resolve/main/model.safetensors"
        );
    }

    #[test]
    fn resolve_url_unchanged() {
        let url = "https://huggingface.co/org/repo/resolve/main/model.safetensors";
        assert_eq!(canonicalize_hf_url(url), url);
    }

    #[test]
    fn non_hf_url_unchanged() {
        let url = "https://github.com/org/repo/blob/main/model.safetensors";
        assert_eq!(canonicalize_hf_url(url), url);
    }
}
