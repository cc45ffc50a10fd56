//! Google Drive link resolution and confirmation-page scanning.
//!
//! Drive does not serve file bytes from a share link directly: the first GET
//! lands on an HTML page that either carries a confirmation form (virus-scan
//! warning for large files) or an error caption. The scanners here extract
//! the next hop from that HTML so the fetch loop can follow it.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::{Error, Result};

static FILE_PATH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/file/d/(?<id>[^/]+)").expect("Invalid regex"));
static CONFIRM_HREF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href="(?<path>/uc\?export=download[^"]+)""#).expect("Invalid regex"));
static CONFIRM_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"confirm=(?<token>[0-9A-Za-z_]+)").expect("Invalid regex"));
static DOWNLOAD_URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""downloadUrl":"(?<url>[^"]+)""#).expect("Invalid regex"));
static ERROR_CAPTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<p class="uc-error-subcaption">(?<message>.*?)</p>"#).expect("Invalid regex")
});

/// How one remote URL relates to the Drive hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// The stable Drive file identifier, when one could be extracted.
    pub file_id: Option<String>,
    /// True when the URL is already in direct-download (`/uc`) form and no
    /// confirmation handshake should be necessary.
    pub is_direct: bool,
}

/// True when the URL points at the Drive hosting service at all.
pub fn is_drive_url(url: &Url) -> bool {
    let root = url
        .domain()
        .and_then(|d| addr::parse_domain_name(d).ok())
        .and_then(|d| d.root().map(str::to_owned));

    match root.as_deref() {
        Some("google.com") => {}
        _ => return false,
    }

    matches!(
        url.host_str(),
        Some("drive.google.com" | "docs.google.com" | "drive.usercontent.google.com")
    )
}

/// Classifies a Drive URL and extracts its file identifier.
///
/// Returns `None` for URLs that are not on the hosting service; those are
/// fetched as plain direct files with no handshake.
pub fn resolve(url: &Url) -> Option<ResolvedLink> {
    if !is_drive_url(url) {
        return None;
    }

    let file_id = url
        .query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .or_else(|| {
            FILE_PATH_REGEX
                .captures(url.path())
                .and_then(|c| c.name("id"))
                .map(|m| m.as_str().to_owned())
        });

    let is_direct = url.path().ends_with("/uc") || url.path().ends_with("/download");

    Some(ResolvedLink { file_id, is_direct })
}

/// The canonical direct-download form for a Drive file identifier.
pub fn direct_download_url(file_id: &str) -> Url {
    let mut url: Url = "https://drive.google.com/uc".parse().expect("static URL is valid");
    url.query_pairs_mut().append_pair("id", file_id);
    url
}

/// Scans a confirmation page for the next URL to fetch.
///
/// Signals are tried in priority order: a confirm-redirect href, a bare
/// `confirm=` token to splice into the current URL, then an embedded
/// `downloadUrl` field. An explicit error caption fails with `AccessDenied`;
/// no signal at all fails with `PermissionDenied`.
pub fn next_hop(current: &Url, body: &str) -> Result<Url> {
    if let Some(captures) = CONFIRM_HREF_REGEX.captures(body) {
        let path = captures["path"].replace("&amp;", "&");
        let next = format!("https://docs.google.com{path}");
        return Url::parse(&next).map_err(|e| Error::transfer(current, e));
    }

    if let Some(captures) = CONFIRM_TOKEN_REGEX.captures(body) {
        let token = &captures["token"];
        let mut next = current.clone();
        let pairs: Vec<(String, String)> = next
            .query_pairs()
            .filter(|(key, _)| key != "confirm")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        next.query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair("confirm", token);
        return Ok(next);
    }

    if let Some(captures) = DOWNLOAD_URL_REGEX.captures(body) {
        let raw = captures["url"].replace("\\u003d", "=").replace("\\u0026", "&");
        return Url::parse(&raw).map_err(|e| Error::transfer(current, e));
    }

    if let Some(captures) = ERROR_CAPTION_REGEX.captures(body) {
        return Err(Error::AccessDenied {
            message: captures["message"].trim().to_owned(),
        });
    }

    Err(Error::PermissionDenied {
        url: current.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("test URL parses")
    }

    #[test]
    fn non_drive_urls_resolve_to_none() {
        assert!(resolve(&url("https://example.com/file.zip")).is_none());
        assert!(resolve(&url("https://notgoogle.com/uc?id=x")).is_none());
    }

    #[test]
    fn id_comes_from_query_parameter() {
        let link = resolve(&url("https://drive.google.com/uc?id=abc123&export=download"))
            .expect("drive link");
        assert_eq!(link.file_id.as_deref(), Some("abc123"));
        assert!(link.is_direct);
    }

    #[test]
    fn id_comes_from_view_path() {
        let link = resolve(&url("https://drive.google.com/file/d/abc123/view?usp=sharing"))
            .expect("drive link");
        assert_eq!(link.file_id.as_deref(), Some("abc123"));
        assert!(!link.is_direct);
    }

    #[test]
    fn open_link_is_not_direct() {
        let link = resolve(&url("https://drive.google.com/open?id=abc123")).expect("drive link");
        assert_eq!(link.file_id.as_deref(), Some("abc123"));
        assert!(!link.is_direct);
    }

    #[test]
    fn direct_download_url_carries_the_id() {
        assert_eq!(
            direct_download_url("abc123").as_str(),
            "https://drive.google.com/uc?id=abc123"
        );
    }

    #[test]
    fn confirm_href_wins_over_token() {
        let body = r#"<a href="/uc?export=download&amp;confirm=t&amp;id=abc">Download anyway</a>
                      confirm=zzz"#;
        let next = next_hop(&url("https://drive.google.com/uc?id=abc"), body).expect("next hop");
        assert_eq!(
            next.as_str(),
            "https://docs.google.com/uc?export=download&confirm=t&id=abc"
        );
    }

    #[test]
    fn bare_token_is_spliced_into_current_url() {
        let current = url("https://drive.google.com/uc?id=abc&confirm=old");
        let next = next_hop(&current, "download... confirm=Xy_9 ...").expect("next hop");
        assert_eq!(next.as_str(), "https://drive.google.com/uc?id=abc&confirm=Xy_9");
    }

    #[test]
    fn embedded_download_url_is_unescaped() {
        let body = r#"{"downloadUrl":"https://drive.usercontent.google.com/download?id=abc&confirm=t"}"#;
        let next = next_hop(&url("https://drive.google.com/uc?id=abc"), body).expect("next hop");
        assert_eq!(
            next.as_str(),
            "https://drive.usercontent.google.com/download?id=abc&confirm=t"
        );
    }

    #[test]
    fn error_caption_becomes_access_denied() {
        let body = r#"<p class="uc-error-subcaption">Too many users have viewed or downloaded this file recently.</p>"#;
        let err = next_hop(&url("https://drive.google.com/uc?id=abc"), body).unwrap_err();
        match err {
            Error::AccessDenied { message } => assert!(message.starts_with("Too many users")),
            other => panic!("expected AccessDenied, got {other:?}"),
        }
    }

    #[test]
    fn silence_becomes_permission_denied() {
        let err = next_hop(&url("https://drive.google.com/uc?id=abc"), "<html></html>").unwrap_err();
        assert!(matches!(err, Error::PermissionDenied { .. }));
    }
}
