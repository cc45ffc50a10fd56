//! Persistent cookie cache for the Drive session.
//!
//! A solved confirmation challenge is carried in cookies; caching them means
//! the next fetch can skip the handshake. The cache is a JSON list of
//! `(name, value)` pairs under the user cache directory. Transient
//! `download_warning*` cookies are per-attempt state and are never persisted.
//! Concurrent writers are last-writer-wins; the cache is an optimization, so
//! losing a write only costs a repeat handshake.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use reqwest::cookie::Jar;
use tracing::{debug, trace};
use url::Url;

const COOKIE_FILE: &str = "cookies.json";
const TRANSIENT_PREFIX: &str = "download_warning";

#[derive(Debug, Default)]
pub struct CookieCache {
    path: Option<PathBuf>,
    pairs: Vec<(String, String)>,
}

impl CookieCache {
    /// Loads the cache from the default per-user location, or starts empty
    /// when there is no cache dir, no file, or the file does not decode.
    pub fn load() -> Self {
        let path = dirs::cache_dir().map(|dir| dir.join("chorus").join(COOKIE_FILE));
        match &path {
            Some(p) => Self::load_from(p),
            None => Self::default(),
        }
    }

    /// Loads from an explicit file path. A corrupt or missing file yields an
    /// empty cache rather than an error.
    pub fn load_from(path: &Path) -> Self {
        let pairs = fs::read_to_string(path)
            .ok()
            .and_then(|raw| serde_json::from_str::<Vec<(String, String)>>(&raw).ok())
            .unwrap_or_default();

        trace!(path = ?path, cookies = pairs.len(), "Loaded cookie cache");

        Self {
            path: Some(path.to_path_buf()),
            pairs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Seeds a reqwest cookie jar with the cached pairs, scoped to the
    /// Drive domains.
    pub fn seed(&self, jar: &Arc<Jar>) {
        if self.pairs.is_empty() {
            return;
        }

        let origin: Url = "https://drive.google.com"
            .parse()
            .expect("static URL is valid");

        for (name, value) in &self.pairs {
            jar.add_cookie_str(&format!("{name}={value}; Domain=.google.com; Path=/"), &origin);
        }
    }

    /// Merges the `Set-Cookie` pairs from a response, skipping transient
    /// download-warning markers.
    pub fn merge_from_response(&mut self, response: &reqwest::Response) {
        for header in response.headers().get_all(reqwest::header::SET_COOKIE) {
            let Ok(raw) = header.to_str() else { continue };
            if let Some((name, value)) = parse_set_cookie(raw) {
                self.insert(name, value);
            }
        }
    }

    fn insert(&mut self, name: String, value: String) {
        match self.pairs.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.pairs.push((name, value)),
        }
    }

    /// Writes the cache back to disk. Failure to persist is non-fatal for
    /// the download itself, so the caller decides whether to surface it.
    pub fn store(&self) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let encoded = serde_json::to_string(&self.pairs)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, encoded)?;

        debug!(path = ?path, cookies = self.pairs.len(), "Persisted cookie cache");
        Ok(())
    }
}

/// Extracts the `name=value` pair from a raw `Set-Cookie` header value.
/// Transient download-warning cookies are dropped here.
fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();

    if name.is_empty() || name.starts_with(TRANSIENT_PREFIX) {
        return None;
    }

    Some((name.to_owned(), value.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_cookie_keeps_only_the_first_pair() {
        let parsed = parse_set_cookie("NID=511=abc; Path=/; Secure; HttpOnly");
        assert_eq!(parsed, Some(("NID".to_owned(), "511=abc".to_owned())));
    }

    #[test]
    fn download_warning_cookies_are_stripped() {
        assert_eq!(parse_set_cookie("download_warning_13058876669334088843_abc=t; Path=/"), None);
    }

    #[test]
    fn insert_replaces_an_existing_name() {
        let mut cache = CookieCache::default();
        cache.insert("NID".into(), "old".into());
        cache.insert("NID".into(), "new".into());
        assert_eq!(cache.pairs, vec![("NID".to_owned(), "new".to_owned())]);
    }

    #[test]
    fn missing_file_yields_empty_cache() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = CookieCache::load_from(&tmp.path().join("nope.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn corrupt_file_yields_empty_cache() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("cookies.json");
        fs::write(&path, "not json at all").expect("write");
        assert!(CookieCache::load_from(&path).is_empty());
    }

    #[test]
    fn round_trips_through_disk() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("sub").join("cookies.json");

        let mut cache = CookieCache::load_from(&path);
        cache.pairs.push(("NID".into(), "511=abcdef".into()));
        cache.store().expect("store");

        let reloaded = CookieCache::load_from(&path);
        assert_eq!(reloaded.pairs, vec![("NID".to_owned(), "511=abcdef".to_owned())]);
    }
}
