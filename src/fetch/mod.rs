//! Single-URL retrieval, including the Drive confirmation handshake.
//!
//! The [`Fetcher`] owns one HTTP session (cookie jar included) and retrieves
//! one URL per call: it follows the hosting service's confirmation hops until
//! a response carries file bytes, then streams those bytes to a temporary
//! file and renames it into place.

pub mod cookies;
pub mod drive;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{
    cookie::Jar,
    header::{CONTENT_DISPOSITION, SET_COOKIE},
    Client, Response,
};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, trace, warn};
use url::Url;

use crate::{
    error::{Error, Result},
    fetch::cookies::CookieCache,
    helpers::sanitize::{sanitize, sanitize_filename},
};

/// Streaming buffer size.
const CHUNK_SIZE: usize = 512 * 1024;
/// Cap on confirmation hops before giving up on a misbehaving page chain.
const MAX_CONFIRM_HOPS: usize = 10;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

static RFC5987_FILENAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"filename\*=UTF-8''(?<name>[^;]+)").expect("Invalid regex"));
static PLAIN_FILENAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"filename=["']?(?<name>[^"';]+)"#).expect("Invalid regex"));

/// Progress callback: `(bytes transferred, total bytes when known)`.
pub type ProgressFn = Box<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Knobs for one fetch session.
pub struct FetchOptions {
    /// Reuse (and update) the on-disk cookie cache so a previously solved
    /// confirmation challenge is not repeated.
    pub reuse_cookies: bool,
    /// Throughput ceiling in bytes per second.
    pub speed_limit: Option<u64>,
    /// Called after every chunk lands on disk.
    pub progress: Option<ProgressFn>,
    /// Proxy URL applied to every request in the session.
    pub proxy: Option<String>,
    /// Overall per-request timeout. Connect timeout is always applied.
    pub timeout: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            reuse_cookies: true,
            speed_limit: None,
            progress: None,
            proxy: None,
            timeout: None,
        }
    }
}

impl std::fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOptions")
            .field("reuse_cookies", &self.reuse_cookies)
            .field("speed_limit", &self.speed_limit)
            .field("progress", &self.progress.is_some())
            .field("proxy", &self.proxy)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Retrieves single URLs, handling the Drive confirmation gate.
pub struct Fetcher {
    client: Client,
    options: FetchOptions,
    cache: CookieCache,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        Self::with_options(FetchOptions::default())
    }

    pub fn with_options(options: FetchOptions) -> Result<Self> {
        let cache = if options.reuse_cookies {
            CookieCache::load()
        } else {
            CookieCache::default()
        };

        let jar = Arc::new(Jar::default());
        cache.seed(&jar);

        let mut builder = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .cookie_provider(jar);

        if let Some(proxy) = &options.proxy {
            builder = builder
                .proxy(reqwest::Proxy::all(proxy).map_err(|e| Error::Proxy(e.to_string()))?);
        }

        let client = builder.build().map_err(Error::RemoteService)?;

        Ok(Self {
            client,
            options,
            cache,
        })
    }

    /// Fetches one URL into `dest_dir` and returns the written path.
    ///
    /// `rename_stem` replaces the filename stem while keeping the extension
    /// inferred from the remote filename. With `None`, the (sanitized)
    /// remote filename is used as-is.
    #[tracing::instrument(skip_all, fields(url = url.as_str()))]
    pub async fn fetch(
        &mut self,
        url: &Url,
        dest_dir: &Path,
        rename_stem: Option<&str>,
    ) -> Result<PathBuf> {
        debug!("Starting fetch");

        let link = drive::resolve(url);
        let mut start = url.clone();
        if let Some(link) = &link {
            if !link.is_direct {
                warn!(
                    file_id = ?link.file_id,
                    "URL is not in direct-download form; going through the confirmation handshake"
                );
                if let Some(id) = &link.file_id {
                    start = drive::direct_download_url(id);
                }
            }
        }

        let response = self.negotiate(&start, link.is_some()).await?;
        self.stream_to_file(response, dest_dir, rename_stem).await
    }

    /// Runs the confirmation-hop loop until a response carries file bytes.
    async fn negotiate(&mut self, url: &Url, is_drive: bool) -> Result<Response> {
        let mut current = url.clone();

        for hop in 0..MAX_CONFIRM_HOPS {
            trace!(hop, url = current.as_str(), "Requesting");

            let mut request = self.client.get(current.clone());
            if let Some(timeout) = self.options.timeout {
                request = request.timeout(timeout);
            }

            let response = request.send().await.map_err(|e| self.send_error(&current, e))?;
            self.persist_cookies(&response);

            let response = response
                .error_for_status()
                .map_err(|e| Error::transfer(&current, e))?;

            if response.headers().contains_key(CONTENT_DISPOSITION) {
                trace!("Attachment header present, handshake complete");
                return Ok(response);
            }

            if !is_drive {
                trace!("Not a hosting-service link, taking body as payload");
                return Ok(response);
            }

            let body = response.text().await.map_err(|e| Error::transfer(&current, e))?;
            current = drive::next_hop(&current, &body)?;
        }

        Err(Error::TooManyRedirects {
            url: url.to_string(),
        })
    }

    fn send_error(&self, url: &Url, err: reqwest::Error) -> Error {
        if self.options.proxy.is_some() && err.is_connect() {
            Error::Proxy(err.to_string())
        } else {
            Error::transfer(url, err)
        }
    }

    /// Persists session cookies after each hop. Failure to write the cache
    /// only downgrades cookie reuse to session-local.
    fn persist_cookies(&mut self, response: &Response) {
        if !self.options.reuse_cookies {
            return;
        }

        if response.headers().contains_key(SET_COOKIE) {
            self.cache.merge_from_response(response);
            if let Err(e) = self.cache.store() {
                trace!(?e, "Could not persist cookie cache");
            }
        }
    }

    /// Streams the response body to `dest_dir` via a temporary file, then
    /// renames it into place.
    async fn stream_to_file(
        &self,
        response: Response,
        dest_dir: &Path,
        rename_stem: Option<&str>,
    ) -> Result<PathBuf> {
        let url = response.url().clone();
        let remote_name = filename_from_response(&response);
        let file_name = output_name(&remote_name, rename_stem);
        let total = response.content_length();

        tokio::fs::create_dir_all(dest_dir).await?;
        let final_path = dest_dir.join(&file_name);
        let temp_path = dest_dir.join(format!(".{file_name}.part"));

        trace!(path = ?temp_path, ?total, "Streaming response to temp file");

        let file = tokio::fs::File::create(&temp_path).await?;
        let mut out = BufWriter::with_capacity(CHUNK_SIZE, file);

        match self.write_body(response, &mut out, &url, total).await {
            Ok(transferred) => {
                out.flush().await.map_err(|e| Error::transfer(&url, e))?;
                drop(out);
                tokio::fs::rename(&temp_path, &final_path).await?;
                debug!(path = ?final_path, transferred, "Fetch finished");
                Ok(final_path)
            }
            Err(e) => {
                drop(out);
                let _ = tokio::fs::remove_file(&temp_path).await;
                Err(e)
            }
        }
    }

    async fn write_body(
        &self,
        mut response: Response,
        out: &mut BufWriter<tokio::fs::File>,
        url: &Url,
        total: Option<u64>,
    ) -> Result<u64> {
        let started = Instant::now();
        let mut transferred: u64 = 0;

        while let Some(chunk) = response.chunk().await.map_err(|e| Error::transfer(url, e))? {
            out.write_all(&chunk)
                .await
                .map_err(|e| Error::transfer(url, e))?;
            transferred += chunk.len() as u64;

            if let Some(progress) = &self.options.progress {
                progress(transferred, total);
            }

            if let Some(limit) = self.options.speed_limit {
                #[allow(clippy::cast_precision_loss)]
                let expected = transferred as f64 / limit as f64;
                let elapsed = started.elapsed().as_secs_f64();
                if expected > elapsed {
                    tokio::time::sleep(Duration::from_secs_f64(expected - elapsed)).await;
                }
            }
        }

        Ok(transferred)
    }
}

/// Derives the remote filename: `Content-Disposition` first, the URL's last
/// path segment second, a fixed fallback last.
fn filename_from_response(response: &Response) -> String {
    if let Some(name) = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition)
    {
        return name;
    }

    response
        .url()
        .path_segments()
        .and_then(Iterator::last)
        .filter(|segment| !segment.is_empty())
        .map_or_else(
            || "download".to_owned(),
            |segment| {
                percent_encoding::percent_decode_str(segment)
                    .decode_utf8_lossy()
                    .into_owned()
            },
        )
}

fn filename_from_disposition(value: &str) -> Option<String> {
    if let Some(captures) = RFC5987_FILENAME_REGEX.captures(value) {
        let decoded = percent_encoding::percent_decode_str(&captures["name"])
            .decode_utf8_lossy()
            .into_owned();
        return Some(decoded);
    }

    PLAIN_FILENAME_REGEX
        .captures(value)
        .map(|captures| captures["name"].trim().to_owned())
}

/// Builds the local filename: sanitized, with the remote extension kept and
/// the stem optionally replaced by the caller's.
fn output_name(remote_name: &str, rename_stem: Option<&str>) -> String {
    let remote = sanitize_filename(remote_name);

    match rename_stem {
        Some(stem) => match remote.rsplit_once('.') {
            Some((_, ext)) => format!("{}.{}", sanitize(stem), ext),
            None => sanitize(stem),
        },
        None => remote,
    }
}
