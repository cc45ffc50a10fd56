//! Crate-wide error types.
//!
//! Search-side failures (`InvalidQuery`, `SongNotFound`, `PageNotFound`,
//! `RemoteService`) surface immediately without retries. Fetch-side failures
//! distinguish an explicit refusal from the file host (`AccessDenied`) from a
//! silent one (`PermissionDenied`, usually a sharing-permission problem).

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither a free-text term nor any keyed field was supplied.
    #[error("search requires at least one selector (free text or a keyed field)")]
    InvalidQuery,

    /// A non-paginated search returned zero results.
    #[error("no songs found for {query:?}")]
    SongNotFound { query: String },

    /// A paginated search ran past the last page.
    #[error("page {page} does not exist for the given query")]
    PageNotFound { page: u32 },

    /// Transport or decode failure from the search service.
    #[error("chorus service error: {0}")]
    RemoteService(#[from] reqwest::Error),

    /// The file host returned an explicit error caption.
    #[error("file host denied access: {message}")]
    AccessDenied { message: String },

    /// The file host declined without an explicit message.
    #[error("file host declined the download for {url} (is the file shared publicly?)")]
    PermissionDenied { url: String },

    /// The confirmation handshake exceeded the hop cap.
    #[error("too many confirmation redirects while fetching {url}")]
    TooManyRedirects { url: String },

    /// I/O failure while streaming response bytes to disk.
    #[error("transfer failed for {url}: {message}")]
    Transfer { url: String, message: String },

    /// Proxy connection failure.
    #[error("proxy connection failed: {0}")]
    Proxy(String),

    /// Local filesystem failure outside the streaming path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip packaging failure.
    #[error("failed to package archive: {0}")]
    Packaging(#[from] zip::result::ZipError),
}

impl Error {
    pub(crate) fn transfer(url: &url::Url, err: impl std::fmt::Display) -> Self {
        Self::Transfer {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
