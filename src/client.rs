//! Thin client over the chorus search/listing endpoints.

use serde::Deserialize;
use tracing::{debug, trace};

use crate::{
    error::{Error, Result},
    query::SearchQuery,
    song::Song,
};

const API_BASE: &str = "https://chorus.fightthe.pw/api";

#[derive(Debug, Deserialize)]
struct SongsResponse {
    songs: Vec<Song>,
}

/// Client for the chorus search service. One HTTP GET per call, no retries;
/// transport and decode failures surface as [`Error::RemoteService`].
#[derive(Debug, Clone)]
pub struct ChorusClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for ChorusClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ChorusClient {
    pub fn new() -> Self {
        Self::with_base_url(API_BASE)
    }

    /// Points the client at a different service root, e.g. a local mock.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Runs a search and decodes the matching songs.
    ///
    /// Zero results fail: with [`Error::PageNotFound`] when a page was
    /// requested (pagination ran out), with [`Error::SongNotFound`] naming
    /// the search term otherwise.
    #[tracing::instrument(skip_all)]
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Song>> {
        let url = format!("{}/search?{}", self.base_url, query.to_query_string()?);
        trace!(url, "Searching");

        let payload: SongsResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(results = payload.songs.len(), "Search finished");
        require_songs(payload.songs, &query.term()?, query.requested_page())
    }

    /// The 20 most recently added songs.
    pub async fn latest(&self) -> Result<Vec<Song>> {
        self.listing("latest").await
    }

    /// 20 random songs.
    pub async fn random(&self) -> Result<Vec<Song>> {
        self.listing("random").await
    }

    /// Total number of songs the service knows about.
    pub async fn count(&self) -> Result<u64> {
        let url = format!("{}/count", self.base_url);
        let count = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<u64>()
            .await?;
        Ok(count)
    }

    async fn listing(&self, endpoint: &str) -> Result<Vec<Song>> {
        let url = format!("{}/{}", self.base_url, endpoint);
        trace!(url, "Fetching listing");

        let payload: SongsResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(payload.songs)
    }
}

/// Maps an empty result set to the right not-found error.
fn require_songs(songs: Vec<Song>, term: &str, page: Option<u32>) -> Result<Vec<Song>> {
    if songs.is_empty() {
        return Err(match page {
            Some(page) => Error::PageNotFound { page },
            None => Error::SongNotFound {
                query: term.to_owned(),
            },
        });
    }

    Ok(songs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_songs(raw: &str) -> Vec<Song> {
        serde_json::from_str::<SongsResponse>(raw)
            .expect("payload decodes")
            .songs
    }

    #[test]
    fn one_song_payload_decodes_with_matching_name() {
        let songs = decode_songs(
            r#"{"songs": [{"name": "Never Gonna Give You Up", "artist": "Rick Astley",
                "directLinks": {"archive": "https://drive.google.com/uc?id=x"}}]}"#,
        );
        let songs = require_songs(songs, r#"name="Never Gonna Give You Up""#, None)
            .expect("non-empty results pass through");

        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].name, "Never Gonna Give You Up");
    }

    #[test]
    fn empty_results_without_page_is_song_not_found() {
        let err = require_songs(decode_songs(r#"{"songs": []}"#), "Nonexistent Song XYZ", None)
            .unwrap_err();
        match err {
            Error::SongNotFound { query } => assert!(query.contains("Nonexistent Song XYZ")),
            other => panic!("expected SongNotFound, got {other:?}"),
        }
    }

    #[test]
    fn empty_results_with_page_is_page_not_found() {
        let err =
            require_songs(decode_songs(r#"{"songs": []}"#), "anything", Some(4)).unwrap_err();
        assert!(matches!(err, Error::PageNotFound { page: 4 }));
    }

    #[test]
    fn count_payload_is_a_plain_number() {
        let count: u64 = serde_json::from_str("42").expect("count decodes");
        assert_eq!(count, 42);
    }
}
