//! Client for the chorus.fightthe.pw chart search API.
//!
//! Searching returns typed [`Song`] records; downloading turns a song's
//! direct links into a single local archive, transparently handling the
//! Drive confirmation handshake (cookies, confirm tokens, streamed
//! transfer).
//!
//! ```no_run
//! use chorus::{Archiver, ChorusClient, Fetcher, SearchQuery};
//!
//! # async fn run() -> chorus::Result<()> {
//! let client = ChorusClient::new();
//! let songs = client
//!     .search(&SearchQuery::new().name("Never Gonna Give You Up"))
//!     .await?;
//!
//! let mut fetcher = Fetcher::new()?;
//! let archive = Archiver::new(".").download(&mut fetcher, &songs[0], None).await?;
//! println!("saved to {}", archive.display());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod client;
pub mod error;
pub mod fetch;
pub mod helpers;
pub mod query;
pub mod song;

pub use archive::Archiver;
pub use client::ChorusClient;
pub use error::{Error, Result};
pub use fetch::{drive, FetchOptions, Fetcher, ProgressFn};
pub use helpers::sanitize::sanitize;
pub use query::{SearchField, SearchQuery, PAGE_SIZE};
pub use song::Song;
