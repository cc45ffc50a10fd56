//! Typed song records decoded from the chorus API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One song as returned by the search/listing endpoints.
///
/// The service attaches a fairly open-ended set of metadata per song; the
/// fields every consumer cares about are named, the rest ride along in
/// [`extra`](Self::extra) untouched.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub year: Option<Value>,
    #[serde(default)]
    pub charter: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    /// Logical part name (e.g. `"archive"`, `"chart"`, `"audio"`) to remote
    /// URL. Iteration order is the order the service sent the entries in.
    #[serde(default)]
    pub direct_links: Map<String, Value>,
    /// Whatever other metadata the service attached, carried unvalidated.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Song {
    /// True when the song ships as a single pre-packaged archive upstream,
    /// meaning no local staging or zipping is needed.
    pub fn is_prepackaged(&self) -> bool {
        self.direct_links.len() == 1 && self.direct_links.contains_key("archive")
    }

    /// The direct-links entries with string URLs, in document order.
    pub fn direct_link_urls(&self) -> impl Iterator<Item = (&str, &str)> {
        self.direct_links
            .iter()
            .filter_map(|(part, url)| url.as_str().map(|u| (part.as_str(), u)))
    }

    /// Short human-readable rendering: the headline fields only.
    pub fn summary(&self) -> String {
        fn opt(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or("")
        }

        let year = match &self.year {
            Some(Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => String::new(),
        };

        format!(
            "\"Song\": {{\n    \"id\": {},\n    \"name\": \"{}\",\n    \"artist\": \"{}\",\n    \"album\": \"{}\",\n    \"genre\": \"{}\",\n    \"year\": \"{}\",\n    \"charter\": \"{}\",\n    \"link\": \"{}\"\n}}",
            self.id.map_or_else(|| "null".to_string(), |id| id.to_string()),
            self.name,
            opt(&self.artist),
            opt(&self.album),
            opt(&self.genre),
            year,
            opt(&self.charter),
            opt(&self.link),
        )
    }

    /// Full rendering: every field the service sent, pretty-printed.
    pub fn full_info(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.summary())
    }
}
