//! Search query construction.
//!
//! A query is either a free-text term or a list of keyed field matches.
//! Free text wins when both are present. No network I/O happens here; the
//! builder only renders the query-string for [`ChorusClient::search`].
//!
//! [`ChorusClient::search`]: crate::client::ChorusClient::search

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{Error, Result};

/// Songs per result page, fixed by the chorus service.
pub const PAGE_SIZE: u32 = 20;

/// Everything the service could mistake for query-string structure.
const QUERY_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'&')
    .add(b'=')
    .add(b'+')
    .add(b'%');

/// A keyed search field recognized by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Name,
    Artist,
    Album,
    Genre,
    Year,
    Charter,
}

impl SearchField {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Genre => "genre",
            Self::Year => "year",
            Self::Charter => "charter",
        }
    }
}

/// Builder for a chorus search request.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    generic: Option<String>,
    fields: Vec<(SearchField, String)>,
    page: Option<u32>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free-text query. Takes precedence over any keyed fields.
    pub fn generic(term: impl Into<String>) -> Self {
        Self {
            generic: Some(term.into()),
            ..Self::default()
        }
    }

    /// Adds a keyed field match. Fields render in the order they are added.
    #[must_use]
    pub fn field(mut self, field: SearchField, value: impl Into<String>) -> Self {
        self.fields.push((field, value.into()));
        self
    }

    #[must_use]
    pub fn name(self, value: impl Into<String>) -> Self {
        self.field(SearchField::Name, value)
    }

    #[must_use]
    pub fn artist(self, value: impl Into<String>) -> Self {
        self.field(SearchField::Artist, value)
    }

    #[must_use]
    pub fn album(self, value: impl Into<String>) -> Self {
        self.field(SearchField::Album, value)
    }

    #[must_use]
    pub fn genre(self, value: impl Into<String>) -> Self {
        self.field(SearchField::Genre, value)
    }

    #[must_use]
    pub fn year(self, value: impl Into<String>) -> Self {
        self.field(SearchField::Year, value)
    }

    #[must_use]
    pub fn charter(self, value: impl Into<String>) -> Self {
        self.field(SearchField::Charter, value)
    }

    /// Zero-based result page. Page `n` maps to offset `n * 20`.
    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub(crate) const fn requested_page(&self) -> Option<u32> {
        self.page
    }

    /// The raw (unencoded) search term.
    ///
    /// Keyed fields render as `field="value"` joined by single spaces, in
    /// the order they were supplied.
    pub fn term(&self) -> Result<String> {
        if let Some(generic) = &self.generic {
            if !generic.is_empty() {
                return Ok(generic.clone());
            }
        }

        if self.fields.is_empty() {
            return Err(Error::InvalidQuery);
        }

        Ok(self
            .fields
            .iter()
            .map(|(field, value)| format!("{}=\"{}\"", field.as_str(), value))
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// The ready-to-send query string: `query=<encoded term>[&from=<offset>]`.
    pub fn to_query_string(&self) -> Result<String> {
        let term = self.term()?;
        let mut out = format!("query={}", utf8_percent_encode(&term, QUERY_SET));

        if let Some(page) = self.page {
            out.push_str(&format!("&from={}", page * PAGE_SIZE));
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_fields_render_in_supplied_order() {
        let query = SearchQuery::new()
            .artist("Rick Astley")
            .name("Never Gonna Give You Up")
            .charter("msc");
        assert_eq!(
            query.term().expect("term"),
            r#"artist="Rick Astley" name="Never Gonna Give You Up" charter="msc""#
        );
    }

    #[test]
    fn generic_takes_precedence_over_fields() {
        let query = SearchQuery::generic("through the fire").name("ignored");
        assert_eq!(query.term().expect("term"), "through the fire");
    }

    #[test]
    fn empty_query_is_rejected() {
        assert!(matches!(SearchQuery::new().term(), Err(Error::InvalidQuery)));
        assert!(matches!(
            SearchQuery::new().to_query_string(),
            Err(Error::InvalidQuery)
        ));
    }

    #[test]
    fn page_appends_scaled_offset() {
        let qs = SearchQuery::generic("foo")
            .page(3)
            .to_query_string()
            .expect("query string");
        assert!(qs.ends_with("&from=60"));
    }

    #[test]
    fn no_page_means_no_offset_param() {
        let qs = SearchQuery::generic("foo").to_query_string().expect("query string");
        assert!(!qs.contains("from="));
    }

    #[test]
    fn term_is_percent_encoded() {
        let qs = SearchQuery::new()
            .name("a b")
            .to_query_string()
            .expect("query string");
        assert_eq!(qs, "query=name%3D%22a%20b%22");
    }
}
