//! SEARCH and UID SEARCH.
//!
//! A [`SearchQuery`] is an ordered list of search keys with their
//! arguments:
//!
//! ```
//! use browserbox::SearchQuery;
//!
//! // SEARCH UNSEEN HEADER "subject" "hello"
//! let query = SearchQuery::new()
//!     .flag("unseen")
//!     .args("header", ["subject", "hello"]);
//! # let _ = query;
//! ```

use browserbox_imap::{Attribute, Request};
use chrono::NaiveDate;

/// A search query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    terms: Vec<(String, Vec<SearchValue>)>,
}

/// An argument of a search key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchValue {
    /// A number, e.g. for `LARGER`.
    Number(u64),
    /// A string. Non-ASCII text is sent as a UTF-8 literal.
    Text(String),
    /// A date, sent as `1-Jan-2024`.
    Date(NaiveDate),
    /// A nested query, e.g. for `NOT` and `OR`.
    Query(SearchQuery),
}

impl SearchQuery {
    /// Creates an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key without arguments, e.g. `unseen`.
    #[must_use]
    pub fn flag(mut self, key: impl Into<String>) -> Self {
        self.terms.push((key.into(), Vec::new()));
        self
    }

    /// Adds a key with one argument, e.g. `("larger", 1024)`.
    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<SearchValue>) -> Self {
        self.terms.push((key.into(), vec![value.into()]));
        self
    }

    /// Adds a key with several arguments, e.g. `("header", ["subject", "hi"])`.
    #[must_use]
    pub fn args<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SearchValue>,
    {
        self.terms
            .push((key.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Returns true if the query has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl From<&str> for SearchValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SearchValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u64> for SearchValue {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for SearchValue {
    fn from(value: u32) -> Self {
        Self::Number(u64::from(value))
    }
}

impl From<NaiveDate> for SearchValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<SearchQuery> for SearchValue {
    fn from(value: SearchQuery) -> Self {
        Self::Query(value)
    }
}

/// Builds a SEARCH command. `CHARSET UTF-8` is prepended when any string
/// argument, nested ones included, is not ASCII.
pub fn build_search(query: &SearchQuery, by_uid: bool) -> Request {
    let (mut attributes, ascii) = build_terms(query);
    if !ascii {
        attributes.splice(0..0, [Attribute::atom("CHARSET"), Attribute::atom("UTF-8")]);
    }
    Request::with_attributes(if by_uid { "UID SEARCH" } else { "SEARCH" }, attributes)
}

/// Returns the compiled terms and whether every string was ASCII.
fn build_terms(query: &SearchQuery) -> (Vec<Attribute>, bool) {
    let mut attributes = Vec::new();
    let mut ascii = true;

    for (key, values) in &query.terms {
        attributes.push(Attribute::atom(key.to_uppercase()));
        let is_uid = key.eq_ignore_ascii_case("uid");
        for value in values {
            if is_uid {
                attributes.push(Attribute::sequence(match value {
                    SearchValue::Number(n) => n.to_string(),
                    SearchValue::Text(s) => s.clone(),
                    SearchValue::Date(d) => format_date(*d),
                    SearchValue::Query(_) => continue,
                }));
                continue;
            }
            match value {
                SearchValue::Number(n) => attributes.push(Attribute::Number(*n)),
                SearchValue::Text(s) if s.is_ascii() => attributes.push(Attribute::string(s.as_str())),
                SearchValue::Text(s) => {
                    ascii = false;
                    attributes.push(Attribute::literal(s.as_bytes()));
                }
                SearchValue::Date(d) => attributes.push(Attribute::atom(format_date(*d))),
                SearchValue::Query(sub) => {
                    let (terms, sub_ascii) = build_terms(sub);
                    ascii &= sub_ascii;
                    attributes.extend(terms);
                }
            }
        }
    }

    (attributes, ascii)
}

/// Dates are atoms: some servers reject quoted dates.
fn format_date(date: NaiveDate) -> String {
    date.format("%-d-%b-%Y").to_string()
}
