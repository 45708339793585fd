//! Request URL assembly for the GISCO, Nominatim and Google endpoints.
//!
//! Filters are emitted in insertion order and values are written verbatim:
//! no percent-encoding is performed, so callers must pass values that are
//! already URL-safe (see [`crate::location::Place::to_url`]).

use std::fmt;
use std::str::FromStr;

use crate::location::{Error, Result};

/// Web protocols accepted by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(Error::Configuration(format!(
                "web protocol '{}' not recognised (expected http or https)",
                other
            ))),
        }
    }
}

/// A filter value: one `key=value` pair for a scalar, one pair per element for a list.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Scalar(String),
    List(Vec<String>),
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::Scalar(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::Scalar(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Scalar(v.to_string())
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Scalar(v.to_string())
    }
}

impl From<u16> for FilterValue {
    fn from(v: u16) -> Self {
        Self::Scalar(v.to_string())
    }
}

impl<T: ToString> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.iter().map(ToString::to_string).collect())
    }
}

/// Builder for request URLs of the form `protocol://domain/path/query?k=v&...`.
///
/// The protocol is kept as given and validated in [`UrlBuilder::build`], so
/// an unsupported value surfaces as [`Error::Configuration`].
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    domain: String,
    protocol: String,
    path: Option<String>,
    query: Option<String>,
    filters: Vec<(String, FilterValue)>,
}

impl UrlBuilder {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            protocol: Protocol::default().as_str().to_string(),
            path: None,
            query: None,
            filters: Vec::new(),
        }
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Append a filter. Pairs are emitted in the order filters are added.
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    pub fn build(&self) -> Result<String> {
        let protocol: Protocol = self.protocol.parse()?;

        let mut url = self.domain.trim_end_matches('/').to_string();
        if url.is_empty() {
            return Err(Error::Configuration("empty domain".into()));
        }
        if !url.contains("://") {
            url = format!("{}://{}", protocol, url);
        }

        if let Some(ref path) = self.path {
            url = format!("{}/{}", url, path);
        }
        if let Some(ref query) = self.query {
            url = format!("{}/{}?", url, query);
        }

        if !self.filters.is_empty() {
            let pairs: Vec<String> = self
                .filters
                .iter()
                .flat_map(|(key, value)| match value {
                    FilterValue::Scalar(v) => vec![format!("{}={}", key, v)],
                    FilterValue::List(vs) => vs.iter().map(|v| format!("{}={}", key, v)).collect(),
                })
                .collect();
            let sep = if url.ends_with('?') || url.ends_with('/') { "" } else { "?" };
            url = format!("{}{}{}", url, sep, pairs.join("&"));
        }

        Ok(url)
    }
}

/// One-shot form of [`UrlBuilder`].
pub fn build_url<K, V>(
    domain: &str,
    protocol: Option<&str>,
    path: Option<&str>,
    query: Option<&str>,
    filters: impl IntoIterator<Item = (K, V)>,
) -> Result<String>
where
    K: Into<String>,
    V: Into<FilterValue>,
{
    let mut builder = UrlBuilder::new(domain);
    if let Some(p) = protocol {
        builder = builder.protocol(p);
    }
    if let Some(p) = path {
        builder = builder.path(p);
    }
    if let Some(q) = query {
        builder = builder.query(q);
    }
    for (k, v) in filters {
        builder = builder.filter(k, v);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_path_query_filters() {
        let url = build_url("eurostat.eu", None, Some("nuts"), Some("find"), [("x", 1), ("y", 2)]).unwrap();
        assert_eq!(url, "http://eurostat.eu/nuts/find?x=1&y=2");
    }

    #[test]
    fn test_filter_order_is_insertion_order() {
        let url = build_url("eurostat.eu", None, Some("nuts"), Some("find"), [("y", 2), ("x", 1)]).unwrap();
        assert_eq!(url, "http://eurostat.eu/nuts/find?y=2&x=1");
    }

    #[test]
    fn test_build_is_repeatable() {
        let builder = UrlBuilder::new("europa.eu/webtools/rest/gisco/")
            .query("api")
            .filter("q", "Bremen+Germany");
        let first = builder.build().unwrap();
        assert_eq!(first, builder.build().unwrap());
        assert_eq!(first, "http://europa.eu/webtools/rest/gisco/api?q=Bremen+Germany");
    }

    #[test]
    fn test_list_values_replicate_key() {
        let url = UrlBuilder::new("example.org")
            .filter("id", vec!["DE50", "ITI1"])
            .filter("f", "JSON")
            .build()
            .unwrap();
        assert_eq!(url, "http://example.org?id=DE50&id=ITI1&f=JSON");
    }

    #[test]
    fn test_https_and_existing_scheme() {
        let url = UrlBuilder::new("maps.googleapis.com").protocol("https").path("maps").build().unwrap();
        assert_eq!(url, "https://maps.googleapis.com/maps");

        let url = UrlBuilder::new("https://nominatim.openstreetmap.org/").build().unwrap();
        assert_eq!(url, "https://nominatim.openstreetmap.org");
    }

    #[test]
    fn test_query_without_filters_keeps_question_mark() {
        let url = UrlBuilder::new("example.org").query("api").build().unwrap();
        assert_eq!(url, "http://example.org/api?");
    }

    #[test]
    fn test_trailing_slash_suppresses_separator() {
        let url = UrlBuilder::new("example.org").path("dir/").filter("a", "b").build().unwrap();
        assert_eq!(url, "http://example.org/dir/a=b");
    }

    #[test]
    fn test_values_are_not_encoded() {
        let url = UrlBuilder::new("example.org").query("api").filter("q", "a b&c").build().unwrap();
        assert_eq!(url, "http://example.org/api?q=a b&c");
    }

    #[test]
    fn test_unknown_protocol_rejected() {
        let err = UrlBuilder::new("example.org").protocol("ftp").build().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!("gopher".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_empty_domain_rejected() {
        let err = UrlBuilder::new("/").build().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_float_filters() {
        let url = UrlBuilder::new("example.org").filter("x", 8.8).filter("y", 53.08).build().unwrap();
        assert_eq!(url, "http://example.org?x=8.8&y=53.08");
    }
}
