//! Saving and restoring which filter and page the gallery shows.
//!
//! Two sources can name a view: the URL query (`?filter=video&page=3`) and a
//! JSON blob saved on exit. The URL wins field by field. Anything malformed is
//! ignored, falling through to the next source and finally to `all`, page 1.

use crate::media::FilterKind;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedView {
    pub filter: FilterKind,
    pub page: usize,
}

impl Default for PersistedView {
    fn default() -> Self {
        Self {
            filter: FilterKind::All,
            page: 1,
        }
    }
}

/// The stored blob, read leniently.
#[derive(Deserialize, Default)]
struct StoredView {
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    page: Option<Value>,
}

impl PersistedView {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Restore a view, preferring the URL query over the stored blob.
    pub fn rehydrate(url_query: Option<&str>, stored_json: Option<&str>) -> Self {
        let (url_filter, url_page) = url_query.map(parse_query).unwrap_or_default();
        let stored = stored_json
            .and_then(|s| serde_json::from_str::<StoredView>(s).ok())
            .unwrap_or_default();

        let filter = url_filter
            .or(stored.filter)
            .map(|f| FilterKind::parse(&f))
            .unwrap_or_default();
        let page = url_page
            .as_deref()
            .and_then(parse_page)
            .or_else(|| stored.page.as_ref().and_then(page_from_value))
            .unwrap_or(1);

        Self { filter, page }
    }
}

fn parse_query(query: &str) -> (Option<String>, Option<String>) {
    let query = query.trim_start_matches('?');
    let Ok(url) = Url::parse(&format!("http://locker/?{query}")) else {
        return (None, None);
    };
    let mut filter = None;
    let mut page = None;
    for (key, value) in url.query_pairs() {
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "filter" => filter = Some(value.into_owned()),
            "page" => page = Some(value.into_owned()),
            _ => {}
        }
    }
    (filter, page)
}

fn parse_page(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|&p| p >= 1)
}

fn page_from_value(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|p| usize::try_from(p).ok()).filter(|&p| p >= 1),
        Value::String(s) => parse_page(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let view = PersistedView {
            filter: FilterKind::Video,
            page: 4,
        };
        let json = view.to_json().unwrap();
        assert_eq!(json, r#"{"filter":"video","page":4}"#);
        assert_eq!(PersistedView::rehydrate(None, Some(&json)), view);
    }

    #[test]
    fn url_takes_precedence() {
        let view = PersistedView::rehydrate(
            Some("?filter=image&page=2"),
            Some(r#"{"filter":"video","page":9}"#),
        );
        assert_eq!(
            view,
            PersistedView {
                filter: FilterKind::Image,
                page: 2
            }
        );
    }

    #[test]
    fn url_fields_override_individually() {
        let view = PersistedView::rehydrate(Some("page=3"), Some(r#"{"filter":"other","page":1}"#));
        assert_eq!(view.filter, FilterKind::Other);
        assert_eq!(view.page, 3);
    }

    #[test]
    fn malformed_inputs_fall_back_to_defaults() {
        assert_eq!(
            PersistedView::rehydrate(Some("page=zero&x"), Some("{not json")),
            PersistedView::default()
        );
        assert_eq!(
            PersistedView::rehydrate(None, Some(r#"{"filter":7,"page":-1}"#)),
            PersistedView::default()
        );
        assert_eq!(PersistedView::rehydrate(None, None), PersistedView::default());
    }

    #[test]
    fn url_query_is_percent_decoded() {
        let view = PersistedView::rehydrate(Some("?filter=vid%65o&page=%32"), None);
        assert_eq!(view.filter, FilterKind::Video);
        assert_eq!(view.page, 2);
    }

    #[test]
    fn stored_page_may_be_a_string() {
        let view = PersistedView::rehydrate(None, Some(r#"{"filter":"image","page":"5"}"#));
        assert_eq!(view.page, 5);
    }

    #[test]
    fn bad_url_page_falls_through_to_stored() {
        let view = PersistedView::rehydrate(Some("page=0"), Some(r#"{"page":2}"#));
        assert_eq!(view.page, 2);
    }
}
