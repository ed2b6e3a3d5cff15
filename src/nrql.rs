//! NRQL and entity-search query helpers.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// A `key = value` tag filter for entity search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TagFilter {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

impl TagFilter {
    /// Build a tag filter.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Escape single quotes so a value can sit inside a quoted NRQL string.
pub fn escape_single_quote(s: &str) -> String {
    s.replace('\'', "\\'")
}

/// Undo [`escape_single_quote`].
pub fn revert_escaped_single_quote(s: &str) -> String {
    s.replace("\\'", "'")
}

/// Render tags as `` tags.`key` = 'value' `` clauses joined by `AND`.
pub fn build_tags_query_fragment(tags: &[TagFilter]) -> String {
    tags.iter()
        .map(|tag| format!("tags.`{}` = '{}'", tag.key, tag.value))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Compose an entity search query. Empty arguments contribute no clause.
///
/// `name` is used verbatim; callers escape it first.
pub fn build_entity_search_query(
    name: &str,
    domain: &str,
    entity_type: &str,
    tags: &[TagFilter],
) -> String {
    let mut query = format!("name = '{}'", name);

    if !domain.is_empty() {
        query.push_str(&format!(" AND domain = '{}'", domain));
    }

    if !entity_type.is_empty() {
        query.push_str(&format!(" AND type = '{}'", entity_type));
    }

    let tags_fragment = build_tags_query_fragment(tags);
    if !tags_fragment.is_empty() {
        query.push_str(" AND ");
        query.push_str(&tags_fragment);
    }

    query
}

/// Entity GUID of an alert condition.
pub fn condition_entity_guid(account_id: i64, condition_id: &str) -> String {
    let raw = format!("{}|AIOPS|CONDITION|{}", account_id, condition_id);
    STANDARD_NO_PAD.encode(raw)
}
