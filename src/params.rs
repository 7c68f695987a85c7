//! Raw request parameter access.
//!
//! [`RequestParams`] holds the decoded query-string pairs (in wire order)
//! and the matched route's path parameters for one request. The structured
//! readers on it understand the bracket grammar
//! `filter[<name>][<comparison>]=<value>` and `sort[<name>]=<direction>`
//! plus the scalar `limit` parameter. Reading never fails: malformed keys
//! are ignored, missing groups yield empty sequences. Rejecting bad input
//! is the validator's job, not the parser's.

use axum::extract::{FromRequestParts, RawPathParams};
use axum::http::request::Parts;
use serde::Deserialize;
use std::convert::Infallible;
use url::form_urlencoded;
use utoipa::IntoParams;

/// Decoded query and path parameters for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    query: Vec<(String, String)>,
    path: Vec<(String, String)>,
}

impl RequestParams {
    /// Decodes a raw query string (without the leading `?`) into ordered
    /// key/value pairs. Bracket characters may arrive literally or
    /// percent-encoded; both forms decode to the same keys.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = form_urlencoded::parse(query.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        Self {
            query,
            path: Vec::new(),
        }
    }

    /// Adds a route placeholder value, e.g. `id` from `/users/{id}`. Path
    /// parameters whose name matches a declared filter become implicit `eq`
    /// filters.
    #[must_use]
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.push((name.into(), value.into()));
        self
    }

    /// All `filter[<name>][<comparison>]=<value>` instructions, in query
    /// order. A repeated name/comparison pair keeps its first position but
    /// takes the last value, matching nested-array semantics on the wire.
    pub(crate) fn filter_entries(&self) -> Vec<(String, String, String)> {
        let mut entries: Vec<(String, String, String)> = Vec::new();
        for (key, value) in &self.query {
            let Some(segments) = bracket_segments(key, "filter") else {
                continue;
            };
            let [name, comparison] = segments.as_slice() else {
                continue;
            };
            if name.is_empty() || comparison.is_empty() {
                continue;
            }
            if let Some(existing) = entries
                .iter_mut()
                .find(|(n, c, _)| n == name && c == comparison)
            {
                existing.2 = value.clone();
            } else {
                entries.push((name.clone(), comparison.clone(), value.clone()));
            }
        }
        entries
    }

    /// All `sort[<name>]=<direction>` instructions, in query order, last
    /// value winning per name.
    pub(crate) fn sort_entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = Vec::new();
        for (key, value) in &self.query {
            let Some(segments) = bracket_segments(key, "sort") else {
                continue;
            };
            let [name] = segments.as_slice() else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            if let Some(existing) = entries.iter_mut().find(|(n, _)| n == name) {
                existing.1 = value.clone();
            } else {
                entries.push((name.clone(), value.clone()));
            }
        }
        entries
    }

    /// The scalar `limit` parameter, last occurrence winning.
    pub(crate) fn limit(&self) -> Option<&str> {
        self.query
            .iter()
            .rev()
            .find(|(key, _)| key == "limit")
            .map(|(_, value)| value.as_str())
    }

    pub(crate) fn path_params(&self) -> &[(String, String)] {
        &self.path
    }
}

/// Splits `prefix[a][b]` into `["a", "b"]`. Returns `None` for keys that do
/// not belong to the group or are not well-formed bracket keys.
fn bracket_segments(key: &str, prefix: &str) -> Option<Vec<String>> {
    let rest = key.strip_prefix(prefix)?;
    let inner = rest.strip_prefix('[')?.strip_suffix(']')?;
    Some(inner.split("][").map(str::to_string).collect())
}

impl<S> FromRequestParts<S> for RequestParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let mut params = Self::from_query(parts.uri.query().unwrap_or(""));
        // Outside a router (e.g. direct handler tests) there are no path
        // params; that is not an error.
        if let Ok(path) = RawPathParams::from_request_parts(parts, state).await {
            for (name, value) in &path {
                params.path.push((name.to_string(), value.to_string()));
            }
        }
        Ok(params)
    }
}

/// Documentation-only projection of the wire parameters for
/// `#[utoipa::path(params(ListParams))]`. The real parsing goes through
/// [`RequestParams`]; this struct exists so generated API docs describe the
/// grammar.
#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
#[allow(unused)]
pub struct ListParams {
    /// Filter instructions in the form `filter[<name>][<comparison>]=<value>`.
    ///
    /// Comparisons: `eq`, `neq`, `gt`, `gteq`, `lt`, `lteq`, `in`, `nin`,
    /// `like`. `in`/`nin` take comma-separated values. The literal value
    /// `\null` selects SQL NULL under `eq`/`neq`.
    #[param(example = "filter[status][eq]=open")]
    pub filter: Option<String>,
    /// Sort instructions in the form `sort[<name>]=<direction>`, direction
    /// `asc` or `desc`. Repeat the parameter to sort by several fields.
    #[param(example = "sort[created_at]=desc")]
    pub sort: Option<String>,
    /// Page size as `limit=<N>` or offset and size as `limit=<offset>,<N>`.
    #[param(example = "20,5")]
    pub limit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_entries_follow_query_order() {
        let params =
            RequestParams::from_query("filter[status][eq]=open&filter[priority][gt]=3");
        assert_eq!(
            params.filter_entries(),
            vec![
                ("status".to_string(), "eq".to_string(), "open".to_string()),
                ("priority".to_string(), "gt".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn percent_encoded_brackets_decode_to_the_same_keys() {
        let params = RequestParams::from_query("filter%5Bstatus%5D%5Beq%5D=open");
        assert_eq!(
            params.filter_entries(),
            vec![("status".to_string(), "eq".to_string(), "open".to_string())]
        );
    }

    #[test]
    fn repeated_filter_pair_keeps_position_takes_last_value() {
        let params = RequestParams::from_query(
            "filter[status][eq]=open&filter[priority][gt]=3&filter[status][eq]=closed",
        );
        assert_eq!(
            params.filter_entries(),
            vec![
                ("status".to_string(), "eq".to_string(), "closed".to_string()),
                ("priority".to_string(), "gt".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn malformed_filter_keys_are_ignored() {
        let params = RequestParams::from_query(
            "filter=plain&filter[only_name]=x&filter[a][b][c]=x&filter[][eq]=x&filtering[a][eq]=x",
        );
        assert!(params.filter_entries().is_empty());
    }

    #[test]
    fn missing_groups_yield_empty_sequences() {
        let params = RequestParams::from_query("page=2&q=hello");
        assert!(params.filter_entries().is_empty());
        assert!(params.sort_entries().is_empty());
        assert_eq!(params.limit(), None);
    }

    #[test]
    fn sort_entries_keep_order_and_last_direction() {
        let params =
            RequestParams::from_query("sort[created_at]=desc&sort[name]=asc&sort[created_at]=asc");
        assert_eq!(
            params.sort_entries(),
            vec![
                ("created_at".to_string(), "asc".to_string()),
                ("name".to_string(), "asc".to_string()),
            ]
        );
    }

    #[test]
    fn last_limit_occurrence_wins() {
        let params = RequestParams::from_query("limit=5&limit=20,5");
        assert_eq!(params.limit(), Some("20,5"));
    }

    #[test]
    fn path_params_are_recorded() {
        let params = RequestParams::from_query("").with_path_param("id", "42");
        assert_eq!(params.path_params(), &[("id".to_string(), "42".to_string())]);
    }
}
