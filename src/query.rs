//! Declarative query-string construction.
//!
//! Request types declare their query fields as an ordered list of
//! name/value pairs instead of being introspected at runtime. Nested
//! parameter objects flatten to `parent[child]` bracket notation,
//! booleans render lower-case, arrays comma-join, and each key and value
//! is percent-encoded independently.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Everything outside the RFC 3986 unreserved set is escaped.
const COMPONENT_SET: &AsciiSet =
    &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Percent-encodes one key or value.
pub(crate) fn encode_component(component: &str) -> String {
    utf8_percent_encode(component, COMPONENT_SET).to_string()
}

/// A single declared query field value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Plain string value.
    Str(String),
    /// Boolean, rendered as lower-case `true`/`false`.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// List of values, comma-joined into one field.
    List(Vec<String>),
    /// Nested parameter object, flattened with bracket notation.
    Object(QueryParams),
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<QueryParams> for QueryValue {
    fn from(value: QueryParams) -> Self {
        Self::Object(value)
    }
}

/// Ordered list of declared query fields for one request type.
///
/// Field order is preserved into the encoded query string, so the string
/// is identical across retries of the same logical call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams(Vec<(String, QueryValue)>);

impl QueryParams {
    /// Creates an empty parameter list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<QueryValue>) {
        self.0.push((name.into(), value.into()));
    }

    /// Appends a field, builder-style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.add(name, value);
        self
    }

    /// Whether no fields are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encodes the fields into a query string (without a leading `?`).
    #[must_use]
    pub fn encode(&self) -> String {
        let mut pairs = Vec::new();
        for (name, value) in &self.0 {
            flatten(name, value, &mut pairs);
        }
        pairs
            .iter()
            .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Flattens one field into raw (unencoded) key/value pairs.
fn flatten(prefix: &str, value: &QueryValue, out: &mut Vec<(String, String)>) {
    match value {
        QueryValue::Str(s) => out.push((prefix.to_owned(), s.clone())),
        QueryValue::Bool(b) => out.push((prefix.to_owned(), b.to_string())),
        QueryValue::Int(i) => out.push((prefix.to_owned(), i.to_string())),
        QueryValue::List(items) => out.push((prefix.to_owned(), items.join(","))),
        QueryValue::Object(params) => {
            for (name, inner) in &params.0 {
                flatten(&format!("{prefix}[{name}]"), inner, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_plain_fields_in_order() {
        let params = QueryParams::new().with("limit", 10_u32).with("after", "PM123");
        assert_eq!(params.encode(), "limit=10&after=PM123");
    }

    #[test]
    fn test_encode_boolean_lower_case() {
        let params = QueryParams::new().with("submitted", true).with("charged", false);
        assert_eq!(params.encode(), "submitted=true&charged=false");
    }

    #[test]
    fn test_encode_nested_object_bracket_notation() {
        let created_at = QueryParams::new().with("gte", "2024-01-01");
        let params = QueryParams::new().with("created_at", created_at);
        assert_eq!(params.encode(), "created_at%5Bgte%5D=2024-01-01");
    }

    #[test]
    fn test_encode_recursive_nesting() {
        let inner = QueryParams::new().with("c", "v");
        let middle = QueryParams::new().with("b", inner);
        let params = QueryParams::new().with("a", middle);
        assert_eq!(params.encode(), "a%5Bb%5D%5Bc%5D=v");
    }

    #[test]
    fn test_encode_list_comma_joined() {
        let params = QueryParams::new()
            .with("status", vec!["pending".to_owned(), "confirmed".to_owned()]);
        assert_eq!(params.encode(), "status=pending%2Cconfirmed");
    }

    #[test]
    fn test_encode_escapes_reserved_characters() {
        let params = QueryParams::new().with("reference", "order 42&co");
        assert_eq!(params.encode(), "reference=order%2042%26co");
    }

    #[test]
    fn test_encode_preserves_unreserved_characters() {
        let params = QueryParams::new().with("id.ext", "a-b_c.d~e");
        assert_eq!(params.encode(), "id.ext=a-b_c.d~e");
    }

    #[test]
    fn test_empty_params() {
        let params = QueryParams::new();
        assert!(params.is_empty());
        assert_eq!(params.encode(), "");
    }

    #[test]
    fn test_mixed_nested_and_plain_preserve_declared_order() {
        let created_at = QueryParams::new().with("gte", "2024-01-01").with("lte", "2024-12-31");
        let params = QueryParams::new()
            .with("created_at", created_at)
            .with("limit", 50_u32);
        assert_eq!(
            params.encode(),
            "created_at%5Bgte%5D=2024-01-01&created_at%5Blte%5D=2024-12-31&limit=50"
        );
    }
}
