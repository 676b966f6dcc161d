// ============================================================
// Layer 3 — Instance and Field Types
// ============================================================
// An Instance is one model-ready unit: a mapping from field
// names to typed field values.
//
//   Field::Text        token sequence + vocabulary namespace
//   Field::Span        inclusive [start, end] positions into a Text field
//   Field::Label       categorical value already mapped to an integer
//   Field::MultiLabel  set of string labels (always a set, even for one)
//   Field::Numeric     scalar target
//   Field::Metadata    opaque passthrough string
//   Field::List        ordered list of fields (e.g. one span per target)
//
// Instances are produced lazily by each task, one per input
// row or record, and are never batched or padded here.

use serde::Serialize;
use std::collections::BTreeMap;

/// Namespace used for input tokens unless a task says otherwise
pub const DEFAULT_TOKEN_NAMESPACE: &str = "tokens";

// ─── TokenIndexer ─────────────────────────────────────────────────────────────
/// Names the vocabulary namespace a text field is indexed under.
/// Tasks that keep a private target vocabulary (tags, MT targets)
/// build their own indexer so ids never collide across tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIndexer {
    pub namespace: String,
}

impl TokenIndexer {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into() }
    }
}

impl Default for TokenIndexer {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_NAMESPACE)
    }
}

// ─── Field ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Field {
    Text { tokens: Vec<String>, namespace: String },
    /// Inclusive on both ends
    Span { start: usize, end: usize },
    Label { value: i64, namespace: String },
    MultiLabel { labels: Vec<String>, namespace: String },
    Numeric { value: f64 },
    Metadata { value: String },
    List { items: Vec<Field> },
}

impl Field {
    pub fn text(tokens: Vec<String>, indexer: &TokenIndexer) -> Self {
        Field::Text { tokens, namespace: indexer.namespace.clone() }
    }

    pub fn label(value: i64, namespace: impl Into<String>) -> Self {
        Field::Label { value, namespace: namespace.into() }
    }

    pub fn multi_label(labels: Vec<String>, namespace: impl Into<String>) -> Self {
        Field::MultiLabel { labels, namespace: namespace.into() }
    }

    pub fn numeric(value: f64) -> Self {
        Field::Numeric { value }
    }

    pub fn metadata(value: impl Into<String>) -> Self {
        Field::Metadata { value: value.into() }
    }

    pub fn span(start: usize, end: usize) -> Self {
        Field::Span { start, end }
    }

    pub fn list(items: Vec<Field>) -> Self {
        Field::List { items }
    }
}

// ─── Instance ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Instance {
    fields: BTreeMap<String, Field>,
}

impl Instance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, field: Field) {
        self.fields.insert(name.into(), field);
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Tokens of a Text field
    pub fn tokens(&self, name: &str) -> Option<&[String]> {
        match self.fields.get(name) {
            Some(Field::Text { tokens, .. }) => Some(tokens),
            _ => None,
        }
    }

    /// Value of a Label field
    pub fn label(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(Field::Label { value, .. }) => Some(*value),
            _ => None,
        }
    }

    /// Value of a Numeric field
    pub fn numeric(&self, name: &str) -> Option<f64> {
        match self.fields.get(name) {
            Some(Field::Numeric { value }) => Some(*value),
            _ => None,
        }
    }

    /// Items of a List field
    pub fn list(&self, name: &str) -> Option<&[Field]> {
        match self.fields.get(name) {
            Some(Field::List { items }) => Some(items),
            _ => None,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_typed_accessors() {
        let inst = Instance::new()
            .with("input1", Field::text(toks("a b"), &TokenIndexer::default()))
            .with("labels", Field::label(1, "labels"))
            .with("score", Field::numeric(0.5));

        assert_eq!(inst.tokens("input1").unwrap(), &["a", "b"]);
        assert_eq!(inst.label("labels"), Some(1));
        assert_eq!(inst.numeric("score"), Some(0.5));
        // Wrong type → None rather than a panic
        assert_eq!(inst.label("input1"), None);
        assert_eq!(inst.len(), 3);
    }

    #[test]
    fn test_serialises_as_flat_map() {
        let inst = Instance::new().with("idx", Field::metadata("7"));
        let json = serde_json::to_value(&inst).unwrap();
        assert_eq!(json["idx"]["type"], "metadata");
        assert_eq!(json["idx"]["value"], "7");
    }
}
