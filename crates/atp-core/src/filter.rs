//! Typed metadata and document-text filters.
//!
//! Only the fields in [`FilterField`] can be filtered on. A [`FilterBuilder`]
//! collects normalized values per field and compiles them into a
//! [`WhereClause`], which renders either as the Chroma filter grammar
//! (`$eq`, `$in`, `$and`) or as a Lance SQL predicate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Metadata fields that can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    VideoId,
    Title,
    Preacher,
    Section,
}

impl FilterField {
    pub const ALL: [FilterField; 4] = [Self::VideoId, Self::Title, Self::Preacher, Self::Section];

    /// Metadata key / column name for this field.
    pub fn key(self) -> &'static str {
        match self {
            Self::VideoId => "video_id",
            Self::Title => "title",
            Self::Preacher => "preacher",
            Self::Section => "section",
        }
    }

    /// Trims the raw value; blank values are dropped. Titles, preachers and
    /// sections are stored lowercase in the index, video ids verbatim.
    pub fn normalize(self, raw: &str) -> Option<String> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        Some(match self {
            Self::VideoId => value.to_string(),
            Self::Title | Self::Preacher | Self::Section => value.to_lowercase(),
        })
    }
}

/// A single per-field condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Eq { field: FilterField, value: String },
    In { field: FilterField, values: Vec<String> },
}

impl Condition {
    pub fn field(&self) -> FilterField {
        match self {
            Self::Eq { field, .. } | Self::In { field, .. } => *field,
        }
    }

    pub fn to_json(&self) -> Value {
        let op = match self {
            Self::Eq { value, .. } => json!({ "$eq": value }),
            Self::In { values, .. } => json!({ "$in": values }),
        };
        let mut map = Map::new();
        map.insert(self.field().key().to_string(), op);
        Value::Object(map)
    }

    pub fn to_sql(&self) -> String {
        match self {
            Self::Eq { field, value } => format!("{} = {}", field.key(), sql_literal(value)),
            Self::In { field, values } => {
                let list = values.iter().map(|v| sql_literal(v)).collect::<Vec<_>>().join(", ");
                format!("{} IN ({})", field.key(), list)
            }
        }
    }
}

/// Compiled metadata filter. Never empty: "no filter" is `Option::None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhereClause {
    Condition(Condition),
    And(Vec<Condition>),
}

impl WhereClause {
    pub fn conditions(&self) -> &[Condition] {
        match self {
            Self::Condition(c) => std::slice::from_ref(c),
            Self::And(cs) => cs,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Condition(c) => c.to_json(),
            Self::And(cs) => {
                json!({ "$and": cs.iter().map(Condition::to_json).collect::<Vec<_>>() })
            }
        }
    }

    pub fn to_sql(&self) -> String {
        match self {
            Self::Condition(c) => c.to_sql(),
            Self::And(cs) => cs
                .iter()
                .map(|c| format!("({})", c.to_sql()))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }
}

impl Serialize for WhereClause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Substring containment on the chunk text (`$contains`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFilter {
    needle: String,
}

impl DocumentFilter {
    /// `None` when the substring is blank after trimming.
    pub fn contains(raw: &str) -> Option<Self> {
        let needle = raw.trim();
        (!needle.is_empty()).then(|| Self { needle: needle.to_string() })
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn to_json(&self) -> Value {
        json!({ "$contains": self.needle })
    }

    /// `LIKE` pattern matching the needle as a literal substring. `%` and `_`
    /// are backslash-escaped. A backslash in the needle widens to `_`, so the
    /// predicate can over-match there and callers re-check with
    /// [`DocumentFilter::matches`].
    pub fn to_sql(&self, column: &str) -> String {
        let mut pattern = String::with_capacity(self.needle.len() + 2);
        for c in self.needle.chars() {
            match c {
                '%' | '_' => {
                    pattern.push('\\');
                    pattern.push(c);
                }
                '\\' => pattern.push('_'),
                '\'' => pattern.push_str("''"),
                _ => pattern.push(c),
            }
        }
        format!("{column} LIKE '%{pattern}%'")
    }

    /// Case-sensitive literal substring test, as `$contains` does.
    pub fn matches(&self, document: &str) -> bool {
        document.contains(self.needle.as_str())
    }
}

impl Serialize for DocumentFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Collects filter values per field and compiles them into a [`WhereClause`].
///
/// One distinct value for a field becomes `$eq`, several become `$in`.
/// Conditions are emitted in [`FilterField`] order so that the result does not
/// depend on the order values were added in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterBuilder {
    values: BTreeMap<FilterField, Vec<String>>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, field: FilterField, value: impl AsRef<str>) -> Self {
        self.push(field, value);
        self
    }

    #[must_use]
    pub fn with_all<I, S>(mut self, field: FilterField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for value in values {
            self.push(field, value);
        }
        self
    }

    pub fn push(&mut self, field: FilterField, value: impl AsRef<str>) {
        let Some(value) = field.normalize(value.as_ref()) else { return };
        let entry = self.values.entry(field).or_default();
        if !entry.contains(&value) {
            entry.push(value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(Vec::is_empty)
    }

    pub fn build(&self) -> Option<WhereClause> {
        let mut conditions: Vec<Condition> = self
            .values
            .iter()
            .filter_map(|(field, values)| match values.as_slice() {
                [] => None,
                [single] => Some(Condition::Eq { field: *field, value: single.clone() }),
                many => Some(Condition::In { field: *field, values: many.to_vec() }),
            })
            .collect();
        match conditions.len() {
            0 => None,
            1 => conditions.pop().map(WhereClause::Condition),
            _ => Some(WhereClause::And(conditions)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_values_means_no_clause() {
        assert_eq!(FilterBuilder::new().build(), None);
        let blank =
            FilterBuilder::new().with(FilterField::Preacher, "   ").with(FilterField::Title, "");
        assert!(blank.is_empty());
        assert_eq!(blank.build(), None);
    }

    #[test]
    fn single_value_is_used_directly() {
        let clause =
            FilterBuilder::new().with(FilterField::Preacher, "  Steven Anderson ").build().unwrap();
        assert_eq!(
            clause,
            WhereClause::Condition(Condition::Eq {
                field: FilterField::Preacher,
                value: "steven anderson".into()
            })
        );
        assert_eq!(clause.to_json(), json!({ "preacher": { "$eq": "steven anderson" } }));
    }

    #[test]
    fn several_fields_are_conjoined_in_field_order() {
        let a = FilterBuilder::new()
            .with(FilterField::Section, "Salvation")
            .with(FilterField::VideoId, "1234567")
            .build()
            .unwrap();
        let b = FilterBuilder::new()
            .with(FilterField::VideoId, "1234567")
            .with(FilterField::Section, "salvation")
            .build()
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.to_json(),
            json!({ "$and": [
                { "video_id": { "$eq": "1234567" } },
                { "section": { "$eq": "salvation" } }
            ]})
        );
        assert_eq!(a.conditions().len(), 2);
    }

    #[test]
    fn repeated_field_becomes_set_membership() {
        let clause = FilterBuilder::new()
            .with_all(FilterField::Preacher, ["A", "b", "a", " "])
            .build()
            .unwrap();
        assert_eq!(clause.to_json(), json!({ "preacher": { "$in": ["a", "b"] } }));
        assert_eq!(clause.to_sql(), "preacher IN ('a', 'b')");
    }

    #[test]
    fn video_ids_keep_their_case() {
        assert_eq!(FilterField::VideoId.normalize(" AbC "), Some("AbC".to_string()));
        assert_eq!(FilterField::Title.normalize(" AbC "), Some("abc".to_string()));
    }

    #[test]
    fn sql_rendering_escapes_quotes() {
        let clause = FilterBuilder::new()
            .with(FilterField::Title, "Don't Quit")
            .with(FilterField::Preacher, "o'neil")
            .build()
            .unwrap();
        assert_eq!(clause.to_sql(), "(title = 'don''t quit') AND (preacher = 'o''neil')");
        let doc = DocumentFilter::contains(" it's ").unwrap();
        assert_eq!(doc.to_sql("document"), "document LIKE '%it''s%'");
    }

    #[test]
    fn sql_rendering_escapes_like_wildcards() {
        let doc = DocumentFilter::contains("100%").unwrap();
        assert_eq!(doc.to_sql("document"), r"document LIKE '%100\%%'");
        let doc = DocumentFilter::contains("a_b").unwrap();
        assert_eq!(doc.to_sql("document"), r"document LIKE '%a\_b%'");
        let doc = DocumentFilter::contains(r"c:\dir").unwrap();
        assert_eq!(doc.to_sql("document"), "document LIKE '%c:_dir%'");
        assert!(doc.matches(r"see c:\dir here"));
        assert!(!doc.matches("see c:/dir here"));
    }

    #[test]
    fn document_filter_ignores_blank_input() {
        assert!(DocumentFilter::contains("  ").is_none());
        let doc = DocumentFilter::contains(" repent ").unwrap();
        assert_eq!(doc.needle(), "repent");
        assert_eq!(serde_json::to_value(&doc).unwrap(), json!({ "$contains": "repent" }));
    }
}
