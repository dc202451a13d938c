//! Typed view over one search hit

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields tried, in order, for a candidate's identifier
const ID_FIELDS: &[&str] = &["id", "key", "document_id"];

/// Fields tried, in order, for a candidate's source locator
const SOURCE_FIELDS: &[&str] = &["source", "url", "path"];

/// Extractive answer or caption returned alongside a hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Fragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlights: None,
            score: None,
        }
    }

    /// Parse one fragment
    ///
    /// Entries without a string `text` are kept with empty text so they hold
    /// their position; an empty first fragment counts as no fragment.
    fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name);
        Self {
            text: field("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            highlights: field("highlights")
                .and_then(Value::as_str)
                .map(str::to_string),
            score: field("score").and_then(Value::as_f64),
        }
    }
}

/// One retrieved document plus its relevance metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// First of `id` / `key` / `document_id`
    pub id: Option<String>,

    /// First of `source` / `url` / `path`
    pub source: Option<String>,

    /// Relevance score, higher is better
    pub score: Option<f64>,

    /// Extractive answers, best first
    #[serde(default)]
    pub answers: Vec<Fragment>,

    /// Extractive captions, best first
    #[serde(default)]
    pub captions: Vec<Fragment>,

    /// Index fields as returned, without `@search.*` annotations
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Candidate {
    /// Build a candidate from a document's field map
    pub fn new(fields: Map<String, Value>) -> Self {
        let id = first_present(&fields, ID_FIELDS);
        let source = first_present(&fields, SOURCE_FIELDS);
        Self {
            id,
            source,
            score: None,
            answers: Vec::new(),
            captions: Vec::new(),
            fields,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_answers(mut self, answers: Vec<Fragment>) -> Self {
        self.answers = answers;
        self
    }

    pub fn with_captions(mut self, captions: Vec<Fragment>) -> Self {
        self.captions = captions;
        self
    }

    /// Build a candidate from one entry of a search response's `value` array
    ///
    /// Returns `None` for entries that are not JSON objects.
    pub fn from_search_hit(hit: &Value) -> Option<Self> {
        let obj = hit.as_object()?;

        let score = obj.get("@search.score").and_then(Value::as_f64);
        let captions = fragments(obj.get("@search.captions"));
        let answers = fragments(obj.get("@search.answers"));

        let fields: Map<String, Value> = obj
            .iter()
            .filter(|(k, _)| !k.starts_with("@search."))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut candidate = Self::new(fields)
            .with_answers(answers)
            .with_captions(captions);
        candidate.score = score;
        Some(candidate)
    }

    /// Score used for ranking; an absent or NaN score ranks as 0, and
    /// `-0.0` ranks as `0.0`
    pub fn rank_score(&self) -> f64 {
        self.score
            .filter(|s| !s.is_nan() && *s != 0.0)
            .unwrap_or(0.0)
    }

    /// First non-blank string among `names`, in order
    pub fn first_text_field<S: AsRef<str>>(&self, names: &[S]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.fields.get(name.as_ref()))
            .filter_map(Value::as_str)
            .find(|text| !text.trim().is_empty())
    }
}

fn fragments(value: Option<&Value>) -> Vec<Fragment> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().map(Fragment::from_value).collect())
        .unwrap_or_default()
}

/// First field in `names` holding a non-empty string or a number
fn first_present(fields: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match fields.get(*name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
