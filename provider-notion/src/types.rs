//! Record-store data model
//!
//! Records arrive as pages whose `properties` object maps a column name to a
//! tagged value: `{"type": "select", "select": {"name": "Done"}}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{NotionError, Result};

/// Row key holding the record identifier
pub const ID_KEY: &str = "_id";
/// Row key holding the record's canonical link
pub const URL_KEY: &str = "_url";

/// One span of rich text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    #[serde(default)]
    pub plain_text: String,
}

/// Option of a select, multi-select or status column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Column kind as declared by the schema
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Title,
    RichText,
    Number,
    Select,
    MultiSelect,
    Date,
    Checkbox,
    Url,
    Email,
    PhoneNumber,
    Status,
    /// Any tag this crate does not decode: formula, relation, people...
    Other(String),
}

impl PropertyKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "title" => Self::Title,
            "rich_text" => Self::RichText,
            "number" => Self::Number,
            "select" => Self::Select,
            "multi_select" => Self::MultiSelect,
            "date" => Self::Date,
            "checkbox" => Self::Checkbox,
            "url" => Self::Url,
            "email" => Self::Email,
            "phone_number" => Self::PhoneNumber,
            "status" => Self::Status,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            Self::Title => "title",
            Self::RichText => "rich_text",
            Self::Number => "number",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::Date => "date",
            Self::Checkbox => "checkbox",
            Self::Url => "url",
            Self::Email => "email",
            Self::PhoneNumber => "phone_number",
            Self::Status => "status",
            Self::Other(tag) => tag.as_str(),
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A tagged property value
///
/// Parsing is total: an unknown tag, or a known tag whose payload has an
/// unexpected shape, is kept as [`PropertyValue::Other`] with the raw object.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Title(Vec<TextRun>),
    RichText(Vec<TextRun>),
    Number(Option<Number>),
    Select(Option<SelectOption>),
    MultiSelect(Vec<SelectOption>),
    /// Keeps the range end, which the flat decoding drops
    Date(Option<DateRange>),
    Checkbox(Option<bool>),
    Url(Option<String>),
    Email(Option<String>),
    PhoneNumber(Option<String>),
    Status(Option<SelectOption>),
    Other(Value),
}

impl PropertyValue {
    pub fn from_json(raw: &Value) -> Self {
        let Some(tag) = raw.get("type").and_then(Value::as_str) else {
            return Self::Other(raw.clone());
        };
        let null = Value::Null;
        let payload = raw.get(tag).unwrap_or(&null);

        let parsed = match PropertyKind::from_tag(tag) {
            PropertyKind::Title => list(payload).map(Self::Title),
            PropertyKind::RichText => list(payload).map(Self::RichText),
            PropertyKind::Number => match payload {
                Value::Null => Some(Self::Number(None)),
                Value::Number(n) => Some(Self::Number(Some(n.clone()))),
                _ => None,
            },
            PropertyKind::Select => nullable(payload).map(Self::Select),
            PropertyKind::MultiSelect => list(payload).map(Self::MultiSelect),
            PropertyKind::Date => nullable(payload).map(Self::Date),
            PropertyKind::Checkbox => nullable(payload).map(Self::Checkbox),
            PropertyKind::Url => nullable(payload).map(Self::Url),
            PropertyKind::Email => nullable(payload).map(Self::Email),
            PropertyKind::PhoneNumber => nullable(payload).map(Self::PhoneNumber),
            PropertyKind::Status => nullable(payload).map(Self::Status),
            PropertyKind::Other(_) => None,
        };
        parsed.unwrap_or_else(|| Self::Other(raw.clone()))
    }

    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Title(_) => PropertyKind::Title,
            Self::RichText(_) => PropertyKind::RichText,
            Self::Number(_) => PropertyKind::Number,
            Self::Select(_) => PropertyKind::Select,
            Self::MultiSelect(_) => PropertyKind::MultiSelect,
            Self::Date(_) => PropertyKind::Date,
            Self::Checkbox(_) => PropertyKind::Checkbox,
            Self::Url(_) => PropertyKind::Url,
            Self::Email(_) => PropertyKind::Email,
            Self::PhoneNumber(_) => PropertyKind::PhoneNumber,
            Self::Status(_) => PropertyKind::Status,
            Self::Other(raw) => PropertyKind::Other(
                raw.get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
        }
    }
}

/// `null` becomes an empty list
fn list<T: DeserializeOwned>(payload: &Value) -> Option<Vec<T>> {
    match payload {
        Value::Null => Some(Vec::new()),
        other => serde_json::from_value(other.clone()).ok(),
    }
}

/// `null` becomes `Some(None)`, a malformed payload `None`
fn nullable<T: DeserializeOwned>(payload: &Value) -> Option<Option<T>> {
    match payload {
        Value::Null => Some(None),
        other => serde_json::from_value(other.clone()).ok().map(Some),
    }
}

/// One database entry
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub url: Option<String>,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Record {
    /// Parse a page object. Only the `id` is mandatory.
    pub fn from_json(raw: &Value) -> Result<Self> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| NotionError::ParseError("record without an id".to_string()))?;

        let properties = raw
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, value)| (name.clone(), PropertyValue::from_json(value)))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            id: id.to_string(),
            url: raw.get("url").and_then(Value::as_str).map(str::to_string),
            properties,
        })
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPage {
    pub records: Vec<Record>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl QueryPage {
    /// The cursor to continue with, if the store says there is more
    pub fn continuation(&self) -> Option<String> {
        if self.has_more {
            self.next_cursor.clone().filter(|c| !c.is_empty())
        } else {
            None
        }
    }
}

/// Database title plus declared columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatabaseSchema {
    pub id: String,
    pub title: String,
    pub columns: BTreeMap<String, PropertyKind>,
}

impl DatabaseSchema {
    pub fn kind_of(&self, column: &str) -> Option<&PropertyKind> {
        self.columns.get(column)
    }
}

/// Caller-supplied filter/sort body, forwarded verbatim
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordQuery {
    body: Map<String, Value>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON object such as `{"filter": {...}, "sorts": [...]}`
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(body) => Ok(Self { body }),
            other => Err(NotionError::InvalidQuery(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.body.insert("filter".to_string(), filter);
        self
    }

    pub fn with_sorts(mut self, sorts: Value) -> Self {
        self.body.insert("sorts".to_string(), sorts);
        self
    }

    pub fn as_json(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Request body for one page
    pub fn page_body(&self, cursor: Option<&str>, page_size: usize) -> Value {
        let mut body = self.body.clone();
        if let Some(cursor) = cursor {
            body.insert("start_cursor".to_string(), Value::String(cursor.to_string()));
        }
        body.insert("page_size".to_string(), Value::from(page_size));
        Value::Object(body)
    }

    /// Request body without pagination parameters
    pub fn direct_body(&self) -> Value {
        Value::Object(self.body.clone())
    }
}

/// A flattened record: column name to decoded value, plus [`ID_KEY`] and
/// [`URL_KEY`]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn new(id: &str, url: Option<&str>) -> Self {
        let mut values = Map::new();
        values.insert(ID_KEY.to_string(), Value::String(id.to_string()));
        values.insert(
            URL_KEY.to_string(),
            url.map_or(Value::Null, |u| Value::String(u.to_string())),
        );
        Self(values)
    }

    /// Insert a column value under its escaped key
    pub fn insert_column(&mut self, column: &str, value: Value) {
        self.0.insert(column_key(column).into_owned(), value);
    }

    /// Value of a schema column, by its unescaped name
    pub fn column(&self, column: &str) -> Option<&Value> {
        self.0.get(column_key(column).as_ref())
    }

    /// Raw lookup by key, reserved keys included
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_KEY).and_then(Value::as_str)
    }

    pub fn url(&self) -> Option<&str> {
        self.0.get(URL_KEY).and_then(Value::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Keys including the two reserved ones
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// Row key for a column name.
///
/// A name made of one or more `_` followed by `id` or `url` gets one more
/// leading `_`, so `_id` is stored as `__id` and `__id` as `___id`.
pub fn column_key(column: &str) -> Cow<'_, str> {
    let stripped = column.trim_start_matches('_');
    let collides = stripped.len() < column.len() && (stripped == "id" || stripped == "url");
    if collides {
        Cow::Owned(format!("_{}", column))
    } else {
        Cow::Borrowed(column)
    }
}
