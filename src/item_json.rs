//! Normalize scraped item records into the server's JSON shape
//!
//! Processors usually turn each [`Document`](crate::document::Document) into a
//! loosely typed item record. [`to_server_json`] cleans such a record against
//! an [`ItemSchema`]: unknown item types fall back to `webpage`, creators, tags
//! and notes are reduced to their canonical forms, field values are coerced to
//! strings and base fields are mapped onto their type-specific names. Anything
//! the schema does not know is dropped.

use crate::error::{ItemError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Item type used when the record's own type is unknown
pub const FALLBACK_ITEM_TYPE: &str = "webpage";

/// Creator type used when a creator has none, or an invalid one
pub const DEFAULT_CREATOR_TYPE: &str = "author";

/// Keys that never reach the server
const SKIPPED_KEYS: [&str; 3] = ["complete", "itemID", "seeAlso"];

/// Lookup tables describing valid item types, fields and creator types
pub trait ItemSchema {
    /// Id of the item type called `name`, if it exists
    fn item_type_id(&self, name: &str) -> Option<u32>;

    /// Id of the field called `name`, if it exists
    fn field_id(&self, name: &str) -> Option<u32>;

    /// Whether `field` may be set on items of `item_type`
    fn field_valid_for_type(&self, field: &str, item_type: &str) -> bool;

    /// The type-specific field that base field `field` maps to for
    /// `item_type` (e.g. `title` to `caseName` for cases)
    fn base_mapped_field(&self, item_type: &str, field: &str) -> Option<&str>;

    /// Whether `name` is a known creator type
    fn creator_type_valid(&self, name: &str) -> bool;
}

/// Fields and base-field mappings of one item type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTypeSchema {
    /// Item type id
    pub id: u32,

    /// Fields valid for this type, including the targets of `base_fields`
    #[serde(default)]
    pub fields: Vec<String>,

    /// Base field name to type-specific field name
    #[serde(default)]
    pub base_fields: BTreeMap<String, String>,
}

/// In-memory [`ItemSchema`] loadable from JSON
///
/// ```
/// use docfetch::item_json::{ItemSchema, SchemaTable};
///
/// let schema = SchemaTable::from_json_str(r#"{
///     "item_types": {"webpage": {"id": 13, "fields": ["title", "url"]}},
///     "fields": {"title": 110, "url": 1},
///     "creator_types": {"author": 8}
/// }"#).unwrap();
/// assert!(schema.field_valid_for_type("url", "webpage"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaTable {
    /// Item types by name
    #[serde(default)]
    pub item_types: BTreeMap<String, ItemTypeSchema>,

    /// Field ids by name
    #[serde(default)]
    pub fields: BTreeMap<String, u32>,

    /// Creator type ids by name
    #[serde(default)]
    pub creator_types: BTreeMap<String, u32>,
}

impl SchemaTable {
    /// Parse a schema table from JSON
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`](crate::error::Error::Serialization) if
    /// the JSON does not describe a schema table.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ItemSchema for SchemaTable {
    fn item_type_id(&self, name: &str) -> Option<u32> {
        self.item_types.get(name).map(|t| t.id)
    }

    fn field_id(&self, name: &str) -> Option<u32> {
        self.fields.get(name).copied()
    }

    fn field_valid_for_type(&self, field: &str, item_type: &str) -> bool {
        self.item_types
            .get(item_type)
            .is_some_and(|t| t.fields.iter().any(|f| f == field))
    }

    fn base_mapped_field(&self, item_type: &str, field: &str) -> Option<&str> {
        self.item_types
            .get(item_type)?
            .base_fields
            .get(field)
            .map(String::as_str)
    }

    fn creator_type_valid(&self, name: &str) -> bool {
        self.creator_types.contains_key(name)
    }
}

/// Convert an item record into the JSON object the server accepts
///
/// Keys are visited in the record's order and the output keeps that order.
/// `itemType` is always present in the output; if the record has none it is
/// placed first.
///
/// # Errors
///
/// Returns [`ItemError::UnknownItemType`] if neither the record's type nor
/// [`FALLBACK_ITEM_TYPE`] exist in the schema, and [`ItemError::NotAnArray`]
/// if `creators`, `tags` or `notes` is present but not an array.
pub fn to_server_json<S>(
    item: &Map<String, Value>,
    schema: &S,
) -> std::result::Result<Map<String, Value>, ItemError>
where
    S: ItemSchema + ?Sized,
{
    let declared = item.get("itemType").and_then(Value::as_str).unwrap_or_default();
    let item_type = if schema.item_type_id(declared).is_some() {
        declared
    } else {
        debug!(item_type = declared, "Invalid item type, using {}", FALLBACK_ITEM_TYPE);
        if schema.item_type_id(FALLBACK_ITEM_TYPE).is_none() {
            return Err(ItemError::UnknownItemType {
                item_type: declared.to_string(),
                fallback: FALLBACK_ITEM_TYPE.to_string(),
            });
        }
        FALLBACK_ITEM_TYPE
    };

    let mut out = Map::new();
    if !item.contains_key("itemType") {
        out.insert("itemType".to_string(), Value::from(item_type));
    }

    for (field, value) in item {
        let field = field.as_str();
        if SKIPPED_KEYS.contains(&field) {
            continue;
        }

        match field {
            "itemType" => {
                out.insert(field.to_string(), Value::from(item_type));
            }
            "creators" => {
                let creators = as_array(field, value)?
                    .iter()
                    .filter_map(|c| normalize_creator(c, schema))
                    .collect();
                out.insert(field.to_string(), Value::Array(creators));
            }
            "tags" => {
                let tags = as_array(field, value)?.iter().filter_map(normalize_tag).collect();
                out.insert(field.to_string(), Value::Array(tags));
            }
            "notes" => {
                let notes = as_array(field, value)?.iter().filter_map(normalize_note).collect();
                out.insert(field.to_string(), Value::Array(notes));
            }
            _ if schema.field_id(field).is_some() => {
                let Some(text) = field_text(value) else {
                    continue;
                };

                if let Some(mapped) = schema.base_mapped_field(item_type, field) {
                    if mapped != field && !is_set(out.get(mapped)) {
                        out.insert(mapped.to_string(), Value::String(text));
                    }
                    continue;
                }

                if schema.field_valid_for_type(field, item_type) {
                    out.insert(field.to_string(), Value::String(text));
                } else {
                    debug!(field, item_type, "Discarded field not valid for item type");
                }
            }
            "attachments" => {
                out.insert(field.to_string(), value.clone());
            }
            _ => debug!(field, "Discarded unknown field"),
        }
    }

    Ok(out)
}

fn as_array<'v>(field: &str, value: &'v Value) -> std::result::Result<&'v Vec<Value>, ItemError> {
    value.as_array().ok_or_else(|| ItemError::NotAnArray {
        field: field.to_string(),
    })
}

fn normalize_creator<S>(creator: &Value, schema: &S) -> Option<Value>
where
    S: ItemSchema + ?Sized,
{
    let first = creator.get("firstName").filter(|v| truthy(v));
    let last = creator.get("lastName").filter(|v| truthy(v));
    if first.is_none() && last.is_none() {
        debug!("Silently dropping empty creator");
        return None;
    }

    let mut out = Map::new();
    let single_field = first.is_none() || creator.get("fieldMode").is_some_and(is_one);
    if single_field {
        if let Some(last) = last {
            out.insert("name".to_string(), last.clone());
        }
    } else {
        if let Some(first) = first {
            out.insert("firstName".to_string(), first.clone());
        }
        if let Some(last) = last {
            out.insert("lastName".to_string(), last.clone());
        }
    }

    let creator_type = match creator.get("creatorType").and_then(Value::as_str) {
        Some(name) if !name.is_empty() && schema.creator_type_valid(name) => name,
        Some(name) if !name.is_empty() => {
            debug!(
                creator_type = name,
                "Invalid creator type, falling back to {}", DEFAULT_CREATOR_TYPE
            );
            DEFAULT_CREATOR_TYPE
        }
        _ => DEFAULT_CREATOR_TYPE,
    };
    out.insert("creatorType".to_string(), Value::from(creator_type));

    Some(Value::Object(out))
}

fn normalize_tag(tag: &Value) -> Option<Value> {
    let text = match tag {
        Value::Object(obj) => match obj
            .get("tag")
            .filter(|v| truthy(v))
            .or_else(|| obj.get("name").filter(|v| truthy(v)))
        {
            Some(inner) => stringify(inner),
            None => {
                debug!("Discarded invalid tag");
                return None;
            }
        },
        Value::Null => {
            debug!("Discarded invalid tag");
            return None;
        }
        other => stringify(other),
    };
    if text.is_empty() {
        return None;
    }

    let mut out = Map::new();
    out.insert("tag".to_string(), Value::String(text));
    out.insert("type".to_string(), Value::from(1));
    Some(Value::Object(out))
}

fn normalize_note(note: &Value) -> Option<Value> {
    let text = match note {
        Value::Object(obj) => match obj.get("note").filter(|v| truthy(v)) {
            Some(inner) => stringify(inner),
            None => {
                debug!("Discarded invalid note");
                return None;
            }
        },
        Value::Null => {
            debug!("Discarded invalid note");
            return None;
        }
        other => stringify(other),
    };

    let mut out = Map::new();
    out.insert("itemType".to_string(), Value::from("note"));
    out.insert("note".to_string(), Value::String(text));
    Some(Value::Object(out))
}

/// String value of a known field, or `None` if the value should be dropped
///
/// Strings pass unchanged (even empty ones). Other values are stringified
/// unless falsy, except that zero is kept.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) => Some(stringify(value)),
        other if truthy(other) => Some(stringify(other)),
        _ => None,
    }
}

fn is_set(value: Option<&Value>) -> bool {
    value.is_some_and(truthy)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Loose equality with 1, as a field mode flag
fn is_one(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => s.trim().parse::<f64>().ok() == Some(1.0),
        _ => false,
    }
}

/// Text form of a value, the way a script engine would print it
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => stringify(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> SchemaTable {
        SchemaTable::from_json_str(
            r#"{
                "item_types": {
                    "webpage": {"id": 13, "fields": ["title", "url", "accessDate", "websiteTitle"]},
                    "journalArticle": {"id": 4, "fields": ["title", "url", "volume", "pages", "date"]},
                    "case": {
                        "id": 7,
                        "fields": ["caseName", "url", "dateDecided"],
                        "base_fields": {"title": "caseName", "date": "dateDecided"}
                    }
                },
                "fields": {
                    "title": 110, "url": 1, "accessDate": 27, "websiteTitle": 91,
                    "volume": 19, "pages": 10, "date": 14,
                    "caseName": 58, "dateDecided": 69
                },
                "creator_types": {"author": 8, "editor": 10, "counsel": 25}
            }"#,
        )
        .unwrap()
    }

    fn convert(item: Value) -> Map<String, Value> {
        to_server_json(item.as_object().unwrap(), &schema()).unwrap()
    }

    #[test]
    fn unknown_item_type_falls_back_to_webpage() {
        let out = convert(json!({"itemType": "hologram", "title": "Page", "volume": "3"}));
        assert_eq!(Value::Object(out), json!({"itemType": "webpage", "title": "Page"}));
    }

    #[test]
    fn missing_item_type_is_added_first() {
        let out = convert(json!({"url": "https://a.test/", "title": "T"}));
        let keys: Vec<_> = out.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["itemType", "url", "title"]);
        assert_eq!(out["itemType"], "webpage");
    }

    #[test]
    fn schema_without_fallback_type_is_an_error() {
        let schema = SchemaTable::default();
        let item = json!({"itemType": "book"});
        let err = to_server_json(item.as_object().unwrap(), &schema).unwrap_err();
        assert_eq!(
            err,
            ItemError::UnknownItemType {
                item_type: "book".to_string(),
                fallback: "webpage".to_string(),
            }
        );
    }

    #[test]
    fn skipped_and_unknown_keys_are_dropped() {
        let out = convert(json!({
            "itemType": "webpage",
            "complete": true,
            "itemID": 12,
            "seeAlso": [],
            "mystery": "x",
            "title": "T"
        }));
        assert_eq!(Value::Object(out), json!({"itemType": "webpage", "title": "T"}));
    }

    #[test]
    fn creators_are_normalized() {
        let out = convert(json!({
            "itemType": "journalArticle",
            "creators": [
                {"firstName": "Ada", "lastName": "Lovelace", "creatorType": "editor"},
                {"lastName": "W3C"},
                {"firstName": "Grace", "lastName": "Hopper", "fieldMode": 1},
                {"firstName": "", "lastName": ""},
                {"firstName": "Alan", "lastName": "Turing", "creatorType": "wizard"}
            ]
        }));
        assert_eq!(
            out["creators"],
            json!([
                {"firstName": "Ada", "lastName": "Lovelace", "creatorType": "editor"},
                {"name": "W3C", "creatorType": "author"},
                {"name": "Hopper", "creatorType": "author"},
                {"firstName": "Alan", "lastName": "Turing", "creatorType": "author"}
            ])
        );
    }

    #[test]
    fn field_mode_accepts_string_one() {
        let out = convert(json!({
            "creators": [{"firstName": "Grace", "lastName": "Hopper", "fieldMode": "1"}]
        }));
        assert_eq!(out["creators"], json!([{"name": "Hopper", "creatorType": "author"}]));
    }

    #[test]
    fn tags_are_normalized() {
        let out = convert(json!({
            "tags": ["rust", {"tag": "async"}, {"name": "tokio"}, {"other": 1}, "", 42]
        }));
        assert_eq!(
            out["tags"],
            json!([
                {"tag": "rust", "type": 1},
                {"tag": "async", "type": 1},
                {"tag": "tokio", "type": 1},
                {"tag": "42", "type": 1}
            ])
        );
    }

    #[test]
    fn notes_are_normalized_and_invalid_ones_dropped() {
        let out = convert(json!({
            "notes": ["plain", {"note": "<p>rich</p>"}, {"title": "no body"}]
        }));
        assert_eq!(
            out["notes"],
            json!([
                {"itemType": "note", "note": "plain"},
                {"itemType": "note", "note": "<p>rich</p>"}
            ])
        );
    }

    #[test]
    fn list_fields_must_be_arrays() {
        let item = json!({"tags": "rust"});
        let err = to_server_json(item.as_object().unwrap(), &schema()).unwrap_err();
        assert_eq!(
            err,
            ItemError::NotAnArray {
                field: "tags".to_string()
            }
        );
    }

    #[test]
    fn non_string_values_are_stringified_or_dropped() {
        let out = convert(json!({
            "itemType": "journalArticle",
            "volume": 12,
            "pages": 0,
            "title": "",
            "date": null,
            "url": false
        }));
        assert_eq!(
            Value::Object(out),
            json!({"itemType": "journalArticle", "volume": "12", "pages": "0", "title": ""})
        );
    }

    #[test]
    fn base_fields_map_to_type_specific_fields() {
        let out = convert(json!({
            "itemType": "case",
            "title": "Marbury v. Madison",
            "date": "1803"
        }));
        assert_eq!(
            Value::Object(out),
            json!({"itemType": "case", "caseName": "Marbury v. Madison", "dateDecided": "1803"})
        );
    }

    #[test]
    fn base_field_does_not_overwrite_explicit_field() {
        let out = convert(json!({
            "itemType": "case",
            "caseName": "Explicit",
            "title": "From base"
        }));
        assert_eq!(out["caseName"], "Explicit");
        assert!(!out.contains_key("title"));
    }

    #[test]
    fn attachments_pass_through() {
        let attachments = json!([{"title": "Snapshot", "mimeType": "text/html"}]);
        let out = convert(json!({"attachments": attachments.clone()}));
        assert_eq!(out["attachments"], attachments);
    }

    #[test]
    fn stringify_follows_script_conventions() {
        assert_eq!(stringify(&json!(3.0)), "3");
        assert_eq!(stringify(&json!(2.5)), "2.5");
        assert_eq!(stringify(&json!(["a", 1, null])), "a,1,");
        assert_eq!(stringify(&json!({"a": 1})), "[object Object]");
        assert_eq!(stringify(&json!(true)), "true");
    }
}
