use std::collections::BTreeMap;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the primary key attribute.
pub const ISBN: &str = "isbn";

/// Name of the attribute checked by [`BookPolicy::validate_release_date`](crate::config::BookPolicy).
pub const RELEASE_DATE: &str = "release_date";

/// A single scalar attribute value.
///
/// Nested arrays and objects are not representable and are rejected while deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Integer(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// Open attribute bag of a book.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// The stored record, serialized as a flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Book {
    pub isbn: String,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Book {
    pub fn new(isbn: impl Into<String>, mut attributes: Attributes) -> Self {
        attributes.remove(ISBN);

        Self {
            isbn: isbn.into(),
            attributes,
        }
    }

    /// Overwrites the given attributes, keeping every other attribute as is.
    pub fn merge(&mut self, attributes: Attributes) {
        for (key, value) in attributes {
            if key == ISBN {
                continue;
            }

            self.attributes.insert(key, value);
        }
    }
}

/// Returns `true` if `isbn` consists of exactly 13 ASCII digits.
pub fn is_isbn13(isbn: &str) -> bool {
    isbn.len() == 13 && isbn.bytes().all(|b| b.is_ascii_digit())
}

/// Returns `true` if `date` is a calendar date in `YYYY-MM-DD` form.
pub fn is_iso8601_date(date: &str) -> bool {
    date.len() == 10 && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}
