use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A decoded annotation element value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Enum { type_name: String, constant: String },
    /// Fully qualified class name of a class literal.
    Class(String),
    Annotation(AnnotationRecord),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ElementValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ElementValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ElementValue::Bool(v) => Some(*v),
            ElementValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// View a single value or an array as a slice of values; annotation
    /// arrays with one element may be written without braces in source.
    pub fn items(&self) -> &[ElementValue] {
        match self {
            ElementValue::Array(items) => items,
            other => std::slice::from_ref(other),
        }
    }
}

/// One class-level annotation as read from the class attribute table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    /// Fully qualified annotation type, e.g. `javax.servlet.annotation.WebServlet`.
    pub type_name: String,
    pub elements: BTreeMap<String, ElementValue>,
}

impl AnnotationRecord {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            elements: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: ElementValue) -> Self {
        self.elements.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ElementValue> {
        self.elements.get(name)
    }

    /// Non-empty strings of a `String[]` element.
    pub fn strings(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|v| {
                v.items()
                    .iter()
                    .filter_map(ElementValue::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A `String` element, treating the empty default as absent.
    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(ElementValue::as_str)
            .filter(|s| !s.is_empty())
    }
}
