//! Identifier templates and their rendering.
//!
//! A [`Template`] is the user-authored, per-collection description of how an
//! identifier is built. It is stored as JSON alongside the collection:
//!
//! ```json
//! {
//!   "enabled": true,
//!   "elements": [
//!     { "type": "fixed",  "value": "INV-" },
//!     { "type": "date",   "fmt": "yy" },
//!     { "type": "rand20", "fmt": "X5_" },
//!     { "type": "seq",    "fmt": "D4" }
//!   ]
//! }
//! ```

mod compose;
pub mod format;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use compose::{compose, preview, ComposeContext};

/// Per-collection identifier template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl Template {
    pub fn new(elements: Vec<Element>) -> Self {
        Self {
            enabled: true,
            elements,
        }
    }

    /// Template used by collections that never configured one: a bare,
    /// unpadded sequence number.
    pub fn default_sequence() -> Self {
        Self::new(vec![Element::Seq {
            id: None,
            fmt: Some("D".into()),
            width: None,
        }])
    }

    /// Parses a template from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns true if composing this template consumes a sequence number.
    pub fn needs_sequence(&self) -> bool {
        self.elements.iter().any(|e| matches!(e, Element::Seq { .. }))
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::default_sequence()
    }
}

/// One element of a template.
///
/// Unknown `type` values, entries that are not objects, and known kinds
/// whose fields have unexpected types all deserialize into
/// [`Element::Unknown`] and render as the empty string, so templates written
/// by newer clients still compose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "RawElement")]
pub enum Element {
    /// Literal text emitted verbatim.
    Fixed { id: Option<String>, value: String },
    /// 20-bit random value; `fmt` is `X5[_]` or `D<n>[_]`.
    Rand20 { id: Option<String>, fmt: Option<String> },
    /// The composition's sequence number; `fmt` is `D` or `D<n>`.
    /// `width` is shorthand for `D<width>` and takes precedence.
    Seq {
        id: Option<String>,
        fmt: Option<String>,
        width: Option<usize>,
    },
    /// The reference instant rendered through date tokens.
    Date { id: Option<String>, fmt: Option<String> },
    Unknown { kind: String, id: Option<String> },
}

impl Element {
    pub fn fixed(value: impl Into<String>) -> Self {
        Element::Fixed {
            id: None,
            value: value.into(),
        }
    }

    pub fn rand20(fmt: impl Into<String>) -> Self {
        Element::Rand20 {
            id: None,
            fmt: Some(fmt.into()),
        }
    }

    pub fn seq(fmt: impl Into<String>) -> Self {
        Element::Seq {
            id: None,
            fmt: Some(fmt.into()),
            width: None,
        }
    }

    pub fn seq_width(width: usize) -> Self {
        Element::Seq {
            id: None,
            fmt: None,
            width: Some(width),
        }
    }

    pub fn date(fmt: impl Into<String>) -> Self {
        Element::Date {
            id: None,
            fmt: Some(fmt.into()),
        }
    }

    /// The element's opaque id, if it has one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Element::Fixed { id, .. }
            | Element::Rand20 { id, .. }
            | Element::Seq { id, .. }
            | Element::Date { id, .. }
            | Element::Unknown { id, .. } => id.as_deref(),
        }
    }
}

/// Wire shape of an element when serializing.
#[derive(Debug, Clone, Default, Serialize)]
struct RawElement {
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fmt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<usize>,
}

/// A field was present with a type its element kind cannot use.
struct FieldMismatch;

/// Reads an optional field. Absent and `null` read as `None`.
fn field<'a, T>(
    obj: &'a Map<String, Value>,
    name: &str,
    read: impl Fn(&'a Value) -> Option<T>,
) -> Result<Option<T>, FieldMismatch> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => read(value).map(Some).ok_or(FieldMismatch),
    }
}

fn as_width(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|w| usize::try_from(w).ok())
}

impl From<Value> for Element {
    fn from(raw: Value) -> Self {
        let Value::Object(obj) = raw else {
            return Element::Unknown {
                kind: String::new(),
                id: None,
            };
        };
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let id = obj.get("id").and_then(Value::as_str).map(str::to_string);
        let text = |name: &str| field(&obj, name, Value::as_str).map(|v| v.map(str::to_string));

        let parsed = match kind.as_str() {
            "fixed" => text("value").map(|value| Element::Fixed {
                id: id.clone(),
                value: value.unwrap_or_default(),
            }),
            "rand20" => text("fmt").map(|fmt| Element::Rand20 { id: id.clone(), fmt }),
            "seq" => text("fmt").and_then(|fmt| {
                let width = field(&obj, "width", as_width)?;
                Ok(Element::Seq {
                    id: id.clone(),
                    fmt,
                    width,
                })
            }),
            "date" => text("fmt").map(|fmt| Element::Date { id: id.clone(), fmt }),
            _ => Err(FieldMismatch),
        };
        parsed.unwrap_or(Element::Unknown { kind, id })
    }
}

impl From<Element> for RawElement {
    fn from(element: Element) -> Self {
        match element {
            Element::Fixed { id, value } => RawElement {
                kind: "fixed".into(),
                id,
                value: Some(value),
                ..Default::default()
            },
            Element::Rand20 { id, fmt } => RawElement {
                kind: "rand20".into(),
                id,
                fmt,
                ..Default::default()
            },
            Element::Seq { id, fmt, width } => RawElement {
                kind: "seq".into(),
                id,
                fmt,
                width,
                ..Default::default()
            },
            Element::Date { id, fmt } => RawElement {
                kind: "date".into(),
                id,
                fmt,
                ..Default::default()
            },
            Element::Unknown { kind, id } => RawElement {
                kind,
                id,
                ..Default::default()
            },
        }
    }
}
