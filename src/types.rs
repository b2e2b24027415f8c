use chrono::NaiveDateTime;
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Values that can appear in a result row.
///
/// One enum for every column type the runner reports, so the reporting layer
/// does not need to branch on driver types.
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let RowValues::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Render the value for the JSON outcome payload.
    ///
    /// Timestamps become ISO-8601 strings, blobs lowercase hex strings, and
    /// non-finite floats NULL (JSON has no representation for them).
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            RowValues::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(JsonValue::Null, JsonValue::Number),
            RowValues::Text(s) => JsonValue::String(s.clone()),
            RowValues::Bool(b) => JsonValue::Bool(*b),
            RowValues::Timestamp(dt) => {
                JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            RowValues::Null => JsonValue::Null,
            RowValues::Blob(bytes) => {
                let mut hex = String::with_capacity(bytes.len() * 2);
                for byte in bytes {
                    use std::fmt::Write as _;
                    let _ = write!(hex, "{byte:02x}");
                }
                JsonValue::String(hex)
            }
        }
    }
}

/// The two result representations a caller can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// Rows as column-name-to-value mappings (`as_dict = true`).
    Mapped,
    /// Rows as positional value sequences.
    Positional,
}

/// Fetched rows in the shape they will be reported in.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRows {
    Mapped(Vec<Vec<(String, RowValues)>>),
    Positional(Vec<Vec<RowValues>>),
}

impl ResultRows {
    #[must_use]
    pub fn empty(shape: RowShape) -> Self {
        match shape {
            RowShape::Mapped => ResultRows::Mapped(Vec::new()),
            RowShape::Positional => ResultRows::Positional(Vec::new()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ResultRows::Mapped(rows) => rows.len(),
            ResultRows::Positional(rows) => rows.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn shape(&self) -> RowShape {
        match self {
            ResultRows::Mapped(_) => RowShape::Mapped,
            ResultRows::Positional(_) => RowShape::Positional,
        }
    }

    /// The `result` field of the outcome payload: an array of objects for
    /// mapped rows, an array of arrays for positional ones. Column order is
    /// select order in both shapes.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            ResultRows::Mapped(rows) => JsonValue::Array(
                rows.iter()
                    .map(|row| {
                        let mut object = JsonMap::with_capacity(row.len());
                        for (name, value) in row {
                            object.insert(name.clone(), value.to_json());
                        }
                        JsonValue::Object(object)
                    })
                    .collect(),
            ),
            ResultRows::Positional(rows) => JsonValue::Array(
                rows.iter()
                    .map(|row| JsonValue::Array(row.iter().map(RowValues::to_json).collect()))
                    .collect(),
            ),
        }
    }
}

/// The success half of an invocation's outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// Whether the statement mutated stored data (nonzero affected rows).
    pub changed: bool,
    /// Fetched rows, empty for statements without a result set.
    pub rows: ResultRows,
    /// Fetched row count for result-set statements, affected row count
    /// otherwise.
    pub rowcount: i64,
}
