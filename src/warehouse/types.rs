//! Query result types.
//!
//! `RawResultSet` is what the warehouse returns (typed column metadata and
//! string cells); `Table` is the materialized, typed form used for display,
//! summaries and charts.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Column metadata as reported by the warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumn {
    pub name: String,
    pub data_type: String,
    pub scale: Option<i64>,
}

impl RawColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            scale: None,
        }
    }

    pub fn with_scale(mut self, scale: i64) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// Unmaterialized result: column metadata plus textual cells (`None` = NULL).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResultSet {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawResultSet {
    pub fn new(columns: Vec<RawColumn>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }
}

/// Broad value category of a column, derived from its warehouse type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl ColumnKind {
    /// Classifies a warehouse type name.
    ///
    /// Accepts both wire names (`fixed`, `real`) and DDL names
    /// (`NUMBER(38,0)`, `FLOAT`, `INT`). Fixed-point types are integers
    /// only when their scale is zero.
    pub fn from_type(data_type: &str, scale: Option<i64>) -> Self {
        let lowered = data_type.trim().to_lowercase();
        let base = lowered.split('(').next().unwrap_or("").trim();

        match base {
            "int" | "integer" | "bigint" | "smallint" | "tinyint" | "byteint" => Self::Integer,
            "real" | "float" | "float4" | "float8" | "double" | "double precision" => Self::Float,
            "fixed" | "number" | "decimal" | "numeric" => {
                let scale = scale.or_else(|| parse_scale(&lowered)).unwrap_or(0);
                if scale > 0 {
                    Self::Float
                } else {
                    Self::Integer
                }
            }
            "boolean" => Self::Boolean,
            _ => Self::Text,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

/// Extracts the scale from `number(p,s)`.
fn parse_scale(type_name: &str) -> Option<i64> {
    let inner = type_name.split_once('(')?.1.strip_suffix(')')?;
    let (_, scale) = inner.split_once(',')?;
    scale.trim().parse().ok()
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type as reported by the warehouse.
    pub data_type: String,

    /// Derived value category.
    pub kind: ColumnKind,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            kind,
        }
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// Represents a single materialized value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, used for charting.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if f.is_finite() => Some(*f),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Converts the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// How numeric cells that cannot be represented are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericPolicy {
    /// NULL stays NULL; non-finite or unparseable numbers are an error.
    Strict,
    /// NULL and non-finite numbers become 0 (integer columns) or 0.0 (float columns).
    CoerceToZero,
}

/// Failure to turn a raw result into a [`Table`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("Cannot convert non-finite values (NA or inf) to integer in column '{column}'")]
    NonFinite { column: String },

    #[error("Row {row} has {found} cells but the result has {expected} columns")]
    Shape {
        row: usize,
        found: usize,
        expected: usize,
    },
}

/// A materialized query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data.
    pub rows: Vec<Row>,

    /// Time taken to execute the query.
    pub execution_time: Duration,

    /// Whether the numeric coercion fallback was applied.
    pub coerced: bool,
}

impl Table {
    /// Creates a table with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            execution_time: Duration::ZERO,
            coerced: false,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    /// Returns true if the result set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Finds a column by name, case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Converts a raw result into typed values.
    pub fn materialize(
        raw: &RawResultSet,
        policy: NumericPolicy,
    ) -> std::result::Result<Self, MaterializeError> {
        let columns: Vec<ColumnInfo> = raw
            .columns
            .iter()
            .map(|c| {
                ColumnInfo::new(
                    c.name.clone(),
                    c.data_type.clone(),
                    ColumnKind::from_type(&c.data_type, c.scale),
                )
            })
            .collect();

        let mut coerced = false;
        let mut rows = Vec::with_capacity(raw.rows.len());
        for (row_idx, raw_row) in raw.rows.iter().enumerate() {
            if raw_row.len() != columns.len() {
                return Err(MaterializeError::Shape {
                    row: row_idx,
                    found: raw_row.len(),
                    expected: columns.len(),
                });
            }

            let mut row = Vec::with_capacity(columns.len());
            for (cell, column) in raw_row.iter().zip(&columns) {
                let value = match convert_cell(cell.as_deref(), column.kind) {
                    Some(value) => value,
                    None => match policy {
                        NumericPolicy::Strict => {
                            return Err(MaterializeError::NonFinite {
                                column: column.name.clone(),
                            })
                        }
                        NumericPolicy::CoerceToZero => {
                            coerced = true;
                            zero_for(column.kind)
                        }
                    },
                };

                let value = if value.is_null()
                    && policy == NumericPolicy::CoerceToZero
                    && column.kind.is_numeric()
                {
                    coerced = true;
                    zero_for(column.kind)
                } else {
                    value
                };
                row.push(value);
            }
            rows.push(row);
        }

        Ok(Self {
            columns,
            rows,
            execution_time: Duration::ZERO,
            coerced,
        })
    }
}

fn zero_for(kind: ColumnKind) -> Value {
    match kind {
        ColumnKind::Integer => Value::Int(0),
        ColumnKind::Float => Value::Float(0.0),
        _ => Value::Null,
    }
}

/// Converts one cell. Returns `None` for numeric cells that are non-finite or
/// unparseable.
fn convert_cell(cell: Option<&str>, kind: ColumnKind) -> Option<Value> {
    let Some(text) = cell else {
        return Some(Value::Null);
    };

    match kind {
        ColumnKind::Integer => {
            if let Ok(i) = text.trim().parse::<i64>() {
                return Some(Value::Int(i));
            }
            // Wide NUMBER(38,0) values fall back to a float representation.
            let f = text.trim().parse::<f64>().ok().filter(|f| f.is_finite())?;
            Some(Value::Float(f))
        }
        ColumnKind::Float => {
            let f = text.trim().parse::<f64>().ok().filter(|f| f.is_finite())?;
            Some(Value::Float(f))
        }
        ColumnKind::Boolean => Some(match text.trim().to_lowercase().as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::String(text.to_string()),
        }),
        ColumnKind::Text => Some(Value::String(text.to_string())),
    }
}
