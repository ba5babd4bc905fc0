//! Domain schema and validated records
//!
//! A [`DomainSchema`] lists the caller-facing fields a scorer was trained on,
//! with their domains. [`Record`]s can only be built through the schema, so a
//! record in hand has every required field present and in range.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Record and schema validation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Field {field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Field {field} = '{value}' is not one of: {}", .allowed.join(", "))]
    UnknownCategory {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("Field {field} = '{value}' is not a finite number")]
    NotNumeric { field: String, value: String },

    #[error("Field {field} must be a {expected}")]
    WrongType { field: String, expected: &'static str },

    #[error("Column {column} is not valid UTF-8")]
    InvalidEncoding { column: usize },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

/// Domain of a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Finite number within `[min, max]`
    Numeric { min: f64, max: f64 },
    /// One of `levels`; `levels[0]` is the reference level that expands to
    /// all-zero indicators
    Categorical { levels: Vec<String> },
}

/// One caller-facing field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn numeric(name: &str, min: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Numeric { min, max },
        }
    }

    pub fn categorical(name: &str, levels: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Categorical {
                levels: levels.iter().map(|l| l.to_string()).collect(),
            },
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, FieldKind::Categorical { .. })
    }

    fn check_number(&self, value: f64) -> Result<FieldValue, ValidationError> {
        match &self.kind {
            FieldKind::Numeric { min, max } => {
                if !value.is_finite() {
                    return Err(ValidationError::NotNumeric {
                        field: self.name.clone(),
                        value: value.to_string(),
                    });
                }
                if value < *min || value > *max {
                    return Err(ValidationError::OutOfRange {
                        field: self.name.clone(),
                        value,
                        min: *min,
                        max: *max,
                    });
                }
                Ok(FieldValue::Number(value))
            }
            FieldKind::Categorical { .. } => Err(ValidationError::WrongType {
                field: self.name.clone(),
                expected: "string",
            }),
        }
    }

    fn check_category(&self, value: &str) -> Result<FieldValue, ValidationError> {
        match &self.kind {
            FieldKind::Categorical { levels } => {
                if levels.iter().any(|l| l == value) {
                    Ok(FieldValue::Category(value.to_string()))
                } else {
                    Err(ValidationError::UnknownCategory {
                        field: self.name.clone(),
                        value: value.to_string(),
                        allowed: levels.clone(),
                    })
                }
            }
            FieldKind::Numeric { .. } => Err(ValidationError::WrongType {
                field: self.name.clone(),
                expected: "number",
            }),
        }
    }

    /// Parse a raw text cell (CSV) into a validated value
    fn parse_cell(&self, cell: &str) -> Result<FieldValue, ValidationError> {
        let cell = cell.trim();
        match &self.kind {
            FieldKind::Numeric { .. } => {
                let value: f64 = cell.parse().map_err(|_| ValidationError::NotNumeric {
                    field: self.name.clone(),
                    value: cell.to_string(),
                })?;
                self.check_number(value)
            }
            FieldKind::Categorical { .. } => self.check_category(cell),
        }
    }
}

/// A validated field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Category(String),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Category(c) => write!(f, "{}", c),
        }
    }
}

/// One validated input row, values in schema field order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<FieldValue>,
}

impl Record {
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn value(&self, field_index: usize) -> Option<&FieldValue> {
        self.values.get(field_index)
    }
}

/// Ordered set of required domain fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldSpec>", into = "Vec<FieldSpec>")]
pub struct DomainSchema {
    fields: Vec<FieldSpec>,
}

impl TryFrom<Vec<FieldSpec>> for DomainSchema {
    type Error = ValidationError;

    fn try_from(fields: Vec<FieldSpec>) -> Result<Self, Self::Error> {
        DomainSchema::new(fields)
    }
}

impl From<DomainSchema> for Vec<FieldSpec> {
    fn from(schema: DomainSchema) -> Self {
        schema.fields
    }
}

impl Default for DomainSchema {
    fn default() -> Self {
        Self::churn()
    }
}

impl DomainSchema {
    /// Build a schema, rejecting duplicate names, empty level lists and
    /// inverted numeric ranges
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, ValidationError> {
        if fields.is_empty() {
            return Err(ValidationError::InvalidSchema("no fields declared".to_string()));
        }

        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(ValidationError::InvalidSchema(format!(
                    "duplicate field '{}'",
                    field.name
                )));
            }
            match &field.kind {
                FieldKind::Numeric { min, max } => {
                    if !(min.is_finite() && max.is_finite()) || min > max {
                        return Err(ValidationError::InvalidSchema(format!(
                            "field '{}' has invalid range [{}, {}]",
                            field.name, min, max
                        )));
                    }
                }
                FieldKind::Categorical { levels } => {
                    if levels.is_empty() {
                        return Err(ValidationError::InvalidSchema(format!(
                            "categorical field '{}' declares no levels",
                            field.name
                        )));
                    }
                }
            }
        }

        Ok(Self { fields })
    }

    /// Bank customer churn schema
    pub fn churn() -> Self {
        Self {
            fields: vec![
                FieldSpec::numeric("CreditScore", 300.0, 900.0),
                FieldSpec::categorical("Geography", &["France", "Germany", "Spain"]),
                FieldSpec::categorical("Gender", &["Female", "Male"]),
                FieldSpec::numeric("Age", 18.0, 92.0),
                FieldSpec::numeric("Tenure", 0.0, 10.0),
                FieldSpec::numeric("Balance", 0.0, 10_000_000.0),
                FieldSpec::numeric("EstimatedSalary", 0.0, 10_000_000.0),
            ],
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Validate a JSON object. Keys not in the schema are ignored.
    pub fn record_from_json(&self, value: &serde_json::Value) -> Result<Record, ValidationError> {
        let object = value.as_object().ok_or_else(|| ValidationError::WrongType {
            field: "<record>".to_string(),
            expected: "JSON object",
        })?;

        let values = self
            .fields
            .iter()
            .map(|field| {
                let raw = object
                    .get(&field.name)
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
                match raw {
                    serde_json::Value::Number(n) => {
                        let n = n.as_f64().ok_or_else(|| ValidationError::NotNumeric {
                            field: field.name.clone(),
                            value: n.to_string(),
                        })?;
                        field.check_number(n)
                    }
                    serde_json::Value::String(s) => field.check_category(s),
                    _ => Err(ValidationError::WrongType {
                        field: field.name.clone(),
                        expected: if field.is_categorical() { "string" } else { "number" },
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Record { values })
    }

    /// Map each schema field to its column position in a tabular header
    ///
    /// Fails with every missing column listed, so callers see the whole
    /// problem at once.
    pub fn locate_columns<S: AsRef<str>>(&self, header: &[S]) -> Result<ColumnLayout, ValidationError> {
        let mut positions = Vec::with_capacity(self.fields.len());
        let mut missing = Vec::new();

        for field in &self.fields {
            match header.iter().position(|h| h.as_ref().trim() == field.name) {
                Some(pos) => positions.push(pos),
                None => missing.push(field.name.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(ValidationError::MissingColumns(missing));
        }

        Ok(ColumnLayout { positions })
    }

    /// Validate one tabular row laid out per `layout`
    pub fn record_from_row<S: AsRef<str>>(
        &self,
        layout: &ColumnLayout,
        row: &[S],
    ) -> Result<Record, ValidationError> {
        let values = self
            .fields
            .iter()
            .zip(&layout.positions)
            .map(|(field, &pos)| {
                let cell = row
                    .get(pos)
                    .map(|c| c.as_ref())
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
                field.parse_cell(cell)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Record { values })
    }
}

/// Column positions of each schema field within a tabular header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    positions: Vec<usize>,
}
