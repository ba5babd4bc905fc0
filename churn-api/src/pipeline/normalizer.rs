//! Schema normalization
//!
//! Turns validated records into the exact column layout the scorer was
//! trained on. The layout is compiled once into a per-column plan:
//!
//! - a numeric field whose name is a training column is copied through
//! - a categorical field expands to `"{Field}_{Level}"` indicators for every
//!   non-reference level (dropped-first encoding)
//! - any other training column is filled with zero
//!
//! Columns produced by the expansion but absent from training are dropped.

use churn_common::model::FeatureMatrix;
use churn_common::schema::{DomainSchema, FieldKind, FieldValue, Record};

#[derive(Debug, Clone, PartialEq)]
enum ColumnSource {
    Numeric(usize),
    Indicator { field: usize, level: String },
    Zero,
}

/// Scorer feature → domain field mapping (many-to-one)
///
/// `None` marks a feature that contributes nothing to explanations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFieldMap {
    column_fields: Vec<Option<usize>>,
}

impl FeatureFieldMap {
    /// Domain field index for each training column, in column order
    pub fn column_fields(&self) -> &[Option<usize>] {
        &self.column_fields
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    plan: Vec<ColumnSource>,
    field_map: FeatureFieldMap,
}

impl Normalizer {
    pub fn new(schema: &DomainSchema, columns: &[String]) -> Self {
        let plan: Vec<ColumnSource> = columns
            .iter()
            .map(|column| plan_column(schema, column))
            .collect();

        let column_fields = plan
            .iter()
            .map(|source| match source {
                ColumnSource::Numeric(field) => Some(*field),
                ColumnSource::Indicator { field, .. } => Some(*field),
                ColumnSource::Zero => None,
            })
            .collect();

        let zero_filled = plan.iter().filter(|s| **s == ColumnSource::Zero).count();
        if zero_filled > 0 {
            tracing::debug!(zero_filled, "Training columns with no schema source are zero-filled");
        }

        Self {
            plan,
            field_map: FeatureFieldMap { column_fields },
        }
    }

    pub fn width(&self) -> usize {
        self.plan.len()
    }

    pub fn field_map(&self) -> &FeatureFieldMap {
        &self.field_map
    }

    /// Write one record's feature vector into `out` (length = `width()`)
    pub fn normalize_into(&self, record: &Record, out: &mut [f64]) {
        for (slot, source) in out.iter_mut().zip(&self.plan) {
            *slot = match source {
                ColumnSource::Numeric(field) => match record.value(*field) {
                    Some(FieldValue::Number(n)) => *n,
                    _ => 0.0,
                },
                ColumnSource::Indicator { field, level } => match record.value(*field) {
                    Some(FieldValue::Category(value)) if value == level => 1.0,
                    _ => 0.0,
                },
                ColumnSource::Zero => 0.0,
            };
        }
    }

    pub fn normalize(&self, records: &[Record]) -> FeatureMatrix {
        let mut matrix = FeatureMatrix::with_capacity(records.len(), self.width());
        let mut row = vec![0.0; self.width()];
        for record in records {
            self.normalize_into(record, &mut row);
            // width matches by construction
            let _ = matrix.push_row(&row);
        }
        matrix
    }
}

fn plan_column(schema: &DomainSchema, column: &str) -> ColumnSource {
    for (index, field) in schema.fields().iter().enumerate() {
        match &field.kind {
            FieldKind::Numeric { .. } if field.name == column => {
                return ColumnSource::Numeric(index);
            }
            FieldKind::Categorical { levels } => {
                let Some(level) = column
                    .strip_prefix(field.name.as_str())
                    .and_then(|rest| rest.strip_prefix('_'))
                else {
                    continue;
                };
                // levels[0] is the reference level and never gets a column
                if levels.iter().skip(1).any(|l| l == level) {
                    return ColumnSource::Indicator {
                        field: index,
                        level: level.to_string(),
                    };
                }
            }
            _ => {}
        }
    }
    ColumnSource::Zero
}
