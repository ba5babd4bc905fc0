//! Explanation ranking
//!
//! Contribution of a training column is `importance * |scaled value|`.
//! Contributions are folded into domain fields through the feature→field
//! map, ranked descending, and the top entries are emitted: the field name
//! for numeric fields, the record's own value for categorical ones.
//!
//! Ties go to the field that appears first in the training column order, so
//! the output depends only on its inputs.

use churn_common::model::{FeatureMatrix, ModelError};
use churn_common::schema::{DomainSchema, FieldValue, Record};

use super::normalizer::FeatureFieldMap;

/// Largest explanation ever produced
pub const MAX_EXPLANATION_LEN: usize = 3;

/// A domain field that at least one training column maps to
#[derive(Debug, Clone, PartialEq)]
struct RankedField {
    field_index: usize,
    name: String,
    categorical: bool,
}

#[derive(Debug, Clone)]
pub struct ExplanationRanker {
    /// Fields in first-occurrence order over the training columns
    fields: Vec<RankedField>,
    /// Per column: `(slot in fields, importance)` for mapped columns
    fold: Vec<Option<(usize, f64)>>,
    top_n: usize,
}

impl ExplanationRanker {
    pub fn new(
        schema: &DomainSchema,
        map: &FeatureFieldMap,
        importances: &[f64],
        top_n: usize,
    ) -> Result<Self, ModelError> {
        let column_fields = map.column_fields();
        if importances.len() != column_fields.len() {
            return Err(ModelError::DimensionMismatch {
                expected: column_fields.len(),
                actual: importances.len(),
            });
        }

        let mut fields: Vec<RankedField> = Vec::new();
        let mut fold = Vec::with_capacity(column_fields.len());

        for (field, &weight) in column_fields.iter().zip(importances) {
            let Some(field_index) = *field else {
                fold.push(None);
                continue;
            };
            let slot = match fields.iter().position(|f| f.field_index == field_index) {
                Some(slot) => slot,
                None => {
                    let spec = schema.fields().get(field_index).ok_or_else(|| {
                        ModelError::Invalid(format!("feature maps to unknown field #{}", field_index))
                    })?;
                    fields.push(RankedField {
                        field_index,
                        name: spec.name.clone(),
                        categorical: spec.is_categorical(),
                    });
                    fields.len() - 1
                }
            };
            fold.push(Some((slot, weight)));
        }

        Ok(Self {
            fields,
            fold,
            top_n: top_n.min(MAX_EXPLANATION_LEN),
        })
    }

    /// Number of rankable domain fields (width of a contribution row)
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Field contributions for the selected rows of a scaled chunk
    ///
    /// Computes `|X| · W` for `rows` only, where `W` is the importance
    /// weighted fold matrix. Result is row-major, `rows.len() x field_count()`.
    pub fn contributions(&self, scaled: &FeatureMatrix, rows: &[usize]) -> Vec<f64> {
        let width = self.fields.len();
        let mut out = vec![0.0; rows.len() * width];

        for (out_row, &row_index) in out.chunks_exact_mut(width.max(1)).zip(rows) {
            let Some(row) = scaled.row(row_index) else {
                continue;
            };
            for (value, fold) in row.iter().zip(&self.fold) {
                if let Some((slot, weight)) = fold {
                    out_row[*slot] += weight * value.abs();
                }
            }
        }

        out
    }

    /// Rank one row of field contributions and emit the explanation
    pub fn rank(&self, field_contributions: &[f64], record: &Record) -> Vec<String> {
        let mut order: Vec<usize> = (0..self.fields.len().min(field_contributions.len())).collect();
        // descending contribution; lower slot (earlier column) wins ties
        order.sort_by(|&a, &b| {
            field_contributions[b]
                .total_cmp(&field_contributions[a])
                .then(a.cmp(&b))
        });

        let mut explanation: Vec<String> = Vec::with_capacity(self.top_n);
        for slot in order {
            if explanation.len() == self.top_n {
                break;
            }
            let field = &self.fields[slot];
            let entry = if field.categorical {
                match record.value(field.field_index) {
                    Some(FieldValue::Category(value)) => value.clone(),
                    _ => field.name.clone(),
                }
            } else {
                field.name.clone()
            };
            if !explanation.contains(&entry) {
                explanation.push(entry);
            }
        }

        explanation
    }

    /// Explain a single scaled row
    pub fn explain(&self, scaled_row: &[f64], record: &Record) -> Result<Vec<String>, ModelError> {
        let scaled = FeatureMatrix::from_flat(scaled_row.len(), scaled_row.to_vec())?;
        let contributions = self.contributions(&scaled, &[0]);
        Ok(self.rank(&contributions, record))
    }
}
