//! Chunked batch execution
//!
//! Reads the uploaded CSV `chunk_size` rows at a time, validates each row,
//! scores the chunk through the shared [`Pipeline`] and appends the result
//! rows to the output. Memory is bounded by one chunk; the header is written
//! once, before the first chunk.
//!
//! A chunk is only a unit of work. Per-row output is the same for any chunk
//! size, and any error fails the whole run.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use churn_common::config::RowPolicy;
use churn_common::schema::{ColumnLayout, Record, ValidationError};
use tracing::{debug, info};

use super::BatchError;
use crate::models::JobSummary;
use crate::pipeline::{Decision, Pipeline};

/// Columns appended to every input row
pub const OUTPUT_COLUMNS: [&str; 4] = ["probability", "risk_tier", "label", "explanation"];

/// Separator between explanation entries in the output cell
const EXPLANATION_SEPARATOR: &str = ";";

#[derive(Debug, Clone)]
pub struct BatchExecutor {
    pipeline: Arc<Pipeline>,
    chunk_size: usize,
    row_policy: RowPolicy,
}

/// Rows of the chunk being assembled
struct Chunk {
    raw: Vec<csv::StringRecord>,
    records: Vec<Record>,
}

impl Chunk {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            raw: Vec::with_capacity(capacity),
            records: Vec::with_capacity(capacity),
        }
    }

    fn clear(&mut self) {
        self.raw.clear();
        self.records.clear();
    }
}

impl BatchExecutor {
    pub fn new(pipeline: Arc<Pipeline>, chunk_size: usize, row_policy: RowPolicy) -> Self {
        Self {
            pipeline,
            chunk_size: chunk_size.max(1),
            row_policy,
        }
    }

    /// Score every row of `input` into `output`
    pub fn run<R: Read, W: Write>(&self, input: R, output: W) -> Result<JobSummary, BatchError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(input);
        let header = reader.headers()?.clone();
        let header_fields: Vec<&str> = header.iter().collect();
        let layout = self.pipeline.schema().locate_columns(&header_fields)?;

        let mut writer = csv::Writer::from_writer(output);
        writer.write_record(header.iter().chain(OUTPUT_COLUMNS))?;

        let mut summary = JobSummary::default();
        let mut chunk = Chunk::with_capacity(self.chunk_size);
        let mut raw = csv::ByteRecord::new();
        let mut rows_in_chunk = 0usize;

        loop {
            let more = reader.read_byte_record(&mut raw)?;
            if more {
                rows_in_chunk += 1;
                self.accept_row(&layout, &raw, &mut chunk, &mut summary)?;
            }

            let chunk_full = rows_in_chunk == self.chunk_size;
            if rows_in_chunk > 0 && (chunk_full || !more) {
                self.score_chunk(&chunk, header.len(), &mut writer)?;
                summary.rows_scored += chunk.records.len() as u64;
                summary.chunks += 1;
                debug!(
                    chunk = summary.chunks,
                    rows = chunk.records.len(),
                    "Chunk scored"
                );
                chunk.clear();
                rows_in_chunk = 0;
            }

            if !more {
                break;
            }
        }

        writer.flush()?;

        info!(
            rows_scored = summary.rows_scored,
            rows_skipped = summary.rows_skipped,
            chunks = summary.chunks,
            "Batch scoring complete"
        );

        Ok(summary)
    }

    /// Run against files: `input` → `partial`, then rename `partial` → `result`
    ///
    /// `result` only ever appears complete. On error the partial file is
    /// left for the caller to discard.
    pub fn run_to_file(
        &self,
        input: &Path,
        partial: &Path,
        result: &Path,
    ) -> Result<JobSummary, BatchError> {
        let input = File::open(input)?;
        let mut output = BufWriter::new(File::create(partial)?);

        let summary = self.run(input, &mut output)?;

        output.flush()?;
        output.get_ref().sync_all()?;
        drop(output);

        std::fs::rename(partial, result)?;
        Ok(summary)
    }

    /// Decode and validate one row; encoding errors go through the row policy
    /// like any other invalid value
    fn accept_row(
        &self,
        layout: &ColumnLayout,
        raw: &csv::ByteRecord,
        chunk: &mut Chunk,
        summary: &mut JobSummary,
    ) -> Result<(), BatchError> {
        let line = raw.position().map(|p| p.line()).unwrap_or(0);
        let parsed = csv::StringRecord::from_byte_record(raw.clone())
            .map_err(|e| ValidationError::InvalidEncoding {
                column: e.utf8_error().field() + 1,
            })
            .and_then(|row| {
                let cells: Vec<&str> = row.iter().collect();
                let record = self.pipeline.schema().record_from_row(layout, &cells)?;
                Ok((row, record))
            });

        match parsed {
            Ok((row, record)) => {
                chunk.raw.push(row);
                chunk.records.push(record);
                Ok(())
            }
            Err(source) => {
                match self.row_policy {
                    RowPolicy::RejectJob => Err(BatchError::InvalidRow { line, source }),
                    RowPolicy::SkipRow => {
                        debug!(line, error = %source, "Skipping invalid row");
                        summary.rows_skipped += 1;
                        Ok(())
                    }
                }
            }
        }
    }

    fn score_chunk<W: Write>(
        &self,
        chunk: &Chunk,
        width: usize,
        writer: &mut csv::Writer<W>,
    ) -> Result<(), BatchError> {
        if chunk.records.is_empty() {
            return Ok(());
        }

        let decisions = self.pipeline.score(&chunk.records)?;
        for (raw, decision) in chunk.raw.iter().zip(&decisions) {
            writer.write_record(output_row(raw, width, decision))?;
        }
        Ok(())
    }
}

/// Input cells padded or cut to the header width, then the decision columns
fn output_row(raw: &csv::StringRecord, width: usize, decision: &Decision) -> Vec<String> {
    let mut row: Vec<String> = raw.iter().take(width).map(str::to_string).collect();
    row.resize(width, String::new());
    row.push(format!("{:.4}", decision.probability));
    row.push(decision.risk_tier.to_string());
    row.push(decision.label.clone());
    row.push(decision.explanation.join(EXPLANATION_SEPARATOR));
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::reference_pipeline;

    const HEADER: &str =
        "CustomerId,CreditScore,Geography,Gender,Age,Tenure,Balance,EstimatedSalary\n";

    fn rows() -> String {
        let mut csv = String::from(HEADER);
        csv.push_str("1,350,Germany,Male,55,2,150000,40000\n");
        csv.push_str("2,900,Germany,Male,55,2,0,40000\n");
        csv.push_str("3,620,France,Female,30,7,0,90000\n");
        csv.push_str("4,500,Spain,Male,61,1,120000,30000\n");
        csv.push_str("5,780,France,Female,42,4,80000,110000\n");
        csv
    }

    fn executor(chunk_size: usize, row_policy: RowPolicy) -> BatchExecutor {
        BatchExecutor::new(Arc::new(reference_pipeline()), chunk_size, row_policy)
    }

    fn run(executor: &BatchExecutor, input: &str) -> Result<(JobSummary, String), BatchError> {
        let mut out = Vec::new();
        let summary = executor.run(input.as_bytes(), &mut out)?;
        Ok((summary, String::from_utf8(out).unwrap()))
    }

    #[test]
    fn test_output_has_input_columns_plus_decision() {
        let (summary, out) = run(&executor(1000, RowPolicy::RejectJob), &rows()).unwrap();
        assert_eq!(summary.rows_scored, 5);
        assert_eq!(summary.chunks, 1);

        let mut lines = out.lines();
        assert_eq!(
            lines.next().unwrap(),
            "CustomerId,CreditScore,Geography,Gender,Age,Tenure,Balance,EstimatedSalary,\
             probability,risk_tier,label,explanation"
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("1,350,Germany,Male,55,2,150000,40000,0.5"));
        assert!(first.ends_with(",HIGH,will churn,Age;Germany;Male"));

        let second = lines.next().unwrap();
        assert!(second.ends_with(",LOW,will stay,"));
        assert_eq!(out.lines().count(), 6);
    }

    #[test]
    fn test_chunking_is_transparent() {
        let (_, expected) = run(&executor(1000, RowPolicy::RejectJob), &rows()).unwrap();

        for chunk_size in [1, 2, 3, 4, 5, 6] {
            let (summary, out) = run(&executor(chunk_size, RowPolicy::RejectJob), &rows()).unwrap();
            assert_eq!(out, expected, "chunk_size {}", chunk_size);
            assert_eq!(summary.rows_scored, 5);
            assert_eq!(summary.chunks, (5 + chunk_size as u64 - 1) / chunk_size as u64);
        }
    }

    #[test]
    fn test_header_written_once() {
        let (_, out) = run(&executor(2, RowPolicy::RejectJob), &rows()).unwrap();
        assert_eq!(out.matches("probability").count(), 1);
    }

    #[test]
    fn test_skip_row_policy_drops_invalid_rows() {
        let mut input = String::from(HEADER);
        input.push_str("1,350,Germany,Male,55,2,150000,40000\n");
        input.push_str("2,350,Germany,Male,150,2,150000,40000\n");

        let (summary, out) = run(&executor(1, RowPolicy::SkipRow), &input).unwrap();
        assert_eq!(summary.rows_scored, 1);
        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(out.lines().count(), 2);
        assert!(!out.contains("\n2,"));
    }

    #[test]
    fn test_reject_job_policy_fails_on_invalid_row() {
        let mut input = String::from(HEADER);
        input.push_str("1,350,Germany,Male,55,2,150000,40000\n");
        input.push_str("2,350,Atlantis,Male,55,2,150000,40000\n");

        match run(&executor(1000, RowPolicy::RejectJob), &input) {
            Err(BatchError::InvalidRow { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected InvalidRow, got {:?}", other.map(|(s, _)| s)),
        }
    }

    #[test]
    fn test_undecodable_row_follows_row_policy() {
        let mut input = HEADER.as_bytes().to_vec();
        input.extend_from_slice(b"1,350,Germany,Male,55,2,150000,40000\n");
        input.extend_from_slice(b"2,350,Germ\xffany,Male,55,2,150000,40000\n");

        let mut out = Vec::new();
        let summary = executor(10, RowPolicy::SkipRow)
            .run(input.as_slice(), &mut out)
            .unwrap();
        assert_eq!(summary.rows_scored, 1);
        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);

        match executor(10, RowPolicy::RejectJob).run(input.as_slice(), Vec::new()) {
            Err(BatchError::InvalidRow { line, source }) => {
                assert_eq!(line, 3);
                assert_eq!(source, ValidationError::InvalidEncoding { column: 3 });
            }
            other => panic!("expected InvalidRow, got {:?}", other),
        }
    }

    #[test]
    fn test_short_row_is_missing_fields() {
        let mut input = String::from(HEADER);
        input.push_str("1,350,Germany\n");

        assert!(matches!(
            run(&executor(10, RowPolicy::RejectJob), &input),
            Err(BatchError::InvalidRow { .. })
        ));

        let (summary, _) = run(&executor(10, RowPolicy::SkipRow), &input).unwrap();
        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(summary.rows_scored, 0);
    }

    #[test]
    fn test_missing_header_column_is_input_error() {
        let input = "CreditScore,Geography,Gender,Age,Tenure,Balance\n350,Germany,Male,55,2,0\n";
        assert!(matches!(
            run(&executor(10, RowPolicy::RejectJob), input),
            Err(BatchError::Input(_))
        ));
    }

    #[test]
    fn test_header_only_input_scores_nothing() {
        let (summary, out) = run(&executor(10, RowPolicy::RejectJob), HEADER).unwrap();
        assert_eq!(summary, JobSummary::default());
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn test_run_to_file_renames_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let partial = dir.path().join("job.partial.csv");
        let result = dir.path().join("job_result.csv");
        std::fs::write(&input, rows()).unwrap();

        let summary = executor(2, RowPolicy::RejectJob)
            .run_to_file(&input, &partial, &result)
            .unwrap();

        assert_eq!(summary.rows_scored, 5);
        assert!(!partial.exists());
        let written = std::fs::read_to_string(&result).unwrap();
        assert_eq!(written.lines().count(), 6);
    }

    #[test]
    fn test_run_to_file_leaves_no_result_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let partial = dir.path().join("job.partial.csv");
        let result = dir.path().join("job_result.csv");
        let mut csv = rows();
        csv.push_str("6,100,France,Female,30,1,0,1000\n");
        std::fs::write(&input, csv).unwrap();

        assert!(executor(2, RowPolicy::RejectJob)
            .run_to_file(&input, &partial, &result)
            .is_err());
        assert!(!result.exists());
    }
}
