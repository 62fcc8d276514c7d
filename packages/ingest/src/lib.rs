#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch driver that extracts task order PDFs into the store.
//!
//! Documents are processed one at a time: decode the first page, extract
//! the record, merge it into the store. Any failure is contained to its
//! document; the batch always moves on to the next one.

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use task_orders_extract::{ExtractError, RuleSet, extract};
use task_orders_models::TaskOrder;
use task_orders_models::events::EventSink;
use task_orders_models::progress::ProgressCallback;
use task_orders_pdf::PdfError;
use task_orders_store::{MergeOptions, MergeOutcome, StoreError, merge};

/// Errors that stop a batch before any document is processed.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The input directory could not be listed.
    #[error("I/O error listing {path}: {source}")]
    Io {
        /// Directory that failed to list.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors that fail a single document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The PDF could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[from] PdfError),

    /// A matched value could not be coerced.
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    /// The store could not be read or written.
    #[error("store update failed: {0}")]
    Store(#[from] StoreError),
}

/// A document that failed, and why.
#[derive(Debug, Clone)]
pub struct FailedDocument {
    /// Path of the document.
    pub path: PathBuf,
    /// Rendered error.
    pub error: String,
}

/// Result of a completed batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Number of PDFs found in the input directory.
    pub documents: usize,
    /// Records appended to the store.
    pub inserted: usize,
    /// Records skipped because their task order was already stored.
    pub duplicates: usize,
    /// Records skipped because they have no task order number.
    pub skipped_unkeyed: usize,
    /// Documents that failed to decode, extract or merge.
    pub failed: Vec<FailedDocument>,
    /// How long the batch took.
    pub duration: Duration,
}

impl BatchSummary {
    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted { .. } => self.inserted += 1,
            MergeOutcome::AlreadyExists => self.duplicates += 1,
            MergeOutcome::SkippedUnkeyed => self.skipped_unkeyed += 1,
        }
    }
}

/// Lists the `.pdf` files (any extension case) directly inside `dir`,
/// sorted by path.
///
/// # Errors
///
/// Returns [`IngestError::Io`] if the directory cannot be read.
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let io_err = |e| IngestError::Io {
        path: dir.display().to_string(),
        source: e,
    };

    let mut pdfs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            pdfs.push(path);
        }
    }
    pdfs.sort();

    Ok(pdfs)
}

/// Decodes a PDF and extracts its record without touching the store.
///
/// # Errors
///
/// Returns [`DocumentError`] if the PDF cannot be decoded or a numeric
/// value fails to coerce.
pub fn extract_document(
    path: &Path,
    rules: &RuleSet,
    sink: &dyn EventSink,
) -> Result<TaskOrder, DocumentError> {
    let text = task_orders_pdf::first_page_text(path)?;
    log::debug!("Extracted text from {}:\n{text}", path.display());
    Ok(extract(&text, rules, sink)?)
}

/// Extracts a record from page text and merges it into the store.
///
/// # Errors
///
/// Returns [`DocumentError`] if extraction aborts or the store update
/// fails.
pub fn process_text(
    text: &str,
    store_path: &Path,
    rules: &RuleSet,
    options: &MergeOptions,
    sink: &dyn EventSink,
) -> Result<MergeOutcome, DocumentError> {
    let record = extract(text, rules, sink)?;
    Ok(merge(&record, store_path, options, sink)?)
}

/// Decodes, extracts and merges one PDF.
///
/// # Errors
///
/// Returns [`DocumentError`] if any stage fails.
pub fn process_document(
    path: &Path,
    store_path: &Path,
    rules: &RuleSet,
    options: &MergeOptions,
    sink: &dyn EventSink,
) -> Result<MergeOutcome, DocumentError> {
    let record = extract_document(path, rules, sink)?;
    Ok(merge(&record, store_path, options, sink)?)
}

/// Processes every PDF in `input_dir` into the store at `store_path`.
///
/// Per-document failures are logged and collected in the summary; they
/// never stop the batch.
///
/// # Errors
///
/// Returns [`IngestError`] only if the input directory cannot be listed.
pub fn run_batch(
    input_dir: &Path,
    store_path: &Path,
    rules: &RuleSet,
    options: &MergeOptions,
    sink: &dyn EventSink,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<BatchSummary, IngestError> {
    let start = Instant::now();
    let pdfs = discover_pdfs(input_dir)?;

    log::info!(
        "Found {} PDF(s) in {}; store: {}",
        pdfs.len(),
        input_dir.display(),
        store_path.display()
    );

    let mut summary = BatchSummary {
        documents: pdfs.len(),
        ..BatchSummary::default()
    };
    progress.set_total(pdfs.len() as u64);

    for path in &pdfs {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        progress.set_message(name);
        log::info!("Processing {}", path.display());

        match process_document(path, store_path, rules, options, sink) {
            Ok(outcome) => summary.record(outcome),
            Err(e) => {
                log::error!("Failed to process {}: {e}", path.display());
                summary.failed.push(FailedDocument {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }

        progress.inc(1);
    }

    summary.duration = start.elapsed();

    log::info!(
        "Batch complete in {:.1}s: {} inserted, {} duplicate, {} unkeyed, {} failed",
        summary.duration.as_secs_f64(),
        summary.inserted,
        summary.duplicates,
        summary.skipped_unkeyed,
        summary.failed.len()
    );
    progress.finish(format!(
        "{} document(s) processed, {} inserted",
        summary.documents, summary.inserted
    ));

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use task_orders_models::Field;
    use task_orders_models::events::{Event, RecordingSink};
    use task_orders_models::progress::null_progress;
    use task_orders_store::Store;

    use super::*;

    const SCENARIO_A: &str = "\
Ceres Environmental Services, Inc.
Task Order Number: TO-2024-001
Task Order Total Amount: $12,500.00
Feeder ID: 1234-56
Length: 3.5 overhead miles
Work Orders: 7 WO locations
Start Date: 01/15/24
End Date: 02/15/24
";

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("task_orders_ingest_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn discovers_only_pdf_files_sorted() {
        let dir = scratch("discover");
        std::fs::write(dir.join("b.pdf"), b"").unwrap();
        std::fs::write(dir.join("a.PDF"), b"").unwrap();
        std::fs::write(dir.join("notes.txt"), b"").unwrap();
        std::fs::create_dir_all(dir.join("folder.pdf")).unwrap();

        let pdfs = discover_pdfs(&dir).unwrap();
        let names: Vec<_> = pdfs
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_input_dir_is_an_error() {
        let dir = std::env::temp_dir().join("task_orders_ingest_no_such_dir");
        let _ = std::fs::remove_dir_all(&dir);
        assert!(matches!(discover_pdfs(&dir), Err(IngestError::Io { .. })));
    }

    #[test]
    fn reprocessing_the_same_text_is_idempotent() {
        let dir = scratch("idempotent");
        let store_path = dir.join("task_orders.csv");
        let rules = RuleSet::default_rules();
        let options = MergeOptions::default();
        let sink = RecordingSink::new();

        let first = process_text(SCENARIO_A, &store_path, &rules, &options, &sink).unwrap();
        let second = process_text(SCENARIO_A, &store_path, &rules, &options, &sink).unwrap();

        assert_eq!(first, MergeOutcome::Inserted { rows: 1 });
        assert_eq!(second, MergeOutcome::AlreadyExists);

        let store = Store::load(&store_path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.rows()[0].get(Field::TotalAmount).unwrap().to_string(),
            "12500.00"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unparseable_dates_are_stored_raw_and_sorted_last() {
        let dir = scratch("raw_dates");
        let store_path = dir.join("task_orders.csv");
        let rules = RuleSet::default_rules();
        let options = MergeOptions::default();
        let sink = RecordingSink::new();

        let bad = SCENARIO_A
            .replace("TO-2024-001", "TO-BAD")
            .replace("Start Date: 01/15/24", "Start Date: 19/39/24");
        let older = SCENARIO_A
            .replace("TO-2024-001", "TO-OLD")
            .replace("Start Date: 01/15/24", "Start Date: 06/01/2020");

        process_text(&bad, &store_path, &rules, &options, &sink).unwrap();
        process_text(SCENARIO_A, &store_path, &rules, &options, &sink).unwrap();
        process_text(&older, &store_path, &rules, &options, &sink).unwrap();

        let store = Store::load(&store_path).unwrap();
        let keys: Vec<_> = store
            .rows()
            .iter()
            .filter_map(TaskOrder::task_order_number)
            .collect();
        assert_eq!(keys, vec!["TO-2024-001", "TO-OLD", "TO-BAD"]);
        assert_eq!(
            store.rows()[2].get(Field::StartDate).unwrap().to_string(),
            "19/39/24"
        );
        assert!(sink.events().iter().any(|e| matches!(
            e,
            Event::DateUnparsed {
                field: Field::StartDate,
                ..
            }
        )));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn coercion_failure_fails_only_that_document() {
        let dir = scratch("coercion");
        let store_path = dir.join("task_orders.csv");
        let text = SCENARIO_A.replace("Length: 3.5", "Length: 3..5");

        let result = process_text(
            &text,
            &store_path,
            &RuleSet::default_rules(),
            &MergeOptions::default(),
            &RecordingSink::new(),
        );

        assert!(matches!(result, Err(DocumentError::Extract(_))));
        assert!(!store_path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn undecodable_pdfs_are_counted_and_skipped() {
        let dir = scratch("batch");
        let input = dir.join("input");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("broken.pdf"), b"not a pdf at all").unwrap();
        std::fs::write(input.join("empty.pdf"), b"").unwrap();
        let store_path = dir.join("output").join("task_orders.csv");

        let summary = run_batch(
            &input,
            &store_path,
            &RuleSet::default_rules(),
            &MergeOptions::default(),
            &RecordingSink::new(),
            &null_progress(),
        )
        .unwrap();

        assert_eq!(summary.documents, 2);
        assert_eq!(summary.failed.len(), 2);
        assert_eq!(summary.inserted, 0);
        assert!(
            summary
                .failed
                .iter()
                .all(|f| f.error.starts_with("decode failed"))
        );
        assert!(!store_path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
