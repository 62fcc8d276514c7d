//! Idempotent merge of one extracted record into the store.

use std::path::Path;

use task_orders_models::TaskOrder;
use task_orders_models::events::{Event, EventSink};

use crate::{Store, StoreError};

/// What to do with a record that has no task order number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnkeyedPolicy {
    /// Skip it with a warning. Such a row could never be deduplicated.
    #[default]
    Reject,
    /// Append it as a row with an empty key.
    Append,
}

/// Merge behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Handling of records without a task order number.
    pub unkeyed: UnkeyedPolicy,
}

/// Result of a [`merge`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The record was appended; the store now has `rows` rows.
    Inserted {
        /// Row count after the insert.
        rows: usize,
    },
    /// A row with the same task order number already exists. Nothing was
    /// written.
    AlreadyExists,
    /// The record has no task order number and the policy rejected it.
    /// Nothing was written.
    SkippedUnkeyed,
}

/// Merges `record` into the store at `path`.
///
/// Loads the store (empty if absent), skips the record if its task order
/// number is already stored, otherwise appends it, re-sorts by start date
/// (newest first) and saves atomically. Existing rows are never modified.
///
/// # Errors
///
/// Returns [`StoreError`] if the store cannot be loaded or saved. The
/// previous store file is unchanged in that case.
pub fn merge(
    record: &TaskOrder,
    path: &Path,
    options: &MergeOptions,
    sink: &dyn EventSink,
) -> Result<MergeOutcome, StoreError> {
    let mut store = Store::load(path)?;
    let key = record.task_order_number();

    match key {
        Some(key) if store.contains(key) => {
            sink.emit(Event::Duplicate {
                key: key.to_owned(),
            });
            return Ok(MergeOutcome::AlreadyExists);
        }
        None if options.unkeyed == UnkeyedPolicy::Reject => {
            sink.emit(Event::Unkeyed);
            return Ok(MergeOutcome::SkippedUnkeyed);
        }
        _ => {}
    }

    store.push(record.clone());
    store.sort_by_start_date_desc();
    store.save(path)?;

    let rows = store.len();
    sink.emit(Event::Inserted {
        key: key.map(str::to_owned),
        rows,
    });

    Ok(MergeOutcome::Inserted { rows })
}
