//! Extraction and merge events.
//!
//! The extractor and the store merger report what happened to each field
//! and record through an [`EventSink`] instead of writing to the global
//! logger directly. The binary uses [`LogSink`]; tests use
//! [`RecordingSink`] to assert on warnings and errors.

use std::sync::{Mutex, PoisonError};

use crate::Field;

/// Something observable that happened while processing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// No contractor rule matched the document text.
    ContractorMissing,
    /// A field was matched and coerced.
    FieldExtracted {
        /// Field that was extracted.
        field: Field,
        /// Rendered value.
        value: String,
    },
    /// A labeled field's pattern did not match.
    FieldMissing {
        /// Field left absent.
        field: Field,
    },
    /// A matched date is not a valid date and was kept as raw text.
    DateUnparsed {
        /// Date field.
        field: Field,
        /// Text kept in the record.
        raw: String,
        /// Parser error.
        message: String,
    },
    /// The record's task order is already in the store.
    Duplicate {
        /// Existing task order number.
        key: String,
    },
    /// The record has no task order number and was not stored.
    Unkeyed,
    /// The record was appended to the store.
    Inserted {
        /// Task order number of the new row, if it has one.
        key: Option<String>,
        /// Row count after the insert.
        rows: usize,
    },
}

impl Event {
    /// Log level this event is reported at.
    #[must_use]
    pub const fn level(&self) -> log::Level {
        match self {
            Self::FieldExtracted { .. } | Self::Duplicate { .. } | Self::Inserted { .. } => {
                log::Level::Info
            }
            Self::ContractorMissing | Self::FieldMissing { .. } | Self::Unkeyed => {
                log::Level::Warn
            }
            Self::DateUnparsed { .. } => log::Level::Error,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContractorMissing => f.write_str("Could not find contractor name"),
            Self::FieldExtracted { field, value } => write!(f, "Extracted {field}: {value}"),
            Self::FieldMissing { field } => write!(f, "Could not find {field}"),
            Self::DateUnparsed {
                field,
                raw,
                message,
            } => write!(f, "Error parsing {field} '{raw}': {message}"),
            Self::Duplicate { key } => write!(f, "Task order {key} already exists in store"),
            Self::Unkeyed => f.write_str("Record has no Task Order #; not stored"),
            Self::Inserted { key, rows } => write!(
                f,
                "Stored task order {} ({rows} rows)",
                key.as_deref().unwrap_or("<none>")
            ),
        }
    }
}

/// Receiver for [`Event`]s.
pub trait EventSink: Send + Sync {
    /// Reports one event.
    fn emit(&self, event: Event);
}

/// Forwards events to the `log` facade at their [`Event::level`].
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: Event) {
        log::log!(event.level(), "{event}");
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events emitted so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events at warning level or more severe.
    #[must_use]
    pub fn problems(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.level() <= log::Level::Warn)
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order_and_filters_problems() {
        let sink = RecordingSink::new();
        sink.emit(Event::FieldExtracted {
            field: Field::FeederId,
            value: "1234-56".to_owned(),
        });
        sink.emit(Event::FieldMissing {
            field: Field::WorkOrderCount,
        });
        sink.emit(Event::DateUnparsed {
            field: Field::EndDate,
            raw: "13/45/24".to_owned(),
            message: "input is out of range".to_owned(),
        });

        assert_eq!(sink.events().len(), 3);
        assert_eq!(
            sink.problems(),
            vec![
                Event::FieldMissing {
                    field: Field::WorkOrderCount,
                },
                Event::DateUnparsed {
                    field: Field::EndDate,
                    raw: "13/45/24".to_owned(),
                    message: "input is out of range".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn messages_name_the_column() {
        let event = Event::FieldMissing {
            field: Field::WorkOrderCount,
        };
        assert_eq!(event.to_string(), "Could not find # of Work Orders");
    }
}
