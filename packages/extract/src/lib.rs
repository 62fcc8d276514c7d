#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Rule-driven field extraction for task order documents.
//!
//! [`extract`] turns the first-page text of a task order into a
//! [`TaskOrder`] record:
//!
//! 1. The contractor is the canonical name of the first contractor rule
//!    that matches anywhere in the text.
//! 2. Every other field comes from its label rule in the [`RuleSet`]; the
//!    first match wins.
//! 3. Matched tokens are coerced to the field's value type.
//!
//! A missing field is never fatal: it is left out of the record and a
//! warning [`Event`] is emitted. An unparseable date is kept as raw text.
//! Only a numeric value that matched its pattern but still fails to parse
//! aborts the document.

pub mod rules;

use task_orders_models::events::{Event, EventSink};
use task_orders_models::{
    CoercionError, DateValue, Field, FieldValue, TaskOrder, ValueKind, coerce,
};

pub use rules::{RuleError, RuleSet};

/// Errors that abort extraction of a whole document.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// A matched numeric value could not be converted.
    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

/// Extracts a task order record from page text.
///
/// # Errors
///
/// Returns [`ExtractError::Coercion`] if a currency, mileage or count token
/// matched its pattern but is not a valid number.
pub fn extract(
    text: &str,
    rules: &RuleSet,
    sink: &dyn EventSink,
) -> Result<TaskOrder, ExtractError> {
    let mut record = TaskOrder::new();

    if let Some(contractor) = resolve_contractor(text, rules) {
        sink.emit(Event::FieldExtracted {
            field: Field::Contractor,
            value: contractor.clone(),
        });
        record.insert(Field::Contractor, FieldValue::Text(contractor));
    } else {
        sink.emit(Event::ContractorMissing);
    }

    for rule in rules.fields() {
        let field = rule.field();

        let Some(raw) = rule.find(text) else {
            sink.emit(Event::FieldMissing { field });
            continue;
        };

        let value = match coerce(field, raw) {
            Ok(value) => value,
            Err(e) if field.kind() == ValueKind::Date => {
                sink.emit(Event::DateUnparsed {
                    field,
                    raw: raw.to_owned(),
                    message: e.message,
                });
                FieldValue::Date(DateValue::Raw(raw.to_owned()))
            }
            Err(e) => return Err(e.into()),
        };

        sink.emit(Event::FieldExtracted {
            field,
            value: value.to_string(),
        });
        record.insert(field, value);
    }

    log::debug!(
        "Extracted {}/{} fields from {} characters of text",
        record.len(),
        Field::ALL.len(),
        text.len()
    );

    Ok(record)
}

/// Returns the canonical name of the first contractor rule matching `text`.
#[must_use]
pub fn resolve_contractor(text: &str, rules: &RuleSet) -> Option<String> {
    rules
        .contractors()
        .iter()
        .find_map(|rule| rule.resolve(text))
}
