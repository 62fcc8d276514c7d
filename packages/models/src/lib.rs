#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Task order record types and the fixed store schema.
//!
//! A [`TaskOrder`] is the unit of data exchanged between the field
//! extractor and the store merger. It maps each [`Field`] of the schema to
//! a typed [`FieldValue`]; absent fields have no entry at all.

pub mod events;
pub mod progress;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::ser::SerializeMap as _;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Canonical textual representation of every date in a record.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Source date format with a two-digit year (`01/15/24`).
pub const SHORT_YEAR_DATE_FORMAT: &str = "%m/%d/%y";

/// Number of fractional digits kept for currency amounts.
pub const CURRENCY_SCALE: u32 = 2;

/// One column of the task order store.
///
/// The declaration order is the column order of the store, and the
/// `Display`/`EnumString` forms are the exact column headers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Name of the contractor the task order was issued to.
    #[strum(serialize = "Contractor")]
    Contractor,
    /// Unique task order identifier; the deduplication key.
    #[strum(serialize = "Task Order #")]
    TaskOrderNumber,
    /// Total authorized amount in dollars.
    #[strum(serialize = "Total Amount")]
    TotalAmount,
    /// Feeder identifier (`DDDD-DD`).
    #[strum(serialize = "Feeder ID")]
    FeederId,
    /// Length of the feeder in overhead miles.
    #[strum(serialize = "Feeder Total Miles")]
    FeederTotalMiles,
    /// Number of work order locations.
    #[strum(serialize = "# of Work Orders")]
    WorkOrderCount,
    /// First day of the task order.
    #[strum(serialize = "Task Order Start Date")]
    StartDate,
    /// Last day of the task order.
    #[strum(serialize = "Task Order End Date")]
    EndDate,
}

impl Field {
    /// Every field, in store column order.
    pub const ALL: &[Self] = &[
        Self::Contractor,
        Self::TaskOrderNumber,
        Self::TotalAmount,
        Self::FeederId,
        Self::FeederTotalMiles,
        Self::WorkOrderCount,
        Self::StartDate,
        Self::EndDate,
    ];

    /// The value type this field is coerced to.
    #[must_use]
    pub const fn kind(self) -> ValueKind {
        match self {
            Self::Contractor | Self::TaskOrderNumber | Self::FeederId => ValueKind::Text,
            Self::TotalAmount => ValueKind::Currency,
            Self::FeederTotalMiles => ValueKind::Decimal,
            Self::WorkOrderCount => ValueKind::Integer,
            Self::StartDate | Self::EndDate => ValueKind::Date,
        }
    }

    /// Column header used by the store.
    #[must_use]
    pub fn header(self) -> &'static str {
        match self {
            Self::Contractor => "Contractor",
            Self::TaskOrderNumber => "Task Order #",
            Self::TotalAmount => "Total Amount",
            Self::FeederId => "Feeder ID",
            Self::FeederTotalMiles => "Feeder Total Miles",
            Self::WorkOrderCount => "# of Work Orders",
            Self::StartDate => "Task Order Start Date",
            Self::EndDate => "Task Order End Date",
        }
    }

    /// Returns the store headers in column order.
    #[must_use]
    pub fn headers() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.header()).collect()
    }
}

/// Target type of a field's coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    /// Trimmed text, kept as matched.
    Text,
    /// Dollar amount with thousands separators, two fractional digits.
    Currency,
    /// Non-negative decimal number.
    Decimal,
    /// Non-negative integer count.
    Integer,
    /// Calendar date in `MM/DD/YY` or `MM/DD/YYYY` form.
    Date,
}

/// A date as it appears in a record.
///
/// Unparseable source dates are kept verbatim instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateValue {
    /// A valid calendar date, rendered as `MM/DD/YYYY`.
    Parsed(NaiveDate),
    /// Source text that matched the date pattern but is not a real date.
    Raw(String),
}

impl DateValue {
    /// Parses `raw`, falling back to [`DateValue::Raw`] when it is not a
    /// valid date in either supported format.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        parse_date(raw).map_or_else(|_| Self::Raw(raw.trim().to_owned()), Self::Parsed)
    }

    /// The parsed date, if any.
    #[must_use]
    pub const fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Parsed(date) => Some(*date),
            Self::Raw(_) => None,
        }
    }
}

impl std::fmt::Display for DateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parsed(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            Self::Raw(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for DateValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Free text.
    Text(String),
    /// Currency amount with exactly two fractional digits.
    Currency(Decimal),
    /// Decimal number.
    Decimal(f64),
    /// Integer count.
    Integer(u32),
    /// Calendar date (or the raw text it failed to parse from).
    Date(DateValue),
}

impl FieldValue {
    /// Returns the value as text, if it is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the date value, if this is a date.
    #[must_use]
    pub const fn as_date(&self) -> Option<&DateValue> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Currency(amount) => write!(f, "{amount}"),
            Self::Decimal(value) => write!(f, "{value}"),
            Self::Integer(count) => write!(f, "{count}"),
            Self::Date(date) => write!(f, "{date}"),
        }
    }
}

/// Error returned when matched text cannot be converted to its field's
/// value type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot parse {field} value '{raw}': {message}")]
pub struct CoercionError {
    /// Field being coerced.
    pub field: Field,
    /// Text that failed to coerce.
    pub raw: String,
    /// Why it failed.
    pub message: String,
}

/// Parses a `MM/DD/YY` or `MM/DD/YYYY` date.
///
/// The two-digit-year format is used when the trailing year token has
/// exactly two characters; anything else is parsed as a four-digit year.
/// Two-digit years follow chrono's pivot (`00`-`69` are 20xx, `70`-`99`
/// are 19xx).
///
/// # Errors
///
/// Returns the [`chrono::ParseError`] of the selected format.
pub fn parse_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    let raw = raw.trim();
    let year_len = raw.rsplit('/').next().map_or(0, str::len);
    let format = if year_len == 2 {
        SHORT_YEAR_DATE_FORMAT
    } else {
        DATE_FORMAT
    };
    NaiveDate::parse_from_str(raw, format)
}

/// Converts matched text to the value type of `field`.
///
/// Dates are strict here; callers that keep unparseable dates use
/// [`DateValue::parse_lenient`] on error.
///
/// # Errors
///
/// Returns [`CoercionError`] if `raw` is not a valid value for the field.
pub fn coerce(field: Field, raw: &str) -> Result<FieldValue, CoercionError> {
    let raw = raw.trim();
    let fail = |message: String| CoercionError {
        field,
        raw: raw.to_owned(),
        message,
    };

    match field.kind() {
        ValueKind::Text => Ok(FieldValue::Text(raw.to_owned())),
        ValueKind::Currency => {
            let cleaned: String = raw
                .chars()
                .filter(|c| !matches!(c, ',' | '$') && !c.is_whitespace())
                .collect();
            let mut amount = cleaned.parse::<Decimal>().map_err(|e| fail(e.to_string()))?;
            if amount.is_sign_negative() {
                return Err(fail("amount is negative".to_owned()));
            }
            amount.rescale(CURRENCY_SCALE);
            Ok(FieldValue::Currency(amount))
        }
        ValueKind::Decimal => {
            let value = raw.parse::<f64>().map_err(|e| fail(e.to_string()))?;
            if !value.is_finite() || value < 0.0 {
                return Err(fail("expected a non-negative number".to_owned()));
            }
            Ok(FieldValue::Decimal(value))
        }
        ValueKind::Integer => raw
            .parse::<u32>()
            .map(FieldValue::Integer)
            .map_err(|e| fail(e.to_string())),
        ValueKind::Date => parse_date(raw)
            .map(|date| FieldValue::Date(DateValue::Parsed(date)))
            .map_err(|e| fail(e.to_string())),
    }
}

/// A task order record: typed values keyed by schema field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOrder {
    values: BTreeMap<Field, FieldValue>,
}

impl TaskOrder {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `field` and returns the record, for building records inline.
    #[must_use]
    pub fn with(mut self, field: Field, value: FieldValue) -> Self {
        self.values.insert(field, value);
        self
    }

    /// Sets `field`, returning the previous value if there was one.
    pub fn insert(&mut self, field: Field, value: FieldValue) -> Option<FieldValue> {
        self.values.insert(field, value)
    }

    /// Removes `field` from the record.
    pub fn remove(&mut self, field: Field) -> Option<FieldValue> {
        self.values.remove(&field)
    }

    /// Returns the value of `field`, if present.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    /// Whether `field` has a value.
    #[must_use]
    pub fn contains(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    /// Number of fields present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Present fields and their values, in column order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.values.iter().map(|(field, value)| (*field, value))
    }

    /// The deduplication key. Empty strings count as absent.
    #[must_use]
    pub fn task_order_number(&self) -> Option<&str> {
        self.get(Field::TaskOrderNumber)
            .and_then(FieldValue::as_text)
            .filter(|key| !key.is_empty())
    }

    /// The start date, if present and parseable.
    #[must_use]
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.get(Field::StartDate)
            .and_then(FieldValue::as_date)
            .and_then(DateValue::date)
    }

    /// Renders one text cell per schema column; absent fields are empty.
    #[must_use]
    pub fn cells(&self) -> Vec<String> {
        Field::ALL
            .iter()
            .map(|field| self.get(*field).map(ToString::to_string).unwrap_or_default())
            .collect()
    }
}

impl Serialize for TaskOrder {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in &self.values {
            map.serialize_entry(field.header(), value)?;
        }
        map.end()
    }
}
