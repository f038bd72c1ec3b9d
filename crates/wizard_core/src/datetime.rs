use chrono::{DateTime, Utc};

/// The HTML `datetime-local` shape the form widgets edit.
pub const INPUT_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Stored timestamp -> the editable representation used to populate the
/// draft when hydrating an existing record.
pub fn input_date_time(timestamp: DateTime<Utc>) -> String {
    timestamp.format(INPUT_DATE_TIME_FORMAT).to_string()
}
