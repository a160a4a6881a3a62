// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Due-time parsing in the scheduler's reference time zone.

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use courier_core::CourierError;

/// Naive layouts accepted in addition to RFC 3339, read as wall-clock time
/// in the reference zone.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Current instant expressed with the reference zone's offset.
pub fn now_in(tz: Tz) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&tz).fixed_offset()
}

/// Parse a caller-supplied due time and express it in `tz`.
///
/// Inputs with an explicit offset keep their instant. Naive inputs are taken
/// as local time in `tz`; in a DST overlap the earlier instant wins and a time
/// inside a DST gap is rejected.
pub fn parse_due_at(input: &str, tz: Tz) -> Result<DateTime<FixedOffset>, CourierError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CourierError::Validation("due time must not be empty".into()));
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
        return Ok(instant.with_timezone(&tz).fixed_offset());
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .ok_or_else(|| {
            CourierError::Validation(format!(
                "unrecognized due time `{input}`, expected RFC 3339 or YYYY-MM-DDTHH:MM[:SS]"
            ))
        })?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(local) => Ok(local.fixed_offset()),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.fixed_offset()),
        LocalResult::None => Err(CourierError::Validation(format!(
            "due time `{input}` does not exist in {tz}"
        ))),
    }
}
