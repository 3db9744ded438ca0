//! UTC timestamp formatting shared by the cursor file and feed requests

use crate::domain::{GeosyncError, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// Formats a timestamp as ISO-8601 UTC with a `Z` suffix
///
/// Sub-second digits are only written when present.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use geosync::domain::timestamp::format_utc;
///
/// let t = Utc.with_ymd_and_hms(2024, 6, 20, 2, 0, 0).unwrap();
/// assert_eq!(format_utc(&t), "2024-06-20T02:00:00Z");
/// ```
pub fn format_utc(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parses an ISO-8601 timestamp
///
/// Offsets are converted to UTC. A naive timestamp (no offset) is taken to be
/// UTC, which is how older cursor files were written.
pub fn parse_utc(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| GeosyncError::Serialization(format!("Invalid timestamp '{text}': {e}")))
}
