//! Parser for the `lstc_qrun -r` license report.
//!
//! Example input:
//!
//! ```text
//! PROGRAM          EXPIRATION CPUS  USED   FREE    MAX | QUEUE
//! ---------------- ----------      ----- ------ ------ | -----
//! LS-DYNA          07/31/2020          0   2000   2000 |     0
//! MPPDYNA          07/31/2020          0   2000   2000 |     0
//!                    LICENSE GROUP     0   2000   2000 |     0
//! ```
//!
//! Only rows shaped like the two feature lines above are kept. Everything
//! else in the fixed-width report is skipped without complaint.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use regex::Regex;
use tracing::debug;

use super::FeatureRecord;

/// Feature row: name, MM/DD/YYYY, used, free, total, `|`, queue, anything.
static FEATURE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([A-Za-z0-9_-]+)\s+([0-9]{2}/[0-9]{2}/[0-9]{4})\s+([0-9]+)\s+([0-9]+)\s+([0-9]+)\s+\|\s+([0-9]+)",
    )
    .expect("feature line regex is valid")
});

const EXPIRATION_FORMAT: &str = "%m/%d/%Y";

/// Parses the license report into one record per feature row.
///
/// `expiration_seconds` is the signed distance from `reference` to midnight
/// UTC of the expiration date.
pub fn parse_features(raw: &str, reference: DateTime<Utc>) -> Vec<FeatureRecord> {
    raw.lines()
        .filter_map(|line| parse_line(line, reference))
        .collect()
}

fn parse_line(line: &str, reference: DateTime<Utc>) -> Option<FeatureRecord> {
    let caps = FEATURE_LINE.captures(line)?;

    let Ok(date) = NaiveDate::parse_from_str(&caps[2], EXPIRATION_FORMAT) else {
        debug!(line, date = &caps[2], "skipping feature with invalid expiration date");
        return None;
    };
    let expiration = date.and_hms_opt(0, 0, 0)?.and_utc();

    Some(FeatureRecord {
        name: caps[1].to_string(),
        expiration_seconds: seconds(expiration - reference),
        used: caps[3].parse().ok()?,
        free: caps[4].parse().ok()?,
        total: caps[5].parse().ok()?,
        queue: caps[6].parse().ok()?,
    })
}

fn seconds(delta: TimeDelta) -> f64 {
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1e9
}
