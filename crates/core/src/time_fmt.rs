// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared human-readable duration formatting.

use chrono::{DateTime, Utc};

/// Format seconds as a short human-readable duration: `"5s"`, `"2m"`, `"1h30m"`, `"3d"`.
///
/// For the hours range, minutes are included when non-zero (e.g. `"1h"` vs `"1h5m"`).
pub fn format_elapsed(secs: u64) -> String {
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m{}", secs / 60, seconds_suffix(secs % 60, secs < 600)),
        3600..=86399 => {
            let (h, m) = (secs / 3600, (secs % 3600) / 60);
            if m > 0 {
                format!("{}h{}m", h, m)
            } else {
                format!("{}h", h)
            }
        }
        _ => format!("{}d", secs / 86400),
    }
}

/// Short runs are shown with seconds (`"2m5s"`), longer ones are rounded.
fn seconds_suffix(secs: u64, show: bool) -> String {
    if show && secs > 0 {
        format!("{}s", secs)
    } else {
        String::new()
    }
}

/// Duration of a run: from start to finish, or to `now` while still running.
pub fn format_duration(
    started: DateTime<Utc>,
    finished: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> String {
    let end = finished.unwrap_or(now);
    let secs = (end - started).num_seconds().max(0) as u64;
    format_elapsed(secs)
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
