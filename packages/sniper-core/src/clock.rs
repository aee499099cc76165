//! Wall-clock in a fixed display zone, and elapsed-duration formatting.
//!
//! All human-facing timestamps are rendered in `Asia/Shanghai`, matching the
//! monitored catalog's home region. Elapsed durations use the largest
//! nonzero unit and cascade down to seconds.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Display time zone for all human-facing timestamps and history records.
pub const DISPLAY_TZ: Tz = chrono_tz::Asia::Shanghai;

/// Returns the current instant rendered in [`DISPLAY_TZ`].
#[must_use]
pub fn now_shanghai() -> DateTime<Tz> {
    Utc::now().with_timezone(&DISPLAY_TZ)
}

/// Formats an elapsed duration as `Xd Yh Zm Ws`, `Xh Ym Zs`, `Xm Ys`, or `Xs`,
/// keeping only the largest nonzero unit and everything below it. Negative
/// deltas clamp to zero.
#[must_use]
pub fn format_elapsed(delta: chrono::Duration) -> String {
    let total_secs = delta.num_seconds().max(0);

    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
