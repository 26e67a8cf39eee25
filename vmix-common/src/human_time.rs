//! Human-readable duration formatting for log output

/// Durations below this use `M:SS`, at or above it `H:MM:SS`
const LONG_FORMAT_MIN: u64 = 3600;

/// Format whole seconds as `M:SS` (under an hour) or `H:MM:SS`.
///
/// # Examples
///
/// ```
/// use vmix_common::human_time::format_duration;
///
/// assert_eq!(format_duration(0), "0:00");
/// assert_eq!(format_duration(60), "1:00");
/// assert_eq!(format_duration(605), "10:05");
/// assert_eq!(format_duration(3661), "1:01:01");
/// ```
pub fn format_duration(seconds: u64) -> String {
    if seconds < LONG_FORMAT_MIN {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    } else {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        let secs = seconds % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    }
}
