//! Common utility functions used across modules.
//!
//! - [`format_count`] - Format counts with K/M suffix (1.5K, 2.3M)
//! - [`format_age`] - Format a duration as a compact age (42s, 5m, 3h, 2d)

use std::time::Duration;

/// Format a count with K/M suffix for compact display.
///
/// # Examples
/// ```
/// use asnlist::utils::format_count;
/// assert_eq!(format_count(500), "500");
/// assert_eq!(format_count(1500), "1.5K");
/// assert_eq!(format_count(1_500_000), "1.5M");
/// ```
pub fn format_count(count: usize) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Format a duration as a compact age using its largest whole unit.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use asnlist::utils::format_age;
/// assert_eq!(format_age(Duration::from_secs(42)), "42s");
/// assert_eq!(format_age(Duration::from_secs(90000)), "1d");
/// ```
pub fn format_age(age: Duration) -> String {
    let seconds = age.as_secs();
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m", seconds / 60)
    } else if seconds < 86400 {
        format!("{}h", seconds / 3600)
    } else {
        format!("{}d", seconds / 86400)
    }
}
