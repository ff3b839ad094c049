use std::fmt::Display;

use chrono::{DateTime, TimeZone};

/// Format a distance in meters: whole meters below 1 km, one decimal above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

/// "just now", "N minutes ago", "N hours ago", "N days ago", then a date
/// once a week has passed.
pub fn format_relative_time<Tz: TimeZone>(timestamp: &DateTime<Tz>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let elapsed = now.clone().signed_duration_since(timestamp.clone());
    let secs = elapsed.num_seconds();

    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        plural(secs / 60, "minute")
    } else if secs < 86_400 {
        plural(secs / 3600, "hour")
    } else if secs < 7 * 86_400 {
        plural(secs / 86_400, "day")
    } else {
        format_date(timestamp)
    }
}

/// Format a date as "Jan 15, 2024"
pub fn format_date<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    dt.format("%b %-d, %Y").to_string()
}

/// Format a timestamp as "Jan 15, 2024 at 3:45 PM"
pub fn format_date_time<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    dt.format("%b %-d, %Y at %-I:%M %p").to_string()
}

/// Truncate text to a maximum number of characters, adding ellipsis if needed
pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.0), "0m");
        assert_eq!(format_distance(850.4), "850m");
        assert_eq!(format_distance(999.4), "999m");
        assert_eq!(format_distance(1000.0), "1.0km");
        assert_eq!(format_distance(1234.0), "1.2km");
        assert_eq!(format_distance(12_960.0), "13.0km");
    }

    #[test]
    fn test_format_relative_time() {
        let now = at("2024-01-15T15:45:00Z");
        assert_eq!(format_relative_time(&now, &now), "just now");
        assert_eq!(format_relative_time(&(now - Duration::seconds(59)), &now), "just now");
        assert_eq!(format_relative_time(&(now - Duration::minutes(1)), &now), "1 minute ago");
        assert_eq!(format_relative_time(&(now - Duration::minutes(45)), &now), "45 minutes ago");
        assert_eq!(format_relative_time(&(now - Duration::hours(1)), &now), "1 hour ago");
        assert_eq!(format_relative_time(&(now - Duration::hours(23)), &now), "23 hours ago");
        assert_eq!(format_relative_time(&(now - Duration::days(6)), &now), "6 days ago");
        assert_eq!(format_relative_time(&(now - Duration::days(7)), &now), "Jan 8, 2024");
    }

    #[test]
    fn test_future_timestamp_is_just_now() {
        let now = at("2024-01-15T15:45:00Z");
        assert_eq!(format_relative_time(&(now + Duration::minutes(5)), &now), "just now");
    }

    #[test]
    fn test_format_date() {
        let dt = at("2024-01-05T15:45:00Z");
        assert_eq!(format_date(&dt), "Jan 5, 2024");
        assert_eq!(format_date_time(&dt), "Jan 5, 2024 at 3:45 PM");
        assert_eq!(format_date_time(&at("2024-01-15T00:05:00Z")), "Jan 15, 2024 at 12:05 AM");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("Hello", 10), "Hello");
        assert_eq!(truncate_text("Hello World", 8), "Hello...");
        assert_eq!(truncate_text("Hi", 2), "Hi");
        assert_eq!(truncate_text("Éboulement sur la route", 8), "Éboul...");
    }
}
