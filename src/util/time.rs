use chrono::{DateTime, FixedOffset, Utc};

/// RFC 1123 with a numeric zone, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`
pub const RFC1123Z: &str = "%a, %d %b %Y %H:%M:%S %z";

/// RFC 822 with a numeric zone, e.g. `02 Jan 06 15:04 -0700`
pub const RFC822Z: &str = "%d %b %y %H:%M %z";

/// [`RFC1123Z`] past the `Mon, ` prefix.
const RFC1123Z_DATE: &str = "%d %b %Y %H:%M:%S %z";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Parse an RSS `pubDate` into a UTC instant.
///
/// Tries [`RFC1123Z`] then [`RFC822Z`]. Anything else, including named zones
/// such as `GMT` and the empty string, yields `None`.
///
/// The weekday must be a valid day name but need not agree with the date.
/// Plenty of feeds get it wrong and the date itself is still good.
pub fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    parse_rfc1123z(raw)
        .or_else(|| DateTime::parse_from_str(raw, RFC822Z).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_rfc1123z(raw: &str) -> Option<DateTime<FixedOffset>> {
    let (weekday, rest) = raw.split_once(", ")?;
    if !WEEKDAYS.contains(&weekday) {
        return None;
    }
    DateTime::parse_from_str(rest, RFC1123Z_DATE).ok()
}
