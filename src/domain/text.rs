use std::fmt::Display;

use chrono::{DateTime, TimeZone};
use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

const MINUTE_MILLIS: i64 = 60 * 1000;
const HOUR_MILLIS: i64 = 60 * MINUTE_MILLIS;

lazy_static! {
    static ref URL_PATTERN: Regex = Regex::new(r"https?://\S+").expect("valid URL pattern");
}

/// Format `timestamp` (seconds) relative to `now`
///
/// Less than a minute is "now", less than an hour is "<N> min ago", the same calendar day
/// (in `now`'s time zone) is a clock time and anything older is a month/day date.
pub fn format_relative_time<Tz>(timestamp: u64, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let secs = i64::try_from(timestamp).unwrap_or(i64::MAX);
    let elapsed = now
        .timestamp_millis()
        .saturating_sub(secs.saturating_mul(1000));

    if elapsed < MINUTE_MILLIS {
        return String::from("now");
    }
    if elapsed < HOUR_MILLIS {
        return format!("{} min ago", elapsed / MINUTE_MILLIS);
    }

    match now.timezone().timestamp_opt(secs, 0).single() {
        Some(then) if then.date_naive() == now.date_naive() => then.format("%H:%M").to_string(),
        Some(then) => then.format("%m/%d").to_string(),
        None => String::from("--/--"),
    }
}

/// A span of message text, either verbatim or a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Link { url: String, label: String },
}

impl Segment {
    /// The exact source text of this span
    pub fn raw(&self) -> &str {
        match self {
            Segment::Text(text) => text,
            Segment::Link { url, .. } => url,
        }
    }

    /// The text to show for this span
    pub fn display(&self) -> &str {
        match self {
            Segment::Text(text) => text,
            Segment::Link { label, .. } => label,
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Segment::Link { .. })
    }
}

/// Split `text` into plain and URL segments, in order
pub fn linkify(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for found in URL_PATTERN.find_iter(text) {
        if found.start() > last {
            segments.push(Segment::Text(text[last..found.start()].to_string()));
        }
        let url = found.as_str();
        segments.push(Segment::Link {
            url: url.to_string(),
            label: link_label(url),
        });
        last = found.end();
    }

    if last < text.len() {
        segments.push(Segment::Text(text[last..].to_string()));
    }

    segments
}

fn link_label(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(String::from))
        .unwrap_or_else(|| url.to_string())
}

pub fn shorten_npub(npub: impl Into<String>) -> String {
    let npub_string: String = npub.into();
    match npub_string.strip_prefix("npub1") {
        Some(stripped) if stripped.len() > 10 => {
            let len = stripped.len();
            let heading = &stripped[0..5];
            let trail = &stripped[(len - 5)..len];
            format!("{heading}:{trail}")
        }
        _ => npub_string,
    }
}

pub fn shorten_hex(hex: &str) -> String {
    if hex.len() > 12 && hex.is_ascii() {
        format!("{}...{}", &hex[..8], &hex[hex.len() - 4..])
    } else {
        hex.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};
    use pretty_assertions::assert_eq;
    use rstest::*;

    use super::*;

    const T: u64 = 1_704_091_367; // 2024-01-01T06:42:47Z

    fn at_millis(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).expect("valid timestamp")
    }

    fn t_millis() -> i64 {
        T as i64 * 1000
    }

    #[rstest]
    #[case(0, "now")]
    #[case(59_999, "now")]
    #[case(60_000, "1 min ago")]
    #[case(119_999, "1 min ago")]
    #[case(3_599_999, "59 min ago")]
    fn test_format_relative_time_thresholds(#[case] elapsed: i64, #[case] expected: &str) {
        let now = at_millis(t_millis() + elapsed);
        assert_eq!(format_relative_time(T, &now), expected);
    }

    #[test]
    fn test_format_relative_time_same_day_clock() {
        let now = at_millis(t_millis() + 3_600_000);
        assert_eq!(format_relative_time(T, &now), "06:42");
    }

    #[test]
    fn test_format_relative_time_other_day_date() {
        let now = at_millis(t_millis() + 24 * 3_600_000);
        assert_eq!(format_relative_time(T, &now), "01/01");
    }

    #[test]
    fn test_format_relative_time_uses_now_time_zone() -> Result<(), String> {
        // 06:42Z is 15:42 in +09:00, and an hour later is still the same local day
        let tokyo = FixedOffset::east_opt(9 * 3600).ok_or("invalid offset")?;
        let now = at_millis(t_millis() + 3_600_000).with_timezone(&tokyo);
        assert_eq!(format_relative_time(T, &now), "15:42");

        // 15:42 on 12/31 in +09:00; ten hours later is past local midnight
        let evening = T - 24 * 3600;
        let now = at_millis(evening as i64 * 1000 + 10 * 3_600_000).with_timezone(&tokyo);
        assert_eq!(format_relative_time(evening, &now), "12/31");
        Ok(())
    }

    #[test]
    fn test_format_relative_time_future_is_now() {
        let now = at_millis(t_millis() - 10_000);
        assert_eq!(format_relative_time(T, &now), "now");
    }

    #[test]
    fn test_linkify_round_trip() {
        let text = "see https://example.com/x now";
        let segments = linkify(text);

        assert_eq!(
            segments,
            vec![
                Segment::Text(String::from("see ")),
                Segment::Link {
                    url: String::from("https://example.com/x"),
                    label: String::from("example.com"),
                },
                Segment::Text(String::from(" now")),
            ]
        );
        let rebuilt: String = segments.iter().map(Segment::raw).collect();
        assert_eq!(rebuilt, text);
    }

    #[rstest]
    #[case("")]
    #[case("no links here")]
    #[case("http://a.example https://b.example/path?q=1")]
    #[case("新曲リリースしました！ https://example.com")]
    #[case("https://example.com\nnext line\thttp://x.test")]
    fn test_linkify_reconstructs_input(#[case] text: &str) {
        let rebuilt: String = linkify(text).iter().map(Segment::raw).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_linkify_unparseable_url_keeps_raw_label() {
        let segments = linkify("go to http://[broken now");
        assert_eq!(
            segments[1],
            Segment::Link {
                url: String::from("http://[broken"),
                label: String::from("http://[broken"),
            }
        );
        assert_eq!(segments[1].display(), "http://[broken");
    }

    #[test]
    fn test_linkify_adjacent_links() {
        let segments = linkify("https://a.example/ https://b.example/");
        let labels: Vec<&str> = segments.iter().map(Segment::display).collect();
        assert_eq!(labels, vec!["a.example", " ", "b.example"]);
        assert!(segments[0].is_link());
        assert!(!segments[1].is_link());
    }

    #[test]
    fn test_shorten_npub() {
        assert_eq!(
            shorten_npub("npub1f5uuywemqwlejj2d7he6zjw8jz9wr0r5z6q8lhttxj333ph24cjsymjmug"),
            "f5uuy:mjmug"
        );

        assert_eq!(
            shorten_npub("4d39c23b3b03bf99494df5f3a149c7908ae1bc7416807fdd6b34a31886eaae25"),
            "4d39c23b3b03bf99494df5f3a149c7908ae1bc7416807fdd6b34a31886eaae25"
        );
    }

    #[test]
    fn test_shorten_hex() {
        assert_eq!(
            shorten_hex("4d39c23b3b03bf99494df5f3a149c7908ae1bc7416807fdd6b34a31886eaae25"),
            "4d39c23b...ae25"
        );
        assert_eq!(shorten_hex("self"), "self");
    }
}
