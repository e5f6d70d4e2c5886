use crate::error::AppError;
use chrono::NaiveDate;
use std::cmp::Ordering;

pub const TICKER_DELIMITER: char = '-';
/// Date value reserved for the per-site chart bucket.
pub const SENTINEL_DATE: &str = "site";

const DATE_FORMATS: [&str; 3] = ["%y%b%d", "%Y-%m-%d", "%Y%m%d"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerKey {
    pub site: String,
    pub date: String,
    pub strike: Option<String>,
}

pub fn parse_ticker(raw: &str) -> Result<TickerKey, AppError> {
    let mut segments = raw.trim().split(TICKER_DELIMITER);
    let site = segments.next().unwrap_or_default();
    let date = segments.next().unwrap_or_default();
    let strike = segments.next();
    if site.is_empty() || date.is_empty() || segments.next().is_some() {
        return Err(AppError::malformed(format!(
            "ticker '{raw}' must look like SITE-DATE[-STRIKE]"
        )));
    }

    let strike = strike
        .filter(|segment| !segment.is_empty())
        .map(str::to_string);

    Ok(TickerKey {
        site: site.to_string(),
        date: date.to_string(),
        strike,
    })
}

/// Reads the numeric strike out of display text such as `T85` or `B72.5`.
pub fn extract_strike(display_text: &str) -> Result<f64, AppError> {
    let text = display_text.trim();
    let digits = match text.strip_prefix(['T', 'B']) {
        Some(rest) => {
            let end = rest
                .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
                .unwrap_or(rest.len());
            &rest[..end]
        }
        None => "",
    };

    if !digits.starts_with(|ch: char| ch.is_ascii_digit() || ch == '.') {
        return Err(AppError::malformed(format!(
            "'{display_text}' does not start with a T/B strike marker"
        )));
    }

    let strike = digits
        .parse::<f64>()
        .map_err(|error| AppError::malformed(format!("strike in '{display_text}': {error}")))?;
    if !strike.is_finite() {
        return Err(AppError::malformed(format!(
            "strike in '{display_text}' must be finite"
        )));
    }
    Ok(strike)
}

/// Sort key of a date cell. Ordering follows display order: the sentinel
/// first, then newest to oldest, then unparseable dates.
#[derive(Debug, Clone)]
pub enum DateKey {
    Sentinel,
    Dated { raw: String, day: Option<NaiveDate> },
}

impl DateKey {
    pub fn parse(raw: &str) -> Self {
        if raw == SENTINEL_DATE {
            return Self::Sentinel;
        }
        let day = DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(raw, format).ok());
        Self::Dated {
            raw: raw.to_string(),
            day,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Sentinel => SENTINEL_DATE,
            Self::Dated { raw, .. } => raw,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Sentinel)
    }
}

impl Ord for DateKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Sentinel, Self::Sentinel) => Ordering::Equal,
            (Self::Sentinel, _) => Ordering::Less,
            (_, Self::Sentinel) => Ordering::Greater,
            (
                Self::Dated {
                    raw: left_raw,
                    day: left_day,
                },
                Self::Dated {
                    raw: right_raw,
                    day: right_day,
                },
            ) => match (left_day, right_day) {
                (Some(left), Some(right)) => right.cmp(left).then_with(|| left_raw.cmp(right_raw)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => right_raw.cmp(left_raw),
            },
        }
    }
}

impl PartialOrd for DateKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DateKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DateKey {}

/// `Less` when `left` is displayed before `right`.
pub fn compare_dates_descending(left: &str, right: &str) -> Ordering {
    DateKey::parse(left).cmp(&DateKey::parse(right))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_ticker_into_site_date_and_strike() {
        let key = parse_ticker("KXHIGHNY-25JUL04-T85").expect("ticker should parse");
        assert_eq!(key.site, "KXHIGHNY");
        assert_eq!(key.date, "25JUL04");
        assert_eq!(key.strike.as_deref(), Some("T85"));
    }

    #[test]
    fn missing_strike_segment_yields_none() {
        let key = parse_ticker("ABC-20240101").expect("ticker should parse");
        assert_eq!(key.strike, None);

        let trailing = parse_ticker("ABC-20240101-").expect("ticker should parse");
        assert_eq!(trailing.strike, None);
    }

    #[test]
    fn rejects_ticker_without_date() {
        assert!(parse_ticker("ABC").is_err());
        assert!(parse_ticker("-20240101-T5").is_err());
    }

    #[test]
    fn rejects_ticker_with_extra_segments() {
        assert!(matches!(
            parse_ticker("NY-25JUL04-T85-X"),
            Err(AppError::MalformedEvent(_))
        ));
        assert!(parse_ticker("NY-25JUL04--").is_err());
    }

    #[test]
    fn extracts_strike_after_marker() {
        assert_eq!(extract_strike("T85").expect("valid strike"), 85.0);
        assert_eq!(extract_strike("B72.5").expect("valid strike"), 72.5);
        assert_eq!(extract_strike("T90-X").expect("valid strike"), 90.0);
    }

    #[test]
    fn strike_extraction_requires_marker_and_number() {
        assert!(extract_strike("85").is_err());
        assert!(extract_strike("X85").is_err());
        assert!(extract_strike("T").is_err());
        assert!(extract_strike("Tabc").is_err());
        assert!(extract_strike("T1.2.3").is_err());
    }

    #[test]
    fn dates_sort_newest_first_with_sentinel_leading() {
        let mut dates = vec!["25JUL03", SENTINEL_DATE, "25JUL05", "25JUL04"];
        dates.sort_by(|left, right| compare_dates_descending(left, right));
        assert_eq!(dates, vec![SENTINEL_DATE, "25JUL05", "25JUL04", "25JUL03"]);
    }

    #[test]
    fn dates_sort_chronologically_across_month_and_year_boundaries() {
        assert_eq!(
            compare_dates_descending("25AUG01", "25JUL31"),
            Ordering::Less
        );
        assert_eq!(
            compare_dates_descending("25NOV30", "25DEC31"),
            Ordering::Greater
        );

        let mut dates = vec!["25JUL31", "25DEC31", "26JAN01", "25AUG01", "25NOV30"];
        dates.sort_by(|left, right| compare_dates_descending(left, right));
        assert_eq!(
            dates,
            vec!["26JAN01", "25DEC31", "25NOV30", "25AUG01", "25JUL31"]
        );
    }

    #[test]
    fn accepts_iso_and_compact_dates() {
        assert_eq!(
            compare_dates_descending("2024-02-01", "20240101"),
            Ordering::Less
        );
        assert_eq!(
            compare_dates_descending("20240101", "2024-02-01"),
            Ordering::Greater
        );
    }

    #[test]
    fn unparseable_dates_follow_real_dates() {
        assert_eq!(
            compare_dates_descending("someday", "25JUL04"),
            Ordering::Greater
        );
        assert_eq!(
            compare_dates_descending(SENTINEL_DATE, "someday"),
            Ordering::Less
        );
    }
}
