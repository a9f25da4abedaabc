use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .with_context(|| format!("invalid date {raw:?}, expected YYYY-MM-DD"))
}

/// Inclusive calendar days from `start` through `end`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if end < start {
        bail!("end date {end} is before start date {start}");
    }
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(raw: &str) -> NaiveDate {
        parse_date(raw).expect("valid date")
    }

    #[test]
    fn range_is_inclusive_and_crosses_months() {
        let days = date_range(d("2025-01-30"), d("2025-02-02")).expect("range");
        let labels: Vec<String> = days.into_iter().map(format_date).collect();
        assert_eq!(
            labels,
            vec!["2025-01-30", "2025-01-31", "2025-02-01", "2025-02-02"]
        );
    }

    #[test]
    fn single_day_range() {
        assert_eq!(date_range(d("2024-02-29"), d("2024-02-29")).expect("range").len(), 1);
    }

    #[test]
    fn reversed_range_is_an_error() {
        let err = date_range(d("2025-03-02"), d("2025-03-01")).expect_err("reversed");
        assert!(err.to_string().contains("before start date"));
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(parse_date("2025-13-01").is_err());
        assert!(parse_date("01/02/2025").is_err());
        assert_eq!(format_date(d(" 2025-08-01 ")), "2025-08-01");
    }
}
