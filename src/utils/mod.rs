use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

pub const AMOUNT_SCALE: u32 = 2;
pub const QUANTITY_SCALE: u32 = 3;
pub const UNIT_PRICE_SCALE: u32 = 4;
pub const RATE_SCALE: u32 = 2;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Rounds half away from zero to `scale` and pads trailing zeros, e.g.
/// `10` at scale 4 becomes `"10.0000"`.
pub fn format_decimal(value: Decimal, scale: u32) -> String {
    let mut rounded = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(scale);
    rounded.to_string()
}

pub fn parse_decimal(value: &str) -> Result<Decimal, rust_decimal::Error> {
    value.trim().parse::<Decimal>()
}

/// JSON text for a document column. `null` is kept as the text `null`, not SQL NULL.
pub fn encode_document(value: &Value) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

pub fn encode_opt_document(value: Option<&Value>) -> serde_json::Result<Option<String>> {
    value.map(encode_document).transpose()
}

/// Layouts seen on scanned invoices, tried in order. Day-first wins over
/// month-first for slash dates.
const DATE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%Y%m%d",
    "%d %B %Y",
    "%B %d, %Y",
    "%d %b %Y",
];

/// Normalises an extracted date. A trailing time (`2024-03-09T10:00:00Z`,
/// `2024-03-09 10:00`) is dropped; unparseable input yields `None`.
pub fn normalize_date(value: Option<&str>) -> Option<NaiveDate> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.date_naive());
    }

    let date_part = match raw.split_once(|c: char| c == 'T' || c == ' ') {
        Some((head, _)) if is_numeric_date(head) => head,
        _ => raw,
    };

    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(date_part, layout).ok())
}

fn is_numeric_date(value: &str) -> bool {
    value.len() >= 8 && value.bytes().all(|b| b.is_ascii_digit() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn pads_to_scale() {
        assert_eq!(format_decimal(dec("10"), UNIT_PRICE_SCALE), "10.0000");
        assert_eq!(format_decimal(dec("2"), QUANTITY_SCALE), "2.000");
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(format_decimal(dec("0.125"), AMOUNT_SCALE), "0.13");
        assert_eq!(format_decimal(dec("-0.125"), AMOUNT_SCALE), "-0.13");
        assert_eq!(format_decimal(dec("1.23456"), UNIT_PRICE_SCALE), "1.2346");
    }

    #[test]
    fn parses_stored_text() {
        assert_eq!(parse_decimal("10.0000").unwrap(), dec("10"));
        assert!(parse_decimal("ten").is_err());
    }

    #[test]
    fn normalizes_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9);
        assert_eq!(normalize_date(Some("2024-03-09")), expected);
        assert_eq!(normalize_date(Some("09.03.2024")), expected);
        assert_eq!(normalize_date(Some("09/03/2024")), expected);
        assert_eq!(normalize_date(Some("2024/03/09")), expected);
        assert_eq!(normalize_date(Some("09-03-2024")), expected);
        assert_eq!(normalize_date(Some("20240309")), expected);
        assert_eq!(normalize_date(Some("9 March 2024")), expected);
        assert_eq!(normalize_date(Some("March 9, 2024")), expected);
        assert_eq!(normalize_date(Some("  ")), None);
        assert_eq!(normalize_date(Some("March ninth")), None);
        assert_eq!(normalize_date(None), None);
    }

    #[test]
    fn drops_time_of_day() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9);
        assert_eq!(normalize_date(Some("2024-03-09T23:30:00+01:00")), expected);
        assert_eq!(normalize_date(Some("2024-03-09 10:15")), expected);
        assert_eq!(normalize_date(Some("2024-03-09T10:15:00")), expected);
    }

    #[test]
    fn null_document_stays_json() {
        assert_eq!(encode_document(&Value::Null).unwrap(), "null");
        assert_eq!(encode_opt_document(None).unwrap(), None);
        assert_eq!(
            encode_opt_document(Some(&Value::Null)).unwrap().as_deref(),
            Some("null")
        );
    }
}
