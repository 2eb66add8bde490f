//! Display formatting for prices, areas and timestamps.

use chrono::{DateTime, Utc};

/// Formats `amount` with thousands separators and the currency's symbol.
///
/// Currencies without minor units (JPY, VND) are rounded to whole numbers;
/// unknown codes are appended verbatim.
pub fn format_currency(amount: f64, currency: Option<&str>) -> String {
    let code = currency.map(|c| c.trim().to_ascii_uppercase());
    match code.as_deref() {
        Some("USD") | Some("$") => format!("${}", group_decimal(amount, 2)),
        Some("EUR") | Some("€") => format!("€{}", group_decimal(amount, 2)),
        Some("GBP") | Some("£") => format!("£{}", group_decimal(amount, 2)),
        Some("JPY") | Some("CNY") | Some("¥") => format!("¥{}", group_decimal(amount, 0)),
        Some("VND") | Some("₫") => format!("{} ₫", group_decimal(amount, 0)),
        Some("") | None => group_decimal(amount, 2),
        Some(other) => format!("{} {}", group_decimal(amount, 2), other),
    }
}

/// Formats an area with a normalized unit; square metres when unspecified.
pub fn format_area(value: f64, unit: Option<&str>) -> String {
    let unit = unit.map(|u| u.trim().to_ascii_lowercase());
    let symbol = match unit.as_deref() {
        None | Some("") | Some("m2") | Some("m²") | Some("sqm") | Some("sq m")
        | Some("square meters") | Some("square metres") => "m²",
        Some("ft2") | Some("ft²") | Some("sqft") | Some("sq ft") | Some("square feet") => "ft²",
        Some("ha") | Some("hectare") | Some("hectares") => "ha",
        Some("acre") | Some("acres") => "acre",
        Some(other) => return format!("{} {}", group_decimal(value, 1), other),
    };
    format!("{} {}", group_decimal(value, 1), symbol)
}

/// Human readable age of `then` relative to `now`.
pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let seconds = elapsed.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = elapsed.num_minutes();
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return plural(hours, "hour");
    }
    let days = elapsed.num_days();
    if days < 7 {
        return plural(days, "day");
    }
    then.format("%Y-%m-%d").to_string()
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

/// Thousands-grouped number with at most `decimals` fraction digits;
/// a zero fraction is dropped.
fn group_decimal(value: f64, decimals: usize) -> String {
    let negative = value < 0.0;
    let rendered = format!("{:.*}", decimals, value.abs());
    let (whole, fraction) = match rendered.split_once('.') {
        Some((whole, fraction)) => (whole.to_string(), Some(fraction.to_string())),
        None => (rendered, None),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(fraction) = fraction.filter(|f| f.chars().any(|c| c != '0')) {
        out.push('.');
        out.push_str(&fraction);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn currency_symbols_and_grouping() {
        assert_eq!(format_currency(1_200_000.0, Some("usd")), "$1,200,000");
        assert_eq!(format_currency(1234.5, Some("EUR")), "€1,234.50");
        assert_eq!(format_currency(2_500_000_000.4, Some("VND")), "2,500,000,000 ₫");
        assert_eq!(format_currency(999.0, Some("THB")), "999 THB");
        assert_eq!(format_currency(12.0, None), "12");
    }

    #[test]
    fn area_units_are_normalized() {
        assert_eq!(format_area(85.0, Some("sqm")), "85 m²");
        assert_eq!(format_area(1250.4, Some("sq ft")), "1,250.4 ft²");
        assert_eq!(format_area(2.0, Some("Hectares")), "2 ha");
        assert_eq!(format_area(40.0, None), "40 m²");
        assert_eq!(format_area(3.0, Some("rai")), "3 rai");
    }

    #[test]
    fn relative_time_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        assert_eq!(format_relative_time(now - Duration::seconds(5), now), "just now");
        assert_eq!(format_relative_time(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(format_relative_time(now - Duration::minutes(42), now), "42 minutes ago");
        assert_eq!(format_relative_time(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(format_relative_time(now - Duration::days(2), now), "2 days ago");
        assert_eq!(format_relative_time(now - Duration::days(30), now), "2024-05-11");
        assert_eq!(format_relative_time(now + Duration::hours(1), now), "just now");
    }
}
