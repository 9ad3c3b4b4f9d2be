use chrono::NaiveDate;
use rust_decimal::Decimal;

use benefits_admin::services::commissions::{
    commission_amount, month_end, month_start, parse_reference_month,
};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn amount_is_rounded_to_cents() {
    assert_eq!(commission_amount(dec("49.90"), dec("10")), dec("4.99"));
    assert_eq!(commission_amount(dec("49.90"), dec("7.5")), dec("3.74"));
    assert_eq!(commission_amount(dec("124.90"), dec("10")), dec("12.49"));
    assert_eq!(commission_amount(dec("10.15"), dec("5")), dec("0.51"));
    assert!(commission_amount(dec("49.90"), Decimal::ZERO).is_zero());
}

#[test]
fn month_bounds() {
    assert_eq!(month_start(date(2025, 3, 18)), date(2025, 3, 1));
    assert_eq!(month_end(date(2025, 3, 18)), date(2025, 3, 31));
    assert_eq!(month_end(date(2024, 2, 1)), date(2024, 2, 29));
    assert_eq!(month_end(date(2025, 12, 5)), date(2025, 12, 31));
}

#[test]
fn reference_month_parsing() {
    assert_eq!(parse_reference_month("2025-03").unwrap(), date(2025, 3, 1));
    assert_eq!(parse_reference_month(" 2025-03-20 ").unwrap(), date(2025, 3, 1));
    assert!(parse_reference_month("03/2025").is_err());
    assert!(parse_reference_month("2025-13").is_err());
}
