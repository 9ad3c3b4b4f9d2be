// src/validation.rs
//
// Pure validators for the identity and payment fields collected on enrollment.
// Inputs may carry formatting punctuation ("086.007.569-95"); it is stripped first.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("static email regex")
});

pub fn only_digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn digits_of(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_equal(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

/// Modulus-11 check digit over `digits` with the given weights.
fn mod11_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let rest = sum % 11;
    if rest < 2 { 0 } else { 11 - rest }
}

pub fn is_valid_cpf(value: &str) -> bool {
    let digits = digits_of(value);
    if digits.len() != 11 || all_equal(&digits) {
        return false;
    }

    let first = mod11_digit(&digits[..9], &[10, 9, 8, 7, 6, 5, 4, 3, 2]);
    if first != digits[9] {
        return false;
    }
    let second = mod11_digit(&digits[..10], &[11, 10, 9, 8, 7, 6, 5, 4, 3, 2]);
    second == digits[10]
}

pub fn is_valid_cnpj(value: &str) -> bool {
    let digits = digits_of(value);
    if digits.len() != 14 || all_equal(&digits) {
        return false;
    }

    let first = mod11_digit(&digits[..12], &[5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);
    if first != digits[12] {
        return false;
    }
    let second = mod11_digit(&digits[..13], &[6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);
    second == digits[13]
}

/// CPF for 11 digits, CNPJ for 14, anything else is invalid.
pub fn is_valid_tax_id(value: &str) -> bool {
    match only_digits(value).len() {
        11 => is_valid_cpf(value),
        14 => is_valid_cnpj(value),
        _ => false,
    }
}

/// Luhn checksum over 13..=19 digits.
pub fn is_valid_card_number(value: &str) -> bool {
    let digits = digits_of(value);
    if !(13..=19).contains(&digits.len()) {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// Gateway `payment_company_code` for a card number.
pub fn card_brand(value: &str) -> &'static str {
    let n = only_digits(value);
    let prefix = |len: usize| n.get(..len).and_then(|p| p.parse::<u32>().ok()).unwrap_or(0);

    const ELO_PREFIXES: [&str; 12] = [
        "401178", "401179", "431274", "438935", "451416", "457393", "457631", "457632", "504175",
        "627780", "636297", "636368",
    ];
    if ELO_PREFIXES.iter().any(|p| n.starts_with(p)) || n.starts_with("5067") || n.starts_with("509") {
        return "elo";
    }
    if n.starts_with("606282") || n.starts_with("3841") {
        return "hipercard";
    }
    if n.starts_with("34") || n.starts_with("37") {
        return "american_express";
    }
    if n.starts_with('4') {
        return "visa";
    }
    if (51..=55).contains(&prefix(2)) || (2221..=2720).contains(&prefix(4)) {
        return "mastercard";
    }
    if n.starts_with("36") || n.starts_with("38") || (300..=305).contains(&prefix(3)) {
        return "diners_club";
    }
    "unknown"
}

/// Accepts two- or four-digit years; the card stays valid through its expiry month.
pub fn is_valid_card_expiry(month: u32, year: u32, today: NaiveDate) -> bool {
    if !(1..=12).contains(&month) {
        return false;
    }
    let year = if year < 100 { 2000 + year } else { year };
    let current = (today.year() as u32, today.month());
    (year, month) >= current
}

pub fn is_valid_cvv(value: &str) -> bool {
    (3..=4).contains(&value.len()) && value.chars().all(|c| c.is_ascii_digit())
}

pub fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    value.len() <= 254 && EMAIL_RE.is_match(value)
}

/// Brazilian phone: area code + 8 digits (landline) or + 9 digits starting with 9 (mobile).
pub fn is_valid_phone(value: &str) -> bool {
    let digits = only_digits(value);
    let digits = digits.strip_prefix("55").filter(|d| d.len() >= 10).unwrap_or(digits.as_str());

    match digits.len() {
        10 => !digits.starts_with('0'),
        11 => !digits.starts_with('0') && digits.as_bytes()[2] == b'9',
        _ => false,
    }
}

pub fn is_valid_cep(value: &str) -> bool {
    let digits = only_digits(value);
    digits.len() == 8 && digits != "00000000"
}

pub fn format_cpf(value: &str) -> String {
    let d = only_digits(value);
    if d.len() != 11 {
        return value.to_string();
    }
    format!("{}.{}.{}-{}", &d[..3], &d[3..6], &d[6..9], &d[9..])
}

pub fn format_cep(value: &str) -> String {
    let d = only_digits(value);
    if d.len() != 8 {
        return value.to_string();
    }
    format!("{}-{}", &d[..5], &d[5..])
}

pub fn validate_cpf(value: &str) -> Result<(), String> {
    if is_valid_cpf(value) { Ok(()) } else { Err("CPF inválido".to_string()) }
}

pub fn validate_cnpj(value: &str) -> Result<(), String> {
    if is_valid_cnpj(value) { Ok(()) } else { Err("CNPJ inválido".to_string()) }
}

pub fn validate_email(value: &str) -> Result<(), String> {
    if is_valid_email(value) { Ok(()) } else { Err("E-mail inválido".to_string()) }
}

pub fn validate_phone(value: &str) -> Result<(), String> {
    if is_valid_phone(value) { Ok(()) } else { Err("Telefone inválido".to_string()) }
}

pub fn validate_cep(value: &str) -> Result<(), String> {
    if is_valid_cep(value) { Ok(()) } else { Err("CEP inválido".to_string()) }
}

pub fn validate_card(
    number: &str,
    month: u32,
    year: u32,
    cvv: &str,
    today: NaiveDate,
) -> Result<(), String> {
    if !is_valid_card_number(number) {
        return Err("Número do cartão inválido".to_string());
    }
    if !is_valid_card_expiry(month, year, today) {
        return Err("Cartão vencido ou validade inválida".to_string());
    }
    if !is_valid_cvv(cvv) {
        return Err("CVV inválido".to_string());
    }
    Ok(())
}
