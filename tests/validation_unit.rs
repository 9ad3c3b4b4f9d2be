use chrono::NaiveDate;

use benefits_admin::validation::{
    card_brand, format_cep, format_cpf, is_valid_card_expiry, is_valid_card_number, is_valid_cep,
    is_valid_cnpj, is_valid_cpf, is_valid_cvv, is_valid_email, is_valid_phone, is_valid_tax_id,
    only_digits,
};

#[test]
fn cpf_known_valid_with_and_without_punctuation() {
    assert!(is_valid_cpf("08600756995"));
    assert!(is_valid_cpf("086.007.569-95"));
}

#[test]
fn cpf_repeated_digits_are_invalid() {
    for d in 0..=9 {
        let cpf = d.to_string().repeat(11);
        assert!(!is_valid_cpf(&cpf), "{cpf} should be invalid");
    }
}

#[test]
fn cpf_wrong_length_or_check_digit_is_invalid() {
    assert!(!is_valid_cpf("0860075699"));
    assert!(!is_valid_cpf("086007569951"));
    assert!(!is_valid_cpf("08600756994"));
    assert!(!is_valid_cpf(""));
}

#[test]
fn cnpj_validation() {
    assert!(is_valid_cnpj("11.222.333/0001-81"));
    assert!(!is_valid_cnpj("11222333000182"));
    assert!(!is_valid_cnpj("00000000000000"));
}

#[test]
fn tax_id_dispatches_on_length() {
    assert!(is_valid_tax_id("08600756995"));
    assert!(is_valid_tax_id("11222333000181"));
    assert!(!is_valid_tax_id("123"));
}

#[test]
fn luhn_accepts_valid_and_rejects_off_by_one() {
    assert!(is_valid_card_number("4111 1111 1111 1111"));
    assert!(is_valid_card_number("5555555555554444"));
    assert!(!is_valid_card_number("4111111111111112"));
    assert!(!is_valid_card_number("411111"));
}

#[test]
fn card_brands() {
    assert_eq!(card_brand("4111111111111111"), "visa");
    assert_eq!(card_brand("5555555555554444"), "mastercard");
    assert_eq!(card_brand("378282246310005"), "american_express");
    assert_eq!(card_brand("6362970000457013"), "elo");
    assert_eq!(card_brand("6062825624254001"), "hipercard");
}

#[test]
fn card_expiry_is_inclusive_of_current_month() {
    let today = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
    assert!(is_valid_card_expiry(3, 2025, today));
    assert!(is_valid_card_expiry(1, 26, today));
    assert!(!is_valid_card_expiry(2, 2025, today));
    assert!(!is_valid_card_expiry(13, 2030, today));
}

#[test]
fn cvv_email_phone_cep() {
    assert!(is_valid_cvv("123"));
    assert!(is_valid_cvv("1234"));
    assert!(!is_valid_cvv("12a"));

    assert!(is_valid_email("maria.silva@example.com.br"));
    assert!(!is_valid_email("maria@"));
    assert!(!is_valid_email("no-at-sign.com"));

    assert!(is_valid_phone("(11) 98765-4321"));
    assert!(is_valid_phone("+55 11 3333-4444"));
    assert!(!is_valid_phone("(11) 88765-43210"));
    assert!(!is_valid_phone("12345"));

    assert!(is_valid_cep("01310-100"));
    assert!(!is_valid_cep("00000-000"));
}

#[test]
fn formatting_helpers() {
    assert_eq!(only_digits("086.007.569-95"), "08600756995");
    assert_eq!(format_cpf("08600756995"), "086.007.569-95");
    assert_eq!(format_cep("01310100"), "01310-100");
    assert_eq!(format_cpf("123"), "123");
}
