use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use benefits_admin::api::auth::AuthUser;
use benefits_admin::db::beneficiaries::NewBeneficiary;
use benefits_admin::error::AppError;
use benefits_admin::gateway::CardData;
use benefits_admin::models::{PaymentMethod, Plan, Role};
use benefits_admin::services::checkout::{CheckoutRequest, find_plan, resolve_unit, validate_request};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

fn plan(name: &str, active: bool) -> Plan {
    Plan {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        price: Decimal::new(4990, 2),
        gateway_plan_id: Some("101".to_string()),
        gateway_product_id: None,
        franchise_id: None,
        active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn beneficiary() -> NewBeneficiary {
    NewBeneficiary {
        name: "Maria da Silva".to_string(),
        cpf: "086.007.569-95".to_string(),
        email: "maria@example.com".to_string(),
        phone: Some("(11) 98765-4321".to_string()),
        birth_date: NaiveDate::from_ymd_opt(1990, 5, 20),
        plan_id: Uuid::new_v4(),
        unit_id: None,
        zip_code: Some("01310-100".to_string()),
        street: None,
        number: None,
        complement: None,
        neighborhood: None,
        city: None,
        state: None,
    }
}

fn card(number: &str) -> CardData {
    CardData {
        holder_name: "MARIA DA SILVA".to_string(),
        number: number.to_string(),
        expiry_month: 12,
        expiry_year: 2030,
        cvv: "123".to_string(),
    }
}

#[test]
fn find_plan_by_id() {
    let plans = vec![plan("Individual", true), plan("Familiar", true)];
    let found = find_plan(&plans, plans[1].id).unwrap();
    assert_eq!(found.name, "Familiar");
}

#[test]
fn unknown_or_inactive_plan_is_not_found() {
    let plans = vec![plan("Individual", true), plan("Antigo", false)];

    match find_plan(&plans, Uuid::new_v4()) {
        Err(AppError::NotFound(msg)) => assert_eq!(msg, "plan not found"),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(matches!(find_plan(&plans, plans[1].id), Err(AppError::NotFound(_))));
}

#[test]
fn pix_checkout_needs_no_card() {
    let req = CheckoutRequest {
        beneficiary: beneficiary(),
        payment_method: PaymentMethod::Pix,
        card: None,
    };
    assert!(validate_request(&req, today()).is_ok());
}

#[test]
fn credit_card_checkout_validates_card() {
    let mut req = CheckoutRequest {
        beneficiary: beneficiary(),
        payment_method: PaymentMethod::CreditCard,
        card: None,
    };
    assert!(matches!(validate_request(&req, today()), Err(AppError::Validation(_))));

    req.card = Some(card("4111111111111112"));
    assert!(matches!(validate_request(&req, today()), Err(AppError::Validation(_))));

    req.card = Some(card("4111111111111111"));
    assert!(validate_request(&req, today()).is_ok());
}

#[test]
fn invalid_personal_data_is_rejected() {
    let mut b = beneficiary();
    b.cpf = "111.111.111-11".to_string();
    let req = CheckoutRequest {
        beneficiary: b,
        payment_method: PaymentMethod::Pix,
        card: None,
    };
    assert!(matches!(validate_request(&req, today()), Err(AppError::Validation(_))));

    let mut b = beneficiary();
    b.birth_date = NaiveDate::from_ymd_opt(2030, 1, 1);
    let req = CheckoutRequest {
        beneficiary: b,
        payment_method: PaymentMethod::Pix,
        card: None,
    };
    assert!(matches!(validate_request(&req, today()), Err(AppError::Validation(_))));
}

#[test]
fn unit_operators_enroll_into_their_own_unit() {
    let own = Uuid::new_v4();
    let operator = AuthUser {
        id: Uuid::new_v4(),
        role: Role::Unit,
        unit_id: Some(own),
    };
    assert_eq!(resolve_unit(&operator, Some(Uuid::new_v4())).unwrap(), own);

    let headquarters = AuthUser {
        id: Uuid::new_v4(),
        role: Role::Headquarters,
        unit_id: None,
    };
    let chosen = Uuid::new_v4();
    assert_eq!(resolve_unit(&headquarters, Some(chosen)).unwrap(), chosen);
    assert!(matches!(resolve_unit(&headquarters, None), Err(AppError::Validation(_))));
    assert_eq!(headquarters.scope(), None);
    assert_eq!(operator.scope(), Some(own));
}
