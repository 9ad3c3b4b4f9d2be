// src/services/checkout.rs
//
// Enrollment with payment: validate, create the remote customer and
// subscription, then persist locally. When local persistence fails the remote
// subscription is cancelled again; the remote customer is kept and reused.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::db::beneficiaries::{EnrollmentState, NewBeneficiary};
use crate::error::{AppError, AppResult};
use crate::gateway::client::{CustomerAddress, GatewayBill, NewCustomer, NewSubscription};
use crate::gateway::CardData;
use crate::models::{Beneficiary, BeneficiaryStatus, PaymentMethod, Plan, Transaction, TransactionStatus};
use crate::services::{contracts, notifications, webhooks};
use crate::validation;
use crate::{AppState, db};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub beneficiary: NewBeneficiary,
    pub payment_method: PaymentMethod,
    /// Required for `credit_card`, ignored otherwise.
    pub card: Option<CardData>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutOutcome {
    pub beneficiary: Beneficiary,
    pub transaction: Option<Transaction>,
    pub subscription_id: String,
    pub bill_id: Option<String>,
    pub bill_status: Option<String>,
    pub checkout_url: Option<String>,
    pub pix_code: Option<String>,
    pub pix_qr_code_url: Option<String>,
    pub warnings: Vec<String>,
}

/// Personal data checks shared by checkout and plain enrollment.
pub fn validate_beneficiary(b: &NewBeneficiary, today: NaiveDate) -> AppResult<()> {
    if b.name.trim().len() < 3 {
        return Err(AppError::Validation("Nome inválido".to_string()));
    }
    validation::validate_cpf(&b.cpf).map_err(AppError::Validation)?;
    validation::validate_email(&b.email).map_err(AppError::Validation)?;
    if let Some(phone) = b.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        validation::validate_phone(phone).map_err(AppError::Validation)?;
    }
    if let Some(zip) = b.zip_code.as_deref().filter(|z| !z.trim().is_empty()) {
        validation::validate_cep(zip).map_err(AppError::Validation)?;
    }
    if let Some(birth) = b.birth_date {
        if birth > today {
            return Err(AppError::Validation("Data de nascimento inválida".to_string()));
        }
    }
    Ok(())
}

/// All input checks; runs before any I/O.
pub fn validate_request(req: &CheckoutRequest, today: NaiveDate) -> AppResult<()> {
    validate_beneficiary(&req.beneficiary, today)?;

    if req.payment_method == PaymentMethod::CreditCard {
        let card = req
            .card
            .as_ref()
            .ok_or_else(|| AppError::Validation("Dados do cartão são obrigatórios".to_string()))?;
        if card.holder_name.trim().is_empty() {
            return Err(AppError::Validation("Nome do titular do cartão é obrigatório".to_string()));
        }
        validation::validate_card(&card.number, card.expiry_month, card.expiry_year, &card.cvv, today)
            .map_err(AppError::Validation)?;
    }
    Ok(())
}

pub fn find_plan(plans: &[Plan], plan_id: Uuid) -> AppResult<&Plan> {
    plans
        .iter()
        .find(|p| p.id == plan_id && p.active)
        .ok_or_else(|| AppError::NotFound("plan not found".to_string()))
}

/// Unit operators always enroll into their own unit; headquarters must name one.
pub fn resolve_unit(user: &AuthUser, requested: Option<Uuid>) -> AppResult<Uuid> {
    match user.scope() {
        Some(own) => Ok(own),
        None => requested.ok_or_else(|| AppError::Validation("unit_id is required".to_string())),
    }
}

fn customer_address(b: &NewBeneficiary) -> Option<CustomerAddress> {
    Some(CustomerAddress {
        street: b.street.clone()?,
        number: b.number.clone()?,
        additional_details: b.complement.clone(),
        zipcode: validation::only_digits(b.zip_code.as_deref()?),
        neighborhood: b.neighborhood.clone()?,
        city: b.city.clone()?,
        state: b.state.clone()?,
        country: "BR".to_string(),
    })
}

async fn cancel_remote(state: &AppState, subscription_id: &str) -> Option<String> {
    match state.gateway.cancel_subscription(subscription_id).await {
        Ok(()) => {
            log::info!("compensation: gateway subscription {subscription_id} cancelled");
            None
        }
        Err(e) => {
            log::error!("compensation failed: could not cancel subscription {subscription_id}: {e}");
            Some(format!("subscription {subscription_id} could not be cancelled: {e}"))
        }
    }
}

/// Writes the beneficiary and its first transaction in one DB transaction.
/// The returned flag is `true` when the bill was already paid and the
/// beneficiary moved to paid here.
async fn persist(
    state: &AppState,
    new: &NewBeneficiary,
    unit_id: Uuid,
    enrollment: &EnrollmentState,
    amount: Decimal,
    method: PaymentMethod,
    bill: Option<&GatewayBill>,
) -> AppResult<(Beneficiary, Option<Transaction>, bool)> {
    let mut tx = state.pool.begin().await?;
    let mut beneficiary = db::beneficiaries::insert(&mut *tx, new, unit_id, enrollment).await?;
    let paid = bill.is_some_and(GatewayBill::is_paid);
    let transaction = match bill {
        Some(bill) => {
            let snapshot = serde_json::to_value(bill).unwrap_or_else(|_| json!({ "id": bill.id }));
            let status = if paid {
                TransactionStatus::Succeeded
            } else {
                TransactionStatus::Pending
            };
            Some(db::transactions::insert(&mut *tx, beneficiary.id, &bill.id, amount, status, method, snapshot).await?)
        }
        None => None,
    };
    let confirmed = paid && db::beneficiaries::mark_paid(&mut *tx, beneficiary.id).await?;
    if confirmed {
        if let Some(current) = db::beneficiaries::get(&mut *tx, beneficiary.id, None).await? {
            beneficiary = current;
        }
    }
    tx.commit().await?;
    Ok((beneficiary, transaction, confirmed))
}

pub async fn checkout(state: &AppState, user: &AuthUser, req: CheckoutRequest) -> AppResult<CheckoutOutcome> {
    validate_request(&req, Utc::now().date_naive())?;

    let unit_id = resolve_unit(user, req.beneficiary.unit_id)?;
    let unit = db::units::get(&state.pool, unit_id)
        .await?
        .filter(|u| u.active)
        .ok_or_else(|| AppError::NotFound("unit not found".to_string()))?;

    let plans = db::plans::list_for_unit(&state.pool, unit.id).await?;
    let plan = find_plan(&plans, req.beneficiary.plan_id)?;
    let gateway_plan_id = plan
        .gateway_plan_id
        .clone()
        .ok_or_else(|| AppError::Configuration(format!("plan {} has no gateway plan id", plan.name)))?;

    let cpf = validation::only_digits(&req.beneficiary.cpf);
    if db::beneficiaries::get_by_cpf(&state.pool, &cpf).await?.is_some() {
        return Err(AppError::Conflict("CPF já cadastrado".to_string()));
    }

    let b = &req.beneficiary;
    let customer = state
        .gateway
        .find_or_create_customer(&NewCustomer {
            name: b.name.trim().to_string(),
            email: b.email.trim().to_lowercase(),
            registry_code: cpf.clone(),
            code: Some(cpf.clone()),
            phone: b.phone.clone().filter(|p| !p.trim().is_empty()),
            address: customer_address(b),
        })
        .await?;

    let gateway_token = match (&req.payment_method, &req.card) {
        (PaymentMethod::CreditCard, Some(card)) => Some(state.gateway.tokenize_card(card).await?),
        _ => None,
    };

    let created = state
        .gateway
        .create_subscription(&NewSubscription {
            plan_id: gateway_plan_id,
            customer_id: customer.id.clone(),
            payment_method_code: req.payment_method.as_str().to_string(),
            gateway_token,
            code: None,
        })
        .await?;
    let subscription_id = created.subscription.id.clone();
    log::info!(
        "gateway subscription created id={} customer_id={} method={}",
        subscription_id,
        customer.id,
        req.payment_method
    );

    let bill = created.bill.as_ref();
    if let Some(rejection) = bill.and_then(GatewayBill::rejection) {
        cancel_remote(state, &subscription_id).await;
        return Err(rejection.into());
    }

    let enrollment = EnrollmentState {
        status: BeneficiaryStatus::PendingPayment,
        payment_method: Some(req.payment_method),
        gateway_customer_id: Some(customer.id.clone()),
        gateway_subscription_id: Some(subscription_id.clone()),
        gateway_bill_id: bill.map(|b| b.id.clone()),
        checkout_url: bill.and_then(GatewayBill::checkout_url),
    };

    let persisted = persist(
        state,
        &req.beneficiary,
        unit.id,
        &enrollment,
        plan.price,
        req.payment_method,
        bill,
    )
    .await;
    let (beneficiary, transaction, confirmed) = match persisted {
        Ok(rows) => rows,
        Err(e) => {
            log::error!("checkout persistence failed, compensating subscription {subscription_id}: {e}");
            cancel_remote(state, &subscription_id).await;
            return Err(e);
        }
    };

    log::info!(
        "beneficiary enrolled id={} unit_id={} plan={}",
        beneficiary.id,
        unit.id,
        plan.name
    );
    notifications::notify_unit_quietly(
        &state.pool,
        unit.id,
        "Nova adesão",
        &format!(
            "{} {} ({})",
            beneficiary.name,
            if confirmed { "com pagamento aprovado" } else { "aguardando pagamento" },
            plan.name
        ),
        Some(&notifications::beneficiary_link(beneficiary.id)),
    )
    .await;

    // Card charges can settle inside the subscription call, before any webhook.
    let beneficiary = if confirmed {
        webhooks::after_payment_confirmed(state, &beneficiary).await;
        db::beneficiaries::get(&state.pool, beneficiary.id, None)
            .await?
            .unwrap_or(beneficiary)
    } else {
        beneficiary
    };

    let mut warnings = Vec::new();
    if state.esign.is_configured() {
        contracts::spawn_generation(state.clone(), beneficiary.id);
    } else {
        warnings.push("e-signature provider not configured; contract not generated".to_string());
    }

    Ok(CheckoutOutcome {
        subscription_id,
        bill_id: bill.map(|b| b.id.clone()),
        bill_status: bill.and_then(|b| b.status.clone()),
        checkout_url: bill.and_then(GatewayBill::checkout_url),
        pix_code: bill.and_then(GatewayBill::pix_code),
        pix_qr_code_url: bill.and_then(GatewayBill::pix_qr_code_url),
        beneficiary,
        transaction,
        warnings,
    })
}
