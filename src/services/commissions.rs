// src/services/commissions.rs

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::db;
use crate::error::{AppError, AppResult};

/// `price × rate / 100`, rounded half away from zero to cents.
pub fn commission_amount(plan_price: Decimal, commission_rate: Decimal) -> Decimal {
    (plan_price * commission_rate / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn month_end(date: NaiveDate) -> NaiveDate {
    let start = month_start(date);
    start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(start)
}

/// Parses `YYYY-MM` or a full date into the first day of that month.
pub fn parse_reference_month(raw: &str) -> AppResult<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d"))
        .map(month_start)
        .map_err(|_| AppError::Validation(format!("invalid reference month: {raw}")))
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ComputeSummary {
    pub reference_month: NaiveDate,
    pub eligible: usize,
    pub created: usize,
    pub already_computed: usize,
    /// Eligible, but the unit's rate gives nothing to pay.
    pub zero_amount: usize,
}

/// Creates the commissions of one month. Running it again only fills gaps.
pub async fn compute_for_month(pool: &PgPool, month: NaiveDate) -> AppResult<ComputeSummary> {
    let reference_month = month_start(month);
    let basis = db::commissions::basis_for_month(pool, month_end(reference_month)).await?;

    let mut summary = ComputeSummary {
        reference_month,
        eligible: basis.len(),
        created: 0,
        already_computed: 0,
        zero_amount: 0,
    };
    for row in &basis {
        let amount = commission_amount(row.plan_price, row.commission_rate);
        if amount.is_zero() {
            summary.zero_amount += 1;
            continue;
        }
        if db::commissions::insert_once(pool, row.beneficiary_id, row.unit_id, reference_month, amount).await? {
            summary.created += 1;
        } else {
            summary.already_computed += 1;
        }
    }

    log::info!(
        "commissions computed month={} eligible={} created={}",
        summary.reference_month,
        summary.eligible,
        summary.created
    );
    Ok(summary)
}
