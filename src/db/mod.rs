// src/db/mod.rs
//
// Runtime queries (no compile-time checking) so builds do not need a live database.
// Functions that take `unit_scope: Option<Uuid>` return only rows of that unit
// when it is `Some`; headquarters callers pass `None`.

pub mod beneficiaries;
pub mod cancellations;
pub mod commissions;
pub mod franchises;
pub mod notifications;
pub mod plans;
pub mod transactions;
pub mod units;
pub mod users;
pub mod webhook_events;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(pool).await
}

/// Escapes `%`/`_` and wraps the term for ILIKE.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
