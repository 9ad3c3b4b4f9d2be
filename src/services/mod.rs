// src/services/mod.rs
//
// Orchestration on top of `db` and the provider clients. Handlers, the worker
// and the admin CLI all go through these functions.

pub mod cancellation;
pub mod checkout;
pub mod commissions;
pub mod contracts;
pub mod notifications;
pub mod registry_sync;
pub mod webhooks;
