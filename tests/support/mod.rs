#![allow(dead_code)]

use rust_decimal::Decimal;
use sqlx::PgPool;
use std::env;
use std::net::IpAddr;
use std::sync::OnceLock;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use benefits_admin::AppState;
use benefits_admin::api::auth::issue_token;
use benefits_admin::config::{Config, EsignConfig, GatewayConfig, GatewayEnvironment, RegistryConfig};
use benefits_admin::models::{Role, User};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const GATEWAY_API_KEY: &str = "test-gateway-key";
pub const REGISTRY_API_KEY: &str = "test-registry-key";

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Fresh, migrated database per test. `None` (test skipped) when
/// `TEST_DATABASE_URL` is not set.
pub async fn init_test_db() -> Option<TestDb> {
    dotenvy::dotenv().ok();
    let Ok(test_url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return None;
    };
    let (admin_url, db_name) =
        split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url)
        .await
        .expect("connect admin db");

    let _ = sqlx::query("SELECT pg_advisory_lock(424242)")
        .execute(&admin_pool)
        .await;

    let quoted_name = quote_identifier(&db_name);
    let drop_sql = format!("DROP DATABASE IF EXISTS {quoted_name} WITH (FORCE)");
    let create_sql = format!("CREATE DATABASE {quoted_name}");

    let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
    if let Err(e) = sqlx::query(&create_sql).execute(&admin_pool).await {
        eprintln!("create test db error: {e}");
        let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
        sqlx::query(&create_sql)
            .execute(&admin_pool)
            .await
            .expect("create test db retry");
    }

    let _ = sqlx::query("SELECT pg_advisory_unlock(424242)")
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;

    let pool = PgPool::connect(&test_url)
        .await
        .expect("connect test db");
    benefits_admin::db::migrate(&pool).await.expect("migrations");
    Some(TestDb { pool, _guard: guard })
}

/// Config pointing every provider at `mock_url` (an httpmock server), e-sign disabled.
pub fn test_config(mock_url: &str) -> Config {
    Config {
        host: IpAddr::from([127, 0, 0, 1]),
        port: 0,
        database_url: String::new(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_ttl_days: 1,
        http_timeout_secs: 5,
        cors_allowed_origins: Vec::new(),
        reconcile_interval_secs: 0,
        reconcile_batch_size: 50,
        gateway: GatewayConfig {
            environment: GatewayEnvironment::Sandbox,
            base_url: mock_url.to_string(),
            api_key: Some(GATEWAY_API_KEY.to_string()),
            public_key: Some("test-public-key".to_string()),
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        },
        esign: EsignConfig {
            base_url: None,
            api_key: None,
            template_id: None,
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        },
        registry: RegistryConfig {
            base_url: Some(mock_url.to_string()),
            api_key: Some(REGISTRY_API_KEY.to_string()),
            max_attempts: 5,
        },
    }
}

pub fn build_state(pool: PgPool, mock_url: &str) -> AppState {
    AppState::new(pool, test_config(mock_url)).expect("build state")
}

pub struct Seed {
    pub franchise_id: Uuid,
    pub unit_id: Uuid,
    pub plan_id: Uuid,
    pub headquarters: User,
    pub operator: User,
}

async fn insert_user(pool: &PgPool, email: &str, role: Role, unit_id: Option<Uuid>) -> User {
    benefits_admin::db::users::insert(pool, email, "not-a-real-hash", "Test User", role, unit_id)
        .await
        .expect("insert user")
}

/// One franchise, one unit (10% commission), the "Individual" plan at 49.90
/// mapped to gateway plan 101, and a headquarters and a unit login.
pub async fn seed(pool: &PgPool) -> Seed {
    let franchise_id: Uuid = sqlx::query_scalar(
        r#"INSERT INTO franchises (name, cnpj) VALUES ('Franquia Teste', '11222333000181')
           RETURNING id"#,
    )
    .fetch_one(pool)
    .await
    .expect("insert franchise");

    let unit_id: Uuid = sqlx::query_scalar(
        r#"INSERT INTO units (franchise_id, name, commission_rate) VALUES ($1, 'Unidade Centro', 10)
           RETURNING id"#,
    )
    .bind(franchise_id)
    .fetch_one(pool)
    .await
    .expect("insert unit");

    let plan_id: Uuid = sqlx::query_scalar(
        r#"INSERT INTO plans (name, price, gateway_plan_id) VALUES ('Individual', $1, '101')
           RETURNING id"#,
    )
    .bind(Decimal::new(4990, 2))
    .fetch_one(pool)
    .await
    .expect("insert plan");

    let headquarters = insert_user(pool, "matriz@example.com", Role::Headquarters, None).await;
    let operator = insert_user(pool, "unidade@example.com", Role::Unit, Some(unit_id)).await;

    Seed {
        franchise_id,
        unit_id,
        plan_id,
        headquarters,
        operator,
    }
}

pub fn bearer(user: &User) -> String {
    let token = issue_token(JWT_SECRET, 1, user).expect("issue token");
    format!("Bearer {token}")
}
