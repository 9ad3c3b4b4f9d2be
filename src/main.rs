// src/main.rs
use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, middleware::Logger, web};
use anyhow::Context;
use dotenvy::dotenv;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use benefits_admin::config::Config;
use benefits_admin::{AppState, api, db, docs, worker};

fn cors(origins: &[String]) -> Cors {
    let base = if origins.is_empty() {
        Cors::default().allow_any_origin()
    } else {
        origins.iter().fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    base.allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let addr = config.server_addr();

    let pool = db::connect(&config.database_url)
        .await
        .context("Failed to connect to DB")?;
    db::migrate(&pool).await.context("Failed to run migrations")?;

    if !config.is_production() {
        log::warn!("payment gateway in sandbox mode");
    }

    let state = AppState::new(pool, config).context("Failed to build HTTP client")?;
    let _worker = worker::spawn(state.clone());

    let origins = state.config.cors_allowed_origins.clone();
    let data = web::Data::new(state);

    log::info!("listening on {addr}");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(cors(&origins))
            .app_data(data.clone())
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            .configure(api::configure)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}
