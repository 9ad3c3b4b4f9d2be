use actix_web::test::TestRequest;
use actix_web::{App, http::StatusCode, test, web};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::{Value, json};
use sqlx::Row;

use benefits_admin::api;

mod support;

fn checkout_body(plan_id: uuid::Uuid) -> Value {
    json!({
        "beneficiary": {
            "name": "Maria da Silva",
            "cpf": "086.007.569-95",
            "email": "maria@example.com",
            "phone": "(11) 98765-4321",
            "birth_date": "1990-05-20",
            "plan_id": plan_id
        },
        "payment_method": "pix"
    })
}

fn bill_paid(event_id: &str) -> Value {
    json!({
        "event": {
            "id": event_id,
            "type": "bill_paid",
            "created_at": "2025-03-10T12:00:00.000-03:00",
            "data": {
                "bill": {
                    "id": 555,
                    "status": "paid",
                    "amount": "49.90",
                    "customer": { "id": 43 },
                    "subscription": { "id": 999 }
                }
            }
        }
    })
}

#[actix_web::test]
async fn pix_checkout_then_bill_paid_reaches_registry_once() {
    let Some(test_db) = support::init_test_db().await else { return };
    let pool = &test_db.pool;
    let seed = support::seed(pool).await;
    let server = MockServer::start_async().await;

    let search = server
        .mock_async(|when, then| {
            when.method(GET).path("/customers");
            then.status(200).json_body(json!({ "customers": [] }));
        })
        .await;
    let create_customer = server
        .mock_async(|when, then| {
            when.method(POST).path("/customers");
            then.status(201).json_body(json!({ "customer": { "id": 43 } }));
        })
        .await;
    let subscription = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/subscriptions")
                .json_body_partial(r#"{ "plan_id": 101, "customer_id": 43, "payment_method_code": "pix" }"#);
            then.status(201).json_body(json!({
                "subscription": { "id": 999, "status": "active" },
                "bill": {
                    "id": 555,
                    "status": "pending",
                    "url": "https://pay.example/bills/555",
                    "charges": [{
                        "id": 31,
                        "status": "pending",
                        "last_transaction": {
                            "status": "waiting",
                            "gateway_response_fields": { "qrcode_original_path": "00020126PIXCODE" }
                        }
                    }]
                }
            }));
        })
        .await;
    let registry = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/beneficiarios")
                .header("x-api-key", support::REGISTRY_API_KEY)
                .json_body_partial(r#"{ "cpf": "08600756995", "plano": "Individual" }"#);
            then.status(201).json_body(json!({ "protocolo": "RMS-1" }));
        })
        .await;

    let state = web::Data::new(support::build_state(pool.clone(), &server.base_url()));
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let req = TestRequest::post()
        .uri("/api/checkout")
        .insert_header(("Authorization", support::bearer(&seed.operator)))
        .set_json(checkout_body(seed.plan_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["beneficiary"]["status"], "pending_payment");
    assert_eq!(body["data"]["beneficiary"]["cpf"], "08600756995");
    assert_eq!(body["data"]["subscription_id"], "999");
    assert_eq!(body["data"]["pix_code"], "00020126PIXCODE");
    assert_eq!(body["data"]["transaction"]["status"], "pending");
    let beneficiary_id = body["data"]["beneficiary"]["id"].as_str().unwrap().to_string();

    search.assert_hits_async(2).await;
    create_customer.assert_async().await;
    subscription.assert_async().await;
    registry.assert_hits_async(0).await;

    for expected in ["processed", "duplicate"] {
        let req = TestRequest::post()
            .uri("/webhooks/gateway")
            .insert_header(("X-Webhook-Token", support::WEBHOOK_SECRET))
            .set_json(bill_paid("evt-paid-1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["outcome"], expected);
    }

    registry.assert_hits_async(1).await;

    let row = sqlx::query(
        "SELECT status, payment_status, registry_protocol FROM beneficiaries WHERE id = $1::uuid",
    )
    .bind(&beneficiary_id)
    .fetch_one(pool)
    .await
    .unwrap();
    assert_eq!(row.get::<String, _>("payment_status"), "paid");
    assert_eq!(row.get::<String, _>("status"), "sent_to_registry");
    assert_eq!(row.get::<Option<String>, _>("registry_protocol").as_deref(), Some("RMS-1"));

    let tx_status: String =
        sqlx::query_scalar("SELECT status FROM transactions WHERE gateway_bill_id = '555'")
            .fetch_one(pool)
            .await
            .unwrap();
    assert_eq!(tx_status, "succeeded");

    let processed: bool =
        sqlx::query_scalar("SELECT processed FROM webhook_events WHERE event_id = 'evt-paid-1'")
            .fetch_one(pool)
            .await
            .unwrap();
    assert!(processed);

    let unit_notifications: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(seed.operator.id)
            .fetch_one(pool)
            .await
            .unwrap();
    assert_eq!(unit_notifications, 2);
}

#[actix_web::test]
async fn unknown_plan_makes_no_gateway_calls() {
    let Some(test_db) = support::init_test_db().await else { return };
    let pool = &test_db.pool;
    let seed = support::seed(pool).await;
    let server = MockServer::start_async().await;
    let any = server
        .mock_async(|when, then| {
            when.path_contains("/");
            then.status(200).json_body(json!({}));
        })
        .await;

    let state = web::Data::new(support::build_state(pool.clone(), &server.base_url()));
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let req = TestRequest::post()
        .uri("/api/checkout")
        .insert_header(("Authorization", support::bearer(&seed.operator)))
        .set_json(checkout_body(uuid::Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["message"], "plan not found");

    any.assert_hits_async(0).await;
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM beneficiaries")
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[actix_web::test]
async fn rejected_card_cancels_remote_subscription() {
    let Some(test_db) = support::init_test_db().await else { return };
    let pool = &test_db.pool;
    let seed = support::seed(pool).await;
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/customers");
            then.status(200)
                .json_body(json!({ "customers": [{ "id": 43, "status": "active" }] }));
        })
        .await;
    let tokenize = server
        .mock_async(|when, then| {
            when.method(POST).path("/public/payment_profiles");
            then.status(201)
                .json_body(json!({ "payment_profile": { "gateway_token": "tok_abc" } }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/subscriptions");
            then.status(201).json_body(json!({
                "subscription": { "id": 1000 },
                "bill": {
                    "id": 556,
                    "charges": [{
                        "id": 32,
                        "status": "rejected",
                        "last_transaction": { "status": "rejected", "gateway_message": "Cartão vencido" }
                    }]
                }
            }));
        })
        .await;
    let cancel = server
        .mock_async(|when, then| {
            when.method(httpmock::Method::DELETE).path("/subscriptions/1000");
            then.status(200).json_body(json!({ "subscription": { "id": 1000, "status": "canceled" } }));
        })
        .await;

    let state = web::Data::new(support::build_state(pool.clone(), &server.base_url()));
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let mut body = checkout_body(seed.plan_id);
    body["payment_method"] = json!("credit_card");
    body["card"] = json!({
        "holder_name": "MARIA DA SILVA",
        "number": "4111111111111111",
        "expiry_month": 12,
        "expiry_year": 2099,
        "cvv": "123"
    });
    let req = TestRequest::post()
        .uri("/api/checkout")
        .insert_header(("Authorization", support::bearer(&seed.operator)))
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["category"], "expired");
    assert_eq!(body["error"]["action"], "use_another_card");
    assert_eq!(body["error"]["retryable"], false);

    tokenize.assert_async().await;
    cancel.assert_async().await;
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM beneficiaries")
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[actix_web::test]
async fn card_paid_at_checkout_is_confirmed_without_waiting_for_the_webhook() {
    let Some(test_db) = support::init_test_db().await else { return };
    let pool = &test_db.pool;
    let seed = support::seed(pool).await;
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/customers");
            then.status(200)
                .json_body(json!({ "customers": [{ "id": 43, "status": "active" }] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/public/payment_profiles");
            then.status(201)
                .json_body(json!({ "payment_profile": { "gateway_token": "tok_paid" } }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/subscriptions");
            then.status(201).json_body(json!({
                "subscription": { "id": 1001, "status": "active" },
                "bill": {
                    "id": 600,
                    "status": "paid",
                    "charges": [{
                        "id": 40,
                        "status": "paid",
                        "last_transaction": { "status": "success" }
                    }]
                }
            }));
        })
        .await;
    let registry = server
        .mock_async(|when, then| {
            when.method(POST).path("/beneficiarios");
            then.status(201).json_body(json!({ "protocolo": "RMS-2" }));
        })
        .await;

    let state = web::Data::new(support::build_state(pool.clone(), &server.base_url()));
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let mut body = checkout_body(seed.plan_id);
    body["payment_method"] = json!("credit_card");
    body["card"] = json!({
        "holder_name": "MARIA DA SILVA",
        "number": "4111111111111111",
        "expiry_month": 12,
        "expiry_year": 2099,
        "cvv": "123"
    });
    let req = TestRequest::post()
        .uri("/api/checkout")
        .insert_header(("Authorization", support::bearer(&seed.operator)))
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["beneficiary"]["payment_status"], "paid");
    assert_eq!(body["data"]["beneficiary"]["status"], "sent_to_registry");
    assert_eq!(body["data"]["transaction"]["status"], "succeeded");
    registry.assert_hits_async(1).await;

    // the gateway still sends bill_paid afterwards
    let event = json!({
        "event": {
            "id": "evt-card-paid",
            "type": "bill_paid",
            "data": { "bill": { "id": 600, "status": "paid", "amount": "49.90", "subscription": { "id": 1001 } } }
        }
    });
    let req = TestRequest::post()
        .uri("/webhooks/gateway")
        .insert_header(("X-Webhook-Token", support::WEBHOOK_SECRET))
        .set_json(event)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["outcome"], "processed");
    registry.assert_hits_async(1).await;

    let transactions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE gateway_bill_id = '600'")
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(transactions, 1);
}

/// The auth middleware rejects with an `Err`, which the server renders through `AppError`.
macro_rules! status_of {
    ($app:expr, $req:expr) => {
        match test::try_call_service($app, $req).await {
            Ok(resp) => resp.status(),
            Err(e) => e.as_response_error().status_code(),
        }
    };
}

#[actix_web::test]
async fn protected_routes_require_a_token() {
    let Some(test_db) = support::init_test_db().await else { return };
    let seed = support::seed(&test_db.pool).await;
    let state = web::Data::new(support::build_state(test_db.pool.clone(), "http://127.0.0.1:9"));
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let req = TestRequest::get().uri("/api/beneficiaries").to_request();
    assert_eq!(status_of!(&app, req), StatusCode::UNAUTHORIZED);

    let req = TestRequest::get()
        .uri("/api/beneficiaries")
        .insert_header(("Authorization", "Bearer not-a-jwt"))
        .to_request();
    assert_eq!(status_of!(&app, req), StatusCode::UNAUTHORIZED);

    let req = TestRequest::get()
        .uri("/api/beneficiaries")
        .insert_header(("Authorization", support::bearer(&seed.operator)))
        .to_request();
    assert_eq!(status_of!(&app, req), StatusCode::OK);

    let req = TestRequest::post()
        .uri("/api/plans")
        .insert_header(("Authorization", support::bearer(&seed.operator)))
        .set_json(json!({ "name": "Familiar", "price": "89.90" }))
        .to_request();
    assert_eq!(status_of!(&app, req), StatusCode::FORBIDDEN);

    let req = TestRequest::get().uri("/health").to_request();
    assert_eq!(status_of!(&app, req), StatusCode::OK);
}
