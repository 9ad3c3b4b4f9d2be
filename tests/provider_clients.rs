use chrono::NaiveDate;
use httpmock::Method::{DELETE, GET, POST};
use httpmock::MockServer;
use serde_json::json;

use benefits_admin::gateway::client::{NewCustomer, NewSubscription};
use benefits_admin::gateway::{ErrorCategory, GatewayClient, GatewayError, categorize};
use benefits_admin::registry::{EnrollmentNotice, RegistryClient, RegistryError, RegistryQuery};

mod support;

fn gateway(server: &MockServer) -> GatewayClient {
    let config = support::test_config(&server.base_url());
    GatewayClient::new(&config.gateway, reqwest::Client::new())
}

fn registry(server: &MockServer) -> RegistryClient {
    let config = support::test_config(&server.base_url());
    RegistryClient::new(&config.registry, reqwest::Client::new())
}

fn new_customer() -> NewCustomer {
    NewCustomer {
        name: "Maria da Silva".to_string(),
        email: "maria@example.com".to_string(),
        registry_code: "086.007.569-95".to_string(),
        code: Some("08600756995".to_string()),
        phone: None,
        address: None,
    }
}

#[tokio::test]
async fn existing_customer_is_reused() {
    let server = MockServer::start_async().await;
    let search = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/customers")
                .query_param("query", "registry_code:08600756995")
                .header_exists("Authorization");
            then.status(200)
                .json_body(json!({ "customers": [{ "id": 42, "name": "Maria", "status": "active" }] }));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/customers");
            then.status(201).json_body(json!({ "customer": { "id": 1 } }));
        })
        .await;

    let customer = gateway(&server).find_or_create_customer(&new_customer()).await.unwrap();

    assert_eq!(customer.id, "42");
    search.assert_async().await;
    create.assert_hits_async(0).await;
}

#[tokio::test]
async fn missing_customer_is_created() {
    let server = MockServer::start_async().await;
    let by_cpf = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/customers")
                .query_param("query", "registry_code:08600756995");
            then.status(200).json_body(json!({ "customers": [] }));
        })
        .await;
    let by_email = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/customers")
                .query_param("query", "email:\"maria@example.com\"");
            then.status(200)
                .json_body(json!({ "customers": [{ "id": 5, "status": "archived" }] }));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/customers")
                .json_body_partial(r#"{ "registry_code": "08600756995", "code": "08600756995" }"#);
            then.status(201)
                .json_body(json!({ "customer": { "id": 43, "email": "maria@example.com" } }));
        })
        .await;

    let customer = gateway(&server).find_or_create_customer(&new_customer()).await.unwrap();

    assert_eq!(customer.id, "43");
    by_cpf.assert_async().await;
    by_email.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn pix_subscription_exposes_payment_details() {
    let server = MockServer::start_async().await;
    let mock = server
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
                    "amount": "49.9",
                    "charges": [{
                        "id": 31,
                        "status": "pending",
                        "last_transaction": {
                            "status": "waiting",
                            "gateway_response_fields": {
                                "qrcode_original_path": "00020126PIXCODE",
                                "qrcode_path": "https://pay.example/qr/555.png"
                            }
                        }
                    }]
                }
            }));
        })
        .await;

    let created = gateway(&server)
        .create_subscription(&NewSubscription {
            plan_id: "101".to_string(),
            customer_id: "43".to_string(),
            payment_method_code: "pix".to_string(),
            gateway_token: None,
            code: None,
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(created.subscription.id, "999");
    let bill = created.bill.unwrap();
    assert_eq!(bill.id, "555");
    assert!(bill.rejection().is_none());
    assert!(!bill.is_paid());
    assert_eq!(bill.pix_code().as_deref(), Some("00020126PIXCODE"));
    assert_eq!(bill.pix_qr_code_url().as_deref(), Some("https://pay.example/qr/555.png"));
    assert_eq!(bill.checkout_url().as_deref(), Some("https://pay.example/bills/555"));
}

#[tokio::test]
async fn rejected_card_charge_is_categorized() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/subscriptions");
            then.status(201).json_body(json!({
                "subscription": { "id": 1000 },
                "bill": {
                    "id": 556,
                    "status": "pending",
                    "charges": [{
                        "id": 32,
                        "status": "rejected",
                        "last_transaction": {
                            "status": "rejected",
                            "gateway_message": "Transação negada: saldo insuficiente",
                            "gateway_response_code": "51"
                        }
                    }]
                }
            }));
        })
        .await;

    let created = gateway(&server)
        .create_subscription(&NewSubscription {
            plan_id: "101".to_string(),
            customer_id: "43".to_string(),
            payment_method_code: "credit_card".to_string(),
            gateway_token: Some("tok_abc".to_string()),
            code: None,
        })
        .await
        .unwrap();

    let rejection = created.bill.unwrap().rejection().expect("charge should be rejected");
    assert_eq!(categorize(&rejection).category, ErrorCategory::InsufficientFunds);
}

#[tokio::test]
async fn api_errors_keep_status_and_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/subscriptions/999");
            then.status(422)
                .json_body(json!({ "errors": [{ "id": "invalid_parameter", "message": "não pode ser cancelada" }] }));
        })
        .await;

    let err = gateway(&server).cancel_subscription("999").await.unwrap_err();
    match &err {
        GatewayError::Api { status, body } => {
            assert_eq!(*status, 422);
            assert!(body.contains("invalid_parameter"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(categorize(&err).category, ErrorCategory::InvalidData);
}

#[tokio::test]
async fn missing_api_key_fails_before_any_request() {
    let server = MockServer::start_async().await;
    let any = server
        .mock_async(|when, then| {
            when.path_contains("/");
            then.status(200);
        })
        .await;

    let mut config = support::test_config(&server.base_url());
    config.gateway.api_key = None;
    let client = GatewayClient::new(&config.gateway, reqwest::Client::new());

    let err = client.cancel_subscription("1").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotConfigured("GATEWAY_API_KEY")));
    any.assert_hits_async(0).await;
}

#[tokio::test]
async fn registry_enrollment_returns_protocol() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/beneficiarios")
                .header("x-api-key", support::REGISTRY_API_KEY)
                .json_body_partial(r#"{ "cpf": "08600756995", "plano": "Individual" }"#);
            then.status(201).json_body(json!({ "protocolo": 20250001 }));
        })
        .await;

    let protocol = registry(&server)
        .notify_enrollment(&EnrollmentNotice {
            codigo_externo: "b-1".to_string(),
            cpf: "08600756995".to_string(),
            nome: "Maria da Silva".to_string(),
            email: "maria@example.com".to_string(),
            telefone: None,
            data_nascimento: None,
            plano: "Individual".to_string(),
            unidade: "Unidade Centro".to_string(),
            data_adesao: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(protocol.as_deref(), Some("20250001"));
}

#[tokio::test]
async fn registry_lookup_sends_filters_and_reads_envelope() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/beneficiarios")
                .query_param("cpf", "08600756995")
                .query_param("data_inicio", "2025-01-01")
                .query_param("data_fim", "2025-03-31")
                .query_param("offset", "0")
                .query_param("limit", "100");
            then.status(200).json_body(json!({
                "offset": 0,
                "limit": 100,
                "count": 1,
                "data": [{ "cpf": "08600756995", "situacao": "ativo" }]
            }));
        })
        .await;

    let page = registry(&server)
        .query_beneficiaries(&RegistryQuery {
            cpf: Some("086.007.569-95".to_string()),
            from: NaiveDate::from_ymd_opt(2025, 1, 1),
            to: NaiveDate::from_ymd_opt(2025, 3, 31),
            offset: 0,
            limit: 500,
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(page.count, 1);
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn registry_errors_surface_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/cancelamentos");
            then.status(503).body("maintenance");
        })
        .await;

    let err = registry(&server)
        .notify_cancellation(&benefits_admin::registry::CancellationNotice {
            codigo_externo: "b-1".to_string(),
            cpf: "08600756995".to_string(),
            motivo: "pedido do cliente".to_string(),
            data_cancelamento: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Api { status: 503, .. }));
}
