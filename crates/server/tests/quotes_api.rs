//! HTTP-level coverage of the quote API: envelope shapes, status codes,
//! tenant scoping, the lifecycle endpoints, and the 501 stubs.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use fieldops_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use fieldops_db::{connect_with_settings, migrations, DbPool};
use fieldops_server::app_router;

const TENANT_ALPHA: &str = "comp-alpha";
const TENANT_BETA: &str = "comp-beta";

async fn setup_app() -> (Router, DbPool) {
    let config = AppConfig::load(LoadOptions {
        overrides: ConfigOverrides {
            database_url: Some("sqlite::memory:".to_string()),
            ..ConfigOverrides::default()
        },
        ..LoadOptions::default()
    })
    .expect("config");

    let pool = connect_with_settings(&config.database.url, 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    seed(&pool).await;

    (app_router(&config, pool.clone()), pool)
}

async fn seed(pool: &DbPool) {
    let now = Utc::now().to_rfc3339();
    for (company, name) in [(TENANT_ALPHA, "Alpha Field Services"), (TENANT_BETA, "Beta BV")] {
        sqlx::query("INSERT INTO company (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(company)
            .bind(name)
            .bind(&now)
            .bind(&now)
            .execute(pool)
            .await
            .expect("insert company");
    }

    sqlx::query(
        "INSERT INTO client (id, company_id, name, email, phone, address, created_at, updated_at)
         VALUES ('client-acme', ?, 'Acme Building Services', 'facilities@acme.example', NULL,
                 '{\"line1\":\"Keizersgracht 100\",\"city\":\"Amsterdam\"}', ?, ?)",
    )
    .bind(TENANT_ALPHA)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .expect("insert client");

    sqlx::query(
        "INSERT INTO users (id, company_id, name, email, role, created_at, updated_at)
         VALUES ('tech-alpha', ?, 'Jamie Visser', 'jamie@alpha.example', 'technician', ?, ?)",
    )
    .bind(TENANT_ALPHA)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .expect("insert technician");
}

fn request(method: Method, uri: &str, tenant: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(tenant) = tenant {
        builder = builder.header("x-company-id", tenant);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

fn create_body() -> Value {
    let valid_until = (Utc::now() + Duration::days(30)).date_naive().to_string();
    json!({
        "client_id": "client-acme",
        "items": [
            {"description": "Inspection labour", "quantity": "2", "unit_price": "50", "tax_rate": "10"},
            {"description": "Replacement filters", "quantity": "1", "unit_price": "20"}
        ],
        "valid_until": valid_until,
        "notes": "Boiler inspection",
        "profit_margin": "15"
    })
}

async fn create_quote(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(request(Method::POST, "/quotes", Some(TENANT_ALPHA), Some(create_body())))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    body["data"]["id"].as_str().expect("quote id").to_string()
}

async fn post_transition(app: &Router, id: &str, action: &str) -> StatusCode {
    app.clone()
        .oneshot(request(
            Method::POST,
            &format!("/quotes/{id}/{action}"),
            Some(TENANT_ALPHA),
            None,
        ))
        .await
        .expect("response")
        .status()
}

#[tokio::test]
async fn service_banner_and_health_respond() {
    let (app, _pool) = setup_app().await;

    let banner = app
        .clone()
        .oneshot(request(Method::GET, "/", None, None))
        .await
        .expect("banner");
    assert_eq!(banner.status(), StatusCode::OK);
    let body = json_body(banner).await;
    assert_eq!(body["data"]["name"], "fieldops-api");

    let health = app
        .clone()
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .expect("health");
    assert_eq!(health.status(), StatusCode::OK);
    let body = json_body(health).await;
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn missing_tenant_header_is_a_validation_error() {
    let (app, _pool) = setup_app().await;

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/quotes", None, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Validation error");
    assert!(body["errors"]["x-company-id"][0].is_string());
}

#[tokio::test]
async fn create_returns_envelope_with_computed_totals() {
    let (app, _pool) = setup_app().await;

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/quotes", Some(TENANT_ALPHA), Some(create_body())))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    assert_eq!(body["message"], "Quote created successfully");
    let data = &body["data"];
    assert_eq!(data["status"], "draft");
    assert_eq!(data["subtotal"], "120.00");
    assert_eq!(data["tax_amount"], "10.00");
    assert_eq!(data["total"], "130.00");
    assert_eq!(data["client"]["name"], "Acme Building Services");
    assert_eq!(data["items"].as_array().expect("items").len(), 2);
}

#[tokio::test]
async fn create_reports_every_invalid_item_field() {
    let (app, _pool) = setup_app().await;

    let valid_until = (Utc::now() + Duration::days(30)).date_naive().to_string();
    let body = json!({
        "client_id": "client-acme",
        "items": [
            {"description": "", "quantity": "0", "unit_price": "-5", "tax_rate": "250"}
        ],
        "valid_until": valid_until
    });

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/quotes", Some(TENANT_ALPHA), Some(body)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = json_body(response).await;
    assert_eq!(body["message"], "Validation error");
    let errors = body["errors"].as_object().expect("errors map");
    for field in
        ["items.0.description", "items.0.quantity", "items.0.unit_price", "items.0.tax_rate"]
    {
        assert!(errors.contains_key(field), "missing error for `{field}`: {errors:?}");
    }
}

#[tokio::test]
async fn quotes_are_not_visible_to_other_tenants() {
    let (app, _pool) = setup_app().await;
    let id = create_quote(&app).await;

    let response = app
        .clone()
        .oneshot(request(Method::GET, &format!("/quotes/{id}"), Some(TENANT_BETA), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["message"], "quote not found");

    let response = app
        .clone()
        .oneshot(request(Method::GET, &format!("/quotes/{id}"), Some(TENANT_ALPHA), None))
        .await
        .expect("owner request");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn listing_returns_paginated_envelope() {
    let (app, _pool) = setup_app().await;
    create_quote(&app).await;
    create_quote(&app).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            "/quotes?limit=1&page=2&search=acme",
            Some(TENANT_ALPHA),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"].as_array().expect("data").len(), 1);
    assert_eq!(body["meta"], json!({"page": 2, "limit": 1, "total": 2, "totalPages": 2}));
}

#[tokio::test]
async fn listing_rejects_unknown_status_filter() {
    let (app, _pool) = setup_app().await;

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/quotes?status=archived", Some(TENANT_ALPHA), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert!(body["errors"]["status"][0].is_string());
}

#[tokio::test]
async fn lifecycle_endpoints_gate_transitions() {
    let (app, _pool) = setup_app().await;
    let id = create_quote(&app).await;

    // A draft cannot be accepted.
    assert_eq!(post_transition(&app, &id, "accept").await, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(post_transition(&app, &id, "send").await, StatusCode::OK);
    assert_eq!(post_transition(&app, &id, "accept").await, StatusCode::OK);

    // Accepted quotes are immutable.
    let response = app
        .clone()
        .oneshot(request(
            Method::PUT,
            &format!("/quotes/{id}"),
            Some(TENANT_ALPHA),
            Some(json!({"notes": "too late"})),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["message"], "cannot update accepted or rejected quotes");
}

#[tokio::test]
async fn stale_accept_expires_the_quote() {
    let (app, pool) = setup_app().await;
    let id = create_quote(&app).await;
    assert_eq!(post_transition(&app, &id, "send").await, StatusCode::OK);

    sqlx::query("UPDATE quote SET valid_until = '2020-01-01' WHERE id = ?")
        .bind(&id)
        .execute(&pool)
        .await
        .expect("age the quote");

    let response = app
        .clone()
        .oneshot(request(Method::POST, &format!("/quotes/{id}/accept"), Some(TENANT_ALPHA), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["message"], "quote has expired");

    let response = app
        .clone()
        .oneshot(request(Method::GET, &format!("/quotes/{id}"), Some(TENANT_ALPHA), None))
        .await
        .expect("get after failed accept");
    let body = json_body(response).await;
    assert_eq!(body["data"]["status"], "expired");
}

#[tokio::test]
async fn update_replaces_items_and_returns_new_totals() {
    let (app, _pool) = setup_app().await;
    let id = create_quote(&app).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::PUT,
            &format!("/quotes/{id}"),
            Some(TENANT_ALPHA),
            Some(json!({
                "items": [
                    {"description": "Emergency callout", "quantity": "3", "unit_price": "75.50", "tax_rate": "21"}
                ]
            })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["message"], "Quote updated successfully");
    assert_eq!(body["data"]["subtotal"], "226.50");
    assert_eq!(body["data"]["tax_amount"], "47.57");
    assert_eq!(body["data"]["total"], "274.07");
    assert_eq!(body["data"]["items"].as_array().expect("items").len(), 1);
}

#[tokio::test]
async fn delete_removes_the_quote_and_its_items() {
    let (app, pool) = setup_app().await;
    let id = create_quote(&app).await;

    let response = app
        .clone()
        .oneshot(request(Method::DELETE, &format!("/quotes/{id}"), Some(TENANT_ALPHA), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Quote deleted successfully");

    let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quote_item")
        .fetch_one(&pool)
        .await
        .expect("count items");
    assert_eq!(items, 0);

    let response = app
        .clone()
        .oneshot(request(Method::GET, &format!("/quotes/{id}"), Some(TENANT_ALPHA), None))
        .await
        .expect("get after delete");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn conversion_endpoint_guards_and_creates_jobs() {
    let (app, _pool) = setup_app().await;
    let id = create_quote(&app).await;
    let scheduled = (Utc::now() + Duration::days(7)).date_naive().to_string();

    // Draft quote: conversion refused, nothing created.
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            &format!("/quotes/{id}/convert-to-job"),
            Some(TENANT_ALPHA),
            Some(json!({"scheduled_date": scheduled})),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(post_transition(&app, &id, "send").await, StatusCode::OK);
    assert_eq!(post_transition(&app, &id, "accept").await, StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            &format!("/quotes/{id}/convert-to-job"),
            Some(TENANT_ALPHA),
            Some(json!({
                "scheduled_date": scheduled,
                "assigned_technician": "tech-alpha",
                "priority": "high"
            })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    assert_eq!(body["message"], "Job created from quote successfully");
    let job = &body["data"];
    assert_eq!(job["status"], "scheduled");
    assert_eq!(job["priority"], "high");
    assert_eq!(job["quote_id"], id.as_str());
    assert_eq!(job["location"]["city"], "Amsterdam");
}

#[tokio::test]
async fn pdf_endpoints_render_the_quote_document() {
    let (app, _pool) = setup_app().await;
    let id = create_quote(&app).await;

    let response = app
        .clone()
        .oneshot(request(Method::GET, &format!("/quotes/{id}/pdf"), Some(TENANT_ALPHA), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .expect("content type")
        .to_string();
    assert!(
        content_type.contains("application/pdf") || content_type.contains("text/html"),
        "unexpected content type `{content_type}`"
    );

    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/quotes/{id}/pdf/stream"),
            Some(TENANT_BETA),
            None,
        ))
        .await
        .expect("cross-tenant pdf");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unimplemented_features_return_501() {
    let (app, _pool) = setup_app().await;

    for (method, uri) in [
        (Method::POST, "/messages/send"),
        (Method::GET, "/schedule/availability"),
        (Method::GET, "/schedule/conflicts"),
    ] {
        let response = app
            .clone()
            .oneshot(request(method.clone(), uri, Some(TENANT_ALPHA), None))
            .await
            .expect("response");
        assert_eq!(
            response.status(),
            StatusCode::NOT_IMPLEMENTED,
            "{method} {uri} should be a stub"
        );
        let body = json_body(response).await;
        assert!(body["message"].as_str().expect("message").contains("not implemented"));
    }
}

#[tokio::test]
async fn message_and_thread_listings_use_the_paginated_envelope() {
    let (app, pool) = setup_app().await;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO conversation (id, company_id, participant_name, participant_email, last_message_at, created_at)
         VALUES ('conv-1', ?, 'Acme Building Services', 'facilities@acme.example', ?, ?)",
    )
    .bind(TENANT_ALPHA)
    .bind(&now)
    .bind(&now)
    .execute(&pool)
    .await
    .expect("insert conversation");

    sqlx::query(
        "INSERT INTO message (id, company_id, conversation_id, sender, body, created_at)
         VALUES ('msg-1', ?, 'conv-1', 'client', 'When can you come by?', ?)",
    )
    .bind(TENANT_ALPHA)
    .bind(&now)
    .execute(&pool)
    .await
    .expect("insert message");

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/messages", Some(TENANT_ALPHA), None))
        .await
        .expect("messages");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["body"], "When can you come by?");

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/messages/threads", Some(TENANT_BETA), None))
        .await
        .expect("threads for other tenant");
    let body = json_body(response).await;
    assert_eq!(body["meta"]["total"], 0);
}
