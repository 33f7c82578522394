use anyhow::anyhow;
use chrono::Utc;
use http_body_util::BodyExt;
use std::str::FromStr;

use axum::{
    body::Body,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS,
            ACCESS_CONTROL_REQUEST_METHOD, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE,
            ORIGIN,
        },
        Method, Request, StatusCode,
    },
    response::{IntoResponse, Response},
    Router,
};
use concierge_api::{build_router, ApiError, AppState};
use concierge_auth::Authenticator;
use concierge_config::AppConfig;
use concierge_integrations::Integrations;
use serde_json::{self, json, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tempfile::TempDir;
use tower::ServiceExt;

type TestResult<T = ()> = anyhow::Result<T>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

const ADMIN_EMAIL: &str = "owner@example.com";
const PASSWORD: &str = "correct horse battery";
const WEBHOOK_SECRET: &str = "whsec_integration";

struct TestContext {
    _temp_dir: TempDir,
    pool: SqlitePool,
    state: AppState,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let mut config = AppConfig::default();
        config.auth.super_admin_emails = vec![ADMIN_EMAIL.to_string()];
        Self::with_config(config).await
    }

    async fn with_stripe(base_url: &str) -> TestResult<Self> {
        let mut config = AppConfig::default();
        config.auth.super_admin_emails = vec![ADMIN_EMAIL.to_string()];
        config.integrations.stripe.secret_key = Some("sk_test_integration".into());
        config.integrations.stripe.webhook_secret = Some(WEBHOOK_SECRET.into());
        config.integrations.stripe.base_url = base_url.to_string();
        Self::with_config(config).await
    }

    async fn with_config(config: AppConfig) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("concierge_api.sqlite");
        let db_url = format!("sqlite://{}", db_path.display());

        let mut options = SqliteConnectOptions::from_str(&db_url)?;
        options = options.create_if_missing(true);
        options = options.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        MIGRATOR.run(&pool).await?;

        let authenticator = Authenticator::new(pool.clone(), config.auth.clone());
        let integrations = Integrations::from_config(&config.integrations)?;
        let state = AppState::new(pool.clone(), authenticator, integrations, config);

        Ok(Self {
            _temp_dir: temp_dir,
            pool,
            state,
        })
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    async fn send(&self, request: Request<Body>) -> TestResult<Response> {
        Ok(self.router().oneshot(request).await?)
    }

    /// Send a JSON request and decode the JSON reply. Empty bodies decode as `Value::Null`.
    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResult<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.send(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, payload))
    }

    async fn register(&self, email: &str) -> TestResult<String> {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await?;
        if status != StatusCode::OK {
            return Err(anyhow!("register {email} failed with {status}: {body}"));
        }
        body["token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("register response has no token"))
    }

    async fn admin_token(&self) -> TestResult<String> {
        self.register(ADMIN_EMAIL).await
    }

    /// Admin creates a manager record, then the manager signs up with the same email.
    async fn manager_token(&self, admin: &str, email: &str) -> TestResult<String> {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/managers",
                Some(admin),
                Some(json!({ "email": email, "full_name": "Ana Ruiz", "company": "Ruiz Realty" })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "create manager: {body}");
        self.register(email).await
    }

    async fn create_client(&self, token: &str, name: &str) -> TestResult<Value> {
        let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
        let (status, body) = self
            .call(
                Method::POST,
                "/api/clients",
                Some(token),
                Some(json!({ "full_name": name, "email": email })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "create client: {body}");
        Ok(body["client"].clone())
    }

    async fn create_property(&self, token: &str, street: &str) -> TestResult<Value> {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/properties",
                Some(token),
                Some(json!({
                    "street": street,
                    "city": "Miami",
                    "state": "FL",
                    "zip": "33130",
                    "bedrooms": 2,
                    "purchase_price": 45_000_000,
                    "monthly_rent": 320_000,
                    "visibility": {
                        "purchase_price": true,
                        "monthly_rent": true,
                        "hoa_fee": true,
                        "property_tax": true
                    }
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "create property: {body}");
        Ok(body["property"].clone())
    }

    async fn create_invoice(&self, token: &str, client_id: &str) -> TestResult<Value> {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/invoices",
                Some(token),
                Some(json!({
                    "client_id": client_id,
                    "line_items": [
                        { "description": "Tenant placement", "quantity": 1, "unit_price_cents": 150_000 }
                    ],
                    "tax_rate_bps": 700
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "create invoice: {body}");
        Ok(body["invoice"].clone())
    }
}

fn id_of(value: &Value) -> TestResult<String> {
    value["id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("value has no id: {value}"))
}

mod router_tests {
    use super::*;

    #[tokio::test]
    async fn health_check_reports_ok() -> TestResult {
        let ctx = TestContext::new().await?;
        let (status, body) = ctx.call(Method::GET, "/health", None, None).await?;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        Ok(())
    }

    #[tokio::test]
    async fn openapi_document_is_served() -> TestResult {
        let ctx = TestContext::new().await?;
        let (status, body) = ctx
            .call(Method::GET, "/api-docs/openapi.json", None, None)
            .await?;

        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/portfolios/{slug}"].is_object());
        assert!(body["paths"]["/api/invoices/{invoice_id}/pdf"].is_object());
        assert!(body["components"]["securitySchemes"]["bearerAuth"].is_object());
        Ok(())
    }

    #[tokio::test]
    async fn cors_layer_allows_dashboard_methods_and_headers() -> TestResult {
        let ctx = TestContext::new().await?;
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/clients")
            .header(ORIGIN, "http://localhost:3000")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
            .header(ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
            .body(Body::empty())?;

        let response = ctx.send(request).await?;
        assert!(response.status().is_success());

        let headers = response.headers();
        assert_eq!(
            headers
                .get(ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );

        let allow_methods = headers
            .get(ACCESS_CONTROL_ALLOW_METHODS)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_uppercase();
        for method in ["GET", "POST", "PATCH", "DELETE"] {
            assert!(
                allow_methods.contains(method),
                "missing {method} in {allow_methods}"
            );
        }

        let allow_headers = headers
            .get(ACCESS_CONTROL_ALLOW_HEADERS)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        assert!(allow_headers.contains("authorization"));
        assert!(allow_headers.contains("content-type"));
        Ok(())
    }
}

mod error_handling_tests {
    use super::*;
    use concierge_integrations::IntegrationError;

    #[tokio::test]
    async fn api_error_into_response_sets_status_and_body() -> TestResult {
        let response = ApiError::bad_request("missing payload").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await?.to_bytes();
        let payload: Value = serde_json::from_slice(&body)?;
        assert_eq!(payload["error"], "missing payload");
        Ok(())
    }

    #[test]
    fn integration_errors_map_to_semantic_status_codes() {
        let cases = [
            (
                IntegrationError::NotConfigured("stripe"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                IntegrationError::InvalidInput("bad url".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                IntegrationError::Signature("mismatch".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                IntegrationError::Upstream {
                    status: 500,
                    body: "boom".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                IntegrationError::Decode("not json".into()),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (error, expected) in cases {
            let api_error: ApiError = error.into();
            assert_eq!(
                api_error.status, expected,
                "unexpected HTTP status for {:?}",
                api_error.message
            );
        }
    }
}

mod auth_route_tests {
    use super::*;

    #[tokio::test]
    async fn dashboard_routes_require_a_bearer_token() -> TestResult {
        let ctx = TestContext::new().await?;
        let (status, body) = ctx.call(Method::GET, "/api/clients", None, None).await?;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn accounts_without_a_manager_are_forbidden() -> TestResult {
        let ctx = TestContext::new().await?;
        let token = ctx.register("visitor@example.com").await?;

        let (status, me) = ctx.call(Method::GET, "/api/auth/me", Some(&token), None).await?;
        assert_eq!(status, StatusCode::OK);
        assert!(me["manager"].is_null());
        assert_eq!(me["is_admin"], false);

        let (status, _) = ctx.call(Method::GET, "/api/clients", Some(&token), None).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn allowlisted_email_is_provisioned_as_admin() -> TestResult {
        let ctx = TestContext::new().await?;
        let token = ctx.admin_token().await?;

        let (status, me) = ctx.call(Method::GET, "/api/auth/me", Some(&token), None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["is_admin"], true);
        assert_eq!(me["manager"]["role"], "admin");

        let (status, managers) = ctx
            .call(Method::GET, "/api/managers", Some(&token), None)
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(managers["managers"].as_array().map(Vec::len), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn login_logout_cycle_revokes_the_session() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.register("pm@example.com").await?;

        let (status, _) = ctx
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "pm@example.com", "password": "wrong" })),
            )
            .await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, session) = ctx
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "PM@example.com", "password": PASSWORD })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK);
        let token = session["token"].as_str().unwrap_or_default().to_string();

        let (status, _) = ctx
            .call(Method::POST, "/api/auth/logout", Some(&token), None)
            .await?;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = ctx.call(Method::GET, "/api/auth/me", Some(&token), None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.register("pm@example.com").await?;

        let (status, _) = ctx
            .call(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "email": "pm@example.com", "password": PASSWORD })),
            )
            .await?;
        assert_eq!(status, StatusCode::CONFLICT);
        Ok(())
    }
}

mod portfolio_route_tests {
    use super::*;

    #[tokio::test]
    async fn portfolio_shows_assigned_properties_with_client_pricing() -> TestResult {
        let ctx = TestContext::new().await?;
        let admin = ctx.admin_token().await?;
        let manager = ctx.manager_token(&admin, "ana@example.com").await?;

        let client = ctx.create_client(&manager, "Lena Park").await?;
        let client_id = id_of(&client)?;
        let slug = client["slug"].as_str().unwrap_or_default().to_string();
        assert_eq!(slug, "lena-park");

        let first = ctx.create_property(&manager, "100 Brickell Ave").await?;
        let second = ctx.create_property(&manager, "200 Biscayne Blvd").await?;
        assert_eq!(first["region"], "Miami-Dade");

        let assignments_uri = format!("/api/clients/{client_id}/assignments");
        let (status, assigned) = ctx
            .call(
                Method::POST,
                &assignments_uri,
                Some(&manager),
                Some(json!({
                    "property_id": id_of(&first)?,
                    "overrides": { "purchase_price": false }
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "assign: {assigned}");
        assert!(assigned["assignment"]["client_pricing"]["purchase_price"].is_null());

        let (status, _) = ctx
            .call(
                Method::POST,
                &assignments_uri,
                Some(&manager),
                Some(json!({ "property_id": id_of(&second)? })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = ctx
            .call(
                Method::POST,
                &assignments_uri,
                Some(&manager),
                Some(json!({ "property_id": id_of(&second)? })),
            )
            .await?;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, portfolio) = ctx
            .call(Method::GET, &format!("/api/portfolios/{slug}"), None, None)
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(portfolio["client_name"], "Lena Park");
        assert_eq!(portfolio["manager"]["company"], "Ruiz Realty");

        let properties = portfolio["properties"]
            .as_array()
            .ok_or_else(|| anyhow!("portfolio has no properties"))?;
        assert_eq!(properties.len(), 2);
        assert_eq!(properties[0]["street"], "100 Brickell Ave");
        assert!(properties[0]["pricing"]["purchase_price"].is_null());
        assert_eq!(properties[0]["pricing"]["monthly_rent"], 320_000);
        assert_eq!(properties[1]["pricing"]["purchase_price"], 45_000_000);

        let (status, single) = ctx
            .call(
                Method::GET,
                &format!("/api/portfolios/{slug}/properties/{}", id_of(&second)?),
                None,
                None,
            )
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(single["street"], "200 Biscayne Blvd");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_or_inactive_portfolios_are_not_found() -> TestResult {
        let ctx = TestContext::new().await?;
        let (status, _) = ctx
            .call(Method::GET, "/api/portfolios/nobody", None, None)
            .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let admin = ctx.admin_token().await?;
        let client = ctx.create_client(&admin, "Omar Diaz").await?;
        let (status, _) = ctx
            .call(
                Method::PATCH,
                &format!("/api/clients/{}", id_of(&client)?),
                Some(&admin),
                Some(json!({ "is_active": false })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = ctx
            .call(Method::GET, "/api/portfolios/omar-diaz", None, None)
            .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn managers_cannot_touch_each_others_clients() -> TestResult {
        let ctx = TestContext::new().await?;
        let admin = ctx.admin_token().await?;
        let ana = ctx.manager_token(&admin, "ana@example.com").await?;
        let ben = ctx.manager_token(&admin, "ben@example.com").await?;

        let client = ctx.create_client(&ana, "Lena Park").await?;
        let uri = format!("/api/clients/{}", id_of(&client)?);

        let (status, _) = ctx.call(Method::GET, &uri, Some(&ben), None).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, listed) = ctx.call(Method::GET, "/api/clients", Some(&ben), None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["clients"].as_array().map(Vec::len), Some(0));

        let (status, _) = ctx.call(Method::GET, &uri, Some(&admin), None).await?;
        assert_eq!(status, StatusCode::OK);
        Ok(())
    }
}

mod billing_route_tests {
    use super::*;
    use concierge_integrations::sign_webhook_payload;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn invoice_pdf_is_served_inline() -> TestResult {
        let ctx = TestContext::new().await?;
        let admin = ctx.admin_token().await?;
        let client = ctx.create_client(&admin, "Lena Park").await?;
        let invoice = ctx.create_invoice(&admin, &id_of(&client)?).await?;

        assert_eq!(invoice["status"], "draft");
        assert_eq!(invoice["subtotal_cents"], 150_000);
        assert_eq!(invoice["tax_cents"], 10_500);
        assert_eq!(invoice["total_cents"], 160_500);

        let number = invoice["number"].as_str().unwrap_or_default().to_string();
        let request = Request::builder()
            .uri(format!("/api/invoices/{}/pdf", id_of(&invoice)?))
            .header(AUTHORIZATION, format!("Bearer {admin}"))
            .body(Body::empty())?;
        let response = ctx.send(request).await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/pdf")
        );
        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert_eq!(disposition, format!("inline; filename=\"{number}.pdf\""));

        let bytes = response.into_body().collect().await?.to_bytes();
        assert!(bytes.starts_with(b"%PDF"));
        Ok(())
    }

    #[tokio::test]
    async fn sent_invoices_cannot_be_edited() -> TestResult {
        let ctx = TestContext::new().await?;
        let admin = ctx.admin_token().await?;
        let client = ctx.create_client(&admin, "Lena Park").await?;
        let invoice = ctx.create_invoice(&admin, &id_of(&client)?).await?;
        let uri = format!("/api/invoices/{}", id_of(&invoice)?);

        let (status, sent) = ctx
            .call(Method::POST, &format!("{uri}/send"), Some(&admin), None)
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sent["invoice"]["status"], "sent");

        let (status, _) = ctx
            .call(
                Method::PATCH,
                &uri,
                Some(&admin),
                Some(json!({ "notes": "late edit" })),
            )
            .await?;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = ctx
            .call(
                Method::DELETE,
                &format!("/api/clients/{}", id_of(&client)?),
                Some(&admin),
                None,
            )
            .await?;
        assert_eq!(status, StatusCode::CONFLICT);
        Ok(())
    }

    #[tokio::test]
    async fn stripe_payment_flow_marks_invoice_paid() -> TestResult {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/payment_intents")
                    .header("authorization", "Bearer sk_test_integration")
                    .body_contains("amount=160500");
                then.status(200).json_body(json!({
                    "id": "pi_flow",
                    "client_secret": "pi_flow_secret",
                    "amount": 160_500,
                    "currency": "usd",
                    "status": "requires_payment_method"
                }));
            })
            .await;

        let ctx = TestContext::with_stripe(&server.base_url()).await?;
        let admin = ctx.admin_token().await?;
        let client = ctx.create_client(&admin, "Lena Park").await?;
        let invoice = ctx.create_invoice(&admin, &id_of(&client)?).await?;
        let invoice_id = id_of(&invoice)?;

        let (status, _) = ctx
            .call(
                Method::POST,
                "/api/payments/intent",
                None,
                Some(json!({ "invoice_id": invoice_id })),
            )
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "drafts are not payable");

        ctx.call(
            Method::POST,
            &format!("/api/invoices/{invoice_id}/send"),
            Some(&admin),
            None,
        )
        .await?;

        let (status, intent) = ctx
            .call(
                Method::POST,
                "/api/payments/intent",
                None,
                Some(json!({ "invoice_id": invoice_id })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "intent: {intent}");
        assert_eq!(intent["client_secret"], "pi_flow_secret");
        mock.assert_async().await;

        let payload = serde_json::to_vec(&json!({
            "id": "evt_flow",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_flow", "metadata": { "invoice_id": invoice_id } } }
        }))?;
        let signature = sign_webhook_payload(&payload, WEBHOOK_SECRET, Utc::now().timestamp())?;

        let webhook = |signature: String| {
            Request::builder()
                .method(Method::POST)
                .uri("/api/payments/webhook")
                .header("stripe-signature", signature)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(payload.clone()))
        };

        let response = ctx.send(webhook(signature.clone())?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let ack: Value =
            serde_json::from_slice(&response.into_body().collect().await?.to_bytes())?;
        assert_eq!(ack["outcome"], "invoice_paid");

        let replay = ctx.send(webhook(signature)?).await?;
        let ack: Value = serde_json::from_slice(&replay.into_body().collect().await?.to_bytes())?;
        assert_eq!(ack["outcome"], "already_settled");

        let (_, paid) = ctx
            .call(
                Method::GET,
                &format!("/api/invoices/{invoice_id}"),
                Some(&admin),
                None,
            )
            .await?;
        assert_eq!(paid["invoice"]["status"], "paid");

        let stored: Option<String> =
            sqlx::query_scalar("SELECT paid_at FROM invoices WHERE public_id = ?")
                .bind(&invoice_id)
                .fetch_one(ctx.pool())
                .await?;
        assert!(stored.is_some());

        let (status, _) = ctx
            .call(
                Method::POST,
                "/api/payments/intent",
                None,
                Some(json!({ "invoice_id": invoice_id })),
            )
            .await?;
        assert_eq!(status, StatusCode::CONFLICT);
        Ok(())
    }

    #[tokio::test]
    async fn webhook_rejects_forged_signatures() -> TestResult {
        let ctx = TestContext::with_stripe("http://127.0.0.1:9").await?;
        let payload = br#"{"id":"evt_x","type":"payment_intent.succeeded","data":{"object":{"id":"pi_x"}}}"#;
        let forged = sign_webhook_payload(payload, "whsec_attacker", Utc::now().timestamp())?;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/payments/webhook")
            .header("stripe-signature", forged)
            .body(Body::from(payload.to_vec()))?;
        let response = ctx.send(request).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let unsigned = Request::builder()
            .method(Method::POST)
            .uri("/api/payments/webhook")
            .body(Body::from(payload.to_vec()))?;
        assert_eq!(ctx.send(unsigned).await?.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn payments_without_stripe_are_unavailable() -> TestResult {
        let ctx = TestContext::new().await?;
        let admin = ctx.admin_token().await?;
        let client = ctx.create_client(&admin, "Lena Park").await?;
        let invoice = ctx.create_invoice(&admin, &id_of(&client)?).await?;
        let invoice_id = id_of(&invoice)?;
        ctx.call(
            Method::POST,
            &format!("/api/invoices/{invoice_id}/send"),
            Some(&admin),
            None,
        )
        .await?;

        let (status, _) = ctx
            .call(
                Method::POST,
                "/api/payments/intent",
                None,
                Some(json!({ "invoice_id": invoice_id })),
            )
            .await?;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }

    #[tokio::test]
    async fn accepted_quote_converts_to_invoice_once() -> TestResult {
        let ctx = TestContext::new().await?;
        let admin = ctx.admin_token().await?;
        let client = ctx.create_client(&admin, "Lena Park").await?;

        let (status, created) = ctx
            .call(
                Method::POST,
                "/api/quotes",
                Some(&admin),
                Some(json!({
                    "client_id": id_of(&client)?,
                    "line_items": [
                        { "description": "Relocation package", "quantity": 2, "unit_price_cents": 40_000 }
                    ]
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "create quote: {created}");
        let uri = format!("/api/quotes/{}", id_of(&created["quote"])?);

        let (status, _) = ctx
            .call(Method::POST, &format!("{uri}/convert"), Some(&admin), None)
            .await?;
        assert_eq!(status, StatusCode::CONFLICT, "drafts cannot convert");

        for step in ["send", "accept"] {
            let (status, body) = ctx
                .call(Method::POST, &format!("{uri}/{step}"), Some(&admin), None)
                .await?;
            assert_eq!(status, StatusCode::OK, "{step}: {body}");
        }

        let (status, converted) = ctx
            .call(Method::POST, &format!("{uri}/convert"), Some(&admin), None)
            .await?;
        assert_eq!(status, StatusCode::OK, "convert: {converted}");
        assert_eq!(converted["invoice"]["status"], "draft");
        assert_eq!(converted["invoice"]["total_cents"], 80_000);

        let (status, _) = ctx
            .call(Method::POST, &format!("{uri}/convert"), Some(&admin), None)
            .await?;
        assert_eq!(status, StatusCode::CONFLICT);
        Ok(())
    }
}
