//! HTTP surface: the dashboard API and the SIMPUS webhook receiver.
//!
//! Authentication, permission and scope checks are composed here, at the
//! routing boundary; the store only ever sees an [`AccessFilter`](crate::auth::AccessFilter).

mod cookies;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::TokenService;
use crate::config::Config;
use crate::store::Store;
use crate::webhook::WebhookVerifier;

pub use handlers::{
    dashboard_summary, health, ingestion_logs, list_users, login, logout, me,
    puskesmas_screening, refresh, screening_webhook, HealthResponse, SessionResponse,
    WebhookResponse,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub tokens: TokenService,
    pub webhook: WebhookVerifier,
}

impl AppState {
    pub fn new(config: Config, store: Store, tokens: TokenService, webhook: WebhookVerifier) -> Self {
        Self {
            config: Arc::new(config),
            store,
            tokens,
            webhook,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/me", get(me))
        .route("/api/dashboard/summary", get(dashboard_summary))
        .route("/api/puskesmas/:id/screening", get(puskesmas_screening))
        .route("/api/ingestion-logs", get(ingestion_logs))
        .route("/api/users", get(list_users))
        .route("/api/webhooks/screening", post(screening_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use axum::{
        body::Body,
        http::{
            header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE, COOKIE, SET_COOKIE},
            Request, StatusCode,
        },
        response::Response,
    };
    use chrono::Utc;
    use flate2::{write::GzEncoder, Compression};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{hash_password, RoleCode};
    use crate::config::Environment;
    use crate::store::{testing::seeded, AuditAction, NewUser, Puskesmas};
    use crate::webhook::{signature_header, SIGNATURE_HEADER};

    const JWT_SECRET: &str = "router-test-secret-at-least-32-characters";
    const WEBHOOK_SECRET: &str = "simpus-shared-secret";
    const PASSWORD: &str = "rahasia-123";

    struct Harness {
        app: Router,
        store: Store,
        sukamaju: Puskesmas,
        cibodas: Puskesmas,
    }

    fn config() -> Config {
        Config {
            port: 0,
            database_path: ":memory:".to_string(),
            environment: Environment::Development,
            jwt_secret: Some(JWT_SECRET.to_string()),
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            auth_cookie_name: "auth-token".to_string(),
            refresh_cookie_name: "refresh-token".to_string(),
            webhook_signature_max_age: 300,
        }
    }

    fn harness() -> Harness {
        let (store, sukamaju, cibodas) = seeded();
        let hash = hash_password(PASSWORD).unwrap();

        let users = [
            ("kadis@dinkes.go.id", RoleCode::KepalaDinas, None),
            ("admin@dinkes.go.id", RoleCode::AdminDinas, None),
            ("staf@skm.go.id", RoleCode::StaffPuskesmas, Some(sukamaju.id.clone())),
            ("kapus@skm.go.id", RoleCode::KepalaPuskesmas, Some(sukamaju.id.clone())),
            ("staf@cbd.go.id", RoleCode::StaffPuskesmas, Some(cibodas.id.clone())),
        ];
        for (email, role, puskesmas_id) in users {
            store
                .create_user(NewUser {
                    email: email.to_string(),
                    name: email.to_string(),
                    password_hash: hash.clone(),
                    role_code: role,
                    puskesmas_id,
                    wilayah_id: None,
                })
                .unwrap();
        }

        let config = config();
        let tokens = TokenService::new(JWT_SECRET).unwrap();
        let webhook = WebhookVerifier::new(WEBHOOK_SECRET, config.webhook_signature_max_age).unwrap();
        let app = router(AppState::new(config, store.clone(), tokens, webhook));

        Harness {
            app,
            store,
            sukamaju,
            cibodas,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_as(uri: &str, token: &str) -> Request<Body> {
        Request::get(uri)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    async fn sign_in(app: &Router, email: &str) -> Value {
        let response = send(app, post_json("/api/auth/login", json!({"email": email, "password": PASSWORD}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    async fn token_for(app: &Router, email: &str) -> String {
        sign_in(app, email).await["token"].as_str().unwrap().to_string()
    }

    fn screening_body(puskesmas_code: &str, batch_id: &str) -> Vec<u8> {
        json!({
            "batchId": batch_id,
            "puskesmasCode": puskesmas_code,
            "month": 3,
            "year": 2024,
            "items": [
                {"kategori": "SD", "sasaran": 10, "diperiksa": 8, "perluPerawatan": 2},
                {"kategori": "SMP", "sasaran": 10, "diperiksa": 8, "perluPerawatan": 2},
                {"kategori": "SMA", "sasaran": 10, "diperiksa": 8, "perluPerawatan": 2}
            ]
        })
        .to_string()
        .into_bytes()
    }

    fn signed_webhook(body: Vec<u8>, timestamp: i64) -> Request<Body> {
        let signature = signature_header(WEBHOOK_SECRET.as_bytes(), timestamp, &body).unwrap();
        Request::post("/api/webhooks/screening")
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .unwrap()
    }

    async fn wait_for_audit(store: &Store, user_id: &str, action: AuditAction) -> i64 {
        for _ in 0..50 {
            let count = store.count_audit(user_id, action).unwrap();
            if count > 0 {
                return count;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        0
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let response = send(&h.app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_login_issues_session_and_cookies() {
        let h = harness();
        let response = send(
            &h.app,
            post_json("/api/auth/login", json!({"email": "Staf@SKM.go.id", "password": PASSWORD})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        let session = cookies.iter().find(|c| c.starts_with("auth-token=")).unwrap();
        assert!(session.contains("HttpOnly"));
        assert!(session.contains("SameSite=Lax"));
        assert!(!session.contains("Secure"));
        assert!(cookies.iter().any(|c| c.starts_with("refresh-token=")));

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["roleCode"], "STAFF_PUSKESMAS");
        assert_eq!(body["user"]["puskesmasId"], h.sukamaju.id.as_str());
        assert_eq!(
            body["user"]["permissions"],
            json!(["VIEW_DASHBOARD", "VIEW_OWN_PUSKESMAS", "SYNC_DATA"])
        );

        let user_id = body["user"]["userId"].as_str().unwrap();
        assert_eq!(wait_for_audit(&h.store, user_id, AuditAction::Login).await, 1);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials_uniformly() {
        let h = harness();
        for (email, password) in [
            ("staf@skm.go.id", "wrong"),
            ("nobody@dinkes.go.id", PASSWORD),
        ] {
            let response = send(
                &h.app,
                post_json("/api/auth/login", json!({"email": email, "password": password})),
            )
            .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(body_json(response).await["error"], "Unauthorized");
        }
    }

    #[tokio::test]
    async fn test_login_inactive_user() {
        let h = harness();
        h.store
            .lock()
            .unwrap()
            .execute("UPDATE users SET is_active = 0 WHERE email = 'staf@skm.go.id'", [])
            .unwrap();
        let response = send(
            &h.app,
            post_json("/api/auth/login", json!({"email": "staf@skm.go.id", "password": PASSWORD})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_validation() {
        let h = harness();
        let response = send(&h.app, post_json("/api/auth/login", json!({"email": " "}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["details"][0]["field"], "email");
        assert_eq!(body["details"][1]["field"], "password");
    }

    #[tokio::test]
    async fn test_me_with_header_and_cookie() {
        let h = harness();
        let token = token_for(&h.app, "kadis@dinkes.go.id").await;

        let by_header = send(&h.app, get_as("/api/auth/me", &token)).await;
        assert_eq!(by_header.status(), StatusCode::OK);
        assert_eq!(body_json(by_header).await["user"]["roleCode"], "KEPALA_DINAS");

        let by_cookie = send(
            &h.app,
            Request::get("/api/auth/me")
                .header(COOKIE, format!("auth-token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(by_cookie.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_routes_require_credential() {
        let h = harness();
        for uri in ["/api/auth/me", "/api/dashboard/summary", "/api/ingestion-logs", "/api/users"] {
            let response = send(&h.app, Request::get(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }

        let forged = send(&h.app, get_as("/api/auth/me", "not.a.jwt")).await;
        assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_always_succeeds_and_clears_cookies() {
        let h = harness();
        let anonymous = send(&h.app, Request::post("/api/auth/logout").body(Body::empty()).unwrap()).await;
        assert_eq!(anonymous.status(), StatusCode::OK);
        let cleared = anonymous
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter(|v| v.to_str().unwrap().contains("Max-Age=0"))
            .count();
        assert_eq!(cleared, 2);

        let session = sign_in(&h.app, "kadis@dinkes.go.id").await;
        let token = session["token"].as_str().unwrap();
        let response = send(
            &h.app,
            Request::post("/api/auth/logout")
                .header(AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let user_id = session["user"]["userId"].as_str().unwrap();
        assert_eq!(wait_for_audit(&h.store, user_id, AuditAction::Logout).await, 1);
    }

    #[tokio::test]
    async fn test_refresh_from_body_and_cookie() {
        let h = harness();
        let session = sign_in(&h.app, "kapus@skm.go.id").await;
        let refresh_token = session["refreshToken"].as_str().unwrap().to_string();

        let from_body = send(
            &h.app,
            post_json("/api/auth/refresh", json!({"refreshToken": refresh_token})),
        )
        .await;
        assert_eq!(from_body.status(), StatusCode::OK);
        let body = body_json(from_body).await;
        assert_eq!(body["user"]["roleCode"], "KEPALA_PUSKESMAS");

        let from_cookie = send(
            &h.app,
            Request::post("/api/auth/refresh")
                .header(COOKIE, format!("refresh-token={}", refresh_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(from_cookie.status(), StatusCode::OK);

        let user_id = session["user"]["userId"].as_str().unwrap();
        assert!(wait_for_audit(&h.store, user_id, AuditAction::RefreshToken).await >= 1);
    }

    #[tokio::test]
    async fn test_refresh_rejects_session_token_and_garbage() {
        let h = harness();
        let session_token = token_for(&h.app, "kapus@skm.go.id").await;

        for token in [session_token.as_str(), "garbage"] {
            let response = send(
                &h.app,
                post_json("/api/auth/refresh", json!({"refreshToken": token})),
            )
            .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let missing = send(&h.app, Request::post("/api/auth/refresh").body(Body::empty()).unwrap()).await;
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_puskesmas_staff_sees_own_facility_only() {
        let h = harness();
        let token = token_for(&h.app, "staf@skm.go.id").await;

        let own = send(
            &h.app,
            get_as(&format!("/api/puskesmas/{}/screening", h.sukamaju.id), &token),
        )
        .await;
        assert_eq!(own.status(), StatusCode::OK);
        assert_eq!(body_json(own).await["puskesmas"]["code"], "PKM-SKM");

        let other = send(
            &h.app,
            get_as(&format!("/api/puskesmas/{}/screening", h.cibodas.id), &token),
        )
        .await;
        assert_eq!(other.status(), StatusCode::FORBIDDEN);

        let other_summary = send(
            &h.app,
            get_as(
                &format!("/api/dashboard/summary?puskesmasId={}", h.cibodas.id),
                &token,
            ),
        )
        .await;
        assert_eq!(other_summary.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_detail_unknown_puskesmas_for_district_user() {
        let h = harness();
        let token = token_for(&h.app, "kadis@dinkes.go.id").await;
        let response = send(&h.app, get_as("/api/puskesmas/missing/screening", &token)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_then_scoped_dashboard() {
        let h = harness();
        let now = Utc::now().timestamp();
        send(&h.app, signed_webhook(screening_body("PKM-SKM", "SKM-03"), now)).await;
        send(&h.app, signed_webhook(screening_body("PKM-CBD", "CBD-03"), now)).await;

        let kadis = token_for(&h.app, "kadis@dinkes.go.id").await;
        let response = send(&h.app, get_as("/api/dashboard/summary?month=3&year=2024", &kadis)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["scope"], json!({}));
        assert_eq!(body["categories"].as_array().unwrap().len(), 3);
        assert_eq!(body["categories"][0]["puskesmasCount"], 2);
        assert_eq!(body["categories"][0]["sasaran"], 20);

        let staff = token_for(&h.app, "staf@skm.go.id").await;
        let response = send(&h.app, get_as("/api/dashboard/summary?month=3&year=2024", &staff)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["scope"]["puskesmasId"], h.sukamaju.id.as_str());
        assert_eq!(body["categories"][0]["puskesmasCount"], 1);
        assert_eq!(body["categories"][0]["sasaran"], 10);

        let user_id = h
            .store
            .find_user_by_email("staf@skm.go.id")
            .unwrap()
            .unwrap()
            .id;
        assert_eq!(
            wait_for_audit(&h.store, &user_id, AuditAction::ViewDashboard).await,
            1
        );
    }

    #[tokio::test]
    async fn test_dashboard_rejects_bad_month() {
        let h = harness();
        let token = token_for(&h.app, "kadis@dinkes.go.id").await;
        let response = send(&h.app, get_as("/api/dashboard/summary?month=13&year=2024", &token)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["details"][0]["field"], "month");
    }

    #[tokio::test]
    async fn test_webhook_applies_once() {
        let h = harness();
        let now = Utc::now().timestamp();

        let first = send(&h.app, signed_webhook(screening_body("PKM-SKM", "SIMPUS-2024-03"), now)).await;
        assert_eq!(first.status(), StatusCode::OK);
        let first = body_json(first).await;
        assert_eq!(first["success"], true);
        assert_eq!(first["duplicate"], false);
        assert_eq!(first["summary"]["rowsWritten"], 3);
        assert_eq!(
            first["summary"]["totals"],
            json!({"sasaran": 30, "diperiksa": 24, "perluPerawatan": 6})
        );

        let replay = send(&h.app, signed_webhook(screening_body("PKM-SKM", "SIMPUS-2024-03"), now)).await;
        assert_eq!(replay.status(), StatusCode::OK);
        let replay = body_json(replay).await;
        assert_eq!(replay["duplicate"], true);
        assert_eq!(replay["ingestionId"], first["ingestionId"]);
        assert!(replay.get("summary").is_none());

        let token = token_for(&h.app, "staf@skm.go.id").await;
        let logs = body_json(send(&h.app, get_as("/api/ingestion-logs", &token)).await).await;
        let logs = logs["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["status"], "processed");

        let rows = body_json(
            send(
                &h.app,
                get_as(&format!("/api/puskesmas/{}/screening", h.sukamaju.id), &token),
            )
            .await,
        )
        .await;
        assert_eq!(rows["rows"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_webhook_gzip_body() {
        let h = harness();
        let body = screening_body("PKM-CBD", "CBD-GZ");
        let now = Utc::now().timestamp();
        let signature = signature_header(WEBHOOK_SECRET.as_bytes(), now, &body).unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&body).unwrap();
        let compressed = encoder.finish().unwrap();

        let response = send(
            &h.app,
            Request::post("/api/webhooks/screening")
                .header(CONTENT_TYPE, "application/json")
                .header(CONTENT_ENCODING, "gzip")
                .header(SIGNATURE_HEADER, signature)
                .body(Body::from(compressed))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["duplicate"], false);
    }

    #[tokio::test]
    async fn test_webhook_rejects_tampered_stale_and_unsigned() {
        let h = harness();
        let now = Utc::now().timestamp();

        let body = screening_body("PKM-SKM", "B-T");
        let signature = signature_header(WEBHOOK_SECRET.as_bytes(), now, &body).unwrap();
        let mut tampered = body.clone();
        let last = tampered.len() - 2;
        tampered[last] = b' ';
        let response = send(
            &h.app,
            Request::post("/api/webhooks/screening")
                .header(SIGNATURE_HEADER, signature)
                .body(Body::from(tampered))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let stale = send(&h.app, signed_webhook(screening_body("PKM-SKM", "B-S"), now - 301)).await;
        assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

        let unsigned = send(
            &h.app,
            Request::post("/api/webhooks/screening")
                .body(Body::from(screening_body("PKM-SKM", "B-U")))
                .unwrap(),
        )
        .await;
        assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

        let logs = h.store.list_ingestion_logs(&Default::default(), 10).unwrap();
        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn test_webhook_validation_and_unknown_facility() {
        let h = harness();
        let now = Utc::now().timestamp();

        let invalid = json!({
            "batchId": "B-V",
            "puskesmasCode": "PKM-SKM",
            "month": 0,
            "year": 2024,
            "items": [{"kategori": "SD", "sasaran": -1, "diperiksa": 0, "perluPerawatan": 0}]
        });
        let response = send(&h.app, signed_webhook(invalid.to_string().into_bytes(), now)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let fields: Vec<Value> = body_json(response).await["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].clone())
            .collect();
        assert_eq!(fields, vec![json!("month"), json!("items[0].sasaran")]);

        let unknown = send(&h.app, signed_webhook(screening_body("PKM-NONE", "B-X"), now)).await;
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(unknown).await["details"][0]["field"], "puskesmasCode");
    }

    #[tokio::test]
    async fn test_ingestion_logs_and_users_are_scoped() {
        let h = harness();
        let now = Utc::now().timestamp();
        send(&h.app, signed_webhook(screening_body("PKM-SKM", "SKM-1"), now)).await;
        send(&h.app, signed_webhook(screening_body("PKM-CBD", "CBD-1"), now)).await;

        let admin = token_for(&h.app, "admin@dinkes.go.id").await;
        let logs = body_json(send(&h.app, get_as("/api/ingestion-logs?limit=10", &admin)).await).await;
        assert_eq!(logs["logs"].as_array().unwrap().len(), 2);

        let users = body_json(send(&h.app, get_as("/api/users", &admin)).await).await;
        let emails: Vec<&str> = users["users"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["email"].as_str().unwrap())
            .collect();
        assert_eq!(
            emails,
            vec!["admin@dinkes.go.id", "kapus@skm.go.id", "staf@cbd.go.id", "staf@skm.go.id"]
        );

        let kapus = token_for(&h.app, "kapus@skm.go.id").await;
        let users = body_json(send(&h.app, get_as("/api/users", &kapus)).await).await;
        let emails: Vec<&str> = users["users"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["email"].as_str().unwrap())
            .collect();
        assert_eq!(emails, vec!["kapus@skm.go.id", "staf@skm.go.id"]);

        let staff = token_for(&h.app, "staf@skm.go.id").await;
        let forbidden = send(&h.app, get_as("/api/users", &staff)).await;
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let kadis = token_for(&h.app, "kadis@dinkes.go.id").await;
        let no_sync = send(&h.app, get_as("/api/ingestion-logs", &kadis)).await;
        assert_eq!(no_sync.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_facility_role_without_facility_sees_nothing() {
        let h = harness();
        let now = Utc::now().timestamp();
        send(&h.app, signed_webhook(screening_body("PKM-SKM", "SKM-1"), now)).await;

        h.store
            .create_user(NewUser {
                email: "yatim@pkm.go.id".to_string(),
                name: "Tanpa Puskesmas".to_string(),
                password_hash: hash_password(PASSWORD).unwrap(),
                role_code: RoleCode::StaffPuskesmas,
                puskesmas_id: None,
                wilayah_id: None,
            })
            .unwrap();
        let token = token_for(&h.app, "yatim@pkm.go.id").await;

        for uri in ["/api/ingestion-logs", "/api/dashboard/summary"] {
            let response = send(&h.app, get_as(uri, &token)).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
        }
    }
}
