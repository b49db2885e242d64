//! HTTP surface of the backend
//!
//! Public API, the bearer-protected API, and the frontend bundle with
//! history fallback for the page routes.

use crate::auth::require_session;
use crate::controllers::{auth, contact, health};
use crate::pages::View;
use crate::state::AppState;
use eventsite_core::middleware::{BodyLimit, BodyLimitConfig, Cors, Trace, TraceConfig};
use eventsite_core::{handler, App, DynamicHandler, Method, MiddlewareChain, Request, Response, StaticFiles};
use eventsite_router::RouteTable;
use std::future::Future;
use std::sync::Arc;

fn with_state<F, Fut>(state: &Arc<AppState>, f: F) -> DynamicHandler
where
    F: Fn(Arc<AppState>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    let state = state.clone();
    handler(move |req| f(state.clone(), req))
}

/// Assemble the application
pub fn build_app(state: Arc<AppState>, pages: RouteTable<View>) -> eventsite_core::Result<App> {
    let config = &state.config;
    let pages = Arc::new(pages);
    let frontend = StaticFiles::serve(&config.static_dir)
        .history_fallback(move |path| pages.resolve(path).is_some());

    if !frontend.index_exists() {
        tracing::warn!(path = %frontend.index_path().display(), "frontend bundle not found");
    }

    let mut app = App::new()
        .wrap(Trace::new(TraceConfig::new()))
        .wrap(Cors::new(config.cors()))
        .wrap(BodyLimit::new(BodyLimitConfig::new(config.max_body_bytes)))
        .max_body_size(config.max_body_bytes)
        .static_files(frontend.clone());

    let report = Arc::new(health::report(&state, Some(frontend)));
    app.route(
        Method::Get,
        "/api/health",
        handler(move |_req| health::check(report.clone())),
    )?;

    app.route(Method::Post, "/api/auth/login", with_state(&state, auth::login))?;
    app.route(Method::Get, "/api/auth/logout", with_state(&state, auth::logout))?;
    app.route(Method::Post, "/api/contact-requests", with_state(&state, contact::create))?;

    let protected = Arc::new(MiddlewareChain::new().with(require_session(
        state.jwt.clone(),
        state.config.site_id().map(str::to_string),
    )));
    app.route_with(Method::Get, "/api/profile", protected.clone(), with_state(&state, auth::profile))?;
    app.route_with(
        Method::Get,
        "/api/contact-requests",
        protected.clone(),
        with_state(&state, contact::list),
    )?;
    app.route_with(
        Method::Get,
        "/api/contact-requests/:id",
        protected,
        with_state(&state, contact::get),
    )?;

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SiteClaims;
    use crate::config::Config;
    use crate::identity::tests::FakeProvider;
    use crate::identity::DirectoryUser;
    use crate::pages::page_routes;
    use crate::store::{ContactRequest, ContactStore, NewContactRequest, SqliteStore, StoreError};
    use clap::Parser;
    use std::time::{Duration, Instant};
    use eventsite_core::{RequestBuilder, StatusCode};
    use serde_json::{json, Value};

    const SECRET: &str = "test-secret";

    struct Fixture {
        app: App,
        state: Arc<AppState>,
        _dir: tempfile::TempDir,
    }

    fn fixture_with(with_db: bool, extra: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<!doctype html><div id=app></div>").unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/app.js"), "console.log(1)").unwrap();

        let static_dir = dir.path().to_string_lossy().to_string();
        let mut argv = vec![
            "eventsited",
            "--static-dir",
            static_dir.as_str(),
            "--jwt-secret",
            SECRET,
            "--site-id",
            "cc-lippstadt",
            "--auth0-domain",
            "tenant.example",
            "--auth0-client-id",
            "client-1",
        ];
        argv.extend_from_slice(extra);
        let config = Config::try_parse_from(argv).unwrap();

        let store: Option<Arc<dyn ContactStore>> =
            with_db.then(|| Arc::new(SqliteStore::open_in_memory().unwrap()) as Arc<dyn ContactStore>);
        let identity = FakeProvider::default()
            .with_user("admin@example.org", "pw", json!({"role": "admin"}))
            .with_user("member@example.org", "pw", json!({"role": "editor", "sites": ["cc-lippstadt"]}))
            .with_user("stranger@example.org", "pw", json!({"role": "editor", "sites": ["elsewhere"]}));
        let state = Arc::new(AppState::new(config, store).with_identity(Arc::new(identity)));

        let app = build_app(state.clone(), page_routes().unwrap()).unwrap();
        Fixture { app, state, _dir: dir }
    }

    fn fixture() -> Fixture {
        fixture_with(true, &[])
    }

    fn get(path: &str) -> Request {
        RequestBuilder::new(Method::Get, path).build()
    }

    fn post(path: &str, body: Value) -> Request {
        RequestBuilder::new(Method::Post, path)
            .json(&body)
            .remote_addr("198.51.100.4:50000".parse().unwrap())
            .header("User-Agent", "test-agent/1.0")
            .build()
    }

    fn authed(path: &str, token: &str) -> Request {
        RequestBuilder::new(Method::Get, path)
            .header("Authorization", format!("Bearer {token}"))
            .build()
    }

    fn token_for(state: &AppState, metadata: Value) -> String {
        let user = DirectoryUser {
            user_id: "auth0|tester".to_string(),
            email: "tester@example.org".to_string(),
            app_metadata: metadata.as_object().cloned(),
        };
        state.jwt.encode(&SiteClaims::for_user(&user, 1)).unwrap()
    }

    fn body(res: &Response) -> Value {
        res.body_json().unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let f = fixture();
        let res = f.app.handle(get("/api/health")).await;
        assert_eq!(res.status, StatusCode::OK);
        let report = body(&res);
        assert_eq!(report["status"], "healthy");
        assert_eq!(report["service"], "eventsite-server");
    }

    #[tokio::test]
    async fn test_health_without_database() {
        let f = fixture_with(false, &[]);
        let res = f.app.handle(get("/api/health")).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(body(&res)["status"], "degraded");
    }

    /// Store whose ping holds the thread, as a long write would
    struct SlowStore(SqliteStore);

    impl ContactStore for SlowStore {
        fn create(&self, new: NewContactRequest) -> Result<ContactRequest, StoreError> {
            self.0.create(new)
        }

        fn list(&self) -> Result<Vec<ContactRequest>, StoreError> {
            self.0.list()
        }

        fn get(&self, id: i64) -> Result<Option<ContactRequest>, StoreError> {
            self.0.get(id)
        }

        fn ping(&self) -> bool {
            std::thread::sleep(Duration::from_millis(500));
            self.0.ping()
        }
    }

    #[tokio::test]
    async fn test_health_does_not_block_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let static_dir = dir.path().to_string_lossy().to_string();
        let config = Config::try_parse_from(["eventsited", "--static-dir", static_dir.as_str()]).unwrap();
        let store: Arc<dyn ContactStore> = Arc::new(SlowStore(SqliteStore::open_in_memory().unwrap()));
        let app = build_app(Arc::new(AppState::new(config, Some(store))), page_routes().unwrap()).unwrap();

        let (res, waited) = tokio::join!(app.handle(get("/api/health")), async {
            let start = Instant::now();
            tokio::time::sleep(Duration::from_millis(20)).await;
            start.elapsed()
        });
        assert!(waited < Duration::from_millis(400), "runtime stalled for {waited:?}");
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(body(&res)["checks"][0]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_login_success() {
        let f = fixture();
        let res = f
            .app
            .handle(post("/api/auth/login", json!({"email": "member@example.org", "password": "pw"})))
            .await;
        assert_eq!(res.status, StatusCode::OK);

        let login = body(&res);
        assert_eq!(login["user"]["id"], "auth0|member");
        assert_eq!(login["user"]["role"], "editor");
        assert_eq!(login["user"]["sites"], json!(["cc-lippstadt"]));

        let token = login["token"].as_str().unwrap();
        let res = f.app.handle(authed("/api/profile", token)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(body(&res)["user"]["email"], "member@example.org");
    }

    #[tokio::test]
    async fn test_login_errors() {
        let f = fixture();
        let cases = [
            (json!({"email": "not-an-email", "password": "pw"}), 400, "Invalid request format"),
            (json!({"email": "admin@example.org"}), 400, "Invalid request format"),
            (
                json!({"email": "admin@example.org", "password": "nope"}),
                401,
                "Authentication failed: auth0 error: Wrong email or password.",
            ),
            (
                json!({"email": "admin@example.org", "password": " "}),
                401,
                "Authentication failed: auth0 error: Wrong email or password.",
            ),
            (
                json!({"email": "stranger@example.org", "password": "pw"}),
                403,
                "Access denied: Insufficient permissions",
            ),
        ];

        for (payload, status, error) in cases {
            let res = f.app.handle(post("/api/auth/login", payload)).await;
            assert_eq!(res.status.as_u16(), status);
            assert_eq!(body(&res)["error"], error);
        }
    }

    #[tokio::test]
    async fn test_login_without_provider() {
        let dir = tempfile::tempdir().unwrap();
        let static_dir = dir.path().to_string_lossy().to_string();
        let config = Config::try_parse_from(["eventsited", "--static-dir", static_dir.as_str()]).unwrap();
        let state = Arc::new(AppState::new(config, None));
        let app = build_app(state, page_routes().unwrap()).unwrap();

        let res = app
            .handle(post("/api/auth/login", json!({"email": "admin@example.org", "password": "pw"})))
            .await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&res)["error"], "Auth0 configuration missing");

        let res = app.handle(get("/api/auth/logout")).await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_logout_redirect() {
        let f = fixture_with(true, &["--site-url", "https://cc-lippstadt.de"]);
        let res = f.app.handle(get("/api/auth/logout")).await;
        assert_eq!(res.status, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            res.header("location"),
            Some("https://tenant.example/v2/logout?client_id=client-1&returnTo=https%3A%2F%2Fcc-lippstadt.de")
        );
    }

    #[tokio::test]
    async fn test_contact_flow() {
        let f = fixture();
        let res = f
            .app
            .handle(post(
                "/api/contact-requests",
                json!({"name": "Ada", "email": "ada@example.org", "message": "Hallo!", "phone": ""}),
            ))
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        let created = body(&res);
        assert_eq!(created["message"], "Contact request received successfully");
        let id = created["id"].as_i64().unwrap();

        let token = token_for(&f.state, json!({"role": "admin"}));
        let res = f.app.handle(authed(&format!("/api/contact-requests/{id}"), &token)).await;
        assert_eq!(res.status, StatusCode::OK);
        let stored = &body(&res)["request"];
        assert_eq!(stored["name"], "Ada");
        assert_eq!(stored["phone"], Value::Null);
        assert_eq!(stored["ip_address"], "198.51.100.4");
        assert_eq!(stored["user_agent"], "test-agent/1.0");
        assert_eq!(stored["metadata"], json!({}));

        let res = f.app.handle(authed("/api/contact-requests", &token)).await;
        assert_eq!(body(&res)["requests"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_contact_validation() {
        let f = fixture();
        for payload in [
            json!({"email": "ada@example.org", "message": "hi"}),
            json!({"name": "Ada", "email": "nope", "message": "hi"}),
            json!({"name": "Ada", "email": "ada@example.org", "message": ""}),
            json!({"name": "Ada", "email": "a..b@example.org", "message": "hi"}),
            json!({"name": "Ada", "email": "ada@example.org", "message": "hi", "phone": "0".repeat(21)}),
            json!("not an object"),
        ] {
            let res = f.app.handle(post("/api/contact-requests", payload)).await;
            assert_eq!(res.status, StatusCode::BAD_REQUEST);
            assert_eq!(body(&res)["error"], "Invalid request. Name, email, and message are required.");
        }
    }

    #[tokio::test]
    async fn test_contact_accepts_whitespace_fields() {
        let f = fixture();
        let res = f
            .app
            .handle(post(
                "/api/contact-requests",
                json!({"name": "A", "email": "a@example.org", "message": " "}),
            ))
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_contact_without_database() {
        let f = fixture_with(false, &[]);
        let res = f
            .app
            .handle(post(
                "/api/contact-requests",
                json!({"name": "Ada", "email": "ada@example.org", "message": "hi"}),
            ))
            .await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&res)["error"], "Database connection not available");
    }

    #[tokio::test]
    async fn test_protected_routes() {
        let f = fixture();

        let res = f.app.handle(get("/api/contact-requests")).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(body(&res)["error"], "Authorization token required");

        let res = f.app.handle(authed("/api/profile", "garbage")).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(body(&res)["error"], "Invalid token");

        let outsider = token_for(&f.state, json!({"role": "editor", "sites": ["elsewhere"]}));
        let res = f.app.handle(authed("/api/profile", &outsider)).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);

        let member = token_for(&f.state, json!({"sites": ["cc-lippstadt"]}));
        for path in ["/api/contact-requests/999", "/api/contact-requests/abc"] {
            let res = f.app.handle(authed(path, &member)).await;
            assert_eq!(res.status, StatusCode::NOT_FOUND);
            assert_eq!(body(&res)["error"], "Contact request not found");
        }
    }

    #[tokio::test]
    async fn test_pages_and_assets() {
        let f = fixture();

        for path in ["/", "/events"] {
            let res = f.app.handle(get(path)).await;
            assert_eq!(res.status, StatusCode::OK, "{path}");
            assert!(res.body_string().unwrap().contains("id=app"));
        }

        let res = f.app.handle(get("/assets/app.js")).await;
        assert_eq!(res.status, StatusCode::OK);

        let res = f.app.handle(get("/nowhere")).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);

        let res = f.app.handle(get("/api/nowhere")).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(body(&res)["error"], "Not found");
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let f = fixture();
        let res = f.app.handle(RequestBuilder::new(Method::Delete, "/api/contact-requests").build()).await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("allow"), Some("GET, HEAD, POST"));
    }

    #[tokio::test]
    async fn test_cors() {
        let f = fixture();
        let preflight = RequestBuilder::new(Method::Options, "/api/contact-requests")
            .header("Origin", "http://localhost:5173")
            .header("Access-Control-Request-Method", "POST")
            .build();
        let res = f.app.handle(preflight).await;
        assert_eq!(res.status, StatusCode::NO_CONTENT);
        assert_eq!(res.header("access-control-allow-origin"), Some("http://localhost:5173"));

        let foreign = RequestBuilder::new(Method::Get, "/api/health")
            .header("Origin", "https://evil.example")
            .build();
        assert_eq!(f.app.handle(foreign).await.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_request_id_and_body_limit() {
        let f = fixture_with(true, &["--max-body-bytes", "64"]);
        let res = f
            .app
            .handle(post(
                "/api/contact-requests",
                json!({"name": "Ada", "email": "ada@example.org", "message": "x".repeat(100)}),
            ))
            .await;
        assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(res.header("x-request-id").is_some());
    }
}
