use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use gatehouse_api::app::{self, services};
use gatehouse_api::middleware::SESSION_HEADER;
use gatehouse_infra::{BootstrapAdmin, GatehouseConfig, LocalPasswordVerifier, PermissionSpec};

const ADMIN_USER: &str = "root";
const ADMIN_PASSWORD: &str = "root-pw";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(config: GatehouseConfig) -> Self {
        // Same router as prod, cheap hashing, ephemeral port.
        let local = Arc::new(LocalPasswordVerifier::with_cost(8, 1, 1).expect("argon2 params"));
        let services = services::build_services_with(&config, local)
            .await
            .expect("services");
        let app = app::router(services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    async fn with_admin() -> Self {
        Self::spawn(GatehouseConfig {
            permissions: vec![PermissionSpec {
                id: "DB_CONNECT".to_string(),
                category: None,
                description: None,
            }],
            bootstrap_admin: Some(BootstrapAdmin {
                user: ADMIN_USER.to_string(),
                password: ADMIN_PASSWORD.to_string(),
            }),
            ..GatehouseConfig::default()
        })
        .await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One caller: keeps the session token between requests.
struct Caller<'a> {
    client: reqwest::Client,
    server: &'a TestServer,
    token: Option<String>,
}

impl<'a> Caller<'a> {
    fn new(server: &'a TestServer) -> Self {
        Self {
            client: reqwest::Client::new(),
            server,
            token: None,
        }
    }

    async fn query(&mut self, field: &str, args: Value) -> (StatusCode, Value) {
        let mut req = self
            .client
            .post(format!("{}/api/query", self.server.base_url))
            .json(&json!({ "field": field, "args": args }));
        if let Some(token) = &self.token {
            req = req.header(SESSION_HEADER, token);
        }
        let res = req.send().await.unwrap();

        let issued = res
            .headers()
            .get(SESSION_HEADER)
            .expect("session header echoed")
            .to_str()
            .unwrap()
            .to_string();
        self.token = Some(issued);

        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn login(&mut self, user: &str, password: &str) -> (StatusCode, Value) {
        self.query(
            "authLogin",
            json!({ "provider": "local", "credentials": { "user": user, "password": password } }),
        )
        .await
    }
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::with_admin().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_caller_cannot_administer() {
    let srv = TestServer::with_admin().await;
    let mut anon = Caller::new(&srv);

    let (status, body) = anon.query("createUser", json!({ "name": "mallory" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let mut admin = Caller::new(&srv);
    admin.login(ADMIN_USER, ADMIN_PASSWORD).await;
    let (status, body) = admin.query("listUsers", json!({ "filter": "mallory" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn bad_password_is_rejected_and_session_stays_anonymous() {
    let srv = TestServer::with_admin().await;
    let mut caller = Caller::new(&srv);

    let (status, body) = caller.login(ADMIN_USER, "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");

    let (status, body) = caller.query("sessionUser", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], Value::Null);
}

#[tokio::test]
async fn admin_grants_role_and_user_sees_permission() {
    let srv = TestServer::with_admin().await;
    let mut admin = Caller::new(&srv);

    let (status, me) = admin.login(ADMIN_USER, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["name"], ADMIN_USER);

    let (status, created) = admin.query("createUser", json!({ "name": "alice" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["data"]["name"], "alice");

    let (status, dup) = admin.query("createUser", json!({ "name": "alice" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(dup["error"], "conflict");

    for (field, args) in [
        (
            "setUserCredentials",
            json!({ "provider": "local", "user": "alice", "credentials": { "password": "wonderland" } }),
        ),
        ("createRole", json!({ "name": "dba" })),
        ("setRolePermissions", json!({ "role": "dba", "permissions": ["DB_CONNECT"] })),
        ("grantUserRole", json!({ "user": "alice", "role": "dba" })),
    ] {
        let (status, body) = admin.query(field, args).await;
        assert_eq!(status, StatusCode::OK, "{field}: {body}");
    }

    let mut alice = Caller::new(&srv);
    let (status, me) = alice.login("alice", "wonderland").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["permissions"], json!(["DB_CONNECT"]));

    let (status, _) = admin.query("revokeUserRole", json!({ "user": "alice", "role": "dba" })).await;
    assert_eq!(status, StatusCode::OK);

    let (_, me) = alice.query("sessionUser", json!({})).await;
    assert_eq!(me["data"]["permissions"], json!([]));

    let (status, _) = admin.query("deleteUser", json!({ "name": "alice" })).await;
    assert_eq!(status, StatusCode::OK);
    let (_, me) = alice.query("sessionUser", json!({})).await;
    assert_eq!(me["data"], Value::Null);
}

#[tokio::test]
async fn role_management_switch_surfaces_unsupported() {
    let srv = TestServer::spawn(GatehouseConfig {
        role_management: false,
        bootstrap_admin: Some(BootstrapAdmin {
            user: ADMIN_USER.to_string(),
            password: ADMIN_PASSWORD.to_string(),
        }),
        ..GatehouseConfig::default()
    })
    .await;
    let mut admin = Caller::new(&srv);
    admin.login(ADMIN_USER, ADMIN_PASSWORD).await;

    let (status, body) = admin.query("createRole", json!({ "name": "dba" })).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["error"], "unsupported_operation");

    let (status, _) = admin.query("listRoles", json!({})).await;
    assert_eq!(status, StatusCode::OK);
}
