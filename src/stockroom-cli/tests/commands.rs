use std::sync::Arc;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use stockroom_cli::{App, ClientConfig, Command, Outcome, TerminalUi};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig {
        base_url: server.uri(),
        ephemeral: true,
        redirect_delay_ms: 0,
        utc_offset_hours: 0,
        ..ClientConfig::default()
    }
}

fn app(config: ClientConfig) -> App {
    let ui = Arc::new(TerminalUi::with_writer(Box::new(std::io::sink()), false));
    App::new(config, ui).unwrap()
}

async fn run(app: &App, command: Command) -> (Outcome, String) {
    let mut out = Vec::new();
    let outcome = app.run(command, &mut out).await.unwrap();
    (outcome, String::from_utf8(out).unwrap())
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/dashboard")
                .append_header("set-cookie", "access_token=cli-token; Path=/")
                .append_header("set-cookie", "refresh_token=cli-refresh; HttpOnly; Path=/"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_caches_token() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let app = app(config_for(&server));
    let (outcome, _) = run(
        &app,
        Command::Login {
            username: Some("clerk".to_string()),
            password: Some(SecretString::from("secret")),
        },
    )
    .await;

    assert_eq!(outcome, Outcome::Success);
    assert!(app.manager().state().has_token());
}

#[tokio::test]
async fn test_login_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let app = app(config_for(&server));
    let (outcome, _) = run(
        &app,
        Command::Login {
            username: Some("clerk".to_string()),
            password: Some(SecretString::from("wrong")),
        },
    )
    .await;

    assert_eq!(outcome, Outcome::Failure);
    assert!(!app.manager().state().has_token());
    assert!(app.ui().active_notifications()[0].message.contains("Invalid"));
}

#[tokio::test]
async fn test_login_without_password_is_an_error() {
    let server = MockServer::start().await;
    let app = app(config_for(&server));

    let mut out = Vec::new();
    let result = app
        .run(
            Command::Login {
                username: Some("clerk".to_string()),
                password: None,
            },
            &mut out,
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_whoami_shows_admin_commands_for_admins() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/user/me"))
        .and(header("authorization", "Bearer cli-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "username": "admin",
            "email": null,
            "full_name": "Administrator",
            "is_admin": true,
            "is_approved": true,
            "created_at": "2025-01-02T03:04:05"
        })))
        .mount(&server)
        .await;

    let config = ClientConfig {
        username: Some("admin".to_string()),
        password: Some(SecretString::from("admin123")),
        ..config_for(&server)
    };
    let app = app(config);
    let (outcome, out) = run(&app, Command::Whoami).await;

    assert_eq!(outcome, Outcome::Success);
    assert!(out.contains("Username:  admin"));
    assert!(out.contains("Joined:    2025. 01. 02. 03:04"));
    assert!(out.contains("Admin commands:"));
}

#[tokio::test]
async fn test_whoami_hides_admin_commands_for_staff() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/user/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 2,
            "username": "clerk",
            "is_admin": false,
            "is_approved": true
        })))
        .mount(&server)
        .await;

    let config = ClientConfig {
        username: Some("clerk".to_string()),
        password: Some(SecretString::from("secret")),
        ..config_for(&server)
    };
    let app = app(config);
    let (outcome, out) = run(&app, Command::Whoami).await;

    assert_eq!(outcome, Outcome::Success);
    assert!(out.contains("Role:      staff"));
    assert!(!out.contains("Admin commands:"));
}

#[tokio::test]
async fn test_status_prints_both_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/token-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": {"exists": true, "expired": true, "expiry_time": "2020-01-01T00:00:00"},
            "refresh_token": {"exists": false, "expired": false}
        })))
        .mount(&server)
        .await;

    let app = app(config_for(&server));
    let (outcome, out) = run(&app, Command::Status { ensure: false }).await;

    assert_eq!(outcome, Outcome::Success);
    assert_eq!(
        out,
        "Access:  expired since 2020. 01. 01. 00:00\nRefresh: missing\n"
    );
}

#[tokio::test]
async fn test_status_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/token-status"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let app = app(config_for(&server));
    let (outcome, out) = run(&app, Command::Status { ensure: true }).await;

    assert_eq!(outcome, Outcome::Failure);
    assert_eq!(out, "Token status unknown\n");
    assert!(app.ui().navigated_to().is_none());
}

#[tokio::test]
async fn test_request_prints_json_body() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/suppliers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig {
        username: Some("clerk".to_string()),
        password: Some(SecretString::from("secret")),
        ..config_for(&server)
    };
    let app = app(config);
    let (outcome, out) = run(
        &app,
        Command::Request {
            method: "post".to_string(),
            path: "/api/suppliers".to_string(),
            body: Some(r#"{"name": "Acme"}"#.to_string()),
        },
    )
    .await;

    assert_eq!(outcome, Outcome::Success);
    assert_eq!(out, "{\n  \"id\": 3\n}\n");
}

#[tokio::test]
async fn test_request_with_invalid_body_is_rejected_before_sending() {
    let server = MockServer::start().await;
    let app = app(config_for(&server));

    let mut out = Vec::new();
    let result = app
        .run(
            Command::Request {
                method: "POST".to_string(),
                path: "/api/suppliers".to_string(),
                body: Some("{not json".to_string()),
            },
            &mut out,
        )
        .await;

    assert!(result.is_err());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_request_session_expiry_redirects_to_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/refresh-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(config_for(&server));
    app.manager().state().set_token("stale");

    let (outcome, out) = run(
        &app,
        Command::Request {
            method: "GET".to_string(),
            path: "/api/products".to_string(),
            body: None,
        },
    )
    .await;

    assert_eq!(outcome, Outcome::Failure);
    assert!(out.is_empty());
    assert!(!app.manager().state().has_token());
    assert_eq!(app.ui().navigated_to().as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_products_render_stock_badges() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Bolt", "category": "parts", "price": 120.0, "stock_quantity": 3},
            {"id": 2, "name": "Nut", "category": "parts", "price": 80.5, "stock_quantity": 2500}
        ])))
        .mount(&server)
        .await;

    let config = ClientConfig {
        username: Some("clerk".to_string()),
        password: Some(SecretString::from("secret")),
        ..config_for(&server)
    };
    let app = app(config);
    let (outcome, out) = run(&app, Command::Products).await;

    assert_eq!(outcome, Outcome::Success);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("[low]"));
    assert!(lines[1].contains("2,500"));
    assert!(lines[1].ends_with("[sufficient]"));
}

#[tokio::test]
async fn test_products_still_unauthorized_after_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/refresh-token"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/")
                .append_header("set-cookie", "access_token=fresh; Path=/"),
        )
        .mount(&server)
        .await;

    let app = app(config_for(&server));
    app.manager().state().set_token("stale");

    let (outcome, out) = run(&app, Command::Products).await;

    assert_eq!(outcome, Outcome::Failure);
    assert!(out.is_empty());
    assert!(app.manager().state().has_token());
    assert!(app.ui().navigated_to().is_none());
    assert!(
        app.ui().active_notifications()[0]
            .message
            .contains("Not authorized")
    );
}

#[tokio::test]
async fn test_products_session_ended() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/refresh-token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let app = app(config_for(&server));
    app.manager().state().set_token("stale");

    let (outcome, out) = run(&app, Command::Products).await;

    assert_eq!(outcome, Outcome::Failure);
    assert!(out.is_empty());
    assert_eq!(app.ui().navigated_to().as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_logout_clears_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/"))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(config_for(&server));
    app.manager().state().set_token("cli-token");

    let (outcome, _) = run(&app, Command::Logout).await;

    assert_eq!(outcome, Outcome::Success);
    assert!(!app.manager().state().has_token());
    assert_eq!(app.ui().navigated_to().as_deref(), Some("/"));
}

#[tokio::test]
async fn test_watch_stops_when_session_ends() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/token-status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "no_token", "message": "No token"})),
        )
        .mount(&server)
        .await;

    let app = app(config_for(&server));
    app.manager().state().set_token("cli-token");

    let (outcome, out) = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        run(
            &app,
            Command::Watch {
                interval: Some(1),
                no_auto_refresh: false,
            },
        ),
    )
    .await
    .expect("watch should end with the session");

    assert_eq!(outcome, Outcome::Failure);
    assert!(out.contains("Access:  missing"));
    assert!(!app.manager().state().has_token());
    assert_eq!(app.ui().navigated_to().as_deref(), Some("/login"));
}
