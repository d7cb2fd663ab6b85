use std::sync::Arc;
use std::time::Duration;

use ally_relay::error::Kind;
use ally_relay::relay::{ProxyContent, Relay, RelayConfig, SignParams};
use ally_relay::store::{IntegrationSettings, MemoryAuthorization, MemoryConfigurationStore};
use ally_relay::types::{Course, Rights, Role, Subject};
use httpmock::prelude::*;
use reqwest::StatusCode;
use secrecy::SecretString;

const ACCOUNT_ID: &str = "1";
const COURSE_ID: &str = "10";
const CLIENT_ID: &str = "1";
const SECRET: &str = "s3cr3t-shared-value";
const BASE_URL: &str = "https://ally.local";

struct Fixture {
    relay: Relay,
    store: MemoryConfigurationStore,
    authorization: MemoryAuthorization,
    course: Course,
}

fn fixture_with(config: RelayConfig) -> Fixture {
    let store = MemoryConfigurationStore::new();
    let authorization = MemoryAuthorization::new();
    let relay = Relay::new(
        Arc::new(store.clone()),
        Arc::new(authorization.clone()),
        config,
    )
    .expect("relay");
    Fixture {
        relay,
        store,
        authorization,
        course: Course::new(COURSE_ID, ACCOUNT_ID),
    }
}

fn fixture() -> Fixture {
    fixture_with(RelayConfig::default())
}

impl Fixture {
    fn configure(&self, base_url: &str) {
        let settings =
            IntegrationSettings::configured(CLIENT_ID, SecretString::from(SECRET), base_url)
                .expect("settings");
        self.store.insert(ACCOUNT_ID, settings);
    }

    fn student(&self) -> Subject {
        let subject = Subject::new("20");
        self.authorization.grant(&subject, COURSE_ID, Rights::READ);
        subject
    }

    fn manager(&self) -> Subject {
        let subject = Subject::new("30");
        self.authorization
            .grant(&subject, COURSE_ID, Rights::READ | Rights::CREATE);
        subject
    }
}

#[tokio::test]
async fn enabled_reports_nothing_for_unconfigured_account() -> anyhow::Result<()> {
    let fixture = fixture();

    let response = fixture.relay.enabled(ACCOUNT_ID).await?;
    assert!(!response.enabled, "enabled");
    assert_eq!(response.client_id, None, "client id");
    assert_eq!(response.base_url, None, "base url");

    let json = serde_json::to_value(&response)?;
    assert_eq!(
        json,
        serde_json::json!({ "enabled": false, "clientId": null, "baseUrl": null }),
        "wire shape"
    );
    Ok(())
}

#[tokio::test]
async fn enabled_echoes_configured_values() -> anyhow::Result<()> {
    let fixture = fixture();
    fixture.configure(BASE_URL);

    let response = fixture.relay.enabled(ACCOUNT_ID).await?;
    assert!(response.enabled, "enabled");
    assert_eq!(response.client_id.as_deref(), Some(CLIENT_ID), "client id");
    assert_eq!(response.base_url.as_deref(), Some(BASE_URL), "base url");
    Ok(())
}

#[tokio::test]
async fn sign_requires_enabled_integration() {
    let fixture = fixture();
    let student = fixture.student();

    let err = fixture
        .relay
        .sign(
            Some(&student),
            &fixture.course,
            &SignParams::new("GET", "/api", ""),
        )
        .await
        .expect_err("not enabled");
    assert_eq!(err.kind(), Kind::NotEnabled, "kind");
    assert_eq!(err.message(), "Ally has not been enabled yet", "message");
}

#[tokio::test]
async fn not_enabled_is_checked_before_authorization() {
    let fixture = fixture();

    let err = fixture
        .relay
        .sign(None, &fixture.course, &SignParams::default())
        .await
        .expect_err("not enabled");
    assert_eq!(err.kind(), Kind::NotEnabled, "kind");
}

#[tokio::test]
async fn anonymous_without_access_is_unauthorized() {
    let fixture = fixture();
    fixture.configure(BASE_URL);

    for result in [
        fixture
            .relay
            .sign(None, &fixture.course, &SignParams::new("GET", "/api", ""))
            .await
            .map(|_| ()),
        fixture
            .relay
            .proxy(None, &fixture.course, &SignParams::new("GET", "/api", ""))
            .await
            .map(|_| ()),
    ] {
        let err = result.expect_err("unauthorized");
        assert_eq!(err.kind(), Kind::Unauthorized, "kind");
    }
}

#[tokio::test]
async fn authorization_is_checked_before_parameters() {
    let fixture = fixture();
    fixture.configure(BASE_URL);
    let stranger = Subject::new("99");

    let err = fixture
        .relay
        .sign(Some(&stranger), &fixture.course, &SignParams::default())
        .await
        .expect_err("unauthorized");
    assert_eq!(err.kind(), Kind::Unauthorized, "kind");
}

#[tokio::test]
async fn anonymous_with_public_read_signs_as_student() -> anyhow::Result<()> {
    let fixture = fixture();
    fixture.configure(BASE_URL);
    fixture.authorization.grant_public(COURSE_ID, Rights::READ);

    let response = fixture
        .relay
        .sign(None, &fixture.course, &SignParams::new("GET", "/api/files", ""))
        .await?;
    assert!(response.path.contains("role=student"), "{}", response.path);
    assert!(
        response.path.contains("userId=allowed_anonymous"),
        "{}",
        response.path
    );
    Ok(())
}

#[tokio::test]
async fn sign_returns_metadata_for_get() -> anyhow::Result<()> {
    let fixture = fixture();
    fixture.configure(BASE_URL);
    let student = fixture.student();

    let response = fixture
        .relay
        .sign(
            Some(&student),
            &fixture.course,
            &SignParams::new("GET", "/path/to/ally/api", "fileIds=1,2,3"),
        )
        .await?;

    assert_eq!(response.client_id, CLIENT_ID, "client id");
    assert_eq!(response.base_url, BASE_URL, "base url");
    assert!(response.path.starts_with("/path/to/ally/api?"), "{}", response.path);
    assert!(response.path.contains("fileIds=1%2C2%2C3"), "{}", response.path);
    assert!(response.header.starts_with("OAuth "), "{}", response.header);
    assert!(!response.header.contains(SECRET), "secret leaked");
    assert_eq!(response.body, None, "body");

    let json = serde_json::to_value(&response)?;
    let keys: Vec<&str> = json
        .as_object()
        .map(|object| object.keys().map(String::as_str).collect())
        .unwrap_or_default();
    assert_eq!(keys.len(), 5, "{keys:?}");
    for key in ["clientId", "baseUrl", "path", "header", "body"] {
        assert!(keys.contains(&key), "missing {key}");
    }
    Ok(())
}

#[tokio::test]
async fn manager_signs_post_with_body() -> anyhow::Result<()> {
    let fixture = fixture();
    fixture.configure(BASE_URL);
    let manager = fixture.manager();

    let response = fixture
        .relay
        .sign(
            Some(&manager),
            &fixture.course,
            &SignParams::new("POST", "/api/scan", "fileIds=1"),
        )
        .await?;
    assert_eq!(response.path, "/api/scan", "path");
    let body = response.body.expect("body");
    assert!(body.contains("role=course-manager"), "{body}");
    assert!(body.contains("userId=30"), "{body}");
    Ok(())
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let fixture = fixture();
    fixture.configure(BASE_URL);
    let student = fixture.student();

    let cases = [
        (SignParams::new("DELETE", "/api", ""), Kind::MethodNotAllowed),
        (
            SignParams {
                http_method: None,
                ..SignParams::new("GET", "/api", "")
            },
            Kind::MethodNotAllowed,
        ),
        (
            SignParams {
                http_path: None,
                ..SignParams::new("GET", "/api", "")
            },
            Kind::MissingParameters,
        ),
        (
            SignParams {
                http_parameters: None,
                ..SignParams::new("POST", "/api", "")
            },
            Kind::MissingParameters,
        ),
    ];
    for (params, expected) in cases {
        let err = fixture
            .relay
            .sign(Some(&student), &fixture.course, &params)
            .await
            .expect_err("invalid request");
        assert_eq!(err.kind(), expected, "{params:?}");
    }
}

#[tokio::test]
async fn role_resolution_is_idempotent() -> anyhow::Result<()> {
    let fixture = fixture();
    let student = fixture.student();
    let manager = fixture.manager();

    for (subject, expected) in [
        (Some(&student), Some(Role::Student)),
        (Some(&manager), Some(Role::CourseManager)),
        (None, None),
    ] {
        let first = fixture.relay.resolve_role(subject, &fixture.course).await?;
        let second = fixture.relay.resolve_role(subject, &fixture.course).await?;
        assert_eq!(first, expected, "{subject:?}");
        assert_eq!(first, second, "{subject:?}");
    }
    Ok(())
}

#[tokio::test]
async fn proxy_relays_created_as_json() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/files")
                .query_param("role", "student")
                .query_param("userId", "20")
                .query_param("courseId", COURSE_ID)
                .query_param("fileIds", "1");
            then.status(201)
                .header("content-type", "application/json")
                .body(r#"{"id":1}"#);
        })
        .await;

    let fixture = fixture();
    fixture.configure(&server.base_url());
    let student = fixture.student();

    let response = fixture
        .relay
        .proxy(
            Some(&student),
            &fixture.course,
            &SignParams::new("GET", "/api/files", "fileIds=1"),
        )
        .await?;

    mock.assert_async().await;
    assert_eq!(response.status, StatusCode::CREATED, "status");
    assert_eq!(response.body, r#"{"id":1}"#, "body");
    assert_eq!(response.content, ProxyContent::Json, "content");
    Ok(())
}

#[tokio::test]
async fn proxy_relays_errors_as_text() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/files");
            then.status(500).body("internal failure");
        })
        .await;

    let fixture = fixture();
    fixture.configure(&server.base_url());
    let student = fixture.student();

    let response = fixture
        .relay
        .proxy(
            Some(&student),
            &fixture.course,
            &SignParams::new("GET", "/api/files", ""),
        )
        .await?;

    mock.assert_async().await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR, "status");
    assert_eq!(response.body, "internal failure", "body");
    assert_eq!(response.content, ProxyContent::Text, "content");
    Ok(())
}

#[tokio::test]
async fn proxy_sends_post_form() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/scan")
                .header("content-type", "application/x-www-form-urlencoded");
            then.status(200).body("{}");
        })
        .await;

    let fixture = fixture();
    fixture.configure(&server.base_url());
    let manager = fixture.manager();

    let response = fixture
        .relay
        .proxy(
            Some(&manager),
            &fixture.course,
            &SignParams::new("POST", "/api/scan", "fileIds=1"),
        )
        .await?;

    mock.assert_async().await;
    assert_eq!(response.status, StatusCode::OK, "status");
    assert_eq!(response.content, ProxyContent::Json, "content");
    Ok(())
}

#[tokio::test]
async fn proxy_reports_transport_failure() {
    let fixture = fixture();
    fixture.configure("http://127.0.0.1:1");
    let student = fixture.student();

    let err = fixture
        .relay
        .proxy(
            Some(&student),
            &fixture.course,
            &SignParams::new("GET", "/api/files", ""),
        )
        .await
        .expect_err("connection refused");
    assert_eq!(err.kind(), Kind::RemoteRequestFailed, "kind");
}

#[tokio::test]
async fn proxy_reports_timeout_as_remote_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/slow");
            then.status(200)
                .body("{}")
                .delay(Duration::from_millis(500));
        })
        .await;

    let fixture = fixture_with(
        RelayConfig::builder()
            .timeout(Duration::from_millis(50))
            .build(),
    );
    fixture.configure(&server.base_url());
    let student = fixture.student();

    let err = fixture
        .relay
        .proxy(
            Some(&student),
            &fixture.course,
            &SignParams::new("GET", "/api/slow", ""),
        )
        .await
        .expect_err("timeout");
    assert_eq!(err.kind(), Kind::RemoteRequestFailed, "kind");
}

#[tokio::test]
async fn proxy_relays_redirect_without_following() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let moved = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/moved");
            then.status(302)
                .header("location", "/api/elsewhere")
                .body("moved");
        })
        .await;
    let elsewhere = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/elsewhere");
            then.status(200).body(r#"{"followed":true}"#);
        })
        .await;

    let fixture = fixture();
    fixture.configure(&server.base_url());
    let student = fixture.student();

    let response = fixture
        .relay
        .proxy(
            Some(&student),
            &fixture.course,
            &SignParams::new("GET", "/api/moved", ""),
        )
        .await?;

    moved.assert_async().await;
    assert_eq!(elsewhere.calls_async().await, 0, "redirect not followed");
    assert_eq!(response.status, StatusCode::FOUND, "status");
    assert_eq!(response.body, "moved", "body");
    assert_eq!(response.content, ProxyContent::Text, "content");
    Ok(())
}

#[tokio::test]
async fn proxy_relays_client_errors_as_text() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/missing");
            then.status(404).body(r#"{"error":"no such file"}"#);
        })
        .await;

    let fixture = fixture();
    fixture.configure(&server.base_url());
    let manager = fixture.manager();

    let response = fixture
        .relay
        .proxy(
            Some(&manager),
            &fixture.course,
            &SignParams::new("POST", "/api/missing", "fileIds=1"),
        )
        .await?;

    mock.assert_async().await;
    assert_eq!(response.status, StatusCode::NOT_FOUND, "status");
    assert_eq!(response.body, r#"{"error":"no such file"}"#, "body");
    assert_eq!(response.content, ProxyContent::Text, "content");
    Ok(())
}

#[tokio::test]
async fn proxy_never_leaves_configured_host() {
    let ally = MockServer::start_async().await;
    let attacker = MockServer::start_async().await;
    let stolen = attacker
        .mock_async(|when, then| {
            when.any_request();
            then.status(200).body("{}");
        })
        .await;

    let fixture = fixture();
    fixture.configure(&ally.base_url());
    let student = fixture.student();

    for path in [
        attacker.url("/steal"),
        format!("//{}/steal", attacker.address()),
        format!("/\\{}/steal", attacker.address()),
        "steal".to_owned(),
    ] {
        for method in ["GET", "POST"] {
            let err = fixture
                .relay
                .proxy(
                    Some(&student),
                    &fixture.course,
                    &SignParams::new(method, &path, ""),
                )
                .await
                .expect_err("off-host path");
            assert_eq!(err.kind(), Kind::Validation, "{method} {path}");
        }
    }
    assert_eq!(stolen.calls_async().await, 0, "attacker reached");
}

#[tokio::test]
async fn sign_refuses_absolute_paths() {
    let fixture = fixture();
    fixture.configure(BASE_URL);
    let student = fixture.student();

    let err = fixture
        .relay
        .sign(
            Some(&student),
            &fixture.course,
            &SignParams::new("GET", "https://evil.test/steal", ""),
        )
        .await
        .expect_err("absolute path");
    assert_eq!(err.kind(), Kind::Validation, "kind");
    assert_eq!(
        err.message(),
        "http_path must be an absolute path on the Ally host",
        "message"
    );
}

#[tokio::test]
async fn partial_configuration_reports_enabled_but_cannot_sign() -> anyhow::Result<()> {
    let fixture = fixture();
    let student = fixture.student();
    let mut settings =
        IntegrationSettings::configured(CLIENT_ID, SecretString::from(SECRET), BASE_URL)?;
    settings.secret = None;
    fixture.store.insert(ACCOUNT_ID, settings);

    let response = fixture.relay.enabled(ACCOUNT_ID).await?;
    assert!(response.enabled, "flag only");

    let err = fixture
        .relay
        .sign(
            Some(&student),
            &fixture.course,
            &SignParams::new("GET", "/api", ""),
        )
        .await
        .expect_err("missing secret");
    assert_eq!(err.kind(), Kind::NotEnabled, "kind");
    Ok(())
}
