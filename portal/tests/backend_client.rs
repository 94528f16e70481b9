use portal::PortalError;
use portal::api::{AuthApi, BackendClient, FunctionsApi, Query, StorageApi, TableApi};
use reqwest::Method;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client(server: &MockServer) -> BackendClient {
    BackendClient::new(format!("{}/", server.uri()), "anon-key".into()).unwrap()
}

#[tokio::test]
async fn test_select_renders_filters_and_anon_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/notices"))
        .and(query_param("select", "*"))
        .and(query_param("sector", "eq.clinico"))
        .and(query_param("order", "created_at.desc"))
        .and(query_param("limit", "5"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }, { "id": 2 }])))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server).await;
    let rows = api
        .select(
            "notices",
            &Query::new().eq("sector", "clinico").order("created_at", false).limit(5),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_session_token_replaces_anon_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/messages"))
        .and(header("authorization", "Bearer user-token"))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!({ "content": "oi" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": "m1", "content": "oi" }])))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server).await;
    api.set_access_token(Some("user-token".into()));
    let rows = api.insert("messages", json!({ "content": "oi" })).await.unwrap();

    assert_eq!(rows[0]["id"], "m1");
}

#[tokio::test]
async fn test_backend_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/events"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;

    let api = client(&server).await;
    let err = api
        .update("events", &Query::new().eq("id", "e1"), json!({ "title": "x" }))
        .await
        .unwrap_err();

    match err {
        PortalError::Backend { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "duplicate key value violates unique constraint");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_refresh_token_expires_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid Refresh Token: Already Used"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server).await;
    let err = api.refresh_session("used-token").await.unwrap_err();

    assert!(matches!(err, PortalError::SessionExpired));
}

#[tokio::test]
async fn test_password_sign_in_stamps_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(body_json(json!({ "email": "ana@clinica.test", "password": "segredo1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3600,
            "user": { "id": "6f0c4a8e-2d7b-4a61-9c53-1b2f7f3a9d10", "email": "ana@clinica.test" }
        })))
        .mount(&server)
        .await;

    let api = client(&server).await;
    let session = api
        .sign_in_with_password("ana@clinica.test", "segredo1")
        .await
        .unwrap();

    assert_eq!(session.access_token, "at");
    assert!(session.expires_at.is_some());
    assert!(!session.is_expired(chrono::Utc::now()));
}

#[tokio::test]
async fn test_functions_require_a_session() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/functions/v1/manage-users"))
        .and(header("authorization", "Bearer admin-token"))
        .and(body_json(json!({ "userId": "u1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server).await;
    let err = api
        .invoke("manage-users", Method::DELETE, json!({ "userId": "u1" }))
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::NotAuthenticated));

    api.set_access_token(Some("admin-token".into()));
    let response = api
        .invoke("manage-users", Method::DELETE, json!({ "userId": "u1" }))
        .await
        .unwrap();
    assert_eq!(response["success"], true);
}

#[tokio::test]
async fn test_storage_remove_sends_prefixes() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/object/documents"))
        .and(body_json(json!({ "prefixes": ["clinico/1_ata.pdf"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server).await;
    api.remove("documents", &["clinico/1_ata.pdf".to_string()])
        .await
        .unwrap();

    assert_eq!(
        api.public_url("documents", "clinico/1_ata.pdf"),
        format!("{}/storage/v1/object/public/documents/clinico/1_ata.pdf", server.uri())
    );
}
