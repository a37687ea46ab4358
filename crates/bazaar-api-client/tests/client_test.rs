use std::io::Write;

use bazaar_api_client::{
    ApiClient, ClientError, ListQuery, MultipartFile, Page, RequestSpec, Resource, SessionStore,
};
use bazaar_core::{ClientConfig, ReplayPolicy, SessionCredential};
use mockito::Matcher;
use reqwest::StatusCode;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

fn client_for(url: &str, policy: ReplayPolicy, session: SessionStore) -> ApiClient {
    let config = ClientConfig {
        replay_policy: policy,
        ..ClientConfig::new(url)
    };
    ApiClient::new(config, session).unwrap()
}

fn logged_in(access: &str, refresh: &str) -> SessionStore {
    SessionStore::with_credential(SessionCredential::new(access, refresh))
}

fn tokens_body(access: &str, refresh: &str) -> String {
    json!({
        "success": true,
        "data": { "access_token": access, "refresh_token": refresh }
    })
    .to_string()
}

#[tokio::test]
async fn test_attaches_bearer_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/users/42")
        .match_header("authorization", "Bearer a-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"success": true, "data": {"id": 42, "name": "Ada"}}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url(), ReplayPolicy::ReturnOriginal, logged_in("a-1", "r-1"));
    let user: serde_json::Value = client.get("/api/v1/users/42", vec![]).await.unwrap();

    assert_eq!(user["name"], "Ada");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_no_header_without_session() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/ping")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(json!({"success": true, "data": "pong"}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url(), ReplayPolicy::ReturnOriginal, SessionStore::new());
    let pong: String = client.get("/api/v1/ping", vec![]).await.unwrap();

    assert_eq!(pong, "pong");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_refresh_success_returns_original_failure() {
    let mut server = mockito::Server::new_async().await;
    let stale = server
        .mock("GET", "/api/v1/sellers/7")
        .match_header("authorization", "Bearer a-old")
        .with_status(401)
        .with_body(json!({"success": false, "message": "jwt expired"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let replay = server
        .mock("GET", "/api/v1/sellers/7")
        .match_header("authorization", "Bearer a-new")
        .with_status(200)
        .with_body(json!({"success": true, "data": {"id": 7}}).to_string())
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/v1/auth/refresh")
        .match_body(Matcher::Json(json!({"refresh_token": "r-old"})))
        .with_status(200)
        .with_body(tokens_body("a-new", "r-new"))
        .expect(1)
        .create_async()
        .await;

    let session = logged_in("a-old", "r-old");
    let client = client_for(&server.url(), ReplayPolicy::ReturnOriginal, session.clone());

    let response = client
        .send(&RequestSpec::get("/api/v1/sellers/7"))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(session.access_token().as_deref(), Some("a-new"));
    assert_eq!(session.refresh_token().as_deref(), Some("r-new"));
    stale.assert_async().await;
    replay.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_refresh_success_can_return_replay() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v1/sellers/7")
        .match_header("authorization", "Bearer a-old")
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("GET", "/api/v1/sellers/7")
        .match_header("authorization", "Bearer a-new")
        .with_status(200)
        .with_body(json!({"success": true, "data": {"id": 7}}).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/api/v1/auth/refresh")
        .with_status(200)
        .with_body(tokens_body("a-new", "r-new"))
        .expect(1)
        .create_async()
        .await;

    let client = client_for(
        &server.url(),
        ReplayPolicy::ReturnReplay,
        logged_in("a-old", "r-old"),
    );

    let seller: serde_json::Value = client.get("/api/v1/sellers/7", vec![]).await.unwrap();
    assert_eq!(seller["id"], 7);
}

#[tokio::test]
async fn test_refresh_failure_clears_session() {
    let mut server = mockito::Server::new_async().await;
    let protected = server
        .mock("GET", "/api/v1/referrals")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/v1/auth/refresh")
        .with_status(401)
        .with_body(json!({"success": false, "message": "refresh token expired"}).to_string())
        .expect(1)
        .create_async()
        .await;

    let session = logged_in("a-old", "r-old");
    let mut changes = session.subscribe();
    let client = client_for(&server.url(), ReplayPolicy::ReturnOriginal, session.clone());

    let err = client
        .get::<serde_json::Value>("/api/v1/referrals", vec![])
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Unauthorized { .. }));
    assert!(session.current().is_none());
    assert!(changes.has_changed().unwrap());
    assert!(changes.borrow_and_update().is_none());
    protected.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_missing_refresh_token_logs_out_without_calling_refresh() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v1/users")
        .with_status(401)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/v1/auth/refresh")
        .expect(0)
        .create_async()
        .await;

    let session = logged_in("a-old", "");
    let client = client_for(&server.url(), ReplayPolicy::ReturnOriginal, session.clone());

    let response = client.send(&RequestSpec::get("/api/v1/users")).await.unwrap();

    assert!(response.is_unauthorized());
    assert!(!session.is_authenticated());
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_non_401_errors_pass_through() {
    let mut server = mockito::Server::new_async().await;
    let failing = server
        .mock("GET", "/api/v1/products/3")
        .with_status(500)
        .with_body("boom")
        .expect(2)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/v1/auth/refresh")
        .expect(0)
        .create_async()
        .await;

    let session = logged_in("a-1", "r-1");
    let client = client_for(&server.url(), ReplayPolicy::ReturnOriginal, session.clone());

    let response = client
        .send(&RequestSpec::get("/api/v1/products/3"))
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    let err = client
        .get::<serde_json::Value>("/api/v1/products/3", vec![])
        .await
        .unwrap_err();
    match err {
        ClientError::Status { status, message } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(session.access_token().as_deref(), Some("a-1"));
    failing.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_concurrent_unauthorized_requests_each_refresh() {
    let mut server = mockito::Server::new_async().await;
    let protected = server
        .mock("GET", "/api/v1/notifications")
        .with_status(401)
        // three originals plus one replay each
        .expect(6)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/v1/auth/refresh")
        .with_status(200)
        .with_body(tokens_body("a-new", "r-new"))
        .expect(3)
        .create_async()
        .await;

    let client = client_for(
        &server.url(),
        ReplayPolicy::ReturnOriginal,
        logged_in("a-old", "r-old"),
    );
    let spec = RequestSpec::get("/api/v1/notifications");

    let results = futures::future::join_all((0..3).map(|_| client.send(&spec))).await;

    for result in results {
        assert!(result.unwrap().is_unauthorized());
    }
    protected.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_upload_file_returns_url() {
    let mut server = mockito::Server::new_async().await;
    let upload = server
        .mock("POST", "/api/v1/upload")
        .match_header("authorization", "Bearer a-1")
        .match_header(
            "content-type",
            Matcher::Regex("multipart/form-data".to_string()),
        )
        .match_body(Matcher::Regex("photo.png".to_string()))
        .with_status(200)
        .with_body(json!({"success": true, "data": "https://cdn.example.com/photo.png"}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url(), ReplayPolicy::ReturnOriginal, logged_in("a-1", "r-1"));
    let url = client
        .upload_file(MultipartFile::new("photo.png", vec![0u8; 16]).with_content_type("image/png"))
        .await
        .unwrap();

    assert_eq!(url, "https://cdn.example.com/photo.png");
    upload.assert_async().await;
}

#[tokio::test]
async fn test_upload_rejected_by_envelope() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/v1/upload")
        .with_status(200)
        .with_body(json!({"success": false, "data": null, "message": "Unsupported file"}).to_string())
        .create_async()
        .await;

    let client = client_for(&server.url(), ReplayPolicy::ReturnOriginal, logged_in("a-1", "r-1"));
    let err = client
        .upload_file(MultipartFile::new("notes.exe", vec![1u8]))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Envelope { ref message } if message == "Unsupported file"));
}

#[tokio::test]
async fn test_login_commits_session() {
    let mut server = mockito::Server::new_async().await;
    let login = server
        .mock("POST", "/api/v1/auth/login")
        .match_body(Matcher::PartialJson(json!({"email": "staff@example.com"})))
        .with_status(200)
        .with_body(tokens_body("a-login", "r-login"))
        .expect(1)
        .create_async()
        .await;

    let session = SessionStore::new();
    let client = client_for(&server.url(), ReplayPolicy::ReturnOriginal, session.clone());

    let credential = assert_ok!(client.login(" staff@example.com ", "hunter2").await);
    assert_eq!(credential.access_token, "a-login");
    assert_eq!(session.refresh_token().as_deref(), Some("r-login"));
    login.assert_async().await;

    client.logout();
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_login_validates_before_sending() {
    let mut server = mockito::Server::new_async().await;
    let login = server
        .mock("POST", "/api/v1/auth/login")
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server.url(), ReplayPolicy::ReturnOriginal, SessionStore::new());
    let err = assert_err!(client.login("nobody", "pw").await);

    assert!(matches!(err, ClientError::InvalidInput(_)));
    login.assert_async().await;
}

#[tokio::test]
async fn test_list_is_cached_until_create_invalidates() {
    let mut server = mockito::Server::new_async().await;
    let list = server
        .mock("GET", "/api/v1/products")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".to_string(), "1".to_string()),
            Matcher::UrlEncoded("limit".to_string(), "20".to_string()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "success": true,
                "data": {"items": [{"id": 1}], "total": 1, "page": 1, "limit": 20}
            })
            .to_string(),
        )
        .expect(2)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/api/v1/products")
        .match_body(Matcher::Json(json!({"name": "Lamp"})))
        .with_status(201)
        .with_body(json!({"success": true, "data": {"id": 2, "name": "Lamp"}}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url(), ReplayPolicy::ReturnOriginal, logged_in("a-1", "r-1"));
    let query = ListQuery::default();

    let first: Page<serde_json::Value> =
        client.list_records(Resource::Products, &query).await.unwrap();
    let second: Page<serde_json::Value> =
        client.list_records(Resource::Products, &query).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.total, 1);

    let created: serde_json::Value = client
        .create_record(Resource::Products, &json!({"name": "Lamp"}))
        .await
        .unwrap();
    assert_eq!(created["id"], 2);

    let _: Page<serde_json::Value> =
        client.list_records(Resource::Products, &query).await.unwrap();

    list.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn test_list_fetched_during_create_is_not_cached() {
    let (started_tx, mut started_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let release_rx = std::sync::Mutex::new(release_rx);
    let stale_page = json!({
        "success": true,
        "data": {"items": [{"id": 1}], "total": 1, "page": 1, "limit": 20}
    })
    .to_string();

    let mut server = mockito::Server::new_async().await;
    let list = server
        .mock("GET", "/api/v1/products")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_chunked_body(move |w| {
            let _ = started_tx.send(());
            release_rx.lock().unwrap().recv().unwrap();
            w.write_all(stale_page.as_bytes())
        })
        .expect(2)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/api/v1/products")
        .with_status(201)
        .with_body(json!({"success": true, "data": {"id": 2}}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url(), ReplayPolicy::ReturnOriginal, logged_in("a-1", "r-1"));

    let read = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .list_records::<serde_json::Value>(Resource::Products, &ListQuery::default())
                .await
        }
    });
    started_rx.recv().await.unwrap();

    let _: serde_json::Value = client
        .create_record(Resource::Products, &json!({"name": "Lamp"}))
        .await
        .unwrap();
    release_tx.send(()).unwrap();
    let page = read.await.unwrap().unwrap();
    assert_eq!(page.total, 1);
    assert!(client.cache().is_empty());

    release_tx.send(()).unwrap();
    let _ = client
        .list_records::<serde_json::Value>(Resource::Products, &ListQuery::default())
        .await
        .unwrap();

    list.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn test_delete_invalidates_record() {
    let mut server = mockito::Server::new_async().await;
    let get = server
        .mock("GET", "/api/v1/sell-offers/5")
        .with_status(200)
        .with_body(json!({"success": true, "data": {"id": 5, "price": 10}}).to_string())
        .expect(2)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/api/v1/sell-offers/5")
        .with_status(200)
        .with_body(json!({"success": true}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url(), ReplayPolicy::ReturnOriginal, logged_in("a-1", "r-1"));

    let _: serde_json::Value = client.get_record(Resource::SellOffers, "5").await.unwrap();
    let _: serde_json::Value = client.get_record(Resource::SellOffers, "5").await.unwrap();
    client.delete_record(Resource::SellOffers, "5").await.unwrap();
    let _: serde_json::Value = client.get_record(Resource::SellOffers, "5").await.unwrap();

    get.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn test_invalid_list_query_is_rejected_locally() {
    let client = client_for(
        "http://127.0.0.1:9",
        ReplayPolicy::ReturnOriginal,
        SessionStore::new(),
    );
    let err = client
        .list_records::<serde_json::Value>(Resource::Users, &ListQuery::default().limit(500))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidInput(_)));
}

#[tokio::test]
async fn test_transport_failure_leaves_session_alone() {
    // Port 1 is reserved and refuses connections.
    let session = logged_in("a-1", "r-1");
    let client = client_for("http://127.0.0.1:1", ReplayPolicy::ReturnOriginal, session.clone());

    let err = client
        .send(&RequestSpec::get("/api/v1/users"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
    assert!(err.is_recoverable());
    assert_eq!(session.access_token().as_deref(), Some("a-1"));
}
