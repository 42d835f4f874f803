//! Firebase adapters against a local stub of Identity Toolkit and Firestore

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};

use kesif::config::{Config, IdentityConfig, ProfileStoreConfig};
use kesif::identity::AuthError;
use kesif::services::{AccountError, AuthRequest, Operation, WriteStep};
use kesif::AppContext;

const USERS: &str = "/v1/projects/demo/databases/(default)/documents/users";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: String,
    authorization: Option<String>,
    body: Value,
}

#[derive(Default)]
struct Backend {
    requests: Vec<Recorded>,
    display_name: Option<String>,
    documents: HashMap<String, Value>,
    fail_create: bool,
    fail_lookup: bool,
    /// Path whose handler sleeps before answering
    stall: Option<&'static str>,
}

type Shared = Arc<Mutex<Backend>>;

fn google_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({"error": {"code": status.as_u16(), "message": message, "errors": []}})),
    )
        .into_response()
}

fn token() -> Response {
    Json(json!({"idToken": "tok-1", "localId": "uid-1", "refreshToken": "r", "expiresIn": "3600"}))
        .into_response()
}

async fn handle(
    State(backend): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().to_string();
    let stall = backend.lock().unwrap().stall == Some(path.as_str());
    if stall {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }

    let query = uri.query().unwrap_or_default().to_string();
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

    let mut backend = backend.lock().unwrap();
    backend.requests.push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    if let Some(call) = path.strip_prefix("/v1/accounts:") {
        return match call {
            "signUp" => token(),
            "signInWithPassword" if body["password"] == "secret1" => token(),
            "signInWithPassword" => {
                google_error(StatusCode::BAD_REQUEST, "INVALID_LOGIN_CREDENTIALS")
            }
            "lookup" if backend.fail_lookup => {
                google_error(StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE")
            }
            "lookup" => Json(json!({"users": [{
                "localId": "uid-1",
                "email": "a@b.com",
                "displayName": backend.display_name,
                "createdAt": "1700000000000"
            }]}))
            .into_response(),
            "update" => {
                backend.display_name = body["displayName"].as_str().map(str::to_string);
                Json(json!({"localId": "uid-1"})).into_response()
            }
            "delete" => Json(json!({})).into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        };
    }

    if path == USERS && method == Method::POST {
        if backend.fail_create {
            return google_error(StatusCode::FORBIDDEN, "Missing or insufficient permissions.");
        }
        let id = query
            .split('&')
            .find_map(|kv| kv.strip_prefix("documentId="))
            .unwrap_or_default()
            .to_string();
        backend.documents.insert(id, body["fields"].clone());
        return Json(body).into_response();
    }

    if let Some(id) = path.strip_prefix(&format!("{USERS}/")) {
        let id = id.to_string();
        return match method {
            Method::GET => match backend.documents.get(&id) {
                Some(fields) => Json(json!({"name": path, "fields": fields})).into_response(),
                None => google_error(StatusCode::NOT_FOUND, "No document to update"),
            },
            Method::PATCH => match backend.documents.get_mut(&id) {
                Some(fields) => {
                    for key in ["firstName", "lastName"] {
                        fields[key] = body["fields"][key].clone();
                    }
                    Json(json!({"name": path, "fields": fields.clone()})).into_response()
                }
                None => google_error(StatusCode::NOT_FOUND, "No document to update"),
            },
            _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        };
    }

    StatusCode::NOT_FOUND.into_response()
}

async fn start(backend: Backend) -> (AppContext, Shared) {
    start_with_timeout(backend, 5).await
}

async fn start_with_timeout(backend: Backend, timeout_secs: u64) -> (AppContext, Shared) {
    let shared: Shared = Arc::new(Mutex::new(backend));
    let app = Router::new().fallback(handle).with_state(shared.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = Config {
        identity: IdentityConfig {
            api_key: "test-key".to_string(),
            auth_base_url: format!("http://{addr}/v1"),
            request_timeout_secs: timeout_secs,
        },
        profile_store: ProfileStoreConfig {
            project_id: "demo".to_string(),
            base_url: format!("http://{addr}/v1"),
            ..ProfileStoreConfig::default()
        },
    };
    (AppContext::firebase(&config).unwrap(), shared)
}

fn requests(shared: &Shared) -> Vec<Recorded> {
    shared.lock().unwrap().requests.clone()
}

fn string_field<'a>(fields: &'a Value, key: &str) -> &'a str {
    fields[key]["stringValue"].as_str().unwrap_or_default()
}

fn existing_account() -> Backend {
    let mut backend = Backend {
        display_name: Some("Ahmet Can Yılmaz".to_string()),
        ..Backend::default()
    };
    backend.documents.insert(
        "uid-1".to_string(),
        json!({
            "email": {"stringValue": "a@b.com"},
            "firstName": {"stringValue": "Ahmet Can"},
            "lastName": {"stringValue": "Yılmaz"}
        }),
    );
    backend
}

#[tokio::test]
async fn test_sign_up_calls_identity_toolkit_then_firestore() {
    let (ctx, shared) = start(Backend::default()).await;

    let snapshot = ctx
        .accounts()
        .authenticate(AuthRequest::sign_up("a@b.com", "secret1", "Ahmet", "Yılmaz"))
        .await
        .unwrap();

    assert_eq!(snapshot.user_id().map(|id| id.as_str()), Some("uid-1"));
    assert_eq!(snapshot.first_name(), Some("Ahmet"));
    assert_eq!(
        snapshot.created_at().map(|t| t.timestamp_millis()),
        Some(1_700_000_000_000)
    );

    let calls = requests(&shared);
    let paths: Vec<&str> = calls.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["/v1/accounts:signUp", "/v1/accounts:lookup", "/v1/accounts:update", USERS]
    );
    assert!(calls[..3].iter().all(|r| r.query == "key=test-key"));
    assert_eq!(calls[0].body["returnSecureToken"], true);
    assert_eq!(calls[2].body["displayName"], "Ahmet Yılmaz");
    assert_eq!(calls[2].body["idToken"], "tok-1");

    let create = &calls[3];
    assert_eq!(create.method, Method::POST);
    assert_eq!(create.query, "documentId=uid-1");
    assert_eq!(create.authorization.as_deref(), Some("Bearer tok-1"));
    assert_eq!(string_field(&create.body["fields"], "email"), "a@b.com");
    assert_eq!(string_field(&create.body["fields"], "firstName"), "Ahmet");
    assert_eq!(string_field(&create.body["fields"], "lastName"), "Yılmaz");
}

#[tokio::test]
async fn test_sign_in_rejection_message_is_passed_through() {
    let (ctx, _shared) = start(Backend::default()).await;

    let err = ctx
        .accounts()
        .authenticate(AuthRequest::sign_in("a@b.com", "wrong-password"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "INVALID_LOGIN_CREDENTIALS");
    assert!(!ctx.session().current().is_authenticated());
}

#[tokio::test]
async fn test_sign_in_reads_names_from_document() {
    let (ctx, shared) = start(existing_account()).await;

    let snapshot = ctx
        .accounts()
        .authenticate(AuthRequest::sign_in("a@b.com", "secret1"))
        .await
        .unwrap();

    assert_eq!(snapshot.first_name(), Some("Ahmet Can"));
    assert_eq!(snapshot.last_name(), Some("Yılmaz"));

    let calls = requests(&shared);
    let get = calls.last().unwrap();
    assert_eq!(get.method, Method::GET);
    assert_eq!(get.path, format!("{USERS}/uid-1"));
    assert_eq!(get.authorization.as_deref(), Some("Bearer tok-1"));
}

#[tokio::test]
async fn test_sign_in_without_document_splits_display_name() {
    let (ctx, _shared) = start(Backend {
        display_name: Some("Ahmet Yılmaz".to_string()),
        ..Backend::default()
    })
    .await;

    let snapshot = ctx
        .accounts()
        .authenticate(AuthRequest::sign_in("a@b.com", "secret1"))
        .await
        .unwrap();

    assert_eq!(snapshot.first_name(), Some("Ahmet"));
    assert_eq!(snapshot.last_name(), Some("Yılmaz"));
}

#[tokio::test]
async fn test_save_profile_patches_name_fields_only() {
    let (ctx, shared) = start(existing_account()).await;
    let accounts = ctx.accounts();
    accounts
        .authenticate(AuthRequest::sign_in("a@b.com", "secret1"))
        .await
        .unwrap();

    let snapshot = accounts.save_profile_edit("Mehmet", "Öz").await.unwrap();

    assert_eq!(snapshot.display_name().as_deref(), Some("Mehmet Öz"));

    let calls = requests(&shared);
    let patch = calls.last().unwrap();
    assert_eq!(patch.method, Method::PATCH);
    assert_eq!(patch.path, format!("{USERS}/uid-1"));
    assert!(patch.query.contains("updateMask.fieldPaths=firstName"));
    assert!(patch.query.contains("updateMask.fieldPaths=lastName"));
    assert!(patch.query.contains("currentDocument.exists=true"));
    assert!(patch.body["fields"].get("email").is_none());

    let backend = shared.lock().unwrap();
    assert_eq!(backend.display_name.as_deref(), Some("Mehmet Öz"));
    assert_eq!(string_field(&backend.documents["uid-1"], "firstName"), "Mehmet");
    assert_eq!(string_field(&backend.documents["uid-1"], "email"), "a@b.com");
}

#[tokio::test]
async fn test_rejected_document_write_deletes_new_account() {
    let (ctx, shared) = start(Backend {
        fail_create: true,
        ..Backend::default()
    })
    .await;

    let err = ctx
        .accounts()
        .authenticate(AuthRequest::sign_up("a@b.com", "secret1", "Ahmet", "Yılmaz"))
        .await
        .unwrap_err();

    match err {
        AccountError::PartialFailure {
            operation,
            step,
            compensated,
            source,
        } => {
            assert_eq!(operation, Operation::SignUp);
            assert_eq!(step, WriteStep::ProfileDocument);
            assert!(compensated);
            assert_eq!(source.to_string(), "Missing or insufficient permissions.");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let calls = requests(&shared);
    let delete = calls.last().unwrap();
    assert_eq!(delete.path, "/v1/accounts:delete");
    assert_eq!(delete.body["idToken"], "tok-1");
    assert!(!ctx.session().current().is_authenticated());
}

#[tokio::test]
async fn test_failed_lookup_after_sign_up_deletes_account() {
    let (ctx, shared) = start(Backend {
        fail_lookup: true,
        ..Backend::default()
    })
    .await;

    let err = ctx
        .accounts()
        .authenticate(AuthRequest::sign_up("a@b.com", "secret1", "Ahmet", "Yılmaz"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AccountError::Auth(AuthError::Rejected(ref message)) if message == "UNAVAILABLE"
    ));

    let calls = requests(&shared);
    let paths: Vec<&str> = calls.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["/v1/accounts:signUp", "/v1/accounts:lookup", "/v1/accounts:delete"]
    );
    assert_eq!(calls[2].body["idToken"], "tok-1");
    assert!(!ctx.session().current().is_authenticated());
}

#[tokio::test]
async fn test_hung_identity_call_times_out() {
    let (ctx, _shared) = start_with_timeout(
        Backend {
            stall: Some("/v1/accounts:signInWithPassword"),
            ..Backend::default()
        },
        1,
    )
    .await;

    let err = ctx
        .accounts()
        .authenticate(AuthRequest::sign_in("a@b.com", "secret1"))
        .await
        .unwrap_err();

    assert!(matches!(err, AccountError::Auth(AuthError::Transport(_))));
    let snapshot = ctx.session().current();
    assert!(!snapshot.is_loading());
    assert!(!snapshot.is_authenticated());
}
