//! In-process stand-in for the GuinchoLink REST API.
//! Binds 127.0.0.1:0 and counts every call per endpoint.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use guincholink_auth::{ApiClient, ClientConfig, MemoryStore, Slot, TokenStore};
use serde_json::{Value, json};
use url::Url;

pub const PASSWORD: &str = "12345";

struct Tokens {
    /// `None` once the access token has been expired by the test.
    access: Option<String>,
    refresh: String,
    generation: u32,
}

pub struct MockState {
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub resource_calls: AtomicUsize,
    pub refresh_fails: AtomicBool,
    pub logout_fails: AtomicBool,
    pub always_unauthorized: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    tokens: Mutex<Tokens>,
    seen: Mutex<Vec<Option<String>>>,
    clientes: Mutex<Vec<Value>>,
}

pub struct MockApi {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockApi {
    /// Start the server with `A1`/`R1` as the live token pair.
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            resource_calls: AtomicUsize::new(0),
            refresh_fails: AtomicBool::new(false),
            logout_fails: AtomicBool::new(false),
            always_unauthorized: AtomicBool::new(false),
            refresh_delay_ms: AtomicU64::new(0),
            tokens: Mutex::new(Tokens {
                access: Some("A1".into()),
                refresh: "R1".into(),
                generation: 1,
            }),
            seen: Mutex::new(Vec::new()),
            clientes: Mutex::new(vec![json!({ "id": 1, "nome": "Maria" })]),
        });

        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refresh", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/clientes", get(list_clientes).post(create_cliente))
            .route(
                "/clientes/{id}",
                get(get_cliente).put(update_cliente).delete(delete_cliente),
            )
            .route("/servicos", get(servicos_down))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock api");
        let addr = listener.local_addr().expect("mock api address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock api server");
        });

        Self { addr, state }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("mock api url")
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.url()).with_timeout(Duration::from_secs(5))
    }

    pub fn client(&self, store: Arc<MemoryStore>) -> ApiClient {
        ApiClient::connect(self.config(), store)
    }

    /// Reject the current access token from now on, as if it had expired.
    pub fn expire_access(&self) {
        self.state.tokens.lock().unwrap().access = None;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.refresh_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Bearer tokens presented to resource endpoints, in arrival order.
    pub fn seen_tokens(&self) -> Vec<Option<String>> {
        self.state.seen.lock().unwrap().clone()
    }

    pub fn auth_calls(&self) -> usize {
        self.state.login_calls.load(Ordering::SeqCst)
            + self.state.refresh_calls.load(Ordering::SeqCst)
            + self.state.logout_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.auth_calls() + self.state.resource_calls.load(Ordering::SeqCst)
    }
}

/// A store holding the session the mock issues at startup.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.set(Slot::AccessToken, "A1");
    store.set(Slot::RefreshToken, "R1");
    store.set(Slot::UserData, r#"{"id":1,"nome":"Admin","login":"admin"}"#);
    store
}

fn admin(login: &str) -> Value {
    json!({ "id": 1, "nome": "Admin", "login": login })
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);
    let login = body["login"].as_str().unwrap_or_default().to_owned();

    if body["senha"].as_str() != Some(PASSWORD) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Credenciais inválidas" })),
        )
            .into_response();
    }

    let mut tokens = state.tokens.lock().unwrap();
    tokens.access = Some("A1".into());
    tokens.refresh = "R1".into();
    tokens.generation = 1;

    match login.as_str() {
        "incompleto" => Json(json!({ "accessToken": "A1", "refreshToken": "R1" })).into_response(),
        "sem-id" => Json(json!({
            "administrador": { "nome": "Sem Id", "login": login },
            "accessToken": "A1",
            "refreshToken": "R1"
        }))
        .into_response(),
        "envelope" => Json(json!({
            "data": { "administrador": admin(&login), "accessToken": "A1", "refreshToken": "R1" }
        }))
        .into_response(),
        _ => Json(json!({
            "administrador": admin(&login),
            "accessToken": "A1",
            "refreshToken": "R1"
        }))
        .into_response(),
    }
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let mut tokens = state.tokens.lock().unwrap();
    let presented = body["refreshToken"].as_str().unwrap_or_default();
    if state.refresh_fails.load(Ordering::SeqCst) || presented != tokens.refresh {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Refresh token inválido" })),
        )
            .into_response();
    }

    tokens.generation += 1;
    let access = format!("A{}", tokens.generation);
    let rotated = format!("R{}", tokens.generation);
    tokens.access = Some(access.clone());
    tokens.refresh.clone_from(&rotated);

    Json(json!({ "accessToken": access, "refreshToken": rotated })).into_response()
}

async fn logout(State(state): State<Arc<MockState>>) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    if state.logout_fails.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "err": "falha ao encerrar sessão" })),
        )
            .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

fn authorize(state: &MockState, headers: &HeaderMap) -> Result<(), Response> {
    state.resource_calls.fetch_add(1, Ordering::SeqCst);
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned);
    state.seen.lock().unwrap().push(bearer.clone());

    let tokens = state.tokens.lock().unwrap();
    if state.always_unauthorized.load(Ordering::SeqCst)
        || bearer.is_none()
        || bearer != tokens.access
    {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Token inválido ou expirado" })),
        )
            .into_response());
    }
    Ok(())
}

async fn list_clientes(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    Json(Value::Array(state.clientes.lock().unwrap().clone())).into_response()
}

async fn create_cliente(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    if body["nome"].as_str().is_none_or(str::is_empty) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "Erro de validação",
                "errors": [{ "path": "nome", "msg": "Nome é obrigatório" }]
            })),
        )
            .into_response();
    }
    let mut clientes = state.clientes.lock().unwrap();
    body["id"] = json!(clientes.len() + 1);
    clientes.push(body.clone());
    (StatusCode::CREATED, Json(body)).into_response()
}

fn find(clientes: &[Value], id: u64) -> Option<usize> {
    clientes.iter().position(|c| c["id"].as_u64() == Some(id))
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "err": "Cliente não encontrado" })),
    )
        .into_response()
}

async fn get_cliente(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let clientes = state.clientes.lock().unwrap();
    match find(&clientes, id) {
        Some(i) => Json(clientes[i].clone()).into_response(),
        None => not_found(),
    }
}

async fn update_cliente(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(mut body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let mut clientes = state.clientes.lock().unwrap();
    match find(&clientes, id) {
        Some(i) => {
            body["id"] = json!(id);
            clientes[i] = body.clone();
            Json(body).into_response()
        }
        None => not_found(),
    }
}

async fn delete_cliente(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let mut clientes = state.clientes.lock().unwrap();
    match find(&clientes, id) {
        Some(i) => {
            clientes.remove(i);
            StatusCode::NO_CONTENT.into_response()
        }
        None => not_found(),
    }
}

async fn servicos_down(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "err": "Banco de dados indisponível" })),
    )
        .into_response()
}
