//! Reference enrollment server speaking protocol 1.0.
//!
//! Every request and response body is a flat JSON object of strings. Login
//! is a two-step challenge exchange; a successful login sets a `session`
//! cookie that the signing endpoint requires.

pub mod ca;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::prelude::*;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};
use uuid::Uuid;

pub use ca::{CaError, CertificateAuthority};

pub const SERVER_NAME: &str = "mock-enrollment-server";
pub const LOGIN_PATH: &str = "/api/login";
pub const SIGN_PATH: &str = "/api/sign";

const SESSION_COOKIE: &str = "session";

/// Upper bound on outstanding challenges and on live sessions; the oldest
/// entry is evicted first.
pub const MAX_PENDING: usize = 1024;

/// Flat string map, the only body shape the protocol uses.
pub type Values = BTreeMap<String, String>;

type ApiError = (StatusCode, Json<Values>);

pub struct ServerState {
    users: HashMap<String, String>,
    challenges: RwLock<VecDeque<String>>,
    /// `(token, username)`, oldest first.
    sessions: RwLock<VecDeque<(String, String)>>,
    ca: CertificateAuthority,
}

impl ServerState {
    /// State with the given `(username, password)` accounts and a fresh CA.
    pub fn new(users: &[(&str, &str)]) -> Result<Self, CaError> {
        Ok(Self {
            users: users
                .iter()
                .map(|(name, password)| (name.to_string(), password.to_string()))
                .collect(),
            challenges: RwLock::new(VecDeque::new()),
            sessions: RwLock::new(VecDeque::new()),
            ca: CertificateAuthority::generate("Mock Enrollment CA")?,
        })
    }

    pub fn ca(&self) -> &CertificateAuthority {
        &self.ca
    }

    async fn issue_challenge(&self) -> String {
        let challenge = Uuid::new_v4().to_string();
        let mut challenges = self.challenges.write().await;
        if challenges.len() == MAX_PENDING {
            challenges.pop_front();
        }
        challenges.push_back(challenge.clone());
        challenge
    }

    /// Consume `challenge`; false if it was never issued or already used.
    async fn take_challenge(&self, challenge: &str) -> bool {
        let mut challenges = self.challenges.write().await;
        match challenges.iter().position(|c| c == challenge) {
            Some(index) => {
                challenges.remove(index);
                true
            }
            None => false,
        }
    }

    async fn open_session(&self, username: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        if sessions.len() == MAX_PENDING {
            sessions.pop_front();
        }
        sessions.push_back((token.clone(), username.to_string()));
        token
    }

    async fn session_user(&self, token: &str) -> Option<String> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, username)| username.clone())
    }
}

pub type SharedState = Arc<ServerState>;

pub fn app(state: SharedState) -> Router {
    Router::new()
        .route("/api/information", get(information))
        .route(LOGIN_PATH, get(login_challenge).post(login))
        .route(SIGN_PATH, post(sign))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: SharedState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

fn values<const N: usize>(entries: [(&str, String); N]) -> Values {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(values([("error", message.to_string())])))
}

/// Decode a request body as a flat string map; any failure is a 400.
fn parse_body(body: &[u8]) -> Result<Values, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            &format!("invalid request body: {e}"),
        )
    })
}

fn field<'a>(body: &'a Values, key: &str) -> Result<&'a str, ApiError> {
    body.get(key).map(String::as_str).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            &format!("missing field \"{key}\""),
        )
    })
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token)
}

async fn information() -> Json<Values> {
    Json(values([
        ("name", SERVER_NAME.to_string()),
        ("major", "1".to_string()),
        ("minor", "0".to_string()),
        ("login_url", LOGIN_PATH.to_string()),
        ("sign_url", SIGN_PATH.to_string()),
    ]))
}

async fn login_challenge(State(state): State<SharedState>) -> Json<Values> {
    Json(values([("challenge", state.issue_challenge().await)]))
}

async fn login(State(state): State<SharedState>, body: Bytes) -> Result<Response, ApiError> {
    let body = parse_body(&body)?;
    let challenge = field(&body, "challenge")?;
    let username = field(&body, "username")?;
    let password = field(&body, "password")?;

    if !state.take_challenge(challenge).await {
        warn!(username = %username, "Unknown or reused login challenge");
        return Err(api_error(StatusCode::UNAUTHORIZED, "invalid challenge"));
    }

    if state.users.get(username).map(String::as_str) != Some(password) {
        warn!(username = %username, "Invalid credentials");
        return Err(api_error(StatusCode::UNAUTHORIZED, "invalid credentials"));
    }

    let token = state.open_session(username).await;
    info!(username = %username, "User logged in");

    let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(values([("username", username.to_string())])),
    )
        .into_response())
}

async fn sign(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Values>, ApiError> {
    let username = match session_token(&headers) {
        Some(token) => state.session_user(token).await,
        None => None,
    }
    .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "not authenticated"))?;

    let body = parse_body(&body)?;
    let encoded = field(&body, "certificate_request")?;
    let csr_der = BASE64_STANDARD
        .decode(encoded)
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "certificate_request is not base64"))?;

    let cert_der = state.ca.sign_csr_der(&csr_der).map_err(|e| {
        warn!(username = %username, error = %e, "Rejected certificate request");
        api_error(StatusCode::BAD_REQUEST, &e.to_string())
    })?;

    info!(username = %username, "Certificate issued");
    Ok(Json(values([(
        "certificate",
        BASE64_STANDARD.encode(cert_der),
    )])))
}
