//! Server discovery, version dispatch and the shared request policy.
//!
//! # Design
//! Every protocol step goes through `Exchange`, which builds a fresh request,
//! applies the status and content-type gate, and decodes the body into a
//! `ValueMap`. Version-specific login and signing live behind
//! `ProtocolStrategy`; `Protocols` maps a server's major version to its
//! strategy, so supporting a new version means registering one more entry.

mod v1;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::codec::{self, ValueMap};
use crate::error::{EnrollError, ProtocolError};
use crate::http::{HttpRequest, Transport};

pub use v1::V1;

/// Path of the discovery endpoint, common to every protocol version.
pub const INFORMATION_PATH: &str = "/api/information";

const JSON: &str = "application/json";

/// What the server says about itself during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub major: u32,
    pub minor: u32,
    pub login_url: String,
    pub sign_url: String,
}

impl ServerInfo {
    /// Extract the discovery fields, failing on the first missing one.
    pub fn from_values(values: &ValueMap) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: require(values, "name")?.to_string(),
            major: require_u32(values, "major")?,
            minor: require_u32(values, "minor")?,
            login_url: require(values, "login_url")?.to_string(),
            sign_url: require(values, "sign_url")?.to_string(),
        })
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.name, self.major, self.minor)
    }
}

/// Login credentials handed to a strategy.
#[derive(Clone, Copy)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Look up a required string field.
pub fn require<'v>(values: &'v ValueMap, key: &str) -> Result<&'v str, ProtocolError> {
    values
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| ProtocolError::MissingField(key.to_string()))
}

/// Look up a required field holding an unsigned integer.
pub fn require_u32(values: &ValueMap, key: &str) -> Result<u32, ProtocolError> {
    let raw = require(values, key)?;
    raw.parse().map_err(|_| ProtocolError::InvalidInteger {
        field: key.to_string(),
        value: raw.to_string(),
    })
}

/// One protocol step's view of the server: base URL plus transport.
pub struct Exchange<'a> {
    transport: &'a mut dyn Transport,
    base_url: &'a str,
}

impl<'a> Exchange<'a> {
    pub fn new(transport: &'a mut dyn Transport, base_url: &'a str) -> Self {
        Self { transport, base_url }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` and decode the JSON answer.
    pub fn get(&mut self, path: &str) -> Result<ValueMap, EnrollError> {
        let url = self.url(path);
        debug!(url = %url, "Sent: GET");
        let request = HttpRequest::get(url).header("Accept", JSON);
        self.perform(&request)
    }

    /// POST `parameters` as a JSON object to `path` and decode the answer.
    pub fn post(&mut self, path: &str, parameters: &ValueMap) -> Result<ValueMap, EnrollError> {
        let url = self.url(path);
        let body = codec::encode(parameters);
        debug!(url = %url, body = %codec::encode(&redacted(parameters)), "Sent: POST");
        let request = HttpRequest::post(url, body.into_bytes())
            .header("Accept", JSON)
            .header("Content-Type", JSON)
            .suppress_header("Expect");
        self.perform(&request)
    }

    fn perform(&mut self, request: &HttpRequest) -> Result<ValueMap, EnrollError> {
        let response = self.transport.perform(request)?;

        debug!(status = response.status, "HTTP response code");
        debug!(body = %response.body_text(), "Received");

        if response.status != 200 {
            let body = response.body_text();
            error!(status = response.status, body = %body, "Unexpected HTTP response code");
            return Err(EnrollError::UnexpectedStatus {
                status: response.status,
                body,
            });
        }

        if !is_json(&response.content_type) {
            error!(content_type = %response.content_type, "Unsupported content type received");
            return Err(EnrollError::UnexpectedContentType(response.content_type));
        }

        Ok(codec::decode_bytes(&response.body)?)
    }
}

fn is_json(content_type: &str) -> bool {
    content_type == JSON
}

fn redacted(parameters: &ValueMap) -> ValueMap {
    let mut shown = parameters.clone();
    if let Some(password) = shown.get_mut("password") {
        *password = "********".to_string();
    }
    shown
}

/// Version-specific login and signing.
pub trait ProtocolStrategy: Send + Sync {
    /// Run the login sequence; success leaves the session authenticated.
    fn login(
        &self,
        exchange: &mut Exchange<'_>,
        server: &ServerInfo,
        credentials: Credentials<'_>,
    ) -> Result<(), EnrollError>;

    /// Submit a DER-encoded CSR and return the DER of the signed certificate.
    fn sign(
        &self,
        exchange: &mut Exchange<'_>,
        server: &ServerInfo,
        csr_der: &[u8],
    ) -> Result<Vec<u8>, EnrollError>;
}

/// Registry of supported protocol versions, keyed by major version.
#[derive(Clone)]
pub struct Protocols {
    strategies: BTreeMap<u32, Arc<dyn ProtocolStrategy>>,
}

impl Protocols {
    /// A registry supporting no version at all.
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    pub fn register(
        &mut self,
        major: u32,
        strategy: impl ProtocolStrategy + 'static,
    ) -> &mut Self {
        self.strategies.insert(major, Arc::new(strategy));
        self
    }

    pub fn get(&self, major: u32) -> Option<Arc<dyn ProtocolStrategy>> {
        self.strategies.get(&major).cloned()
    }

    pub fn versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.strategies.keys().copied()
    }
}

impl Default for Protocols {
    fn default() -> Self {
        let mut protocols = Self::empty();
        protocols.register(1, V1);
        protocols
    }
}

impl fmt::Debug for Protocols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.strategies.keys()).finish()
    }
}

/// Fetch and validate the discovery document.
pub(crate) fn discover(exchange: &mut Exchange<'_>) -> Result<ServerInfo, EnrollError> {
    let values = exchange.get(INFORMATION_PATH)?;
    let server = ServerInfo::from_values(&values)?;
    info!(server = %server, "Server version");
    Ok(server)
}
