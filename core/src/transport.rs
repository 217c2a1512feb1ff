//! Blocking HTTP(S) transport backed by `ureq`.
//!
//! # Design
//! The agent is configured once from `ServerConfig` and reused for every
//! request, so the cookie jar carries the server session from the login
//! step to the signing step. Status codes are returned as data; only
//! network, TLS and configuration failures become `TransportError`.

use std::fmt;
use std::time::Duration;

use tracing::{info, warn};
use ureq::tls::{Certificate as TlsCertificate, RootCerts, TlsConfig};
use ureq::{Agent, Proxy};

use crate::config::{ProxySetting, ServerConfig};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};

/// Upper bound on connection establishment.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// `Transport` implementation using a long-lived `ureq::Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(config: &ServerConfig) -> Result<Self, TransportError> {
        let mut builder = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(CONNECT_TIMEOUT));

        match config.user_agent.as_deref() {
            None | Some("") => warn!("Empty user agent specified, using the transport default"),
            Some(user_agent) => {
                info!(user_agent = %user_agent, "User agent set");
                builder = builder.user_agent(user_agent);
            }
        }

        match &config.https_proxy {
            ProxySetting::Unset => {}
            ProxySetting::Disabled => {
                info!("Disabling HTTP(S) proxy");
                builder = builder.proxy(None);
            }
            ProxySetting::Endpoint(endpoint) => {
                info!(proxy = %endpoint, "Setting HTTP(S) proxy");
                let proxy = Proxy::new(endpoint)
                    .map_err(|e| TransportError(format!("invalid proxy {endpoint:?}: {e}")))?;
                builder = builder.proxy(Some(proxy));
            }
        }

        builder = builder.tls_config(tls_config(config)?);

        Ok(Self {
            agent: builder.build().new_agent(),
        })
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

fn tls_config(config: &ServerConfig) -> Result<TlsConfig, TransportError> {
    let mut tls = TlsConfig::builder();

    if config.disable_peer_verification {
        warn!("Peer verification disabled! Connection will be a LOT LESS SECURE");
        return Ok(tls.disable_verification(true).build());
    }

    if let Some(path) = &config.ca_info {
        info!(ca_info = %path.display(), "Setting CA info");
        tls = tls.root_certs(load_root_certs(path)?);
    }

    if config.disable_host_verification {
        // ureq verifies the chain and the host name together.
        warn!("Host verification disabled! Certificate verification is turned off entirely");
        tls = tls.disable_verification(true);
    }

    Ok(tls.build())
}

fn load_root_certs(path: &std::path::Path) -> Result<RootCerts, TransportError> {
    let bundle = std::fs::read(path)
        .map_err(|e| TransportError(format!("failed to read CA bundle {}: {e}", path.display())))?;
    let blocks = pem::parse_many(&bundle)
        .map_err(|e| TransportError(format!("invalid CA bundle {}: {e}", path.display())))?;

    let certs: Vec<TlsCertificate<'static>> = blocks
        .iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .map(|block| TlsCertificate::from_der(block.contents()).to_owned())
        .collect();

    if certs.is_empty() {
        return Err(TransportError(format!(
            "CA bundle {} contains no certificate",
            path.display()
        )));
    }
    Ok(RootCerts::new_with_certs(&certs))
}

impl Transport for UreqTransport {
    fn perform(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let headers = request.headers.iter().filter(|(name, _)| {
            !request
                .suppress_headers
                .iter()
                .any(|suppressed| suppressed.eq_ignore_ascii_case(name))
        });

        let result = match request.method {
            HttpMethod::Get => {
                let mut builder = self.agent.get(&request.url);
                for (name, value) in headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            HttpMethod::Post => {
                let mut builder = self.agent.post(&request.url);
                for (name, value) in headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.send(request.body.as_deref().unwrap_or_default())
            }
        };

        let mut response = result.map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
