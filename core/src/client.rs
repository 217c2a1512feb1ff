//! The enrollment state machine.
//!
//! # Design
//! `EnrollmentClient` walks Uninitialized -> ServerDiscovered ->
//! Authenticated, then issues certificates on demand. Each state change is
//! an explicit call and a failed call never leaves a half-updated session
//! behind: the new session is stored only once login has succeeded.
//!
//! Both operations take `&mut self`; one client drives one enrollment flow.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::cert::{CertificateCodec, X509Codec};
use crate::config::{Protocol, ServerConfig};
use crate::error::EnrollError;
use crate::http::{Transport, TransportError};
use crate::protocol::{self, Credentials, Exchange, ProtocolStrategy, Protocols, ServerInfo};
use crate::transport::UreqTransport;

struct Session {
    server: ServerInfo,
    strategy: Arc<dyn ProtocolStrategy>,
}

/// Enrollment client bound to one server, one transport and one codec.
pub struct EnrollmentClient<T, C = X509Codec> {
    config: ServerConfig,
    transport: T,
    codec: C,
    protocols: Protocols,
    base_url: String,
    session: Option<Session>,
}

impl EnrollmentClient<UreqTransport, X509Codec> {
    /// Build a client talking HTTP(S) through `ureq`.
    pub fn from_config(config: ServerConfig) -> Result<Self, TransportError> {
        let transport = UreqTransport::new(&config)?;
        Ok(Self::new(config, transport, X509Codec))
    }
}

impl<T: Transport, C: CertificateCodec> EnrollmentClient<T, C> {
    pub fn new(config: ServerConfig, transport: T, codec: C) -> Self {
        if config.protocol == Protocol::Http {
            warn!("Current server protocol is HTTP. Your password will be sent in cleartext to the server!");
        }

        let base_url = config.base_url();
        Self {
            config,
            transport,
            codec,
            protocols: Protocols::default(),
            base_url,
            session: None,
        }
    }

    /// Replace the supported protocol versions. Drops any current session.
    pub fn with_protocols(mut self, protocols: Protocols) -> Self {
        self.protocols = protocols;
        self.session = None;
        self
    }

    /// Discover the server, pick its protocol version and log in.
    ///
    /// On failure the previous session, if any, is kept as it was.
    pub fn authenticate(&mut self) -> Result<&ServerInfo, EnrollError> {
        info!(host = %self.config.host, "Getting server information");

        let mut exchange = Exchange::new(&mut self.transport, &self.base_url);
        let server = protocol::discover(&mut exchange)?;

        let strategy = self.protocols.get(server.major).ok_or_else(|| {
            error!(server = %server, "Unsupported server version");
            EnrollError::UnsupportedServerVersion {
                major: server.major,
                minor: server.minor,
            }
        })?;

        let credentials = Credentials {
            username: &self.config.username,
            password: &self.config.password,
        };
        strategy.login(&mut exchange, &server, credentials)?;

        let session = self.session.insert(Session { server, strategy });
        Ok(&session.server)
    }

    /// Submit `request` for signing and return the issued certificate.
    ///
    /// Requires a successful `authenticate`; may be called repeatedly.
    pub fn renew_certificate(&mut self, request: &C::Request) -> Result<C::Certificate, EnrollError> {
        let session = self.session.as_ref().ok_or(EnrollError::IllegalState(
            "renew_certificate called before a successful authenticate",
        ))?;

        let csr_der = self
            .codec
            .request_to_der(request)
            .map_err(EnrollError::InvalidRequest)?;

        let mut exchange = Exchange::new(&mut self.transport, &self.base_url);
        let der = session.strategy.sign(&mut exchange, &session.server, &csr_der)?;

        let certificate = self
            .codec
            .certificate_from_der(&der)
            .map_err(|e| EnrollError::MalformedCertificate(e.to_string()))?;

        info!("Certificate request was signed");
        Ok(certificate)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Server description from the last successful `authenticate`.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.session.as_ref().map(|session| &session.server)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// URL prefix derived from the configured protocol.
    pub fn scheme(&self) -> &'static str {
        self.config.protocol.scheme()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}
