//! Certificate enrollment client.
//!
//! # Overview
//! Discovers an enrollment server's protocol version, logs in with a
//! challenge/password exchange over HTTP(S), and submits certificate
//! signing requests to obtain signed X.509 certificates.
//!
//! # Design
//! - `EnrollmentClient` is the state machine; `authenticate` must succeed
//!   before `renew_certificate` can be called.
//! - The network sits behind the `Transport` trait and certificate encoding
//!   behind `CertificateCodec`, so the engine can be driven by scripted
//!   fakes. `UreqTransport` and `X509Codec` are the production versions.
//! - Protocol versions are `ProtocolStrategy` values registered in
//!   `Protocols`; version 1 is built in.
//! - Every request and response body is a flat JSON object of strings,
//!   handled by the `codec` module.

pub mod cert;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod protocol;
pub mod transport;

pub use cert::{CertError, Certificate, CertificateCodec, CertificateRequest, X509Codec};
pub use client::EnrollmentClient;
pub use codec::{CodecError, ValueMap};
pub use config::{ConfigError, Protocol, ProxySetting, ServerConfig};
pub use error::{EnrollError, ProtocolError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
pub use protocol::{Credentials, Exchange, ProtocolStrategy, Protocols, ServerInfo, V1};
pub use transport::UreqTransport;
