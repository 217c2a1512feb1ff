//! Error types for the enrollment client.
//!
//! # Design
//! Each failure mode the caller may want to branch on gets its own variant:
//! transport failures, structural JSON failures, missing or invalid protocol
//! fields, the status/content-type gate, unsupported server versions and
//! certificate decoding. Nothing is retried or swallowed at this layer.

use thiserror::Error;

use crate::cert::CertError;
use crate::codec::CodecError;
use crate::http::TransportError;

/// A well-formed response lacks a field, or holds an unusable value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("missing field \"{0}\"")]
    MissingField(String),

    #[error("field \"{field}\" is not an unsigned integer: {value:?}")]
    InvalidInteger { field: String, value: String },
}

/// Errors returned by `EnrollmentClient` operations.
#[derive(Debug, Error)]
pub enum EnrollError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("unsupported server version {major}.{minor}")]
    UnsupportedServerVersion { major: u32, minor: u32 },

    /// The server answered with something other than `200 OK`.
    #[error("unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("unsupported content type received: {0:?}")]
    UnexpectedContentType(String),

    /// The certificate request could not be DER-encoded.
    #[error("invalid certificate request: {0}")]
    InvalidRequest(CertError),

    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),

    #[error("illegal state: {0}")]
    IllegalState(&'static str),
}

impl EnrollError {
    /// The HTTP status for `UnexpectedStatus`, `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            EnrollError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
