//! Certificate and certificate-request encoding.
//!
//! # Design
//! The protocol engine only moves DER bytes around; what a CSR or a
//! certificate *is* belongs to a `CertificateCodec`. `X509Codec` is the
//! default codec: it validates DER with `x509-parser` and keeps the original
//! bytes, so a decoded certificate always re-encodes to exactly what the
//! server sent.

use thiserror::Error;
use x509_parser::prelude::*;

const CSR_PEM_TAG: &str = "CERTIFICATE REQUEST";
const CERTIFICATE_PEM_TAG: &str = "CERTIFICATE";

/// Errors raised while encoding or decoding certificate artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertError {
    #[error("invalid PEM: {0}")]
    Pem(String),

    #[error("unexpected PEM block {found:?}, expected {expected:?}")]
    UnexpectedPemTag { expected: &'static str, found: String },

    #[error("invalid DER: {0}")]
    Der(String),

    #[error("{0} trailing bytes after DER structure")]
    TrailingData(usize),
}

/// DER conversion for the CSRs the engine submits and the certificates it
/// receives.
pub trait CertificateCodec {
    type Request;
    type Certificate;

    fn request_to_der(&self, request: &Self::Request) -> Result<Vec<u8>, CertError>;

    fn certificate_from_der(&self, der: &[u8]) -> Result<Self::Certificate, CertError>;
}

/// A PKCS#10 certificate signing request, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    der: Vec<u8>,
    subject: String,
}

impl CertificateRequest {
    pub fn from_der(der: &[u8]) -> Result<Self, CertError> {
        let (rest, csr) =
            X509CertificationRequest::from_der(der).map_err(|e| CertError::Der(e.to_string()))?;
        if !rest.is_empty() {
            return Err(CertError::TrailingData(rest.len()));
        }
        let subject = csr.certification_request_info.subject.to_string();
        Ok(Self {
            der: der.to_vec(),
            subject,
        })
    }

    pub fn from_pem(text: &str) -> Result<Self, CertError> {
        Self::from_der(&pem_contents(text, CSR_PEM_TAG)?)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn to_der(&self) -> Vec<u8> {
        self.der.clone()
    }

    pub fn to_pem(&self) -> String {
        ::pem::encode(&::pem::Pem::new(CSR_PEM_TAG, self.der.clone()))
    }
}

/// A signed X.509 certificate.
///
/// Holds the DER bytes it was decoded from alongside the fields worth
/// showing to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    serial: String,
    not_before: i64,
    not_after: i64,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self, CertError> {
        let (rest, cert) =
            X509Certificate::from_der(der).map_err(|e| CertError::Der(e.to_string()))?;
        if !rest.is_empty() {
            return Err(CertError::TrailingData(rest.len()));
        }
        let validity = cert.validity();
        Ok(Self {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial: cert.raw_serial_as_string(),
            not_before: validity.not_before.timestamp(),
            not_after: validity.not_after.timestamp(),
        })
    }

    pub fn from_pem(text: &str) -> Result<Self, CertError> {
        Self::from_der(&pem_contents(text, CERTIFICATE_PEM_TAG)?)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Serial number as colon-separated hex.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Start of validity, seconds since the Unix epoch.
    pub fn not_before(&self) -> i64 {
        self.not_before
    }

    /// End of validity, seconds since the Unix epoch.
    pub fn not_after(&self) -> i64 {
        self.not_after
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_der(&self) -> Vec<u8> {
        self.der.clone()
    }

    pub fn to_pem(&self) -> String {
        ::pem::encode(&::pem::Pem::new(CERTIFICATE_PEM_TAG, self.der.clone()))
    }
}

/// Default codec backed by `x509-parser`.
#[derive(Debug, Clone, Copy, Default)]
pub struct X509Codec;

impl CertificateCodec for X509Codec {
    type Request = CertificateRequest;
    type Certificate = Certificate;

    fn request_to_der(&self, request: &CertificateRequest) -> Result<Vec<u8>, CertError> {
        Ok(request.to_der())
    }

    fn certificate_from_der(&self, der: &[u8]) -> Result<Certificate, CertError> {
        Certificate::from_der(der)
    }
}

fn pem_contents(text: &str, expected: &'static str) -> Result<Vec<u8>, CertError> {
    let block = ::pem::parse(text).map_err(|e| CertError::Pem(e.to_string()))?;
    if block.tag() != expected {
        return Err(CertError::UnexpectedPemTag {
            expected,
            found: block.tag().to_string(),
        });
    }
    Ok(block.into_contents())
}
