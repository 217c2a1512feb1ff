//! Shared fakes for the engine tests.
//!
//! `ScriptedTransport` answers requests from a queue of canned responses and
//! records every request it sees, so tests can assert on both the outcome
//! and the exact sequence of HTTP calls.

#![allow(dead_code)]

use std::collections::VecDeque;

use enroll_core::cert::CertError;
use enroll_core::{
    CertificateCodec, EnrollmentClient, HttpRequest, HttpResponse, Protocol, ServerConfig,
    Transport, TransportError,
};

pub const HOST: &str = "enroll.test";

pub struct ScriptedTransport {
    responses: VecDeque<Result<HttpResponse, TransportError>>,
    pub requests: Vec<HttpRequest>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            responses: VecDeque::new(),
            requests: Vec::new(),
        }
    }

    pub fn push(&mut self, response: HttpResponse) -> &mut Self {
        self.responses.push_back(Ok(response));
        self
    }

    pub fn push_json(&mut self, body: &str) -> &mut Self {
        self.push(HttpResponse::json(body))
    }

    pub fn push_status(&mut self, status: u16, body: &str) -> &mut Self {
        self.push(HttpResponse {
            status,
            content_type: "application/json".to_string(),
            body: body.as_bytes().to_vec(),
        })
    }

    pub fn push_error(&mut self, message: &str) -> &mut Self {
        self.responses
            .push_back(Err(TransportError(message.to_string())));
        self
    }

    pub fn remaining(&self) -> usize {
        self.responses.len()
    }

    /// `(method, url)` of every request seen so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.requests
            .iter()
            .map(|r| (r.method.as_str().to_string(), r.url.clone()))
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn perform(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.push(request.clone());
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("no scripted response left".to_string())))
    }
}

/// Codec that treats CSRs and certificates as raw DER bytes.
pub struct RawCodec;

impl CertificateCodec for RawCodec {
    type Request = Vec<u8>;
    type Certificate = Vec<u8>;

    fn request_to_der(&self, request: &Vec<u8>) -> Result<Vec<u8>, CertError> {
        if request.is_empty() {
            return Err(CertError::Der("empty request".to_string()));
        }
        Ok(request.clone())
    }

    fn certificate_from_der(&self, der: &[u8]) -> Result<Vec<u8>, CertError> {
        Ok(der.to_vec())
    }
}

pub fn config() -> ServerConfig {
    let mut config = ServerConfig::new(HOST, "alice", "s3cret");
    config.protocol = Protocol::Http;
    config
}

pub fn url(path: &str) -> String {
    format!("http://{HOST}{path}")
}

pub fn information(major: &str) -> String {
    format!(
        r#"{{"name":"srv","major":"{major}","minor":"0","login_url":"/l","sign_url":"/s"}}"#
    )
}

/// Discovery, challenge and login answers of a successful v1 login.
pub fn script_login(transport: &mut ScriptedTransport) {
    transport
        .push_json(&information("1"))
        .push_json(r#"{"challenge":"abc"}"#)
        .push_json("{}");
}

pub fn raw_client(transport: ScriptedTransport) -> EnrollmentClient<ScriptedTransport, RawCodec> {
    EnrollmentClient::new(config(), transport, RawCodec)
}

fn params(common_name: &str) -> rcgen::CertificateParams {
    let mut params = rcgen::CertificateParams::new(vec![common_name.to_string()]).unwrap();
    let mut dn = rcgen::DistinguishedName::new();
    dn.push(rcgen::DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params
}

/// DER of a freshly generated CSR for `common_name`.
pub fn csr_der(common_name: &str) -> Vec<u8> {
    let key = rcgen::KeyPair::generate().unwrap();
    params(common_name).serialize_request(&key).unwrap().der().to_vec()
}

/// DER of a freshly generated self-signed certificate for `common_name`.
pub fn certificate_der(common_name: &str) -> Vec<u8> {
    let key = rcgen::KeyPair::generate().unwrap();
    params(common_name).self_signed(&key).unwrap().der().to_vec()
}
