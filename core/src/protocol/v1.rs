//! Protocol version 1: challenge/password login and base64 DER signing.

use base64::prelude::*;
use tracing::{debug, info};

use super::{require, Credentials, Exchange, ProtocolStrategy, ServerInfo};
use crate::codec::ValueMap;
use crate::error::EnrollError;

/// Version 1 of the enrollment protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct V1;

impl ProtocolStrategy for V1 {
    fn login(
        &self,
        exchange: &mut Exchange<'_>,
        server: &ServerInfo,
        credentials: Credentials<'_>,
    ) -> Result<(), EnrollError> {
        let values = exchange.get(&server.login_url)?;
        let challenge = require(&values, "challenge")?;
        debug!(challenge = %challenge, "Login challenge received");

        info!(username = %credentials.username, "Authenticating");

        let mut parameters = ValueMap::new();
        parameters.insert("challenge".to_string(), challenge.to_string());
        parameters.insert("username".to_string(), credentials.username.to_string());
        parameters.insert("password".to_string(), credentials.password.to_string());

        exchange.post(&server.login_url, &parameters)?;

        info!(username = %credentials.username, "Successfully authenticated");
        Ok(())
    }

    fn sign(
        &self,
        exchange: &mut Exchange<'_>,
        server: &ServerInfo,
        csr_der: &[u8],
    ) -> Result<Vec<u8>, EnrollError> {
        info!("Sending certificate request");

        let mut parameters = ValueMap::new();
        parameters.insert(
            "certificate_request".to_string(),
            BASE64_STANDARD.encode(csr_der),
        );

        let values = exchange.post(&server.sign_url, &parameters)?;
        let certificate = require(&values, "certificate")?;

        // Servers may wrap long base64 lines.
        let compact: String = certificate
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        BASE64_STANDARD
            .decode(compact)
            .map_err(|e| EnrollError::MalformedCertificate(format!("invalid base64: {e}")))
    }
}
