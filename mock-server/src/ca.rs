//! In-memory certificate authority signing client CSRs.
//!
//! Uses x509-parser (through rcgen) to read CSRs and rcgen to issue
//! certificates. The CA key lives only as long as the server.

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CertificateSigningRequestParams,
    DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaError {
    #[error("failed to create CA: {0}")]
    Create(rcgen::Error),

    #[error("failed to parse CSR: {0}")]
    ParseCsr(rcgen::Error),

    #[error("failed to sign certificate: {0}")]
    Sign(rcgen::Error),
}

pub struct CertificateAuthority {
    cert: Certificate,
    key_pair: KeyPair,
}

impl CertificateAuthority {
    /// Create a self-signed CA named `common_name`.
    pub fn generate(common_name: &str) -> Result<Self, CaError> {
        let key_pair = KeyPair::generate().map_err(CaError::Create)?;

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name);
        dn.push(DnType::OrganizationName, "Mock Enrollment");
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let cert = params.self_signed(&key_pair).map_err(CaError::Create)?;
        Ok(Self { cert, key_pair })
    }

    pub fn cert_der(&self) -> &[u8] {
        self.cert.der()
    }

    pub fn cert_pem(&self) -> String {
        self.cert.pem()
    }

    /// Issue a client certificate for a DER-encoded PKCS#10 request.
    ///
    /// Subject and public key come from the request; key usage is fixed to
    /// TLS client authentication.
    pub fn sign_csr_der(&self, csr_der: &[u8]) -> Result<Vec<u8>, CaError> {
        let mut csr =
            CertificateSigningRequestParams::from_der(&csr_der.into()).map_err(CaError::ParseCsr)?;

        csr.params.is_ca = IsCa::ExplicitNoCa;
        csr.params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        csr.params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];

        let cert = csr
            .signed_by(&self.cert, &self.key_pair)
            .map_err(CaError::Sign)?;
        Ok(cert.der().to_vec())
    }
}
