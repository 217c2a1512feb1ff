//! Enrollment command-line client.
//!
//! Generates a fresh key pair and CSR, logs into the enrollment server
//! described by a JSON configuration file, and writes the signed certificate
//! and its private key as PEM files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use enroll_core::{CertificateRequest, EnrollmentClient, ServerConfig};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "enroll", version, about = "Request a client certificate from an enrollment server")]
struct Args {
    /// JSON server configuration.
    #[arg(short, long)]
    config: PathBuf,

    /// Override the configured server host (`host[:port]`).
    #[arg(long)]
    host: Option<String>,

    /// Override the configured username.
    #[arg(long)]
    username: Option<String>,

    /// Override the configured password.
    #[arg(long)]
    password: Option<String>,

    /// Common name placed in the certificate request.
    #[arg(long, default_value = "enroll-client")]
    common_name: String,

    /// Where to write the generated private key.
    #[arg(long, default_value = "client.key")]
    key_out: PathBuf,

    /// Where to write the signed certificate.
    #[arg(long, default_value = "client.crt")]
    cert_out: PathBuf,
}

impl Args {
    fn server_config(&self) -> Result<ServerConfig> {
        let mut config = ServerConfig::from_json_file(&self.config)
            .with_context(|| format!("loading {}", self.config.display()))?;
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(username) = &self.username {
            config.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

/// Generate an ECDSA P-256 key and a CSR for `common_name`.
fn generate_request(common_name: &str) -> Result<(KeyPair, CertificateRequest)> {
    let key_pair = KeyPair::generate().context("generating key pair")?;

    let mut params = CertificateParams::new(Vec::<String>::new())?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;

    let csr = params
        .serialize_request(&key_pair)
        .context("building certificate request")?;
    let request = CertificateRequest::from_der(&csr.der().to_vec())?;
    Ok((key_pair, request))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = args.server_config()?;

    let (key_pair, request) = generate_request(&args.common_name)?;
    info!(subject = %request.subject(), "Generated certificate request");

    let mut client = EnrollmentClient::from_config(config)?;
    let server = client.authenticate()?;
    info!(server = %server, "Authenticated");

    let certificate = client.renew_certificate(&request)?;

    write_file(&args.key_out, &key_pair.serialize_pem())?;
    write_file(&args.cert_out, &certificate.to_pem())?;

    println!("subject:    {}", certificate.subject());
    println!("issuer:     {}", certificate.issuer());
    println!("serial:     {}", certificate.serial());
    println!("not before: {}", certificate.not_before());
    println!("not after:  {}", certificate.not_after());
    println!("written:    {} / {}", args.cert_out.display(), args.key_out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_request_carries_common_name() {
        let (key_pair, request) = generate_request("device-7").unwrap();
        assert!(request.subject().contains("device-7"));
        assert!(key_pair.serialize_pem().contains("PRIVATE KEY"));
    }

    #[test]
    fn overrides_replace_configured_values() {
        let path = std::env::temp_dir().join(format!("enroll-cli-test-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"host":"a.example","username":"alice","password":"one"}"#,
        )
        .unwrap();

        let args = Args::parse_from([
            "enroll",
            "--config",
            path.to_str().unwrap(),
            "--host",
            "b.example:8443",
            "--password",
            "two",
        ]);
        let config = args.server_config().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.host, "b.example:8443");
        assert_eq!(config.username, "alice");
        assert_eq!(config.password, "two");
    }

    #[test]
    fn empty_host_override_is_rejected() {
        let path = std::env::temp_dir().join(format!("enroll-cli-empty-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"host":"a","username":"u","password":"p"}"#).unwrap();

        let args = Args::parse_from(["enroll", "-c", path.to_str().unwrap(), "--host", ""]);
        let result = args.server_config();
        std::fs::remove_file(&path).unwrap();

        assert!(result.is_err());
    }
}
