//! Full enrollment against the live reference server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `EnrollmentClient`
//! over real HTTP with `UreqTransport`. The session cookie set at login must
//! survive in the transport's cookie jar for signing to succeed.

use std::net::SocketAddr;
use std::sync::Arc;

use enroll_core::{
    CertificateRequest, EnrollError, EnrollmentClient, Protocol, ProxySetting, ServerConfig,
};
use mock_server::ServerState;

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let state = Arc::new(ServerState::new(&[("alice", "s3cret")]).unwrap());

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, state).await
        })
        .unwrap();
    });

    addr
}

fn config(addr: SocketAddr, password: &str) -> ServerConfig {
    let mut config = ServerConfig::new(&addr.to_string(), "alice", password);
    config.protocol = Protocol::Http;
    config.https_proxy = ProxySetting::Disabled;
    config.user_agent = Some("enroll-integration-test".to_string());
    config
}

fn csr(common_name: &str) -> CertificateRequest {
    let key = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::new(vec![common_name.to_string()]).unwrap();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, common_name);
    let request = params.serialize_request(&key).unwrap();
    CertificateRequest::from_der(&request.der().to_vec()).unwrap()
}

#[test]
fn enrollment_lifecycle() {
    let addr = start_server();
    let mut client = EnrollmentClient::from_config(config(addr, "s3cret")).unwrap();

    // Step 1: signing before login is refused locally.
    let err = client.renew_certificate(&csr("early.test")).unwrap_err();
    assert!(matches!(err, EnrollError::IllegalState(_)));

    // Step 2: discovery + login.
    let server = client.authenticate().unwrap();
    assert_eq!(server.name, "mock-enrollment-server");
    assert_eq!((server.major, server.minor), (1, 0));
    assert_eq!(server.login_url, "/api/login");
    assert_eq!(server.sign_url, "/api/sign");

    // Step 3: first certificate.
    let request = csr("device-a.test");
    let first = client.renew_certificate(&request).unwrap();
    assert!(first.subject().contains("device-a.test"), "{}", first.subject());
    assert!(first.issuer().contains("Mock Enrollment CA"), "{}", first.issuer());
    assert!(first.not_after() > first.not_before());

    // Step 4: renewal is repeatable on the same session.
    let second = client.renew_certificate(&csr("device-b.test")).unwrap();
    assert!(second.subject().contains("device-b.test"));
    assert_ne!(first.to_der(), second.to_der());

    // Step 5: the PEM form re-parses to the same DER.
    let reparsed = enroll_core::Certificate::from_pem(&first.to_pem()).unwrap();
    assert_eq!(reparsed.to_der(), first.to_der());
}

#[test]
fn wrong_password_is_rejected_with_401() {
    let addr = start_server();
    let mut client = EnrollmentClient::from_config(config(addr, "wrong")).unwrap();

    let err = client.authenticate().unwrap_err();
    assert_eq!(err.status(), Some(401), "{err}");
    assert!(!client.is_authenticated());
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    drop(std_listener);

    let mut client = EnrollmentClient::from_config(config(addr, "s3cret")).unwrap();
    let err = client.authenticate().unwrap_err();
    assert!(matches!(err, EnrollError::Transport(_)), "{err:?}");
}

#[test]
fn separate_clients_hold_separate_sessions() {
    let addr = start_server();

    let mut logged_in = EnrollmentClient::from_config(config(addr, "s3cret")).unwrap();
    logged_in.authenticate().unwrap();
    logged_in.renew_certificate(&csr("one.test")).unwrap();

    // A second client never saw the session cookie.
    let other = EnrollmentClient::from_config(config(addr, "s3cret")).unwrap();
    let mut transport = other.into_transport();
    let request = enroll_core::HttpRequest::post(
        format!("http://{addr}/api/sign"),
        br#"{"certificate_request":"AA=="}"#.to_vec(),
    )
    .header("Content-Type", "application/json");
    let response = enroll_core::Transport::perform(&mut transport, &request).unwrap();
    assert_eq!(response.status, 401);
}
