//! Integration tests: the dynamic server acceptor against a hand-built
//! rustls client.
//!
//! The client side here is deliberately raw rustls, so the acceptor's
//! contract (mandatory client certificates, per-handshake snapshot binding,
//! point-in-time configs) is checked without going through the keywheel
//! client crate.

use std::sync::Arc;
use std::time::Duration;

use keywheel_creds::{crypto_provider, LoaderOptions};
use keywheel_server_core::ServerLoader;
use keywheel_testpki::{CredentialFiles, IssuedKeyPair, TestCa};
use rustls_pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsConnector;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .try_init();
}

fn options(files: &CredentialFiles) -> LoaderOptions {
    let mut options = LoaderOptions::new(files.ca_path(), files.cert_path(), files.key_path());
    options.reload_interval = Duration::from_millis(100);
    options
}

fn root_store(ca_pem: &str) -> rustls::RootCertStore {
    let mut reader = ca_pem.as_bytes();
    let mut roots = rustls::RootCertStore::empty();
    roots.add_parsable_certificates(
        rustls_pemfile::certs(&mut reader).filter_map(|der| der.ok()),
    );
    roots
}

/// A rustls client config trusting `ca_pem` and presenting `leaf`.
fn client_config_with_cert(ca_pem: &str, leaf: &IssuedKeyPair) -> rustls::ClientConfig {
    let mut cert_reader = leaf.cert_pem().as_bytes();
    let chain = rustls_pemfile::certs(&mut cert_reader)
        .collect::<std::io::Result<Vec<_>>>()
        .expect("parse client leaf");
    let mut key_reader = leaf.key_pem().as_bytes();
    let key = rustls_pemfile::private_key(&mut key_reader)
        .expect("parse client key")
        .expect("client key present");
    rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .expect("protocol versions")
        .with_root_certificates(root_store(ca_pem))
        .with_client_auth_cert(chain, key)
        .expect("client auth cert")
}

/// A rustls client config trusting `ca_pem` with no client certificate.
fn client_config_without_cert(ca_pem: &str) -> rustls::ClientConfig {
    rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .expect("protocol versions")
        .with_root_certificates(root_store(ca_pem))
        .with_no_client_auth()
}

async fn connect(
    port: u16,
    config: rustls::ClientConfig,
) -> std::io::Result<tokio_rustls::client::TlsStream<TcpStream>> {
    let tcp = TcpStream::connect(("127.0.0.1", port)).await?;
    let name = ServerName::try_from("localhost").expect("server name");
    TlsConnector::from(Arc::new(config)).connect(name, tcp).await
}

// ---------------------------------------------------------------------------
// Accept path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accepts_client_with_trusted_certificate() {
    init_tracing();
    let ca = TestCa::new("acc-ca");
    let files = CredentialFiles::new();
    files.write(ca.ca_pem(), &ca.issue_server("acc-server"));
    let loader = ServerLoader::new(options(&files)).expect("server loader");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let acceptor = loader.tls_acceptor();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("tcp accept");
        let mut tls = acceptor.accept(stream).await.expect("tls accept");
        tls.write_all(b"ok").await.expect("write");
        tls.shutdown().await.ok();
    });

    let client_leaf = ca.issue_client("acc-client");
    let mut stream = connect(port, client_config_with_cert(ca.ca_pem(), &client_leaf))
        .await
        .expect("client handshake");

    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf).await.expect("read greeting");
    assert_eq!(&buf, b"ok");
    server.await.expect("server task");
}

#[tokio::test]
async fn rejects_client_without_certificate() {
    init_tracing();
    let ca = TestCa::new("acc-ca");
    let files = CredentialFiles::new();
    files.write(ca.ca_pem(), &ca.issue_server("acc-server"));
    let loader = ServerLoader::new(options(&files)).expect("server loader");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let acceptor = loader.tls_acceptor();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("tcp accept");
        acceptor.accept(stream).await
    });

    // The handshake may complete client-side under TLS 1.3; drive a read to
    // surface the server's rejection either way.
    if let Ok(mut stream) = connect(port, client_config_without_cert(ca.ca_pem())).await {
        let mut buf = [0u8; 2];
        let _ = stream.read_exact(&mut buf).await;
    }

    let accept_result = server.await.expect("server task");
    assert!(
        accept_result.is_err(),
        "acceptor must reject a client that presents no certificate"
    );
}

#[tokio::test]
async fn new_handshakes_follow_a_reload() {
    init_tracing();
    let old_ca = TestCa::new("acc-old");
    let new_ca = TestCa::new("acc-new");
    let files = CredentialFiles::new();
    files.write(old_ca.ca_pem(), &old_ca.issue_server("acc-server"));
    let loader = ServerLoader::new(options(&files)).expect("server loader");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let acceptor = loader.tls_acceptor();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut tls) = acceptor.accept(stream).await {
                    let _ = tls.write_all(b"ok").await;
                    tls.shutdown().await.ok();
                }
            });
        }
    });

    files.write(new_ca.ca_pem(), &new_ca.issue_server("acc-server"));
    loader.reload_now().await.expect("forced reload");

    // A client still trusting the old CA is now rejected.
    let old_client_leaf = old_ca.issue_client("acc-client");
    connect(port, client_config_with_cert(old_ca.ca_pem(), &old_client_leaf))
        .await
        .expect_err("old trust anchors must fail against the rotated identity");

    // A client on the new CA succeeds.
    let new_client_leaf = new_ca.issue_client("acc-client");
    let mut stream = connect(port, client_config_with_cert(new_ca.ca_pem(), &new_client_leaf))
        .await
        .expect("client on the new CA should handshake");
    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf).await.expect("read greeting");
    assert_eq!(&buf, b"ok");
}

// ---------------------------------------------------------------------------
// Point-in-time config
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_config_is_pinned_to_its_snapshot() {
    init_tracing();
    let old_ca = TestCa::new("pin-old");
    let new_ca = TestCa::new("pin-new");
    let files = CredentialFiles::new();
    files.write(old_ca.ca_pem(), &old_ca.issue_server("pin-server"));
    let loader = ServerLoader::new(options(&files)).expect("server loader");

    // Capture a config, then rotate and reload underneath it.
    let pinned = Arc::new(loader.server_config().expect("server config"));
    files.write(new_ca.ca_pem(), &new_ca.issue_server("pin-server"));
    loader.reload_now().await.expect("forced reload");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("tcp accept");
        let acceptor = tokio_rustls::TlsAcceptor::from(pinned);
        let mut tls = acceptor.accept(stream).await.expect("tls accept");
        tls.write_all(b"ok").await.expect("write");
        tls.shutdown().await.ok();
    });

    // The pinned config still presents the old identity, so a client on the
    // old CA succeeds even though the loader has moved on.
    let old_client_leaf = old_ca.issue_client("pin-client");
    let mut stream = connect(port, client_config_with_cert(old_ca.ca_pem(), &old_client_leaf))
        .await
        .expect("pinned config must keep the old identity");
    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf).await.expect("read greeting");
    assert_eq!(&buf, b"ok");
    server.await.expect("server task");
}
