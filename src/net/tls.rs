//! TLS configuration and certificate loading.
//!
//! Listener setup and reload callbacks run synchronously, so PEM material is
//! parsed here and handed to axum-server through `RustlsConfig::from_config`
//! and `RustlsConfig::reload_from_config`.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::CertificateDer;
use rustls::ServerConfig;

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Load a rustls server config from PEM certificate chain and key files.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> io::Result<Arc<ServerConfig>> {
    // Basic validation
    if !cert_path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    let mut cert_reader = BufReader::new(File::open(cert_path)?);
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| invalid_data(format!("invalid certificate PEM {:?}: {}", cert_path, e)))?;
    if certs.is_empty() {
        return Err(invalid_data(format!("no certificates found in {:?}", cert_path)));
    }

    let mut key_reader = BufReader::new(File::open(key_path)?);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| invalid_data(format!("invalid key PEM {:?}: {}", key_path, e)))?
        .ok_or_else(|| invalid_data(format!("no private key found in {:?}", key_path)))?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| invalid_data(e.to_string()))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Load TLS configuration for axum-server from certificate and key files.
pub fn load_tls_config(cert_path: &Path, key_path: &Path) -> io::Result<RustlsConfig> {
    load_server_config(cert_path, key_path).map(RustlsConfig::from_config)
}

/// Swap the certificate and key served by `config` in place.
pub fn reload_tls_config(config: &RustlsConfig, cert_path: &Path, key_path: &Path) -> io::Result<()> {
    config.reload_from_config(load_server_config(cert_path, key_path)?);
    Ok(())
}
