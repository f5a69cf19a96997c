// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client-side TLS configuration.
//!
//! Builds the `rustls::ClientConfig` used by the TCP transport. Roots come
//! from `webpki-roots` by default, optionally extended with a PEM CA file.
//! With the `insecure-skip-verify` feature, `tls_verify=unsafe_off`
//! installs a verifier that accepts any certificate (testing only).

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore};

use crate::conf::SenderOptions;
use crate::error::{Error, Result};

/// Assemble a TLS client configuration from the sender options.
///
/// Returns `None` for plaintext protocols.
pub(crate) fn configure_tls(options: &SenderOptions) -> Result<Option<Arc<ClientConfig>>> {
    if !options.protocol.is_tls() {
        return Ok(None);
    }

    if !options.tls_verify {
        #[cfg(feature = "insecure-skip-verify")]
        {
            let config = ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(danger::NoVerifier))
                .with_no_client_auth();
            return Ok(Some(Arc::new(config)));
        }
        #[cfg(not(feature = "insecure-skip-verify"))]
        return Err(Error::TlsError(
            "tls_verify=unsafe_off requires the insecure-skip-verify feature".to_string(),
        ));
    }

    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(ca_path) = &options.tls_roots {
        let file = File::open(ca_path).map_err(|err| {
            Error::TlsError(format!(
                "could not open certificate authority file {ca_path:?}: {err}"
            ))
        })?;
        let mut reader = BufReader::new(file);
        let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|err| {
                Error::TlsError(format!(
                    "could not read certificate authority file {ca_path:?}: {err}"
                ))
            })?;
        if certs.is_empty() {
            return Err(Error::TlsError(format!(
                "no certificates found in {ca_path:?}"
            )));
        }
        for cert in certs {
            root_store.add(cert).map_err(|err| {
                Error::TlsError(format!("bad certificate in {ca_path:?}: {err}"))
            })?;
        }
    }

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(Some(Arc::new(config)))
}

// ============================================================================
// No-verification certificate verifier (testing only)
// ============================================================================

#[cfg(feature = "insecure-skip-verify")]
mod danger {
    use rustls::client::danger::{
        HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
    };
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};

    #[derive(Debug)]
    pub(super) struct NoVerifier;

    impl ServerCertVerifier for NoVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &rustls::DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &rustls::DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
            vec![
                rustls::SignatureScheme::RSA_PKCS1_SHA256,
                rustls::SignatureScheme::RSA_PKCS1_SHA384,
                rustls::SignatureScheme::RSA_PKCS1_SHA512,
                rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
                rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
                rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
                rustls::SignatureScheme::RSA_PSS_SHA256,
                rustls::SignatureScheme::RSA_PSS_SHA384,
                rustls::SignatureScheme::RSA_PSS_SHA512,
                rustls::SignatureScheme::ED25519,
            ]
        }
    }
}
