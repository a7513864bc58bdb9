/* -------------------------------------------------------------------------- *\
 *                |   █████╗ ██╗   ██╗██████╗  █████╗ ███████╗ |              *
 *                |  ██╔══██╗██║   ██║██╔══██╗██╔══██╗██╔════╝ |              *
 *                |  ███████║██║   ██║██████╔╝███████║█████╗   |              *
 *                |  ██╔══██║██║   ██║██╔══██╗██╔══██║██╔══╝   |              *
 *                |  ██║  ██║╚██████╔╝██║  ██║██║  ██║███████╗ |              *
 *                |  ╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝ |              *
 *                +--------------------------------------------+              *
 *                                                                            *
 *                         Distributed Systems Runtime                        *
 * -------------------------------------------------------------------------- *
 * Copyright 2022 - 2024, the aurae contributors                              *
 * SPDX-License-Identifier: Apache-2.0                                        *
\* -------------------------------------------------------------------------- */

//! Peer identity extraction.
//!
//! A client's identity is the base64 encoding of its leaf certificate's raw
//! DER subject. The TLS accept path computes it once per connection; the
//! interceptor copies it onto each request's metadata under [AUTHN_ID_KEY],
//! which is where the handlers (and the authorizer) read it from.

use crate::tls::TlsConnectInfo;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bcder::encode::Values as _;
use thiserror::Error;
use tonic::metadata::MetadataValue;
use tonic::{Request, Status};
use x509_certificate::X509Certificate;

/// Request metadata key carrying the authenticated identity.
pub const AUTHN_ID_KEY: &str = "authn_id";

#[derive(Error, Debug)]
pub enum AuthnError {
    #[error("failed to parse peer certificate: {0}")]
    BadCertificate(#[from] x509_certificate::X509CertificateError),
    #[error("failed to encode certificate subject: {0}")]
    EncodeSubject(#[from] std::io::Error),
}

/// Base64 of the raw DER subject of a DER-encoded certificate.
pub fn subject_b64(cert_der: &[u8]) -> Result<String, AuthnError> {
    let cert = X509Certificate::from_der(cert_der)?;
    let mut subject = Vec::new();
    cert.subject_name()
        .encode_ref()
        .write_encoded(bcder::Mode::Der, &mut subject)?;
    Ok(BASE64.encode(subject))
}

/// Tonic interceptor: promotes the connection-level identity onto request
/// metadata, rejecting peers the TLS layer could not identify.
pub fn interceptor(mut request: Request<()>) -> Result<Request<()>, Status> {
    let subject = request
        .extensions()
        .get::<TlsConnectInfo>()
        .and_then(|info| info.peer_subject.clone())
        .ok_or_else(|| Status::unauthenticated("missing peer certificate"))?;

    let value = MetadataValue::try_from(subject.as_str())
        .map_err(|_| Status::unauthenticated("malformed peer identity"))?;
    let _ = request.metadata_mut().insert(AUTHN_ID_KEY, value);
    Ok(request)
}

/// Reads the authenticated subject a request carries.
pub fn authenticated_subject<T>(
    request: &Request<T>,
) -> Result<String, Status> {
    request
        .metadata()
        .get(AUTHN_ID_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| Status::unauthenticated("missing authn id"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticated_subject_requires_the_metadata_key() {
        let request = Request::new(());
        let err = authenticated_subject(&request).expect_err("no identity");
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn authenticated_subject_round_trips_through_metadata() {
        let mut request = Request::new(());
        let _ = request.metadata_mut().insert(
            AUTHN_ID_KEY,
            MetadataValue::try_from("c3ViamVjdA==").expect("metadata value"),
        );
        let subject =
            authenticated_subject(&request).expect("subject present");
        assert_eq!(subject, "c3ViamVjdA==");
    }

    #[test]
    fn subject_b64_rejects_garbage() {
        assert!(subject_b64(b"not a certificate").is_err());
    }
}
