// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Challenge signing for TCP authentication.
//!
//! Signatures are ECDSA over the NIST P-256 curve with SHA-256, produced
//! deterministically (RFC 6979) so a given key/challenge pair always yields
//! the same bytes, and DER-encoded (SEQUENCE of the two INTEGERs r, s) for
//! cross-implementation compatibility.

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};

use crate::error::{Error, Result};

/// Sign `message` with a raw P-256 private scalar.
///
/// Base64 decoding can strip leading zero bytes from the scalar, so inputs
/// shorter than 32 bytes are left-padded; longer inputs are rejected.
pub fn sign_challenge(private_key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    if private_key.is_empty() || private_key.len() > 32 {
        return Err(Error::AuthError(format!(
            "private key must be at most 32 bytes, got {}",
            private_key.len()
        )));
    }
    let mut scalar = [0u8; 32];
    scalar[32 - private_key.len()..].copy_from_slice(private_key);
    let key = SigningKey::from_slice(&scalar)
        .map_err(|err| Error::AuthError(format!("bad private key: {err}")))?;
    let signature: Signature = key.sign(message);
    Ok(signature.to_der().as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::VerifyingKey;

    const KEY: [u8; 32] = [7u8; 32];

    #[test]
    fn test_signature_is_deterministic() {
        let challenge = b"0123456789abcdef0123456789abcdef";
        let first = sign_challenge(&KEY, challenge).unwrap();
        let second = sign_challenge(&KEY, challenge).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_signature_is_der_and_verifies() {
        let challenge = b"server challenge bytes";
        let der = sign_challenge(&KEY, challenge).unwrap();

        // DER SEQUENCE of two positive INTEGERs.
        assert_eq!(der[0], 0x30);
        let signature = Signature::from_der(&der).unwrap();

        let verifying = VerifyingKey::from(&SigningKey::from_slice(&KEY).unwrap());
        verifying.verify(challenge, &signature).unwrap();
    }

    #[test]
    fn test_short_scalar_is_left_padded() {
        let short = [9u8; 20];
        let mut padded = [0u8; 32];
        padded[12..].copy_from_slice(&short);
        let challenge = b"c";
        assert_eq!(
            sign_challenge(&short, challenge).unwrap(),
            sign_challenge(&padded, challenge).unwrap()
        );
    }

    #[test]
    fn test_oversized_key_rejected() {
        assert!(matches!(
            sign_challenge(&[1u8; 33], b"c"),
            Err(Error::AuthError(_))
        ));
        assert!(matches!(sign_challenge(&[], b"c"), Err(Error::AuthError(_))));
    }

    #[test]
    fn test_zero_scalar_rejected() {
        assert!(matches!(
            sign_challenge(&[0u8; 32], b"c"),
            Err(Error::AuthError(_))
        ));
    }
}
