//! Webhook signature verification.
//!
//! Every rail signs the raw request body with an HMAC keyed by a shared secret. The schemes differ per provider:
//!
//! | Rail              | Header                 | Digest      | Encoding |
//! |-------------------|------------------------|-------------|----------|
//! | Mobile money till | `X-Till-Signature`     | HMAC-SHA256 | base64   |
//! | Crypto invoice    | `X-Invoice-Signature`  | HMAC-SHA512 | hex      |
//! | Card checkout     | `X-Checkout-Signature` | HMAC-SHA512 | hex      |
//! | Exchange order    | `X-Exchange-Signature` | HMAC-SHA512 | hex      |
//!
//! Signatures are compared in constant time. A rail with no secret configured runs in permissive mode: callbacks are
//! accepted unsigned and every one of them is logged as a warning.
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use log::*;
use sha2::{Sha256, Sha512};
use spg_common::Secret;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::db_types::PaymentMethod;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("The {0} header is missing")]
    Missing(&'static str),
    #[error("The {header} header could not be decoded. {reason}")]
    Malformed { header: &'static str, reason: String },
    #[error("The signature does not match the request body")]
    Mismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureEncoding {
    Hex,
    Base64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureScheme {
    pub header: &'static str,
    pub algorithm: DigestAlgorithm,
    pub encoding: SignatureEncoding,
}

impl SignatureScheme {
    pub fn for_rail(rail: PaymentMethod) -> Self {
        use DigestAlgorithm::*;
        use SignatureEncoding::*;
        match rail {
            PaymentMethod::MobileMoneyTill => Self { header: "X-Till-Signature", algorithm: Sha256, encoding: Base64 },
            PaymentMethod::CryptoInvoice => Self { header: "X-Invoice-Signature", algorithm: Sha512, encoding: Hex },
            PaymentMethod::CardCheckout => Self { header: "X-Checkout-Signature", algorithm: Sha512, encoding: Hex },
            PaymentMethod::ExchangeOrder => Self { header: "X-Exchange-Signature", algorithm: Sha512, encoding: Hex },
        }
    }

    fn decode(&self, value: &str) -> Result<Vec<u8>, SignatureError> {
        let value = value.trim();
        let decoded = match self.encoding {
            SignatureEncoding::Hex => hex::decode(value).map_err(|e| e.to_string()),
            SignatureEncoding::Base64 => BASE64.decode(value).map_err(|e| e.to_string()),
        };
        decoded.map_err(|reason| SignatureError::Malformed { header: self.header, reason })
    }

    fn encode(&self, digest: &[u8]) -> String {
        match self.encoding {
            SignatureEncoding::Hex => hex::encode(digest),
            SignatureEncoding::Base64 => BASE64.encode(digest),
        }
    }
}

pub fn hmac_digest(algorithm: DigestAlgorithm, secret: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so neither constructor can fail
    match algorithm {
        DigestAlgorithm::Sha256 => match Hmac::<Sha256>::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            },
            Err(_) => Vec::new(),
        },
        DigestAlgorithm::Sha512 => match Hmac::<Sha512>::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            },
            Err(_) => Vec::new(),
        },
    }
}

/// Lowercase hex HMAC-SHA512 of `data`.
pub fn hmac_sha512_hex(secret: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_digest(DigestAlgorithm::Sha512, secret, data))
}

/// Produces the header value a provider would send for `body`. Used by sandbox tooling and tests.
pub fn sign_payload(rail: PaymentMethod, secret: &str, body: &[u8]) -> String {
    let scheme = SignatureScheme::for_rail(rail);
    scheme.encode(&hmac_digest(scheme.algorithm, secret.as_bytes(), body))
}

/// Whether a callback was accepted because its signature checked out, or because the rail has no secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Permissive,
}

#[derive(Debug, Clone, Default)]
pub struct WebhookSecrets {
    pub mobile_money: Option<Secret<String>>,
    pub crypto: Option<Secret<String>>,
    pub checkout: Option<Secret<String>>,
    pub exchange: Option<Secret<String>>,
}

impl WebhookSecrets {
    pub fn get(&self, rail: PaymentMethod) -> Option<&Secret<String>> {
        let secret = match rail {
            PaymentMethod::MobileMoneyTill => self.mobile_money.as_ref(),
            PaymentMethod::CryptoInvoice => self.crypto.as_ref(),
            PaymentMethod::CardCheckout => self.checkout.as_ref(),
            PaymentMethod::ExchangeOrder => self.exchange.as_ref(),
        };
        secret.filter(|s| s.is_set())
    }

    pub fn with_secret(mut self, rail: PaymentMethod, secret: &str) -> Self {
        let secret = Some(Secret::new(secret.to_string()));
        match rail {
            PaymentMethod::MobileMoneyTill => self.mobile_money = secret,
            PaymentMethod::CryptoInvoice => self.crypto = secret,
            PaymentMethod::CardCheckout => self.checkout = secret,
            PaymentMethod::ExchangeOrder => self.exchange = secret,
        }
        self
    }

    /// The rails that will accept unsigned callbacks.
    pub fn permissive_rails(&self) -> Vec<PaymentMethod> {
        PaymentMethod::ALL.into_iter().filter(|r| self.get(*r).is_none()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignatureVerifier {
    secrets: WebhookSecrets,
}

impl SignatureVerifier {
    pub fn new(secrets: WebhookSecrets) -> Self {
        for rail in secrets.permissive_rails() {
            warn!("🔐️ No webhook secret is configured for {rail}. Its callbacks will be accepted WITHOUT verification.");
        }
        Self { secrets }
    }

    pub fn scheme(&self, rail: PaymentMethod) -> SignatureScheme {
        SignatureScheme::for_rail(rail)
    }

    /// Checks `header_value` against the HMAC of `body` for the given rail.
    pub fn verify(
        &self,
        rail: PaymentMethod,
        header_value: Option<&str>,
        body: &[u8],
    ) -> Result<Verification, SignatureError> {
        let scheme = SignatureScheme::for_rail(rail);
        let Some(secret) = self.secrets.get(rail) else {
            warn!("🔐️ Accepting an unverified {rail} callback. Configure a webhook secret for this rail.");
            return Ok(Verification::Permissive);
        };
        let header_value = header_value.ok_or(SignatureError::Missing(scheme.header))?;
        let provided = scheme.decode(header_value)?;
        let expected = hmac_digest(scheme.algorithm, secret.reveal().as_bytes(), body);
        if bool::from(expected.ct_eq(&provided)) {
            trace!("🔐️ {rail} signature verified");
            Ok(Verification::Verified)
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const BODY: &[u8] = br#"{"TransID":"QK71ABC","TransAmount":"500.00"}"#;

    fn verifier() -> SignatureVerifier {
        let secrets = PaymentMethod::ALL.into_iter().fold(WebhookSecrets::default(), |s, r| s.with_secret(r, "s3cret"));
        SignatureVerifier::new(secrets)
    }

    #[test]
    fn valid_signatures_verify_on_every_rail() {
        let verifier = verifier();
        for rail in PaymentMethod::ALL {
            let sig = sign_payload(rail, "s3cret", BODY);
            assert_eq!(verifier.verify(rail, Some(&sig), BODY), Ok(Verification::Verified), "{rail}");
        }
    }

    #[test]
    fn mobile_money_uses_base64_sha256() {
        let sig = sign_payload(PaymentMethod::MobileMoneyTill, "s3cret", BODY);
        assert_eq!(BASE64.decode(&sig).unwrap().len(), 32);
        let sig = sign_payload(PaymentMethod::CardCheckout, "s3cret", BODY);
        assert_eq!(sig.len(), 128);
    }

    #[test]
    fn tampered_bodies_are_rejected() {
        let verifier = verifier();
        let sig = sign_payload(PaymentMethod::CryptoInvoice, "s3cret", BODY);
        let tampered = br#"{"TransID":"QK71ABC","TransAmount":"5000.00"}"#;
        assert_eq!(verifier.verify(PaymentMethod::CryptoInvoice, Some(&sig), tampered), Err(SignatureError::Mismatch));
        let wrong_key = sign_payload(PaymentMethod::CryptoInvoice, "other", BODY);
        assert_eq!(verifier.verify(PaymentMethod::CryptoInvoice, Some(&wrong_key), BODY), Err(SignatureError::Mismatch));
    }

    #[test]
    fn missing_or_garbled_headers() {
        let verifier = verifier();
        assert_eq!(
            verifier.verify(PaymentMethod::CardCheckout, None, BODY),
            Err(SignatureError::Missing("X-Checkout-Signature"))
        );
        let err = verifier.verify(PaymentMethod::CardCheckout, Some("not hex!"), BODY).unwrap_err();
        assert!(matches!(err, SignatureError::Malformed { .. }));
        // A well-formed but truncated signature is a plain mismatch
        assert_eq!(verifier.verify(PaymentMethod::CardCheckout, Some("abcd"), BODY), Err(SignatureError::Mismatch));
    }

    #[test]
    fn rails_without_secrets_are_permissive() {
        let verifier = SignatureVerifier::new(WebhookSecrets::default().with_secret(PaymentMethod::CardCheckout, "k"));
        assert_eq!(verifier.verify(PaymentMethod::MobileMoneyTill, None, BODY), Ok(Verification::Permissive));
        assert!(verifier.verify(PaymentMethod::CardCheckout, None, BODY).is_err());
    }
}
