use std::sync::Arc;

use rand::{thread_rng, Rng};
use regex::Regex;

use crate::db_types::PaymentMethod;

// Uppercase letters and digits without the easily confused 0/O and 1/I, since till references are typed by hand.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Produces candidate provider references for a rail. Swappable so that collision handling can be exercised.
pub type ReferenceGenerator = Arc<dyn Fn(PaymentMethod) -> String + Send + Sync>;

fn random_code(len: usize) -> String {
    let mut rng = thread_rng();
    (0..len).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect()
}

/// A fresh random reference in the format the rail's provider accepts.
///
/// * Mobile money: 8 characters, short enough for a till account number field.
/// * Crypto invoice: `INV-` and 12 characters, used as the transfer memo.
/// * Card checkout: `CHK-` and 16 characters.
/// * Exchange order: `EXO` and 20 characters. The exchange only accepts alphanumeric merchant trade numbers.
pub fn new_provider_reference(method: PaymentMethod) -> String {
    match method {
        PaymentMethod::MobileMoneyTill => random_code(8),
        PaymentMethod::CryptoInvoice => format!("INV-{}", random_code(12)),
        PaymentMethod::CardCheckout => format!("CHK-{}", random_code(16)),
        PaymentMethod::ExchangeOrder => format!("EXO{}", random_code(20)),
    }
}

// The character class must stay in step with ALPHABET.
fn reference_pattern(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::MobileMoneyTill => r"\b([A-HJ-NP-Z2-9]{8})\b",
        PaymentMethod::CryptoInvoice => r"\b(INV-[A-HJ-NP-Z2-9]{12})\b",
        PaymentMethod::CardCheckout => r"\b(CHK-[A-HJ-NP-Z2-9]{16})\b",
        PaymentMethod::ExchangeOrder => r"\b(EXO[A-HJ-NP-Z2-9]{20})\b",
    }
}

/// Pulls a provider reference out of free text typed by a customer, such as a till account field or a transfer memo.
/// Customers pad references with spaces, lowercase them or add words around them. Returns `None` if nothing in the text
/// looks like a reference for this rail.
pub fn extract_provider_reference(text: &str, method: PaymentMethod) -> Option<String> {
    extract_provider_references(text, method).into_iter().next()
}

/// Every substring of `text` that looks like a reference for this rail, in the order they appear.
pub fn extract_provider_references(text: &str, method: PaymentMethod) -> Vec<String> {
    let text = text.trim().to_uppercase();
    let Ok(pattern) = Regex::new(reference_pattern(method)) else {
        return Vec::new();
    };
    pattern.captures_iter(&text).filter_map(|c| c.get(1).map(|m| m.as_str().to_string())).collect()
}
