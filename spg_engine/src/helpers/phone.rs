use regex::Regex;

use crate::{db_types::Region, spg_api::errors::ValidationError};

fn digits_only(raw: &str) -> Option<String> {
    let cleaned = raw.trim().replace([' ', '-', '(', ')', '.'], "");
    let pattern = Regex::new(r"^(?:\+|00)?(\d{9,15})$").ok()?;
    pattern.captures(&cleaned).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// Normalises a phone number entered by a customer into international form without a leading `+`, e.g.
/// `0712 345 678` in `KE` becomes `254712345678`.
///
/// Local numbers (leading `0`, or a bare subscriber number) are prefixed with the region's dialling code.
/// Numbers that already carry the dialling code are left as they are. `INTL` numbers must be in international form.
pub fn normalize_phone(raw: &str, region: Region) -> Result<String, ValidationError> {
    let invalid = || ValidationError::InvalidPhone(raw.to_string());
    let digits = digits_only(raw).ok_or_else(invalid)?;
    let explicit_international = raw.trim_start().starts_with('+') || raw.trim_start().starts_with("00");
    let normalized = match region.dialling_code() {
        Some(code) if explicit_international || digits.starts_with(code) => digits,
        Some(code) if digits.starts_with('0') && (10..=11).contains(&digits.len()) => {
            format!("{code}{}", &digits[1..])
        },
        Some(code) if !digits.starts_with('0') && (9..=10).contains(&digits.len()) => format!("{code}{digits}"),
        Some(_) => return Err(invalid()),
        None => digits,
    };
    if normalized.starts_with('0') || normalized.len() < 10 {
        return Err(invalid());
    }
    Ok(normalized)
}

/// Normalises a phone number reported by a payment provider. Providers always report numbers in international form,
/// so no region is needed.
pub fn normalize_msisdn(raw: &str) -> Option<String> {
    digits_only(raw).filter(|d| !d.starts_with('0') && d.len() >= 10)
}

pub fn is_valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").map(|re| re.is_match(email.trim())).unwrap_or(false)
}
