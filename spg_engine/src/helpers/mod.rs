mod phone;
mod references;

pub use phone::{is_valid_email, normalize_msisdn, normalize_phone};
pub use references::{extract_provider_reference, extract_provider_references, new_provider_reference, ReferenceGenerator};
