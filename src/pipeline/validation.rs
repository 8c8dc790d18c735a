//! Business-rule validation of submissions.
//!
//! Structural length checks happen in the schema layer
//! (`PriorAuthRequest::check_fields`); this stage only applies rules whose
//! failures are audited.

use crate::error::ValidationReason;
use crate::models::PriorAuthRequest;

pub const NPI_LENGTH: usize = 10;

/// Apply the rules in order; the first failure wins.
pub fn validate(candidate: &PriorAuthRequest) -> Result<(), ValidationReason> {
    if !is_valid_npi(&candidate.provider_npi) {
        return Err(ValidationReason::InvalidNpiFormat);
    }
    Ok(())
}

/// Exactly ten ASCII digits.
pub fn is_valid_npi(npi: &str) -> bool {
    npi.len() == NPI_LENGTH && npi.bytes().all(|b| b.is_ascii_digit())
}

/// Client-facing message for a failed rule.
pub fn failure_message(reason: ValidationReason) -> &'static str {
    match reason {
        ValidationReason::InvalidNpiFormat => "Provider NPI must be exactly 10 digits",
        ValidationReason::MissingRequiredField => "Validation failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_npi_rule() {
        assert!(is_valid_npi("1234567890"));
        assert!(!is_valid_npi("BAD_NPI"));
        assert!(!is_valid_npi("123456789"));
        assert!(!is_valid_npi("12345678901"));
        assert!(!is_valid_npi("12345abc90"));
        assert!(!is_valid_npi(""));
        // non-ASCII digits are rejected
        assert!(!is_valid_npi("١٢٣٤٥٦٧٨٩٠"));
    }

    #[test]
    fn test_validate_reports_reason() {
        let mut candidate = PriorAuthRequest {
            member_id: "M10001".into(),
            provider_npi: "1234567890".into(),
            diagnosis_code: "E11.9".into(),
            requested_service: "MRI_BRAIN".into(),
        };
        assert!(validate(&candidate).is_ok());

        candidate.provider_npi = "BAD_NPI".into();
        assert_eq!(validate(&candidate), Err(ValidationReason::InvalidNpiFormat));
    }
}
