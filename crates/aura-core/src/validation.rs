//! # Validation Module
//!
//! Input validation for checkout forms, reviews and cart quantities.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend form                                                │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: aura-core (THIS MODULE)                                      │
//! │  ├── Checkout pre-flight (delivery info, quantities)                   │
//! │  └── Review submission (rating, comment)                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Storefront API                                               │
//! │  └── Authoritative checks (stock, one vote per user)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use aura_core::validation::{validate_phone, validate_quantity};
//!
//! validate_quantity(5).unwrap();
//! validate_phone("+234 803-123-4567").unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::DeliveryInfo;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 100;
const MAX_ADDRESS_LEN: usize = 300;
const MAX_NOTES_LEN: usize = 500;
const MAX_COMMENT_LEN: usize = 1_000;
const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

fn required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn max_len(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart line quantity.
///
/// ## Rules
/// - Must be at least 1
/// - Must not exceed [`MAX_LINE_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 1 || qty > i64::from(MAX_LINE_QUANTITY) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: i64::from(MAX_LINE_QUANTITY),
        });
    }
    Ok(())
}

/// Validates a review rating (1 to 5 stars).
pub fn validate_rating(rating: u8) -> ValidationResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(ValidationError::OutOfRange {
            field: "rating".to_string(),
            min: 1,
            max: 5,
        });
    }
    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates an optional review comment.
pub fn validate_comment(comment: Option<&str>) -> ValidationResult<()> {
    match comment {
        Some(text) => max_len("comment", text, MAX_COMMENT_LEN),
        None => Ok(()),
    }
}

/// Validates an email address.
///
/// ## Rules
/// - Must not be empty
/// - Exactly one `@`, with a non-empty local part and a dotted domain
///
/// ## Example
/// ```rust
/// use aura_core::validation::validate_email;
///
/// assert!(validate_email("ada@example.com").is_ok());
/// assert!(validate_email("ada@localhost").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    required("email", email)?;

    let email = email.trim();
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: reason.to_string(),
    };

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| invalid("missing '@'"))?;

    if local.is_empty() || domain.contains('@') || email.contains(char::is_whitespace) {
        return Err(invalid("not a valid address"));
    }

    let dotted = domain
        .split('.')
        .collect::<Vec<_>>();
    if dotted.len() < 2 || dotted.iter().any(|part| part.is_empty()) {
        return Err(invalid("domain must contain a dot"));
    }

    Ok(())
}

/// Validates a phone number.
///
/// ## Rules
/// - Optional leading `+`
/// - Spaces and dashes are ignored
/// - Between 7 and 15 digits remain, and nothing else
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    required("phone", phone)?;

    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let mut digits = 0usize;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' => {}
            _ => {
                return Err(ValidationError::InvalidFormat {
                    field: "phone".to_string(),
                    reason: "may only contain digits, spaces and dashes".to_string(),
                })
            }
        }
    }

    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: format!(
                "must have between {} and {} digits",
                MIN_PHONE_DIGITS, MAX_PHONE_DIGITS
            ),
        });
    }

    Ok(())
}

/// Validates the delivery form before checkout.
///
/// Fields are checked in form order so the first error points at the
/// topmost invalid input.
pub fn validate_delivery_info(info: &DeliveryInfo) -> ValidationResult<()> {
    required("full name", &info.full_name)?;
    max_len("full name", &info.full_name, MAX_NAME_LEN)?;

    validate_phone(&info.phone)?;

    required("address", &info.address)?;
    max_len("address", &info.address, MAX_ADDRESS_LEN)?;

    required("city", &info.city)?;
    max_len("city", &info.city, MAX_NAME_LEN)?;

    required("state", &info.state)?;
    max_len("state", &info.state, MAX_NAME_LEN)?;

    if let Some(notes) = &info.notes {
        max_len("notes", notes, MAX_NOTES_LEN)?;
    }

    if let Some(point) = info.location {
        if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lng) {
            return Err(ValidationError::InvalidFormat {
                field: "location".to_string(),
                reason: "coordinates out of range".to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoPoint;

    fn delivery() -> DeliveryInfo {
        DeliveryInfo {
            full_name: "Ada Obi".to_string(),
            phone: "0803 123 4567".to_string(),
            address: "12 Allen Avenue".to_string(),
            city: "Ikeja".to_string(),
            state: "Lagos".to_string(),
            notes: None,
            location: None,
        }
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(99).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(100).is_err());
    }

    #[test]
    fn test_validate_rating() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("  ada.obi@mail.example.ng ").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("ada.example.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@example.").is_err());
        assert!(validate_email("ada@@example.com").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("08031234567").is_ok());
        assert!(validate_phone("+234 803-123-4567").is_ok());
        assert!(validate_phone("123456").is_err());
        assert!(validate_phone("1234567890123456").is_err());
        assert!(validate_phone("0803x234567").is_err());
        assert!(matches!(
            validate_phone("   "),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_delivery_info() {
        assert!(validate_delivery_info(&delivery()).is_ok());

        let mut info = delivery();
        info.city = " ".to_string();
        assert_eq!(
            validate_delivery_info(&info),
            Err(ValidationError::Required {
                field: "city".to_string()
            })
        );

        let mut info = delivery();
        info.location = Some(GeoPoint {
            lat: 6.6,
            lng: 3.35,
        });
        assert!(validate_delivery_info(&info).is_ok());
        info.location = Some(GeoPoint {
            lat: 120.0,
            lng: 3.35,
        });
        assert!(validate_delivery_info(&info).is_err());
    }

    #[test]
    fn test_validate_comment_length() {
        assert!(validate_comment(None).is_ok());
        assert!(validate_comment(Some("Lovely scent")).is_ok());
        assert!(validate_comment(Some(&"a".repeat(1_001))).is_err());
    }
}
