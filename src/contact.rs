use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;

/// Validate email address
///
/// Checks for:
/// - Basic email format (contains @ and .)
/// - Minimum length
/// - Valid domain structure
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    // RFC 5322 simplified: local@domain.tld
    let valid = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .map(|re| re.is_match(email))
    .unwrap_or(false);

    if !valid {
        tracing::warn!("Invalid email format: {}", email);
    }
    valid
}

/// Validate and normalize a Korean phone number
///
/// Parses with the KR region and returns the national format
/// (`02-784-1234`), or `None` when the number is not valid.
pub fn normalize_kr_phone(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.chars().filter(|c| c.is_ascii_digit()).count() < 8 {
        return None;
    }

    match phonenumber::parse(Some(CountryId::KR), raw) {
        Ok(number) if phonenumber::is_valid(&number) => {
            let formatted = number.format().mode(Mode::National).to_string();
            tracing::debug!("Valid KR phone: {} -> {}", raw, formatted);
            Some(formatted)
        }
        Ok(_) => {
            tracing::warn!("Invalid KR phone number: {}", raw);
            None
        }
        Err(e) => {
            tracing::warn!("Failed to parse KR phone '{}': {:?}", raw, e);
            None
        }
    }
}
