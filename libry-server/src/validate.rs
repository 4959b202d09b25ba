//! Request field validation

use crate::error::ApiError;

/// Symbols accepted by the password policy
const PASSWORD_SYMBOLS: &str = "$&+,:;=?@#|'<>.^*()%!-";

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

/// E.164: a leading `+` and 8 to 15 digits, no leading zero
pub fn phone_number(value: &str) -> Result<(), ApiError> {
    let digits = value
        .strip_prefix('+')
        .ok_or_else(|| ApiError::ValidationError("phone number must start with +".into()))?;

    let valid = (8..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0');

    if !valid {
        return Err(ApiError::ValidationError("invalid phone number".into()));
    }
    Ok(())
}

pub fn email(value: &str) -> Result<(), ApiError> {
    let invalid = || ApiError::ValidationError("invalid email".into());

    if value.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if host.is_empty() || tld.len() < 2 {
        return Err(invalid());
    }
    Ok(())
}

/// Password policy: at least eight characters with a lowercase letter, an
/// uppercase letter, a digit and a symbol, and nothing outside that alphabet.
pub fn password(value: &str) -> Result<(), String> {
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }

    let is_symbol = |c: char| PASSWORD_SYMBOLS.contains(c);
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || is_symbol(*c)))
    {
        return Err(format!("password contains unsupported character {:?}", c));
    }

    let has_lower = value.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = value.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = value.chars().any(|c| c.is_ascii_digit());
    let has_symbol = value.chars().any(is_symbol);

    if !(has_lower && has_upper && has_digit && has_symbol) {
        return Err(
            "password needs an uppercase letter, a lowercase letter, a number and a symbol"
                .to_string(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_numbers() {
        assert!(phone_number("+94770000001").is_ok());
        assert!(phone_number("+14155552671").is_ok());
        assert!(phone_number("94770000001").is_err());
        assert!(phone_number("+0770000001").is_err());
        assert!(phone_number("+9477abc0001").is_err());
        assert!(phone_number("+123").is_err());
    }

    #[test]
    fn test_emails() {
        assert!(email("a@x.com").is_ok());
        assert!(email("first.last@mail.example.org").is_ok());
        assert!(email("no-at-sign").is_err());
        assert!(email("@x.com").is_err());
        assert!(email("a@x").is_err());
        assert!(email("a b@x.com").is_err());
        assert!(email("a@b@x.com").is_err());
    }

    #[test]
    fn test_password_policy() {
        assert!(password("Passw0rd!").is_ok());
        assert!(password("Sh0rt!").is_err());
        assert!(password("password1!").is_err());
        assert!(password("PASSWORD1!").is_err());
        assert!(password("Password!!").is_err());
        assert!(password("Password11").is_err());
        assert!(password("Passw0rd!~").is_err());
    }
}
