//! Input checks for registration and profile updates.
//! Messages are returned to the client as-is.

use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

pub fn validate_username(username: &str) -> Result<(), String> {
    let length = username.chars().count();
    if length < 3 {
        return Err("Username must be at least 3 characters long".to_string());
    }
    if length > 255 {
        return Err("Username must be at most 255 characters long".to_string());
    }
    // Question answering accepts a UUID or a username as the user identifier.
    if Uuid::parse_str(username).is_ok() {
        return Err("Username must not be a UUID".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 6 {
        return Err("Password must be at least 6 characters long".to_string());
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }
    if name.chars().count() > 255 {
        return Err("Name must be at most 255 characters long".to_string());
    }
    Ok(())
}

static MAIL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn mail_pattern() -> &'static Regex {
    MAIL_PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").expect("mail pattern compiles")
    })
}

pub fn validate_email(mail: &str) -> Result<(), String> {
    match mail.len() {
        0 => Err("Mail address is required".to_string()),
        len if len > 254 => Err("Mail address is too long".to_string()),
        _ if !mail_pattern().is_match(mail) => Err(format!("'{mail}' is not a valid mail address")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_length_bounds() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_username_cannot_look_like_a_user_id() {
        let id = Uuid::new_v4();
        assert!(validate_username(&id.to_string()).is_err());
        assert!(validate_username(&id.simple().to_string()).is_err());
        assert!(validate_username("user_12345").is_ok());
    }

    #[test]
    fn test_password_minimum() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_name_required() {
        assert!(validate_name("   ").is_err());
        assert!(validate_name("Ada Lovelace").is_ok());
    }

    #[test]
    fn test_email_format() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("ada@example").is_err());
        assert!(validate_email("not an email").is_err());
        assert!(validate_email("").is_err());
        assert!(validate_email("a@b@example.com").is_err());
    }
}
