//! Input validation for account registration

use regex::Regex;
use std::sync::OnceLock;

/// Validate username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if username.len() < 3 {
        return Err("Username must be at least 3 characters long".to_string());
    }

    if username.len() > 32 {
        return Err("Username must be at most 32 characters long".to_string());
    }

    static USERNAME_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = USERNAME_REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").ok());

    match regex {
        Some(regex) if regex.is_match(username) => Ok(()),
        Some(_) => Err("Username can only contain letters, numbers, and underscores".to_string()),
        None => Err("Username could not be validated".to_string()),
    }
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    let length = password.chars().count();
    if length < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if length > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    let has_letter = password.chars().any(char::is_alphabetic);
    let has_other = password.chars().any(|c| !c.is_alphabetic());

    if !has_letter || !has_other {
        return Err("Password must mix letters with digits or symbols".to_string());
    }

    Ok(())
}

/// Validate the name shown next to photos and comments
pub fn validate_display_name(display_name: &str) -> Result<(), String> {
    let trimmed = display_name.trim();

    if trimmed.is_empty() {
        return Err("Display name is required".to_string());
    }

    if trimmed.chars().count() > 64 {
        return Err("Display name must be at most 64 characters long".to_string());
    }

    if trimmed.chars().any(char::is_control) {
        return Err("Display name cannot contain control characters".to_string());
    }

    Ok(())
}

/// Validate an optional avatar reference
pub fn validate_avatar_url(avatar_url: &str) -> Result<(), String> {
    if avatar_url.len() > 2048 {
        return Err("Avatar URL must be at most 2048 characters long".to_string());
    }

    if !(avatar_url.starts_with("https://") || avatar_url.starts_with('/')) {
        return Err("Avatar URL must be an https URL or an absolute path".to_string());
    }

    Ok(())
}
