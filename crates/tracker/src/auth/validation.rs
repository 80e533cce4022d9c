use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
});

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 255;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

/// Trimmed display name, or the reason it was rejected.
pub fn validate_name(name: &str) -> Result<String, &'static str> {
    let name = name.trim();
    let len = name.chars().count();
    if len < MIN_NAME_LEN {
        return Err("Name must be at least 2 characters long");
    }
    if len > MAX_NAME_LEN {
        return Err("Name is too long (max 100 characters)");
    }
    Ok(name.to_string())
}

/// Lower-cased, trimmed email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<String, &'static str> {
    let email = normalize_email(email);
    if email.len() > MAX_EMAIL_LEN {
        return Err("Email is too long (max 255 characters)");
    }
    if !EMAIL_RE.is_match(&email) {
        return Err("Invalid email format");
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> Result<(), &'static str> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err("Password must be at least 8 characters long");
    }
    if len > MAX_PASSWORD_LEN {
        return Err("Password is too long (max 128 characters)");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number");
    }
    Ok(())
}
