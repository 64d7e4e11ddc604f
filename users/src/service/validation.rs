use lazy_static::lazy_static;
use regex::Regex;

use common::error::{self, AddCode};

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap();
    static ref PHONE: Regex = Regex::new(r"^\+?[0-9 ()-]{7,20}$").unwrap();
}

const MIN_PASSWORD_CHARS: usize = 8;

pub fn normalize_email(email: &str) -> error::Result<String> {
    let email = email.trim().to_lowercase();
    if !EMAIL.is_match(&email) {
        return Err(anyhow::anyhow!("email: invalid email address").code(400));
    }
    Ok(email)
}

pub fn name(name: &str) -> error::Result<String> {
    let name = name.trim();
    let length = name.chars().count();
    if !(2..=100).contains(&length) {
        return Err(anyhow::anyhow!("name: must be between 2 and 100 characters").code(400));
    }
    Ok(name.to_string())
}

pub fn password(password: &str) -> error::Result<()> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(anyhow::anyhow!(
            "password: must be at least {} characters",
            MIN_PASSWORD_CHARS
        )
        .code(400));
    }
    Ok(())
}

pub fn phone(phone: Option<String>) -> error::Result<Option<String>> {
    match phone.map(|phone| phone.trim().to_string()) {
        Some(phone) if phone.is_empty() => Ok(None),
        Some(phone) if !PHONE.is_match(&phone) => {
            Err(anyhow::anyhow!("phone: invalid phone number").code(400))
        }
        phone => Ok(phone),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_lowercased() {
        assert_eq!(normalize_email(" Asha@Example.COM ").unwrap(), "asha@example.com");
        assert_eq!(normalize_email("not-an-email").unwrap_err().code, 400);
    }

    #[test]
    fn blank_phone_is_absent() {
        assert_eq!(phone(Some("  ".to_string())).unwrap(), None);
        assert_eq!(
            phone(Some("+91 98450 12345".to_string())).unwrap().as_deref(),
            Some("+91 98450 12345")
        );
        assert!(phone(Some("call me".to_string())).is_err());
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(password("short").is_err());
        assert!(password("long enough").is_ok());
    }
}
