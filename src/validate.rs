//! Email normalization, validation and domain reputation.
//!
//! Validation is the only step of a collection that may fail the call: it
//! runs before any network activity and yields
//! [`IntelError::InvalidEmail`] on a malformed address.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::IntelError;

static EMAIL_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

static EMAIL_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b").unwrap());

const DISPOSABLE_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "tempmail.org",
    "guerrillamail.com",
    "mailinator.com",
    "yopmail.com",
    "temp-mail.org",
];

const POPULAR_PROVIDERS: &[(&str, &str)] = &[
    ("gmail.com", "Google"),
    ("yahoo.com", "Yahoo"),
    ("outlook.com", "Microsoft"),
    ("hotmail.com", "Microsoft"),
    ("icloud.com", "Apple"),
    ("aol.com", "AOL"),
    ("mail.ru", "Mail.Ru"),
    ("yandex.ru", "Yandex"),
];

const EDUCATIONAL_SUFFIXES: &[&str] = &[".edu", ".ac.uk", ".edu.au", ".edu.cn"];
const GOVERNMENT_SUFFIXES: &[&str] = &[".gov", ".gov.uk", ".gov.au", ".gov.cn"];

/// A validated, normalized address split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress {
    pub email: String,
    pub username: String,
    pub domain: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainType {
    PopularProvider,
    Educational,
    Government,
    Business,
}

/// Validation and reputation facts about the target address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailInfo {
    pub email: String,
    pub username: String,
    pub domain: String,
    pub is_disposable: bool,
    pub domain_type: DomainType,
    /// `Google`, `Mail.Ru`, `Educational`, `Business`, ...
    pub provider_type: String,
}

/// Trim and lowercase.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_valid_email(raw: &str) -> bool {
    EMAIL_FORMAT.is_match(&normalize_email(raw))
}

/// Normalize and validate `raw`, splitting it into username and domain.
pub fn parse_email(raw: &str) -> Result<EmailAddress, IntelError> {
    let email = normalize_email(raw);
    if email.is_empty() {
        return Err(IntelError::InvalidEmail {
            email,
            reason: "empty address".to_string(),
        });
    }
    if !EMAIL_FORMAT.is_match(&email) {
        return Err(IntelError::InvalidEmail {
            email,
            reason: "address does not match local@domain.tld".to_string(),
        });
    }
    // The format regex guarantees exactly one '@' is present.
    let (username, domain) = email.split_once('@').unwrap_or((email.as_str(), ""));
    Ok(EmailAddress {
        username: username.to_string(),
        domain: domain.to_string(),
        email: email.clone(),
    })
}

pub fn is_disposable(domain: &str) -> bool {
    let domain = domain.to_lowercase();
    DISPOSABLE_DOMAINS.contains(&domain.as_str())
}

/// Classify a mail domain. Educational and government suffixes take
/// precedence over the popular-provider table.
pub fn domain_reputation(domain: &str) -> (DomainType, String) {
    let domain = domain.to_lowercase();
    if GOVERNMENT_SUFFIXES.iter().any(|s| domain.ends_with(s)) {
        return (DomainType::Government, "Government".to_string());
    }
    if EDUCATIONAL_SUFFIXES.iter().any(|s| domain.ends_with(s)) {
        return (DomainType::Educational, "Educational".to_string());
    }
    if let Some((_, name)) = POPULAR_PROVIDERS.iter().find(|(d, _)| *d == domain) {
        return (DomainType::PopularProvider, name.to_string());
    }
    (DomainType::Business, "Business".to_string())
}

impl EmailAddress {
    pub fn info(&self) -> EmailInfo {
        let (domain_type, provider_type) = domain_reputation(&self.domain);
        EmailInfo {
            email: self.email.clone(),
            username: self.username.clone(),
            domain: self.domain.clone(),
            is_disposable: is_disposable(&self.domain),
            domain_type,
            provider_type,
        }
    }
}

/// All valid addresses in `text`, lowercased, in order of first appearance.
pub fn extract_emails(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in EMAIL_IN_TEXT.find_iter(text) {
        let email = m.as_str().to_lowercase();
        if EMAIL_FORMAT.is_match(&email) && !out.contains(&email) {
            out.push(email);
        }
    }
    out
}
