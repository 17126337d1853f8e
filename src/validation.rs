//! Field rules for user drafts.
//!
//! Every rule is checked independently and all violations are reported
//! together, keyed by the form field they belong to.

use crate::user::User;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

// ASCII digits only; `\d` would also accept other Unicode decimal digits.
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{10}$").expect("valid phone regex"));

static WEBSITE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s$.?#].[^\s]*$").expect("valid website regex"));

const MIN_TEXT_LEN: usize = 3;

/// Form fields that can carry a validation error, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    Email,
    Phone,
    Username,
    Street,
    City,
    Company,
    Website,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Name,
        Field::Email,
        Field::Phone,
        Field::Username,
        Field::Street,
        Field::City,
        Field::Company,
        Field::Website,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Username => "username",
            Self::Street => "street",
            Self::City => "city",
            Self::Company => "company",
            Self::Website => "website",
        }
    }

    /// Human label used by the form view
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Email => "Email",
            Self::Phone => "Phone",
            Self::Username => "Username",
            Self::Street => "Street",
            Self::City => "City",
            Self::Company => "Company Name (Optional)",
            Self::Website => "Website (Optional)",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-keyed validation messages for a draft
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: BTreeMap<Field, String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.errors.insert(field, message.into());
    }

    /// Drop the message for one field; other fields keep theirs
    pub fn clear(&mut self, field: Field) {
        self.errors.remove(&field);
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.errors
            .get(&field)
            .map(String::as_str)
            .filter(|m| !m.is_empty())
    }

    #[cfg(test)]
    pub fn contains(&self, field: Field) -> bool {
        self.get(field).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.values().all(|m| m.is_empty())
    }

    pub fn len(&self) -> usize {
        self.errors.values().filter(|m| !m.is_empty()).count()
    }

    /// Fields with a message, in display order
    pub fn fields(&self) -> Vec<Field> {
        self.iter().map(|(field, _)| field).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.errors
            .iter()
            .filter(|(_, m)| !m.is_empty())
            .map(|(f, m)| (*f, m.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

fn too_short(value: &str) -> bool {
    value.chars().count() < MIN_TEXT_LEN
}

/// Check a draft against every field rule
pub fn validate(draft: &User) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if draft.name.is_empty() || too_short(&draft.name) {
        errors.insert(
            Field::Name,
            "Name is required and must be at least 3 characters long.",
        );
    }

    if draft.email.is_empty() || !EMAIL_PATTERN.is_match(&draft.email) {
        errors.insert(Field::Email, "A valid email is required.");
    }

    if draft.phone.is_empty() || !PHONE_PATTERN.is_match(&draft.phone) {
        errors.insert(
            Field::Phone,
            "Phone number is required and must be 10 digits.",
        );
    }

    if draft.username.is_empty() || too_short(&draft.username) {
        errors.insert(
            Field::Username,
            "Username is required and must be at least 3 characters long.",
        );
    }

    if draft.address.street.is_empty() {
        errors.insert(Field::Street, "Street is required.");
    }
    if draft.address.city.is_empty() {
        errors.insert(Field::City, "City is required.");
    }

    // Optional fields are only checked when filled in
    if !draft.company.name.is_empty() && too_short(&draft.company.name) {
        errors.insert(
            Field::Company,
            "Company name must be at least 3 characters long if provided.",
        );
    }

    if !draft.website.is_empty() && !WEBSITE_PATTERN.is_match(&draft.website) {
        errors.insert(Field::Website, "Website must be a valid URL if provided.");
    }

    errors
}
