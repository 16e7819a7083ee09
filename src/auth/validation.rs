use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::ValidateEmail;

use crate::database::models::NewUser;

pub const MAX_NAME_LENGTH: usize = 255;
pub const MAX_EMAIL_LENGTH: usize = 255;
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Per-field validation messages, serialized as `{field: [message, ...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Emails are compared trimmed and lowercased everywhere
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registration form as submitted. Every field is optional here so a missing
/// or non-string field is reported as a validation message rather than a
/// parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "RegistrationBody")]
pub struct Registration {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    /// Fields that were present but not JSON strings
    pub mistyped: Vec<&'static str>,
}

#[derive(Deserialize)]
struct RegistrationBody {
    #[serde(default)]
    name: Value,
    #[serde(default)]
    email: Value,
    #[serde(default)]
    password: Value,
    #[serde(default)]
    password_confirmation: Value,
}

impl From<RegistrationBody> for Registration {
    fn from(body: RegistrationBody) -> Self {
        let mut mistyped = Vec::new();
        let mut take = |field: &'static str, value: Value| match value {
            Value::String(s) => Some(s),
            Value::Null => None,
            _ => {
                mistyped.push(field);
                None
            }
        };

        let name = take("name", body.name);
        let email = take("email", body.email);
        let password = take("password", body.password);
        let password_confirmation = take("password_confirmation", body.password_confirmation);

        Self {
            name,
            email,
            password,
            password_confirmation,
            mistyped,
        }
    }
}

impl Registration {
    /// Everything that can be checked without looking at stored users
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        for &field in &self.mistyped {
            let reported = if field == "password_confirmation" { "password" } else { field };
            if !errors.has(reported) {
                errors.add(reported, format!("The {} must be a string.", field.replace('_', " ")));
            }
        }

        match present(&self.name) {
            _ if errors.has("name") => {}
            None => errors.add("name", "The name field is required."),
            Some(name) if name.chars().count() > MAX_NAME_LENGTH => errors.add(
                "name",
                format!("The name may not be greater than {} characters.", MAX_NAME_LENGTH),
            ),
            Some(_) => {}
        }

        match present(&self.email) {
            _ if errors.has("email") => {}
            None => errors.add("email", "The email field is required."),
            Some(email) => {
                if !email.validate_email() {
                    errors.add("email", "The email must be a valid email address.");
                }
                if email.chars().count() > MAX_EMAIL_LENGTH {
                    errors.add(
                        "email",
                        format!("The email may not be greater than {} characters.", MAX_EMAIL_LENGTH),
                    );
                }
            }
        }

        // Passwords are not trimmed; only an empty one counts as missing
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            _ if errors.has("password") => {}
            None => errors.add("password", "The password field is required."),
            Some(password) => {
                if self.password_confirmation.as_deref() != Some(password) {
                    errors.add("password", "The password confirmation does not match.");
                }
                if password.chars().count() < MIN_PASSWORD_LENGTH {
                    errors.add(
                        "password",
                        format!("The password must be at least {} characters.", MIN_PASSWORD_LENGTH),
                    );
                }
            }
        }

        errors
    }

    /// Normalized email, if one was supplied
    pub fn email(&self) -> Option<String> {
        present(&self.email).map(normalize_email)
    }

    /// Build the user to create. Only meaningful once `validate` came back empty.
    pub fn into_new_user(self) -> NewUser {
        NewUser {
            name: self.name.unwrap_or_default().trim().to_string(),
            email: normalize_email(&self.email.unwrap_or_default()),
            password: self.password.unwrap_or_default(),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
