use serde::{Deserialize, Serialize};

use crate::pii::Masked;

/// The five contact fields collected at checkout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    Title,
    FirstName,
    LastName,
    Email,
    Phone,
}

impl ContactField {
    pub const ALL: [ContactField; 5] = [
        ContactField::Title,
        ContactField::FirstName,
        ContactField::LastName,
        ContactField::Email,
        ContactField::Phone,
    ];

    /// Key used in NLU replies.
    pub fn key(&self) -> &'static str {
        match self {
            ContactField::Title => "title",
            ContactField::FirstName => "first_name",
            ContactField::LastName => "last_name",
            ContactField::Email => "email",
            ContactField::Phone => "phone",
        }
    }

    /// Alternative spellings seen in collaborator output.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            ContactField::Title => &["title"],
            ContactField::FirstName => &["first_name", "firstname", "firstName"],
            ContactField::LastName => &["last_name", "lastname", "lastName"],
            ContactField::Email => &["email", "email_address"],
            ContactField::Phone => &["phone", "phone_number", "telephone"],
        }
    }

    /// Title is optional; everything else gates completeness.
    pub fn is_required(&self) -> bool {
        !matches!(self, ContactField::Title)
    }
}

/// Contact details for the whole checkout, shared by every item in it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactInfo {
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
}

impl ContactInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: ContactField) -> &str {
        match field {
            ContactField::Title => &self.title,
            ContactField::FirstName => &self.first_name,
            ContactField::LastName => &self.last_name,
            ContactField::Email => self.email.expose(),
            ContactField::Phone => self.phone.expose(),
        }
    }

    /// Sets a field unless the new value is blank. Returns whether anything changed.
    pub fn set(&mut self, field: ContactField, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || self.get(field) == value {
            return false;
        }
        let value = value.to_string();
        match field {
            ContactField::Title => self.title = value,
            ContactField::FirstName => self.first_name = value,
            ContactField::LastName => self.last_name = value,
            ContactField::Email => self.email = Masked::new(value),
            ContactField::Phone => self.phone = Masked::new(value),
        }
        true
    }

    pub fn missing_fields(&self) -> Vec<ContactField> {
        ContactField::ALL
            .iter()
            .copied()
            .filter(|f| f.is_required() && self.get(*f).trim().is_empty())
            .collect()
    }

    /// Complete iff first name, last name, email and phone are all present.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}
