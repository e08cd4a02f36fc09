//! Customer records.

use common::CustomerId;
use serde::{Deserialize, Serialize};

/// A registered customer. Email is the natural key used for dedup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub contact_number: Option<String>,
}

/// Insert payload for a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub contact_number: Option<String>,
}

impl NewCustomer {
    /// Builds an insert payload with a normalised email.
    pub fn new(
        name: impl Into<String>,
        email: &str,
        contact_number: Option<String>,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: normalize_email(email),
            contact_number: contact_number
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        }
    }

    pub fn into_customer(self, id: CustomerId) -> Customer {
        Customer {
            id,
            name: self.name,
            email: self.email,
            contact_number: self.contact_number,
        }
    }
}

/// Normalises an email for lookups: surrounding whitespace trimmed, lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
