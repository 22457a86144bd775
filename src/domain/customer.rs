use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, amount_serde};

pub type CustomerId = Uuid;

/// A customer who can take goods on credit and pay them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    /// Net outstanding amount; positive means the customer owes money.
    #[serde(with = "amount_serde")]
    pub balance: Cents,
    pub created_at: DateTime<Utc>,
}

/// Contact details supplied when creating a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerProfile {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

impl CustomerProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }
}

/// Partial profile edit. Only the fields that are `Some` are replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl CustomerUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.email.is_none() && self.address.is_none()
    }
}

impl Customer {
    /// Create a customer with a fresh id and a zero balance.
    pub fn new(profile: CustomerProfile) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: profile.name,
            phone: profile.phone,
            email: profile.email,
            address: profile.address,
            balance: 0,
            created_at: Utc::now(),
        }
    }

    /// Apply a partial profile edit. Identity and balance are never touched.
    pub fn apply(&mut self, update: CustomerUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(phone) = update.phone {
            self.phone = phone;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(address) = update.address {
            self.address = address;
        }
    }

    pub fn owes_money(&self) -> bool {
        self.balance > 0
    }
}
