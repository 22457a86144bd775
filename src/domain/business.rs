use serde::{Deserialize, Serialize};

/// Cosmetic details shown alongside the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessInfo {
    pub name: String,
    pub owner: String,
    /// Currency symbol printed before amounts, e.g. "$"
    pub currency: String,
}

impl Default for BusinessInfo {
    fn default() -> Self {
        Self {
            name: "My Business".to_string(),
            owner: "Business Owner".to_string(),
            currency: "$".to_string(),
        }
    }
}
