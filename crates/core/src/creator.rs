use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Zelle,
    Wire,
    Ach,
    Check,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Zelle => write!(f, "zelle"),
            PaymentMethod::Wire => write!(f, "wire"),
            PaymentMethod::Ach => write!(f, "ach"),
            PaymentMethod::Check => write!(f, "check"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zelle" => Ok(PaymentMethod::Zelle),
            "wire" => Ok(PaymentMethod::Wire),
            "ach" => Ok(PaymentMethod::Ach),
            "check" | "cheque" => Ok(PaymentMethod::Check),
            other => Err(format!("Unknown payment method: '{other}'")),
        }
    }
}

/// How the agency pays a creator; the handle is what shows up on the statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorPaymentInfo {
    pub creator_id: String,
    pub creator_name: String,
    pub payment_method: PaymentMethod,
    /// Zelle email/phone, or a bank reference.
    pub payment_handle: Option<String>,
    pub notes: Option<String>,
}

/// Entry of the talent roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterCreator {
    pub id: String,
    pub name: String,
}

impl RosterCreator {
    pub fn new(id: &str, name: &str) -> Self {
        RosterCreator {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}
