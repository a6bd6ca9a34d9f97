use crate::error::{AppError, AppResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Canonical user identifier.
///
/// Clients send ids as JSON strings or numbers (`"42"`, `42`, `" 42 "`); every
/// form is coerced to the same trimmed string before it reaches the registry
/// or the store, so `42` and `"42"` address the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("userId must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn normalize(value: &Value) -> AppResult<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self(i.to_string()))
                } else if let Some(u) = n.as_u64() {
                    Ok(Self(u.to_string()))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.is_finite() => {
                            Ok(Self(format!("{}", f as i64)))
                        }
                        _ => Err(AppError::Validation(format!(
                            "userId must be an integer, got {n}"
                        ))),
                    }
                }
            }
            Value::Null => Err(AppError::Validation("userId is required".to_string())),
            other => Err(AppError::Validation(format!(
                "userId must be a string or number, got {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        UserId::normalize(&value).map_err(serde::de::Error::custom)
    }
}

/// Platform role, owned by the user directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Buyer,
    Seller,
    Agent,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Buyer => "buyer",
            UserRole::Seller => "seller",
            UserRole::Agent => "agent",
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buyer" => Ok(UserRole::Buyer),
            "seller" => Ok(UserRole::Seller),
            "agent" => Ok(UserRole::Agent),
            "admin" => Ok(UserRole::Admin),
            other => Err(AppError::Validation(format!("unknown user role: {other}"))),
        }
    }
}
