use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Required length of a MAC address in `XX:XX:XX:XX:XX:XX` form.
pub const MAC_ADDRESS_LEN: usize = 17;

/// Required length of an owner code.
pub const OWNER_CODE_LEN: usize = 3;

/// Unique identifier for a machine record.
///
/// This is a strongly-typed wrapper to avoid accidental mixing
/// of record IDs with counts or other integers. `0` is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MachineId(pub u64);

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the employee a machine is assigned to.
///
/// Always exactly three characters with no uppercase letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerCode(String);

impl OwnerCode {
    pub fn parse(code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into();
        if code.chars().count() != OWNER_CODE_LEN {
            return Err(ValidationError::OwnerCodeLength);
        }
        if code != code.to_lowercase() {
            return Err(ValidationError::OwnerCodeCase);
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OwnerCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<OwnerCode> for String {
    fn from(code: OwnerCode) -> Self {
        code.0
    }
}

impl fmt::Display for OwnerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Severity tag carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// Advisory message sent to the notification endpoint.
///
/// Notifications are transient: built per triggering mutation, owned by
/// the delivery that carries them and dropped once it concludes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: Level,

    /// Employee the notification concerns.
    #[serde(rename = "employeeAbbreviation")]
    pub owner_code: OwnerCode,

    /// Human-readable text.
    pub message: String,

    /// RFC3339 timestamp. Filled in by the transport when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Notification {
    pub fn new(level: Level, owner_code: OwnerCode, message: impl Into<String>) -> Self {
        Self {
            level,
            owner_code,
            message: message.into(),
            timestamp: None,
        }
    }

    /// Create a `warning` level notification without a timestamp.
    pub fn warning(owner_code: OwnerCode, message: impl Into<String>) -> Self {
        Self::new(Level::Warning, owner_code, message)
    }

    /// Pin the timestamp instead of letting the transport assign one.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

/// Caller input for creating or replacing a machine record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineDraft {
    pub mac_address: String,
    pub name: String,
    pub ip_address: String,
    /// Empty or missing means the machine is unassigned.
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl MachineDraft {
    pub fn new(
        mac_address: impl Into<String>,
        name: impl Into<String>,
        ip_address: impl Into<String>,
    ) -> Self {
        Self {
            mac_address: mac_address.into(),
            name: name.into(),
            ip_address: ip_address.into(),
            owner: None,
            description: String::new(),
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check the business rules and produce a record the store accepts.
    pub fn validate(self) -> Result<MachineRecord, ValidationError> {
        if self.mac_address.is_empty() {
            return Err(ValidationError::MissingField("mac_address"));
        }
        if self.name.is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.ip_address.is_empty() {
            return Err(ValidationError::MissingField("ip_address"));
        }
        if self.mac_address.chars().count() != MAC_ADDRESS_LEN {
            return Err(ValidationError::MacAddressLength);
        }

        let owner = match self.owner {
            Some(code) if !code.is_empty() => Some(OwnerCode::parse(code)?),
            _ => None,
        };

        Ok(MachineRecord {
            mac_address: self.mac_address,
            name: self.name,
            ip_address: self.ip_address,
            owner,
            description: self.description,
        })
    }
}

/// Validated machine fields, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRecord {
    pub mac_address: String,
    pub name: String,
    pub ip_address: String,
    pub owner: Option<OwnerCode>,
    pub description: String,
}

/// A stored machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub mac_address: String,
    pub name: String,
    pub ip_address: String,
    pub owner: Option<OwnerCode>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
