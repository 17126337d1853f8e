//! User record as exchanged with the remote users collection.

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier assigned by the remote service
pub type UserId = u64;

/// Decode an explicit `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Postal address of a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Address {
    #[serde(default, deserialize_with = "null_as_default")]
    pub street: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
}

/// Employer of a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Company {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// A user record. Missing or null strings decode as empty and unknown fields are ignored,
/// so records from the service round-trip through the form without loss of the
/// fields we edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: Address,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: Company,
    #[serde(default, deserialize_with = "null_as_default")]
    pub website: String,
}

impl User {
    /// Identifier as a display string, `-` when not yet assigned
    pub fn id_label(&self) -> String {
        self.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
    }
}
