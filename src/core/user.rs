//! The active user record and its stored string form.
//!
//! Buckets hold users as serialized strings, so two beacons from the same
//! user only collapse into one bucket entry if they serialize identically.

use serde::{Deserialize, Serialize};

/// A user seen on an activity key.
///
/// Identity is the `(id, name)` pair: the same id under a different name is a
/// different user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveUser {
    #[serde(rename = "Id")]
    id: i32,
    #[serde(rename = "Name")]
    name: String,
}

impl ActiveUser {
    /// Create a new active user.
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Error converting a user to or from its stored form.
#[derive(Debug, thiserror::Error)]
#[error("serialization error: {0}")]
pub struct SerializationError(String);

impl SerializationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<serde_json::Error> for SerializationError {
    fn from(e: serde_json::Error) -> Self {
        Self(e.to_string())
    }
}

/// Converts users to and from bucket members.
///
/// Implementations must be deterministic: equal users produce equal strings.
pub trait Serializer: Send + Sync {
    fn serialize(&self, user: &ActiveUser) -> Result<String, SerializationError>;
    fn deserialize(&self, member: &str) -> Result<ActiveUser, SerializationError>;
}

/// JSON member format, e.g. `{"Id":1,"Name":"John"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, user: &ActiveUser) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(user)?)
    }

    fn deserialize(&self, member: &str) -> Result<ActiveUser, SerializationError> {
        Ok(serde_json::from_str(member)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_is_id_and_name() {
        assert_eq!(ActiveUser::new(1, "John"), ActiveUser::new(1, "John"));
        assert_ne!(ActiveUser::new(1, "John"), ActiveUser::new(1, "Johnny"));
        assert_ne!(ActiveUser::new(1, "John"), ActiveUser::new(2, "John"));

        let set: HashSet<_> = [
            ActiveUser::new(1, "John"),
            ActiveUser::new(1, "John"),
            ActiveUser::new(1, "Johnny"),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_json_member_format() {
        let member = JsonSerializer
            .serialize(&ActiveUser::new(1, "John"))
            .unwrap();
        assert_eq!(member, r#"{"Id":1,"Name":"John"}"#);
    }

    #[test]
    fn test_equal_users_serialize_identically() {
        let a = JsonSerializer.serialize(&ActiveUser::new(7, "")).unwrap();
        let b = JsonSerializer.serialize(&ActiveUser::new(7, "")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_deserialize_preserves_fields() {
        let user = JsonSerializer
            .deserialize(r#"{"Id":-3,"Name":"Zoë \"Z\""}"#)
            .unwrap();
        assert_eq!(user.id(), -3);
        assert_eq!(user.name(), "Zoë \"Z\"");
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(JsonSerializer.deserialize("not json").is_err());
        assert!(JsonSerializer.deserialize(r#"{"Id":1}"#).is_err());
    }
}
