use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ReviveError, Result, StoreError};

/// A value a [`crate::SessionStore`] can keep as the signed-in identity.
///
/// The store never looks inside a snapshot; it only converts it to and from
/// the raw JSON form a backend holds.
pub trait UserSnapshot: Serialize + DeserializeOwned + Send + Sync {
    /// Reconstruct a snapshot from its stored form.
    fn revive(raw: Value) -> Result<Self, ReviveError> {
        Ok(serde_json::from_value(raw)?)
    }

    /// Convert into the form handed to a backend.
    fn to_stored(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(StoreError::Serialization)
    }
}

impl UserSnapshot for Value {
    fn revive(raw: Value) -> Result<Self, ReviveError> {
        Ok(raw)
    }
}

/// Account timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// The signed-in user as kept by the SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub metadata: UserMetadata,
}

fn default_provider_id() -> String {
    "firebase".to_string()
}

impl User {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            email_verified: false,
            display_name: None,
            photo_url: None,
            phone_number: None,
            is_anonymous: false,
            provider_id: default_provider_id(),
            refresh_token: None,
            metadata: UserMetadata::default(),
        }
    }
}

impl UserSnapshot for User {
    fn revive(raw: Value) -> Result<Self, ReviveError> {
        let user: User = serde_json::from_value(raw)?;
        if user.uid.is_empty() {
            return Err(ReviveError::new("stored user has an empty uid"));
        }
        Ok(user)
    }
}
