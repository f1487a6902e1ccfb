use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::db::entities::monitored_target;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTarget {
    pub url: String,
    pub name: Option<String>,
    pub check_interval: i32,
    pub timeout: i32,
    pub is_active: Option<bool>,
}

/// Marks a key as present even when its value is `null`. Absent keys fall
/// back to `None` through `#[serde(default)]`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Partial update of configuration fields. `url` is accepted only so that an
/// attempt to change it can be rejected explicitly, `null` included.
/// `name: null` clears the name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTarget {
    #[serde(default, deserialize_with = "present")]
    pub url: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Option<String>>,
    pub check_interval: Option<i32>,
    pub timeout: Option<i32>,
    pub is_active: Option<bool>,
}

impl UpdateTarget {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.check_interval.is_none()
            && self.timeout.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDetails {
    pub id: i32,
    pub url: String,
    pub name: Option<String>,
    pub check_interval: i32,
    pub timeout: i32,
    pub is_active: bool,
    pub next_check_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub consecutive_failures: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<monitored_target::Model> for TargetDetails {
    fn from(model: monitored_target::Model) -> Self {
        Self {
            id: model.id,
            url: model.url,
            name: model.name,
            check_interval: model.check_interval_seconds,
            timeout: model.timeout_seconds,
            is_active: model.is_active,
            next_check_at: model.next_check_at,
            last_checked_at: model.last_checked_at,
            consecutive_failures: model.consecutive_failures,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Body of create and update responses.
#[derive(Debug, Serialize)]
pub struct TargetMutation {
    pub message: String,
    pub monitored: TargetDetails,
}
