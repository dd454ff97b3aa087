use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberStatus {
    Enabled,
    Disabled,
    Blocklisted,
}

impl SubscriberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberStatus::Enabled => "enabled",
            SubscriberStatus::Disabled => "disabled",
            SubscriberStatus::Blocklisted => "blocklisted",
        }
    }
}

impl FromStr for SubscriberStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "enabled" => Ok(SubscriberStatus::Enabled),
            "disabled" => Ok(SubscriberStatus::Disabled),
            "blocklisted" => Ok(SubscriberStatus::Blocklisted),
            other => anyhow::bail!("unknown subscriber status {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscriber {
    pub id: i64,
    pub uuid: Uuid,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub attribs: Map<String, Value>,
    pub status: SubscriberStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
