use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(EventId);
id_newtype!(UserId);
id_newtype!(InterestId);

/// One entry of the global interest catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interest {
    #[serde(rename = "_id")]
    pub id: InterestId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// A committed event record as the server stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(rename = "_id")]
    pub id: EventId,
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_by: UserId,
    #[serde(default)]
    pub related_interests: Vec<Interest>,
    #[serde(default)]
    pub cover_photo: String,
}

/// The acting identity, as far as the wizard needs to know it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub admin: bool,
}

impl UserSummary {
    /// Owner-or-admin check used to gate edit access to a record.
    pub fn may_edit(&self, record: &EventRecord) -> bool {
        self.id == record.created_by || self.admin
    }
}
