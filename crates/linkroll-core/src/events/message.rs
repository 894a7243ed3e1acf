//! Wire formats for domain events
//!
//! Two categories with different guarantees:
//!
//! - Job messages go to the durable queue and must survive a broker
//!   restart until a consumer acknowledges them.
//! - Log messages fan out to whoever is listening; no persistence, no
//!   acknowledgment. They carry a `time` stamp set at publish time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What happened to a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "added")]
    Added,
    #[serde(rename = "modified")]
    Modified,
    #[serde(rename = "deleted")]
    Deleted,
    #[serde(rename = "viewed:link")]
    ViewedLink,
    #[serde(rename = "viewed:field")]
    ViewedField,
    #[serde(rename = "viewed:exists")]
    ViewedExists,
    #[serde(rename = "viewed:listing")]
    ViewedListing,
}

/// Durable message for downstream workers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    pub link_id: String,
    pub action: Action,
    /// Changed field names and values; only present for `modified`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

impl JobMessage {
    pub fn added(link_id: &str) -> Self {
        Self {
            link_id: link_id.to_string(),
            action: Action::Added,
            fields: None,
        }
    }

    pub fn modified(link_id: &str, fields: &BTreeMap<String, String>) -> Self {
        Self {
            link_id: link_id.to_string(),
            action: Action::Modified,
            fields: Some(fields.clone()),
        }
    }

    pub fn deleted(link_id: &str) -> Self {
        Self {
            link_id: link_id.to_string(),
            action: Action::Deleted,
            fields: None,
        }
    }
}

/// Ephemeral broadcast message for auditors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    /// Publish-time timestamp, stamped by the publisher
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl LogMessage {
    fn for_link(link_id: &str, action: Action) -> Self {
        Self {
            link_id: Some(link_id.to_string()),
            field: None,
            action,
            exists: None,
            time: None,
        }
    }

    pub fn added(link_id: &str) -> Self {
        Self::for_link(link_id, Action::Added)
    }

    pub fn modified(link_id: &str) -> Self {
        Self::for_link(link_id, Action::Modified)
    }

    pub fn deleted(link_id: &str) -> Self {
        Self::for_link(link_id, Action::Deleted)
    }

    pub fn viewed_link(link_id: &str) -> Self {
        Self::for_link(link_id, Action::ViewedLink)
    }

    pub fn viewed_field(link_id: &str, field: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            ..Self::for_link(link_id, Action::ViewedField)
        }
    }

    pub fn viewed_exists(link_id: &str, exists: bool) -> Self {
        Self {
            exists: Some(exists),
            ..Self::for_link(link_id, Action::ViewedExists)
        }
    }

    pub fn viewed_listing() -> Self {
        Self {
            link_id: None,
            field: None,
            action: Action::ViewedListing,
            exists: None,
            time: None,
        }
    }
}
