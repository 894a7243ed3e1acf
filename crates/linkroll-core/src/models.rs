//! Data models for linkroll
//!
//! A link record is a flat mapping of field name to string value. The typed
//! structs here are the in-memory view; the repository persists the same six
//! fields row by row so single-field reads stay cheap.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Field names as stored and as carried in event payloads.
pub mod fields {
    pub const PAGE_TITLE: &str = "page_title";
    pub const DESC_TEXT: &str = "desc_text";
    pub const URL_ADDRESS: &str = "url_address";
    pub const AUTHOR: &str = "author";
    pub const CREATED: &str = "created";
    pub const LINK_ID: &str = "link_id";
}

/// Canonical textual form for timestamps: RFC 3339 with an explicit UTC
/// offset and sub-second resolution.
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// A stored link bookmark
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkRecord {
    /// Opaque identifier, assigned at creation
    pub link_id: String,
    /// Display title of the bookmarked page
    pub page_title: String,
    /// Free-form description
    pub desc_text: String,
    /// The bookmarked URL, unique across live records
    pub url_address: String,
    /// Submitting user
    pub author: String,
    /// When this link was created
    pub created: DateTime<Utc>,
}

impl LinkRecord {
    /// Score for the chronological index: creation time as fractional
    /// epoch seconds.
    pub fn score(&self) -> f64 {
        self.created.timestamp_micros() as f64 / 1_000_000.0
    }

    /// Flatten into the stored field mapping.
    pub fn to_fields(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(fields::LINK_ID.to_string(), self.link_id.clone());
        map.insert(fields::PAGE_TITLE.to_string(), self.page_title.clone());
        map.insert(fields::DESC_TEXT.to_string(), self.desc_text.clone());
        map.insert(fields::URL_ADDRESS.to_string(), self.url_address.clone());
        map.insert(fields::AUTHOR.to_string(), self.author.clone());
        map.insert(fields::CREATED.to_string(), format_timestamp(&self.created));
        map
    }

    /// Rebuild a record from its stored field mapping.
    ///
    /// Records are only ever written whole, inside one transaction, so a
    /// partial mapping means the record is not present.
    pub fn from_fields(map: &BTreeMap<String, String>) -> Option<Self> {
        let created = map.get(fields::CREATED)?;
        let created = DateTime::parse_from_rfc3339(created)
            .ok()?
            .with_timezone(&Utc);

        Some(Self {
            link_id: map.get(fields::LINK_ID)?.clone(),
            page_title: map.get(fields::PAGE_TITLE)?.clone(),
            desc_text: map.get(fields::DESC_TEXT)?.clone(),
            url_address: map.get(fields::URL_ADDRESS)?.clone(),
            author: map.get(fields::AUTHOR)?.clone(),
            created,
        })
    }

    /// Look up a single field by name in its canonical string form.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            fields::LINK_ID => Some(self.link_id.clone()),
            fields::PAGE_TITLE => Some(self.page_title.clone()),
            fields::DESC_TEXT => Some(self.desc_text.clone()),
            fields::URL_ADDRESS => Some(self.url_address.clone()),
            fields::AUTHOR => Some(self.author.clone()),
            fields::CREATED => Some(format_timestamp(&self.created)),
            _ => None,
        }
    }
}

/// Payload for creating a link
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewLink {
    pub page_title: String,
    pub desc_text: String,
    pub url_address: String,
    pub author: String,
    /// Creation time; defaults to now when absent
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

impl NewLink {
    pub fn new(
        page_title: impl Into<String>,
        desc_text: impl Into<String>,
        url_address: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            page_title: page_title.into(),
            desc_text: desc_text.into(),
            url_address: url_address.into(),
            author: author.into(),
            created: None,
        }
    }

    /// Set an explicit creation time (imports, backfills).
    pub fn created_at(mut self, time: DateTime<Utc>) -> Self {
        self.created = Some(time);
        self
    }

    /// Assign an identifier and default timestamp, producing the record to
    /// store. Identifiers are random so they leak nothing about record
    /// count or insertion order.
    pub fn into_record(self) -> LinkRecord {
        LinkRecord {
            link_id: Uuid::new_v4().simple().to_string(),
            page_title: self.page_title,
            desc_text: self.desc_text,
            url_address: self.url_address,
            author: self.author,
            created: self.created.unwrap_or_else(Utc::now),
        }
    }
}

/// Field-level merge for `modify`
///
/// `link_id` and `created` are immutable after creation and have no patch
/// slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LinkPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl LinkPatch {
    pub fn is_empty(&self) -> bool {
        self.page_title.is_none()
            && self.desc_text.is_none()
            && self.url_address.is_none()
            && self.author.is_none()
    }

    /// The changed fields as a name to value mapping, as stored and as
    /// carried in the `modified` job message.
    pub fn to_fields(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(v) = &self.page_title {
            map.insert(fields::PAGE_TITLE.to_string(), v.clone());
        }
        if let Some(v) = &self.desc_text {
            map.insert(fields::DESC_TEXT.to_string(), v.clone());
        }
        if let Some(v) = &self.url_address {
            map.insert(fields::URL_ADDRESS.to_string(), v.clone());
        }
        if let Some(v) = &self.author {
            map.insert(fields::AUTHOR.to_string(), v.clone());
        }
        map
    }
}
