use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of an authenticated user.
pub type UserId = String;

/// Opaque identifier assigned by the record store on create.
pub type RecordId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
}

/// Lifecycle stage of a tracked application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "Application Submitted")]
    Submitted,
    #[serde(rename = "OA Received")]
    OaReceived,
    #[serde(rename = "OA Completed")]
    OaCompleted,
    Interview,
    Rejected,
    Offer,
    /// Stored value missing or not one of the known labels.
    Unknown,
}

impl Status {
    /// The selectable statuses, in chart order.
    pub const ALL: [Status; 6] = [
        Status::Submitted,
        Status::OaReceived,
        Status::OaCompleted,
        Status::Interview,
        Status::Rejected,
        Status::Offer,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Status::Submitted => "Application Submitted",
            Status::OaReceived => "OA Received",
            Status::OaCompleted => "OA Completed",
            Status::Interview => "Interview",
            Status::Rejected => "Rejected",
            Status::Offer => "Offer",
            Status::Unknown => "Unknown",
        }
    }

    /// Short form accepted on the command line.
    pub fn slug(self) -> &'static str {
        match self {
            Status::Submitted => "submitted",
            Status::OaReceived => "oa-received",
            Status::OaCompleted => "oa-completed",
            Status::Interview => "interview",
            Status::Rejected => "rejected",
            Status::Offer => "offer",
            Status::Unknown => "unknown",
        }
    }

    /// Hex colour of the status chip and chart slice.
    pub fn color(self) -> &'static str {
        match self {
            Status::Submitted => "#47CAFA",
            Status::OaReceived => "#4177E1",
            Status::OaCompleted => "#2952B4",
            Status::Interview => "#002A8C",
            Status::Rejected => "#DF3F64",
            Status::Offer => "#81EE9E",
            Status::Unknown => "#8E8E93",
        }
    }

    /// Position in [`Status::ALL`], `None` for `Unknown`.
    pub fn index(self) -> Option<usize> {
        Status::ALL.iter().position(|s| *s == self)
    }

    /// Maps a stored status string back to a status. Only exact labels are
    /// recognised; anything else (including absence) is `Unknown`.
    pub fn from_stored(value: Option<&str>) -> Status {
        value
            .and_then(|v| Status::ALL.into_iter().find(|s| s.label() == v))
            .unwrap_or(Status::Unknown)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status '{0}' (expected one of: submitted, oa-received, oa-completed, interview, rejected, offer)")]
pub struct ParseStatusError(pub String);

impl FromStr for Status {
    type Err = ParseStatusError;

    /// Accepts either the display label or the slug, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Status::ALL
            .into_iter()
            .find(|status| status.slug() == wanted || status.label().to_lowercase() == wanted)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// Field values sent with a create or update.
///
/// `date` is what the client had in its draft; stores discard it and stamp
/// their own write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationFields {
    pub name: String,
    pub position: String,
    pub date: DateTime<Utc>,
    pub status: Status,
}

/// One stored document as the store hands it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: RecordId,
    pub name: String,
    pub position: String,
    pub status: Option<String>,
    pub date: DateTime<Utc>,
}

/// Full contents of a user's collection, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub documents: Vec<Document>,
}

impl Snapshot {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// View records in store order.
    pub fn records(&self) -> Vec<ApplicationRecord> {
        self.documents.iter().map(ApplicationRecord::from_document).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationRecord {
    pub id: RecordId,
    pub name: String,
    pub position: String,
    pub date: DateTime<Utc>,
    pub status: Status,
}

impl ApplicationRecord {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            position: doc.position.clone(),
            date: doc.date,
            status: Status::from_stored(doc.status.as_deref()),
        }
    }

    /// Calendar date in the local timezone, as shown on the record card.
    pub fn local_date(&self) -> NaiveDate {
        self.date.with_timezone(&Local).date_naive()
    }

    pub fn matches(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
    }
}
