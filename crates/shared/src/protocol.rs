use serde::{Deserialize, Serialize};

use crate::domain::{EventId, EventRecord, Interest, UserId};

/// One remote validation failure, keyed by the logical field it concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub param: String,
    pub msg: String,
}

/// Create/fetch/update responses carry either the record or a list of
/// field errors, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl EventEnvelope {
    pub fn record(event: EventRecord) -> Self {
        Self {
            event: Some(event),
            errors: None,
        }
    }

    pub fn invalid(errors: Vec<FieldError>) -> Self {
        Self {
            event: None,
            errors: Some(errors),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestCatalogResponse {
    pub interests: Vec<Interest>,
}

/// Outbound create/update body. Dates travel in the form's editable
/// `datetime-local` representation, exactly as typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraftPayload {
    pub name: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub created_by: UserId,
    pub related_interests: Vec<Interest>,
    pub cover_photo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendantPayload {
    pub event: EventId,
    pub user: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendantRef {
    pub event: EventId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendantEnvelope {
    pub attendant: AttendantRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    // Cloudinary-style field name, kept verbatim.
    pub secure_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEnvelope {
    pub uploaded_file: UploadedFile,
}
