use shared::domain::{Interest, UserId};

/// The in-progress event record. Owned exclusively by the wizard session and
/// discarded on cancel, successful submission, or teardown.
///
/// Dates are held in the editable `datetime-local` representation the form
/// widgets produce, not as parsed timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDraft {
    pub name: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub created_by: Option<UserId>,
    pub related_interests: Vec<Interest>,
    pub cover_photo: String,
}

impl EventDraft {
    /// The four fields the submission gate requires to be non-empty.
    pub fn required_fields_present(&self) -> bool {
        !self.name.is_empty()
            && !self.description.is_empty()
            && !self.start_date.is_empty()
            && !self.end_date.is_empty()
    }
}

/// Logical draft fields a handler can touch. Closed set, known at design
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Name,
    Description,
    StartDate,
    EndDate,
    RelatedInterests,
    CoverPhoto,
}

/// Which fields have been edited since the wizard opened. Bits are only ever
/// set, never cleared; the set exists to gate submission of an untouched
/// record, not for per-field diffing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyFields {
    pub name: bool,
    pub description: bool,
    pub start_date: bool,
    pub end_date: bool,
    pub related_interests: bool,
    pub cover_photo: bool,
}

impl DirtyFields {
    pub fn mark(&mut self, field: DraftField) {
        match field {
            DraftField::Name => self.name = true,
            DraftField::Description => self.description = true,
            DraftField::StartDate => self.start_date = true,
            DraftField::EndDate => self.end_date = true,
            DraftField::RelatedInterests => self.related_interests = true,
            DraftField::CoverPhoto => self.cover_photo = true,
        }
    }

    pub fn any(&self) -> bool {
        self.name
            || self.description
            || self.start_date
            || self.end_date
            || self.related_interests
            || self.cover_photo
    }
}

/// Readiness gate for the final-step submit control: every required field
/// present, no call in flight, and at least one edit since the wizard opened.
pub fn ready_for_submission(draft: &EventDraft, dirty: &DirtyFields, loading: bool) -> bool {
    draft.required_fields_present() && !loading && dirty.any()
}
