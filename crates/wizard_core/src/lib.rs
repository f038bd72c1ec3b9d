use std::{collections::HashMap, fmt, sync::Arc};

use anyhow::{anyhow, Result};
use shared::{
    domain::{EventId, EventRecord, Interest, UserSummary},
    protocol::{AttendantPayload, EventDraftPayload},
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

pub mod api;
pub mod datetime;
pub mod draft;
pub mod sequencer;
pub mod validation;

pub use api::{CoverPhotoUpload, EventApi, HttpEventApi};
pub use draft::{ready_for_submission, DirtyFields, DraftField, EventDraft};
pub use sequencer::{SkipAttempt, StepDescriptor, StepSequencer};
pub use validation::build_validation_error_map;

const FORM_ERRORS_MESSAGE: &str = "The form contains errors";
const SKIP_WARNING_MESSAGE: &str = "A step that isn't optional can't be skipped.";

/// Navigation target produced as a side effect of wizard operations. Routing
/// itself belongs to the embedder; the wizard only names the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    NewEvent,
    EventDetail(EventId),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Home => f.write_str("/"),
            Route::NewEvent => f.write_str("/events/new"),
            Route::EventDetail(id) => write!(f, "/events/{id}"),
        }
    }
}

/// Side effects surfaced to the embedder. Errors share a single transient
/// channel: a new one replaces whatever was showing.
#[derive(Debug, Clone)]
pub enum WizardEvent {
    Navigated(Route),
    Error(String),
}

/// How a call to [`WizardSession::open`] resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Create mode: a blank draft was installed.
    NewDraft,
    /// Edit mode but the acting identity has not resolved yet; the load
    /// re-runs when the user is supplied.
    AwaitingIdentity,
    /// Edit mode: the record was fetched and the draft populated.
    Hydrated,
    /// The remote rejected the identifier; the session fell back to create
    /// mode and navigation to the new-event route was emitted.
    RedirectedInvalid,
    /// The acting identity is neither owner nor admin; navigation to the
    /// read-only detail route was emitted and the draft was not populated.
    RedirectedUnauthorized,
}

/// How a call to [`WizardSession::submit`] resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Completed {
        route: Route,
    },
    /// Remote validation rejected the draft; the validation map is populated
    /// and the wizard stays on the current step.
    Invalid,
    /// Create protocol only: the event exists on the server but attendant
    /// registration failed. Nothing is rolled back; the id is carried so a
    /// caller could compensate later.
    AttendantFailed {
        event_id: EventId,
    },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("a submission is already in flight")]
    InFlight,
    #[error("draft is not ready for submission")]
    NotReady,
    #[error("no authenticated user to submit as")]
    MissingUser,
    #[error(transparent)]
    Api(#[from] anyhow::Error),
}

/// The preview step's data: the subset of the draft the summary card shows.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPreview {
    pub name: String,
    pub description: String,
    pub related_interests: Vec<Interest>,
    pub cover_photo: String,
}

/// Catalog entries whose identifiers the record references. Pure derivation,
/// recomputed whenever the catalog or the record changes.
fn resolve_related_interests(catalog: &[Interest], record: &EventRecord) -> Vec<Interest> {
    catalog
        .iter()
        .filter(|interest| {
            record
                .related_interests
                .iter()
                .any(|related| related.id == interest.id)
        })
        .cloned()
        .collect()
}

struct WizardState {
    event_id: Option<EventId>,
    user: Option<UserSummary>,
    record: Option<EventRecord>,
    draft: EventDraft,
    dirty: DirtyFields,
    sequencer: StepSequencer,
    catalog: Option<Vec<Interest>>,
    catalog_loading: bool,
    validation_errors: HashMap<String, String>,
    error: Option<String>,
    loading: bool,
}

impl WizardState {
    fn new() -> Self {
        Self {
            event_id: None,
            user: None,
            record: None,
            draft: EventDraft::default(),
            dirty: DirtyFields::default(),
            sequencer: StepSequencer::event_steps(),
            catalog: None,
            catalog_loading: false,
            validation_errors: HashMap::new(),
            error: None,
            loading: false,
        }
    }

    fn refresh_related_interests(&mut self) {
        if self.event_id.is_none() {
            return;
        }
        if let (Some(record), Some(catalog)) = (&self.record, &self.catalog) {
            self.draft.related_interests = resolve_related_interests(catalog, record);
        }
    }
}

/// The wizard session: owns the draft, the step machine, dirty tracking and
/// the submission protocol. All remote work is async and non-blocking; the
/// shared loading flag doubles as the single-in-flight-submission guard.
pub struct WizardSession {
    api: Arc<dyn EventApi>,
    inner: Mutex<WizardState>,
    events: broadcast::Sender<WizardEvent>,
}

enum SubmitMode {
    Create,
    Edit(EventId),
}

impl WizardSession {
    pub fn new(api: Arc<dyn EventApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            api,
            inner: Mutex::new(WizardState::new()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    fn surface_error(&self, state: &mut WizardState, message: impl Into<String>) {
        let message = message.into();
        state.error = Some(message.clone());
        let _ = self.events.send(WizardEvent::Error(message));
    }

    fn navigate(&self, route: Route) {
        info!("wizard: navigate route={route}");
        let _ = self.events.send(WizardEvent::Navigated(route));
    }

    /// Supply (or clear) the acting identity. Edit-mode loads re-run with
    /// the new identity, whether they were waiting on it or already
    /// hydrated: edit access depends on who is acting.
    pub async fn set_user(&self, user: Option<UserSummary>) -> Result<Option<LoadOutcome>> {
        let pending = {
            let mut state = self.inner.lock().await;
            state.user = user;
            if state.user.is_some() {
                state.event_id.clone()
            } else {
                None
            }
        };
        match pending {
            Some(id) => Ok(Some(self.open(Some(id)).await?)),
            None => Ok(None),
        }
    }

    /// Mount the wizard: blank draft in create mode, or fetch-and-hydrate in
    /// edit mode. Also kicks off the once-per-session catalog fetch. Re-run
    /// this whenever the identifier changes; identity changes re-run it
    /// through [`set_user`].
    pub async fn open(&self, event_id: Option<EventId>) -> Result<LoadOutcome> {
        // Surfaced after the per-mode reset, which would otherwise wipe it.
        let catalog_error = self.ensure_catalog().await.err();

        let Some(id) = event_id else {
            let mut state = self.inner.lock().await;
            state.event_id = None;
            state.record = None;
            state.draft = EventDraft::default();
            state.dirty = DirtyFields::default();
            state.sequencer = StepSequencer::event_steps();
            state.validation_errors = HashMap::new();
            state.error = None;
            state.loading = false;
            if let Some(err) = catalog_error {
                self.surface_error(&mut state, err.to_string());
            }
            return Ok(LoadOutcome::NewDraft);
        };

        let user = {
            let mut state = self.inner.lock().await;
            state.event_id = Some(id.clone());
            state.error = None;
            state.loading = true;
            if let Some(err) = catalog_error {
                self.surface_error(&mut state, err.to_string());
            }
            match &state.user {
                Some(user) => user.clone(),
                // Identity still resolving; stay loading until it arrives.
                None => return Ok(LoadOutcome::AwaitingIdentity),
            }
        };

        let envelope = match self.api.fetch_event(&id).await {
            Ok(envelope) => envelope,
            Err(err) => {
                let mut state = self.inner.lock().await;
                state.loading = false;
                self.surface_error(&mut state, err.to_string());
                return Err(err);
            }
        };

        let mut state = self.inner.lock().await;
        state.loading = false;

        if let Some(errors) = envelope.errors {
            let message = errors
                .first()
                .map(|e| format!("{} {}", e.param, e.msg))
                .unwrap_or_else(|| "event could not be loaded".to_string());
            warn!("wizard: load rejected id={id} message={message}");
            self.surface_error(&mut state, message);
            // Recover by discarding the edit attempt.
            state.event_id = None;
            state.record = None;
            state.draft = EventDraft::default();
            state.dirty = DirtyFields::default();
            state.sequencer = StepSequencer::event_steps();
            drop(state);
            self.navigate(Route::NewEvent);
            return Ok(LoadOutcome::RedirectedInvalid);
        }

        let Some(record) = envelope.event else {
            self.surface_error(&mut state, "event response carried no record");
            return Err(anyhow!("event response carried neither record nor errors"));
        };

        if !user.may_edit(&record) {
            info!(
                "wizard: edit denied event={id} user={} owner={}",
                user.id, record.created_by
            );
            // The read-only route takes over; the draft must not survive.
            state.record = None;
            state.draft = EventDraft::default();
            state.dirty = DirtyFields::default();
            state.sequencer = StepSequencer::event_steps();
            drop(state);
            self.navigate(Route::EventDetail(id));
            return Ok(LoadOutcome::RedirectedUnauthorized);
        }

        state.draft = EventDraft {
            name: record.name.clone(),
            description: record.description.clone(),
            start_date: datetime::input_date_time(record.start_date),
            end_date: datetime::input_date_time(record.end_date),
            created_by: Some(record.created_by.clone()),
            related_interests: Vec::new(),
            cover_photo: record.cover_photo.clone(),
        };
        state.dirty = DirtyFields::default();
        state.sequencer = StepSequencer::event_steps();
        state.validation_errors = HashMap::new();
        state.record = Some(record);
        state.refresh_related_interests();
        info!("wizard: hydrated event={id}");
        Ok(LoadOutcome::Hydrated)
    }

    /// Fetch the interest catalog at most once per session, behind its own
    /// loading flag. A later arrival re-resolves the related interests of an
    /// already hydrated record.
    async fn ensure_catalog(&self) -> Result<()> {
        {
            let mut state = self.inner.lock().await;
            if state.catalog.is_some() || state.catalog_loading {
                return Ok(());
            }
            state.catalog_loading = true;
        }

        let fetched = self.api.fetch_interest_catalog().await;
        let mut state = self.inner.lock().await;
        state.catalog_loading = false;
        match fetched {
            Ok(response) => {
                state.catalog = Some(response.interests);
                state.refresh_related_interests();
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    // -- step navigation ---------------------------------------------------

    pub async fn advance(&self) {
        self.inner.lock().await.sequencer.advance();
    }

    pub async fn retreat(&self) {
        self.inner.lock().await.sequencer.retreat();
    }

    /// Skip the current step. A non-optional step surfaces a warning but
    /// still advances (carried over from observed behavior, see DESIGN.md).
    pub async fn skip(&self) {
        let mut state = self.inner.lock().await;
        if state.sequencer.skip() == SkipAttempt::NotOptional {
            self.surface_error(&mut state, SKIP_WARNING_MESSAGE);
        }
    }

    pub async fn active_step(&self) -> usize {
        self.inner.lock().await.sequencer.active_step()
    }

    pub async fn is_terminal_step(&self) -> bool {
        self.inner.lock().await.sequencer.is_terminal()
    }

    pub async fn is_step_optional(&self, index: usize) -> bool {
        self.inner.lock().await.sequencer.is_step_optional(index)
    }

    pub async fn is_step_skipped(&self, index: usize) -> bool {
        self.inner.lock().await.sequencer.is_step_skipped(index)
    }

    pub async fn is_step_completed(&self, index: usize) -> bool {
        self.inner.lock().await.sequencer.is_step_completed(index)
    }

    // -- draft edits -------------------------------------------------------

    pub async fn set_name(&self, name: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.draft.name = name.into();
        state.dirty.mark(DraftField::Name);
    }

    pub async fn set_description(&self, description: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.draft.description = description.into();
        state.dirty.mark(DraftField::Description);
    }

    pub async fn set_start_date(&self, start_date: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.draft.start_date = start_date.into();
        state.dirty.mark(DraftField::StartDate);
    }

    pub async fn set_end_date(&self, end_date: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.draft.end_date = end_date.into();
        state.dirty.mark(DraftField::EndDate);
    }

    pub async fn set_related_interests(&self, interests: Vec<Interest>) {
        let mut state = self.inner.lock().await;
        state.draft.related_interests = interests;
        state.dirty.mark(DraftField::RelatedInterests);
    }

    /// Upload side channel, independent of the step flow. A successful
    /// upload replaces the cover photo with the returned secure URL and
    /// marks the field dirty; a failure leaves the previous photo in place.
    pub async fn upload_cover_photo(&self, upload: Option<CoverPhotoUpload>) -> Result<()> {
        let Some(upload) = upload else {
            return Ok(());
        };

        {
            let mut state = self.inner.lock().await;
            state.loading = true;
        }

        let uploaded = self.api.upload_cover_photo(upload).await;
        let mut state = self.inner.lock().await;
        state.loading = false;
        match uploaded {
            Ok(envelope) => {
                state.draft.cover_photo = envelope.uploaded_file.secure_url;
                state.dirty.mark(DraftField::CoverPhoto);
                Ok(())
            }
            Err(err) => {
                self.surface_error(&mut state, err.to_string());
                Err(err)
            }
        }
    }

    // -- submission --------------------------------------------------------

    /// True when the final-step submit control should be enabled.
    pub async fn can_submit(&self) -> bool {
        let state = self.inner.lock().await;
        ready_for_submission(&state.draft, &state.dirty, state.loading)
    }

    /// Run the submission protocol: create-then-attend in create mode, a
    /// single update call in edit mode. Validation failures populate the
    /// (freshly rebuilt) validation map and leave the wizard on its current
    /// step; an attendant failure after a successful create is surfaced but
    /// not rolled back.
    pub async fn submit(&self) -> Result<SubmitOutcome, SubmitError> {
        let (mode, payload) = {
            let mut state = self.inner.lock().await;
            if state.loading {
                return Err(SubmitError::InFlight);
            }
            if !ready_for_submission(&state.draft, &state.dirty, false) {
                return Err(SubmitError::NotReady);
            }

            let (mode, created_by) = match state.event_id.clone() {
                Some(id) => {
                    // Updates keep the record's original owner.
                    let owner = state
                        .draft
                        .created_by
                        .clone()
                        .ok_or(SubmitError::MissingUser)?;
                    (SubmitMode::Edit(id), owner)
                }
                None => {
                    let user = state.user.clone().ok_or(SubmitError::MissingUser)?;
                    (SubmitMode::Create, user.id)
                }
            };

            state.error = None;
            state.validation_errors = HashMap::new();
            state.loading = true;

            let payload = EventDraftPayload {
                name: state.draft.name.clone(),
                description: state.draft.description.clone(),
                start_date: state.draft.start_date.clone(),
                end_date: state.draft.end_date.clone(),
                created_by,
                related_interests: state.draft.related_interests.clone(),
                cover_photo: state.draft.cover_photo.clone(),
            };
            (mode, payload)
        };

        match mode {
            SubmitMode::Create => self.submit_create(payload).await,
            SubmitMode::Edit(id) => self.submit_edit(id, payload).await,
        }
    }

    async fn submit_create(&self, payload: EventDraftPayload) -> Result<SubmitOutcome, SubmitError> {
        let envelope = match self.api.create_event(&payload).await {
            Ok(envelope) => envelope,
            Err(err) => return Err(self.fail_submission(err).await),
        };

        if let Some(errors) = envelope.errors {
            return Ok(self.reject_submission(errors).await);
        }
        let Some(record) = envelope.event else {
            return Err(self
                .fail_submission(anyhow!("create response carried neither record nor errors"))
                .await);
        };

        info!("wizard: event created id={}", record.id);

        // Dependent call: must carry the identifier returned by the create.
        let attendant = AttendantPayload {
            event: record.id.clone(),
            user: payload.created_by.clone(),
        };
        match self.api.create_attendant(&record.id, &attendant).await {
            Ok(confirmed) => {
                let mut state = self.inner.lock().await;
                state.loading = false;
                drop(state);
                let route = Route::EventDetail(confirmed.attendant.event);
                self.navigate(route.clone());
                Ok(SubmitOutcome::Completed { route })
            }
            Err(err) => {
                // The event already exists server-side; nothing is retracted.
                error!(
                    "wizard: attendant registration failed event={} error={err}",
                    record.id
                );
                let mut state = self.inner.lock().await;
                state.loading = false;
                self.surface_error(&mut state, err.to_string());
                Ok(SubmitOutcome::AttendantFailed {
                    event_id: record.id,
                })
            }
        }
    }

    async fn submit_edit(
        &self,
        id: EventId,
        payload: EventDraftPayload,
    ) -> Result<SubmitOutcome, SubmitError> {
        let envelope = match self.api.update_event(&id, &payload).await {
            Ok(envelope) => envelope,
            Err(err) => return Err(self.fail_submission(err).await),
        };

        if let Some(errors) = envelope.errors {
            return Ok(self.reject_submission(errors).await);
        }
        let Some(record) = envelope.event else {
            return Err(self
                .fail_submission(anyhow!("update response carried neither record nor errors"))
                .await);
        };

        info!("wizard: event updated id={}", record.id);
        let mut state = self.inner.lock().await;
        state.loading = false;
        drop(state);
        let route = Route::EventDetail(record.id);
        self.navigate(route.clone());
        Ok(SubmitOutcome::Completed { route })
    }

    async fn reject_submission(&self, errors: Vec<shared::protocol::FieldError>) -> SubmitOutcome {
        warn!("wizard: submission rejected fields={}", errors.len());
        let mut state = self.inner.lock().await;
        state.validation_errors = build_validation_error_map(&errors);
        state.loading = false;
        self.surface_error(&mut state, FORM_ERRORS_MESSAGE);
        SubmitOutcome::Invalid
    }

    async fn fail_submission(&self, err: anyhow::Error) -> SubmitError {
        let mut state = self.inner.lock().await;
        state.loading = false;
        self.surface_error(&mut state, err.to_string());
        SubmitError::Api(err)
    }

    /// Abandon the wizard: back to the detail route in edit mode, home in
    /// create mode. The draft is simply dropped.
    pub async fn cancel(&self) -> Route {
        let route = {
            let state = self.inner.lock().await;
            match &state.event_id {
                Some(id) => Route::EventDetail(id.clone()),
                None => Route::Home,
            }
        };
        self.navigate(route.clone());
        route
    }

    // -- snapshots ---------------------------------------------------------

    pub async fn draft(&self) -> EventDraft {
        self.inner.lock().await.draft.clone()
    }

    pub async fn preview(&self) -> EventPreview {
        let state = self.inner.lock().await;
        EventPreview {
            name: state.draft.name.clone(),
            description: state.draft.description.clone(),
            related_interests: state.draft.related_interests.clone(),
            cover_photo: state.draft.cover_photo.clone(),
        }
    }

    pub async fn interest_catalog(&self) -> Option<Vec<Interest>> {
        self.inner.lock().await.catalog.clone()
    }

    pub async fn validation_errors(&self) -> HashMap<String, String> {
        self.inner.lock().await.validation_errors.clone()
    }

    pub async fn error(&self) -> Option<String> {
        self.inner.lock().await.error.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.lock().await.loading
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
