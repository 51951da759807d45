//! Attendance capture workflow
//!
//! [`AttendanceWorkflow`] is the controller the presentation layer talks to.
//! It runs the collaborator calls, feeds their results into the pure
//! [`WorkflowMachine`], and exposes loading and error state through
//! [`WorkflowSnapshot`].
//!
//! Each capture cycle carries an epoch. A reset bumps it, and results of
//! collaborator calls that come back for an older epoch are dropped, so a
//! slow location fix or save can never leak into a newer cycle. Failures
//! schedule a cancellable reset timer; starting a new cycle cancels it.

pub mod machine;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::address::AddressResolver;
use crate::camera::{
    encode_mirrored_jpeg_blocking, CameraError, CameraStatus, CaptureSession, Capturer,
};
use crate::geolocation::{GeoLocator, LocationError};
use crate::persistence::{PersistenceClient, PersistenceError};
use crate::telemetry::{create_workflow_span, generate_correlation_id};
use crate::types::{is_valid_email, AttendanceRecord, PartialRecord, RecordField};

pub use machine::{StateTransitionRecord, WorkflowEvent, WorkflowMachine, WorkflowState, WorkflowStep};

pub const LOCATING_MESSAGE: &str = "Getting your location...";
pub const RESOLVING_MESSAGE: &str = "Fetching address details...";
pub const SAVING_MESSAGE: &str = "Saving your attendance...";

pub const INVALID_EMAIL_MESSAGE: &str = "Please enter a valid email address.";
pub const LOCATION_DENIED_MESSAGE: &str =
    "Location permission was denied. Please enable location access in your settings.";
pub const LOCATION_UNAVAILABLE_MESSAGE: &str =
    "Could not get your location. Please ensure location services are on.";
pub const LOCATION_TIMEOUT_MESSAGE: &str =
    "Timed out while getting your location. Please ensure location services are on.";
pub const INCOMPLETE_RECORD_MESSAGE: &str = "Incomplete attendance data. Please try again.";
pub const SAVE_REJECTED_MESSAGE: &str = "Failed to save attendance. Please check your connection.";
pub const SAVE_ERROR_MESSAGE: &str = "An error occurred while saving.";

/// Broad category of a surfaced error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Device,
    Persistence,
}

/// Error text shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub message: String,
    pub class: ErrorClass,
}

impl Banner {
    fn new(message: impl Into<String>, class: ErrorClass) -> Self {
        Self {
            message: message.into(),
            class,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid email address: {email:?}")]
    InvalidEmail { email: String },
    #[error("another workflow step is still in progress")]
    Busy,
    #[error("the workflow is waiting to reset after an error")]
    ResetPending,
    #[error("cannot {action} while {step}")]
    InvalidTransition {
        action: &'static str,
        step: WorkflowStep,
    },
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("attendance record is missing {field}")]
    IncompleteRecord { field: RecordField },
    #[error("the persistence endpoint did not accept the record")]
    SaveRejected,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("result discarded because the workflow was reset")]
    Superseded,
}

impl WorkflowError {
    /// Category for errors that are surfaced to the user
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            WorkflowError::InvalidEmail { .. } | WorkflowError::IncompleteRecord { .. } => {
                Some(ErrorClass::Validation)
            }
            WorkflowError::Location(_) | WorkflowError::Camera(_) => Some(ErrorClass::Device),
            WorkflowError::SaveRejected | WorkflowError::Persistence(_) => {
                Some(ErrorClass::Persistence)
            }
            WorkflowError::Busy
            | WorkflowError::ResetPending
            | WorkflowError::InvalidTransition { .. }
            | WorkflowError::Superseded => None,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::InvalidEmail { .. } => INVALID_EMAIL_MESSAGE.to_string(),
            WorkflowError::Location(LocationError::PermissionDenied) => {
                LOCATION_DENIED_MESSAGE.to_string()
            }
            WorkflowError::Location(LocationError::PositionUnavailable { .. }) => {
                LOCATION_UNAVAILABLE_MESSAGE.to_string()
            }
            WorkflowError::Location(LocationError::Timeout { .. }) => {
                LOCATION_TIMEOUT_MESSAGE.to_string()
            }
            WorkflowError::Camera(_) => crate::camera::CAMERA_UNAVAILABLE_MESSAGE.to_string(),
            WorkflowError::IncompleteRecord { .. } => INCOMPLETE_RECORD_MESSAGE.to_string(),
            WorkflowError::SaveRejected => SAVE_REJECTED_MESSAGE.to_string(),
            WorkflowError::Persistence(_) => SAVE_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// How long an error stays visible before the workflow resets
    pub reset_delay: Duration,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            reset_delay: Duration::from_millis(4000),
        }
    }
}

/// Read-only view of the workflow for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot {
    pub step: WorkflowStep,
    pub is_loading: bool,
    pub loading_message: Option<String>,
    pub banner: Option<Banner>,
    pub record: PartialRecord,
    pub camera: Option<CameraStatus>,
    pub reset_pending: bool,
}

#[derive(Debug, Default)]
struct WorkflowInner {
    machine: WorkflowMachine,
    camera: Option<CaptureSession>,
    is_loading: bool,
    loading_message: Option<&'static str>,
    banner: Option<Banner>,
    history: Vec<AttendanceRecord>,
    epoch: u64,
    pending_reset: Option<JoinHandle<()>>,
    correlation_id: Option<String>,
}

impl WorkflowInner {
    fn set_loading(&mut self, message: &'static str) {
        self.is_loading = true;
        self.loading_message = Some(message);
        debug!(message, "Workflow loading");
    }

    fn clear_loading(&mut self) {
        self.is_loading = false;
        self.loading_message = None;
    }

    fn ensure_ready(&self) -> Result<(), WorkflowError> {
        if self.is_loading {
            return Err(WorkflowError::Busy);
        }
        if self.pending_reset.is_some() {
            return Err(WorkflowError::ResetPending);
        }
        Ok(())
    }

    fn expect_step(&self, action: &'static str, expected: WorkflowStep) -> Result<(), WorkflowError> {
        let step = self.machine.step();
        if step != expected {
            return Err(WorkflowError::InvalidTransition { action, step });
        }
        Ok(())
    }

    fn cancel_pending_reset(&mut self) {
        if let Some(handle) = self.pending_reset.take() {
            handle.abort();
            debug!("Cancelled pending workflow reset");
        }
    }

    /// Return to idle, dropping the in-progress record and the camera
    fn reset(&mut self) {
        self.cancel_pending_reset();
        if self.machine.step() != WorkflowStep::Idle {
            self.machine.handle(WorkflowEvent::Reset);
        }
        self.camera = None;
        self.clear_loading();
        self.banner = None;
        self.correlation_id = None;
        self.epoch += 1;
    }

    fn attach_photo(&mut self, photo_data_url: String) {
        // Leaving the capture screen releases the camera
        self.camera = None;
        self.machine
            .handle(WorkflowEvent::PhotoCaptured { photo_data_url });
    }

    fn snapshot(&self) -> WorkflowSnapshot {
        let step = self.machine.step();
        let camera = (step == WorkflowStep::CapturingPhoto).then(|| {
            self.camera
                .as_ref()
                .map_or(CameraStatus::Starting, CaptureSession::status)
        });

        WorkflowSnapshot {
            step,
            is_loading: self.is_loading,
            loading_message: self.loading_message.map(str::to_string),
            banner: self.banner.clone(),
            record: self.machine.state().record().cloned().unwrap_or_default(),
            camera,
            reset_pending: self.pending_reset.is_some(),
        }
    }
}

/// Controller sequencing location, address, photo and save for one user
pub struct AttendanceWorkflow {
    geolocator: Arc<dyn GeoLocator>,
    resolver: Arc<dyn AddressResolver>,
    capturer: Arc<Capturer>,
    persistence: Arc<dyn PersistenceClient>,
    settings: WorkflowSettings,
    inner: Arc<Mutex<WorkflowInner>>,
}

impl std::fmt::Debug for AttendanceWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceWorkflow")
            .field("capturer", &self.capturer)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AttendanceWorkflow {
    pub fn new(
        geolocator: Arc<dyn GeoLocator>,
        resolver: Arc<dyn AddressResolver>,
        capturer: Arc<Capturer>,
        persistence: Arc<dyn PersistenceClient>,
    ) -> Self {
        Self {
            geolocator,
            resolver,
            capturer,
            persistence,
            settings: WorkflowSettings::default(),
            inner: Arc::new(Mutex::new(WorkflowInner::default())),
        }
    }

    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Saved records, most recent first
    pub async fn history(&self) -> Vec<AttendanceRecord> {
        self.inner.lock().await.history.clone()
    }

    pub async fn transitions(&self) -> Vec<StateTransitionRecord> {
        self.inner.lock().await.machine.transitions().to_vec()
    }

    /// Begin a cycle: validate the email, then locate and resolve the address
    pub async fn start(&self, email: &str) -> Result<(), WorkflowError> {
        let email = email.trim().to_string();

        let (epoch, correlation_id) = {
            let mut inner = self.inner.lock().await;
            if inner.is_loading {
                return Err(WorkflowError::Busy);
            }
            inner.expect_step("start", WorkflowStep::Idle)?;

            if !is_valid_email(&email) {
                inner.banner = Some(Banner::new(INVALID_EMAIL_MESSAGE, ErrorClass::Validation));
                debug!("Rejected attendance start with invalid email");
                return Err(WorkflowError::InvalidEmail { email });
            }

            inner.cancel_pending_reset();
            inner.banner = None;
            inner.epoch += 1;
            let correlation_id = generate_correlation_id();
            inner.correlation_id = Some(correlation_id.clone());
            (inner.epoch, correlation_id)
        };

        let span = create_workflow_span("start", &correlation_id);
        self.run_start(epoch, email).instrument(span).await
    }

    async fn run_start(&self, epoch: u64, email: String) -> Result<(), WorkflowError> {
        let timestamp = Utc::now();
        self.inner.lock().await.set_loading(LOCATING_MESSAGE);
        info!(email = %email, timestamp = %timestamp.to_rfc3339(), "Attendance cycle started");

        let coordinates = match self.geolocator.locate().await {
            Ok(coordinates) => coordinates,
            Err(e) => {
                let mut inner = self.current(epoch).await?;
                let error = WorkflowError::Location(e);
                self.fail(&mut inner, &error);
                return Err(error);
            }
        };

        self.current(epoch).await?.set_loading(RESOLVING_MESSAGE);
        let address = self
            .resolver
            .resolve(coordinates.latitude, coordinates.longitude)
            .await;

        {
            let mut inner = self.current(epoch).await?;
            let record = PartialRecord::located(&email, timestamp, coordinates, address);
            inner.machine.handle(WorkflowEvent::Located { record });
            inner.clear_loading();
        }

        self.open_camera(epoch).await;
        Ok(())
    }

    /// Capture a photo from the live camera and move to confirmation
    pub async fn capture_photo(&self) -> Result<(), WorkflowError> {
        let (epoch, frame, quality) = {
            let inner = self.inner.lock().await;
            inner.ensure_ready()?;
            inner.expect_step("capture", WorkflowStep::CapturingPhoto)?;

            match &inner.camera {
                Some(session) => (inner.epoch, session.freeze_frame()?, session.quality()),
                None => {
                    return Err(WorkflowError::Camera(CameraError::Unavailable(
                        "camera is still starting".to_string(),
                    )))
                }
            }
        };

        let (width, height) = (frame.width(), frame.height());
        let photo = encode_mirrored_jpeg_blocking(frame, quality).await?;

        let mut inner = self.current(epoch).await?;
        inner.expect_step("capture", WorkflowStep::CapturingPhoto)?;
        info!(width, height, encoded_len = photo.len(), "Photo captured");
        inner.attach_photo(photo);
        Ok(())
    }

    /// Attach a photo captured elsewhere and move to confirmation
    pub async fn attach_photo(&self, photo_data_url: impl Into<String>) -> Result<(), WorkflowError> {
        let mut inner = self.inner.lock().await;
        inner.ensure_ready()?;
        inner.expect_step("capture", WorkflowStep::CapturingPhoto)?;
        inner.attach_photo(photo_data_url.into());
        Ok(())
    }

    /// Abandon the current cycle
    ///
    /// While an error reset is pending this resets immediately.
    pub async fn cancel(&self) -> Result<(), WorkflowError> {
        let mut inner = self.inner.lock().await;
        if inner.pending_reset.is_some() {
            inner.reset();
            return Ok(());
        }
        if inner.is_loading {
            return Err(WorkflowError::Busy);
        }
        inner.expect_step("cancel", WorkflowStep::CapturingPhoto)?;

        if let Some(session) = inner.camera.take() {
            session.cancel();
        }
        inner.machine.handle(WorkflowEvent::Cancel);
        inner.reset();
        info!("Attendance cycle cancelled");
        Ok(())
    }

    /// Discard the photo and reopen the camera
    pub async fn retake(&self) -> Result<(), WorkflowError> {
        let epoch = {
            let mut inner = self.inner.lock().await;
            inner.ensure_ready()?;
            inner.expect_step("retake", WorkflowStep::Confirming)?;
            inner.machine.handle(WorkflowEvent::Retake);
            inner.epoch
        };
        self.open_camera(epoch).await;
        Ok(())
    }

    /// Persist the confirmed record and return to idle
    pub async fn confirm(&self) -> Result<AttendanceRecord, WorkflowError> {
        let (epoch, record, correlation_id) = {
            let mut inner = self.inner.lock().await;
            inner.ensure_ready()?;
            inner.expect_step("confirm", WorkflowStep::Confirming)?;

            let promoted = inner
                .machine
                .state()
                .record()
                .cloned()
                .unwrap_or_default()
                .promote();
            let record = match promoted {
                Ok(record) => record,
                Err(field) => {
                    let error = WorkflowError::IncompleteRecord { field };
                    self.fail(&mut inner, &error);
                    return Err(error);
                }
            };

            inner.set_loading(SAVING_MESSAGE);
            let correlation_id = inner
                .correlation_id
                .clone()
                .unwrap_or_else(generate_correlation_id);
            (inner.epoch, record, correlation_id)
        };

        let span = create_workflow_span("confirm", &correlation_id);
        let outcome = self.persistence.save(&record).instrument(span).await;

        let mut inner = self.current(epoch).await?;
        match outcome {
            Ok(true) => {
                inner.machine.handle(WorkflowEvent::Saved);
                inner.history.insert(0, record.clone());
                inner.reset();
                info!(id = %record.id(), history_len = inner.history.len(), "Attendance recorded");
                Ok(record)
            }
            Ok(false) => {
                let error = WorkflowError::SaveRejected;
                self.fail(&mut inner, &error);
                Err(error)
            }
            Err(e) => {
                let error = WorkflowError::Persistence(e);
                self.fail(&mut inner, &error);
                Err(error)
            }
        }
    }

    /// Lock the state if `epoch` is still the current cycle
    async fn current(
        &self,
        epoch: u64,
    ) -> Result<tokio::sync::MutexGuard<'_, WorkflowInner>, WorkflowError> {
        let inner = self.inner.lock().await;
        if inner.epoch != epoch {
            debug!(epoch, current = inner.epoch, "Discarding result from a superseded cycle");
            return Err(WorkflowError::Superseded);
        }
        Ok(inner)
    }

    async fn open_camera(&self, epoch: u64) {
        let session = self.capturer.activate().await;
        let mut inner = self.inner.lock().await;
        if inner.epoch == epoch
            && inner.machine.step() == WorkflowStep::CapturingPhoto
            && inner.camera.is_none()
        {
            inner.camera = Some(session);
        } else {
            debug!("Releasing camera opened for a superseded cycle");
        }
    }

    /// Surface an error and schedule the delayed reset
    fn fail(&self, inner: &mut WorkflowInner, error: &WorkflowError) {
        warn!(error = %error, step = %inner.machine.step(), "Attendance workflow failed");
        inner.clear_loading();
        inner.banner = Some(Banner::new(
            error.user_message(),
            error.class().unwrap_or(ErrorClass::Device),
        ));
        self.schedule_reset(inner);
    }

    fn schedule_reset(&self, inner: &mut WorkflowInner) {
        inner.cancel_pending_reset();

        let epoch = inner.epoch;
        let delay = self.settings.reset_delay;
        let shared = Arc::clone(&self.inner);
        inner.pending_reset = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut inner = shared.lock().await;
            if inner.epoch == epoch {
                // Our own handle; detach it rather than aborting this task
                inner.pending_reset = None;
                inner.reset();
                info!("Workflow reset after error");
            }
        }));
    }
}

impl Drop for AttendanceWorkflow {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_lock() {
            inner.cancel_pending_reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::MockAddressResolver;
    use crate::camera::TestPatternCamera;
    use crate::geolocation::MockGeoLocator;
    use crate::permissions::{PermissionStore, PresetPrompter};
    use crate::persistence::MockPersistenceClient;
    use crate::types::Coordinates;

    fn capturer() -> Arc<Capturer> {
        let permissions = Arc::new(PermissionStore::new(Arc::new(PresetPrompter::allow_all())));
        Arc::new(Capturer::new(Arc::new(TestPatternCamera::new(16, 16)), permissions))
    }

    fn located_at(latitude: f64, longitude: f64) -> MockGeoLocator {
        let mut geolocator = MockGeoLocator::new();
        geolocator
            .expect_locate()
            .returning(move || Ok(Coordinates::new(latitude, longitude)));
        geolocator
    }

    fn resolver() -> MockAddressResolver {
        let mut resolver = MockAddressResolver::new();
        resolver
            .expect_resolve()
            .returning(|lat, lon| format!("Near {lat:.4}, {lon:.4}"));
        resolver
    }

    fn workflow(
        geolocator: MockGeoLocator,
        persistence: MockPersistenceClient,
    ) -> AttendanceWorkflow {
        AttendanceWorkflow::new(
            Arc::new(geolocator),
            Arc::new(resolver()),
            capturer(),
            Arc::new(persistence),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_email_keeps_idle_without_reset() {
        let mut geolocator = MockGeoLocator::new();
        geolocator.expect_locate().never();
        let wf = workflow(geolocator, MockPersistenceClient::new());

        let err = wf.start("not-an-email").await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidEmail { .. }));

        let snapshot = wf.snapshot().await;
        assert_eq!(snapshot.step, WorkflowStep::Idle);
        assert!(!snapshot.is_loading);
        assert!(!snapshot.reset_pending);
        assert_eq!(snapshot.banner.unwrap().message, INVALID_EMAIL_MESSAGE);
        assert!(snapshot.record.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_reaches_capture_with_live_camera() {
        let wf = workflow(located_at(12.9716, 77.5946), MockPersistenceClient::new());
        wf.start(" a@b.com ").await.unwrap();

        let snapshot = wf.snapshot().await;
        assert_eq!(snapshot.step, WorkflowStep::CapturingPhoto);
        assert_eq!(snapshot.camera, Some(CameraStatus::Live));
        assert_eq!(snapshot.record.email.as_deref(), Some("a@b.com"));
        assert_eq!(snapshot.record.address.as_deref(), Some("Near 12.9716, 77.5946"));
        assert!(snapshot.record.photo_data_url.is_none());
        assert!(snapshot.banner.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_location_failure_resets_after_delay() {
        let mut geolocator = MockGeoLocator::new();
        geolocator
            .expect_locate()
            .returning(|| Err(LocationError::Timeout { timeout_ms: 10_000 }));
        let wf = workflow(geolocator, MockPersistenceClient::new());

        assert!(matches!(
            wf.start("a@b.com").await,
            Err(WorkflowError::Location(LocationError::Timeout { .. }))
        ));
        let snapshot = wf.snapshot().await;
        assert_eq!(snapshot.banner.unwrap().message, LOCATION_TIMEOUT_MESSAGE);
        assert!(snapshot.reset_pending);
        assert!(!snapshot.is_loading);

        tokio::time::sleep(Duration::from_millis(4100)).await;
        let snapshot = wf.snapshot().await;
        assert!(snapshot.banner.is_none());
        assert!(!snapshot.reset_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_saves_and_prepends_history() {
        let mut persistence = MockPersistenceClient::new();
        persistence
            .expect_save()
            .withf(|r| r.email() == "a@b.com" && r.photo_data_url().starts_with("data:image/jpeg"))
            .times(2)
            .returning(|_| Ok(true));
        let wf = workflow(located_at(1.0, 2.0), persistence);

        for _ in 0..2 {
            wf.start("a@b.com").await.unwrap();
            wf.capture_photo().await.unwrap();
            assert_eq!(wf.snapshot().await.step, WorkflowStep::Confirming);
            wf.confirm().await.unwrap();
        }

        let history = wf.history().await;
        assert_eq!(history.len(), 2);
        assert!(history[0].timestamp() >= history[1].timestamp());
        assert_ne!(history[0].id(), history[1].id());

        let snapshot = wf.snapshot().await;
        assert_eq!(snapshot.step, WorkflowStep::Idle);
        assert!(snapshot.record.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_save_surfaces_error() {
        let mut persistence = MockPersistenceClient::new();
        persistence.expect_save().times(1).returning(|_| Ok(false));
        let wf = workflow(located_at(1.0, 2.0), persistence);

        wf.start("a@b.com").await.unwrap();
        wf.capture_photo().await.unwrap();
        assert!(matches!(wf.confirm().await, Err(WorkflowError::SaveRejected)));

        let snapshot = wf.snapshot().await;
        assert_eq!(snapshot.step, WorkflowStep::Confirming);
        assert_eq!(snapshot.banner.as_ref().unwrap().message, SAVE_REJECTED_MESSAGE);
        assert_eq!(snapshot.banner.unwrap().class, ErrorClass::Persistence);

        // Only cancel is accepted here until the reset fires; start needs Idle
        assert!(matches!(wf.retake().await, Err(WorkflowError::ResetPending)));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(wf.snapshot().await.step, WorkflowStep::Idle);
        assert!(wf.history().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_error_surfaces_generic_message() {
        let mut persistence = MockPersistenceClient::new();
        persistence.expect_save().returning(|r| {
            Err(PersistenceError::InvalidPhoto {
                id: r.id().to_string(),
            })
        });
        let wf = workflow(located_at(1.0, 2.0), persistence);

        wf.start("a@b.com").await.unwrap();
        wf.capture_photo().await.unwrap();
        assert!(matches!(wf.confirm().await, Err(WorkflowError::Persistence(_))));
        assert_eq!(
            wf.snapshot().await.banner.unwrap().message,
            SAVE_ERROR_MESSAGE
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_pending_reset_resets_now() {
        let mut persistence = MockPersistenceClient::new();
        persistence.expect_save().never();
        let wf = workflow(located_at(1.0, 2.0), persistence);

        wf.start("a@b.com").await.unwrap();
        wf.attach_photo("").await.unwrap();
        assert!(matches!(
            wf.confirm().await,
            Err(WorkflowError::IncompleteRecord {
                field: RecordField::PhotoDataUrl
            })
        ));
        assert!(wf.snapshot().await.reset_pending);

        wf.cancel().await.unwrap();
        let snapshot = wf.snapshot().await;
        assert_eq!(snapshot.step, WorkflowStep::Idle);
        assert!(!snapshot.reset_pending);
        assert!(snapshot.banner.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_actions_in_wrong_state_are_rejected() {
        let wf = workflow(located_at(1.0, 2.0), MockPersistenceClient::new());

        assert!(matches!(
            wf.capture_photo().await,
            Err(WorkflowError::InvalidTransition { action: "capture", step: WorkflowStep::Idle })
        ));
        assert!(matches!(wf.retake().await, Err(WorkflowError::InvalidTransition { .. })));
        assert!(matches!(wf.confirm().await, Err(WorkflowError::InvalidTransition { .. })));
        assert!(matches!(wf.cancel().await, Err(WorkflowError::InvalidTransition { .. })));

        wf.start("a@b.com").await.unwrap();
        assert!(matches!(
            wf.start("a@b.com").await,
            Err(WorkflowError::InvalidTransition { action: "start", .. })
        ));
        assert!(wf.transitions().await.len() == 1);
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(
            WorkflowError::InvalidEmail { email: String::new() }.class(),
            Some(ErrorClass::Validation)
        );
        assert_eq!(
            WorkflowError::Location(LocationError::PermissionDenied).class(),
            Some(ErrorClass::Device)
        );
        assert_eq!(WorkflowError::SaveRejected.class(), Some(ErrorClass::Persistence));
        assert_eq!(WorkflowError::Busy.class(), None);
        assert!(WorkflowError::Location(LocationError::PermissionDenied)
            .user_message()
            .contains("settings"));
    }
}
