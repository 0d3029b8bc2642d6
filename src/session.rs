use anyhow::Result;
use std::path::PathBuf;

use crate::image_processing::HeadshotVerdict;

/// Patient names are truncated to this many characters before they become
/// transfer filenames.
pub const MAX_PATIENT_NAME_LEN: usize = 16;

/// Feature flags controlling which optional states exist in the flow
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    pub headshot_validation_enabled: bool,
    pub background_removal_enabled: bool,
}

/// Capture session states.
///
/// `HeadshotValidation` and `FinalPreview` only exist when headshot
/// validation is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NameEntry,
    Camera,
    HeadshotValidation,
    FinalPreview,
    TransferReady,
    Complete,
}

/// One capture session as an immutable value.
///
/// Every transition consumes the session and returns a new one; invalid
/// transitions are errors, so no state is reachable without its
/// precondition. A retake supersedes the verdict rather than mutating it.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    config: SessionConfig,
    patient_name: String,
    verdict: Option<HeadshotVerdict>,
    pending_file: Option<PathBuf>,
}

/// Outcome reported by the external export collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    Exported,
    Cancelled,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: SessionState::NameEntry,
            config,
            patient_name: String::new(),
            verdict: None,
            pending_file: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn patient_name(&self) -> &str {
        &self.patient_name
    }

    pub fn verdict(&self) -> Option<&HeadshotVerdict> {
        self.verdict.as_ref()
    }

    pub fn pending_file(&self) -> Option<&PathBuf> {
        self.pending_file.as_ref()
    }

    /// `NameEntry -> Camera`: requires a non-empty trimmed patient name.
    /// Names longer than the UI limit are truncated.
    pub fn enter_camera(mut self, patient_name: &str) -> Result<Self> {
        self.expect_state(SessionState::NameEntry, "enter camera")?;

        let trimmed = patient_name.trim();
        if trimmed.is_empty() {
            return Err(anyhow::anyhow!("Patient name must not be empty"));
        }

        self.patient_name = trimmed.chars().take(MAX_PATIENT_NAME_LEN).collect();
        self.state = SessionState::Camera;
        Ok(self)
    }

    /// `Camera -> HeadshotValidation`: a frame was captured and validation
    /// is enabled.
    pub fn captured(mut self) -> Result<Self> {
        self.expect_state(SessionState::Camera, "record capture")?;
        if !self.config.headshot_validation_enabled {
            return Err(anyhow::anyhow!(
                "Headshot validation is disabled for this session"
            ));
        }
        self.state = SessionState::HeadshotValidation;
        Ok(self)
    }

    /// Attach the analysis result, superseding any previous verdict
    pub fn with_verdict(mut self, verdict: HeadshotVerdict) -> Result<Self> {
        self.expect_state(SessionState::HeadshotValidation, "attach verdict")?;
        self.verdict = Some(verdict);
        Ok(self)
    }

    /// Loop back to the camera, discarding the stale verdict
    pub fn retake(mut self) -> Result<Self> {
        match self.state {
            SessionState::HeadshotValidation | SessionState::FinalPreview => {
                self.verdict = None;
                self.state = SessionState::Camera;
                Ok(self)
            }
            other => Err(anyhow::anyhow!(
                "Cannot retake from state {:?}",
                other
            )),
        }
    }

    /// `HeadshotValidation -> FinalPreview`: the verdict passed, or the
    /// operator chose to use the photo anyway.
    pub fn accept(mut self, use_anyway: bool) -> Result<Self> {
        self.expect_state(SessionState::HeadshotValidation, "accept photo")?;

        let verdict = self
            .verdict
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No verdict recorded for this capture"))?;
        if !verdict.is_valid && !use_anyway {
            return Err(anyhow::anyhow!(
                "Photo rejected: {} (pass --use-anyway to override)",
                verdict.message
            ));
        }

        self.state = SessionState::FinalPreview;
        Ok(self)
    }

    /// The normalized photo was written to disk; the session now owns a
    /// single pending transfer file. Valid from `FinalPreview`, or
    /// directly from `Camera` when validation is disabled.
    pub fn file_saved(mut self, path: PathBuf) -> Result<Self> {
        match self.state {
            SessionState::FinalPreview => {}
            SessionState::Camera if !self.config.headshot_validation_enabled => {}
            other => {
                return Err(anyhow::anyhow!(
                    "Cannot record saved file from state {:?}",
                    other
                ));
            }
        }

        // A new save replaces any prior pending file
        self.pending_file = Some(path);
        self.state = SessionState::TransferReady;
        Ok(self)
    }

    /// `TransferReady -> Complete` only when the export collaborator
    /// reports success; cancellation leaves everything unchanged.
    pub fn export_finished(mut self, outcome: ExportOutcome) -> Result<Self> {
        self.expect_state(SessionState::TransferReady, "finish export")?;

        if outcome == ExportOutcome::Exported {
            self.pending_file = None;
            self.state = SessionState::Complete;
        }
        Ok(self)
    }

    /// Restart the flow for a new patient, abandoning any pending file.
    /// Returns the abandoned path so the caller can remove it from disk.
    pub fn restart(self) -> (Self, Option<PathBuf>) {
        let abandoned = self.pending_file;
        (Self::new(self.config), abandoned)
    }

    fn expect_state(&self, expected: SessionState, action: &str) -> Result<()> {
        if self.state != expected {
            return Err(anyhow::anyhow!(
                "Cannot {} from state {:?} (expected {:?})",
                action,
                self.state,
                expected
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::headshot::HeadshotVerdict;

    fn validating_config() -> SessionConfig {
        SessionConfig {
            headshot_validation_enabled: true,
            background_removal_enabled: false,
        }
    }

    fn verdict(is_valid: bool, message: &str) -> HeadshotVerdict {
        HeadshotVerdict {
            is_valid,
            face_count: if is_valid { 1 } else { 0 },
            face_area_fraction: if is_valid { 0.2 } else { 0.0 },
            face_box: None,
            cropped: None,
            background_replaced: None,
            message: message.to_string(),
        }
    }

    #[test]
    fn empty_name_is_rejected() {
        let session = Session::new(SessionConfig::default());
        assert!(session.clone().enter_camera("").is_err());
        assert!(session.enter_camera("   \n ").is_err());
    }

    #[test]
    fn name_is_trimmed_and_truncated() {
        let session = Session::new(SessionConfig::default())
            .enter_camera("  Wolfeschlegelsteinhausen  ")
            .unwrap();
        assert_eq!(session.patient_name(), "Wolfeschlegelste");
        assert_eq!(session.patient_name().chars().count(), 16);
    }

    #[test]
    fn full_validating_flow_reaches_complete() {
        let session = Session::new(validating_config())
            .enter_camera("John Doe")
            .unwrap()
            .captured()
            .unwrap()
            .with_verdict(verdict(true, "Perfect headshot"))
            .unwrap()
            .accept(false)
            .unwrap()
            .file_saved(PathBuf::from("/store/John Doe.jpg"))
            .unwrap();

        assert_eq!(session.state(), SessionState::TransferReady);
        assert!(session.pending_file().is_some());

        let session = session.export_finished(ExportOutcome::Exported).unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        assert!(session.pending_file().is_none());
    }

    #[test]
    fn cancelled_export_keeps_transfer_ready() {
        let session = Session::new(SessionConfig::default())
            .enter_camera("John Doe")
            .unwrap()
            .file_saved(PathBuf::from("/store/John Doe.jpg"))
            .unwrap()
            .export_finished(ExportOutcome::Cancelled)
            .unwrap();

        assert_eq!(session.state(), SessionState::TransferReady);
        assert_eq!(
            session.pending_file(),
            Some(&PathBuf::from("/store/John Doe.jpg"))
        );
    }

    #[test]
    fn invalid_verdict_blocks_accept_unless_overridden() {
        let session = Session::new(validating_config())
            .enter_camera("Jane")
            .unwrap()
            .captured()
            .unwrap()
            .with_verdict(verdict(false, "No face detected"))
            .unwrap();

        assert!(session.clone().accept(false).is_err());
        let session = session.accept(true).unwrap();
        assert_eq!(session.state(), SessionState::FinalPreview);
    }

    #[test]
    fn retake_discards_verdict_and_returns_to_camera() {
        let session = Session::new(validating_config())
            .enter_camera("Jane")
            .unwrap()
            .captured()
            .unwrap()
            .with_verdict(verdict(false, "Face too small - move a bit closer"))
            .unwrap()
            .retake()
            .unwrap();

        assert_eq!(session.state(), SessionState::Camera);
        assert!(session.verdict().is_none());
    }

    #[test]
    fn fresh_verdict_supersedes_previous() {
        let session = Session::new(validating_config())
            .enter_camera("Jane")
            .unwrap()
            .captured()
            .unwrap()
            .with_verdict(verdict(false, "No face detected"))
            .unwrap()
            .retake()
            .unwrap()
            .captured()
            .unwrap()
            .with_verdict(verdict(true, "Perfect headshot"))
            .unwrap();

        assert!(session.verdict().unwrap().is_valid);
    }

    #[test]
    fn direct_save_requires_validation_disabled() {
        let session = Session::new(validating_config())
            .enter_camera("Jane")
            .unwrap();
        assert!(session.file_saved(PathBuf::from("/x.jpg")).is_err());
    }

    #[test]
    fn captured_requires_validation_enabled() {
        let session = Session::new(SessionConfig::default())
            .enter_camera("Jane")
            .unwrap();
        assert!(session.captured().is_err());
    }

    #[test]
    fn new_save_replaces_pending_file() {
        let session = Session::new(SessionConfig::default())
            .enter_camera("Jane")
            .unwrap()
            .file_saved(PathBuf::from("/store/a.jpg"))
            .unwrap();

        // Export cancelled, operator re-captures without restarting: the
        // session must never track two pending files at once.
        let (session, abandoned) = session.restart();
        assert_eq!(abandoned, Some(PathBuf::from("/store/a.jpg")));
        assert_eq!(session.state(), SessionState::NameEntry);

        let session = session
            .enter_camera("Jane")
            .unwrap()
            .file_saved(PathBuf::from("/store/b.jpg"))
            .unwrap();
        assert_eq!(session.pending_file(), Some(&PathBuf::from("/store/b.jpg")));
    }

    #[test]
    fn export_requires_transfer_ready() {
        let session = Session::new(SessionConfig::default());
        assert!(session.export_finished(ExportOutcome::Exported).is_err());
    }
}
