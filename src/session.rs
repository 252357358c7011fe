//! One planning conversation and the rules for exporting it.
//!
//! A [`PlanningSession`] owns the trip answers, the question history and the
//! photos of the latest answer. It enforces two export rules:
//!
//! * while the last assistant call failed, export is blocked
//!   ([`ExportError::Blocked`]) until a later question succeeds;
//! * only one export runs at a time ([`ExportError::ExportInProgress`]).

use crate::assemble::{export_to_dir_with_cancel, export_with_cancel, ExportRequest};
use crate::client::{PlanRequest, PlanningAssistant};
use crate::config::ExportConfig;
use crate::error::{CollaboratorError, ExportError};
use crate::model::{ConversationTurn, PhotoRef, SidePanel, TripExport, TripRequest};
use crate::output::{ExportOutput, SavedExport};
use crate::prompts::initial_question;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// State of one planning conversation.
#[derive(Debug)]
pub struct PlanningSession {
    trip: TripRequest,
    session_id: String,
    history: Vec<ConversationTurn>,
    photos: Vec<PhotoRef>,
    side_panel: Option<SidePanel>,
    last_error: Option<CollaboratorError>,
    exporting: AtomicBool,
}

impl PlanningSession {
    /// A fresh session with id `session_<millis>`.
    pub fn new(trip: TripRequest) -> Self {
        let session_id = format!("session_{}", Utc::now().timestamp_millis());
        Self::with_id(trip, session_id)
    }

    pub fn with_id(trip: TripRequest, session_id: impl Into<String>) -> Self {
        Self {
            trip,
            session_id: session_id.into(),
            history: Vec::new(),
            photos: Vec::new(),
            side_panel: None,
            last_error: None,
            exporting: AtomicBool::new(false),
        }
    }

    /// Resume from an exported snapshot, e.g. a CLI input file.
    pub fn from_snapshot(snapshot: TripExport) -> Self {
        let mut session = Self::new(snapshot.trip);
        session.history = snapshot.history;
        session.photos = snapshot.photos;
        session
    }

    pub fn trip(&self) -> &TripRequest {
        &self.trip
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn photos(&self) -> &[PhotoRef] {
        &self.photos
    }

    pub fn side_panel(&self) -> Option<&SidePanel> {
        self.side_panel.as_ref()
    }

    /// The error of the last assistant call, if it failed.
    pub fn last_error(&self) -> Option<&CollaboratorError> {
        self.last_error.as_ref()
    }

    /// Send `question` with the whole history so far.
    ///
    /// On success the turn is appended and the photos and side panel are
    /// replaced by the ones in the answer. On failure both are cleared and
    /// the session enters its error state.
    pub async fn ask(
        &mut self,
        assistant: &dyn PlanningAssistant,
        question: &str,
    ) -> Result<&ConversationTurn, CollaboratorError> {
        let request = PlanRequest {
            question,
            trip: &self.trip,
            session_id: &self.session_id,
            history: &self.history,
        };

        match assistant.ask(&request).await {
            Ok(plan) => {
                info!(
                    session_id = %self.session_id,
                    turn = self.history.len() + 1,
                    photos = plan.photos.len(),
                    "Assistant answered"
                );
                self.last_error = None;
                self.photos = plan.photos;
                self.side_panel = plan.side_panel;
                self.history.push(ConversationTurn::new(
                    question,
                    plan.answer,
                    Utc::now().to_rfc3339(),
                ));
                Ok(&self.history[self.history.len() - 1])
            }
            Err(err) => {
                warn!(session_id = %self.session_id, error = %err, "Assistant call failed");
                self.photos.clear();
                self.side_panel = None;
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Send the automatic first question built from the trip answers.
    pub async fn start(
        &mut self,
        assistant: &dyn PlanningAssistant,
    ) -> Result<&ConversationTurn, CollaboratorError> {
        let question = initial_question(&self.trip);
        self.ask(assistant, &question).await
    }

    /// Snapshot of the session as an export request, stamped now.
    pub fn export_request(&self) -> ExportRequest {
        ExportRequest::new(self.trip.clone(), self.history.clone(), self.photos.clone())
    }

    pub async fn export(&self, config: &ExportConfig) -> Result<ExportOutput, ExportError> {
        self.export_with_cancel(config, &CancellationToken::new())
            .await
    }

    pub async fn export_with_cancel(
        &self,
        config: &ExportConfig,
        cancel: &CancellationToken,
    ) -> Result<ExportOutput, ExportError> {
        let _guard = self.begin_export()?;
        export_with_cancel(&self.export_request(), config, cancel).await
    }

    /// Export and save atomically into `dir`.
    pub async fn export_to_dir(
        &self,
        dir: impl AsRef<Path>,
        config: &ExportConfig,
    ) -> Result<PathBuf, ExportError> {
        self.export_to_dir_with_cancel(dir, config, &CancellationToken::new())
            .await
            .map(|saved| saved.path)
    }

    pub async fn export_to_dir_with_cancel(
        &self,
        dir: impl AsRef<Path>,
        config: &ExportConfig,
        cancel: &CancellationToken,
    ) -> Result<SavedExport, ExportError> {
        let _guard = self.begin_export()?;
        export_to_dir_with_cancel(&self.export_request(), dir, config, cancel).await
    }

    fn begin_export(&self) -> Result<ExportGuard<'_>, ExportError> {
        if let Some(err) = &self.last_error {
            return Err(ExportError::Blocked(err.to_string()));
        }
        if self
            .exporting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ExportError::ExportInProgress);
        }
        Ok(ExportGuard {
            flag: &self.exporting,
        })
    }
}

/// Clears the in-flight flag when the export ends, however it ends.
struct ExportGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ExportGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::PlanResponse;
    use crate::model::{Budget, Preference};
    use crate::pipeline::image::test_support::FakeFetcher;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Replays canned answers and records the requests it saw.
    #[derive(Default)]
    struct ScriptedAssistant {
        replies: Mutex<Vec<Result<PlanResponse, CollaboratorError>>>,
        seen: Mutex<Vec<(String, usize)>>,
    }

    impl ScriptedAssistant {
        fn new(mut replies: Vec<Result<PlanResponse, CollaboratorError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl PlanningAssistant for ScriptedAssistant {
        async fn ask(&self, request: &PlanRequest<'_>) -> Result<PlanResponse, CollaboratorError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.question.to_string(), request.history.len()));
            self.replies.lock().unwrap().pop().unwrap()
        }
    }

    fn answer(text: &str, photos: &[&str]) -> Result<PlanResponse, CollaboratorError> {
        Ok(PlanResponse {
            answer: text.to_string(),
            photos: photos.iter().map(|u| PhotoRef::new(*u)).collect(),
            side_panel: None,
        })
    }

    fn rejected() -> Result<PlanResponse, CollaboratorError> {
        Err(CollaboratorError::Rejected {
            status: 500,
            message: "Error al comunicarse con Gemini: 503".into(),
        })
    }

    fn session() -> PlanningSession {
        let trip = TripRequest::new("Cartagena", "2026-12-01", Budget::Premium, Preference::Relaxation);
        PlanningSession::with_id(trip, "session_1")
    }

    fn config() -> ExportConfig {
        ExportConfig::builder()
            .fetcher(Arc::new(FakeFetcher::default()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_session_id() {
        let trip = TripRequest::new("Quito", "mayo", Budget::Economic, Preference::Culture);
        let s = PlanningSession::new(trip);
        assert!(s.session_id().starts_with("session_"));
        assert!(s.session_id()["session_".len()..].parse::<i64>().is_ok());
    }

    #[tokio::test]
    async fn test_successful_turns_accumulate() {
        let assistant = ScriptedAssistant::new(vec![
            answer("Playa Blanca.", &["p1", "p2"]),
            answer("Ceviche en Getsemaní.", &["p3"]),
        ]);
        let mut s = session();
        s.start(&assistant).await.unwrap();
        s.ask(&assistant, "¿Dónde comer?").await.unwrap();

        assert_eq!(s.history().len(), 2);
        assert_eq!(s.history()[1].answer, "Ceviche en Getsemaní.");
        assert!(!s.history()[1].timestamp.is_empty());
        assert_eq!(s.photos(), &[PhotoRef::new("p3")]);

        let seen = assistant.seen.lock().unwrap().clone();
        assert!(seen[0].0.starts_with("Quiero planificar un viaje a Cartagena"));
        assert_eq!(seen[1], ("¿Dónde comer?".to_string(), 1));
    }

    #[tokio::test]
    async fn test_failure_blocks_export_until_next_success() {
        let assistant = ScriptedAssistant::new(vec![
            answer("Playa Blanca.", &["p1"]),
            rejected(),
            answer("Islas del Rosario.", &[]),
        ]);
        let mut s = session();
        s.start(&assistant).await.unwrap();

        let err = s.ask(&assistant, "¿Y mañana?").await.unwrap_err();
        assert_eq!(err.to_string(), "Error al comunicarse con Gemini: 503");
        assert!(s.photos().is_empty());
        assert_eq!(s.history().len(), 1);

        let blocked = s.export(&config()).await.unwrap_err();
        assert!(matches!(blocked, ExportError::Blocked(_)), "{blocked}");

        tokio_test::assert_ok!(s.ask(&assistant, "¿Y mañana?").await);
        assert!(s.last_error().is_none());
        let output = tokio_test::assert_ok!(s.export(&config()).await);
        assert_eq!(output.stats.follow_up_questions, 1);
    }

    #[tokio::test]
    async fn test_second_export_while_running_is_rejected() {
        let fetcher = FakeFetcher {
            delay: Some(Duration::from_millis(200)),
            ..FakeFetcher::default()
        };
        let slow = ExportConfig::builder()
            .fetcher(Arc::new(fetcher))
            .build()
            .unwrap();
        let assistant = ScriptedAssistant::new(vec![answer("Playa Blanca.", &["p1"])]);
        let mut s = session();
        s.start(&assistant).await.unwrap();

        let fast = config();
        let (first, second) = tokio::join!(s.export(&slow), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            s.export(&fast).await
        });

        tokio_test::assert_ok!(first);
        assert!(matches!(second, Err(ExportError::ExportInProgress)));
        // The guard is released afterwards.
        tokio_test::assert_ok!(s.export(&fast).await);
    }

    #[tokio::test]
    async fn test_export_to_dir() {
        let assistant = ScriptedAssistant::new(vec![answer("Playa Blanca.", &[])]);
        let mut s = session();
        s.start(&assistant).await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let path = s.export_to_dir(dir.path(), &config()).await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Itinerary_Cartagena_"), "{name}");
        assert!(name.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_cancelled_save_releases_the_guard() {
        let assistant = ScriptedAssistant::new(vec![answer("Playa Blanca.", &[])]);
        let mut s = session();
        s.start(&assistant).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = s
            .export_to_dir_with_cancel(dir.path(), &config(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Cancelled { .. }), "{err}");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let saved = tokio_test::assert_ok!(
            s.export_to_dir_with_cancel(dir.path(), &config(), &CancellationToken::new())
                .await
        );
        assert_eq!(saved.output.stats.pages, saved.output.page_count());
    }
}
