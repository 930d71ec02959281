use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use theory_core::model::{LicenseType, OptionKey, QuizNumber};

use super::progress::{SessionPhase, SessionProgress};
use super::service::{AUTO_ADVANCE_DELAY, FinishOutcome, PendingAdvance, QuizSession, RevealOutcome, Step};
use super::timer::{CountdownTimer, TICK_PERIOD};
use super::workflow::QuizLoopService;
use crate::error::SessionError;
use crate::review::BookmarkToggled;

/// A running quiz: the session, its countdown and any pending auto-advance.
///
/// Background work holds only weak references to the session and is aborted
/// when the `LiveQuiz` is dropped, so nothing acts on a torn-down quiz.
pub struct LiveQuiz {
    service: QuizLoopService,
    session: Arc<Mutex<QuizSession>>,
    phases: Arc<watch::Sender<SessionPhase>>,
    timer: CountdownTimer,
    pending_advance: Option<JoinHandle<()>>,
}

impl LiveQuiz {
    /// Start a quiz and its countdown.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidQuiz` if the quiz cannot be loaded.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(
        service: QuizLoopService,
        license: LicenseType,
        quiz: QuizNumber,
    ) -> Result<Self, SessionError> {
        let session = service.start_quiz(license, quiz)?;
        let (tx, _rx) = watch::channel(session.phase());
        let phases = Arc::new(tx);
        let session = Arc::new(Mutex::new(session));
        let timer = CountdownTimer::spawn(Arc::downgrade(&session), TICK_PERIOD, Arc::clone(&phases));

        Ok(Self {
            service,
            session,
            phases,
            timer,
            pending_advance: None,
        })
    }

    /// Receiver notified on every phase change, including time expiry.
    #[must_use]
    pub fn phase_changes(&self) -> watch::Receiver<SessionPhase> {
        self.phases.subscribe()
    }

    pub async fn progress(&self) -> SessionProgress {
        self.session.lock().await.progress()
    }

    /// Run `f` against the locked session, e.g. to render the current question.
    pub async fn with_session<R>(&self, f: impl FnOnce(&QuizSession) -> R) -> R {
        f(&*self.session.lock().await)
    }

    #[must_use]
    pub fn timer_running(&self) -> bool {
        self.timer.is_running()
    }

    pub async fn auto_advance(&self) -> bool {
        self.session.lock().await.auto_advance()
    }

    /// Switch auto-advance on or off mid-quiz. Switching it off drops any
    /// move that is already scheduled.
    pub async fn set_auto_advance(&mut self, enabled: bool) {
        self.session.lock().await.set_auto_advance(enabled);
        if !enabled {
            self.cancel_pending_advance();
        }
        tracing::debug!(enabled, "auto-advance switched");
    }

    /// # Errors
    ///
    /// Propagates the session's `select` errors.
    pub async fn select(&mut self, option: OptionKey) -> Result<(), SessionError> {
        let pending = self.session.lock().await.select(option)?;
        if let Some(pending) = pending {
            self.schedule_advance(pending);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Propagates the session's `reveal` errors. Ledger failures are only logged.
    pub async fn reveal(&mut self) -> Result<RevealOutcome, SessionError> {
        let (license, outcome) = {
            let mut session = self.session.lock().await;
            (session.license(), session.reveal()?)
        };
        self.service.record_reveal(license, &outcome).await;
        if let Some(pending) = outcome.advance {
            self.schedule_advance(pending);
        }
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Propagates the session's `advance` errors.
    pub async fn advance(&mut self) -> Result<Step, SessionError> {
        self.cancel_pending_advance();
        let (license, quiz, step) = {
            let mut session = self.session.lock().await;
            let step = session.advance(self.service.clock().now())?;
            (session.license(), session.quiz(), step)
        };
        if let Step::Finished(outcome) = &step {
            self.complete(license, quiz, outcome).await;
        }
        Ok(step)
    }

    /// # Errors
    ///
    /// Propagates the session's `retreat` errors.
    pub async fn retreat(&mut self) -> Result<usize, SessionError> {
        self.cancel_pending_advance();
        self.session.lock().await.retreat()
    }

    /// # Errors
    ///
    /// Propagates the session's `jump_to` errors.
    pub async fn jump_to(&mut self, index: usize) -> Result<(), SessionError> {
        self.cancel_pending_advance();
        self.session.lock().await.jump_to(index)
    }

    /// Grade the attempt, stop the countdown and persist the result.
    ///
    /// # Errors
    ///
    /// Propagates the session's `finish` errors. Ledger failures are only logged.
    pub async fn finish(&mut self) -> Result<FinishOutcome, SessionError> {
        self.cancel_pending_advance();
        let (license, quiz, outcome) = {
            let mut session = self.session.lock().await;
            let outcome = session.finish(self.service.clock().now())?;
            (session.license(), session.quiz(), outcome)
        };
        self.complete(license, quiz, &outcome).await;
        Ok(outcome)
    }

    /// Begin a new attempt over the same questions with a fresh countdown.
    pub async fn restart(&mut self) {
        self.cancel_pending_advance();
        self.timer.stop();
        self.session.lock().await.restart();
        self.timer = CountdownTimer::spawn(
            Arc::downgrade(&self.session),
            TICK_PERIOD,
            Arc::clone(&self.phases),
        );
        self.phases.send_replace(SessionPhase::InProgress);
    }

    /// Keep answering after the countdown ran out.
    ///
    /// # Errors
    ///
    /// Propagates the session's `continue_after_expiry` errors.
    pub async fn continue_after_expiry(&mut self) -> Result<(), SessionError> {
        self.session.lock().await.continue_after_expiry()?;
        self.phases.send_replace(SessionPhase::InProgress);
        Ok(())
    }

    /// Flip the bookmark of the current question. The event is returned only
    /// after the ledger write has succeeded.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the ledger write fails.
    pub async fn toggle_bookmark(&self) -> Result<BookmarkToggled, SessionError> {
        let (license, question) = {
            let session = self.session.lock().await;
            (session.license(), session.current_ref())
        };
        self.service.toggle_bookmark(license, question).await
    }

    /// Whether the current question is bookmarked.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the ledger cannot be read.
    pub async fn is_bookmarked(&self) -> Result<bool, SessionError> {
        let (license, question) = {
            let session = self.session.lock().await;
            (session.license(), session.current_ref())
        };
        Ok(self.service.ledger().is_bookmarked(license, question).await?)
    }

    async fn complete(&mut self, license: LicenseType, quiz: QuizNumber, outcome: &FinishOutcome) {
        self.timer.stop();
        self.phases.send_replace(SessionPhase::Finished);
        self.service.record_finish(license, quiz, outcome).await;
    }

    fn schedule_advance(&mut self, pending: PendingAdvance) {
        self.cancel_pending_advance();
        let session = Arc::downgrade(&self.session);
        self.pending_advance = Some(tokio::spawn(async move {
            tokio::time::sleep(AUTO_ADVANCE_DELAY).await;
            let Some(session) = session.upgrade() else {
                return;
            };
            if session.lock().await.fire_advance(pending) {
                tracing::debug!(from = pending.from_index, "auto-advanced");
            }
        }));
    }

    fn cancel_pending_advance(&mut self) {
        if let Some(handle) = self.pending_advance.take() {
            handle.abort();
        }
    }
}

impl Drop for LiveQuiz {
    fn drop(&mut self) {
        self.cancel_pending_advance();
    }
}

impl fmt::Debug for LiveQuiz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveQuiz")
            .field("phase", &*self.phases.borrow())
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}
