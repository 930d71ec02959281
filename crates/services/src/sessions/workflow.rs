use std::sync::Arc;

use theory_core::model::{LicenseType, QuestionCatalog, QuestionRef, QuizNumber};

use super::service::{FinishOutcome, QuizSession, RevealOutcome, Step};
use crate::Clock;
use crate::error::SessionError;
use crate::ledger::ProgressLedger;
use crate::review::BookmarkToggled;

/// Orchestrates quiz start and the ledger writes triggered by reveal and finish.
///
/// Ledger failures never interrupt the exam: they are logged and the session
/// carries on with its in-memory state.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    catalog: Arc<dyn QuestionCatalog>,
    ledger: ProgressLedger,
    auto_advance: bool,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(clock: Clock, catalog: Arc<dyn QuestionCatalog>, ledger: ProgressLedger) -> Self {
        Self {
            clock,
            catalog,
            ledger,
            auto_advance: false,
        }
    }

    #[must_use]
    pub fn with_auto_advance(mut self, auto_advance: bool) -> Self {
        self.auto_advance = auto_advance;
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn QuestionCatalog> {
        &self.catalog
    }

    #[must_use]
    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    /// Look up the quiz and start a fresh attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidQuiz` if the type or quiz is unknown or empty.
    pub fn start_quiz(
        &self,
        license: LicenseType,
        quiz: QuizNumber,
    ) -> Result<QuizSession, SessionError> {
        let questions = self.catalog.quiz(license, quiz)?;
        let mut session =
            QuizSession::new(license, quiz, questions)?.with_auto_advance(self.auto_advance);
        session.start();
        tracing::debug!(%license, %quiz, total = session.total(), "quiz started");
        Ok(session)
    }

    /// Reveal the current question and report a wrong answer to the ledger.
    ///
    /// # Errors
    ///
    /// Returns the session's phase errors. Ledger failures are only logged.
    pub async fn reveal(&self, session: &mut QuizSession) -> Result<RevealOutcome, SessionError> {
        let outcome = session.reveal()?;
        self.record_reveal(session.license(), &outcome).await;
        Ok(outcome)
    }

    /// Move forward, persisting the grade when the step finishes the attempt.
    ///
    /// # Errors
    ///
    /// Returns the session's phase errors. Ledger failures are only logged.
    pub async fn advance(&self, session: &mut QuizSession) -> Result<Step, SessionError> {
        let step = session.advance(self.clock.now())?;
        if let Step::Finished(outcome) = &step {
            self.record_finish(session.license(), session.quiz(), outcome)
                .await;
        }
        Ok(step)
    }

    /// Grade the attempt and persist wrong answers plus the last score.
    ///
    /// # Errors
    ///
    /// Returns the session's phase errors. Ledger failures are only logged.
    pub async fn finish(&self, session: &mut QuizSession) -> Result<FinishOutcome, SessionError> {
        let outcome = session.finish(self.clock.now())?;
        self.record_finish(session.license(), session.quiz(), &outcome)
            .await;
        Ok(outcome)
    }

    /// Flip the bookmark of `question` for `license`. The event is built only
    /// after the ledger write has succeeded.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the ledger write fails.
    pub async fn toggle_bookmark(
        &self,
        license: LicenseType,
        question: QuestionRef,
    ) -> Result<BookmarkToggled, SessionError> {
        let now_bookmarked = self.ledger.toggle_bookmark(license, question).await?;
        Ok(BookmarkToggled {
            quiz: question.quiz,
            index: question.index,
            now_bookmarked,
        })
    }

    /// Persist the wrong-answer increment a reveal asked for, if any.
    pub async fn record_reveal(&self, license: LicenseType, outcome: &RevealOutcome) {
        if !outcome.record_wrong {
            return;
        }
        self.record_wrong(license, outcome.question).await;
    }

    /// Persist the wrong answers and last score of a finished attempt.
    pub async fn record_finish(
        &self,
        license: LicenseType,
        quiz: QuizNumber,
        outcome: &FinishOutcome,
    ) {
        for question in &outcome.wrong_to_record {
            self.record_wrong(license, *question).await;
        }

        let score = outcome.score;
        if let Err(err) = self
            .ledger
            .record_score(license, quiz, score.score, score.total, Some(score.recorded_at))
            .await
        {
            tracing::warn!(%license, %quiz, error = %err, "failed to record last score");
        }
        tracing::info!(
            %license,
            %quiz,
            score = score.score,
            total = score.total,
            "quiz finished"
        );
    }

    async fn record_wrong(&self, license: LicenseType, question: QuestionRef) {
        if let Err(err) = self.ledger.increment_wrong(license, question).await {
            tracing::warn!(%license, %question, error = %err, "failed to record wrong answer");
        }
    }
}
