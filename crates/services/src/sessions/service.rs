use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use theory_core::model::{
    InvalidQuizError, LicenseType, OptionKey, Question, QuestionRef, QuizNumber, ScoreRecord,
};

use super::progress::{SessionPhase, SessionProgress};
use crate::error::SessionError;

/// Length of one timed attempt, in seconds (40 minutes).
pub const QUIZ_DURATION_SECS: u32 = 2400;

/// Pause between a selection or reveal and the automatic move to the next
/// question, so the learner sees the feedback first.
pub const AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(250);

//
// ─── SLOT STATE ────────────────────────────────────────────────────────────────
//

/// The learner's answer to one question. Correctness is always derived from
/// the question key, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAnswer {
    selected: OptionKey,
    is_correct: bool,
}

impl SlotAnswer {
    #[must_use]
    pub fn evaluate(selected: OptionKey, question: &Question) -> Self {
        Self {
            selected,
            is_correct: question.is_correct(selected),
        }
    }

    #[must_use]
    pub fn selected(&self) -> OptionKey {
        self.selected
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// A requested automatic advance away from `from_index`.
///
/// Only the most recent request is honoured, and only while the learner is
/// still on `from_index` within the same attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAdvance {
    pub from_index: usize,
    pub attempt: u32,
}

/// Result of revealing the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealOutcome {
    pub question: QuestionRef,
    pub answer: Option<SlotAnswer>,
    /// True when the caller must increment the wrong-answer tally for
    /// `question`. Set at most once per question per attempt.
    pub record_wrong: bool,
    pub advance: Option<PendingAdvance>,
}

/// Final grade plus the wrong answers that still need to reach the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishOutcome {
    pub score: ScoreRecord,
    pub wrong_to_record: Vec<QuestionRef>,
}

/// Result of a forward step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Moved { index: usize },
    Finished(FinishOutcome),
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The countdown is not running (not started, expired or finished).
    Idle,
    Running { remaining: u32 },
    /// This tick brought the countdown to zero.
    Expired,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state machine for one timed attempt at a quiz.
///
/// The session never touches storage. Operations that need a ledger write
/// return it as data (`RevealOutcome::record_wrong`, `FinishOutcome`) and the
/// caller decides how to persist it.
pub struct QuizSession {
    license: LicenseType,
    quiz: QuizNumber,
    questions: Arc<[Question]>,
    current: usize,
    answers: Vec<Option<SlotAnswer>>,
    revealed: Vec<bool>,
    time_remaining: u32,
    wrong_recorded: HashSet<QuestionRef>,
    phase: SessionPhase,
    auto_advance: bool,
    pending_advance: Option<PendingAdvance>,
    attempt: u32,
    score: Option<ScoreRecord>,
}

impl QuizSession {
    /// Create a session in the not-started phase.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuizError::Empty` if `questions` is empty.
    pub fn new(
        license: LicenseType,
        quiz: QuizNumber,
        questions: Arc<[Question]>,
    ) -> Result<Self, InvalidQuizError> {
        if questions.is_empty() {
            return Err(InvalidQuizError::Empty { license, quiz });
        }

        let total = questions.len();
        Ok(Self {
            license,
            quiz,
            questions,
            current: 0,
            answers: vec![None; total],
            revealed: vec![false; total],
            time_remaining: QUIZ_DURATION_SECS,
            wrong_recorded: HashSet::new(),
            phase: SessionPhase::NotStarted,
            auto_advance: false,
            pending_advance: None,
            attempt: 0,
            score: None,
        })
    }

    #[must_use]
    pub fn with_auto_advance(mut self, enabled: bool) -> Self {
        self.auto_advance = enabled;
        self
    }

    /// Begin the attempt. Starting a session that is already running is a no-op.
    pub fn start(&mut self) {
        if self.phase == SessionPhase::NotStarted {
            self.phase = SessionPhase::InProgress;
        }
    }

    pub fn set_auto_advance(&mut self, enabled: bool) {
        self.auto_advance = enabled;
        if !enabled {
            self.pending_advance = None;
        }
    }

    #[must_use]
    pub fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    #[must_use]
    pub fn license(&self) -> LicenseType {
        self.license
    }

    #[must_use]
    pub fn quiz(&self) -> QuizNumber {
        self.quiz
    }

    #[must_use]
    pub fn questions(&self) -> &Arc<[Question]> {
        &self.questions
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    #[must_use]
    pub fn current_ref(&self) -> QuestionRef {
        QuestionRef::new(self.quiz, self.current)
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current + 1 == self.questions.len()
    }

    #[must_use]
    pub fn answer(&self, index: usize) -> Option<SlotAnswer> {
        self.answers.get(index).copied().flatten()
    }

    #[must_use]
    pub fn is_revealed(&self, index: usize) -> bool {
        self.revealed.get(index).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn pending_advance(&self) -> Option<PendingAdvance> {
        self.pending_advance
    }

    /// Questions already counted toward the wrong-answer tally this attempt.
    #[must_use]
    pub fn wrong_recorded(&self) -> &HashSet<QuestionRef> {
        &self.wrong_recorded
    }

    /// Number of correct answers so far.
    #[must_use]
    pub fn correct_count(&self) -> u32 {
        let correct = self
            .answers
            .iter()
            .flatten()
            .filter(|answer| answer.is_correct)
            .count();
        u32::try_from(correct).unwrap_or(u32::MAX)
    }

    /// Final score, once the attempt is finished.
    #[must_use]
    pub fn score(&self) -> Option<ScoreRecord> {
        self.score
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.total(),
            answered: self.answers.iter().flatten().count(),
            revealed: self.revealed.iter().filter(|r| **r).count(),
            current: self.current,
            time_remaining: self.time_remaining,
            phase: self.phase,
        }
    }

    //
    // ─── ANSWERING ─────────────────────────────────────────────────────────────
    //

    /// Record `option` for the current question. A prior selection may be
    /// overwritten until the question is revealed.
    ///
    /// Returns the auto-advance request, if one was scheduled.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted`, `SessionError::TimeExpired` or
    /// `SessionError::Completed` outside the in-progress phase, and
    /// `SessionError::Revealed` if the current question is already revealed.
    pub fn select(&mut self, option: OptionKey) -> Result<Option<PendingAdvance>, SessionError> {
        self.ensure_in_progress()?;
        if self.revealed[self.current] {
            return Err(SessionError::Revealed {
                index: self.current,
            });
        }

        let answer = SlotAnswer::evaluate(option, &self.questions[self.current]);
        self.answers[self.current] = Some(answer);
        Ok(self.request_advance())
    }

    /// Show correctness for the current question.
    ///
    /// Revealing twice is harmless: the wrong-answer tally is requested at most
    /// once per question, and an empty slot never requests it.
    ///
    /// # Errors
    ///
    /// Returns a phase error outside the in-progress phase.
    pub fn reveal(&mut self) -> Result<RevealOutcome, SessionError> {
        self.ensure_in_progress()?;

        let index = self.current;
        let question = self.current_ref();
        self.revealed[index] = true;

        let answer = self.answers[index];
        let record_wrong = match answer {
            Some(answer) if !answer.is_correct => self.wrong_recorded.insert(question),
            _ => false,
        };
        let advance = if answer.is_some() {
            self.request_advance()
        } else {
            None
        };

        Ok(RevealOutcome {
            question,
            answer,
            record_wrong,
            advance,
        })
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    /// Move to the next question, or finish the attempt from the last one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` or `SessionError::Completed`.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Step, SessionError> {
        self.ensure_navigable()?;
        self.pending_advance = None;

        if self.is_last() {
            return self.finish(now).map(Step::Finished);
        }
        self.current += 1;
        Ok(Step::Moved {
            index: self.current,
        })
    }

    /// Move back one question. No-op on the first question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` or `SessionError::Completed`.
    pub fn retreat(&mut self) -> Result<usize, SessionError> {
        self.ensure_navigable()?;
        self.pending_advance = None;
        self.current = self.current.saturating_sub(1);
        Ok(self.current)
    }

    /// Jump directly to `index`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IndexOutOfRange` for an invalid index, or a phase error.
    pub fn jump_to(&mut self, index: usize) -> Result<(), SessionError> {
        self.ensure_navigable()?;
        if index >= self.questions.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                total: self.questions.len(),
            });
        }
        self.pending_advance = None;
        self.current = index;
        Ok(())
    }

    /// Apply a scheduled auto-advance. Returns `true` if the session moved.
    ///
    /// Stale requests (superseded, from an earlier attempt, or made on a
    /// question the learner already left) are dropped.
    pub fn fire_advance(&mut self, pending: PendingAdvance) -> bool {
        if self.pending_advance != Some(pending) {
            return false;
        }
        self.pending_advance = None;

        if self.phase != SessionPhase::InProgress
            || pending.attempt != self.attempt
            || self.current != pending.from_index
            || self.is_last()
        {
            return false;
        }
        self.current += 1;
        true
    }

    //
    // ─── COMPLETION ────────────────────────────────────────────────────────────
    //

    /// Grade the attempt and reveal every question.
    ///
    /// Unanswered questions count as incorrect. `wrong_to_record` lists every
    /// incorrect question not yet reported this attempt, in index order.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` or `SessionError::Completed`.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<FinishOutcome, SessionError> {
        self.ensure_navigable()?;
        self.pending_advance = None;

        let mut wrong_to_record = Vec::new();
        for (index, question) in self.questions.iter().enumerate() {
            let answer = self.answers[index]
                .map(|answer| SlotAnswer::evaluate(answer.selected, question));
            self.answers[index] = answer;
            self.revealed[index] = true;

            let correct = answer.is_some_and(|answer| answer.is_correct);
            let key = QuestionRef::new(self.quiz, index);
            if !correct && self.wrong_recorded.insert(key) {
                wrong_to_record.push(key);
            }
        }

        let total = u32::try_from(self.questions.len()).unwrap_or(u32::MAX);
        let score = ScoreRecord::new(self.correct_count(), total, now);
        self.score = Some(score);
        self.phase = SessionPhase::Finished;

        Ok(FinishOutcome {
            score,
            wrong_to_record,
        })
    }

    /// Reset all per-attempt state and begin a fresh attempt over the same questions.
    pub fn restart(&mut self) {
        let total = self.questions.len();
        self.current = 0;
        self.answers = vec![None; total];
        self.revealed = vec![false; total];
        self.time_remaining = QUIZ_DURATION_SECS;
        self.wrong_recorded.clear();
        self.pending_advance = None;
        self.score = None;
        self.attempt = self.attempt.wrapping_add(1);
        self.phase = SessionPhase::InProgress;
    }

    //
    // ─── TIMER ─────────────────────────────────────────────────────────────────
    //

    /// Count down one second. Reaching zero moves the session to `TimeExpired`.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != SessionPhase::InProgress || self.time_remaining == 0 {
            return TickOutcome::Idle;
        }

        self.time_remaining -= 1;
        if self.time_remaining == 0 {
            self.phase = SessionPhase::TimeExpired;
            self.pending_advance = None;
            return TickOutcome::Expired;
        }
        TickOutcome::Running {
            remaining: self.time_remaining,
        }
    }

    /// Leave the time-expired state and keep answering. The countdown stays at
    /// zero; finishing is the only way forward.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the attempt is finished and
    /// `SessionError::NotStarted` if it never started.
    pub fn continue_after_expiry(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::TimeExpired => {
                self.phase = SessionPhase::InProgress;
                Ok(())
            }
            SessionPhase::InProgress => Ok(()),
            SessionPhase::NotStarted => Err(SessionError::NotStarted),
            SessionPhase::Finished => Err(SessionError::Completed),
        }
    }

    //
    // ─── HELPERS ───────────────────────────────────────────────────────────────
    //

    fn request_advance(&mut self) -> Option<PendingAdvance> {
        if !self.auto_advance || self.is_last() {
            return None;
        }
        let pending = PendingAdvance {
            from_index: self.current,
            attempt: self.attempt,
        };
        if self.pending_advance == Some(pending) {
            return None;
        }
        self.pending_advance = Some(pending);
        Some(pending)
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::InProgress => Ok(()),
            SessionPhase::NotStarted => Err(SessionError::NotStarted),
            SessionPhase::TimeExpired => Err(SessionError::TimeExpired),
            SessionPhase::Finished => Err(SessionError::Completed),
        }
    }

    fn ensure_navigable(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::InProgress | SessionPhase::TimeExpired => Ok(()),
            SessionPhase::NotStarted => Err(SessionError::NotStarted),
            SessionPhase::Finished => Err(SessionError::Completed),
        }
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("license", &self.license)
            .field("quiz", &self.quiz)
            .field("total", &self.questions.len())
            .field("current", &self.current)
            .field("phase", &self.phase)
            .field("time_remaining", &self.time_remaining)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use theory_core::time::fixed_now;

    fn question(answer: OptionKey) -> Question {
        Question {
            question: "q".into(),
            a: "a".into(),
            b: "b".into(),
            c: "c".into(),
            d: "d".into(),
            answer,
        }
    }

    fn session(answers: &[OptionKey]) -> QuizSession {
        let questions: Arc<[Question]> = answers.iter().copied().map(question).collect();
        let mut session =
            QuizSession::new(LicenseType::Private, QuizNumber::new(7), questions).unwrap();
        session.start();
        session
    }

    #[test]
    fn empty_quiz_is_rejected() {
        let err = QuizSession::new(LicenseType::Taxi, QuizNumber::new(1), Arc::from(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, InvalidQuizError::Empty { .. }));
    }

    #[test]
    fn new_session_starts_clean() {
        let questions: Arc<[Question]> = vec![question(OptionKey::One)].into();
        let mut session = QuizSession::new(LicenseType::Private, QuizNumber::new(1), questions).unwrap();
        assert_eq!(session.phase(), SessionPhase::NotStarted);
        assert!(matches!(session.select(OptionKey::One), Err(SessionError::NotStarted)));

        session.start();
        session.start();
        assert_eq!(session.phase(), SessionPhase::InProgress);
        assert_eq!(session.time_remaining(), QUIZ_DURATION_SECS);
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn selection_can_change_until_revealed() {
        let mut session = session(&[OptionKey::Two, OptionKey::One]);
        session.select(OptionKey::One).unwrap();
        assert!(!session.answer(0).unwrap().is_correct());
        session.select(OptionKey::Two).unwrap();
        assert!(session.answer(0).unwrap().is_correct());

        session.reveal().unwrap();
        assert!(matches!(
            session.select(OptionKey::Three),
            Err(SessionError::Revealed { index: 0 })
        ));
        assert_eq!(session.answer(0).unwrap().selected(), OptionKey::Two);
    }

    #[test]
    fn repeated_reveal_requests_wrong_tally_once() {
        let mut session = session(&[OptionKey::Two, OptionKey::One]);
        session.select(OptionKey::Four).unwrap();

        let first = session.reveal().unwrap();
        assert!(first.record_wrong);
        for _ in 0..3 {
            assert!(!session.reveal().unwrap().record_wrong);
        }
        assert!(session.wrong_recorded().contains(&QuestionRef::new(QuizNumber::new(7), 0)));
    }

    #[test]
    fn revealing_empty_or_correct_slot_records_nothing() {
        let mut session = session(&[OptionKey::Two, OptionKey::One]);
        let outcome = session.reveal().unwrap();
        assert!(outcome.answer.is_none());
        assert!(!outcome.record_wrong);
        assert!(session.is_revealed(0));

        session.advance(fixed_now()).unwrap();
        session.select(OptionKey::One).unwrap();
        assert!(!session.reveal().unwrap().record_wrong);
    }

    #[test]
    fn navigation_stays_in_range() {
        let mut session = session(&[OptionKey::One, OptionKey::One, OptionKey::One]);
        assert_eq!(session.retreat().unwrap(), 0);
        session.jump_to(2).unwrap();
        assert_eq!(session.current_index(), 2);
        assert!(matches!(
            session.jump_to(3),
            Err(SessionError::IndexOutOfRange { index: 3, total: 3 })
        ));
        assert_eq!(session.retreat().unwrap(), 1);
        assert_eq!(
            session.advance(fixed_now()).unwrap(),
            Step::Moved { index: 2 }
        );
    }

    #[test]
    fn advancing_past_last_question_finishes() {
        let mut session = session(&[OptionKey::Two, OptionKey::One]);
        session.select(OptionKey::Two).unwrap();
        session.advance(fixed_now()).unwrap();
        session.select(OptionKey::Three).unwrap();

        let Step::Finished(outcome) = session.advance(fixed_now()).unwrap() else {
            panic!("expected finish from last question");
        };
        assert_eq!((outcome.score.score, outcome.score.total), (1, 2));
        assert_eq!(outcome.wrong_to_record, [QuestionRef::new(QuizNumber::new(7), 1)]);
        assert_eq!(session.phase(), SessionPhase::Finished);
        assert!(session.is_revealed(0) && session.is_revealed(1));
    }

    #[test]
    fn finish_skips_questions_already_tallied() {
        let mut session = session(&[OptionKey::Two, OptionKey::One, OptionKey::Three]);
        session.select(OptionKey::One).unwrap();
        assert!(session.reveal().unwrap().record_wrong);

        let outcome = session.finish(fixed_now()).unwrap();
        assert_eq!(outcome.score.score, 0);
        assert_eq!(
            outcome.wrong_to_record,
            [
                QuestionRef::new(QuizNumber::new(7), 1),
                QuestionRef::new(QuizNumber::new(7), 2)
            ]
        );
        assert!(matches!(session.finish(fixed_now()), Err(SessionError::Completed)));
        assert!(matches!(session.reveal(), Err(SessionError::Completed)));
    }

    #[test]
    fn score_matches_correct_selections() {
        let keys = [OptionKey::One, OptionKey::Two, OptionKey::Three, OptionKey::Four];
        let mut session = session(&keys);
        for (index, picked) in [OptionKey::One, OptionKey::One, OptionKey::Three, OptionKey::Two]
            .into_iter()
            .enumerate()
        {
            session.jump_to(index).unwrap();
            session.select(picked).unwrap();
        }
        let outcome = session.finish(fixed_now()).unwrap();
        assert_eq!(outcome.score.score, 2);
        assert_eq!(session.score(), Some(outcome.score));
        assert_eq!(outcome.score.recorded_at, fixed_now());
    }

    #[test]
    fn restart_resets_state_but_keeps_questions() {
        let mut session = session(&[OptionKey::Two, OptionKey::One]);
        let before = Arc::clone(session.questions());
        session.select(OptionKey::One).unwrap();
        session.reveal().unwrap();
        session.tick();
        session.finish(fixed_now()).unwrap();

        session.restart();
        assert_eq!(session.phase(), SessionPhase::InProgress);
        assert_eq!(session.questions().as_ref(), before.as_ref());
        assert!((0..2).all(|i| session.answer(i).is_none() && !session.is_revealed(i)));
        assert_eq!(session.time_remaining(), QUIZ_DURATION_SECS);
        assert!(session.wrong_recorded().is_empty());
        assert_eq!(session.score(), None);
        assert_eq!(session.attempt(), 1);
    }

    #[test]
    fn countdown_expires_after_full_duration() {
        let mut session = session(&[OptionKey::One]);
        for _ in 0..QUIZ_DURATION_SECS - 1 {
            assert!(matches!(session.tick(), TickOutcome::Running { .. }));
        }
        assert_eq!(session.tick(), TickOutcome::Expired);
        assert_eq!(session.time_remaining(), 0);
        assert_eq!(session.phase(), SessionPhase::TimeExpired);
        assert_eq!(session.tick(), TickOutcome::Idle);

        assert!(matches!(session.select(OptionKey::One), Err(SessionError::TimeExpired)));
        session.continue_after_expiry().unwrap();
        session.select(OptionKey::One).unwrap();
        assert_eq!(session.tick(), TickOutcome::Idle);
        assert_eq!(session.time_remaining(), 0);
    }

    #[test]
    fn finish_is_allowed_after_expiry() {
        let mut session = session(&[OptionKey::One]);
        for _ in 0..QUIZ_DURATION_SECS {
            session.tick();
        }
        let outcome = session.finish(fixed_now()).unwrap();
        assert_eq!(outcome.score.score, 0);
    }

    #[test]
    fn auto_advance_is_requested_once_per_question() {
        let mut session = session(&[OptionKey::One, OptionKey::Two]).with_auto_advance(true);
        let from_select = session.select(OptionKey::One).unwrap();
        assert!(from_select.is_some());
        assert_eq!(session.reveal().unwrap().advance, None);

        assert!(session.fire_advance(from_select.unwrap()));
        assert_eq!(session.current_index(), 1);
        assert!(!session.fire_advance(from_select.unwrap()));
        assert_eq!(session.current_index(), 1);

        assert_eq!(session.select(OptionKey::Two).unwrap(), None);
    }

    #[test]
    fn stale_auto_advance_is_dropped_after_manual_navigation() {
        let mut session =
            session(&[OptionKey::One, OptionKey::Two, OptionKey::Three]).with_auto_advance(true);
        let pending = session.select(OptionKey::One).unwrap().unwrap();
        session.advance(fixed_now()).unwrap();
        assert!(!session.fire_advance(pending));
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn reveal_of_empty_slot_does_not_request_advance() {
        let mut session = session(&[OptionKey::One, OptionKey::Two]).with_auto_advance(true);
        assert_eq!(session.reveal().unwrap().advance, None);
    }
}
