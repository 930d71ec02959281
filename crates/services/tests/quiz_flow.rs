use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use services::sessions::{LiveQuiz, QUIZ_DURATION_SECS, QuizLoopService, SessionPhase, Step};
use services::{Clock, ProgressLedger, SessionError};
use storage::repository::{PreferenceStore, StorageError};
use theory_core::model::{
    InMemoryCatalog, LicenseType, OptionKey, Question, QuestionRef, QuizNumber,
};
use theory_core::time::fixed_now;

fn question(text: &str, answer: OptionKey) -> Question {
    Question {
        question: text.into(),
        a: "A".into(),
        b: "B".into(),
        c: "C".into(),
        d: "D".into(),
        answer,
    }
}

fn catalog() -> Arc<InMemoryCatalog> {
    Arc::new(
        InMemoryCatalog::new()
            .with_quiz(
                LicenseType::Private,
                QuizNumber::new(1),
                vec![question("Q1", OptionKey::Two), question("Q2", OptionKey::One)],
            )
            .with_quiz(
                LicenseType::Private,
                QuizNumber::new(2),
                vec![
                    question("P1", OptionKey::One),
                    question("P2", OptionKey::Two),
                    question("P3", OptionKey::Three),
                ],
            ),
    )
}

fn service(ledger: ProgressLedger) -> QuizLoopService {
    QuizLoopService::new(Clock::fixed(fixed_now()), catalog(), ledger)
}

/// Store whose writes always fail.
struct ReadOnlyStore;

#[async_trait]
impl PreferenceStore for ReadOnlyStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
        Err(StorageError::Connection("disk full".into()))
    }
}

#[tokio::test]
async fn finishing_two_question_quiz_updates_ledger() {
    let ledger = ProgressLedger::in_memory(Clock::fixed(fixed_now()));
    let svc = service(ledger.clone());
    let quiz = QuizNumber::new(1);

    let mut session = svc.start_quiz(LicenseType::Private, quiz).unwrap();
    session.select(OptionKey::Two).unwrap();
    svc.advance(&mut session).await.unwrap();
    session.select(OptionKey::Three).unwrap();
    let outcome = svc.finish(&mut session).await.unwrap();

    assert_eq!((outcome.score.score, outcome.score.total), (1, 2));

    let counts = ledger.list_wrong_counts(LicenseType::Private).await.unwrap();
    assert_eq!(counts.get(QuestionRef::new(quiz, 1)), Some(1));
    assert_eq!(counts.len(), 1);

    let scores = ledger.list_scores(LicenseType::Private).await.unwrap();
    let last = scores.get(quiz).unwrap();
    assert_eq!((last.score, last.total), (1, 2));
    assert_eq!(last.recorded_at, fixed_now());
}

#[tokio::test]
async fn reveal_then_finish_counts_each_question_once() {
    let ledger = ProgressLedger::in_memory(Clock::fixed(fixed_now()));
    let svc = service(ledger.clone());
    let quiz = QuizNumber::new(1);

    let mut session = svc.start_quiz(LicenseType::Private, quiz).unwrap();
    session.select(OptionKey::Four).unwrap();
    for _ in 0..3 {
        svc.reveal(&mut session).await.unwrap();
    }
    svc.advance(&mut session).await.unwrap();
    let Step::Finished(outcome) = svc.advance(&mut session).await.unwrap() else {
        panic!("advancing from the last question should finish");
    };
    assert_eq!(outcome.score.score, 0);

    let counts = ledger.list_wrong_counts(LicenseType::Private).await.unwrap();
    assert_eq!(counts.get(QuestionRef::new(quiz, 0)), Some(1));
    assert_eq!(counts.get(QuestionRef::new(quiz, 1)), Some(1));
}

#[tokio::test]
async fn wrong_counts_accumulate_across_attempts() {
    let ledger = ProgressLedger::in_memory(Clock::fixed(fixed_now()));
    let svc = service(ledger.clone());
    let quiz = QuizNumber::new(1);

    let mut session = svc.start_quiz(LicenseType::Private, quiz).unwrap();
    for _ in 0..2 {
        session.select(OptionKey::One).unwrap();
        svc.reveal(&mut session).await.unwrap();
        session.restart();
    }

    let counts = ledger.list_wrong_counts(LicenseType::Private).await.unwrap();
    assert_eq!(counts.get(QuestionRef::new(quiz, 0)), Some(2));
}

#[tokio::test]
async fn unknown_quiz_is_rejected() {
    let svc = service(ProgressLedger::in_memory(Clock::fixed(fixed_now())));
    let err = svc
        .start_quiz(LicenseType::Private, QuizNumber::new(99))
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidQuiz(_)));
    assert!(matches!(
        svc.start_quiz(LicenseType::Tractor, QuizNumber::new(1)),
        Err(SessionError::InvalidQuiz(_))
    ));
}

#[tokio::test]
async fn ledger_failures_do_not_interrupt_the_exam() {
    let ledger = ProgressLedger::new(Clock::fixed(fixed_now()), Arc::new(ReadOnlyStore));
    let svc = service(ledger);

    let mut session = svc.start_quiz(LicenseType::Private, QuizNumber::new(1)).unwrap();
    session.select(OptionKey::One).unwrap();
    let reveal = svc.reveal(&mut session).await.unwrap();
    assert!(reveal.record_wrong);

    svc.advance(&mut session).await.unwrap();
    session.select(OptionKey::One).unwrap();
    let outcome = svc.finish(&mut session).await.unwrap();
    assert_eq!(outcome.score.score, 1);
    assert_eq!(session.phase(), SessionPhase::Finished);
}

#[tokio::test(start_paused = true)]
async fn live_quiz_expires_after_forty_minutes() {
    let svc = service(ProgressLedger::in_memory(Clock::fixed(fixed_now())));
    let live = LiveQuiz::start(svc, LicenseType::Private, QuizNumber::new(1)).unwrap();
    let mut phases = live.phase_changes();

    phases
        .wait_for(|phase| *phase == SessionPhase::TimeExpired)
        .await
        .unwrap();

    let progress = live.progress().await;
    assert_eq!(progress.time_remaining, 0);
    assert_eq!(progress.phase, SessionPhase::TimeExpired);
    assert!(!live.timer_running());
}

#[tokio::test(start_paused = true)]
async fn live_quiz_auto_advances_once() {
    let svc = service(ProgressLedger::in_memory(Clock::fixed(fixed_now()))).with_auto_advance(true);
    let mut live = LiveQuiz::start(svc, LicenseType::Private, QuizNumber::new(2)).unwrap();

    live.select(OptionKey::Two).await.unwrap();
    live.reveal().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(live.progress().await.current, 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(live.progress().await.current, 1);
}

#[tokio::test(start_paused = true)]
async fn manual_navigation_cancels_pending_auto_advance() {
    let svc = service(ProgressLedger::in_memory(Clock::fixed(fixed_now()))).with_auto_advance(true);
    let mut live = LiveQuiz::start(svc, LicenseType::Private, QuizNumber::new(2)).unwrap();

    live.select(OptionKey::One).await.unwrap();
    live.jump_to(2).await.unwrap();
    live.retreat().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(live.progress().await.current, 1);
}

#[tokio::test(start_paused = true)]
async fn live_finish_stops_timer_and_restart_resumes_it() {
    let ledger = ProgressLedger::in_memory(Clock::fixed(fixed_now()));
    let svc = service(ledger.clone());
    let mut live = LiveQuiz::start(svc, LicenseType::Private, QuizNumber::new(1)).unwrap();

    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert_eq!(live.progress().await.time_remaining, QUIZ_DURATION_SECS - 5);

    live.finish().await.unwrap();
    assert!(!live.timer_running());
    assert_eq!(*live.phase_changes().borrow(), SessionPhase::Finished);
    let scores = ledger.list_scores(LicenseType::Private).await.unwrap();
    assert_eq!(scores.get(QuizNumber::new(1)).map(|s| s.score), Some(0));

    live.restart().await;
    assert!(live.timer_running());
    let progress = live.progress().await;
    assert_eq!(progress.time_remaining, QUIZ_DURATION_SECS);
    assert_eq!((progress.answered, progress.revealed), (0, 0));
    assert_eq!(progress.total, 2);
}

#[tokio::test]
async fn live_bookmark_toggle_reports_after_write() {
    let ledger = ProgressLedger::in_memory(Clock::fixed(fixed_now()));
    let svc = service(ledger.clone());
    let mut live = LiveQuiz::start(svc, LicenseType::Private, QuizNumber::new(1)).unwrap();

    live.jump_to(1).await.unwrap();
    let event = live.toggle_bookmark().await.unwrap();
    assert!(event.now_bookmarked);
    assert_eq!(event.question(), QuestionRef::new(QuizNumber::new(1), 1));
    assert!(live.is_bookmarked().await.unwrap());
    assert!(
        ledger
            .is_bookmarked(LicenseType::Private, QuestionRef::new(QuizNumber::new(1), 1))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn live_bookmark_failure_surfaces_storage_error() {
    let ledger = ProgressLedger::new(Clock::fixed(fixed_now()), Arc::new(ReadOnlyStore));
    let live = LiveQuiz::start(service(ledger), LicenseType::Private, QuizNumber::new(1)).unwrap();
    let err = live.toggle_bookmark().await.unwrap_err();
    assert!(matches!(err, SessionError::Storage(_)));
}

#[tokio::test(start_paused = true)]
async fn auto_advance_switch_applies_mid_quiz() {
    let svc = service(ProgressLedger::in_memory(Clock::fixed(fixed_now()))).with_auto_advance(true);
    let mut live = LiveQuiz::start(svc, LicenseType::Private, QuizNumber::new(2)).unwrap();

    live.select(OptionKey::One).await.unwrap();
    live.set_auto_advance(false).await;
    assert!(!live.auto_advance().await);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(live.progress().await.current, 0);
    assert!(live.with_session(|s| s.pending_advance().is_none()).await);

    live.advance().await.unwrap();
    live.set_auto_advance(true).await;
    live.select(OptionKey::Two).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(live.progress().await.current, 2);
}
