use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

use super::progress::SessionPhase;
use super::service::{QuizSession, TickOutcome};

/// Countdown tick period.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Periodic countdown task bound to one session.
///
/// The task only holds a weak reference, so it stops by itself once the
/// session is dropped. Dropping the timer aborts the task.
#[derive(Debug)]
pub struct CountdownTimer {
    handle: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    /// Spawn the countdown on the current tokio runtime.
    ///
    /// The task ends when the countdown expires, when the session stops
    /// accepting ticks, or when the session is gone. Expiry is published on
    /// `phases`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(
        session: Weak<Mutex<QuizSession>>,
        period: Duration,
        phases: Arc<watch::Sender<SessionPhase>>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                let outcome = session.lock().await.tick();
                match outcome {
                    TickOutcome::Running { .. } => {}
                    TickOutcome::Expired => {
                        tracing::info!("quiz time expired");
                        phases.send_replace(SessionPhase::TimeExpired);
                        break;
                    }
                    TickOutcome::Idle => break,
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Cancel the countdown. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use theory_core::model::{LicenseType, OptionKey, Question, QuizNumber};

    fn running_session() -> Arc<Mutex<QuizSession>> {
        let questions: Arc<[Question]> = vec![Question {
            question: "q".into(),
            a: "a".into(),
            b: "b".into(),
            c: "c".into(),
            d: "d".into(),
            answer: OptionKey::One,
        }]
        .into();
        let mut session =
            QuizSession::new(LicenseType::Private, QuizNumber::new(1), questions).unwrap();
        session.start();
        Arc::new(Mutex::new(session))
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let session = running_session();
        let (tx, _rx) = watch::channel(SessionPhase::InProgress);
        let _timer = CountdownTimer::spawn(Arc::downgrade(&session), TICK_PERIOD, Arc::new(tx));

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(session.lock().await.time_remaining(), 2397);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_timer_no_longer_ticks() {
        let session = running_session();
        let (tx, _rx) = watch::channel(SessionPhase::InProgress);
        let mut timer = CountdownTimer::spawn(Arc::downgrade(&session), TICK_PERIOD, Arc::new(tx));

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        timer.stop();
        assert!(!timer.is_running());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(session.lock().await.time_remaining(), 2399);
    }

    #[tokio::test(start_paused = true)]
    async fn task_ends_when_session_is_dropped() {
        let session = running_session();
        let (tx, _rx) = watch::channel(SessionPhase::InProgress);
        let timer = CountdownTimer::spawn(Arc::downgrade(&session), TICK_PERIOD, Arc::new(tx));

        drop(session);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!timer.is_running());
    }
}
