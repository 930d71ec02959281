mod live;
mod progress;
mod service;
mod timer;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use live::LiveQuiz;
pub use progress::{SessionPhase, SessionProgress};
pub use service::{
    AUTO_ADVANCE_DELAY, FinishOutcome, PendingAdvance, QUIZ_DURATION_SECS, QuizSession,
    RevealOutcome, SlotAnswer, Step, TickOutcome,
};
pub use timer::{CountdownTimer, TICK_PERIOD};
pub use workflow::QuizLoopService;
