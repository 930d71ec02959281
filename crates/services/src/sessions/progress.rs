use serde::Serialize;

/// Lifecycle of one quiz attempt.
///
/// `NotStarted → InProgress → (TimeExpired | Finished)`. `TimeExpired` may go
/// back to `InProgress` when the learner chooses to continue; `Finished` is
/// terminal until a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    NotStarted,
    InProgress,
    TimeExpired,
    Finished,
}

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub revealed: usize,
    pub current: usize,
    pub time_remaining: u32,
    pub phase: SessionPhase,
}

impl SessionProgress {
    /// Share of answered questions, in `0.0..=1.0`.
    #[must_use]
    pub fn answered_ratio(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.answered as f32 / self.total as f32;
        ratio
    }

    /// Remaining time as `MM:SS`.
    #[must_use]
    pub fn clock_label(&self) -> String {
        format!("{:02}:{:02}", self.time_remaining / 60, self.time_remaining % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(answered: usize, time_remaining: u32) -> SessionProgress {
        SessionProgress {
            total: 30,
            answered,
            revealed: 0,
            current: 0,
            time_remaining,
            phase: SessionPhase::InProgress,
        }
    }

    #[test]
    fn clock_label_pads_minutes_and_seconds() {
        assert_eq!(progress(0, 2400).clock_label(), "40:00");
        assert_eq!(progress(0, 65).clock_label(), "01:05");
        assert_eq!(progress(0, 0).clock_label(), "00:00");
    }

    #[test]
    fn answered_ratio_tracks_progress_bar() {
        assert!((progress(15, 0).answered_ratio() - 0.5).abs() < f32::EPSILON);
        assert!((progress(30, 0).answered_ratio() - 1.0).abs() < f32::EPSILON);
    }
}
