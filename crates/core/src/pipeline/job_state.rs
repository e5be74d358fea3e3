use std::fmt;

/// Lifecycle of a [`VideoJob`](super::video_job::VideoJob).
///
/// ```text
/// Idle → Extracting → ProcessingFrames → Remuxing → Completed   (batch)
///                                      ↘ Completed               (live)
/// any non-terminal state → Failed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum JobState {
    #[default]
    Idle,
    Extracting,
    ProcessingFrames,
    Remuxing,
    Completed,
    Failed,
}

impl JobState {
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Idle, Extracting)
            | (Extracting, ProcessingFrames)
            | (ProcessingFrames, Remuxing)
            | (ProcessingFrames, Completed)
            | (Remuxing, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::ProcessingFrames => "processing_frames",
            Self::Remuxing => "remuxing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::JobState::*;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Idle, Extracting, true)]
    #[case(Extracting, ProcessingFrames, true)]
    #[case(ProcessingFrames, Remuxing, true)]
    #[case(ProcessingFrames, Completed, true)]
    #[case(Remuxing, Completed, true)]
    #[case(Idle, Failed, true)]
    #[case(Extracting, Failed, true)]
    #[case(Remuxing, Failed, true)]
    #[case(Idle, ProcessingFrames, false)]
    #[case(Extracting, Remuxing, false)]
    #[case(Remuxing, ProcessingFrames, false)]
    #[case(Completed, Failed, false)]
    #[case(Failed, Extracting, false)]
    #[case(Completed, Idle, false)]
    fn test_transitions(#[case] from: JobState, #[case] to: JobState, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!ProcessingFrames.is_terminal());
    }

    #[test]
    fn test_display_uses_snake_case() {
        assert_eq!(ProcessingFrames.to_string(), "processing_frames");
    }
}
