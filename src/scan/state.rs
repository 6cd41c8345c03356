//! Observable scan loop state.

use std::fmt;

/// Where the scan loop currently is.
///
/// A timer is pending exactly while the state is [`ScanState::Waiting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    /// No session, or the session halted.
    #[default]
    Idle,
    /// Waiting for the camera stream to start playing.
    Acquiring,
    /// Next decode attempt is scheduled.
    Waiting,
    /// Capturing and decoding a frame.
    Decoding,
}

impl ScanState {
    /// Numeric encoding used by the state gauge.
    pub fn code(self) -> i64 {
        match self {
            Self::Idle => 0,
            Self::Acquiring => 1,
            Self::Waiting => 2,
            Self::Decoding => 3,
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Waiting => "waiting",
            Self::Decoding => "decoding",
        };
        f.write_str(name)
    }
}
