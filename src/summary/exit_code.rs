//! Stable process exit codes

use serde::{Deserialize, Serialize};

use crate::signal::EXIT_CODE_INTERRUPTED;

/// Process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ExitCode {
    /// Queue empty, or stopped after a shutdown request
    Clean = 0,
    /// Control-plane or local-environment failure
    Fatal = 1,
    /// Configuration could not be loaded or failed validation
    Config = 2,
    /// Second interrupt
    Interrupted = EXIT_CODE_INTERRUPTED,
}

impl ExitCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(ExitCode::Clean),
            1 => Some(ExitCode::Fatal),
            2 => Some(ExitCode::Config),
            EXIT_CODE_INTERRUPTED => Some(ExitCode::Interrupted),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Clean)
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::Fatal.as_i32(), 1);
        assert_eq!(ExitCode::Config.as_i32(), 2);
        assert_eq!(ExitCode::Interrupted.as_i32(), 130);
    }

    #[test]
    fn test_exit_code_roundtrip() {
        for code in [ExitCode::Clean, ExitCode::Fatal, ExitCode::Config, ExitCode::Interrupted] {
            assert_eq!(ExitCode::from_i32(code.as_i32()), Some(code));
        }
        assert_eq!(ExitCode::from_i32(42), None);
    }

    #[test]
    fn test_only_clean_is_success() {
        assert!(ExitCode::Clean.is_success());
        assert!(!ExitCode::Fatal.is_success());
        assert!(!ExitCode::Interrupted.is_success());
    }
}
