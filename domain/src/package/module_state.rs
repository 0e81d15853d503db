//! Per-module load state machine: `Unresolved -> Loading -> {Loaded | Failed}`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModuleState {
    #[default]
    Unresolved,
    Loading,
    Loaded,
    /// Terminal failure with the interpreter's (or loader's) reason.
    Failed(String),
}

impl ModuleState {
    /// `Loaded` and `Failed` never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Loaded | Self::Failed(_))
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }

    /// Enter `Loading`. Only valid from `Unresolved`.
    pub fn begin(&mut self) -> bool {
        if *self == Self::Unresolved {
            *self = Self::Loading;
            true
        } else {
            false
        }
    }

    /// Leave `Loading` with the load outcome. Ignored from any other state.
    pub fn finish(&mut self, outcome: Result<(), String>) -> bool {
        if *self != Self::Loading {
            return false;
        }
        *self = match outcome {
            Ok(()) => Self::Loaded,
            Err(reason) => Self::Failed(reason),
        };
        true
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved => write!(f, "unresolved"),
            Self::Loading => write!(f, "loading"),
            Self::Loaded => write!(f, "loaded"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}
