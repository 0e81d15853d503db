//! Host services port: assets, audio and input owned by the host engine.
//!
//! Scripts reach these through `Engine.*` free functions. Rendering and audio
//! playback themselves happen outside the scripting runtime.

use std::path::Path;
use tactica_domain::{AudioPriority, PressedInput, ReleasedInput};

/// Input edge a script can poll for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputQuery {
    Pressed(PressedInput),
    Released(ReleasedInput),
}

impl InputQuery {
    /// Decode the integer a script passed to `Engine.input_has`.
    pub fn from_script_value(value: i64) -> Option<Self> {
        PressedInput::try_from(value)
            .map(Self::Pressed)
            .or_else(|_| ReleasedInput::try_from(value).map(Self::Released))
            .ok()
    }
}

pub trait HostServicesPort: Send + Sync {
    /// Make a texture available to the renderer.
    fn load_texture(&self, path: &Path) -> Result<(), String>;

    /// Decode an audio file so it can be played later.
    fn load_audio(&self, path: &Path) -> Result<(), String>;

    fn play_audio(&self, path: &str, priority: AudioPriority);

    fn input_has(&self, query: InputQuery) -> bool;
}

/// Headless host: assets load if the file exists, audio is silent, no input.
pub struct NullHostServices;

impl HostServicesPort for NullHostServices {
    fn load_texture(&self, path: &Path) -> Result<(), String> {
        exists(path)
    }

    fn load_audio(&self, path: &Path) -> Result<(), String> {
        exists(path)
    }

    fn play_audio(&self, _path: &str, _priority: AudioPriority) {}

    fn input_has(&self, _query: InputQuery) -> bool {
        false
    }
}

fn exists(path: &Path) -> Result<(), String> {
    if path.is_file() {
        Ok(())
    } else {
        Err(format!("{} does not exist", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_query_decoding() {
        assert_eq!(
            InputQuery::from_script_value(4),
            Some(InputQuery::Pressed(PressedInput::Use))
        );
        assert_eq!(
            InputQuery::from_script_value(106),
            Some(InputQuery::Released(ReleasedInput::Shoot))
        );
        assert_eq!(InputQuery::from_script_value(50), None);
    }

    #[test]
    fn test_null_host_reports_missing_assets() {
        let host = NullHostServices;
        assert!(host.load_texture(Path::new("/nonexistent/hero.png")).is_err());
        assert!(!host.input_has(InputQuery::Pressed(PressedInput::Shoot)));
    }
}
