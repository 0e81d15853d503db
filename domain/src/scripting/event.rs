//! Native events routed to script callbacks.

use crate::battle::entity::Entity;
use crate::core::handle::Handle;
use std::fmt;

/// Identity of a script callback slot.
///
/// Native objects store only this id; the script function itself stays with the
/// runtime's callback bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

impl CallbackId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a slot survives its first invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireMode {
    /// Disarmed after the first invocation.
    OneShot,
    Repeatable,
}

impl FireMode {
    pub fn from_once_flag(do_once: bool) -> Self {
        if do_once { Self::OneShot } else { Self::Repeatable }
    }
}

/// Kind of native event that triggers a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    AnimationFrame { frame: u32 },
    AnimationComplete,
    AnimationInterrupt,
    Collision,
    AttackResolved,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnimationFrame { .. } => "animation_frame",
            Self::AnimationComplete => "animation_complete",
            Self::AnimationInterrupt => "animation_interrupt",
            Self::Collision => "collision",
            Self::AttackResolved => "attack_resolved",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnimationFrame { frame } => write!(f, "animation_frame({})", frame),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Argument passed to a callback. Native objects travel as weak handles.
#[derive(Debug, Clone)]
pub enum EventArg {
    Entity(Handle<Entity>),
    Integer(i64),
}

/// One pending callback invocation, in detection order.
#[derive(Debug, Clone)]
pub struct NativeEvent {
    pub kind: EventKind,
    pub callback: CallbackId,
    pub args: Vec<EventArg>,
}

impl NativeEvent {
    pub fn new(kind: EventKind, callback: CallbackId) -> Self {
        Self {
            kind,
            callback,
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: EventArg) -> Self {
        self.args.push(arg);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_display() {
        assert_eq!(
            EventKind::AnimationFrame { frame: 5 }.to_string(),
            "animation_frame(5)"
        );
        assert_eq!(EventKind::Collision.to_string(), "collision");
    }

    #[test]
    fn test_fire_mode_from_flag() {
        assert_eq!(FireMode::from_once_flag(true), FireMode::OneShot);
        assert_eq!(FireMode::from_once_flag(false), FireMode::Repeatable);
    }
}
