//! Frame stepping for script-driven animations.
//!
//! Only the parts scripts can observe are modelled: the current state name, the
//! frame counter, playback mode and the callbacks attached to frames. Each step
//! produces the [`NativeEvent`]s the callback bridge should fire, in order.

use super::enums::Playback;
use crate::core::handle::NativeType;
use crate::scripting::event::{CallbackId, EventKind, NativeEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameTrigger {
    frame: u32,
    callback: CallbackId,
}

/// Result of switching to a new state.
#[derive(Debug, Default)]
pub struct StateChange {
    /// Interrupt event for the state that was still running.
    pub interrupted: Option<NativeEvent>,
    /// Callbacks that were attached to the previous state and are now unreachable.
    pub dropped: Vec<CallbackId>,
}

#[derive(Debug, Clone)]
pub struct Animation {
    path: String,
    state: Option<String>,
    frame_count: u32,
    /// 1-based frame currently shown; 0 before the first step.
    frame: u32,
    playback: Playback,
    finished: bool,
    triggers: Vec<FrameTrigger>,
    on_complete: Option<CallbackId>,
    on_interrupt: Option<CallbackId>,
}

impl Animation {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: None,
            frame_count: 0,
            frame: 0,
            playback: Playback::Once,
            finished: false,
            triggers: Vec::new(),
            on_complete: None,
            on_interrupt: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn playback(&self) -> Playback {
        self.playback
    }

    pub fn set_playback(&mut self, playback: Playback) {
        self.playback = playback;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn is_running(&self) -> bool {
        self.state.is_some() && !self.finished
    }

    /// Switch to `name`, discarding every callback attached to the previous state.
    pub fn set_state(&mut self, name: impl Into<String>, frame_count: u32) -> StateChange {
        let interrupted = if self.is_running() && self.frame > 0 {
            self.on_interrupt
                .map(|cb| NativeEvent::new(EventKind::AnimationInterrupt, cb))
        } else {
            None
        };

        let dropped = self.take_callbacks();
        self.state = Some(name.into());
        self.frame_count = frame_count;
        self.frame = 0;
        self.finished = false;

        StateChange {
            interrupted,
            dropped,
        }
    }

    /// Attach a callback to `frame` of the current state.
    pub fn on_frame(&mut self, frame: u32, callback: CallbackId) {
        self.triggers.push(FrameTrigger { frame, callback });
    }

    /// Returns the callback that was replaced, if any.
    pub fn on_complete(&mut self, callback: CallbackId) -> Option<CallbackId> {
        self.on_complete.replace(callback)
    }

    /// Returns the callback that was replaced, if any.
    pub fn on_interrupt(&mut self, callback: CallbackId) -> Option<CallbackId> {
        self.on_interrupt.replace(callback)
    }

    /// Advance by `frames` steps and collect the events that fired.
    ///
    /// `Once` stops on the last frame. `Loop` wraps back to frame 1, revisiting
    /// every frame trigger on each pass.
    pub fn advance(&mut self, frames: u32) -> Vec<NativeEvent> {
        let mut events = Vec::new();
        if self.state.is_none() || self.frame_count == 0 {
            return events;
        }

        for _ in 0..frames {
            if self.finished {
                break;
            }
            if self.frame >= self.frame_count {
                self.frame = 0;
            }
            self.frame += 1;

            let frame = self.frame;
            events.extend(
                self.triggers
                    .iter()
                    .filter(|t| t.frame == frame)
                    .map(|t| NativeEvent::new(EventKind::AnimationFrame { frame }, t.callback)),
            );

            if self.frame == self.frame_count {
                if let Some(cb) = self.on_complete {
                    events.push(NativeEvent::new(EventKind::AnimationComplete, cb));
                }
                if self.playback == Playback::Once {
                    self.finished = true;
                }
            }
        }
        events
    }

    /// Stop the running state, firing the interrupt callback if one is attached.
    pub fn interrupt(&mut self) -> Option<NativeEvent> {
        if !self.is_running() {
            return None;
        }
        self.finished = true;
        self.on_interrupt
            .map(|cb| NativeEvent::new(EventKind::AnimationInterrupt, cb))
    }

    /// Every callback id referenced by this animation.
    pub fn callbacks(&self) -> Vec<CallbackId> {
        self.triggers
            .iter()
            .map(|t| t.callback)
            .chain(self.on_complete)
            .chain(self.on_interrupt)
            .collect()
    }

    fn take_callbacks(&mut self) -> Vec<CallbackId> {
        let dropped = self.callbacks();
        self.triggers.clear();
        self.on_complete = None;
        self.on_interrupt = None;
        dropped
    }
}

impl NativeType for Animation {
    const TYPE_NAME: &'static str = "Animation";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cb(raw: u64) -> CallbackId {
        CallbackId::new(raw)
    }

    #[test]
    fn test_once_playback_stops_on_last_frame() {
        let mut anim = Animation::new("hero.animation");
        anim.set_state("IDLE", 3);
        anim.on_complete(cb(1));

        let events = anim.advance(10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::AnimationComplete);
        assert_eq!(anim.frame(), 3);
        assert!(anim.is_finished());
        assert!(anim.advance(1).is_empty());
    }

    #[test]
    fn test_loop_revisits_frame_triggers() {
        let mut anim = Animation::new("hero.animation");
        anim.set_state("ATTACK", 6);
        anim.set_playback(Playback::Loop);
        anim.on_frame(5, cb(7));

        let events = anim.advance(12);
        let hits: Vec<_> = events
            .iter()
            .filter(|e| e.kind == EventKind::AnimationFrame { frame: 5 })
            .collect();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|e| e.callback == cb(7)));
        assert!(!anim.is_finished());
    }

    #[test]
    fn test_set_state_interrupts_and_drops_callbacks() {
        let mut anim = Animation::new("hero.animation");
        anim.set_state("MOVE", 4);
        anim.on_frame(2, cb(1));
        anim.on_interrupt(cb(2));
        anim.advance(1);

        let change = anim.set_state("IDLE", 1);
        assert_eq!(
            change.interrupted.map(|e| (e.kind, e.callback)),
            Some((EventKind::AnimationInterrupt, cb(2)))
        );
        assert_eq!(change.dropped, vec![cb(1), cb(2)]);
        assert!(anim.callbacks().is_empty());
        assert_eq!(anim.state(), Some("IDLE"));
    }

    #[test]
    fn test_interrupt_only_fires_while_running() {
        let mut anim = Animation::new("hero.animation");
        assert!(anim.interrupt().is_none());

        anim.set_state("MOVE", 2);
        anim.on_interrupt(cb(3));
        assert!(anim.interrupt().is_some());
        assert!(anim.interrupt().is_none());
    }

    #[test]
    fn test_no_state_no_events() {
        let mut anim = Animation::new("hero.animation");
        anim.on_frame(1, cb(1));
        assert!(anim.advance(5).is_empty());
        assert_eq!(anim.frame(), 0);
    }
}
