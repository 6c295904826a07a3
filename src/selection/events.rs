use thiserror::Error;
use tokio::sync::mpsc;

use crate::geometry::RawPoint;

/// Key that toggles region mode while held.
pub const MODIFIER_KEY: &str = "Shift";
pub const ESCAPE_KEY: &str = "Escape";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    ModifierDown,
    ModifierUp,
    PointerMove(RawPoint),
    Click(RawPoint),
    Escape,
    /// The close button of the result panel, or the host tearing the view down.
    CloseRequested,
}

impl InputEvent {
    /// Translate a keyboard event by its DOM-style key name. Keys the
    /// selection overlay does not care about map to `None`.
    pub fn from_key(key: &str, pressed: bool) -> Option<Self> {
        match (key, pressed) {
            (MODIFIER_KEY, true) => Some(InputEvent::ModifierDown),
            (MODIFIER_KEY, false) => Some(InputEvent::ModifierUp),
            (ESCAPE_KEY, true) => Some(InputEvent::Escape),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("input subscription released; the session is closed")]
pub struct InputReleased;

/// Producer side of a session's input subscription.
///
/// Held by whatever delivers keyboard and pointer events. Once the session
/// tears down and drops its [`InputStream`], every further `send` fails, so a
/// stale listener can never feed events into a closed session.
#[derive(Debug, Clone)]
pub struct InputSubscription {
    sender: mpsc::UnboundedSender<InputEvent>,
}

impl InputSubscription {
    pub fn send(&self, event: InputEvent) -> Result<(), InputReleased> {
        self.sender.send(event).map_err(|_| InputReleased)
    }

    pub fn is_released(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Consumer side of an input subscription, owned by the session.
#[derive(Debug)]
pub struct InputStream {
    receiver: mpsc::UnboundedReceiver<InputEvent>,
}

impl InputStream {
    pub async fn next(&mut self) -> Option<InputEvent> {
        self.receiver.recv().await
    }

    /// Stop accepting events. Events already queued are dropped with the
    /// stream.
    pub fn release(mut self) {
        self.receiver.close();
    }
}

pub fn input_channel() -> (InputSubscription, InputStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (InputSubscription { sender }, InputStream { receiver })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_events() {
        assert_eq!(InputEvent::from_key("Shift", true), Some(InputEvent::ModifierDown));
        assert_eq!(InputEvent::from_key("Shift", false), Some(InputEvent::ModifierUp));
        assert_eq!(InputEvent::from_key("Escape", true), Some(InputEvent::Escape));
        assert_eq!(InputEvent::from_key("Escape", false), None);
        assert_eq!(InputEvent::from_key("a", true), None);
    }

    #[tokio::test]
    async fn released_stream_refuses_events() {
        let (subscription, mut stream) = input_channel();
        subscription.send(InputEvent::ModifierDown).unwrap();
        assert_eq!(stream.next().await, Some(InputEvent::ModifierDown));

        stream.release();
        assert!(subscription.is_released());
        assert_eq!(subscription.send(InputEvent::Escape), Err(InputReleased));
    }

    #[tokio::test]
    async fn stream_ends_when_all_subscriptions_drop() {
        let (subscription, mut stream) = input_channel();
        drop(subscription);
        assert_eq!(stream.next().await, None);
    }
}
