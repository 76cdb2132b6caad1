//! Wand Controller
//!
//! Gesture-episode state shared by the button and motion paths. A gesture
//! episode lasts while the button is held; releasing it discards everything
//! the episode collected.

use crate::domain::debounce::{DebounceFilter, DebounceOutcome};
use crate::domain::gestures::GestureClassifier;
use crate::domain::models::{ButtonEvent, Gesture, InputAction, Notification, RawSample};
use crate::domain::orientation::Orientation;
use tracing::{debug, trace};

#[derive(Debug, Default)]
pub struct WandController {
    button_held: bool,
    classifier: GestureClassifier,
    debounce: DebounceFilter,
}

impl WandController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_button_held(&self) -> bool {
        self.button_held
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    pub fn pending_actions(&self) -> &[Gesture] {
        self.debounce.pending()
    }

    /// Process one decoded notification
    pub fn handle(&mut self, notification: Notification) -> Option<InputAction> {
        match notification {
            Notification::Button(event) => self.on_button(event),
            Notification::Motion(sample) => self.on_motion(sample),
        }
    }

    fn on_button(&mut self, event: ButtonEvent) -> Option<InputAction> {
        debug!("User button: [{}]", event.value);
        self.button_held = event.is_pressed();

        if !self.button_held {
            self.end_episode();
        }

        event.triggers_click().then_some(InputAction::Click)
    }

    fn on_motion(&mut self, sample: RawSample) -> Option<InputAction> {
        if !self.button_held {
            return None;
        }

        if tracing::enabled!(tracing::Level::TRACE) {
            let o = Orientation::from_raw(&sample);
            trace!(
                "Position: [{}, {}, {}, {}] pitch {:.1} roll {:.1} yaw {:.1}",
                sample.w,
                sample.x,
                sample.y,
                sample.z,
                o.pitch,
                o.roll,
                o.yaw
            );
        }

        let candidate = self.classifier.classify(sample);
        if candidate.is_noop() {
            return None;
        }
        debug!("Gesture candidate: {}", candidate);

        match self.debounce.push(candidate) {
            DebounceOutcome::Pending => None,
            DebounceOutcome::Confirmed(gesture) => {
                debug!("Gesture confirmed: {}", gesture);
                self.classifier.clear_window();
                Some(InputAction::Gesture(gesture))
            }
            DebounceOutcome::Rejected => {
                debug!("Gesture candidates disagreed, discarding");
                self.classifier.clear_window();
                None
            }
        }
    }

    fn end_episode(&mut self) {
        self.classifier.reset();
        self.debounce.clear();
    }
}
