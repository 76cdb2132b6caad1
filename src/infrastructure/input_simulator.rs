//! OS input synthesis for wand actions

use crate::domain::models::Gesture;
use tracing::{debug, info};

/// Receiver of confirmed wand actions
pub trait InputSink {
    fn click(&mut self) -> anyhow::Result<()>;

    fn gesture(&mut self, gesture: Gesture) -> anyhow::Result<()>;
}

/// Sink for platforms without an input backend: logs and does nothing else
#[derive(Debug, Default)]
pub struct LogInputSink;

impl InputSink for LogInputSink {
    fn click(&mut self) -> anyhow::Result<()> {
        info!("mouse-click");
        Ok(())
    }

    fn gesture(&mut self, gesture: Gesture) -> anyhow::Result<()> {
        info!("gesture: {}", gesture);
        Ok(())
    }
}

#[cfg(windows)]
pub use self::windows_input::InputSimulator;

/// Input backend for the current platform
#[cfg(windows)]
pub type PlatformInput = InputSimulator;
#[cfg(not(windows))]
pub type PlatformInput = LogInputSink;

#[cfg(windows)]
mod windows_input {
    use super::InputSink;
    use crate::domain::models::Gesture;
    use tracing::{debug, trace};
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYEVENTF_KEYUP,
        MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSE_EVENT_FLAGS, MOUSEINPUT, VIRTUAL_KEY,
        VK_DOWN, VK_LEFT, VK_RIGHT, VK_UP,
    };

    /// `SendInput` backed simulator
    #[derive(Debug, Default)]
    pub struct InputSimulator;

    impl InputSimulator {
        pub fn new() -> Self {
            Self
        }

        fn send(&self, inputs: &[INPUT]) -> anyhow::Result<()> {
            let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
            if sent as usize != inputs.len() {
                anyhow::bail!("SendInput injected {} of {} events", sent, inputs.len());
            }
            Ok(())
        }

        fn mouse_button(flags: MOUSE_EVENT_FLAGS) -> INPUT {
            INPUT {
                r#type: INPUT_MOUSE,
                Anonymous: INPUT_0 {
                    mi: MOUSEINPUT {
                        dx: 0,
                        dy: 0,
                        mouseData: 0,
                        dwFlags: flags,
                        time: 0,
                        dwExtraInfo: 0,
                    },
                },
            }
        }

        fn key(key: VIRTUAL_KEY, up: bool) -> INPUT {
            INPUT {
                r#type: INPUT_KEYBOARD,
                Anonymous: INPUT_0 {
                    ki: KEYBDINPUT {
                        wVk: key,
                        wScan: 0,
                        dwFlags: if up { KEYEVENTF_KEYUP } else { Default::default() },
                        time: 0,
                        dwExtraInfo: 0,
                    },
                },
            }
        }

        /// Simulate left mouse click
        pub fn mouse_left_click(&self) -> anyhow::Result<()> {
            debug!("Mouse Left Click");
            self.send(&[
                Self::mouse_button(MOUSEEVENTF_LEFTDOWN),
                Self::mouse_button(MOUSEEVENTF_LEFTUP),
            ])
        }

        /// Simulate key press and release
        pub fn key_press(&self, key: VIRTUAL_KEY) -> anyhow::Result<()> {
            trace!("Key Press: {:?}", key);
            self.send(&[Self::key(key, false), Self::key(key, true)])
        }
    }

    impl InputSink for InputSimulator {
        fn click(&mut self) -> anyhow::Result<()> {
            self.mouse_left_click()
        }

        fn gesture(&mut self, gesture: Gesture) -> anyhow::Result<()> {
            let key = match gesture {
                Gesture::Up => VK_UP,
                Gesture::Down => VK_DOWN,
                Gesture::Left => VK_LEFT,
                Gesture::Right => VK_RIGHT,
                Gesture::Noop => return Ok(()),
            };
            debug!("Gesture {} -> {:?}", gesture, key);
            self.key_press(key)
        }
    }
}

/// Build the platform sink
pub fn platform_input() -> PlatformInput {
    debug!("Using {} input backend", std::any::type_name::<PlatformInput>());
    PlatformInput::default()
}
