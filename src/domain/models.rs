use std::fmt;

/// One quaternion frame as sent by the wand, before any scaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    pub w: u16,
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

impl RawSample {
    pub fn new(w: u16, x: u16, y: u16, z: u16) -> Self {
        Self { w, x, y, z }
    }
}

/// User button report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub value: u8,
}

impl ButtonEvent {
    /// Held only for an exact 1
    pub fn is_pressed(&self) -> bool {
        self.value == 1
    }

    /// Any non-zero report clicks
    pub fn triggers_click(&self) -> bool {
        self.value > 0
    }
}

/// Decoded notification payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Button(ButtonEvent),
    /// Quaternion orientation frame
    Motion(RawSample),
}

/// Classifier output token.
///
/// The horizontal family is capitalised in its token form, the vertical
/// family is not. Consumers match on the exact string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Gesture {
    #[default]
    Noop,
    Up,
    Down,
    Left,
    Right,
}

impl Gesture {
    pub fn as_token(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "Left",
            Self::Right => "Right",
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Work for the OS input collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Click,
    Gesture(Gesture),
}

/// Lifecycle of the single wand connection. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    Idle,
    Scanning,
    Connected,
    ProfileDiscovered,
    Subscribed,
    ShuttingDown,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Connected => "connected",
            Self::ProfileDiscovered => "profile-discovered",
            Self::Subscribed => "subscribed",
            Self::ShuttingDown => "shutting-down",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}
