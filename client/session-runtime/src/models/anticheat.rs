use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    TabHidden,
    WindowBlur,
    ContextMenu,
    CopyAttempt,
    PasteAttempt,
    DevtoolsAttempt,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::TabHidden => "tab_hidden",
            ViolationKind::WindowBlur => "window_blur",
            ViolationKind::ContextMenu => "context_menu",
            ViolationKind::CopyAttempt => "copy_attempt",
            ViolationKind::PasteAttempt => "paste_attempt",
            ViolationKind::DevtoolsAttempt => "devtools_attempt",
        }
    }

    /// Whether the browser's default action for the originating signal must
    /// be cancelled.
    pub fn suppresses_default(&self) -> bool {
        matches!(
            self,
            ViolationKind::ContextMenu
                | ViolationKind::CopyAttempt
                | ViolationKind::PasteAttempt
                | ViolationKind::DevtoolsAttempt
        )
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire body of the cheat-event report: `{"type": "...", "time": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationEvent {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub time: DateTime<Utc>,
}

impl ViolationEvent {
    pub fn new(kind: ViolationKind, time: DateTime<Utc>) -> Self {
        Self { kind, time }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
}

impl KeyPress {
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: false,
            shift: false,
        }
    }

    pub fn ctrl_shift(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            shift: true,
        }
    }

    /// F12, or Ctrl+Shift+I in either case.
    pub fn opens_devtools(&self) -> bool {
        self.key == "F12" || (self.ctrl && self.shift && self.key.eq_ignore_ascii_case("i"))
    }
}

/// Raw browser-level signal as delivered by the hosting surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserSignal {
    VisibilityChange { hidden: bool },
    WindowBlur,
    ContextMenu,
    Copy,
    Paste,
    KeyDown(KeyPress),
}

/// What the signal source must do with the browser's default action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    Allow,
    Prevent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Armed,
    Tripped,
}
