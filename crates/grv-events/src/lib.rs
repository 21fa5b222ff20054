//! Shared event, action and channel types wiring the input, dispatch and
//! display tasks together.
//!
//! The channel set and capacities mirror the concurrency model: a bounded
//! `input_ch` for key-press events, a bounded `error_ch` for background
//! failures, an unbounded `action_ch` for actions injected by non-input
//! code (e.g. the config evaluator emitting `Action::Exit`), and a
//! capacity-1 `display_ch` used as a coalescing "redraw pending" token.

use bitflags::bitflags;
use tokio::sync::mpsc;

/// Bounded capacity for `input_ch` and `error_ch`.
pub const CHANNEL_CAP: usize = 100;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModMask: u8 {
        const CTRL  = 0b001;
        const ALT   = 0b010;
        const SHIFT = 0b100;
    }
}

/// A symbolic key not represented by a single printable character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Up,
    Down,
    Left,
    Right,
    Tab,
    Return,
    Esc,
    Backspace,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
}

impl NamedKey {
    /// The `<Name>` spelling used inside key strings (spec.md §4.5).
    pub fn as_str(self) -> &'static str {
        match self {
            NamedKey::Up => "Up",
            NamedKey::Down => "Down",
            NamedKey::Left => "Left",
            NamedKey::Right => "Right",
            NamedKey::Tab => "Tab",
            NamedKey::Return => "Return",
            NamedKey::Esc => "Esc",
            NamedKey::Backspace => "Backspace",
            NamedKey::Delete => "Delete",
            NamedKey::Home => "Home",
            NamedKey::End => "End",
            NamedKey::PageUp => "PageUp",
            NamedKey::PageDown => "PageDown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "Up" => NamedKey::Up,
            "Down" => NamedKey::Down,
            "Left" => NamedKey::Left,
            "Right" => NamedKey::Right,
            "Tab" => NamedKey::Tab,
            "Return" | "Enter" | "CR" => NamedKey::Return,
            "Esc" => NamedKey::Esc,
            "Backspace" | "BS" => NamedKey::Backspace,
            "Delete" | "Del" => NamedKey::Delete,
            "Home" => NamedKey::Home,
            "End" => NamedKey::End,
            "PageUp" | "PgUp" => NamedKey::PageUp,
            "PageDown" | "PgDn" => NamedKey::PageDown,
            _ => return None,
        })
    }
}

/// A single atomic unit of key input, as produced by the input task and
/// consumed by the keymap trie. `Char` carries plain characters (including
/// `<C-w>`-style control chords represented as `Chord`); `Named` carries
/// non-printable keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyToken {
    Char(char),
    Named(NamedKey),
    Chord { base: char, mods: ModMask },
}

impl KeyToken {
    /// Render in the `<...>` key-string notation used by grvrc `map` and the
    /// help bar (e.g. `<C-w>`, `<Up>`, plain `g`).
    pub fn to_key_string(self) -> String {
        match self {
            KeyToken::Char(c) => c.to_string(),
            KeyToken::Named(n) => format!("<{}>", n.as_str()),
            KeyToken::Chord { base, mods } => {
                let mut prefix = String::new();
                if mods.contains(ModMask::CTRL) {
                    prefix.push_str("C-");
                }
                if mods.contains(ModMask::ALT) {
                    prefix.push_str("A-");
                }
                if mods.contains(ModMask::SHIFT) {
                    prefix.push_str("S-");
                }
                format!("<{prefix}{base}>")
            }
        }
    }
}

/// Events produced by the terminal input task.
#[derive(Debug, Clone)]
pub enum InputEvent {
    Key(KeyToken),
    Resize(u16, u16),
    CtrlC,
}

/// The four long-lived task kinds communicate via `Event`.
#[derive(Debug, Clone)]
pub enum Event {
    Input(InputEvent),
    Action(Action),
    Tick,
    Shutdown,
}

/// Dispatched command kind (spec.md §4.5), optionally carrying positional
/// arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    None,
    Exit,
    Prompt,
    SearchPrompt,
    ReverseSearchPrompt,
    FilterPrompt,
    Search { pattern: String },
    NextLine,
    PrevLine,
    NextPage,
    PrevPage,
    ScrollLeft,
    ScrollRight,
    MovePageRight { cols: usize },
    MovePageLeft { cols: usize },
    FirstLine,
    LastLine,
    Select,
    NextView,
    PrevView,
    FullScreenView,
    ToggleViewLayout,
    AddFilter { query: String },
    RemoveFilter,
    ShowStatus { message: String },
    UpdateDisplay,
    OnRefSelect { name: String, oid: String },
    OnCommitSelect { oid: String },
    Confirm { text: String },
    Cancel,
}

/// Which subsystem an `ErrorMessage` originated from, matching the four
/// error kinds in spec.md §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    Config,
    Adapter,
    State,
    Ui,
}

#[derive(Debug, Clone)]
pub struct ErrorMessage {
    pub source: ErrorSource,
    pub message: String,
}

impl ErrorMessage {
    pub fn new(source: ErrorSource, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
        }
    }
}

pub type InputSender = mpsc::Sender<InputEvent>;
pub type InputReceiver = mpsc::Receiver<InputEvent>;
pub type ActionSender = mpsc::UnboundedSender<Action>;
pub type ActionReceiver = mpsc::UnboundedReceiver<Action>;
pub type ErrorSender = mpsc::Sender<ErrorMessage>;
pub type ErrorReceiver = mpsc::Receiver<ErrorMessage>;
pub type DisplaySender = mpsc::Sender<()>;
pub type DisplayReceiver = mpsc::Receiver<()>;

/// Construct the full channel set described in spec.md §5.
pub fn channels() -> (
    (InputSender, InputReceiver),
    (ActionSender, ActionReceiver),
    (ErrorSender, ErrorReceiver),
    (DisplaySender, DisplayReceiver),
) {
    let input = mpsc::channel(CHANNEL_CAP);
    let action = mpsc::unbounded_channel();
    let error = mpsc::channel(CHANNEL_CAP);
    let display = mpsc::channel(1);
    (input, action, error, display)
}

/// Send a redraw request without blocking, dropping it if one is already
/// pending. This realises the "at most one pending repaint" coalescing
/// channel from spec.md §9.
pub fn request_redraw(tx: &DisplaySender) {
    match tx.try_send(()) {
        Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
        Err(mpsc::error::TrySendError::Closed(())) => {
            tracing::debug!(target: "events", "display channel closed, dropping redraw request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_token_round_trips_to_key_string() {
        assert_eq!(KeyToken::Char('g').to_key_string(), "g");
        assert_eq!(KeyToken::Named(NamedKey::Up).to_key_string(), "<Up>");
        assert_eq!(
            KeyToken::Chord {
                base: 'w',
                mods: ModMask::CTRL
            }
            .to_key_string(),
            "<C-w>"
        );
    }

    #[test]
    fn named_key_from_str_accepts_aliases() {
        assert_eq!(NamedKey::from_str("Enter"), Some(NamedKey::Return));
        assert_eq!(NamedKey::from_str("PgDn"), Some(NamedKey::PageDown));
        assert_eq!(NamedKey::from_str("Bogus"), None);
    }

    #[tokio::test]
    async fn redraw_channel_coalesces_bursts() {
        let (tx, mut rx) = mpsc::channel::<()>(1);
        request_redraw(&tx);
        request_redraw(&tx);
        request_redraw(&tx);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
