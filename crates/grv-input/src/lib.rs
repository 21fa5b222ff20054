//! Async input service: reads raw terminal events via crossterm's
//! `EventStream` and forwards decoded `InputEvent`s over the input channel.
//!
//! Out of scope per the spec (the terminal driver is a named collaborator);
//! this is the thin, concrete implementation GRV needs to actually run.

use crossterm::event::{
    Event as CEvent, EventStream, KeyCode as CKeyCode, KeyEventKind as CKeyKind,
    KeyModifiers as CMods,
};
use grv_events::{InputEvent, KeyToken, ModMask, NamedKey};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc::Sender};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, trace};

/// Handle used to request the async input task stop immediately.
#[derive(Clone, Debug)]
pub struct AsyncInputShutdown {
    notify: Arc<Notify>,
}

impl AsyncInputShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

/// Spawn the async input service. Returns the task handle plus a shutdown
/// handle the caller signals during cooperative teardown.
pub fn spawn_async_input(sender: Sender<InputEvent>) -> (JoinHandle<()>, AsyncInputShutdown) {
    let notify = Arc::new(Notify::new());
    let shutdown = AsyncInputShutdown {
        notify: notify.clone(),
    };
    let handle = tokio::task::spawn(async move {
        let span = tracing::debug_span!(target: "input.thread", "input_async_task");
        let _enter = span.enter();
        info!(target: "input.thread", "async_input_task_started");

        let mut stream = EventStream::new();
        loop {
            let maybe = tokio::select! {
                biased;
                _ = notify.notified() => {
                    debug!(target: "input.thread", "shutdown_signal");
                    break;
                }
                next = stream.next() => next,
            };
            let Some(result) = maybe else {
                debug!(target: "input.thread", "stream_ended");
                break;
            };
            match result {
                Ok(CEvent::Key(key)) => {
                    if key.kind == CKeyKind::Release {
                        continue;
                    }
                    if key.code == CKeyCode::Char('c') && key.modifiers.contains(CMods::CONTROL) {
                        if sender.send(InputEvent::CtrlC).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    if let Some(token) = map_key(key.code, key.modifiers) {
                        if sender.send(InputEvent::Key(token)).await.is_err() {
                            break;
                        }
                    }
                }
                Ok(CEvent::Resize(w, h)) => {
                    trace!(target: "input.event", w, h, "resize");
                    if sender.send(InputEvent::Resize(w, h)).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(target: "input.thread", ?err, "stream_error");
                    break;
                }
            }
        }
    });

    (handle, shutdown)
}

fn map_mods(m: CMods) -> ModMask {
    let mut out = ModMask::empty();
    if m.contains(CMods::CONTROL) {
        out |= ModMask::CTRL;
    }
    if m.contains(CMods::ALT) {
        out |= ModMask::ALT;
    }
    if m.contains(CMods::SHIFT) {
        out |= ModMask::SHIFT;
    }
    out
}

fn map_key(code: CKeyCode, mods: CMods) -> Option<KeyToken> {
    match code {
        CKeyCode::Char(c) => {
            let m = map_mods(mods);
            if m.contains(ModMask::CTRL) {
                Some(KeyToken::Chord { base: c, mods: m })
            } else {
                Some(KeyToken::Char(c))
            }
        }
        CKeyCode::Up => Some(KeyToken::Named(NamedKey::Up)),
        CKeyCode::Down => Some(KeyToken::Named(NamedKey::Down)),
        CKeyCode::Left => Some(KeyToken::Named(NamedKey::Left)),
        CKeyCode::Right => Some(KeyToken::Named(NamedKey::Right)),
        CKeyCode::Tab => Some(KeyToken::Named(NamedKey::Tab)),
        CKeyCode::Enter => Some(KeyToken::Named(NamedKey::Return)),
        CKeyCode::Esc => Some(KeyToken::Named(NamedKey::Esc)),
        CKeyCode::Backspace => Some(KeyToken::Named(NamedKey::Backspace)),
        CKeyCode::Delete => Some(KeyToken::Named(NamedKey::Delete)),
        CKeyCode::Home => Some(KeyToken::Named(NamedKey::Home)),
        CKeyCode::End => Some(KeyToken::Named(NamedKey::End)),
        CKeyCode::PageUp => Some(KeyToken::Named(NamedKey::PageUp)),
        CKeyCode::PageDown => Some(KeyToken::Named(NamedKey::PageDown)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_char_becomes_chord() {
        let tok = map_key(CKeyCode::Char('w'), CMods::CONTROL).unwrap();
        assert_eq!(
            tok,
            KeyToken::Chord {
                base: 'w',
                mods: ModMask::CTRL
            }
        );
    }

    #[test]
    fn plain_char_stays_char() {
        let tok = map_key(CKeyCode::Char('g'), CMods::NONE).unwrap();
        assert_eq!(tok, KeyToken::Char('g'));
    }

    #[test]
    fn named_keys_map() {
        assert_eq!(
            map_key(CKeyCode::Up, CMods::NONE),
            Some(KeyToken::Named(NamedKey::Up))
        );
    }
}
