use std::sync::mpsc::Sender;
use std::thread;

use crossterm::event::{self, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::commands::CommandOutcome;

#[derive(Debug)]
pub enum Event {
    Key(KeyAction),
    Resize { width: u16, height: u16 },
    ServerTask { task_id: String },
    Outcome(CommandOutcome),
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    ClearOrQuit,
    Submit,
    Escape,
    NextAgent,
    Help,
    PageUp,
    PageDown,
    MoveUp,
    MoveDown,
    Home,
    End,
    CursorLeft,
    CursorRight,
    Backspace,
    Delete,
    InputChar(char),
    Ignored,
}

pub fn map_key_event(key_event: KeyEvent) -> KeyAction {
    if key_event.kind != KeyEventKind::Press {
        return KeyAction::Ignored;
    }

    if key_event.modifiers.contains(KeyModifiers::CONTROL) {
        return match key_event.code {
            KeyCode::Char('c') => KeyAction::ClearOrQuit,
            KeyCode::Char('u') => KeyAction::PageUp,
            KeyCode::Char('d') => KeyAction::PageDown,
            _ => KeyAction::Ignored,
        };
    }

    match key_event.code {
        KeyCode::Enter => KeyAction::Submit,
        KeyCode::Esc => KeyAction::Escape,
        KeyCode::Tab => KeyAction::NextAgent,
        KeyCode::F(1) => KeyAction::Help,
        KeyCode::PageUp => KeyAction::PageUp,
        KeyCode::PageDown => KeyAction::PageDown,
        KeyCode::Up => KeyAction::MoveUp,
        KeyCode::Down => KeyAction::MoveDown,
        KeyCode::Home => KeyAction::Home,
        KeyCode::End => KeyAction::End,
        KeyCode::Left => KeyAction::CursorLeft,
        KeyCode::Right => KeyAction::CursorRight,
        KeyCode::Backspace => KeyAction::Backspace,
        KeyCode::Delete => KeyAction::Delete,
        KeyCode::Char(c) => KeyAction::InputChar(c),
        _ => KeyAction::Ignored,
    }
}

pub fn spawn_terminal_reader(event_tx: Sender<Event>) {
    thread::spawn(move || {
        loop {
            let event = match event::read() {
                Ok(event::Event::Key(key_event)) => match map_key_event(key_event) {
                    KeyAction::Ignored => continue,
                    action => Event::Key(action),
                },
                Ok(event::Event::Resize(width, height)) => Event::Resize { width, height },
                Ok(_) => continue,
                Err(err) => {
                    tracing::error!(%err, "terminal input stream failed");
                    return;
                }
            };
            if event_tx.send(event).is_err() {
                return;
            }
        }
    });
}
