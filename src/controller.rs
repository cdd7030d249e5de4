use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

use crate::domain::{Config, Message, TMError};
use crate::model::{Model, Modus};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &Config) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TMError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            if model.raw_keyevents() {
                return Ok(Some(Message::RawKey(key)));
            }
            return Ok(Self::handle_key(key, model.modus()));
        }
        Ok(None)
    }

    fn handle_key(key: KeyEvent, modus: Modus) -> Option<Message> {
        let message = match modus {
            Modus::TABLE => Self::table_key(key),
            Modus::COLUMNS => Self::columns_key(key),
            Modus::CONFIRM => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => Some(Message::Confirm),
                KeyCode::Char('n') | KeyCode::Esc => Some(Message::Exit),
                _ => None,
            },
            Modus::POPUP => match key.code {
                KeyCode::Char('q') => Some(Message::Quit),
                KeyCode::Char('?') | KeyCode::Esc | KeyCode::Enter => Some(Message::Exit),
                _ => None,
            },
            Modus::EDIT | Modus::CMDINPUT => Some(Message::RawKey(key)),
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }

    fn table_key(key: KeyEvent) -> Option<Message> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Some(Message::Quit),
                _ => None,
            };
        }
        match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Char('h') | KeyCode::Left => Some(Message::MoveLeft),
            KeyCode::Char('l') | KeyCode::Right => Some(Message::MoveRight),
            KeyCode::Char('n') | KeyCode::PageDown => Some(Message::NextPage),
            KeyCode::Char('p') | KeyCode::PageUp => Some(Message::PrevPage),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::FirstPage),
            KeyCode::Char('G') | KeyCode::End => Some(Message::LastPage),
            KeyCode::Char('+') => Some(Message::LargerPages),
            KeyCode::Char('-') => Some(Message::SmallerPages),
            KeyCode::Char('s') => Some(Message::Sort),
            KeyCode::Char('S') => Some(Message::ClearSort),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('e') | KeyCode::Enter => Some(Message::Edit),
            KeyCode::Char('d') | KeyCode::Delete => Some(Message::Delete),
            KeyCode::Char('c') => Some(Message::ManageColumns),
            KeyCode::Char('i') => Some(Message::Import),
            KeyCode::Char('x') => Some(Message::Export),
            KeyCode::Char('y') => Some(Message::CopyCell),
            KeyCode::Char('Y') => Some(Message::CopyRow),
            KeyCode::Char('t') => Some(Message::ToggleTheme),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        }
    }

    fn columns_key(key: KeyEvent) -> Option<Message> {
        match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Char('K') => Some(Message::MoveColumnUp),
            KeyCode::Char('J') => Some(Message::MoveColumnDown),
            KeyCode::Char(' ') | KeyCode::Enter => Some(Message::ToggleColumn),
            KeyCode::Char('a') => Some(Message::AddColumn),
            KeyCode::Char('r') => Some(Message::ResetColumns),
            KeyCode::Esc | KeyCode::Char('c') => Some(Message::Exit),
            _ => None,
        }
    }
}
