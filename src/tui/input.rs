//! Key handling for the split-pane presenter.
//!
//! Maps raw key presses to pane actions while a stage runs, and provides the
//! line editor used by the status-bar prompt.

use crossterm::event::{KeyCode, KeyModifiers};

use crate::presenter::KeyCommand;

/// Key event representation
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyEvent {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub fn plain(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    pub fn is_ctrl_c(&self) -> bool {
        self.code == KeyCode::Char('c') && self.modifiers.contains(KeyModifiers::CONTROL)
    }
}

/// What a key means while a stage is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneKey {
    /// Forwarded to the engine
    Command(KeyCommand),
    ToggleAgentPane,
    ScrollUp,
    ScrollDown,
}

/// Map a key press to a running-mode action.
pub fn running_key(key: &KeyEvent) -> Option<PaneKey> {
    if key.is_ctrl_c() {
        return Some(PaneKey::Command(KeyCommand::Interrupt));
    }
    match key.code {
        KeyCode::Char('p') => Some(PaneKey::Command(KeyCommand::Pause)),
        KeyCode::Char('i') => Some(PaneKey::Command(KeyCommand::Interrupt)),
        KeyCode::Char('k') => Some(PaneKey::Command(KeyCommand::Kill)),
        KeyCode::Char('v') => Some(PaneKey::ToggleAgentPane),
        KeyCode::PageUp => Some(PaneKey::ScrollUp),
        KeyCode::PageDown => Some(PaneKey::ScrollDown),
        _ => None,
    }
}

/// Single-line text buffer with a cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    content: String,
    cursor: usize,
}

impl TextInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert(&mut self, c: char) {
        self.content.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn backspace(&mut self) {
        if let Some((idx, _)) = self.content[..self.cursor].char_indices().next_back() {
            self.content.remove(idx);
            self.cursor = idx;
        }
    }

    pub fn move_left(&mut self) {
        if let Some((idx, _)) = self.content[..self.cursor].char_indices().next_back() {
            self.cursor = idx;
        }
    }

    pub fn move_right(&mut self) {
        if let Some(c) = self.content[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    /// Take the content and clear
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.content)
    }

    /// Apply an editing key; returns false when the key is not an edit.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => self.insert(c),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.content.len(),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_keys() {
        assert_eq!(
            running_key(&KeyEvent::plain('p')),
            Some(PaneKey::Command(KeyCommand::Pause))
        );
        assert_eq!(
            running_key(&KeyEvent::plain('i')),
            Some(PaneKey::Command(KeyCommand::Interrupt))
        );
        assert_eq!(
            running_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(PaneKey::Command(KeyCommand::Interrupt))
        );
        assert_eq!(running_key(&KeyEvent::plain('k')), Some(PaneKey::Command(KeyCommand::Kill)));
        assert_eq!(running_key(&KeyEvent::plain('v')), Some(PaneKey::ToggleAgentPane));
        assert_eq!(
            running_key(&KeyEvent::new(KeyCode::PageUp, KeyModifiers::NONE)),
            Some(PaneKey::ScrollUp)
        );
        assert_eq!(running_key(&KeyEvent::plain('z')), None);
    }

    #[test]
    fn test_text_input_editing() {
        let mut input = TextInput::new();
        for c in "héllo".chars() {
            input.insert(c);
        }
        input.move_left();
        input.backspace();
        assert_eq!(input.content(), "hélo");
        input.handle_key(&KeyEvent::new(KeyCode::Home, KeyModifiers::NONE));
        assert_eq!(input.cursor(), 0);
        input.move_right();
        assert_eq!(input.cursor(), 1);
        assert_eq!(input.take(), "hélo");
        assert_eq!(input.content(), "");
    }

    #[test]
    fn test_ctrl_chars_are_not_inserted() {
        let mut input = TextInput::new();
        assert!(!input.handle_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!input.handle_key(&KeyEvent::new(KeyCode::F(1), KeyModifiers::NONE)));
        assert_eq!(input.content(), "");
    }
}
