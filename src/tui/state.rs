use crate::model::Mode;
use crate::session::SessionState;

/// Which input receives keystrokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Mode,
    ArtifactId,
    RawInput,
}

impl Focus {
    pub fn next(self) -> Focus {
        match self {
            Focus::Mode => Focus::ArtifactId,
            Focus::ArtifactId => Focus::RawInput,
            Focus::RawInput => Focus::Mode,
        }
    }

    pub fn prev(self) -> Focus {
        match self {
            Focus::Mode => Focus::RawInput,
            Focus::ArtifactId => Focus::Mode,
            Focus::RawInput => Focus::ArtifactId,
        }
    }
}

pub struct UiState {
    pub tab: usize,
    pub session: SessionState,
    pub focus: Focus,
    // Cursor positions are char indices into the session's text fields.
    pub raw_cursor: usize,
    pub id_cursor: usize,
    pub artifact_scroll: u16,
    pub info: String,
    pub base_url: String,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            session: SessionState::default(),
            focus: Focus::RawInput,
            raw_cursor: 0,
            id_cursor: 0,
            artifact_scroll: 0,
            info: String::new(),
            base_url: String::new(),
        }
    }
}

impl UiState {
    pub fn new(mode: Mode, base_url: String) -> Self {
        Self {
            session: SessionState::new(mode),
            base_url,
            ..Default::default()
        }
    }

    /// Text buffer and cursor of the focused input, if it is a text input.
    fn focused_text(&mut self) -> Option<(&mut String, &mut usize)> {
        match self.focus {
            Focus::ArtifactId => Some((&mut self.session.artifact_id, &mut self.id_cursor)),
            Focus::RawInput => Some((&mut self.session.raw_input, &mut self.raw_cursor)),
            Focus::Mode => None,
        }
    }

    pub fn insert_char(&mut self, c: char) {
        if let Some((buf, cursor)) = self.focused_text() {
            let at = byte_index(buf, *cursor);
            buf.insert(at, c);
            *cursor += 1;
        }
    }

    pub fn backspace(&mut self) {
        if let Some((buf, cursor)) = self.focused_text() {
            if *cursor == 0 {
                return;
            }
            *cursor -= 1;
            let at = byte_index(buf, *cursor);
            buf.remove(at);
        }
    }

    pub fn delete(&mut self) {
        if let Some((buf, cursor)) = self.focused_text() {
            if *cursor < buf.chars().count() {
                let at = byte_index(buf, *cursor);
                buf.remove(at);
            }
        }
    }

    pub fn cursor_left(&mut self) {
        if let Some((_, cursor)) = self.focused_text() {
            *cursor = cursor.saturating_sub(1);
        }
    }

    pub fn cursor_right(&mut self) {
        if let Some((buf, cursor)) = self.focused_text() {
            *cursor = (*cursor + 1).min(buf.chars().count());
        }
    }

    pub fn cursor_home(&mut self) {
        if let Some((_, cursor)) = self.focused_text() {
            *cursor = 0;
        }
    }

    pub fn cursor_end(&mut self) {
        if let Some((buf, cursor)) = self.focused_text() {
            *cursor = buf.chars().count();
        }
    }

    /// Keep cursors inside their buffers after the session replaced a field.
    pub fn clamp_cursors(&mut self) {
        self.raw_cursor = self.raw_cursor.min(self.session.raw_input.chars().count());
        self.id_cursor = self.id_cursor.min(self.session.artifact_id.chars().count());
    }

    pub fn scroll_artifact(&mut self, delta: i32) {
        let next = (self.artifact_scroll as i32 + delta).max(0);
        self.artifact_scroll = next.min(u16::MAX as i32) as u16;
    }
}

fn byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
