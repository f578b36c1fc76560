#![forbid(unsafe_code)]

/// Leading character that marks the buffer as active entry-mode text.
pub const SENTINEL: char = '/';
/// Inserting this character submits instead of editing.
pub const TERMINATOR: char = '\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    Inserted,
    Submit,
    /// Entry mode is not active.
    Ignored,
}

/// The in-progress task name being typed.
///
/// Either empty (entry mode inactive) or starting with [`SENTINEL`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLineBuffer {
    chars: Vec<char>,
}

impl CommandLineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self) {
        self.chars = vec![SENTINEL];
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.chars.is_empty()
    }

    pub fn insert(&mut self, ch: char) -> Insert {
        if !self.is_active() {
            return Insert::Ignored;
        }
        if ch == TERMINATOR {
            return Insert::Submit;
        }
        self.chars.push(ch);
        Insert::Inserted
    }

    /// Removes the last character; the sentinel is never removed.
    pub fn backspace(&mut self) -> bool {
        if self.chars.len() > 1 {
            self.chars.pop();
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.chars.clear();
    }

    /// Full text including the sentinel.
    #[must_use]
    pub fn contents(&self) -> String {
        self.chars.iter().collect()
    }

    /// Typed text without the sentinel.
    #[must_use]
    pub fn query(&self) -> String {
        self.chars.iter().skip(1).collect()
    }

    /// Replaces the typed text, keeping entry mode active.
    pub fn replace_query(&mut self, query: &str) {
        self.chars = std::iter::once(SENTINEL).chain(query.chars()).collect();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}
