use crate::api::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// Opaque handle returned by `append` and consumed by `remove`. Entries are
/// identified by handle, never by structural matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

#[derive(Debug, Clone)]
pub struct MessageEntry {
    pub role: Role,
    pub text: String,
    pub placeholder: bool,
    pub mode: Option<Mode>,
}

impl MessageEntry {
    pub fn user(text: String) -> Self {
        Self {
            role: Role::User,
            text,
            placeholder: false,
            mode: None,
        }
    }

    pub fn assistant(text: String, mode: Option<Mode>) -> Self {
        Self {
            role: Role::Assistant,
            text,
            placeholder: false,
            mode,
        }
    }

    /// The provisional entry shown while a turn is in flight. The ellipsis
    /// animation is added at render time.
    pub fn thinking() -> Self {
        Self {
            role: Role::Assistant,
            text: "Thinking".to_string(),
            placeholder: true,
            mode: None,
        }
    }
}

/// Append-only conversation record. Entries are immutable once appended;
/// the placeholder is the only entry ever removed.
pub struct Transcript {
    entries: Vec<(EntryId, MessageEntry)>,
    next_id: u64,
    welcome_dismissed: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            welcome_dismissed: false,
        }
    }

    /// The first non-placeholder append permanently collapses the welcome
    /// banner for this session.
    pub fn append(&mut self, entry: MessageEntry) -> EntryId {
        if !entry.placeholder {
            self.welcome_dismissed = true;
        }
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, entry));
        id
    }

    /// Removing an already-removed or unknown handle is a no-op.
    pub fn remove(&mut self, id: EntryId) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    pub fn entries(&self) -> impl Iterator<Item = &MessageEntry> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn show_welcome(&self) -> bool {
        !self.welcome_dismissed
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}
