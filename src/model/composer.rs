use std::mem;

use crate::domain::Message as ChatMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    CharInserted(char),
    CharDeleted,
    Pasted(String),
    Cleared,
}

/// Text taken out of the draft while its publish call is in flight
///
/// It is resolved exactly once: committed into the stream or rolled back into the draft.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending send must be committed or rolled back"]
pub struct PendingSend {
    content: String,
}

impl PendingSend {
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Builds the local message for a confirmed publish
    pub fn into_message(self, id: impl Into<String>, timestamp: u64) -> ChatMessage {
        ChatMessage::local(id, self.content, timestamp)
    }
}

/// The user's draft line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    draft: String,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_empty(&self) -> bool {
        self.draft.is_empty()
    }

    /// Takes and clears the draft. Blank drafts are left alone.
    pub fn capture(&mut self) -> Option<PendingSend> {
        if self.draft.trim().is_empty() {
            return None;
        }

        Some(PendingSend {
            content: mem::take(&mut self.draft),
        })
    }

    /// Puts a failed send back in front of whatever was typed since
    pub fn restore(&mut self, pending: PendingSend) {
        if self.draft.is_empty() {
            self.draft = pending.content;
        } else {
            self.draft = format!("{} {}", pending.content, self.draft);
        }
    }

    pub fn update(&mut self, message: Message) {
        match message {
            Message::CharInserted(c) => self.draft.push(c),
            Message::CharDeleted => {
                self.draft.pop();
            }
            Message::Pasted(text) => self.draft.push_str(&text.replace(['\r', '\n'], " ")),
            Message::Cleared => self.draft.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn composer_with(text: &str) -> Composer {
        let mut composer = Composer::new();
        composer.update(Message::Pasted(text.to_string()));
        composer
    }

    #[test]
    fn test_typing() {
        let mut composer = Composer::new();
        for c in "gmm".chars() {
            composer.update(Message::CharInserted(c));
        }
        composer.update(Message::CharDeleted);
        assert_eq!(composer.draft(), "gm");

        composer.update(Message::Cleared);
        assert!(composer.is_empty());
    }

    #[test]
    fn test_paste_flattens_newlines() {
        let composer = composer_with("line 1\r\nline 2");
        assert_eq!(composer.draft(), "line 1  line 2");
    }

    #[test]
    fn test_capture_clears_draft() {
        let mut composer = composer_with("hello");
        let pending = composer.capture().expect("draft should be captured");
        assert_eq!(pending.content(), "hello");
        assert!(composer.is_empty());
    }

    #[test]
    fn test_capture_ignores_blank_draft() {
        let mut composer = composer_with("   ");
        assert_eq!(composer.capture(), None);
        assert_eq!(composer.draft(), "   ");
    }

    #[test]
    fn test_restore_into_empty_draft() {
        let mut composer = composer_with("hello");
        let pending = composer.capture().expect("draft should be captured");
        composer.restore(pending);
        assert_eq!(composer.draft(), "hello");
    }

    #[test]
    fn test_restore_keeps_new_typing() {
        let mut composer = composer_with("hello");
        let pending = composer.capture().expect("draft should be captured");
        composer.update(Message::Pasted(String::from("again")));
        composer.restore(pending);
        assert_eq!(composer.draft(), "hello again");
    }

    #[test]
    fn test_into_message() {
        let mut composer = composer_with("gm nostr");
        let pending = composer.capture().expect("draft should be captured");
        let message = pending.into_message("e1", 1_700_000_000);
        assert!(message.is_local());
        assert_eq!(message.id, "e1");
        assert_eq!(message.content, "gm nostr");
        assert_eq!(message.timestamp, 1_700_000_000);
    }
}
