use chrono::{DateTime, Local};
use ratatui::{
    prelude::*,
    widgets::{Block, Paragraph},
};

use crate::domain::Message;
use crate::model::StatusBar;
use crate::presentation::widgets::{
    message_line::MessageLine,
    status_bar::{StatusBarWidget, ViewContext},
};

const INPUT_TITLE: &str = "Message (/help for commands)";

/// The whole overlay: stream, optional secret key line, input box and status bar
pub struct ChatView<'a> {
    pub messages: Vec<&'a Message>,
    pub draft: &'a str,
    pub status_bar: &'a StatusBar,
    pub ctx: ViewContext<'a>,
    pub secret_key: Option<&'a str>,
    pub now: DateTime<Local>,
}

impl ChatView<'_> {
    fn areas(&self, area: Rect) -> [Rect; 4] {
        let secret_height = u16::from(self.secret_key.is_some());
        Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(secret_height),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .areas(area)
    }

    /// Tail of the draft that fits in `width` columns
    fn visible_draft(&self, width: u16) -> &str {
        let width = usize::from(width.saturating_sub(1));
        let count = self.draft.chars().count();
        match self.draft.char_indices().nth(count.saturating_sub(width)) {
            Some((start, _)) if count > width => &self.draft[start..],
            _ => self.draft,
        }
    }

    /// Where the terminal cursor goes: right after the draft
    pub fn cursor_position(&self, area: Rect) -> Position {
        let [_, _, input, _] = self.areas(area);
        let inner = Block::bordered().inner(input);
        let typed = u16::try_from(self.visible_draft(inner.width).chars().count())
            .unwrap_or(u16::MAX);
        Position::new(inner.x.saturating_add(typed), inner.y)
    }

    fn render_stream(&self, area: Rect, buf: &mut Buffer) {
        if self.messages.is_empty() {
            Paragraph::new(Span::styled("No messages yet", Style::default().fg(Color::DarkGray)))
                .render(area, buf);
            return;
        }

        let skip = self.messages.len().saturating_sub(usize::from(area.height));
        let lines: Vec<Line> = self.messages[skip..]
            .iter()
            .map(|message| MessageLine::new(message, self.now).into())
            .collect();
        Paragraph::new(lines).render(area, buf);
    }
}

impl Widget for ChatView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer)
    where
        Self: Sized,
    {
        let [stream, secret, input, status] = self.areas(area);

        self.render_stream(stream, buf);

        if let Some(secret_key) = self.secret_key {
            Paragraph::new(Line::from(vec![
                Span::styled("Secret key (/hide): ", Style::default().fg(Color::Red).bold()),
                Span::raw(secret_key),
            ]))
            .render(secret, buf);
        }

        let block = Block::bordered().title(INPUT_TITLE);
        let inner = block.inner(input);
        block.render(input, buf);
        Paragraph::new(self.visible_draft(inner.width)).render(inner, buf);

        StatusBarWidget::new(self.status_bar, self.ctx).render(status, buf);
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::domain::SenderKey;
    use crate::model::ConnectionStatus;

    const NOW: i64 = 1_700_000_000;

    fn message(id: &str, content: &str) -> Message {
        Message {
            id: id.to_string(),
            sender: SenderKey::from("alice"),
            display_name: String::from("alice"),
            content: content.to_string(),
            timestamp: NOW as u64,
            is_post: false,
        }
    }

    fn view<'a>(
        messages: &'a [Message],
        draft: &'a str,
        status_bar: &'a StatusBar,
        secret_key: Option<&'a str>,
    ) -> ChatView<'a> {
        ChatView {
            messages: messages.iter().collect(),
            draft,
            status_bar,
            ctx: ViewContext {
                connection: ConnectionStatus::Connected,
                public_key: None,
            },
            secret_key,
            now: Local.timestamp_opt(NOW, 0).single().expect("valid time"),
        }
    }

    fn screen(view: ChatView<'_>, width: u16, height: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).expect("terminal");
        terminal
            .draw(|frame| frame.render_widget(view, frame.area()))
            .expect("draw");
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(usize::from(width))
            .map(|row| {
                row.iter()
                    .map(|cell| cell.symbol())
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_layout() {
        let messages = vec![message("a", "first"), message("b", "second")];
        let status_bar = StatusBar::default();
        let rows = screen(view(&messages, "hi", &status_bar, None), 40, 8);

        assert_eq!(rows[0], "now alice: first");
        assert_eq!(rows[1], "now alice: second");
        assert!(rows[3].starts_with("┌Message"));
        assert!(rows[4].starts_with("│hi "));
        assert!(rows[4].ends_with('│'));
        assert_eq!(rows[6], "● connected -");
    }

    #[test]
    fn test_stream_shows_newest_that_fit() {
        let messages: Vec<Message> = (0..10)
            .map(|i| message(&i.to_string(), &format!("m{i}")))
            .collect();
        let status_bar = StatusBar::default();
        let rows = screen(view(&messages, "", &status_bar, None), 40, 8);

        assert_eq!(rows[0], "now alice: m7");
        assert_eq!(rows[2], "now alice: m9");
    }

    #[test]
    fn test_empty_stream() {
        let status_bar = StatusBar::default();
        let rows = screen(view(&[], "", &status_bar, None), 40, 8);
        assert_eq!(rows[0], "No messages yet");
    }

    #[test]
    fn test_revealed_secret_key() {
        let status_bar = StatusBar::default();
        let rows = screen(view(&[], "", &status_bar, Some("nsec1xyz")), 40, 8);
        assert_eq!(rows[2], "Secret key (/hide): nsec1xyz");
    }

    #[test]
    fn test_cursor_follows_draft() {
        let status_bar = StatusBar::default();
        let area = Rect::new(0, 0, 40, 8);

        let empty = view(&[], "", &status_bar, None);
        assert_eq!(empty.cursor_position(area), Position::new(1, 4));

        let typed = view(&[], "héllo", &status_bar, None);
        assert_eq!(typed.cursor_position(area), Position::new(6, 4));
    }

    #[test]
    fn test_long_draft_shows_tail() {
        let status_bar = StatusBar::default();
        let draft = "abcdefghij".repeat(5);
        let view = view(&[], &draft, &status_bar, None);

        assert_eq!(view.visible_draft(10), "bcdefghij");
    }
}
