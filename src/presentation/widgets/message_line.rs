use chrono::{DateTime, Local};
use ratatui::prelude::*;

use crate::domain::text::{format_relative_time, linkify, Segment};
use crate::domain::Message;

pub const POST_MARKER: &str = "[note] ";

/// One stream message on a single row: `time name: content`
pub struct MessageLine<'a> {
    message: &'a Message,
    now: DateTime<Local>,
}

impl<'a> MessageLine<'a> {
    pub fn new(message: &'a Message, now: DateTime<Local>) -> Self {
        Self { message, now }
    }

    pub fn time(&self) -> String {
        format_relative_time(self.message.timestamp, &self.now)
    }

    fn name_style(&self) -> Style {
        if self.message.is_local() {
            Style::default().bold().fg(Color::Green)
        } else {
            Style::default().bold()
        }
    }

    fn content_spans(&self) -> Vec<Span<'static>> {
        let content = self.message.content.replace(['\r', '\n'], " ");
        linkify(&content)
            .into_iter()
            .map(|segment| match segment {
                Segment::Text(text) => Span::raw(text),
                Segment::Link { label, .. } => {
                    Span::styled(label, Style::default().fg(Color::Cyan).underlined())
                }
            })
            .collect()
    }
}

impl From<MessageLine<'_>> for Line<'static> {
    fn from(widget: MessageLine<'_>) -> Self {
        let mut spans = vec![
            Span::styled(widget.time(), Style::default().fg(Color::Gray)),
            Span::raw(" "),
        ];
        if widget.message.is_post {
            spans.push(Span::styled(POST_MARKER, Style::default().fg(Color::Yellow)));
        }
        spans.push(Span::styled(
            widget.message.display_name.clone(),
            widget.name_style(),
        ));
        spans.push(Span::raw(": "));
        spans.extend(widget.content_spans());

        Line::from(spans)
    }
}

impl Widget for MessageLine<'_> {
    fn render(self, area: Rect, buf: &mut Buffer)
    where
        Self: Sized,
    {
        let line: Line = self.into();
        line.render(area, buf);
    }
}
