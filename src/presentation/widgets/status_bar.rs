use ratatui::{prelude::*, widgets::Paragraph};

use crate::{
    domain::text::shorten_npub,
    model::{ConnectionStatus, StatusBar},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ViewContext<'a> {
    pub connection: ConnectionStatus,
    pub public_key: Option<&'a str>,
}

pub struct StatusBarWidget<'a> {
    status_bar: &'a StatusBar,
    ctx: ViewContext<'a>,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(status_bar: &'a StatusBar, ctx: ViewContext<'a>) -> Self {
        Self { status_bar, ctx }
    }

    pub fn user_name(&self) -> String {
        self.ctx
            .public_key
            .map(shorten_npub)
            .unwrap_or_else(|| String::from("-"))
    }

    fn connection_style(&self) -> Style {
        match self.ctx.connection {
            ConnectionStatus::Connecting => Style::default().fg(Color::Yellow),
            ConnectionStatus::Connected => Style::default().fg(Color::Green),
            ConnectionStatus::Error => Style::default().fg(Color::Red).bold(),
        }
    }
}

impl Widget for StatusBarWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer)
    where
        Self: Sized,
    {
        let layout = Layout::new(
            Direction::Vertical,
            [
                Constraint::Min(0),    // Unused
                Constraint::Length(1), // Connection and user
                Constraint::Length(1), // Notice
            ],
        )
        .split(area);

        let info = Line::from(vec![
            Span::styled(format!("● {}", self.ctx.connection), self.connection_style()),
            Span::raw(" "),
            Span::styled(self.user_name(), Style::default().fg(Color::Gray).italic()),
        ]);
        Paragraph::new(info)
            .style(Style::default().bg(Color::Black))
            .render(layout[1], buf);

        let style = if self.status_bar.is_error() {
            Style::default().fg(Color::Red)
        } else {
            Style::default()
        };
        Paragraph::new(self.status_bar.message().unwrap_or_default())
            .style(style)
            .render(layout[2], buf);
    }
}
