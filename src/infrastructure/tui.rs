//! Terminal access behind a small trait, so the app can be driven by a test terminal

pub mod real;

use std::future::Future;
use std::io;
use std::pin::Pin;

use color_eyre::eyre::Result;
use ratatui::layout::Rect;
use crossterm::{
    cursor,
    event::{DisableBracketedPaste, KeyEvent},
    execute,
    terminal::{disable_raw_mode, is_raw_mode_enabled, LeaveAlternateScreen},
};

pub type Frame<'a> = ratatui::Frame<'a>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Tick,
    Render,
    FocusGained,
    FocusLost,
    Paste(String),
    Key(KeyEvent),
    Resize(u16, u16),
    Error(String),
}

pub trait TuiLike: Send {
    fn enter(&mut self) -> Result<()>;
    fn exit(&mut self) -> Result<()>;
    fn draw(&mut self, f: &mut dyn FnMut(&mut Frame<'_>)) -> Result<()>;
    fn resize(&mut self, area: Rect) -> Result<()>;
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Option<Event>> + Send + '_>>;
}

/// Leaves raw mode and the alternate screen. Does nothing if the terminal is not in raw mode.
pub fn restore_terminal() -> Result<()> {
    if is_raw_mode_enabled()? {
        disable_raw_mode()?;
        execute!(
            io::stdout(),
            LeaveAlternateScreen,
            DisableBracketedPaste,
            cursor::Show
        )?;
    }
    Ok(())
}
