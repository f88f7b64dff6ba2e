use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::Print,
    terminal::{self, ClearType},
};
use std::io::{self, Stdout, Write};
use std::time::Duration;
use thiserror::Error;
use tiago_controller::keys::TeleopKey;

#[derive(Error, Debug)]
pub enum WindowError {
    #[error("terminal error")]
    Io(#[from] io::Error),
    #[error("line {lineno} out of bounds, window has {lines} lines")]
    LineOutOfBounds { lineno: usize, lines: usize },
}

type Result<T> = std::result::Result<T, WindowError>;

/// Column every line starts at
const LEFT_MARGIN: u16 = 10;

/// Surface the teleop loops draw on and read keys from
pub trait TeleopInterface {
    /// Non blocking, `None` when no key is waiting
    fn read_key(&mut self) -> Result<Option<TeleopKey>>;
    fn clear(&mut self) -> Result<()>;
    fn write_line(&mut self, lineno: usize, message: &str) -> Result<()>;
    fn refresh(&mut self) -> Result<()>;
    fn beep(&mut self) -> Result<()>;
}

/// Full screen terminal split into evenly spaced lines.
///
/// The terminal is restored when the window is dropped.
pub struct TextWindow {
    stdout: Stdout,
    lines: usize,
}

impl TextWindow {
    pub fn new(lines: usize) -> Result<Self> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;
        Ok(TextWindow { stdout, lines })
    }
}

impl Drop for TextWindow {
    fn drop(&mut self) {
        let _ = execute!(self.stdout, cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

impl TeleopInterface for TextWindow {
    fn read_key(&mut self) -> Result<Option<TeleopKey>> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key_event) = event::read()? {
                if let Some(key) = decode_key(&key_event) {
                    return Ok(Some(key));
                }
            }
        }
        Ok(None)
    }

    fn clear(&mut self) -> Result<()> {
        queue!(self.stdout, terminal::Clear(ClearType::All))?;
        Ok(())
    }

    fn write_line(&mut self, lineno: usize, message: &str) -> Result<()> {
        if lineno >= self.lines {
            return Err(WindowError::LineOutOfBounds {
                lineno,
                lines: self.lines,
            });
        }
        let (width, height) = terminal::size()?;
        let mut row = line_row(height, self.lines, lineno);
        for text in message.split('\n') {
            if row >= height {
                break;
            }
            let padded = pad_line(text, width.saturating_sub(LEFT_MARGIN) as usize);
            queue!(self.stdout, cursor::MoveTo(LEFT_MARGIN, row), Print(padded))?;
            row += 1;
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.stdout.flush()?;
        Ok(())
    }

    fn beep(&mut self) -> Result<()> {
        queue!(self.stdout, Print('\u{7}'))?;
        Ok(())
    }
}

/// Terminal row of a logical line
fn line_row(height: u16, lines: usize, lineno: usize) -> u16 {
    let spacing = height as f32 / lines as f32;
    (spacing * lineno as f32) as u16
}

/// Pad with spaces so stale text gets overwritten, cut at `width`
fn pad_line(text: &str, width: usize) -> String {
    let mut line: String = text.chars().take(width).collect();
    let length = line.chars().count();
    line.extend(std::iter::repeat(' ').take(width - length));
    line
}

pub fn decode_key(event: &KeyEvent) -> Option<TeleopKey> {
    if event.kind == KeyEventKind::Release {
        return None;
    }
    match event.code {
        KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(TeleopKey::Interrupt)
        }
        KeyCode::Char(key) => Some(TeleopKey::from_char(key)),
        KeyCode::Up => Some(TeleopKey::Up),
        KeyCode::Down => Some(TeleopKey::Down),
        KeyCode::Left => Some(TeleopKey::Left),
        KeyCode::Right => Some(TeleopKey::Right),
        _ => None,
    }
}
