//! Terminal prompts for credentials.
//!
//! Prompts and the chat loop read from the same [`Prompter`], so lines piped
//! on stdin are consumed in order by whichever asks next.

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{self, IsTerminal, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

/// RAII guard that disables raw mode on drop.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Line source shared by credential prompts and the chat loop.
pub struct Prompter<R> {
    lines: Lines<R>,
    hide_secrets: bool,
}

impl Prompter<BufReader<Stdin>> {
    /// Read from stdin. Secrets are hidden only when stdin is a terminal.
    pub fn stdin() -> Self {
        let hide_secrets = io::stdin().is_terminal();
        Self::new(BufReader::new(tokio::io::stdin()), hide_secrets)
    }
}

impl<R: AsyncBufRead + Unpin> Prompter<R> {
    pub fn new(reader: R, hide_secrets: bool) -> Self {
        Self {
            lines: reader.lines(),
            hide_secrets,
        }
    }

    /// Next input line without its line ending, or `None` at end of input.
    ///
    /// Cancel safe.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }

    /// Ask for a line of visible input. Fails on end of input.
    pub async fn ask(&mut self, label: &str) -> io::Result<String> {
        show_label(label)?;
        self.next_line()
            .await?
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"))
    }

    /// Ask for a secret. Input is not echoed when reading from a terminal.
    pub async fn ask_secret(&mut self, label: &str) -> io::Result<String> {
        if !self.hide_secrets {
            return self.ask(label).await;
        }
        show_label(label)?;
        let secret = tokio::task::spawn_blocking(read_hidden_line)
            .await
            .map_err(io::Error::other)?;
        let _ = writeln!(io::stderr());
        secret
    }

    /// Use `value` if given, otherwise prompt for it.
    pub async fn or_ask(&mut self, value: Option<String>, label: &str) -> io::Result<String> {
        match value {
            Some(value) => Ok(value),
            None => self.ask(label).await,
        }
    }

    /// Like [`Prompter::or_ask`], but with hidden input.
    pub async fn or_ask_secret(
        &mut self,
        value: Option<String>,
        label: &str,
    ) -> io::Result<String> {
        match value {
            Some(value) => Ok(value),
            None => self.ask_secret(label).await,
        }
    }
}

fn show_label(label: &str) -> io::Result<()> {
    let mut err = io::stderr().lock();
    write!(err, "{label}: ")?;
    err.flush()
}

fn read_hidden_line() -> io::Result<String> {
    let _guard = RawModeGuard::enable()?;
    let mut secret = String::new();

    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(secret),
            KeyCode::Backspace => {
                secret.pop();
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
            }
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
            }
            KeyCode::Char(ch) => secret.push(ch),
            _ => {}
        }
    }
}
