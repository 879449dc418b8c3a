//! The local terminal, as seen by sessions.
//!
//! Sessions never touch stdin or stdout directly. They go through a [Console], always from inside a
//! task on the [SerialQueue], so at most one session is talking to the operator at any moment.
//!
//! [SerialQueue]: crate::queue::SerialQueue

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Stylize;
use crossterm::terminal;
use std::io::{self, BufRead, ErrorKind, IsTerminal, Write};

/// Reads from and writes to the operator's terminal.
///
/// Both methods block. Call them from a blocking context, e.g. [tokio::task::spawn_blocking], or
/// accept that a short write stalls the runtime for its duration.
pub trait Console: Send + Sync + 'static {
    /// Writes `text` as-is and flushes it.
    fn write(&self, text: &str) -> io::Result<()>;

    /// Reads one line, without its line terminator.
    ///
    /// When `echo` is `false`, the characters typed are not shown.
    fn read_line(&self, echo: bool) -> io::Result<String>;
}

/// The real [Console]: standard input and standard output.
#[derive(Clone, Copy, Debug, Default)]
pub struct Terminal;

impl Console for Terminal {
    fn write(&self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()
    }

    fn read_line(&self, echo: bool) -> io::Result<String> {
        // Raw mode needs a real terminal. Piped input has no echo to suppress anyway.
        if echo || !io::stdin().is_terminal() {
            return read_plain_line();
        }

        terminal::enable_raw_mode()?;
        let line = read_hidden_line();
        terminal::disable_raw_mode()?;
        line
    }
}

fn read_plain_line() -> io::Result<String> {
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            "standard input closed",
        ));
    }
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}

// Must run in raw mode: collects key presses until Enter without echoing them.
fn read_hidden_line() -> io::Result<String> {
    let mut line = String::new();
    loop {
        let key = match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => key,
            _ => continue,
        };

        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter => return Ok(line),
            KeyCode::Backspace => {
                line.pop();
            }
            KeyCode::Char('c') if control => {
                return Err(io::Error::new(ErrorKind::Interrupted, "prompt interrupted"));
            }
            KeyCode::Char('d') if control && line.is_empty() => {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "standard input closed",
                ));
            }
            KeyCode::Char(c) if !control => line.push(c),
            _ => {}
        }
    }
}

/// Formats the banners that tell the operator which target a piece of terminal output belongs to.
///
/// Prompts, remote stdout, and remote stderr each get a distinct marker, and a distinct color when
/// [Self::color] is set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Markers {
    pub color: bool,
}

impl Markers {
    /// Markers with colors enabled only if standard output is a terminal.
    pub fn detect() -> Self {
        Markers {
            color: io::stdout().is_terminal(),
        }
    }

    /// Markers without any escape sequences.
    pub fn plain() -> Self {
        Markers { color: false }
    }

    /// Announces that `label` is about to ask the operator something.
    pub fn prompt(&self, label: &str) -> String {
        let banner = format!("<<- {label} #");
        match self.color {
            true => format!("{}\n", banner.as_str().green()),
            false => format!("{banner}\n"),
        }
    }

    /// A chunk of standard output from `label`.
    pub fn stdout(&self, label: &str, data: &[u8]) -> String {
        let banner = format!("# {label} ->>");
        let data = chunk_text(data);
        match self.color {
            true => format!("{}\n{data}\n", banner.as_str().yellow()),
            false => format!("{banner}\n{data}\n"),
        }
    }

    /// A chunk of standard error from `label`.
    pub fn stderr(&self, label: &str, data: &[u8]) -> String {
        let line = format!("{label}: ERROR {}", chunk_text(data));
        match self.color {
            true => format!("{}\n", line.as_str().red()),
            false => format!("{line}\n"),
        }
    }
}

// Remote output almost always ends in a newline; the markers add their own.
fn chunk_text(data: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(data).into_owned();
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}

#[cfg(test)]
pub mod fixtures {
    use super::*;
    use std::sync::Mutex;

    /// One interaction with a [TestConsole].
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Entry {
        Wrote(String),
        Read { echo: bool, answer: String },
    }

    /// A [Console] that records everything and answers every prompt with `re: <prompt text>`.
    ///
    /// Deriving the answer from the most recent write lets tests check that each answer went back
    /// to the session that asked, however the sessions were scheduled.
    #[derive(Debug, Default)]
    pub struct TestConsole {
        transcript: Mutex<Vec<Entry>>,

        // Whether read_line should fail, as if stdin were closed.
        closed: bool,
    }

    impl TestConsole {
        pub fn new() -> Self {
            Self::default()
        }

        /// A console whose standard input is closed.
        pub fn closed() -> Self {
            TestConsole {
                closed: true,
                ..Default::default()
            }
        }

        pub fn transcript(&self) -> Vec<Entry> {
            self.transcript.lock().unwrap().clone()
        }

        /// Everything written, concatenated.
        pub fn output(&self) -> String {
            self.transcript()
                .into_iter()
                .filter_map(|entry| match entry {
                    Entry::Wrote(text) => Some(text),
                    Entry::Read { .. } => None,
                })
                .collect()
        }
    }

    impl Console for TestConsole {
        fn write(&self, text: &str) -> io::Result<()> {
            self.transcript
                .lock()
                .unwrap()
                .push(Entry::Wrote(text.to_string()));
            Ok(())
        }

        fn read_line(&self, echo: bool) -> io::Result<String> {
            if self.closed {
                return Err(io::Error::new(ErrorKind::UnexpectedEof, "closed"));
            }

            let mut transcript = self.transcript.lock().unwrap();
            let last = transcript
                .iter()
                .rev()
                .find_map(|entry| match entry {
                    Entry::Wrote(text) => Some(text.trim().to_string()),
                    Entry::Read { .. } => None,
                })
                .unwrap_or_default();
            let answer = format!("re: {last}");
            transcript.push(Entry::Read {
                echo,
                answer: answer.clone(),
            });
            Ok(answer)
        }
    }
}

#[cfg(test)]
mod test;
