//! Provides an interface to open SSH sessions and execute commands on remote hosts.
//!
//! Transports implement [Connect] and [Remote]. Everything a transport needs from the operator
//! goes through the [Responder] it is handed, which serializes prompts on the [SerialQueue].

#[cfg(feature = "ssh2")]
pub mod libssh2;

use crate::console::{Console, Markers};
use crate::core::Target;
use crate::error::SessionError;
use crate::queue::{Completion, SerialQueue};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task;

/// Output of a running remote command. Ends with [RemoteEvent::Closed] or [RemoteEvent::Lost].
pub type Events = mpsc::UnboundedReceiver<RemoteEvent>;

/// Connects to hosts and returns values representing those connections.
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    type Remote: Remote;

    /// Connects to `target` and authenticates as `login`. Keyboard-interactive challenges are
    /// passed to `responder`.
    async fn connect(
        &self,
        target: &Target,
        login: Login,
        responder: Responder,
    ) -> Result<Self::Remote, SessionError>;
}

/// An authenticated connection to one host.
#[async_trait]
pub trait Remote: Send + 'static {
    /// Runs `command` in a new channel. The connection is closed once the command finishes.
    async fn exec(self, command: String) -> Result<Events, SessionError>;
}

/// Something that happened on a remote command's channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),

    /// The channel closed normally.
    Closed(RemoteExit),

    /// The connection broke before the channel closed.
    Lost(String),
}

/// How a remote command ended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteExit {
    /// Not every server reports one.
    pub exit_code: Option<i32>,

    /// The signal that killed the command, if any, e.g. `TERM`.
    pub signal: Option<String>,
}

impl RemoteExit {
    pub fn success(&self) -> bool {
        self.signal.is_none() && self.exit_code.unwrap_or(0) == 0
    }
}

impl fmt::Display for RemoteExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.signal, self.exit_code) {
            (Some(signal), _) => write!(f, "signal {signal}"),
            (None, Some(code)) => write!(f, "exit code {code}"),
            (None, None) => write!(f, "no exit status"),
        }
    }
}

/// Who to log in as and with what.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Login {
    pub username: String,

    /// [None] leaves only the methods that need no secret from us, e.g. keyboard-interactive.
    pub secret: Option<Secret>,
}

#[derive(Clone, PartialEq, Eq)]
pub enum Secret {
    Password(String),

    /// The contents of a private key file.
    PrivateKey(String),
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secret::Password(_) => f.write_str("Password(<redacted>)"),
            Secret::PrivateKey(_) => f.write_str("PrivateKey(<redacted>)"),
        }
    }
}

/// One question in a keyboard-interactive challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,

    /// Whether the operator's answer may be shown as they type it.
    pub echo: bool,
}

/// Answers keyboard-interactive challenges on behalf of one session.
///
/// Each prompt becomes one task on the [SerialQueue]: write the session's prompt banner, write the
/// prompt text, read the answer. A challenge with several prompts submits them one at a time,
/// waiting for each answer before asking the next question.
#[derive(Clone)]
pub struct Responder {
    label: Arc<str>,
    queue: SerialQueue,
    console: Arc<dyn Console>,
    markers: Markers,
}

impl Responder {
    pub fn new(
        label: &str,
        queue: SerialQueue,
        console: Arc<dyn Console>,
        markers: Markers,
    ) -> Self {
        Responder {
            label: label.into(),
            queue,
            console,
            markers,
        }
    }

    /// Returns one answer per prompt, in order. An empty challenge is answered immediately.
    pub async fn answer(&self, prompts: &[Prompt]) -> Result<Vec<String>, SessionError> {
        let mut answers = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            answers.push(self.ask(prompt).wait().await.map_err(console_error)?);
        }
        Ok(answers)
    }

    /// Blocking version of [Self::answer], for transports that run on a blocking thread.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn answer_blocking(&self, prompts: &[Prompt]) -> Result<Vec<String>, SessionError> {
        let mut answers = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            answers.push(self.ask(prompt).wait_blocking().map_err(console_error)?);
        }
        Ok(answers)
    }

    fn ask(&self, prompt: &Prompt) -> Completion<String> {
        let console = self.console.clone();
        let banner = self.markers.prompt(&self.label);
        let prompt = prompt.clone();

        self.queue.submit(move || async move {
            task::spawn_blocking(move || -> anyhow::Result<String> {
                console.write(&banner)?;
                console.write(&prompt.text)?;
                let answer = console.read_line(prompt.echo)?;
                if !prompt.echo {
                    // The operator's Enter wasn't echoed either.
                    console.write("\n")?;
                }
                Ok(answer)
            })
            .await?
        })
    }
}

fn console_error(error: anyhow::Error) -> SessionError {
    SessionError::Console(format!("{error:#}"))
}
