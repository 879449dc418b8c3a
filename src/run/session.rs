//! One command or script on one target, from connection to exit.

use super::client::{Connect, Login, Remote, RemoteEvent, RemoteExit, Responder, Secret};
use crate::config::expand_tilde;
use crate::console::{Console, Markers};
use crate::core::{Auth, Target};
use crate::error::SessionError;
use crate::queue::{Completion, SerialQueue};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

/// Runs commands against a single [Target].
///
/// Each call to [Self::run] opens its own connection, so a [Session] may run several commands at
/// once. Everything the session shows the operator goes through the [SerialQueue].
pub struct Session<C: Connect> {
    target: Arc<Target>,
    connector: Arc<C>,
    queue: SerialQueue,
    console: Arc<dyn Console>,
    markers: Markers,
}

impl<C: Connect> Session<C> {
    pub fn new(
        target: Arc<Target>,
        connector: Arc<C>,
        queue: SerialQueue,
        console: Arc<dyn Console>,
        markers: Markers,
    ) -> Self {
        Session {
            target,
            connector,
            queue,
            console,
            markers,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Reads the script at `path` and runs its contents as a single command.
    pub async fn run_script(&self, path: impl AsRef<Path>) -> Result<RemoteExit, SessionError> {
        let path = expand_tilde(path);
        let script = fs::read_to_string(&path)
            .await
            .map_err(|source| SessionError::Script { path, source })?;
        self.run(&script).await
    }

    /// Connects, authenticates, runs `command`, and relays its output until the channel closes.
    ///
    /// A non-zero exit is not an error; it is reported in the returned [RemoteExit].
    pub async fn run(&self, command: &str) -> Result<RemoteExit, SessionError> {
        let label = self.target.label();
        let login = self.login().await?;

        debug!(host = label, address = %self.target.address(), user = %login.username, "connecting");
        let responder = Responder::new(
            label,
            self.queue.clone(),
            self.console.clone(),
            self.markers,
        );
        let remote = self.connector.connect(&self.target, login, responder).await?;

        debug!(host = label, "authenticated, starting command");
        let mut events = remote.exec(command.to_string()).await?;

        let mut last_write = None;
        let ended = loop {
            match events.recv().await {
                Some(RemoteEvent::Stdout(data)) => {
                    last_write = Some(self.show(self.markers.stdout(label, &data)));
                }
                Some(RemoteEvent::Stderr(data)) => {
                    last_write = Some(self.show(self.markers.stderr(label, &data)));
                }
                Some(RemoteEvent::Closed(exit)) => break Ok(exit),
                Some(RemoteEvent::Lost(reason)) => break Err(SessionError::Transport(reason)),
                None => {
                    break Err(SessionError::Transport(
                        "connection closed before the command finished".to_string(),
                    ))
                }
            }
        };

        // Queued writes run in order, so the last one finishing means they all have.
        if let Some(write) = last_write {
            if let Err(e) = write.wait().await {
                warn!(host = label, "failed to show remote output: {e:#}");
            }
        }

        let exit = ended?;
        debug!(host = label, %exit, "command finished");
        Ok(exit)
    }

    async fn login(&self) -> Result<Login, SessionError> {
        match &self.target.auth {
            Some(Auth::Password {
                username, password, ..
            }) => Ok(Login {
                username: username.clone(),
                secret: Some(Secret::Password(password.clone())),
            }),
            Some(Auth::Key {
                username, key_path, ..
            }) => {
                let key = fs::read_to_string(key_path)
                    .await
                    .map_err(|source| SessionError::KeyFile {
                        path: key_path.clone(),
                        source,
                    })?;
                Ok(Login {
                    username: username.clone(),
                    secret: Some(Secret::PrivateKey(key)),
                })
            }
            None => Ok(Login {
                username: local_username().ok_or(SessionError::NoUsername)?,
                secret: None,
            }),
        }
    }

    fn show(&self, text: String) -> Completion<()> {
        let console = self.console.clone();
        self.queue.submit(move || async move {
            console.write(&text)?;
            Ok(())
        })
    }
}

/// The name of the user running mussh, from the environment.
pub fn local_username() -> Option<String> {
    ["USER", "LOGNAME", "USERNAME"]
        .into_iter()
        .find_map(|var| env::var(var).ok().filter(|name| !name.is_empty()))
}
