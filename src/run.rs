//! Runs commands on many targets at once.
//!
//! Every (target, command) pair gets its own [Session] task. The tasks run concurrently and share
//! one [SerialQueue] for everything they show the operator. A failure stays with its own task:
//! [Runner::run_all] always waits for every task and reports each one's [Outcome].

pub mod client;
pub mod session;

use crate::console::{Console, Markers};
use crate::core::Target;
use crate::error::SessionError;
use crate::queue::SerialQueue;
use client::{Connect, RemoteExit};
use session::Session;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, warn};

/// What to run on each target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// A command line, passed to the remote shell as-is.
    Literal(String),

    /// A local file whose contents are run as one command.
    Script(PathBuf),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Literal(command) => write!(f, "command `{command}`"),
            Command::Script(path) => write!(f, "script {}", path.display()),
        }
    }
}

/// The result of running one [Command] on one [Target].
#[derive(Debug)]
pub struct Outcome {
    pub target: Arc<Target>,
    pub command: Command,
    pub result: Result<RemoteExit, SessionError>,
}

/// Launches sessions and collects their outcomes.
pub struct Runner<C: Connect> {
    connector: Arc<C>,
    queue: SerialQueue,
    console: Arc<dyn Console>,
    markers: Markers,
}

impl<C: Connect> Runner<C> {
    pub fn new(connector: C, queue: SerialQueue, console: Arc<dyn Console>, markers: Markers) -> Self {
        Runner {
            connector: Arc::new(connector),
            queue,
            console,
            markers,
        }
    }

    /// A [Session] for `target` that shares this runner's connector, queue, and console.
    pub fn session(&self, target: Arc<Target>) -> Session<C> {
        Session::new(
            target,
            self.connector.clone(),
            self.queue.clone(),
            self.console.clone(),
            self.markers,
        )
    }

    /// Runs every command on every target concurrently and waits for all of them.
    ///
    /// Outcomes are returned in launch order: target by target, and each target's commands in
    /// the order given. Each outcome is also logged as soon as its session ends.
    pub async fn run_all(&self, targets: Vec<Target>, commands: &[Command]) -> Vec<Outcome> {
        let mut launched: Vec<(Arc<Target>, Command, JoinHandle<_>)> = Vec::new();
        for target in targets {
            let target = Arc::new(target);
            for command in commands {
                let session = self.session(target.clone());
                let command_ = command.clone();
                let handle = task::spawn(async move {
                    let result = match &command_ {
                        Command::Literal(line) => session.run(line).await,
                        Command::Script(path) => session.run_script(path).await,
                    };
                    log_outcome(session.target(), &command_, &result);
                    result
                });
                launched.push((target.clone(), command.clone(), handle));
            }
        }

        let mut outcomes = Vec::with_capacity(launched.len());
        for (target, command, handle) in launched {
            let result = handle.await.unwrap_or_else(|e| {
                let error = SessionError::Transport(format!("session task failed: {e}"));
                error!(host = target.label(), "{command} failed: {error}");
                Err(error)
            });
            outcomes.push(Outcome {
                target,
                command,
                result,
            });
        }
        outcomes
    }
}

fn log_outcome(target: &Target, command: &Command, result: &Result<RemoteExit, SessionError>) {
    let host = target.label();
    match result {
        Ok(exit) if exit.success() => info!(host, "{command} finished"),
        Ok(exit) => warn!(host, "{command} finished with {exit}"),
        Err(e) => error!(host, "{command} failed: {e}"),
    }
}
