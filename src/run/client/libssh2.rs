//! The production transport, built on libssh2 through the [ssh2] crate.
//!
//! libssh2 is blocking, so every call into it runs on a blocking thread.

use super::{Connect, Events, Login, Prompt, Remote, RemoteEvent, RemoteExit, Responder, Secret};
use crate::core::{IpFamily, Target};
use crate::error::SessionError;
use async_trait::async_trait;
use ssh2::{Channel, KeyboardInteractivePrompt, Session};
use std::io::{self, ErrorKind, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task;
use tracing::{debug, trace};

/// How long a host gets to accept the connection and finish the handshake.
pub const READY_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Production implementation of [Connect].
#[derive(Clone, Debug)]
pub struct Ssh2Connector {
    ready_timeout: Duration,
}

impl Ssh2Connector {
    pub fn new() -> Self {
        Ssh2Connector {
            ready_timeout: READY_TIMEOUT,
        }
    }
}

impl Default for Ssh2Connector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connect for Ssh2Connector {
    type Remote = Ssh2Remote;

    async fn connect(
        &self,
        target: &Target,
        login: Login,
        responder: Responder,
    ) -> Result<Ssh2Remote, SessionError> {
        let target = target.clone();
        let ready_timeout = self.ready_timeout;
        task::spawn_blocking(move || open(&target, &login, responder, ready_timeout))
            .await
            .map_err(|e| SessionError::Transport(format!("connection task failed: {e}")))?
    }
}

/// Production implementation of [Remote].
pub struct Ssh2Remote {
    session: Session,
}

#[async_trait]
impl Remote for Ssh2Remote {
    async fn exec(self, command: String) -> Result<Events, SessionError> {
        let (events, receiver) = mpsc::unbounded_channel();
        let (started, start) = oneshot::channel();
        let session = self.session;
        task::spawn_blocking(move || pump(session, &command, started, events));

        start
            .await
            .map_err(|_| SessionError::Exec("command thread exited before starting".to_string()))??;
        Ok(receiver)
    }
}

fn open(
    target: &Target,
    login: &Login,
    responder: Responder,
    ready_timeout: Duration,
) -> Result<Ssh2Remote, SessionError> {
    let connect_error = |reason: String| SessionError::Connect {
        address: target.address(),
        reason,
    };

    let addr = resolve(target)?;
    trace!(%addr, "opening TCP connection");
    let tcp = TcpStream::connect_timeout(&addr, ready_timeout)
        .map_err(|e| connect_error(e.to_string()))?;

    let mut session = Session::new().map_err(|e| connect_error(e.to_string()))?;
    session.set_tcp_stream(tcp);
    handshake_within(&mut session, ready_timeout).map_err(|e| connect_error(e.to_string()))?;

    authenticate(&session, target, login, responder)?;
    Ok(Ssh2Remote { session })
}

// Only the handshake is bounded. Authentication may wait on the operator behind other hosts'
// prompts, and remote commands may stay quiet for a long time.
fn handshake_within(session: &mut Session, ready_timeout: Duration) -> Result<(), ssh2::Error> {
    session.set_timeout(millis(ready_timeout));
    let handshake = session.handshake();
    session.set_timeout(0);
    handshake
}

fn resolve(target: &Target) -> Result<SocketAddr, SessionError> {
    let connect_error = |reason: String| SessionError::Connect {
        address: target.address(),
        reason,
    };

    let mut addrs = (target.hostname.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|e| connect_error(e.to_string()))?;
    addrs
        .find(|addr| match target.ip {
            Some(IpFamily::V4) => addr.is_ipv4(),
            Some(IpFamily::V6) => addr.is_ipv6(),
            None => true,
        })
        .ok_or_else(|| connect_error("no address of the requested IP family".to_string()))
}

// Tries the configured secret first, then keyboard-interactive if the server offers it.
fn authenticate(
    session: &Session,
    target: &Target,
    login: &Login,
    responder: Responder,
) -> Result<(), SessionError> {
    let failure = |reason: String| SessionError::Authentication {
        username: login.username.clone(),
        address: target.address(),
        reason,
    };

    // Listing the methods attempts "none" authentication, which a server may accept outright.
    let methods = match session.auth_methods(&login.username) {
        Ok(methods) => methods.to_string(),
        Err(_) if session.authenticated() => return Ok(()),
        Err(e) => return Err(failure(e.to_string())),
    };
    debug!(host = %target.address(), %methods, "server offers authentication methods");

    let mut last_error = None;
    let attempt = match &login.secret {
        Some(Secret::Password(password)) => {
            Some(session.userauth_password(&login.username, password))
        }
        Some(Secret::PrivateKey(key)) => {
            Some(session.userauth_pubkey_memory(&login.username, None, key, None))
        }
        None => None,
    };
    if let Some(Err(e)) = attempt {
        last_error = Some(e.to_string());
    }

    if !session.authenticated() && methods.split(',').any(|m| m == "keyboard-interactive") {
        let mut challenge = Challenge {
            responder,
            failure: None,
        };
        let result = session.userauth_keyboard_interactive(&login.username, &mut challenge);
        if let Some(error) = challenge.failure {
            return Err(error);
        }
        if let Err(e) = result {
            last_error = Some(e.to_string());
        }
    }

    match session.authenticated() {
        true => Ok(()),
        false => Err(failure(
            last_error.unwrap_or_else(|| format!("no usable method among {methods}")),
        )),
    }
}

// Forwards keyboard-interactive prompts to the operator.
struct Challenge {
    responder: Responder,

    // Set if the operator couldn't be asked. libssh2 can't carry the error itself.
    failure: Option<SessionError>,
}

impl KeyboardInteractivePrompt for Challenge {
    fn prompt<'a>(
        &mut self,
        _username: &str,
        instructions: &str,
        prompts: &[ssh2::Prompt<'a>],
    ) -> Vec<String> {
        if !instructions.is_empty() {
            trace!(instructions, "keyboard-interactive challenge");
        }
        let prompts: Vec<_> = prompts
            .iter()
            .map(|p| Prompt {
                text: p.text.to_string(),
                echo: p.echo,
            })
            .collect();

        match self.responder.answer_blocking(&prompts) {
            Ok(answers) => answers,
            Err(error) => {
                self.failure = Some(error);
                Vec::new()
            }
        }
    }
}

// Runs on a blocking thread for the life of the command.
fn pump(
    session: Session,
    command: &str,
    started: oneshot::Sender<Result<(), SessionError>>,
    events: mpsc::UnboundedSender<RemoteEvent>,
) {
    let opened = session.channel_session().and_then(|mut channel| {
        channel.exec(command)?;
        Ok(channel)
    });
    let mut channel = match opened {
        Ok(channel) => channel,
        Err(e) => {
            let _ = started.send(Err(SessionError::Exec(e.to_string())));
            return;
        }
    };
    let _ = started.send(Ok(()));

    // Polling both streams without blocking relays stdout and stderr in the order they arrive.
    session.set_blocking(false);
    if let Err(reason) = relay_output(&mut channel, &events) {
        let _ = events.send(RemoteEvent::Lost(reason));
        return;
    }
    session.set_blocking(true);

    if let Err(e) = channel.wait_close() {
        debug!("channel did not close cleanly: {e}");
    }
    let exit = RemoteExit {
        exit_code: channel.exit_status().ok(),
        signal: channel.exit_signal().ok().and_then(|s| s.exit_signal),
    };
    if let Err(e) = session.disconnect(None, "session finished", None) {
        debug!("disconnect failed: {e}");
    }
    let _ = events.send(RemoteEvent::Closed(exit));
}

fn relay_output(
    channel: &mut Channel,
    events: &mpsc::UnboundedSender<RemoteEvent>,
) -> Result<(), String> {
    let mut buffer = [0; 8192];
    loop {
        let stdout = relay(channel.read(&mut buffer), &buffer, RemoteEvent::Stdout, events)?;
        let stderr = relay(
            channel.stderr().read(&mut buffer),
            &buffer,
            RemoteEvent::Stderr,
            events,
        )?;

        if !stdout && !stderr {
            if channel.eof() {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

// Sends whatever `read` produced. Returns whether there was anything to send.
fn relay(
    read: io::Result<usize>,
    buffer: &[u8],
    wrap: fn(Vec<u8>) -> RemoteEvent,
    events: &mpsc::UnboundedSender<RemoteEvent>,
) -> Result<bool, String> {
    match read {
        Ok(0) => Ok(false),
        Ok(n) => {
            // The receiver may be gone already; keep draining so the channel can close.
            let _ = events.send(wrap(buffer[..n].to_vec()));
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e.to_string()),
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::fixtures::target;

    #[test]
    fn resolves_literal_address() {
        let addr = resolve(&target(None, "127.0.0.1")).unwrap();
        assert_eq!("127.0.0.1:22".parse::<SocketAddr>().unwrap(), addr);
    }

    #[test]
    fn resolve_honors_ip_family() {
        let mut v6_only = target(None, "127.0.0.1");
        v6_only.ip = Some(IpFamily::V6);
        assert!(matches!(
            resolve(&v6_only),
            Err(SessionError::Connect { .. }),
        ));
    }

    #[test]
    fn handshake_is_bounded_and_clears_timeout() {
        // Accepts the connection but never sends a banner.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let tcp = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (_silent, _) = listener.accept().unwrap();

        let mut session = Session::new().unwrap();
        session.set_tcp_stream(tcp);
        let started = std::time::Instant::now();
        assert!(handshake_within(&mut session, Duration::from_millis(200)).is_err());

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(0, session.timeout());
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(120_000, millis(READY_TIMEOUT));
        assert_eq!(u32::MAX, millis(Duration::from_secs(u64::MAX)));
    }
}
