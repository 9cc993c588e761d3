//! NETCONF sessions over an `ssh` subprocess
//!
//! The session runs `ssh -s <host> netconf` and speaks base 1.0 framing over
//! the child's stdin and stdout. Whatever ssh prints on stderr is kept so
//! connection failures can be told apart.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use regex::Regex;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use ncif_apply::{Connector, RpcReply, Session};
use ncif_config::Settings;
use ncif_core::{Datastore, Filter, NetconfError, SessionError};

use crate::framing::{write_message, FramedReader};
use crate::rpc::{self, ReplyMatch};

/// Environment variable carrying the password to the askpass helper
pub const ASKPASS_ENV: &str = "NCIF_ASKPASS";

/// How long to wait for ssh to exit and flush stderr after a failure
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Password handed over by a parent `ncif` process, when running as askpass
pub fn askpass_response() -> Option<String> {
    std::env::var(ASKPASS_ENV).ok()
}

/// Connection parameters turned into an ssh command line
#[derive(Clone)]
pub struct SshOptions {
    pub command: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub key_file: Option<PathBuf>,
    pub hostkey_verify: bool,
    pub allow_agent: bool,
    pub look_for_keys: bool,
    pub timeout: Duration,
    /// Program ssh runs to ask for the password; defaults to this executable
    pub askpass_program: Option<PathBuf>,
}

impl SshOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            command: settings.ssh_command.clone(),
            host: settings.host.clone(),
            port: settings.port,
            username: settings.username.clone(),
            password: settings.password.clone(),
            key_file: settings.key_file.clone(),
            hostkey_verify: settings.hostkey_verify,
            allow_agent: settings.allow_agent,
            look_for_keys: settings.look_for_keys,
            timeout: settings.timeout(),
            askpass_program: None,
        }
    }

    /// Arguments passed to the ssh command
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            "-s".to_string(),
            "-p".to_string(),
            self.port.to_string(),
            "-l".to_string(),
            self.username.clone(),
        ];
        let mut option = |value: String| {
            args.push("-o".to_string());
            args.push(value);
        };

        option(format!("ConnectTimeout={}", self.timeout.as_secs().max(1)));
        if !self.hostkey_verify {
            option("StrictHostKeyChecking=no".to_string());
            option("UserKnownHostsFile=/dev/null".to_string());
        }
        if !self.allow_agent {
            option("IdentityAgent=none".to_string());
        }
        if !self.look_for_keys || self.key_file.is_some() {
            option("IdentitiesOnly=yes".to_string());
        }
        if self.password.is_some() {
            option("NumberOfPasswordPrompts=1".to_string());
        } else {
            option("BatchMode=yes".to_string());
        }

        if let Some(key_file) = &self.key_file {
            args.push("-i".to_string());
            args.push(key_file.display().to_string());
        }
        args.push(self.host.clone());
        args.push("netconf".to_string());
        args
    }

    fn build_command(&self) -> Result<Command, SessionError> {
        let mut command = Command::new(&self.command);
        command
            .args(self.arguments())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(password) = &self.password {
            let askpass = match &self.askpass_program {
                Some(program) => program.clone(),
                None => std::env::current_exe().map_err(|e| {
                    SessionError::Transport(format!("cannot locate askpass helper: {}", e))
                })?,
            };
            command
                .env("SSH_ASKPASS", askpass)
                .env("SSH_ASKPASS_REQUIRE", "force")
                .env(ASKPASS_ENV, password);
            if std::env::var_os("DISPLAY").is_none() {
                command.env("DISPLAY", ":0");
            }
        }
        Ok(command)
    }
}

impl std::fmt::Debug for SshOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshOptions")
            .field("command", &self.command)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_file", &self.key_file)
            .field("hostkey_verify", &self.hostkey_verify)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Sorts ssh diagnostics into authentication and reachability failures
pub struct FailureClassifier {
    authentication: Regex,
    unreachable: Regex,
}

impl FailureClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            authentication: Regex::new(
                r"(?i)permission denied|authentication failed|too many authentication failures|host key verification failed",
            )?,
            unreachable: Regex::new(
                r"(?i)could not resolve hostname|connection refused|no route to host|timed out|network is unreachable|connection closed|connection reset",
            )?,
        })
    }

    /// Classify the stderr text of a failed ssh run, if it says anything useful
    pub fn classify(&self, stderr: &str) -> Option<SessionError> {
        let line = stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| self.authentication.is_match(line) || self.unreachable.is_match(line))?;

        if self.authentication.is_match(line) {
            Some(SessionError::Authentication(line.to_string()))
        } else {
            Some(SessionError::Transport(line.to_string()))
        }
    }
}

struct Channel {
    writer: ChildStdin,
    reader: FramedReader<ChildStdout>,
}

/// Open NETCONF session running over an ssh child process
pub struct SshSession {
    host: String,
    channel: Mutex<Channel>,
    child: Mutex<Child>,
    stderr: Arc<StdMutex<String>>,
    classifier: FailureClassifier,
    next_message_id: AtomicU64,
    timeout: Duration,
    capabilities: Vec<String>,
}

impl SshSession {
    /// Start ssh and exchange hellos.
    pub async fn open(options: &SshOptions) -> Result<Self, SessionError> {
        let classifier = FailureClassifier::new()
            .map_err(|e| SessionError::Protocol(format!("invalid failure pattern: {}", e)))?;

        debug!("Starting {} {}", options.command, options.arguments().join(" "));
        let mut child = options.build_command()?.spawn().map_err(|e| {
            SessionError::Transport(format!("cannot start {}: {}", options.command, e))
        })?;

        let missing = |stream: &str| SessionError::Transport(format!("ssh {} not captured", stream));
        let writer = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let reader = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr_pipe = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let stderr = Arc::new(StdMutex::new(String::new()));
        let stderr_task = collect_stderr(options.host.clone(), stderr_pipe, stderr.clone());

        let mut channel = Channel {
            writer,
            reader: FramedReader::new(reader),
        };
        let handshake = async {
            write_message(&mut channel.writer, &rpc::hello()).await?;
            channel.reader.read_message().await
        };

        let raw = match timeout(options.timeout, handshake).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                let _ = timeout(EXIT_GRACE, child.wait()).await;
                let _ = timeout(EXIT_GRACE, stderr_task).await;
                let text = read_stderr(&stderr);
                return Err(classifier.classify(&text).unwrap_or(err));
            }
            Err(_) => return Err(SessionError::Timeout(options.timeout)),
        };

        let capabilities = rpc::parse_hello(&raw)?;
        for required in [rpc::CANDIDATE_CAPABILITY, rpc::VALIDATE_CAPABILITY] {
            if !capabilities.iter().any(|c| c.starts_with(required)) {
                warn!("{} does not announce {}", options.host, required);
            }
        }
        info!("NETCONF session with {} established", options.host);

        Ok(Self {
            host: options.host.clone(),
            channel: Mutex::new(channel),
            child: Mutex::new(child),
            stderr,
            classifier,
            next_message_id: AtomicU64::new(1),
            timeout: options.timeout,
            capabilities,
        })
    }

    /// Capabilities announced by the device
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Send `<close-session/>` and wait for ssh to exit.
    pub async fn close(self) -> Result<(), SessionError> {
        let result = self
            .rpc("close-session", rpc::CLOSE_SESSION)
            .await
            .and_then(|fields| rpc::expect_ok(&fields, "close-session"));

        let SshSession {
            host,
            channel,
            child,
            ..
        } = self;
        drop(channel.into_inner());

        let mut child = child.into_inner();
        if timeout(EXIT_GRACE, child.wait()).await.is_err() {
            warn!("ssh to {} did not exit after close-session, killing it", host);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill ssh to {}: {}", host, e);
            }
        }
        debug!("NETCONF session with {} closed", host);
        result
    }

    async fn rpc(&self, operation: &str, body: &str) -> Result<Map<String, Value>, SessionError> {
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let message = rpc::envelope(message_id, body);

        let mut channel = self.channel.lock().await;
        debug!("{} <- {} (message-id {})", self.host, operation, message_id);
        let host = &self.host;
        let exchange = async {
            write_message(&mut channel.writer, &message).await?;
            // replies to rpcs that timed out earlier may still be queued
            loop {
                let raw = channel.reader.read_message().await?;
                debug!("{} -> {} reply ({} bytes)", host, operation, raw.len());
                match rpc::match_reply(&raw, message_id)? {
                    ReplyMatch::Current(fields) => return Ok::<_, SessionError>(fields),
                    ReplyMatch::Stale(id) => {
                        debug!("{} skipping late reply to message-id {}", host, id)
                    }
                }
            }
        };

        match timeout(self.timeout, exchange).await {
            Ok(Ok(fields)) => Ok(fields),
            Ok(Err(SessionError::Transport(message))) => {
                Err(self.transport_failure(message).await)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(SessionError::Timeout(self.timeout)),
        }
    }

    async fn transport_failure(&self, message: String) -> SessionError {
        let mut child = self.child.lock().await;
        let _ = timeout(EXIT_GRACE, child.wait()).await;
        let text = read_stderr(&self.stderr);
        self.classifier
            .classify(&text)
            .unwrap_or(SessionError::Transport(message))
    }
}

#[async_trait]
impl Session for SshSession {
    fn host(&self) -> String {
        self.host.clone()
    }

    async fn get_config(&self, source: Datastore, filter: &Filter) -> Result<String, SessionError> {
        let fields = self
            .rpc("get-config", &rpc::get_config(source, filter))
            .await?;
        rpc::data_document(&fields)
    }

    async fn lock(&self, target: Datastore) -> Result<(), SessionError> {
        let fields = self.rpc("lock", &rpc::lock(target)).await?;
        rpc::expect_ok(&fields, "lock")
    }

    async fn unlock(&self, target: Datastore) -> Result<(), SessionError> {
        let fields = self.rpc("unlock", &rpc::unlock(target)).await?;
        rpc::expect_ok(&fields, "unlock")
    }

    async fn edit_config(&self, target: Datastore, document: &str) -> Result<RpcReply, SessionError> {
        let fields = self
            .rpc("edit-config", &rpc::edit_config(target, document))
            .await?;
        Ok(rpc::rpc_reply(&fields))
    }

    async fn validate(&self, source: Datastore) -> Result<RpcReply, SessionError> {
        let fields = self.rpc("validate", &rpc::validate(source)).await?;
        Ok(rpc::rpc_reply(&fields))
    }

    async fn commit(&self) -> Result<(), SessionError> {
        let fields = self.rpc("commit", rpc::COMMIT).await?;
        rpc::expect_ok(&fields, "commit")
    }

    async fn discard(&self) -> Result<(), SessionError> {
        let fields = self.rpc("discard-changes", rpc::DISCARD_CHANGES).await?;
        rpc::expect_ok(&fields, "discard-changes")
    }
}

/// Opens [`SshSession`]s from settings
#[derive(Debug, Clone)]
pub struct SshConnector {
    options: SshOptions,
}

impl SshConnector {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(SshOptions::from_settings(settings))
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Session = SshSession;

    async fn connect(&self) -> ncif_core::Result<SshSession> {
        SshSession::open(&self.options)
            .await
            .map_err(|err| NetconfError::from_session(&self.options.host, "connect", err))
    }

    async fn disconnect(&self, session: SshSession) -> Result<(), SessionError> {
        session.close().await
    }
}

fn collect_stderr(
    host: String,
    pipe: tokio::process::ChildStderr,
    sink: Arc<StdMutex<String>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("ssh {}: {}", host, line);
            if let Ok(mut text) = sink.lock() {
                text.push_str(&line);
                text.push('\n');
            }
        }
    })
}

fn read_stderr(stderr: &StdMutex<String>) -> String {
    stderr.lock().map(|text| text.clone()).unwrap_or_default()
}
