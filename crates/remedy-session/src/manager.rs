//! Session manager: spawns tool processes, streams their output, continues
//! conversations and persists finished sessions.
//!
//! Each session holds at most one live process. A per-session turn lock
//! serializes `start` and `send_input`, so a second input waits for the
//! continuation process started by the first one to exit before it spawns.

use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use remedy_core::metrics::METRICS;
use remedy_core::SessionsConfig;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::buffer::{OutputBuffer, OutputChunk, Stream};
use crate::error::{Result, SessionError};
use crate::model::{SessionEvent, SessionRecord, SessionStatus, Turn};
use crate::profile::{Invocation, ProfileRegistry};
use crate::store::{FsSessionStore, MemorySessionStore, SessionStore};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const READ_CHUNK_BYTES: usize = 8192;
/// How long to keep draining pipes after the process exits. Grandchildren
/// that inherited the pipes can otherwise hold them open indefinitely.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Parameters for [`SessionManager::start`].
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    pub profile: String,
    pub prompt: String,
    pub change_id: Option<String>,
    pub model: Option<String>,
    pub extra_args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl StartRequest {
    pub fn new(profile: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

struct SessionState {
    record: SessionRecord,
    buffer: OutputBuffer,
    /// Output of the current process, flushed into an assistant turn on exit.
    pending: String,
    pid: Option<u32>,
    stop_requested: bool,
    /// Reloaded from the store; queryable but never respawned.
    archived: bool,
}

struct SessionHandle {
    state: Mutex<SessionState>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    turn: tokio::sync::Mutex<()>,
    live: watch::Sender<bool>,
}

impl SessionHandle {
    fn new(record: SessionRecord, buffer_chunks: usize, archived: bool) -> Self {
        let (live, _) = watch::channel(false);
        Self {
            state: Mutex::new(SessionState {
                record,
                buffer: OutputBuffer::new(buffer_chunks),
                pending: String::new(),
                pid: None,
                stop_requested: false,
                archived,
            }),
            stdin: tokio::sync::Mutex::new(None),
            turn: tokio::sync::Mutex::new(()),
            live,
        }
    }

    fn id(&self) -> String {
        self.state.lock().unwrap().record.id.clone()
    }

    async fn wait_until_exited(&self) {
        let mut live = self.live.subscribe();
        // The sender lives as long as the handle, so this only ends on exit.
        let _ = live.wait_for(|running| !*running).await;
    }

    fn push_user_turn(&self, text: &str) {
        let mut state = self.state.lock().unwrap();
        state.record.history.push(Turn::user(text));
        state.record.updated_at = Utc::now();
    }
}

/// Registry of tool sessions.
pub struct SessionManager {
    profiles: ProfileRegistry,
    store: Arc<dyn SessionStore>,
    config: SessionsConfig,
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(
        profiles: ProfileRegistry,
        store: Arc<dyn SessionStore>,
        config: SessionsConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            profiles,
            store,
            config,
            sessions: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Built-in profiles with the store selected by `config.store_dir`.
    pub fn from_config(config: &SessionsConfig) -> Self {
        let store: Arc<dyn SessionStore> = match &config.store_dir {
            Some(dir) => Arc::new(FsSessionStore::new(dir.clone())),
            None => Arc::new(MemorySessionStore::new()),
        };
        Self::new(ProfileRegistry::builtin(), store, config.clone())
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Reload persisted sessions as archived entries. Returns how many were
    /// added; ids already known to this manager are left alone.
    pub async fn load(&self) -> Result<usize> {
        let records = self.store.load_all().await?;
        let mut sessions = self.sessions.lock().unwrap();
        let mut loaded = 0;
        for mut record in records {
            if sessions.contains_key(&record.id) {
                continue;
            }
            if !record.status.is_terminal() {
                record.status = SessionStatus::Failed;
                record.message = Some("interrupted before the process exited".to_string());
            }
            let id = record.id.clone();
            sessions.insert(
                id,
                Arc::new(SessionHandle::new(record, self.config.output_buffer_chunks, true)),
            );
            loaded += 1;
        }
        debug!(loaded, "reloaded archived sessions");
        Ok(loaded)
    }

    /// Start a session with one process running `request.prompt`.
    pub async fn start(&self, request: StartRequest) -> Result<String> {
        let profile = self.profiles.get(&request.profile)?.clone();
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let record = SessionRecord {
            id: id.clone(),
            profile_id: profile.id.clone(),
            change_id: request.change_id.clone(),
            model: request.model.clone(),
            extra_args: request.extra_args.clone(),
            cwd: request.cwd.clone(),
            status: SessionStatus::Starting,
            message: None,
            exit_code: None,
            spawn_count: 0,
            history: vec![Turn::user(&request.prompt)],
            created_at: now,
            updated_at: now,
        };

        let handle = Arc::new(SessionHandle::new(
            record,
            self.config.output_buffer_chunks,
            false,
        ));
        self.sessions
            .lock()
            .unwrap()
            .insert(id.clone(), handle.clone());
        self.publish(SessionEvent::Status {
            session_id: id.clone(),
            status: SessionStatus::Starting,
        });

        let _turn = handle.turn.lock().await;
        let invocation = profile.invocation(
            &request.prompt,
            request.model.as_deref(),
            &request.extra_args,
            false,
        );
        self.launch(&handle, invocation, request.cwd.clone()).await?;
        info!(session_id = %id, profile = %profile.id, "session started");
        Ok(id)
    }

    /// Send follow-up input. Live-stdin tools receive it on their open
    /// stdin; others are re-spawned with their continue arguments once the
    /// current process has exited.
    pub async fn send_input(&self, session_id: &str, text: &str) -> Result<()> {
        let handle = self.handle(session_id)?;
        let (profile_id, model, extra_args, cwd) = {
            let state = handle.state.lock().unwrap();
            if state.archived {
                return Err(SessionError::Archived(session_id.to_string()));
            }
            let r = &state.record;
            (r.profile_id.clone(), r.model.clone(), r.extra_args.clone(), r.cwd.clone())
        };
        let profile = self.profiles.get(&profile_id)?.clone();

        let _turn = handle.turn.lock().await;

        if profile.live_stdin {
            let mut stdin = handle.stdin.lock().await;
            let running = *handle.live.borrow();
            if let Some(pipe) = stdin.as_mut().filter(|_| running) {
                match write_line(pipe, text).await {
                    Ok(()) => {
                        handle.push_user_turn(text);
                        return Ok(());
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                        debug!(session_id, "stdin closed by the process");
                        *stdin = None;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if profile.continue_args.is_empty() {
            return Err(SessionError::NoContinuation(profile.id.clone()));
        }

        handle.wait_until_exited().await;
        handle.push_user_turn(text);
        let invocation = profile.invocation(text, model.as_deref(), &extra_args, true);
        self.launch(&handle, invocation, cwd).await
    }

    /// Stop the live process. `force` kills immediately; otherwise SIGTERM
    /// is sent and SIGKILL follows after the configured grace period.
    pub async fn stop(&self, session_id: &str, force: bool) -> Result<()> {
        let handle = self.handle(session_id)?;
        let pid = {
            let mut state = handle.state.lock().unwrap();
            let pid = state
                .pid
                .ok_or_else(|| SessionError::NotRunning(session_id.to_string()))?;
            state.stop_requested = true;
            pid
        };
        let target = Pid::from_raw(pid as i32);

        if force {
            info!(session_id, pid, "killing session process");
            return send_signal(target, Signal::SIGKILL);
        }

        info!(session_id, pid, "terminating session process");
        send_signal(target, Signal::SIGTERM)?;

        let grace = Duration::from_secs(self.config.stop_grace_secs);
        let mut live = handle.live.subscribe();
        let watched = handle.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = live.wait_for(|running| !*running) => {}
                _ = tokio::time::sleep(grace) => {
                    let still_running = watched.state.lock().unwrap().pid == Some(pid);
                    if still_running {
                        warn!(pid, grace_secs = grace.as_secs(), "process ignored SIGTERM, killing");
                        let _ = kill(target, Signal::SIGKILL);
                    }
                }
            }
        });
        Ok(())
    }

    /// Buffered output with `seq > since`. Never consumes anything.
    pub fn get_output(&self, session_id: &str, since: Option<u64>) -> Result<Vec<OutputChunk>> {
        let handle = self.handle(session_id)?;
        let state = handle.state.lock().unwrap();
        Ok(state.buffer.since(since))
    }

    pub fn get_session(&self, session_id: &str) -> Result<SessionRecord> {
        let handle = self.handle(session_id)?;
        let state = handle.state.lock().unwrap();
        Ok(state.record.clone())
    }

    /// Every known session, oldest first.
    pub fn list_sessions(&self) -> Vec<SessionRecord> {
        let handles: Vec<Arc<SessionHandle>> =
            self.sessions.lock().unwrap().values().cloned().collect();
        let mut records: Vec<SessionRecord> = handles
            .iter()
            .map(|h| h.state.lock().unwrap().record.clone())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    pub fn history(&self, session_id: &str) -> Result<Vec<Turn>> {
        Ok(self.get_session(session_id)?.history)
    }

    pub fn is_archived(&self, session_id: &str) -> Result<bool> {
        let handle = self.handle(session_id)?;
        let archived = handle.state.lock().unwrap().archived;
        Ok(archived)
    }

    /// Wait until no process is live for the session and return its record.
    pub async fn wait_for_exit(&self, session_id: &str) -> Result<SessionRecord> {
        let handle = self.handle(session_id)?;
        handle.wait_until_exited().await;
        self.get_session(session_id)
    }

    fn handle(&self, session_id: &str) -> Result<Arc<SessionHandle>> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Spawn one process for the session and hand it to a supervisor task.
    /// Caller holds the session's turn lock.
    async fn launch(
        &self,
        handle: &Arc<SessionHandle>,
        invocation: Invocation,
        cwd: Option<PathBuf>,
    ) -> Result<()> {
        let session_id = handle.id();
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if invocation.stdin.is_some() || invocation.keep_stdin_open {
            command.stdin(Stdio::piped());
        } else {
            command.stdin(Stdio::null());
        }
        if let Some(dir) = &cwd {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let reason = e.to_string();
                warn!(session_id = %session_id, program = %invocation.program, error = %reason, "spawn failed");
                let record = {
                    let mut state = handle.state.lock().unwrap();
                    state.record.status = SessionStatus::Failed;
                    state.record.message = Some(format!("spawn failed: {reason}"));
                    state.record.updated_at = Utc::now();
                    state.record.clone()
                };
                if let Err(e) = self.store.save(&record).await {
                    warn!(session_id = %session_id, error = %e, "failed to persist session");
                }
                self.publish(SessionEvent::Status {
                    session_id: session_id.clone(),
                    status: SessionStatus::Failed,
                });
                self.publish(SessionEvent::Ended {
                    session_id,
                    status: SessionStatus::Failed,
                    message: record.message,
                });
                return Err(SessionError::Spawn {
                    program: invocation.program,
                    reason,
                });
            }
        };

        METRICS.inc_sessions_spawned();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        {
            let mut state = handle.state.lock().unwrap();
            state.pid = child.id();
            state.stop_requested = false;
            state.pending.clear();
            state.record.status = SessionStatus::Running;
            state.record.message = None;
            state.record.exit_code = None;
            state.record.spawn_count += 1;
            state.record.updated_at = Utc::now();
        }
        handle.live.send_replace(true);
        self.publish(SessionEvent::Status {
            session_id: session_id.clone(),
            status: SessionStatus::Running,
        });

        let readers: Vec<JoinHandle<()>> = [
            stdout.map(|pipe| self.spawn_reader(handle.clone(), Stream::Stdout, pipe)),
            stderr.map(|pipe| self.spawn_reader(handle.clone(), Stream::Stderr, pipe)),
        ]
        .into_iter()
        .flatten()
        .collect();

        // Stored before the supervisor starts, which clears it on exit.
        *handle.stdin.lock().await = child.stdin.take();

        let span = tracing::info_span!("remedy.session", session_id = %session_id);
        tokio::spawn(
            supervise(
                child,
                readers,
                handle.clone(),
                self.store.clone(),
                self.events.clone(),
            )
            .instrument(span),
        );

        let mut stdin = handle.stdin.lock().await;
        if let (Some(prompt), Some(pipe)) = (&invocation.stdin, stdin.as_mut()) {
            if let Err(e) = pipe.write_all(prompt.as_bytes()).await {
                warn!(session_id = %session_id, error = %e, "failed to write prompt to stdin");
            } else if let Err(e) = pipe.flush().await {
                warn!(session_id = %session_id, error = %e, "failed to flush stdin");
            }
        }
        if !invocation.keep_stdin_open {
            *stdin = None;
        }
        Ok(())
    }

    fn spawn_reader<R>(&self, handle: Arc<SessionHandle>, stream: Stream, pipe: R) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(read_pipe(handle, stream, pipe, events))
    }
}

async fn write_line(pipe: &mut ChildStdin, text: &str) -> std::io::Result<()> {
    pipe.write_all(text.as_bytes()).await?;
    if !text.ends_with('\n') {
        pipe.write_all(b"\n").await?;
    }
    pipe.flush().await
}

fn send_signal(target: Pid, signal: Signal) -> Result<()> {
    match kill(target, signal) {
        // Already gone; the supervisor records the exit.
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(SessionError::Signal(format!("{signal} to {target}: {e}"))),
    }
}

async fn read_pipe<R>(
    handle: Arc<SessionHandle>,
    stream: Stream,
    mut pipe: R,
    events: broadcast::Sender<SessionEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let n = match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(?stream, error = %e, "pipe read failed");
                break;
            }
        };
        let data = String::from_utf8_lossy(&buf[..n]).into_owned();
        {
            let mut state = handle.state.lock().unwrap();
            state.pending.push_str(&data);
            let chunk = state.buffer.push(stream, data);
            // Sent under the lock so subscribers see chunks in `seq` order.
            let _ = events.send(SessionEvent::Output {
                session_id: state.record.id.clone(),
                chunk,
            });
        }
    }
}

/// Wait for the process, drain its pipes, then record the terminal state.
async fn supervise(
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    handle: Arc<SessionHandle>,
    store: Arc<dyn SessionStore>,
    events: broadcast::Sender<SessionEvent>,
) {
    let exit = child.wait().await;
    for reader in readers {
        let abort = reader.abort_handle();
        if tokio::time::timeout(PIPE_DRAIN_TIMEOUT, reader).await.is_err() {
            debug!("pipe still open after exit, abandoning reader");
            abort.abort();
        }
    }

    let record = {
        let mut state = handle.state.lock().unwrap();
        let (status, message, exit_code) = terminal_status(&exit, state.stop_requested);
        let output = std::mem::take(&mut state.pending);
        if !output.trim().is_empty() {
            state.record.history.push(Turn::assistant(output));
        }
        state.pid = None;
        state.stop_requested = false;
        state.record.status = status;
        state.record.message = message;
        state.record.exit_code = exit_code;
        state.record.updated_at = Utc::now();
        state.record.clone()
    };
    *handle.stdin.lock().await = None;

    if let Err(e) = store.save(&record).await {
        warn!(error = %e, "failed to persist session");
    }
    info!(status = ?record.status, exit_code = ?record.exit_code, "session process exited");

    let _ = events.send(SessionEvent::Status {
        session_id: record.id.clone(),
        status: record.status,
    });
    let _ = events.send(SessionEvent::Ended {
        session_id: record.id.clone(),
        status: record.status,
        message: record.message.clone(),
    });
    handle.live.send_replace(false);
}

fn terminal_status(
    exit: &std::io::Result<ExitStatus>,
    stop_requested: bool,
) -> (SessionStatus, Option<String>, Option<i32>) {
    match exit {
        Ok(status) if stop_requested => (
            SessionStatus::Stopped,
            Some("stopped on request".to_string()),
            status.code(),
        ),
        Ok(status) if status.success() => (SessionStatus::Completed, None, Some(0)),
        Ok(status) => match (status.code(), status.signal()) {
            (Some(code), _) => (
                SessionStatus::Failed,
                Some(format!("exited with code {code}")),
                Some(code),
            ),
            (None, Some(signal)) => {
                let name = Signal::try_from(signal)
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_else(|_| signal.to_string());
                (
                    SessionStatus::Failed,
                    Some(format!("terminated by signal {name}")),
                    None,
                )
            }
            (None, None) => (SessionStatus::Failed, Some("exited abnormally".to_string()), None),
        },
        Err(e) => (SessionStatus::Failed, Some(format!("wait failed: {e}")), None),
    }
}
