//! PTY Service
//! One pseudo-terminal-backed shell per terminal tab, keyed by the tab's id.
//!
//! Every session runs three threads: a reader forwarding output, a writer
//! draining queued input and a waiter reaping the process. Reader and waiter
//! feed a single event queue. A dispatcher thread drains it, forwards output
//! to the attached sink and removes sessions whose process has exited, so
//! per-session ordering holds and the session map is only touched under its
//! mutex, never across PTY I/O.

use parking_lot::{Mutex, RwLock};
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::environment;
use super::platform::Platform;
use super::shell::{self, ShellConfig};
use crate::error::{AppError, Result};

/// Time a hung-up session gets before its process group is killed outright.
#[cfg(unix)]
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Time output may keep flowing after the shell exited before the exit is
/// reported anyway (a background job can hold the terminal open).
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Display surface receiving session output.
pub trait OutputSink: Send + Sync + 'static {
    fn on_output(&self, id: &str, data: &str);

    /// Called exactly once per spawned session, after its last output.
    fn on_exit(&self, id: &str, exit_code: i32, signal: Option<i32>);
}

/// Inbound notifications from the per-session reader and waiter threads.
#[derive(Debug)]
enum SessionEvent {
    Output {
        id: String,
        generation: u64,
        data: String,
    },
    /// The reader hit EOF; no more output follows for this generation.
    OutputClosed { id: String, generation: u64 },
    ProcessExited {
        id: String,
        generation: u64,
        exit_code: i32,
        signal: Option<i32>,
    },
}

/// Result of [`SessionManager::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    Spawned,
    /// A live session already used this id; it was left untouched.
    AlreadyRunning,
}

/// How new sessions are spawned.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Shell to run instead of the platform's resolved shell.
    pub shell: Option<ShellConfig>,
    /// Working directory instead of the user's home directory.
    pub cwd: Option<PathBuf>,
    pub cols: u16,
    pub rows: u16,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            shell: None,
            cwd: None,
            cols: 80,
            rows: 24,
        }
    }
}

struct PtyInstance {
    generation: u64,
    master: Box<dyn MasterPty + Send>,
    input: Sender<String>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
    /// Set by the waiter once the shell has been reaped.
    reaped: Arc<AtomicBool>,
}

type SessionMap = Arc<Mutex<HashMap<String, PtyInstance>>>;
type SharedSink = Arc<RwLock<Option<Arc<dyn OutputSink>>>>;

pub struct SessionManager {
    sessions: SessionMap,
    sink: SharedSink,
    events: Sender<SessionEvent>,
    options: SessionOptions,
    next_generation: AtomicU64,
    shut_down: AtomicBool,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_options(SessionOptions::default())
    }

    pub fn with_options(options: SessionOptions) -> Self {
        let sessions: SessionMap = Arc::new(Mutex::new(HashMap::new()));
        let sink: SharedSink = Arc::new(RwLock::new(None));
        let (events, inbound) = mpsc::channel();

        let dispatcher = Dispatcher {
            sessions: sessions.clone(),
            sink: sink.clone(),
            tracked: HashMap::new(),
        };
        thread::spawn(move || dispatcher.run(inbound));

        Self {
            sessions,
            sink,
            events,
            options,
            next_generation: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Attach the display surface. Replaces any previous sink.
    pub fn set_sink(&self, sink: Arc<dyn OutputSink>) {
        *self.sink.write() = Some(sink);
    }

    /// Detach the display surface; events are dropped until a new one is set.
    pub fn clear_sink(&self) {
        *self.sink.write() = None;
    }

    /// Spawn a shell for `id`. A duplicate id is a no-op.
    ///
    /// Only failing to open the PTY or launch the shell is an error.
    pub fn create(&self, id: &str) -> Result<SpawnOutcome> {
        if self.sessions.lock().contains_key(id) {
            log::warn!("Terminal {} already exists", id);
            return Ok(SpawnOutcome::AlreadyRunning);
        }

        let platform = Platform::current();
        let env = environment::build(&environment::from_process(), platform);
        let shell = self
            .options
            .shell
            .clone()
            .unwrap_or_else(|| shell::resolve(platform, &env));
        let cwd = self
            .options
            .cwd
            .clone()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: self.options.rows,
                cols: self.options.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| AppError::OpenPty(e.to_string()))?;

        let mut cmd_builder = CommandBuilder::new(&shell.executable);
        cmd_builder.args(&shell.arguments);
        cmd_builder.cwd(&cwd);
        for (key, value) in &env {
            cmd_builder.env(key, value);
        }

        // Set environment variables for proper terminal
        cmd_builder.env("TERM", "xterm-256color");
        cmd_builder.env("COLORTERM", "truecolor");

        let mut child = pair
            .slave
            .spawn_command(cmd_builder)
            .map_err(|e| AppError::Spawn {
                shell: shell.executable.clone(),
                message: e.to_string(),
            })?;
        // The reader only sees EOF once no slave handle is left in this process
        drop(pair.slave);

        let mut killer = child.clone_killer();
        let streams = pair
            .master
            .try_clone_reader()
            .and_then(|reader| Ok((reader, pair.master.take_writer()?)));
        let (reader, writer) = match streams {
            Ok(streams) => streams,
            Err(e) => {
                let _ = killer.kill();
                let _ = child.wait();
                return Err(AppError::PtyIo(e.to_string()));
            }
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let pid = child.process_id();
        let reaped = Arc::new(AtomicBool::new(false));
        let (input, queued) = mpsc::channel();

        {
            let mut sessions = self.sessions.lock();
            if sessions.contains_key(id) {
                // Lost a race with a concurrent create for the same id
                drop(sessions);
                let _ = killer.kill();
                let _ = child.wait();
                log::warn!("Terminal {} already exists", id);
                return Ok(SpawnOutcome::AlreadyRunning);
            }
            sessions.insert(
                id.to_string(),
                PtyInstance {
                    generation,
                    master: pair.master,
                    input,
                    killer,
                    pid,
                    reaped: reaped.clone(),
                },
            );
        }

        // Registered before any thread starts so an instant exit still finds its entry
        let reader_id = id.to_string();
        let reader_events = self.events.clone();
        thread::spawn(move || pump(reader_id, generation, reader, reader_events));

        let writer_id = id.to_string();
        thread::spawn(move || feed(writer_id, writer, queued));

        let waiter_id = id.to_string();
        let waiter_events = self.events.clone();
        thread::spawn(move || reap(waiter_id, generation, child, reaped, waiter_events));

        log::info!(
            "Created terminal {} with shell {} {:?}",
            id,
            shell.executable,
            shell.arguments
        );
        Ok(SpawnOutcome::Spawned)
    }

    /// Queue raw input for the session. Missing sessions and write errors are logged only.
    pub fn write(&self, id: &str, data: &str) {
        let sessions = self.sessions.lock();
        let Some(instance) = sessions.get(id) else {
            log::warn!("Terminal {} not found for write operation", id);
            return;
        };

        if instance.input.send(data.to_string()).is_err() {
            log::error!("Error writing to terminal {}: input closed", id);
        }
    }

    /// Resize the session's terminal. Missing sessions are ignored.
    pub fn resize(&self, id: &str, cols: u16, rows: u16) {
        let sessions = self.sessions.lock();
        let Some(instance) = sessions.get(id) else {
            return;
        };

        let resized = instance.master.resize(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        });
        if let Err(e) = resized {
            log::error!("Error resizing terminal {}: {}", id, e);
        }
    }

    /// Terminate the session's process. The entry is removed even if termination fails.
    pub fn kill(&self, id: &str) {
        let removed = self.sessions.lock().remove(id);
        match removed {
            Some(instance) => {
                terminate(id, instance);
                log::info!("Killed terminal {}", id);
            }
            None => log::debug!("Terminal {} not found for kill", id),
        }
    }

    /// Terminate every live session and clear the map.
    pub fn kill_all(&self) {
        let drained: Vec<(String, PtyInstance)> = self.sessions.lock().drain().collect();
        let killed = drained.len();
        for (id, instance) in drained {
            terminate(&id, instance);
        }
        log::info!("Killed all terminals ({})", killed);
    }

    /// Process-wide teardown. Only the first call does anything.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("Shutting down - cleaning up PTY processes");
        self.kill_all();
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Ids of live sessions, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Exit bookkeeping for one spawned session.
struct Tracked {
    id: String,
    exited: Option<(i32, Option<i32>, Instant)>,
    output_closed: bool,
    reported: bool,
}

impl Tracked {
    fn new(id: String) -> Self {
        Self {
            id,
            exited: None,
            output_closed: false,
            reported: false,
        }
    }

    fn awaiting_report(&self) -> bool {
        !self.reported && self.exited.is_some()
    }
}

struct Dispatcher {
    sessions: SessionMap,
    sink: SharedSink,
    tracked: HashMap<u64, Tracked>,
}

impl Dispatcher {
    fn run(mut self, inbound: Receiver<SessionEvent>) {
        loop {
            let event = if self.tracked.values().any(Tracked::awaiting_report) {
                match inbound.recv_timeout(OUTPUT_DRAIN_GRACE) {
                    Ok(event) => Some(event),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match inbound.recv() {
                    Ok(event) => Some(event),
                    Err(_) => break,
                }
            };

            if let Some(event) = event {
                self.handle(event);
            }
            self.report_exits();
        }
        log::debug!("PTY dispatch loop finished");
    }

    fn sink(&self) -> Option<Arc<dyn OutputSink>> {
        self.sink.read().clone()
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Output {
                id,
                generation,
                data,
            } => {
                let tracked = self
                    .tracked
                    .entry(generation)
                    .or_insert_with(|| Tracked::new(id.clone()));
                // Output trailing a reported exit comes from a leftover background job
                if tracked.reported {
                    return;
                }
                if let Some(sink) = self.sink() {
                    sink.on_output(&id, &data);
                }
            }
            SessionEvent::OutputClosed { id, generation } => {
                self.tracked
                    .entry(generation)
                    .or_insert_with(|| Tracked::new(id))
                    .output_closed = true;
            }
            SessionEvent::ProcessExited {
                id,
                generation,
                exit_code,
                signal,
            } => {
                let removed = {
                    let mut sessions = self.sessions.lock();
                    // A killed session's exit must not evict a newer session with the same id
                    if sessions.get(&id).is_some_and(|s| s.generation == generation) {
                        sessions.remove(&id)
                    } else {
                        None
                    }
                };
                // Releasing the PTY lets a reader that would otherwise block reach EOF
                drop(removed);

                self.tracked
                    .entry(generation)
                    .or_insert_with(|| Tracked::new(id))
                    .exited = Some((exit_code, signal, Instant::now()));
            }
        }
    }

    /// Report exits whose output is drained or whose drain grace has passed.
    fn report_exits(&mut self) {
        let sink = self.sink();
        for tracked in self.tracked.values_mut() {
            let Some((exit_code, signal, at)) = tracked.exited else {
                continue;
            };
            if tracked.reported || !(tracked.output_closed || at.elapsed() >= OUTPUT_DRAIN_GRACE) {
                continue;
            }

            tracked.reported = true;
            log::info!(
                "Terminal {} exited with code {}, signal {:?}",
                tracked.id,
                exit_code,
                signal
            );
            if let Some(sink) = &sink {
                sink.on_exit(&tracked.id, exit_code, signal);
            }
        }
        self.tracked.retain(|_, t| !(t.reported && t.output_closed));
    }
}

/// Reader thread body: forward output until EOF.
fn pump(id: String, generation: u64, mut reader: Box<dyn Read + Send>, events: Sender<SessionEvent>) {
    let mut buf = [0u8; 8192];
    let mut carry = Vec::new();
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let data = decode_utf8_chunk(&mut carry, &buf[..n]);
                if data.is_empty() {
                    continue;
                }
                let sent = events.send(SessionEvent::Output {
                    id: id.clone(),
                    generation,
                    data,
                });
                if sent.is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    if !carry.is_empty() {
        let data = String::from_utf8_lossy(&carry).into_owned();
        let _ = events.send(SessionEvent::Output {
            id: id.clone(),
            generation,
            data,
        });
    }
    let _ = events.send(SessionEvent::OutputClosed { id, generation });
}

/// Writer thread body: drain queued input until the session is dropped.
fn feed(id: String, mut writer: Box<dyn Write + Send>, queued: Receiver<String>) {
    for data in queued {
        let written = writer
            .write_all(data.as_bytes())
            .and_then(|_| writer.flush());
        if let Err(e) = written {
            log::error!("Error writing to terminal {}: {}", id, e);
        }
    }
}

/// Waiter thread body: reap the shell and report how it ended.
fn reap(
    id: String,
    generation: u64,
    mut child: Box<dyn Child + Send + Sync>,
    reaped: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
) {
    let (exit_code, signal) = match child.wait() {
        Ok(status) => (
            status.exit_code() as i32,
            signal_from_status(&status.to_string()),
        ),
        Err(e) => {
            log::warn!("Failed to wait for terminal {}: {}", id, e);
            (-1, None)
        }
    };
    reaped.store(true, Ordering::SeqCst);
    let _ = events.send(SessionEvent::ProcessExited {
        id,
        generation,
        exit_code,
        signal,
    });
}

/// Terminate a session's process group and release its PTY.
fn terminate(id: &str, instance: PtyInstance) {
    let PtyInstance {
        master,
        input,
        mut killer,
        pid,
        reaped,
        ..
    } = instance;

    #[cfg(unix)]
    let hung_up = signal_process_group(pid, libc::SIGHUP);
    #[cfg(not(unix))]
    let hung_up = false;

    if !hung_up {
        if let Err(e) = killer.kill() {
            log::warn!("Error killing terminal {}: {}", id, e);
        }
    }

    // Dropping the master closes the PTY; the reader thread then sees EOF
    drop(input);
    drop(master);

    #[cfg(unix)]
    escalate(id.to_string(), pid, reaped);
    #[cfg(not(unix))]
    drop((pid, reaped));
}

/// SIGKILL the process group if the shell outlives the grace period after a hangup.
#[cfg(unix)]
fn escalate(id: String, pid: Option<u32>, reaped: Arc<AtomicBool>) {
    if pid.is_none() {
        return;
    }
    thread::spawn(move || {
        thread::sleep(KILL_GRACE);
        if reaped.load(Ordering::SeqCst) {
            return;
        }
        log::warn!("Terminal {} ignored hangup, killing process group", id);
        signal_process_group(pid, libc::SIGKILL);
    });
}

/// Signal the shell's whole process group.
#[cfg(unix)]
fn signal_process_group(pid: Option<u32>, signal: libc::c_int) -> bool {
    let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety requirements. The shell leads its
    // own session, so the negative pid addresses its whole process group.
    unsafe { libc::kill(-pid, signal) == 0 }
}

/// Decode PTY bytes, holding back a multi-byte character split across reads.
fn decode_utf8_chunk(carry: &mut Vec<u8>, chunk: &[u8]) -> String {
    carry.extend_from_slice(chunk);

    let checked = std::str::from_utf8(carry)
        .map(|_| ())
        .map_err(|e| (e.valid_up_to(), e.error_len()));
    let valid = match checked {
        Ok(()) => carry.len(),
        // Incomplete sequence at the end: keep it for the next read
        Err((valid_up_to, None)) => valid_up_to,
        Err((_, Some(_))) => {
            let data = String::from_utf8_lossy(carry).into_owned();
            carry.clear();
            return data;
        }
    };

    let data = String::from_utf8_lossy(&carry[..valid]).into_owned();
    carry.drain(..valid);
    data
}

/// Terminating signal from portable-pty's status text ("Terminated by Hangup").
fn signal_from_status(status: &str) -> Option<i32> {
    status
        .strip_prefix("Terminated by ")
        .and_then(signal_number)
}

/// Signal number from its description: "Hangup", "Killed: 9", "SIGTERM", "Signal 15".
fn signal_number(signal: &str) -> Option<i32> {
    let signal = signal.trim();
    // macOS descriptions carry the number ("Terminated: 15")
    if let Some((_, number)) = signal.rsplit_once(':') {
        if let Ok(number) = number.trim().parse::<i32>() {
            return Some(number);
        }
    }
    let bare = signal
        .trim_start_matches("Signal ")
        .trim_start_matches("SIG");
    if let Ok(number) = bare.parse::<i32>() {
        return Some(number);
    }
    let number = match bare.to_ascii_lowercase().as_str() {
        "hangup" | "hup" => 1,
        "interrupt" | "int" => 2,
        "quit" => 3,
        "aborted" | "abort trap" | "abrt" => 6,
        "killed" | "kill" => 9,
        "segmentation fault" | "segv" => 11,
        "broken pipe" | "pipe" => 13,
        "terminated" | "term" => 15,
        _ => return None,
    };
    Some(number)
}
