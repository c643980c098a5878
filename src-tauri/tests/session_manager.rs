#![cfg(unix)]

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use podpanel_lib::services::shell::ShellConfig;
use podpanel_lib::services::{OutputSink, SessionManager, SessionOptions, SpawnOutcome};

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
enum Event {
    Output(String, String),
    Exit(String, i32, Option<i32>),
}

struct ChannelSink(Sender<Event>);

impl OutputSink for ChannelSink {
    fn on_output(&self, id: &str, data: &str) {
        let _ = self.0.send(Event::Output(id.to_string(), data.to_string()));
    }

    fn on_exit(&self, id: &str, exit_code: i32, signal: Option<i32>) {
        let _ = self.0.send(Event::Exit(id.to_string(), exit_code, signal));
    }
}

fn channel_sink() -> (Arc<ChannelSink>, Receiver<Event>) {
    let (tx, rx) = mpsc::channel();
    (Arc::new(ChannelSink(tx)), rx)
}

fn manager_running(shell: ShellConfig) -> (SessionManager, Receiver<Event>) {
    let manager = SessionManager::with_options(SessionOptions {
        shell: Some(shell),
        cwd: Some(std::env::temp_dir()),
        ..Default::default()
    });
    let (sink, rx) = channel_sink();
    manager.set_sink(sink);
    (manager, rx)
}

fn manager() -> (SessionManager, Receiver<Event>) {
    manager_running(ShellConfig::new("/bin/sh", &[]))
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

fn wait_for_output(rx: &Receiver<Event>, id: &str, needle: &str) -> String {
    let deadline = Instant::now() + TIMEOUT;
    let mut seen = String::new();
    while !seen.contains(needle) {
        match rx.recv_timeout(remaining(deadline)) {
            Ok(Event::Output(from, data)) if from == id => seen.push_str(&data),
            Ok(_) => {}
            Err(_) => panic!("no {:?} from {} within timeout, got {:?}", needle, id, seen),
        }
    }
    seen
}

/// Output per id, gathered until every id has printed its marker.
fn collect_until(rx: &Receiver<Event>, markers: &[(&str, &str)]) -> HashMap<String, String> {
    let deadline = Instant::now() + TIMEOUT;
    let mut seen: HashMap<String, String> = HashMap::new();
    let done = |seen: &HashMap<String, String>| {
        markers
            .iter()
            .all(|(id, marker)| seen.get(*id).is_some_and(|out| out.contains(marker)))
    };
    while !done(&seen) {
        match rx.recv_timeout(remaining(deadline)) {
            Ok(Event::Output(from, data)) => seen.entry(from).or_default().push_str(&data),
            Ok(_) => {}
            Err(_) => panic!("markers {:?} not all seen within timeout", markers),
        }
    }
    seen
}

fn wait_for_exit(rx: &Receiver<Event>, id: &str) -> i32 {
    wait_for_exit_status(rx, id).0
}

fn wait_for_exit_status(rx: &Receiver<Event>, id: &str) -> (i32, Option<i32>) {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        match rx.recv_timeout(remaining(deadline)) {
            Ok(Event::Exit(from, code, signal)) if from == id => return (code, signal),
            Ok(_) => {}
            Err(_) => panic!("{} did not exit within timeout", id),
        }
    }
}

#[test]
fn duplicate_create_keeps_the_running_session() {
    let (manager, _rx) = manager();
    assert_eq!(manager.create("t1").unwrap(), SpawnOutcome::Spawned);
    assert_eq!(manager.create("t1").unwrap(), SpawnOutcome::AlreadyRunning);
    assert_eq!(manager.count(), 1);
    assert_eq!(manager.ids(), vec!["t1".to_string()]);
}

#[test]
fn input_reaches_the_shell_and_output_comes_back() {
    let (manager, rx) = manager();
    manager.create("t1").unwrap();
    manager.write("t1", "echo $((40+2))\n");
    wait_for_output(&rx, "t1", "42");
}

#[test]
fn exited_shell_is_removed_and_id_can_be_reused() {
    let (manager, rx) = manager();
    manager.create("t1").unwrap();
    manager.write("t1", "exit 3\n");

    assert_eq!(wait_for_exit_status(&rx, "t1"), (3, None));
    assert_eq!(manager.count(), 0);

    assert_eq!(manager.create("t1").unwrap(), SpawnOutcome::Spawned);
    assert_eq!(manager.count(), 1);
}

#[test]
fn exit_of_killed_session_does_not_remove_its_replacement() {
    let (manager, rx) = manager();
    manager.create("t1").unwrap();
    manager.kill("t1");
    assert_eq!(manager.count(), 0);

    manager.create("t1").unwrap();
    wait_for_exit(&rx, "t1");
    assert_eq!(manager.count(), 1);

    manager.write("t1", "echo still-here\n");
    wait_for_output(&rx, "t1", "still-here");
}

#[test]
fn resize_of_live_session_is_accepted() {
    let (manager, rx) = manager();
    manager.create("t1").unwrap();
    manager.resize("t1", 132, 43);
    manager.write("t1", "stty size\n");
    wait_for_output(&rx, "t1", "43 132");
}

#[test]
fn kill_all_empties_the_map() {
    let (manager, rx) = manager();
    manager.create("a").unwrap();
    manager.create("b").unwrap();
    assert_eq!(manager.count(), 2);

    manager.kill_all();
    assert_eq!(manager.count(), 0);
    wait_for_exit(&rx, "a");
    wait_for_exit(&rx, "b");
    assert_eq!(manager.count(), 0);
}

#[test]
fn missing_sessions_are_ignored() {
    let (manager, _rx) = manager();
    manager.create("t1").unwrap();
    manager.write("missing", "ls\n");
    manager.resize("missing", 100, 30);
    manager.kill("missing");
    assert_eq!(manager.ids(), vec!["t1".to_string()]);
}

#[test]
fn unknown_shell_is_a_spawn_error() {
    let manager = SessionManager::with_options(SessionOptions {
        shell: Some(ShellConfig::new("/nonexistent/shell", &[])),
        ..Default::default()
    });
    assert!(matches!(
        manager.create("t1"),
        Err(podpanel_lib::AppError::Spawn { .. })
    ));
    assert_eq!(manager.count(), 0);
}

#[test]
fn killed_shell_reports_hangup_signal() {
    let (manager, rx) = manager();
    manager.create("t1").unwrap();
    manager.kill("t1");
    assert_eq!(manager.count(), 0);

    let (_, signal) = wait_for_exit_status(&rx, "t1");
    assert_eq!(signal, Some(1));
}

#[test]
fn shell_ignoring_hangup_is_killed_after_grace() {
    let (manager, rx) = manager_running(ShellConfig::new(
        "/bin/sh",
        &["-c", "trap '' HUP; sleep 15"],
    ));
    manager.create("t1").unwrap();
    thread::sleep(Duration::from_millis(200));
    manager.kill("t1");

    let (_, signal) = wait_for_exit_status(&rx, "t1");
    assert_eq!(signal, Some(9));
}

#[test]
fn stalled_input_does_not_block_other_calls() {
    let (manager, rx) = manager_running(ShellConfig::new("/bin/sh", &["-c", "sleep 20"]));
    manager.create("stalled").unwrap();
    manager.create("t2").unwrap();

    let started = Instant::now();
    // Far more than the PTY buffers while nothing reads stdin
    manager.write("stalled", &"x".repeat(2 * 1024 * 1024));
    manager.write("stalled", "more\n");
    assert_eq!(manager.count(), 2);
    manager.resize("t2", 100, 30);
    assert!(started.elapsed() < Duration::from_secs(2));

    manager.kill("stalled");
    wait_for_exit(&rx, "stalled");
    assert_eq!(manager.ids(), vec!["t2".to_string()]);
}

#[test]
fn cleared_sink_drops_events_and_session_keeps_running() {
    let (manager, old_rx) = manager();
    manager.create("t1").unwrap();
    manager.clear_sink();

    manager.write("t1", "echo dropped-$((1+1))\n");
    thread::sleep(Duration::from_millis(500));
    assert!(old_rx
        .try_iter()
        .all(|e| !matches!(e, Event::Output(_, ref data) if data.contains("dropped-2"))));

    let (sink, rx) = channel_sink();
    manager.set_sink(sink);
    manager.write("t1", "echo back-$((6*7))\n");
    wait_for_output(&rx, "t1", "back-42");
    assert_eq!(manager.count(), 1);
}

fn numbered_lines(output: &str, prefix: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix(prefix)?.parse().ok())
        .collect()
}

#[test]
fn concurrent_sessions_keep_their_own_output_order() {
    let (manager, rx) = manager();
    manager.create("a").unwrap();
    manager.create("b").unwrap();

    for id in ["a", "b"] {
        manager.write(
            id,
            &format!(
                "i=0; while [ $i -lt 300 ]; do echo {id}-$i; i=$((i+1)); done; echo fin-$((6*7))\n"
            ),
        );
    }

    let seen = collect_until(&rx, &[("a", "fin-42"), ("b", "fin-42")]);
    let expected: Vec<u32> = (0..300).collect();
    assert_eq!(numbered_lines(&seen["a"], "a-"), expected);
    assert_eq!(numbered_lines(&seen["b"], "b-"), expected);
}
