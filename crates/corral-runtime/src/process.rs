//! Child-process plumbing shared by every local and SSH-backed command path.

use crate::{ExecutionResult, RuntimeError};
use std::io::{ErrorKind, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const EXIT_DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Limits applied while a child runs.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Limits<'a> {
    pub timeout: Option<Duration>,
    pub prompt: Option<&'a str>,
}

/// Map an exit status to a single integer: the exit code, or `128 + signo`
/// when the process was killed by a signal.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R, tx: Sender<Vec<u8>>) {
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
    });
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|d| d.saturating_duration_since(Instant::now()))
}

fn poll_slice(deadline: Option<Instant>) -> Duration {
    remaining(deadline).map_or(EXIT_POLL_INTERVAL, |left| left.min(EXIT_POLL_INTERVAL))
}

/// Append `chunk` and report whether the prompt is now in the output.
fn push_chunk(output: &mut Vec<u8>, chunk: &[u8], prompt: Option<&str>) -> bool {
    output.extend_from_slice(chunk);
    prompt.is_some_and(|p| contains(output, p.as_bytes()))
}

/// Spawn `cmd`, capture stdout and stderr into one buffer as the bytes
/// arrive, and wait for it to finish.
///
/// A non-zero status is returned as data, not as an error. With a timeout the
/// child is killed once the deadline passes. With a prompt the command counts
/// as complete (status 0) as soon as the prompt text shows up in the output.
///
/// Completion follows the child's exit, not its pipes: background processes
/// that inherited stdout or stderr do not hold the command open.
pub(crate) fn run_captured(
    mut cmd: Command,
    label: &str,
    limits: Limits<'_>,
) -> Result<ExecutionResult, RuntimeError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| RuntimeError::Spawn {
        command: label.to_owned(),
        source,
    })?;

    let (tx, rx) = mpsc::channel();
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, tx);
    } else {
        drop(tx);
    }

    let deadline = limits.timeout.and_then(|t| Instant::now().checked_add(t));
    let timed_out = |child: &mut Child| {
        terminate(child);
        RuntimeError::Timeout {
            command: label.to_owned(),
            after: limits.timeout.unwrap_or_default(),
        }
    };
    let prompt_seen = |child: &mut Child, output: Vec<u8>| {
        debug!("prompt {:?} seen, ending '{label}'", limits.prompt.unwrap_or_default());
        terminate(child);
        ExecutionResult::new(0, output)
    };

    let mut output = Vec::new();
    let mut pipes_open = true;
    loop {
        if pipes_open {
            match rx.recv_timeout(poll_slice(deadline)) {
                Ok(chunk) => {
                    if push_chunk(&mut output, &chunk, limits.prompt) {
                        return Ok(prompt_seen(&mut child, output));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => pipes_open = false,
                Err(RecvTimeoutError::Timeout) => {}
            }
        } else {
            thread::sleep(poll_slice(deadline));
        }

        if let Some(status) = child.try_wait()? {
            // Pick up what the readers already have in flight.
            let grace = Instant::now() + EXIT_DRAIN_GRACE;
            while pipes_open {
                let left = grace.saturating_duration_since(Instant::now());
                match rx.recv_timeout(left) {
                    Ok(chunk) => {
                        if push_chunk(&mut output, &chunk, limits.prompt) {
                            return Ok(prompt_seen(&mut child, output));
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => pipes_open = false,
                    Err(RecvTimeoutError::Timeout) => break,
                }
            }
            if pipes_open {
                debug!("'{label}' exited while a background process still holds its output");
            }
            return Ok(ExecutionResult::new(exit_code(status), output));
        }
        if remaining(deadline).is_some_and(|left| left.is_zero()) {
            return Err(timed_out(&mut child));
        }
    }
}

/// Build a `sh -c <script>` command.
pub(crate) fn shell(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script);
    cmd
}
