//! Process transport: spawn the editor and hand its stdio to the session.
//!
//! Deliberately thin. The session never spawns processes itself; it consumes
//! already-connected stream halves, so embedding applications can substitute
//! sockets or in-memory pipes.

use std::io;
use std::process::Stdio;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info};

/// A spawned editor process with its stdio captured for the wire protocol.
pub struct EditorProcess {
    child: Child,
    stdout: ChildStdout,
    stdin: ChildStdin,
}

impl EditorProcess {
    /// Spawn `program` with `args`, stdio piped for framing. Stderr passes
    /// through so the editor's own diagnostics stay visible.
    pub fn spawn(program: &str, args: &[&str]) -> io::Result<Self> {
        info!(target: "session.transport", program, "spawning_editor");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("child stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout not captured"))?;
        Ok(Self {
            child,
            stdout,
            stdin,
        })
    }

    /// The duplex halves for `Session::attach`, plus the child handle for
    /// exit watching.
    pub fn into_parts(self) -> (ChildStdout, ChildStdin, Child) {
        (self.stdout, self.stdin, self.child)
    }
}

/// Await process exit; `None` when no conventional exit code is available
/// (killed by signal, or the wait itself failed).
pub async fn watch_exit(mut child: Child) -> Option<i32> {
    match child.wait().await {
        Ok(status) => {
            debug!(target: "session.transport", code = ?status.code(), "editor_exited");
            status.code()
        }
        Err(err) => {
            debug!(target: "session.transport", %err, "exit_wait_failed");
            None
        }
    }
}
