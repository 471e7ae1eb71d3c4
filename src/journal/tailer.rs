//! journalctl subprocess tailer
//!
//! Spawns `journalctl -f -o json` and exposes its stdout as a record
//! stream. The child is killed when the stream is dropped, so every follow
//! attempt owns exactly one subprocess.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

use super::{JournalTailer, Record, RecordStream, TailError};

const JOURNALCTL_ARGS: &[&str] = &["journalctl", "-f", "-o", "json"];

/// Tails the live journal by following `journalctl` output.
#[derive(Debug, Clone, Default)]
pub struct JournalctlTailer;

impl JournalctlTailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JournalTailer for JournalctlTailer {
    async fn follow(&self) -> Result<Box<dyn RecordStream>, TailError> {
        let mut child = Command::new(JOURNALCTL_ARGS[0])
            .args(&JOURNALCTL_ARGS[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TailError::Spawn(JOURNALCTL_ARGS.join(" "), e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("journalctl stdout not captured"))?;

        log::debug!("following journal (pid {:?})", child.id());

        Ok(Box::new(JournalStream {
            _child: child,
            lines: BufReader::new(stdout).lines(),
        }))
    }
}

struct JournalStream {
    // Held so the subprocess lives as long as the stream and is killed
    // with it on drop.
    _child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

#[async_trait]
impl RecordStream for JournalStream {
    async fn next_record(&mut self) -> Result<Option<Record>, TailError> {
        match self.lines.next_line().await? {
            Some(line) => Ok(Some(Record::parse(&line)?)),
            None => Ok(None),
        }
    }
}
