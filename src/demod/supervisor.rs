//! External decoder process supervision
//!
//! Spawns the capture program piped into multimon-ng and runs a reader
//! thread that turns the decoder's output into frame announcements.

use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdout, Stdio};
use std::thread::{self, JoinHandle};
use tracing::Span;

use crate::constants::FRAME_ANNOUNCEMENT;
use crate::demod::command::{CommandSpec, DecoderSource};
use crate::error::ProcessError;
use crate::shutdown::StopFlag;

/// Owns the child processes and the reader thread
pub struct Supervisor {
    /// Feeds the decoder's stdin; `None` leaves stdin closed
    capture: Option<CommandSpec>,

    decoder: CommandSpec,

    /// Capture process first, decoder last
    children: Vec<(String, Child)>,

    stop: StopFlag,

    thread_handle: Option<JoinHandle<()>>,
}

impl Supervisor {
    /// Run the stock commands for `source`
    pub fn new(source: &DecoderSource) -> Self {
        Self::with_commands(source.capture_command(), source.decoder_command())
    }

    /// Run arbitrary capture and decoder programs
    pub fn with_commands(capture: Option<CommandSpec>, decoder: CommandSpec) -> Self {
        Self {
            capture,
            decoder,
            children: Vec::new(),
            stop: StopFlag::new(),
            thread_handle: None,
        }
    }

    /// Spawn the processes and start reading.
    ///
    /// `handler` receives the frame text of every announced frame, on the
    /// reader thread, inside `span`.
    pub fn start<F>(&mut self, handler: F, span: Span) -> Result<(), ProcessError>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        if self.thread_handle.is_some() {
            return Err(ProcessError::AlreadyRunning);
        }

        let decoder_stdin = match self.capture.clone() {
            Some(capture) => {
                let mut child = spawn(&capture, Stdio::null())?;
                tracing::info!("Started {}", capture);
                let stdout = child.stdout.take();
                self.children.push((capture.program.clone(), child));
                match stdout {
                    Some(stdout) => Stdio::from(stdout),
                    None => {
                        self.kill_children();
                        return Err(ProcessError::MissingPipe(capture.program));
                    }
                }
            }
            None => Stdio::null(),
        };

        let decoder = self.decoder.clone();
        let mut child = match spawn(&decoder, decoder_stdin) {
            Ok(child) => child,
            Err(e) => {
                self.kill_children();
                return Err(e);
            }
        };
        tracing::info!("Started {}", decoder);

        let stdout = child.stdout.take();
        self.children.push((decoder.program.clone(), child));
        let stdout = match stdout {
            Some(stdout) => stdout,
            None => {
                self.kill_children();
                return Err(ProcessError::MissingPipe(decoder.program));
            }
        };

        self.stop = StopFlag::new();
        let stop = self.stop.clone();
        let handle = thread::Builder::new()
            .name("igate-decoder".into())
            .spawn(move || {
                let _enter = span.enter();
                run_reader(stdout, &stop, handler);
            });

        match handle {
            Ok(handle) => {
                self.thread_handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.kill_children();
                Err(ProcessError::Spawn {
                    program: "reader thread".into(),
                    reason: e.to_string(),
                })
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Terminate the children and wait for the reader thread
    pub fn stop(&mut self) {
        self.stop.stop();
        self.kill_children();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    fn kill_children(&mut self) {
        while let Some((program, mut child)) = self.children.pop() {
            if let Err(e) = child.kill() {
                tracing::debug!("Could not kill {}: {}", program, e);
            }
            if let Err(e) = child.wait() {
                tracing::debug!("Could not reap {}: {}", program, e);
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn(spec: &CommandSpec, stdin: Stdio) -> Result<Child, ProcessError> {
    spec.to_command()
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ProcessError::Spawn {
            program: spec.program.clone(),
            reason: e.to_string(),
        })
}

fn run_reader<F: FnMut(&[u8])>(stdout: ChildStdout, stop: &StopFlag, handler: F) {
    let lines = read_announcements(BufReader::new(stdout), stop, handler);
    if stop.is_running() {
        tracing::warn!("Decoder output ended after {} lines", lines);
    }
    tracing::debug!("Decoder thread exit");
}

/// Feed every announced frame in `reader` to `handler`.
///
/// Returns the number of lines read once the input ends or `stop` is set.
pub fn read_announcements<R, F>(mut reader: R, stop: &StopFlag, mut handler: F) -> usize
where
    R: BufRead,
    F: FnMut(&[u8]),
{
    let mut line = Vec::new();
    let mut count = 0;

    while stop.is_running() {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                count += 1;
                if let Some(frame) = extract_frame(&line) {
                    handler(frame);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("Error reading decoder output: {}", e);
                break;
            }
        }
    }
    count
}

/// Frame text of a decoder line, if it announces a frame
pub fn extract_frame(line: &[u8]) -> Option<&[u8]> {
    line.trim_ascii()
        .strip_prefix(FRAME_ANNOUNCEMENT.as_bytes())
}
