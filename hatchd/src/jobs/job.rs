/* -------------------------------------------------------------------------- *\
 *                |   █████╗ ██╗   ██╗██████╗  █████╗ ███████╗ |              *
 *                |  ██╔══██╗██║   ██║██╔══██╗██╔══██╗██╔════╝ |              *
 *                |  ███████║██║   ██║██████╔╝███████║█████╗   |              *
 *                |  ██╔══██║██║   ██║██╔══██╗██╔══██║██╔══╝   |              *
 *                |  ██║  ██║╚██████╔╝██║  ██║██║  ██║███████╗ |              *
 *                |  ╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝ |              *
 *                +--------------------------------------------+              *
 *                                                                            *
 *                         Distributed Systems Runtime                        *
 * -------------------------------------------------------------------------- *
 * Copyright 2022 - 2024, the aurae contributors                              *
 * SPDX-License-Identifier: Apache-2.0                                        *
\* -------------------------------------------------------------------------- */

//! One supervised job: a command line spawned through the cradle so the
//! target inherits its cgroup atomically, with stdout multiplexed into the
//! job's broadcast log and stderr buffered for post-mortem reporting.

use super::cgroup::{CgroupController, ResourceLimit};
use super::error::{JobsError, Result};
use super::log_buffer::{LogBuffer, LogRead, LogReader};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Stderr is reported verbatim in failure messages up to this many bytes.
const STDERR_REPORT_LIMIT: usize = 4096;

/// Filesystem locations the supervisor needs to launch a job.
#[derive(Debug, Clone)]
pub struct JobRuntime {
    /// Path to the cradle helper executable.
    pub cradle: PathBuf,
    /// v2 cgroup mount the per-job hierarchies live under.
    pub cgroup_root: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Initial state, and the sink for fatal supervisor errors.
    Unknown,
    Running,
    /// The child died by signal, which includes an operator stop.
    Stopped,
    /// The child terminated through exit(2).
    Exited,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Unknown => "unknown",
            JobStatus::Running => "running",
            JobStatus::Stopped => "stopped",
            JobStatus::Exited => "exited",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    exit_code: i32,
    stderr: Vec<u8>,
    started: bool,
}

/// A single job. Shared between the registry and any number of concurrent
/// observers; all mutation happens behind the state mutex or inside the
/// supervise task.
#[derive(Debug)]
pub struct Job {
    id: i32,
    command: Vec<String>,
    log: LogBuffer,
    cancel: CancellationToken,
    state: Mutex<JobState>,
    terminated: watch::Sender<bool>,
}

impl Job {
    /// Creates an unstarted job. The log exists from this moment so readers
    /// attached before [Job::start] observe the stream from its first byte.
    pub fn new(
        id: i32,
        command: Vec<String>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let (terminated, _) = watch::channel(false);
        Arc::new(Self {
            id,
            command,
            log: LogBuffer::new(),
            cancel,
            state: Mutex::new(JobState {
                status: JobStatus::Unknown,
                exit_code: -1,
                stderr: Vec::new(),
                started: false,
            }),
            terminated,
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Current (exit_code, status) pair. The exit code is meaningful only
    /// once the status is terminal; until then it reads -1.
    pub fn result(&self) -> (i32, JobStatus) {
        let state = self.state.lock().expect("job state lock");
        (state.exit_code, state.status)
    }

    /// Stderr captured so far; finalized once the job terminates.
    pub fn stderr(&self) -> Vec<u8> {
        self.state.lock().expect("job state lock").stderr.clone()
    }

    /// A fresh reader over the job's combined stdout, from offset zero.
    pub fn log_reader(&self, cancel: CancellationToken) -> LogReader {
        self.log.reader(cancel)
    }

    /// Copies the job's output into `writer` from the first byte until
    /// end-of-stream. Safe to call from any number of tasks concurrently,
    /// before, during or after the job's lifetime. Writer errors propagate
    /// verbatim; cancellation aborts only this stream.
    pub async fn stream_to<W>(
        &self,
        writer: &mut W,
        cancel: CancellationToken,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut reader = self.log_reader(cancel);
        let mut buf = vec![0u8; 4096];
        loop {
            // The only read error is cancellation.
            let Ok(LogRead { len, eof }) = reader.read(&mut buf).await else {
                return Err(JobsError::Cancelled);
            };
            if len > 0 {
                writer.write_all(&buf[..len]).await?;
            }
            if eof {
                return Ok(());
            }
        }
    }

    /// Requests termination. The supervise task delivers SIGKILL to the
    /// cradle; the kill is never rescinded once requested.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Waits until the job reaches a terminal state, then returns the
    /// (exit_code, status) pair. Honors the caller's token without undoing
    /// a stop already in flight.
    pub async fn wait_terminated(
        &self,
        caller: &CancellationToken,
    ) -> Result<(i32, JobStatus)> {
        let mut terminated = self.terminated.subscribe();
        tokio::select! {
            res = terminated.wait_for(|done| *done) => {
                let _ = res;
                Ok(self.result())
            }
            _ = caller.cancelled() => Err(JobsError::Cancelled),
        }
    }

    /// Spawns the cradle and transitions to Running. Must be called at most
    /// once. Returns the supervise future the registry runs to completion;
    /// the future pumps stdio, reaps the child, records the terminal state
    /// and tears the cgroup down.
    pub(crate) async fn start(
        self: &Arc<Self>,
        runtime: &JobRuntime,
        limits: &ResourceLimit,
    ) -> Result<impl Future<Output = ()> + Send + 'static> {
        {
            let mut state = self.state.lock().expect("job state lock");
            if state.started {
                return Err(JobsError::AlreadyStarted { id: self.id });
            }
            state.started = true;
        }

        let cgroup = match CgroupController::create(
            &self.id.to_string(),
            &runtime.cgroup_root,
            limits,
        ) {
            Ok(cgroup) => cgroup,
            Err(e) => {
                self.fail_before_running();
                return Err(e.into());
            }
        };

        let mut command = Command::new(&runtime.cradle);
        let _ = command
            .arg(cgroup.path())
            .args(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                // Nothing was enrolled, so teardown cannot race a reap.
                if let Err(cleanup) = cgroup.close().await {
                    error!("job {}: {cleanup}", self.id);
                }
                self.fail_before_running();
                return Err(JobsError::FailedToSpawn {
                    id: self.id,
                    source: e,
                });
            }
        };

        let stdout = child.stdout.take().expect("child stdout is piped");
        let stderr = child.stderr.take().expect("child stderr is piped");

        self.state.lock().expect("job state lock").status =
            JobStatus::Running;
        info!("job {}: running {:?}", self.id, self.command);

        let job = self.clone();
        Ok(supervise(job, child, cgroup, stdout, stderr))
    }

    /// A start that failed before the child existed still terminates, so
    /// waiters parked on [Job::wait_terminated] are released.
    fn fail_before_running(&self) {
        self.log.close();
        let _ = self.terminated.send_replace(true);
    }
}

async fn supervise(
    job: Arc<Job>,
    mut child: tokio::process::Child,
    cgroup: CgroupController,
    mut stdout: tokio::process::ChildStdout,
    mut stderr: tokio::process::ChildStderr,
) {
    let id = job.id;

    // Copies child stdout into the broadcast log and closes the log at pipe
    // EOF, which is what releases streaming readers.
    let stdout_pump = {
        let job = job.clone();
        async move {
            let mut buf = vec![0u8; 8192];
            let result = loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break Ok(()),
                    Ok(n) => {
                        if let Err(e) = job.log.append(&buf[..n]) {
                            break Err(format!("stdout append: {e}"));
                        }
                    }
                    Err(e) => break Err(format!("stdout read: {e}")),
                }
            };
            job.log.close();
            result
        }
    };

    // Stderr is not part of the streamable log; it is held back for
    // post-mortem reporting so operators can tell a failing tool from a
    // noisy but successful one.
    let stderr_pump = async move {
        let mut captured = Vec::new();
        match stderr.read_to_end(&mut captured).await {
            Ok(_) => Ok(captured),
            Err(e) => Err((captured, format!("stderr read: {e}"))),
        }
    };

    let reap = async {
        tokio::select! {
            res = child.wait() => res,
            _ = job.cancel.cancelled() => {
                // SIGKILL the cradle; the target inherited its pid through
                // exec, and any orphans die via the cradle's pdeathsig.
                if let Err(e) = child.start_kill() {
                    error!("job {id}: kill: {e}");
                }
                child.wait().await
            }
        }
    };

    let (stdout_result, stderr_result, wait_result) =
        tokio::join!(stdout_pump, stderr_pump, reap);

    // Pump and wait faults are accumulated so one failure cannot hide
    // another.
    let mut faults: Vec<String> = Vec::new();

    if let Err(e) = stdout_result {
        faults.push(e);
    }

    let captured_stderr = match stderr_result {
        Ok(captured) => captured,
        Err((captured, e)) => {
            faults.push(e);
            captured
        }
    };

    let (exit_code, status) = match wait_result {
        Ok(exit_status) => {
            use std::os::unix::process::ExitStatusExt;
            let status = if exit_status.signal().is_some() {
                JobStatus::Stopped
            } else if exit_status.code().is_some() {
                JobStatus::Exited
            } else {
                JobStatus::Unknown
            };
            (exit_status.code().unwrap_or(-1), status)
        }
        Err(e) => {
            faults.push(format!("wait: {e}"));
            (-1, JobStatus::Unknown)
        }
    };

    {
        let mut state = job.state.lock().expect("job state lock");
        state.status = status;
        state.exit_code = exit_code;
        state.stderr = captured_stderr;
    }
    info!("job {id}: terminated status={status} exit_code={exit_code}");

    // Terminal state is observable before teardown so Stop returns as soon
    // as wait would have.
    let _ = job.terminated.send_replace(true);

    if let Err(e) = cgroup.close().await {
        faults.push(e.to_string());
    }

    if !faults.is_empty() {
        let stderr_tail = {
            let stderr = job.stderr();
            let tail = &stderr[..stderr.len().min(STDERR_REPORT_LIMIT)];
            String::from_utf8_lossy(tail).into_owned()
        };
        error!(
            "job {id}: supervision faults: {}; stderr: {stderr_tail}",
            faults.join("; ")
        );
    }
}
