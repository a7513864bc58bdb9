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

//! Process-wide container of jobs, keyed by a monotonically increasing id.

use super::cgroup::ResourceLimit;
use super::error::{JobsError, Result};
use super::job::{Job, JobRuntime, JobStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// An in-memory store for every job started by this service instance. Ids
/// are unique for the lifetime of the process; entries are removed only at
/// shutdown.
#[derive(Debug)]
pub struct Registry {
    runtime: JobRuntime,
    ider: AtomicI32,
    jobs: Mutex<HashMap<i32, Arc<Job>>>,
    supervisors: tokio::sync::Mutex<JoinSet<()>>,
    cancel: CancellationToken,
}

impl Registry {
    pub fn new(runtime: JobRuntime) -> Self {
        Self {
            runtime,
            ider: AtomicI32::new(0),
            jobs: Mutex::new(HashMap::new()),
            supervisors: tokio::sync::Mutex::new(JoinSet::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Allocates the next id and launches the job. On a start failure the
    /// placeholder entry is removed again and the error is returned.
    pub async fn start_job(
        &self,
        command: Vec<String>,
        limits: ResourceLimit,
    ) -> Result<Arc<Job>> {
        if command.is_empty() {
            return Err(JobsError::EmptyCommand);
        }

        let id = self.ider.fetch_add(1, Ordering::Relaxed) + 1;
        let job = Job::new(id, command, self.cancel.child_token());

        {
            let mut jobs = self.jobs.lock().expect("registry lock");
            if jobs.contains_key(&id) {
                return Err(JobsError::JobExists { id });
            }
            let _ = jobs.insert(id, job.clone());
        }

        match job.start(&self.runtime, &limits).await {
            Ok(supervise) => {
                let _ = self.supervisors.lock().await.spawn(supervise);
                Ok(job)
            }
            Err(e) => {
                let _ = self.jobs.lock().expect("registry lock").remove(&id);
                Err(e)
            }
        }
    }

    pub fn get_job(&self, id: i32) -> Result<Arc<Job>> {
        self.jobs
            .lock()
            .expect("registry lock")
            .get(&id)
            .cloned()
            .ok_or(JobsError::JobNotFound { id })
    }

    /// Triggers a stop and waits for the terminal (exit_code, status) pair.
    /// The caller's token aborts the wait without rescinding the kill; the
    /// termination completes in the background and is visible on the next
    /// get.
    pub async fn stop_job(
        &self,
        id: i32,
        caller: &CancellationToken,
    ) -> Result<(i32, JobStatus)> {
        let job = self.get_job(id)?;
        job.stop();
        job.wait_terminated(caller).await
    }

    /// Kills every job and joins every supervisor before returning.
    pub async fn shutdown(&self) {
        info!("registry: shutting down all jobs");
        self.cancel.cancel();

        let mut supervisors = self.supervisors.lock().await;
        while supervisors.join_next().await.is_some() {}

        self.jobs.lock().expect("registry lock").clear();
    }
}
