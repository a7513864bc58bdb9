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

use super::cgroup::CgroupError;
use std::io;
use thiserror::Error;
use tonic::Status;
use tracing::error;

pub type Result<T> = std::result::Result<T, JobsError>;

#[derive(Error, Debug)]
pub enum JobsError {
    #[error("job {id} not found")]
    JobNotFound { id: i32 },
    #[error("job {id} already exists")]
    JobExists { id: i32 },
    #[error("job {id} was already started")]
    AlreadyStarted { id: i32 },
    #[error("command must not be empty")]
    EmptyCommand,
    #[error("job {id} failed to spawn: {source}")]
    FailedToSpawn { id: i32, source: io::Error },
    #[error(transparent)]
    Cgroup(#[from] CgroupError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("operation cancelled")]
    Cancelled,
}

impl From<JobsError> for Status {
    fn from(err: JobsError) -> Self {
        let msg = err.to_string();
        error!("{msg}");
        match err {
            JobsError::JobNotFound { .. } => Status::not_found(msg),
            JobsError::JobExists { .. } => Status::already_exists(msg),
            JobsError::AlreadyStarted { .. } => {
                Status::failed_precondition(msg)
            }
            JobsError::EmptyCommand => Status::invalid_argument(msg),
            JobsError::Cgroup(_) => Status::resource_exhausted(msg),
            JobsError::Cancelled => Status::cancelled(msg),
            JobsError::FailedToSpawn { .. } | JobsError::Io(_) => {
                Status::internal(msg)
            }
        }
    }
}
