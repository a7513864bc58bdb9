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

//! The job-supervision kernel: broadcast log, supervisor, cgroup manager,
//! registry, and the wire-facing service.

mod error;
mod job;
mod job_service;
mod registry;
mod validation;

pub mod cgroup;
pub mod log_buffer;

pub use error::{JobsError, Result};
pub use job::{Job, JobRuntime, JobStatus};
pub use job_service::JobService;
pub use registry::Registry;
pub use validation::{
    IoDevice, ValidatedStartRequest, DEFAULT_CPU_WEIGHT, DEFAULT_MAX_MEM_BYTES,
};
