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

//! Per-job v2 control groups.
//!
//! One directory under the configured mount point carries every controller
//! for a job. Creating a [CgroupController] enables the `cpu`, `memory` and
//! `io` controllers at the mount point and writes whichever limit knobs the
//! job carries; teardown is a single `rmdir` with bounded retry, because the
//! kernel briefly refuses removal while exiting processes are reaped.

use nix::unistd::Pid;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const SUBTREE_CONTROLLERS: &str = "+cpu +memory +io";

const REMOVE_ATTEMPTS: u32 = 4;
const REMOVE_INITIAL_DELAY: Duration = Duration::from_millis(10);

pub type Result<T> = std::result::Result<T, CgroupError>;

#[derive(Error, Debug)]
pub enum CgroupError {
    #[error("failed to enable subtree controllers at '{path}': {source}")]
    EnableControllers { path: PathBuf, source: io::Error },
    #[error("failed to create cgroup '{path}': {source}")]
    CreateCgroup { path: PathBuf, source: io::Error },
    #[error("failed to write '{knob}' for cgroup '{path}': {source}")]
    WriteLimit { knob: &'static str, path: PathBuf, source: io::Error },
    #[error("failed to enroll pid {pid} into cgroup '{path}': {source}")]
    EnrollPid { pid: Pid, path: PathBuf, source: io::Error },
    #[error("failed to remove cgroup '{path}': {source}")]
    RemoveCgroup { path: PathBuf, source: io::Error },
}

/// Resource limits for a single job. A zero (or absent) knob is not written
/// at all; enforcement is whatever the kernel's v2 controllers provide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLimit {
    pub cpu_weight: i32,
    pub max_mem_bytes: i64,
    pub max_io: Option<IoLimit>,
}

/// Write-iops cap for one block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoLimit {
    pub max_write_iops: i64,
    pub major: i64,
    pub minor: i64,
}

/// Handle to one job's cgroup directory. The owner must call
/// [CgroupController::close] once the last enrolled process has been reaped.
#[derive(Debug)]
pub struct CgroupController {
    path: PathBuf,
}

impl CgroupController {
    /// Creates `<mount_point>/<name>/` and configures the given limits.
    /// Partially created hierarchies are rolled back on failure.
    pub fn create(
        name: &str,
        mount_point: &Path,
        limits: &ResourceLimit,
    ) -> Result<Self> {
        let subtree_control = mount_point.join("cgroup.subtree_control");
        fs::write(&subtree_control, SUBTREE_CONTROLLERS).map_err(|e| {
            CgroupError::EnableControllers {
                path: subtree_control.clone(),
                source: e,
            }
        })?;

        let path = mount_point.join(name);
        fs::create_dir_all(&path).map_err(|e| CgroupError::CreateCgroup {
            path: path.clone(),
            source: e,
        })?;

        let controller = Self { path };
        if let Err(e) = controller.write_limits(limits) {
            if let Err(cleanup) = fs::remove_dir(&controller.path) {
                warn!(
                    "failed to roll back cgroup {}: {cleanup}",
                    controller.path.display()
                );
            }
            return Err(e);
        }

        Ok(controller)
    }

    fn write_limits(&self, limits: &ResourceLimit) -> Result<()> {
        if limits.cpu_weight != 0 {
            self.write_knob("cpu.weight", limits.cpu_weight.to_string())?;
        }
        if limits.max_mem_bytes != 0 {
            self.write_knob("memory.max", limits.max_mem_bytes.to_string())?;
        }
        if let Some(IoLimit { max_write_iops, major, minor }) = limits.max_io {
            self.write_knob(
                "io.max",
                format!("{major}:{minor} wiops={max_write_iops}"),
            )?;
        }
        Ok(())
    }

    fn write_knob(&self, knob: &'static str, value: String) -> Result<()> {
        fs::write(self.path.join(knob), value).map_err(|e| {
            CgroupError::WriteLimit { knob, path: self.path.clone(), source: e }
        })
    }

    /// Writes `pid` into this cgroup's `cgroup.procs`.
    pub fn enroll(&self, pid: Pid) -> Result<()> {
        enroll_pid(&self.path, pid)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the hierarchy. Retried with exponential backoff because the
    /// kernel may still be reaping enrolled processes.
    pub async fn close(self) -> Result<()> {
        let mut delay = REMOVE_INITIAL_DELAY;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match fs::remove_dir(&self.path) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(());
                }
                Err(e) => {
                    if attempt >= REMOVE_ATTEMPTS {
                        return Err(CgroupError::RemoveCgroup {
                            path: self.path,
                            source: e,
                        });
                    }
                }
            }
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }
}

/// Enrolls `pid` into the cgroup at `path`. Also used by the cradle binary
/// to place itself before exec'ing the target.
pub fn enroll_pid(path: &Path, pid: Pid) -> Result<()> {
    let procs = path.join("cgroup.procs");
    fs::write(&procs, pid.to_string()).map_err(|e| CgroupError::EnrollPid {
        pid,
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // A plain directory stands in for the cgroup2 mount: the knob files do
    // not exist up front, so every write creates a regular file whose
    // contents we can assert on.
    fn fake_mount() -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("cgroup_test_{}", uuid::Uuid::new_v4()));
        fs::create_dir(&dir).expect("create fake mount");
        fs::write(dir.join("cgroup.subtree_control"), b"")
            .expect("seed subtree_control");
        dir
    }

    #[test]
    fn create_writes_each_configured_knob() {
        let mount = fake_mount();

        let cases: Vec<(ResourceLimit, &str, &[u8])> = vec![
            (
                ResourceLimit { cpu_weight: 99, ..Default::default() },
                "cpu.weight",
                b"99",
            ),
            (
                ResourceLimit { max_mem_bytes: 28, ..Default::default() },
                "memory.max",
                b"28",
            ),
            (
                ResourceLimit {
                    max_io: Some(IoLimit {
                        max_write_iops: 22,
                        major: 8,
                        minor: 6,
                    }),
                    ..Default::default()
                },
                "io.max",
                b"8:6 wiops=22",
            ),
        ];

        for (limits, knob, expected) in cases {
            let name = uuid::Uuid::new_v4().to_string();
            let controller = CgroupController::create(&name, &mount, &limits)
                .expect("create cgroup");

            let contents = fs::read(mount.join(&name).join(knob))
                .expect("read knob file");
            assert_eq!(contents, expected, "knob {knob}");

            // Only the configured knob should exist.
            let entries = fs::read_dir(controller.path())
                .expect("read cgroup dir")
                .count();
            assert_eq!(entries, 1);
        }

        fs::remove_dir_all(&mount).expect("cleanup");
    }

    #[test]
    fn unset_knobs_are_not_written() {
        let mount = fake_mount();
        let controller = CgroupController::create(
            "all-defaults",
            &mount,
            &ResourceLimit::default(),
        )
        .expect("create cgroup");

        let entries =
            fs::read_dir(controller.path()).expect("read cgroup dir").count();
        assert_eq!(entries, 0);

        fs::remove_dir_all(&mount).expect("cleanup");
    }

    #[test]
    fn enroll_writes_decimal_pid() {
        let mount = fake_mount();
        let controller = CgroupController::create(
            "enroll-me",
            &mount,
            &ResourceLimit::default(),
        )
        .expect("create cgroup");

        controller.enroll(Pid::from_raw(4242)).expect("enroll");
        let contents = fs::read_to_string(controller.path().join("cgroup.procs"))
            .expect("read cgroup.procs");
        assert_eq!(contents, "4242");

        fs::remove_dir_all(&mount).expect("cleanup");
    }

    #[tokio::test]
    async fn close_removes_an_empty_hierarchy() {
        let mount = fake_mount();
        let controller = CgroupController::create(
            "short-lived",
            &mount,
            &ResourceLimit::default(),
        )
        .expect("create cgroup");
        let path = controller.path().to_path_buf();

        controller.close().await.expect("close");
        assert!(!path.exists());

        fs::remove_dir_all(&mount).expect("cleanup");
    }

    #[tokio::test]
    async fn close_gives_up_after_bounded_retries() {
        let mount = fake_mount();
        let limits = ResourceLimit { cpu_weight: 50, ..Default::default() };
        let controller =
            CgroupController::create("stubborn", &mount, &limits)
                .expect("create cgroup");

        // The knob file blocks rmdir on a plain filesystem, forcing every
        // retry to fail.
        let err = controller.close().await.expect_err("close should fail");
        assert!(matches!(err, CgroupError::RemoveCgroup { .. }));

        fs::remove_dir_all(&mount).expect("cleanup");
    }
}
