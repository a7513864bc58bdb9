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

use super::cgroup::{IoLimit, ResourceLimit};
use proto::jobs::StartRequest;
use thiserror::Error;
use tonic::Status;

/// Default cpu weight applied when a start request leaves the knob at zero.
pub const DEFAULT_CPU_WEIGHT: i32 = 100;

/// Default memory cap (bytes) applied when a start request leaves the knob
/// at zero.
pub const DEFAULT_MAX_MEM_BYTES: i64 = 100_000_000;

/// The write-iops cap on the wire names no device, so the server applies it
/// to one configured block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoDevice {
    pub major: i64,
    pub minor: i64,
}

impl Default for IoDevice {
    fn default() -> Self {
        Self { major: 8, minor: 0 }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("cmd must not be empty")]
    EmptyCommand,
    #[error("{field} must not be negative")]
    NegativeLimit { field: &'static str },
}

impl From<ValidationError> for Status {
    fn from(err: ValidationError) -> Self {
        Status::invalid_argument(err.to_string())
    }
}

/// A start request with the defaults resolved and the limits mapped onto the
/// cgroup knobs.
#[derive(Debug, PartialEq, Eq)]
pub struct ValidatedStartRequest {
    pub command: Vec<String>,
    pub limits: ResourceLimit,
}

impl ValidatedStartRequest {
    pub fn validate(
        request: StartRequest,
        io_device: IoDevice,
    ) -> Result<Self, ValidationError> {
        let StartRequest { cmd, cpu_weight, max_mem_use, max_disk_io } =
            request;

        if cmd.is_empty() {
            return Err(ValidationError::EmptyCommand);
        }
        if cpu_weight < 0 {
            return Err(ValidationError::NegativeLimit { field: "cpu_weight" });
        }
        if max_mem_use < 0 {
            return Err(ValidationError::NegativeLimit {
                field: "max_mem_use",
            });
        }
        if max_disk_io < 0 {
            return Err(ValidationError::NegativeLimit {
                field: "max_disk_io",
            });
        }

        let limits = ResourceLimit {
            cpu_weight: if cpu_weight == 0 {
                DEFAULT_CPU_WEIGHT
            } else {
                cpu_weight
            },
            max_mem_bytes: if max_mem_use == 0 {
                DEFAULT_MAX_MEM_BYTES
            } else {
                i64::from(max_mem_use)
            },
            max_io: (max_disk_io > 0).then_some(IoLimit {
                max_write_iops: max_disk_io,
                major: io_device.major,
                minor: io_device.minor,
            }),
        };

        Ok(Self { command: cmd, limits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(cmd: &[&str]) -> StartRequest {
        StartRequest {
            cmd: cmd.iter().map(|s| s.to_string()).collect(),
            cpu_weight: 0,
            max_mem_use: 0,
            max_disk_io: 0,
        }
    }

    #[test]
    fn empty_cmd_is_rejected() {
        let err = ValidatedStartRequest::validate(
            request(&[]),
            IoDevice::default(),
        )
        .expect_err("empty cmd");
        assert_eq!(err, ValidationError::EmptyCommand);
    }

    #[test]
    fn omitted_limits_fall_back_to_the_documented_defaults() {
        let validated = ValidatedStartRequest::validate(
            request(&["echo", "hello"]),
            IoDevice::default(),
        )
        .expect("validate");

        assert_eq!(validated.command, vec!["echo", "hello"]);
        assert_eq!(validated.limits.cpu_weight, DEFAULT_CPU_WEIGHT);
        assert_eq!(validated.limits.max_mem_bytes, DEFAULT_MAX_MEM_BYTES);
        assert_eq!(validated.limits.max_io, None);
    }

    #[test]
    fn explicit_limits_override_the_defaults() {
        let mut req = request(&["sleep", "5"]);
        req.cpu_weight = 99;
        req.max_mem_use = 1234;
        req.max_disk_io = 22;

        let validated = ValidatedStartRequest::validate(
            req,
            IoDevice { major: 8, minor: 6 },
        )
        .expect("validate");

        assert_eq!(validated.limits.cpu_weight, 99);
        assert_eq!(validated.limits.max_mem_bytes, 1234);
        assert_eq!(
            validated.limits.max_io,
            Some(IoLimit { max_write_iops: 22, major: 8, minor: 6 })
        );
    }

    #[test]
    fn negative_limits_are_rejected() {
        let mut req = request(&["true"]);
        req.cpu_weight = -1;
        let err = ValidatedStartRequest::validate(req, IoDevice::default())
            .expect_err("negative");
        assert_eq!(
            err,
            ValidationError::NegativeLimit { field: "cpu_weight" }
        );
    }
}
