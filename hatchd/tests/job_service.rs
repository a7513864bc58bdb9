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

//! The four wire operations driven through the service implementation, with
//! authentication metadata attached the way the interceptor would.

use hatchd::auth::{Authorizer, Role, User, AUTHN_ID_KEY};
use hatchd::jobs::{IoDevice, JobService};
use proto::jobs::job_service_server::JobService as _;
use proto::jobs::{GetRequest, StartRequest, StopRequest, StreamRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tonic::metadata::MetadataValue;
use tonic::Request;

mod common;

fn service() -> JobService {
    let registry = Arc::new(common::fake_registry());
    let authz = Authorizer::new([User {
        subject: "operator".to_string(),
        roles: vec![Role::admin()],
    }]);
    JobService::new(registry, authz, IoDevice::default())
}

fn request_as<T>(subject: &str, message: T) -> Request<T> {
    let mut request = Request::new(message);
    let _ = request.metadata_mut().insert(
        AUTHN_ID_KEY,
        MetadataValue::try_from(subject).expect("metadata value"),
    );
    request
}

fn start_request(cmd: &[&str]) -> StartRequest {
    StartRequest {
        cmd: cmd.iter().map(|s| s.to_string()).collect(),
        cpu_weight: 0,
        max_mem_use: 0,
        max_disk_io: 0,
    }
}

#[tokio::test]
async fn start_stream_and_get_roundtrip() {
    let service = service();

    let job = service
        .start(request_as("operator", start_request(&["echo", "hello"])))
        .await
        .expect("start")
        .into_inner();
    assert!(job.id >= 1);
    assert_eq!(job.cmd, vec!["echo", "hello"]);

    // A late stream still observes the output from the first byte.
    let mut stream = service
        .stream(request_as("operator", StreamRequest { id: job.id }))
        .await
        .expect("stream")
        .into_inner();

    let mut output = Vec::new();
    while let Some(chunk) = stream.next().await {
        output.extend_from_slice(&chunk.expect("chunk").stream);
    }
    assert_eq!(output, b"hello\n");

    // The terminal state is observable through get once the child is
    // reaped.
    let mut status = String::new();
    for _ in 0..50 {
        status = service
            .get(request_as("operator", GetRequest { id: job.id }))
            .await
            .expect("get")
            .into_inner()
            .status;
        if status == "exited" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, "exited");
}

#[tokio::test]
async fn stop_reports_signal_termination() {
    let service = service();

    let job = service
        .start(request_as("operator", start_request(&["sleep", "5"])))
        .await
        .expect("start")
        .into_inner();
    assert_eq!(job.status, "running");

    let stopped = service
        .stop(request_as("operator", StopRequest { id: job.id }))
        .await
        .expect("stop")
        .into_inner();
    assert_eq!(stopped.status, "stopped");
    assert_ne!(stopped.exit_code, 0);
}
