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

//! Job lifecycle end to end against a fake cradle: spawn, pump, stream,
//! stop, shutdown.

use hatchd::jobs::cgroup::ResourceLimit;
use hatchd::jobs::{JobRuntime, JobStatus, JobsError, Registry};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod common;

#[tokio::test]
async fn echo_and_drain() {
    let registry = common::fake_registry();
    let job = registry
        .start_job(common::argv(&["echo", "hello"]), ResourceLimit::default())
        .await
        .expect("start");

    let (exit_code, status) = job
        .wait_terminated(&CancellationToken::new())
        .await
        .expect("wait");
    assert_eq!(exit_code, 0);
    assert_eq!(status, JobStatus::Exited);

    let mut sink = std::io::Cursor::new(Vec::new());
    job.stream_to(&mut sink, CancellationToken::new())
        .await
        .expect("drain");
    assert_eq!(sink.into_inner(), b"hello\n");
}

#[tokio::test]
async fn stop_a_sleeper() {
    let registry = common::fake_registry();
    let job = registry
        .start_job(common::argv(&["sleep", "5"]), ResourceLimit::default())
        .await
        .expect("start");

    assert_eq!(job.result(), (-1, JobStatus::Running));

    let (exit_code, status) = tokio::time::timeout(
        Duration::from_secs(2),
        registry.stop_job(job.id(), &CancellationToken::new()),
    )
    .await
    .expect("stop within two seconds")
    .expect("stop");

    assert_ne!(exit_code, 0);
    assert_eq!(status, JobStatus::Stopped);
}

#[tokio::test]
async fn repeated_stop_returns_the_same_result() {
    let registry = common::fake_registry();
    let job = registry
        .start_job(common::argv(&["sleep", "5"]), ResourceLimit::default())
        .await
        .expect("start");

    let caller = CancellationToken::new();
    let first = registry.stop_job(job.id(), &caller).await.expect("stop");
    let second = registry.stop_job(job.id(), &caller).await.expect("re-stop");
    assert_eq!(first, second);
}

#[tokio::test]
async fn many_concurrent_streamers_observe_identical_bytes() {
    let registry = common::fake_registry();
    let job = registry
        .start_job(
            common::argv(&[
                "sh",
                "-c",
                "for i in $(seq 1 50); do echo $i; sleep 0.05; done",
            ]),
            ResourceLimit::default(),
        )
        .await
        .expect("start");

    // Twenty readers racing the writer...
    let mut handles = Vec::new();
    for _ in 0..20 {
        let mut reader = job.log_reader(CancellationToken::new());
        handles.push(tokio::spawn(async move { reader.read_to_end().await }));
    }

    let _ = job
        .wait_terminated(&CancellationToken::new())
        .await
        .expect("wait");

    // ...and twenty more attached after the job already exited.
    for _ in 0..20 {
        let mut reader = job.log_reader(CancellationToken::new());
        handles.push(tokio::spawn(async move { reader.read_to_end().await }));
    }

    let expected: Vec<u8> =
        (1..=50).flat_map(|i| format!("{i}\n").into_bytes()).collect();
    for handle in handles {
        let bytes = handle.await.expect("join").expect("read_to_end");
        assert_eq!(bytes, expected);
    }
}

#[tokio::test]
async fn cancelling_one_reader_leaves_the_other_streaming() {
    let registry = common::fake_registry();
    let job = registry
        .start_job(
            common::argv(&[
                "sh",
                "-c",
                "while true; do echo tick; sleep 0.05; done",
            ]),
            ResourceLimit::default(),
        )
        .await
        .expect("start");

    let doomed_cancel = CancellationToken::new();
    let mut doomed = job.log_reader(doomed_cancel.clone());
    let doomed_handle = tokio::spawn(async move { doomed.read_to_end().await });

    let mut survivor = job.log_reader(CancellationToken::new());
    let survivor_handle =
        tokio::spawn(async move { survivor.read_to_end().await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    doomed_cancel.cancel();

    let err = tokio::time::timeout(Duration::from_secs(1), doomed_handle)
        .await
        .expect("cancelled reader returns promptly")
        .expect("join")
        .expect_err("cancelled");
    assert_eq!(err.to_string(), "log reader was cancelled");

    // The survivor keeps receiving bytes until the job is stopped.
    let _ = registry
        .stop_job(job.id(), &CancellationToken::new())
        .await
        .expect("stop");
    let bytes = survivor_handle.await.expect("join").expect("read_to_end");
    assert!(bytes.starts_with(b"tick\n"));
}

#[tokio::test]
async fn ids_are_unique_and_monotonic() {
    let registry = common::fake_registry();
    let mut previous = 0;
    for _ in 0..3 {
        let job = registry
            .start_job(common::argv(&["true"]), ResourceLimit::default())
            .await
            .expect("start");
        assert!(job.id() > previous);
        previous = job.id();
        let _ = job
            .wait_terminated(&CancellationToken::new())
            .await
            .expect("wait");
    }
}

#[tokio::test]
async fn start_failure_removes_the_placeholder() {
    let registry = Registry::new(JobRuntime {
        cradle: "/nonexistent/cradle".into(),
        cgroup_root: common::fake_cgroup_root(),
    });

    let err = registry
        .start_job(common::argv(&["echo", "hello"]), ResourceLimit::default())
        .await
        .expect_err("spawn fails");
    assert!(matches!(err, JobsError::FailedToSpawn { .. }));

    let err = registry.get_job(1).expect_err("placeholder removed");
    assert!(matches!(err, JobsError::JobNotFound { id: 1 }));
}

#[tokio::test]
async fn stderr_is_captured_for_post_mortem() {
    let registry = common::fake_registry();
    let job = registry
        .start_job(
            common::argv(&["sh", "-c", "echo oops >&2; exit 3"]),
            ResourceLimit::default(),
        )
        .await
        .expect("start");

    let (exit_code, status) = job
        .wait_terminated(&CancellationToken::new())
        .await
        .expect("wait");
    assert_eq!(exit_code, 3);
    assert_eq!(status, JobStatus::Exited);
    assert_eq!(job.stderr(), b"oops\n");

    // Stderr never leaks into the streamable log.
    let mut reader = job.log_reader(CancellationToken::new());
    assert_eq!(reader.read_to_end().await.expect("drain"), b"");
}

#[tokio::test]
async fn cpu_weight_knob_is_written_verbatim() {
    let cgroup_root = common::fake_cgroup_root();
    let registry = Registry::new(JobRuntime {
        cradle: common::fake_cradle(),
        cgroup_root: cgroup_root.clone(),
    });

    let limits = ResourceLimit { cpu_weight: 99, ..Default::default() };
    let job = registry
        .start_job(common::argv(&["sleep", "5"]), limits)
        .await
        .expect("start");

    let knob = cgroup_root.join(job.id().to_string()).join("cpu.weight");
    let contents = std::fs::read(&knob).expect("read cpu.weight");
    assert_eq!(contents, b"99");

    let _ = registry
        .stop_job(job.id(), &CancellationToken::new())
        .await
        .expect("stop");
}

#[tokio::test]
async fn shutdown_kills_jobs_and_releases_readers() {
    let registry = common::fake_registry();
    let job = registry
        .start_job(common::argv(&["sleep", "30"]), ResourceLimit::default())
        .await
        .expect("start");
    let id = job.id();

    let mut reader = job.log_reader(CancellationToken::new());
    drop(job);

    tokio::time::timeout(Duration::from_secs(2), registry.shutdown())
        .await
        .expect("shutdown joins supervisors promptly");

    // The registry dropped its jobs; parked readers see end-of-stream.
    let bytes = tokio::time::timeout(
        Duration::from_secs(1),
        reader.read_to_end(),
    )
    .await
    .expect("reader released")
    .expect("read_to_end");
    assert_eq!(bytes, b"");

    let err = registry.get_job(id).expect_err("store cleared");
    assert!(matches!(err, JobsError::JobNotFound { .. }));
}
