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

//! The wire-facing job service: authenticate, authorize, translate.
//!
//! The gate is consulted exactly once per RPC, before any registry call.

use super::log_buffer::LogRead;
use super::registry::Registry;
use super::validation::{IoDevice, ValidatedStartRequest};
use crate::auth::{authenticated_subject, Action, Authorizer};
use proto::jobs::{
    job_service_server, GetRequest, Job, StartRequest, StopRequest,
    StopResponse, StreamRequest, StreamResponse,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::info;

const STREAM_CHUNK_SIZE: usize = 4096;

#[derive(Debug)]
pub struct JobService {
    registry: Arc<Registry>,
    authz: Authorizer,
    io_device: IoDevice,
}

impl JobService {
    pub fn new(
        registry: Arc<Registry>,
        authz: Authorizer,
        io_device: IoDevice,
    ) -> Self {
        Self { registry, authz, io_device }
    }

    fn authorize<T>(
        &self,
        request: &Request<T>,
        action: Action,
    ) -> Result<String, Status> {
        let subject = authenticated_subject(request)?;
        self.authz.has_access(&subject, action)?;
        Ok(subject)
    }
}

#[tonic::async_trait]
impl job_service_server::JobService for JobService {
    #[tracing::instrument(skip(self, request))]
    async fn get(
        &self,
        request: Request<GetRequest>,
    ) -> Result<Response<Job>, Status> {
        let _subject = self.authorize(&request, Action::Get)?;
        let GetRequest { id } = request.into_inner();

        let job = self.registry.get_job(id)?;
        let (_, status) = job.result();

        Ok(Response::new(Job {
            id: job.id(),
            cmd: job.command().to_vec(),
            status: status.to_string(),
        }))
    }

    #[tracing::instrument(skip(self, request))]
    async fn start(
        &self,
        request: Request<StartRequest>,
    ) -> Result<Response<Job>, Status> {
        let subject = self.authorize(&request, Action::Start)?;

        let ValidatedStartRequest { command, limits } =
            ValidatedStartRequest::validate(
                request.into_inner(),
                self.io_device,
            )?;

        let job =
            self.registry.start_job(command.clone(), limits).await?;
        info!("subject {subject} started job {}", job.id());

        Ok(Response::new(Job {
            id: job.id(),
            cmd: command,
            status: job.result().1.to_string(),
        }))
    }

    #[tracing::instrument(skip(self, request))]
    async fn stop(
        &self,
        request: Request<StopRequest>,
    ) -> Result<Response<StopResponse>, Status> {
        let subject = self.authorize(&request, Action::Stop)?;
        let StopRequest { id } = request.into_inner();

        // Client disconnects drop this future, which abandons the wait but
        // never rescinds the kill; the next get observes the terminal state.
        let caller = CancellationToken::new();
        let (exit_code, status) =
            self.registry.stop_job(id, &caller).await?;
        info!("subject {subject} stopped job {id}");

        Ok(Response::new(StopResponse {
            exit_code,
            status: status.to_string(),
        }))
    }

    type StreamStream = ReceiverStream<Result<StreamResponse, Status>>;

    #[tracing::instrument(skip(self, request))]
    async fn stream(
        &self,
        request: Request<StreamRequest>,
    ) -> Result<Response<Self::StreamStream>, Status> {
        let _subject = self.authorize(&request, Action::Stream)?;
        let StreamRequest { id } = request.into_inner();

        let job = self.registry.get_job(id)?;

        let cancel = CancellationToken::new();
        let mut reader = job.log_reader(cancel.clone());
        let (tx, rx) = mpsc::channel(16);

        let _ = tokio::spawn(async move {
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let read = tokio::select! {
                    read = reader.read(&mut buf) => read,
                    // The client went away; release the parked reader.
                    _ = tx.closed() => {
                        cancel.cancel();
                        break;
                    }
                };

                match read {
                    Ok(LogRead { len, eof }) => {
                        if len > 0 {
                            let chunk = StreamResponse {
                                stream: buf[..len].to_vec(),
                            };
                            if tx.send(Ok(chunk)).await.is_err() {
                                break;
                            }
                        }
                        if eof {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(Status::cancelled(e.to_string())))
                            .await;
                        break;
                    }
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
