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

//! An mTLS gRPC channel to a hatchd instance.
//!
//! The server certificate is fully verified against the configured CA; the
//! host part of the target doubles as the name it is verified for.

use crate::config::{CertMaterial, HatchConfig};
use anyhow::anyhow;
use thiserror::Error;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity};

type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    ConnectionError(#[from] tonic::transport::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Instance of a single client for a hatch consumer.
#[derive(Debug, Clone)]
pub struct Client {
    channel: Channel,
}

impl Client {
    pub async fn default() -> Result<Self> {
        Self::new(HatchConfig::try_default()?).await
    }

    /// Create a new Client.
    ///
    /// Note: A new client is required for every independent execution of
    /// this process.
    pub async fn new(
        HatchConfig { auth, system }: HatchConfig,
    ) -> Result<Self> {
        let CertMaterial { server_root_ca_cert, client_cert, client_key } =
            auth.to_cert_material().await?;

        let tls_config = ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(server_root_ca_cert))
            .identity(Identity::from_pem(client_cert, client_key));

        let endpoint =
            Channel::from_shared(format!("https://{}", system.target))
                .map_err(|e| {
                    ClientError::Other(anyhow!(
                        "invalid target '{}': {e}",
                        system.target
                    ))
                })?
                .tls_config(tls_config)?;

        let channel = endpoint.connect().await?;
        Ok(Self { channel })
    }

    /// The channel used for gRPC connections, ready to hand to a generated
    /// service client.
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }
}
