//! AMF application lifecycle
//!
//! [`AmfApp::start`] binds the NGAP listener and only returns once it is
//! bound, handing back the bound address. Everything else (association and
//! UE workers) is started on demand by the SCTP task.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

use nextgamf_common::AmfConfig;
use nextgamf_sctp::ServerError;

use crate::event::AmfEvent;
use crate::nf::NfFacade;
use crate::sctp_task::SctpTask;
use crate::store::UeContextStore;
use crate::tasks::{channel, AmfTaskBase, SctpMessage, Task, TaskHandle, DEFAULT_CHANNEL_CAPACITY};

#[derive(Debug, Error)]
pub enum StartError {
    #[error("invalid configuration: {0}")]
    Config(#[from] nextgamf_common::Error),
    #[error("cannot bind NGAP listener: {0}")]
    Bind(#[from] ServerError),
    #[error("SCTP task exited before reporting readiness")]
    Aborted,
}

/// A running AMF.
pub struct AmfApp {
    base: AmfTaskBase,
    local_addr: SocketAddr,
    sctp: TaskHandle<SctpMessage>,
    sctp_task: JoinHandle<()>,
}

impl AmfApp {
    /// Validates `config`, binds the listener and starts serving.
    pub async fn start(config: AmfConfig, nf: Arc<dyn NfFacade>) -> Result<Self, StartError> {
        config.validate()?;
        let config = Arc::new(config);
        let addr = config.ngap.socket_addr();

        let (sctp, sctp_rx) = channel(DEFAULT_CHANNEL_CAPACITY);
        let base = AmfTaskBase::new(config, nf, sctp.clone());

        let (ready_tx, ready_rx) = oneshot::channel();
        let task_base = base.clone();
        let sctp_task = tokio::spawn(async move {
            match SctpTask::bind(task_base, addr).await {
                Ok(mut task) => {
                    let _ = ready_tx.send(Ok(task.local_addr()));
                    task.run(sctp_rx).await;
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            }
        });
        let local_addr = ready_rx.await.map_err(|_| StartError::Aborted)??;

        info!(
            "AMF {} ready, NGAP on {}",
            base.config.amf_name, local_addr
        );
        Ok(Self {
            base,
            local_addr,
            sctp,
            sctp_task,
        })
    }

    /// Address the NGAP listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AmfEvent> {
        self.base.subscribe()
    }

    pub fn store(&self) -> &Arc<UeContextStore> {
        &self.base.store
    }

    pub fn config(&self) -> &AmfConfig {
        &self.base.config
    }

    /// Stops the listener; associations go down and their UE contexts are
    /// released.
    pub async fn shutdown(self) {
        info!("Shutting down AMF {}", self.base.config.amf_name);
        let _ = self.sctp.shutdown().await;
        let _ = self.sctp_task.await;
    }
}
