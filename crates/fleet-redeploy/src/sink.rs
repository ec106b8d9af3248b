//! Delivery seam towards the provisioning engine

use crate::error::DeliveryError;
use crate::request::RedeployRequest;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// Receives redeploy requests and acknowledges them
///
/// `deliver` returns once the downstream has acknowledged (or refused) the
/// request. The coordinator bounds each call with its ack timeout and may
/// call again with the same request.
#[async_trait]
pub trait RedeploySink: Send + Sync {
    async fn deliver(&self, request: &RedeployRequest) -> Result<(), DeliveryError>;
}

/// A request handed out on a [`ChannelSink`], awaiting acknowledgment
#[derive(Debug)]
pub struct Delivery {
    pub request: RedeployRequest,
    ack: oneshot::Sender<Result<(), String>>,
}

impl Delivery {
    /// Confirm the request was taken over.
    ///
    /// Returns false when the coordinator already gave up on this attempt.
    pub fn acknowledge(self) -> bool {
        self.ack.send(Ok(())).is_ok()
    }

    /// Refuse the request; the coordinator retries within its budget
    pub fn reject(self, reason: impl Into<String>) -> bool {
        self.ack.send(Err(reason.into())).is_ok()
    }
}

/// Exposes the live redeploy channel to an in-process consumer
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Delivery>,
}

impl ChannelSink {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl RedeploySink for ChannelSink {
    async fn deliver(&self, request: &RedeployRequest) -> Result<(), DeliveryError> {
        let (ack, acked) = oneshot::channel();
        self.tx
            .send(Delivery {
                request: request.clone(),
                ack,
            })
            .await
            .map_err(|_| DeliveryError::SinkClosed)?;

        match acked.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(DeliveryError::Rejected(reason)),
            Err(_) => Err(DeliveryError::NotAcknowledged),
        }
    }
}
