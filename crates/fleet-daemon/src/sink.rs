//! Redeploy sink used when no provisioning engine is attached

use async_trait::async_trait;
use fleet_redeploy::{DeliveryError, RedeployRequest, RedeploySink};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Logs each redeploy request as a JSON line and acknowledges it
#[derive(Debug, Default)]
pub struct LoggingSink {
    acknowledged: AtomicU64,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests acknowledged so far
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RedeploySink for LoggingSink {
    async fn deliver(&self, request: &RedeployRequest) -> Result<(), DeliveryError> {
        let body = serde_json::to_string(request)
            .map_err(|e| DeliveryError::Rejected(e.to_string()))?;

        info!(
            request_id = %request.request_id,
            services = %request.services,
            causes = request.cause_event_ids.len(),
            request = %body,
            "Redeploy requested"
        );
        self.acknowledged.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_redeploy::ServiceSet;
    use fleet_types::EventId;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn test_logging_sink_acknowledges() {
        let sink = LoggingSink::new();
        let request = RedeployRequest::new(
            ["auth"].into_iter().collect::<ServiceSet>(),
            vec![EventId::new("evt-1")],
            BTreeSet::from(["auth-provider-settings".to_string()]),
        );

        sink.deliver(&request).await.unwrap();
        sink.deliver(&request).await.unwrap();
        assert_eq!(sink.acknowledged(), 2);
    }
}
