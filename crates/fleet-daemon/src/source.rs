//! JSON-lines change event source

use crate::error::DaemonResult;
use fleet_redeploy::CoordinatorHandle;
use fleet_types::ChangeEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Parse one input line; blank lines yield `None`
pub fn parse_event(line: &str) -> Option<Result<ChangeEvent, serde_json::Error>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str(line))
}

/// Submit every event read from `reader` until end of input
///
/// Malformed lines are logged and skipped. Returns the number of events
/// submitted.
pub async fn feed_events<R>(reader: R, handle: &CoordinatorHandle) -> DaemonResult<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0u64;
    let mut submitted = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match parse_event(&line) {
            None => continue,
            Some(Ok(event)) => {
                debug!(event_id = %event.id, "Change event received");
                handle.submit(event)?;
                submitted += 1;
            }
            Some(Err(e)) => {
                warn!(line = line_no, error = %e, "Skipping malformed change event");
            }
        }
    }

    Ok(submitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::LoggingSink;
    use fleet_redeploy::{CoordinatorConfig, RedeployCoordinator};
    use fleet_types::ServiceFleetSpec;
    use std::sync::Arc;

    #[test]
    fn test_parse_event_line() {
        let event = parse_event(r#"{"id": "evt-1", "attributes": {"source": "settings", "field": "authProvider"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.id.as_str(), "evt-1");
        assert_eq!(event.attributes.get("field").map(String::as_str), Some("authProvider"));

        assert!(parse_event("   ").is_none());
        assert!(parse_event("{not json").unwrap().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_skips_bad_lines_and_flushes_on_shutdown() {
        let input = concat!(
            "{\"id\": \"evt-1\", \"attributes\": {\"source\": \"settings\", \"field\": \"authProvider\"}}\n",
            "garbage\n",
            "\n",
            "{\"id\": \"evt-2\", \"attributes\": {\"source\": \"settings\", \"field\": \"smtpPort\"}}\n",
        );
        let sink = Arc::new(LoggingSink::new());
        let (handle, _task) = RedeployCoordinator::spawn(
            ServiceFleetSpec::standard().trigger_rules,
            CoordinatorConfig::default(),
            sink.clone(),
        );

        let submitted = feed_events(input.as_bytes(), &handle).await.unwrap();
        assert_eq!(submitted, 2);

        handle.shutdown().await.unwrap();
        assert_eq!(sink.acknowledged(), 1);
        assert_eq!(handle.stats().delivered, 1);
    }
}
