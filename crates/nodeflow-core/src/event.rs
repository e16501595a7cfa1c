use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tracing::warn;

use crate::types::WorkflowEvent;

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: WorkflowEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }
}

/// Next event for a subscriber. A subscriber that fell behind skips the
/// overwritten events and keeps going; `None` once the bus is gone.
pub async fn next_event(rx: &mut Receiver<WorkflowEvent>) -> Option<WorkflowEvent> {
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event subscriber fell behind, notifications dropped");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunId;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(WorkflowEvent::CycleSuspected {
            run_id: RunId::new(),
            fallback_node: "a".into(),
        });
        match rx.recv().await.unwrap() {
            WorkflowEvent::CycleSuspected { fallback_node, .. } => assert_eq!(fallback_node, "a"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    fn cycle(node: &str) -> WorkflowEvent {
        WorkflowEvent::CycleSuspected {
            run_id: RunId::new(),
            fallback_node: node.into(),
        }
    }

    #[tokio::test]
    async fn test_next_event_survives_lag() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for node in ["a", "b", "c", "d"] {
            bus.publish(cycle(node));
        }

        let mut seen = Vec::new();
        for _ in 0..2 {
            match next_event(&mut rx).await {
                Some(WorkflowEvent::CycleSuspected { fallback_node, .. }) => seen.push(fallback_node),
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert_eq!(seen, vec!["c", "d"]);

        drop(bus);
        assert!(next_event(&mut rx).await.is_none());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(WorkflowEvent::CycleSuspected {
            run_id: RunId::new(),
            fallback_node: "a".into(),
        });
    }
}
