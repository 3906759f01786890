use tokio::sync::broadcast;

use crate::protocol::ControllerEvent;

/// Fan-out of fleet-wide controller events to every connected device and
/// dashboard observer.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ControllerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ControllerEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceAlert, DeviceRef};

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(ControllerEvent::DevicesUpdated);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ControllerEvent::DevicesUpdated));
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(ControllerEvent::DeviceRebootFailed(DeviceRef {
            device_id: "device1".into(),
        }));

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert!(matches!(e1, ControllerEvent::DeviceRebootFailed(ref d) if d.device_id == "device1"));
        assert!(matches!(e2, ControllerEvent::DeviceRebootFailed(_)));
    }

    #[tokio::test]
    async fn alert_event_carries_all_alerts() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(ControllerEvent::DeviceAlert(DeviceAlert {
            device_id: "device2".into(),
            alerts: vec!["High temperature: 80°C".into(), "High CPU load: 90%".into()],
        }));

        match rx.recv().await.unwrap() {
            ControllerEvent::DeviceAlert(alert) => {
                assert_eq!(alert.device_id, "device2");
                assert_eq!(alert.alerts.len(), 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn publish_returns_zero_with_no_subscribers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(ControllerEvent::DevicesUpdated), 0);
    }

    #[tokio::test]
    async fn publish_returns_subscriber_count() {
        let bus = EventBus::new(16);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.clone().subscribe();

        assert_eq!(bus.publish(ControllerEvent::DevicesUpdated), 2);
    }
}
