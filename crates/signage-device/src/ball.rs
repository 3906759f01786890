//! This device's view of the shared ball.

use signage_common::{BallHolderUpdate, BallPositionUpdate, DeviceZones, ZoneAssignment};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BallView {
    pub holder: Option<String>,
    pub position: Option<BallPositionUpdate>,
    pub zones: DeviceZones,
}

impl BallView {
    pub fn holds_ball(&self, device_id: &str) -> bool {
        self.holder.as_deref() == Some(device_id)
    }

    pub fn apply_holder(&mut self, update: BallHolderUpdate) {
        self.holder = Some(update.current_holder);
    }

    pub fn apply_position(&mut self, update: BallPositionUpdate) {
        self.holder = Some(update.current_holder.clone());
        self.position = Some(update);
    }

    /// Pick out this device's zones. A device missing from the list has none.
    pub fn apply_zones(&mut self, assignments: &[ZoneAssignment], device_id: &str) {
        self.zones = assignments
            .iter()
            .find(|a| a.device_id == device_id)
            .map(|a| a.zone)
            .unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use signage_common::{Velocity, ZoneEdge, ZoneRect};

    use super::*;

    #[test]
    fn position_update_also_moves_holder() {
        let mut view = BallView::default();
        view.apply_holder(BallHolderUpdate {
            current_holder: "device1".into(),
            previous_holder: None,
        });
        assert!(view.holds_ball("device1"));

        view.apply_position(BallPositionUpdate {
            device_id: "device2".into(),
            x: 10.0,
            y: 40.0,
            velocity: Velocity { x: 5.0, y: 0.0 },
            timestamp: 1,
            current_holder: "device2".into(),
        });
        assert!(view.holds_ball("device2"));
        assert_eq!(view.position.as_ref().map(|p| p.x), Some(10.0));
    }

    #[test]
    fn zones_for_self_only() {
        let right = ZoneRect {
            position: ZoneEdge::Right,
            x: 1014,
            y: 0,
            width: 10,
            height: 768,
        };
        let assignments = vec![
            ZoneAssignment {
                device_id: "device1".into(),
                zone: DeviceZones {
                    left: None,
                    right: Some(right),
                },
            },
            ZoneAssignment {
                device_id: "device2".into(),
                zone: DeviceZones::default(),
            },
        ];

        let mut view = BallView::default();
        view.apply_zones(&assignments, "device1");
        assert_eq!(view.zones.right, Some(right));

        view.apply_zones(&assignments, "device3");
        assert_eq!(view.zones.count(), 0);
    }
}
