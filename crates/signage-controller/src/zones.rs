//! Hand-off zone assignment.
//!
//! Devices form a horizontal chain in id order. Every device but the first
//! gets a left-edge zone and every device but the last a right-edge zone.

use signage_common::{DeviceZones, ZoneAssignment, ZoneEdge, ZoneRect};

/// Screen geometry of one device taking part in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceScreen {
    pub device_id: String,
    pub width: u32,
    pub height: u32,
}

/// Compute zones for `screens`, which must already be in chain order.
pub fn assign_zones(screens: &[DeviceScreen], zone_width: u32) -> Vec<ZoneAssignment> {
    let last = screens.len().saturating_sub(1);

    screens
        .iter()
        .enumerate()
        .map(|(index, screen)| {
            let left = (index > 0).then(|| ZoneRect {
                position: ZoneEdge::Left,
                x: 0,
                y: 0,
                width: zone_width,
                height: screen.height,
            });
            let right = (index < last).then(|| ZoneRect {
                position: ZoneEdge::Right,
                x: screen.width.saturating_sub(zone_width),
                y: 0,
                width: zone_width,
                height: screen.height,
            });
            ZoneAssignment {
                device_id: screen.device_id.clone(),
                zone: DeviceZones { left, right },
            }
        })
        .collect()
}
