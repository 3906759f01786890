//! Ball ownership hand-off.
//!
//! One ball exists across the fleet and exactly one device holds it. Only
//! the holder may move it; crossing a screen edge passes it to the
//! neighbouring device in chain order, or bounces it back when there is
//! no neighbour.

use signage_common::{BallHolderUpdate, BallPosition, BallPositionUpdate, BallState, Velocity};
use signage_config::schema::BallConfig;
use tracing::{debug, info};

use crate::zones::DeviceScreen;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Next,
    Prev,
}

/// Result of a position report.
#[derive(Debug, Clone, PartialEq)]
pub enum BallOutcome {
    /// Sender is not the holder.
    Ignored,
    /// Ordinary movement, rebroadcast as-is.
    Moved(BallPositionUpdate),
    /// Edge reached with nowhere to go.
    Bounced(BallPositionUpdate),
    HandedOff {
        holder: BallHolderUpdate,
        position: BallPositionUpdate,
    },
}

/// What a (re)connecting device should be told about the ball.
#[derive(Debug, Clone, PartialEq)]
pub struct BallSnapshot {
    pub holder: BallHolderUpdate,
    /// Last known position, only when the device is itself the holder.
    pub position: Option<BallPositionUpdate>,
}

pub struct BallCoordinator {
    state: BallState,
    config: BallConfig,
}

impl BallCoordinator {
    pub fn new(config: BallConfig, now_ms: i64) -> Self {
        let state = BallState {
            x: 100.0,
            y: 100.0,
            velocity: Velocity::default(),
            timestamp: now_ms,
            current_holder: config.initial_holder.clone(),
        };
        Self { state, config }
    }

    pub fn state(&self) -> &BallState {
        &self.state
    }

    pub fn holder(&self) -> &str {
        &self.state.current_holder
    }

    fn effective_width(&self, reported: Option<u32>) -> f64 {
        match reported {
            Some(w) if w > 0 => f64::from(w),
            _ => f64::from(self.config.default_screen_width),
        }
    }

    /// Apply a position report from `sender`.
    ///
    /// `holder_width` is the sender's reported screen width, `chain` the
    /// connected devices in hand-off order.
    pub fn handle_position(
        &mut self,
        sender: &str,
        position: BallPosition,
        holder_width: Option<u32>,
        chain: &[DeviceScreen],
        now_ms: i64,
    ) -> BallOutcome {
        if sender != self.state.current_holder {
            debug!(sender, holder = %self.state.current_holder, "ignoring ball report from non-holder");
            return BallOutcome::Ignored;
        }

        let width = self.effective_width(holder_width);
        let velocity = position.velocity.unwrap_or_default();

        let direction = if position.x >= width - self.config.edge_margin && velocity.x > 0.0 {
            Some(Direction::Next)
        } else if position.x <= 0.0 && velocity.x < 0.0 {
            Some(Direction::Prev)
        } else {
            None
        };

        let Some(direction) = direction else {
            self.state = BallState {
                x: position.x,
                y: position.y,
                velocity,
                timestamp: now_ms,
                current_holder: sender.to_string(),
            };
            return BallOutcome::Moved(self.state.position_update());
        };

        match neighbour(chain, sender, direction, self.config.wrap_around) {
            Some(target) => {
                let target_width = self.effective_width(Some(target.width));
                let x = match direction {
                    Direction::Next => self.config.entry_offset,
                    Direction::Prev => target_width - self.config.entry_offset,
                };
                info!(from = sender, to = %target.device_id, ?direction, "ball handed off");

                self.state = BallState {
                    x,
                    y: position.y,
                    velocity,
                    timestamp: now_ms,
                    current_holder: target.device_id.clone(),
                };
                BallOutcome::HandedOff {
                    holder: BallHolderUpdate {
                        current_holder: target.device_id.clone(),
                        previous_holder: Some(sender.to_string()),
                    },
                    position: self.state.position_update(),
                }
            }
            None => {
                let x = match direction {
                    Direction::Next => width - self.config.edge_margin,
                    Direction::Prev => self.config.entry_offset,
                };
                debug!(sender, ?direction, "ball bounced");

                self.state = BallState {
                    x,
                    y: position.y,
                    velocity: Velocity {
                        x: -velocity.x * self.config.bounce_damping,
                        y: 0.0,
                    },
                    timestamp: now_ms,
                    current_holder: sender.to_string(),
                };
                BallOutcome::Bounced(self.state.position_update())
            }
        }
    }

    /// State to replay to `device_id` after it connects.
    pub fn snapshot_for(&self, device_id: &str, now_ms: i64) -> BallSnapshot {
        let holder = BallHolderUpdate {
            current_holder: self.state.current_holder.clone(),
            previous_holder: None,
        };
        let position = (device_id == self.state.current_holder).then(|| {
            let mut update = self.state.position_update();
            update.timestamp = now_ms;
            update
        });
        BallSnapshot { holder, position }
    }

    /// Move the ball off a departed holder.
    ///
    /// `chain` must no longer contain `departed`. Returns `None` when the
    /// ball stays put: failover disabled, someone else holds it, or no
    /// device is left to take it.
    pub fn fail_over(
        &mut self,
        departed: &str,
        chain: &[DeviceScreen],
        now_ms: i64,
    ) -> Option<(BallHolderUpdate, BallPositionUpdate)> {
        if !self.config.failover_on_disconnect || departed != self.state.current_holder {
            return None;
        }

        let target = chain
            .iter()
            .find(|s| s.device_id.as_str() > departed)
            .or_else(|| chain.first())?;

        info!(from = departed, to = %target.device_id, "ball holder disconnected, failing over");
        self.state = BallState {
            x: self.config.entry_offset,
            y: self.state.y,
            velocity: self.state.velocity,
            timestamp: now_ms,
            current_holder: target.device_id.clone(),
        };
        Some((
            BallHolderUpdate {
                current_holder: target.device_id.clone(),
                previous_holder: Some(departed.to_string()),
            },
            self.state.position_update(),
        ))
    }
}

/// Adjacent device in `direction`. `None` when the sender is not in the
/// chain, is alone in it, or sits at the end being crossed without `wrap`.
fn neighbour<'a>(
    chain: &'a [DeviceScreen],
    current: &str,
    direction: Direction,
    wrap: bool,
) -> Option<&'a DeviceScreen> {
    let index = chain.iter().position(|s| s.device_id == current)?;
    let len = chain.len();
    let target = match direction {
        Direction::Next if index + 1 < len => index + 1,
        Direction::Prev if index > 0 => index - 1,
        Direction::Next if wrap => 0,
        Direction::Prev if wrap => len - 1,
        _ => return None,
    };
    (target != index).then(|| &chain[target])
}
