pub mod errors;
pub mod events;
pub mod id;
pub mod protocol;
pub mod shutdown;
pub mod types;

pub use errors::{ConfigError, ConnectionError, DispatchError, DownloadError, SignageError};
pub use events::EventBus;
pub use id::{generate_device_id, new_connection_id, ConnectionId};
pub use protocol::{Ack, AckStatus, ControllerEvent, DeviceEvent, Envelope};
pub use shutdown::{shutdown_signal, ShutdownSignal};
pub use types::{
    BallHolderUpdate, BallPosition, BallPositionUpdate, BallState, CacheProgress,
    CacheProgressStatus, CacheRequest, CancelOutcome, CancelSchedule, DeviceAlert, DeviceMetrics,
    DeviceRef, DeviceStale, DeviceUpdate, DeviceZones, DisplayUrl, HeartbeatPayload,
    RegisterDevice, ScheduleStatus, ScheduleStatusReport, SlideshowConfig, Velocity,
    ZoneAssignment, ZoneEdge, ZoneRect,
};

pub type Result<T> = std::result::Result<T, SignageError>;
