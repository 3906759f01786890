use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a fallback device id of the form `DEVICE_xxxxxxxx`.
pub fn generate_device_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("DEVICE_{suffix}")
}

/// Identifies one transport connection. A device that reconnects gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

pub fn new_connection_id() -> ConnectionId {
    ConnectionId(Uuid::new_v4())
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_shape() {
        let id = generate_device_id();
        assert!(id.starts_with("DEVICE_"));
        assert_eq!(id.len(), "DEVICE_".len() + 8);
        assert!(id["DEVICE_".len()..]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn connection_ids_are_unique() {
        let a = new_connection_id();
        let b = new_connection_id();
        assert_ne!(a, b);
    }

    #[test]
    fn connection_id_display() {
        let id = ConnectionId(Uuid::nil());
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000000");
    }
}
