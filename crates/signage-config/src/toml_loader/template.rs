//! Default TOML templates with inline documentation comments.

pub(crate) const CONTROLLER_TEMPLATE: &str = r##"# Signage controller configuration
# Only override what you want to change -- missing fields use defaults.

[server]
# listen_addr = "0.0.0.0:8085"
# register_timeout_secs = 10     # 1-300

[liveness]
# Seconds without a heartbeat before a session is closed. 0 disables the sweep.
# heartbeat_timeout_secs = 0
# sweep_interval_secs = 10        # 1-3600

[alerts]
# temperature = 75.0              # degrees C
# cpu_load = 85.0                 # percent
# memory_usage = 90.0             # percent
# disk_usage = 90.0               # percent

[reboot]
# verify_after_secs = 180

[ball]
# edge_margin = 250.0
# default_screen_width = 1024
# entry_offset = 10.0
# bounce_damping = 0.8            # 0.0-1.0
# zone_width = 10
# device_prefix = "device"
# initial_holder = "device1"
# wrap_around = false
# failover_on_disconnect = true

[logging]
# level = "info"                  # trace, debug, info, warn, error
"##;

pub(crate) const DEVICE_TEMPLATE: &str = r##"# Signage kiosk configuration
# Only override what you want to change -- missing fields use defaults.
# DEVICE_ID, SERVER_URL, SOCKET_URL, CACHE_DIR, RECONNECT_INTERVAL (ms) and
# MAX_RETRIES in the environment take precedence over this file.

[device]
# A random DEVICE_xxxxxxxx id is generated on each start when unset.
# id = "device1"

[server]
# url = "http://127.0.0.1:8085"
# socket_url = "ws://127.0.0.1:8085/ws"

[connection]
# reconnect_interval_secs = 5
# max_retries = 10
# heartbeat_interval_secs = 5
# health_timeout_secs = 5

[cache]
# dir = "cache"
# sweep_interval_secs = 3600
# max_age_secs = 86400

[display]
# url_file = "/home/pi/current_url.txt"
# reload_flag_file = "/home/pi/reload_flag"
# slideshow_file = "/home/pi/slideshow.json"
# check_interval_secs = 30
# Reported in heartbeats for hand-off zones; 0 means unknown.
# screen_width = 1920
# screen_height = 1080

[system]
# reboot_command = "sudo reboot"

[logging]
# level = "info"
"##;
