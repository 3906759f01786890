//! Host health sampling for heartbeats.
//!
//! Reads procfs and sysfs directly and only shells out where the kernel has
//! no file interface (`df`, and `vcgencmd` on boards without a thermal zone).
//! Every probe is independent: a failed probe leaves its metric `None`.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use signage_common::DeviceMetrics;

/// Aggregate CPU jiffies from the first line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    busy: u64,
    total: u64,
}

pub struct Telemetry {
    proc_root: PathBuf,
    sys_root: PathBuf,
    disk_mount: PathBuf,
    last_cpu: Option<CpuTimes>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::with_roots("/proc", "/sys")
    }
}

impl Telemetry {
    pub fn with_roots(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
            disk_mount: PathBuf::from("/"),
            last_cpu: None,
        }
    }

    /// Take one sample of every metric.
    pub async fn sample(&mut self) -> DeviceMetrics {
        DeviceMetrics {
            temperature: self.temperature().await,
            uptime: self.uptime().await,
            cpu_load: self.cpu_load().await,
            memory_usage: self.memory_usage().await,
            disk_usage: self.disk_usage().await,
            ..Default::default()
        }
    }

    /// Degrees Celsius.
    pub async fn temperature(&self) -> Option<f64> {
        let zone = self.sys_root.join("class/thermal/thermal_zone0/temp");
        if let Some(millis) = read_trimmed(&zone).await.and_then(|s| s.parse::<f64>().ok()) {
            return Some(millis / 1000.0);
        }

        let output = Command::new("vcgencmd").arg("measure_temp").output().await;
        match output {
            Ok(out) if out.status.success() => {
                parse_vcgencmd(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "no temperature source available");
                None
            }
        }
    }

    /// Seconds since boot.
    pub async fn uptime(&self) -> Option<f64> {
        let text = read_trimmed(&self.proc_root.join("uptime")).await?;
        text.split_whitespace().next()?.parse().ok()
    }

    /// Busy share of CPU time since the previous sample, as a percentage.
    /// The first sample covers the time since boot.
    pub async fn cpu_load(&mut self) -> Option<f64> {
        let text = read_trimmed(&self.proc_root.join("stat")).await?;
        let now = parse_cpu_times(&text)?;
        let (busy, total) = match self.last_cpu {
            Some(prev) if now.total > prev.total => {
                (now.busy.saturating_sub(prev.busy), now.total - prev.total)
            }
            _ => (now.busy, now.total),
        };
        self.last_cpu = Some(now);
        if total == 0 {
            return None;
        }
        Some(round2(busy as f64 * 100.0 / total as f64))
    }

    pub async fn memory_usage(&self) -> Option<f64> {
        let text = read_trimmed(&self.proc_root.join("meminfo")).await?;
        parse_meminfo(&text)
    }

    pub async fn disk_usage(&self) -> Option<f64> {
        let out = Command::new("df")
            .arg("-P")
            .arg(&self.disk_mount)
            .output()
            .await
            .ok()?;
        if !out.status.success() {
            return None;
        }
        parse_df(&String::from_utf8_lossy(&out.stdout))
    }
}

async fn read_trimmed(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Some(text.trim().to_string()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "telemetry source unreadable");
            None
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `temp=48.3'C`
fn parse_vcgencmd(output: &str) -> Option<f64> {
    output
        .trim()
        .strip_prefix("temp=")?
        .trim_end_matches("'C")
        .parse()
        .ok()
}

fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    let total: u64 = fields.iter().sum();
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        busy: total.saturating_sub(idle),
        total,
    })
}

fn parse_meminfo(meminfo: &str) -> Option<f64> {
    let field = |name: &str| -> Option<f64> {
        meminfo
            .lines()
            .find(|l| l.starts_with(name))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:").or_else(|| field("MemFree:"))?;
    if total <= 0.0 {
        return None;
    }
    Some(round2((total - available) * 100.0 / total))
}

/// Use% column of the second line of `df -P`.
fn parse_df(output: &str) -> Option<f64> {
    output
        .lines()
        .nth(1)?
        .split_whitespace()
        .nth(4)?
        .trim_end_matches('%')
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_host() -> (tempfile::TempDir, Telemetry) {
        let dir = tempfile::tempdir().unwrap();
        let proc_root = dir.path().join("proc");
        let sys_root = dir.path().join("sys");
        std::fs::create_dir_all(&proc_root).unwrap();
        std::fs::create_dir_all(sys_root.join("class/thermal/thermal_zone0")).unwrap();
        let telemetry = Telemetry::with_roots(proc_root, sys_root);
        (dir, telemetry)
    }

    #[test]
    fn vcgencmd_output() {
        assert_eq!(parse_vcgencmd("temp=48.3'C\n"), Some(48.3));
        assert_eq!(parse_vcgencmd("error"), None);
    }

    #[test]
    fn df_output() {
        let out = "Filesystem 1024-blocks Used Available Capacity Mounted on\n\
                   /dev/root 30000000 12000000 18000000 41% /\n";
        assert_eq!(parse_df(out), Some(41.0));
        assert_eq!(parse_df("header only"), None);
    }

    #[test]
    fn meminfo_prefers_available() {
        let text = "MemTotal: 1000 kB\nMemFree: 100 kB\nMemAvailable: 250 kB\n";
        assert_eq!(parse_meminfo(text), Some(75.0));
        let text = "MemTotal: 1000 kB\nMemFree: 400 kB\n";
        assert_eq!(parse_meminfo(text), Some(60.0));
    }

    #[tokio::test]
    async fn reads_fake_proc_and_sys() {
        let (dir, mut telemetry) = fake_host();
        std::fs::write(dir.path().join("proc/uptime"), "3600.50 7000.00\n").unwrap();
        std::fs::write(
            dir.path().join("sys/class/thermal/thermal_zone0/temp"),
            "61500\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("proc/meminfo"),
            "MemTotal: 2000 kB\nMemAvailable: 500 kB\n",
        )
        .unwrap();

        let metrics = telemetry.sample().await;
        assert_eq!(metrics.uptime, Some(3600.5));
        assert_eq!(metrics.temperature, Some(61.5));
        assert_eq!(metrics.memory_usage, Some(75.0));
        assert_eq!(metrics.cpu_load, None);
    }

    #[tokio::test]
    async fn cpu_load_uses_delta_between_samples() {
        let (dir, mut telemetry) = fake_host();
        let stat = dir.path().join("proc/stat");

        // user nice system idle iowait
        std::fs::write(&stat, "cpu  100 0 100 800 0\ncpu0 100 0 100 800 0\n").unwrap();
        assert_eq!(telemetry.cpu_load().await, Some(20.0));

        std::fs::write(&stat, "cpu  190 0 100 810 0\n").unwrap();
        assert_eq!(telemetry.cpu_load().await, Some(90.0));
    }
}
