use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Minimum spacing between two glitch reports for the same route.
pub const DEFAULT_GLITCH_REPORT_INTERVAL: Duration = Duration::from_millis(2000);

/// Packets sampled when the packet layout is ambiguous.
pub const DEFAULT_CLASSIFY_SAMPLE_PACKETS: usize = 8;

lazy_static! {
    static ref CONFIG: RwLock<DemuxConfig> = RwLock::new(DemuxConfig::load());
}

/// Tunables shared by every context a demultiplexor creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxConfig {
    /// Minimum spacing between glitch reports for one route
    pub glitch_report_interval: Duration,
    /// Packets inspected when a buffer length fits both packet layouts
    pub classify_sample_packets: usize,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            glitch_report_interval: DEFAULT_GLITCH_REPORT_INTERVAL,
            classify_sample_packets: DEFAULT_CLASSIFY_SAMPLE_PACKETS,
        }
    }
}

impl DemuxConfig {
    fn load() -> Self {
        let mut config = DemuxConfig::default();

        // Environment first, then config file
        if let Ok(value) = env::var("TSDEMUX_GLITCH_INTERVAL_MS") {
            config.apply("glitch_report_interval_ms", &value);
        }
        if let Ok(value) = env::var("TSDEMUX_CLASSIFY_SAMPLES") {
            config.apply("classify_sample_packets", &value);
        }

        let config_paths = ["./tsdemux.toml", "./tsdemux_config.toml"];
        for path in &config_paths {
            if let Ok(mut file) = File::open(path) {
                let mut content = String::new();
                if file.read_to_string(&mut content).is_ok() {
                    config.apply_lines(&content);
                }
            }
        }

        config
    }

    /// Applies `key = value` lines, ignoring comments and unknown keys.
    pub fn apply_lines(&mut self, content: &str) {
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                self.apply(key.trim(), value);
            }
        }
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "glitch_report_interval_ms" => match value.parse::<u64>() {
                Ok(ms) => self.glitch_report_interval = Duration::from_millis(ms),
                Err(e) => log::warn!("ignoring {} = {:?}: {}", key, value, e),
            },
            "classify_sample_packets" => match value.parse::<usize>() {
                Ok(n) if n > 0 => self.classify_sample_packets = n,
                Ok(_) => log::warn!("ignoring {} = 0", key),
                Err(e) => log::warn!("ignoring {} = {:?}: {}", key, value, e),
            },
            _ => {}
        }
    }

    /// Re-reads the environment and config files into the process-wide default.
    pub fn reload() {
        let new_config = DemuxConfig::load();
        *CONFIG.write() = new_config;
    }
}

/// Returns the process-wide default configuration.
pub fn current() -> DemuxConfig {
    CONFIG.read().clone()
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# TSDEMUX Configuration
# This is a template. Replace the values with your actual configuration.

# Minimum spacing between glitch reports for one route, in milliseconds
glitch_report_interval_ms = 2000

# Packets inspected when a buffer could hold either packet layout
classify_sample_packets = 8
"#;
        std::fs::write(path, template)?;
    }
    Ok(())
}
