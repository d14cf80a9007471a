use clap::Parser;

pub const MIN_INTERVAL_SECS: u64 = 5;
pub const MAX_INTERVAL_SECS: u64 = 60;

#[derive(Parser, Debug)]
#[command(name = "sensorwatch", about = "Live terminal dashboard for a ThingSpeak sensor field")]
pub struct Cli {
    /// ThingSpeak channel id
    #[arg(long)]
    pub channel: String,

    /// Read API key for the channel
    #[arg(long)]
    pub api_key: String,

    /// Field index within the channel (1-8)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=8))]
    pub field: u8,

    /// Alert when the latest value exceeds this threshold
    #[arg(long, default_value_t = 50.0)]
    pub threshold: f64,

    /// Refresh interval in seconds (clamped to 5-60)
    #[arg(long, default_value_t = 10)]
    pub interval: u64,

    /// Start with auto-refresh disabled; readings update only on 'r'
    #[arg(long)]
    pub manual: bool,
}

/// The runtime-adjustable subset of the configuration. The dashboard owns
/// the single writable copy; the poller reads a fresh value every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub threshold: f64,
    pub interval_secs: u64,
    pub auto_refresh: bool,
}

impl Settings {
    pub fn new(threshold: f64, interval_secs: u64, auto_refresh: bool) -> Self {
        Self {
            threshold,
            interval_secs: interval_secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS),
            auto_refresh,
        }
    }

    pub fn from_cli(cli: &Cli) -> Self {
        Self::new(cli.threshold, cli.interval, !cli.manual)
    }

    pub fn adjust_interval(&mut self, delta: i64) {
        let next = self.interval_secs.saturating_add_signed(delta);
        self.interval_secs = next.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS);
    }
}
