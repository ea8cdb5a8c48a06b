use std::path::PathBuf;
use std::time::Duration;

use shared::WINDOW_SIZE;

/// Parameters for the generated level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelConfig {
    pub window_size: i32,
    pub static_platforms: usize,
    pub moving_platforms: usize,
    /// Fixed seed for reproducible levels; random when None
    pub seed: Option<u64>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            static_platforms: 3,
            moving_platforms: 6,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// Zero picks an ephemeral port
    pub port: u16,
    pub tick_rate: u32,
    pub max_clients: usize,
    /// File that receives the bound port number once listening
    pub port_file: Option<PathBuf>,
    pub level: LevelConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            tick_rate: 60,
            max_clients: 32,
            port_file: None,
            level: LevelConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:0");
        assert_eq!(config.level.window_size, WINDOW_SIZE);
        assert!(config.level.seed.is_none());
    }

    #[test]
    fn test_tick_duration_guards_zero_rate() {
        let mut config = ServerConfig::default();
        config.tick_rate = 50;
        assert_eq!(config.tick_duration(), Duration::from_millis(20));
        config.tick_rate = 0;
        assert_eq!(config.tick_duration(), Duration::from_secs(1));
    }
}
