//! Server configuration.

use std::time::Duration;

use clap::Parser;

use crate::domain::challenge::{DEFAULT_MAX_PARTICIPANTS, DEFAULT_TIME_LIMIT_SECONDS};

/// Command-line configuration of the coordinator.
#[derive(Parser, Debug, Clone)]
#[command(name = "voltroom-server")]
#[command(
    about = "Real-time room coordinator for circuit editing and timed challenges",
    long_about = None
)]
pub struct ServerConfig {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value_t = 8080)]
    pub port: u16,

    /// Maximum number of participants in one challenge room
    #[arg(long, default_value_t = DEFAULT_MAX_PARTICIPANTS)]
    pub max_participants: usize,

    /// Duration of a challenge round in seconds
    #[arg(long, default_value_t = DEFAULT_TIME_LIMIT_SECONDS)]
    pub time_limit_seconds: u64,

    /// Countdown before a challenge round starts, in seconds
    #[arg(long, default_value_t = 3)]
    pub countdown_seconds: u32,

    /// Tear a room down after it has been empty this long
    #[arg(long, default_value_t = 300)]
    pub idle_timeout_secs: u64,

    /// How often rooms check whether they are idle
    #[arg(long, default_value_t = 30)]
    pub idle_check_interval_secs: u64,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "debug")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn challenge_settings(&self) -> ChallengeSettings {
        ChallengeSettings {
            max_participants: self.max_participants,
            time_limit_seconds: self.time_limit_seconds,
            countdown_seconds: self.countdown_seconds,
            tick_interval: Duration::from_secs(1),
        }
    }

    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            idle_check_interval: Duration::from_secs(self.idle_check_interval_secs.max(1)),
        }
    }
}

/// Parameters of every challenge round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeSettings {
    pub max_participants: usize,
    pub time_limit_seconds: u64,
    /// First value broadcast by the countdown; it counts down to 1.
    pub countdown_seconds: u32,
    pub tick_interval: Duration,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            time_limit_seconds: DEFAULT_TIME_LIMIT_SECONDS,
            countdown_seconds: 3,
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Lifecycle parameters of room actors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub idle_timeout: Duration,
    pub idle_check_interval: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            idle_check_interval: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_room_defaults() {
        // テスト項目: 引数なしで起動した場合の設定値がルームの既定値と一致する
        // given (前提条件):
        let args = ["voltroom-server"];

        // when (操作):
        let config = ServerConfig::parse_from(args);

        // then (期待する結果):
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.challenge_settings(), ChallengeSettings::default());
        assert_eq!(config.runtime_settings(), RuntimeSettings::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        // テスト項目: コマンドライン引数で設定を上書きできる
        // given (前提条件):
        let args = [
            "voltroom-server",
            "--port",
            "3000",
            "--max-participants",
            "4",
            "--time-limit-seconds",
            "60",
            "--idle-check-interval-secs",
            "0",
        ];

        // when (操作):
        let config = ServerConfig::parse_from(args);

        // then (期待する結果):
        let challenge = config.challenge_settings();
        assert_eq!(config.port, 3000);
        assert_eq!(challenge.max_participants, 4);
        assert_eq!(challenge.time_limit_seconds, 60);
        assert_eq!(
            config.runtime_settings().idle_check_interval,
            Duration::from_secs(1)
        );
    }
}
