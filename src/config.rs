//! Runtime configuration, read from the environment (and `.env`).

use crate::error::ConfigError;

pub const DEFAULT_MAX_CONCURRENT_GAMES: usize = 2;
pub const DEFAULT_PORT: u16 = 3001;

/// The only knob the matchmaking core accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyConfig {
  /// Upper bound on simultaneously active sessions, waiting ones included.
  pub max_concurrent_games: usize,
}

impl Default for LobbyConfig {
  fn default() -> Self {
    Self {
      max_concurrent_games: DEFAULT_MAX_CONCURRENT_GAMES,
    }
  }
}

impl LobbyConfig {
  pub fn with_capacity(max_concurrent_games: usize) -> Result<Self, ConfigError> {
    if max_concurrent_games == 0 {
      return Err(ConfigError::InvalidCapacity("0".to_string()));
    }
    Ok(Self {
      max_concurrent_games,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
  pub port: u16,
  pub lobby: LobbyConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      port: DEFAULT_PORT,
      lobby: LobbyConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Reads `PORT` and `MAX_CONCURRENT_GAMES`, falling back to defaults when
  /// unset.
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_vars(
      std::env::var("PORT").ok(),
      std::env::var("MAX_CONCURRENT_GAMES").ok(),
    )
  }

  fn from_vars(port: Option<String>, capacity: Option<String>) -> Result<Self, ConfigError> {
    let port = match port {
      Some(raw) => raw
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
      None => DEFAULT_PORT,
    };

    let lobby = match capacity {
      Some(raw) => {
        let max = raw
          .trim()
          .parse::<usize>()
          .map_err(|_| ConfigError::InvalidCapacity(raw.clone()))?;
        LobbyConfig::with_capacity(max)?
      }
      None => LobbyConfig::default(),
    };

    Ok(Self { port, lobby })
  }

  pub fn addr(&self) -> String {
    format!("0.0.0.0:{}", self.port)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_when_unset() {
    let config = ServerConfig::from_vars(None, None).unwrap();
    assert_eq!(config, ServerConfig::default());
    assert_eq!(config.lobby.max_concurrent_games, 2);
    assert_eq!(config.addr(), "0.0.0.0:3001");
  }

  #[test]
  fn parses_overrides() {
    let config = ServerConfig::from_vars(Some("8080".into()), Some(" 16 ".into())).unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.lobby.max_concurrent_games, 16);
  }

  #[test]
  fn rejects_zero_or_garbage_capacity() {
    assert!(matches!(
      ServerConfig::from_vars(None, Some("0".into())),
      Err(ConfigError::InvalidCapacity(_))
    ));
    assert!(matches!(
      ServerConfig::from_vars(None, Some("lots".into())),
      Err(ConfigError::InvalidCapacity(_))
    ));
  }

  #[test]
  fn rejects_bad_port() {
    assert!(matches!(
      ServerConfig::from_vars(Some("99999".into()), None),
      Err(ConfigError::InvalidPort(_))
    ));
  }
}
