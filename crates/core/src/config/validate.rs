use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Discord token is non-empty
/// - Discord request timeout is non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.discord.token.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "discord.token cannot be empty".to_string(),
        ));
    }

    if config.discord.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "discord.timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, DiscordConfig, ServerConfig};

    fn valid_config() -> Config {
        Config {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            discord: DiscordConfig {
                token: "abc".to_string(),
                api_base: "https://discord.com/api/v10".to_string(),
                timeout_secs: 30,
            },
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = valid_config();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_empty_token_fails() {
        let mut config = valid_config();
        config.discord.token = "  ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
