//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    ApiConfig, ChannelConfig, LinebotConfig, LogOutput, LoggingConfig, ServerConfig,
};

/// Validates the entire configuration.
pub fn validate_config(config: &LinebotConfig) -> ConfigResult<()> {
    validate_channel(&config.channel)?;
    validate_server(&config.server)?;
    validate_api(&config.api)?;
    validate_logging(&config.logging)?;
    Ok(())
}

fn validate_channel(channel: &ChannelConfig) -> ConfigResult<()> {
    if channel.secret.trim().is_empty() {
        return Err(ConfigError::missing_field("channel.secret"));
    }
    if channel.access_token.trim().is_empty() {
        return Err(ConfigError::missing_field("channel.access_token"));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> ConfigResult<()> {
    if server.host.is_empty() {
        return Err(ConfigError::missing_field("server.host"));
    }
    if server.port == 0 {
        return Err(ConfigError::InvalidPort(server.port));
    }
    if !server.path.starts_with('/') {
        return Err(ConfigError::validation("server.path must start with '/'"));
    }
    Ok(())
}

fn validate_api(api: &ApiConfig) -> ConfigResult<()> {
    validate_url(&api.base_url)?;
    validate_url(&api.data_url)?;
    if api.timeout_ms == 0 {
        return Err(ConfigError::validation("api.timeout_ms must be greater than 0"));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("url"));
    }
    let schemes = ["http://", "https://"];
    if !schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {schemes:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> LinebotConfig {
        let mut config = LinebotConfig::default();
        config.channel.secret = "secret".into();
        config.channel.access_token = "token".into();
        config
    }

    #[test]
    fn defaults_with_credentials_are_valid() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn credentials_are_required() {
        let result = validate_config(&LinebotConfig::default());
        assert!(matches!(
            result,
            Err(ConfigError::MissingField { field }) if field == "channel.secret"
        ));

        let mut config = valid();
        config.channel.access_token = "  ".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { field }) if field == "channel.access_token"
        ));
    }

    #[test]
    fn server_checks() {
        let mut config = valid();
        config.server.port = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPort(0))
        ));

        let mut config = valid();
        config.server.path = "webhook".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn api_urls_need_http_scheme() {
        let mut config = valid();
        config.api.base_url = "ftp://api.line.me".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn file_output_needs_a_path() {
        let mut config = valid();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());
        config.logging.file_path = Some("bot.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
