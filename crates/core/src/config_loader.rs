use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from defaults, the TOML file and `OPTDESK_` environment variables.
    ///
    /// Nested keys use a double underscore, e.g. `OPTDESK_RISK__OPTIMIZER_LIMIT_PCT=10`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration from an explicit TOML path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be parsed.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Self::base(path)
            .merge(Env::prefixed("OPTDESK_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Loads configuration with a profile overlay (`config/Config.{profile}.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        let config: AppConfig = Self::base(DEFAULT_CONFIG_PATH)
            .merge(Toml::file(format!("config/Config.{profile}.toml")))
            .merge(Env::prefixed("OPTDESK_").split("__"))
            .extract()?;

        Ok(config)
    }

    fn base(path: &str) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::file(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = ConfigLoader::load_from("config/does-not-exist.toml").unwrap();
        assert_eq!(config.market.reference_index, "SPY");
        assert_eq!(config.signal.min_history, 50);
    }

    #[test]
    fn toml_overrides_single_field() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "desk.toml",
                r#"
                [lifecycle]
                exit_dte = 14
                "#,
            )?;
            let config = ConfigLoader::load_from("desk.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.lifecycle.exit_dte, 14);
            assert_eq!(config.lifecycle.roll_max_dte, 45);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_nested_field() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("OPTDESK_SCAN__SYMBOL_DELAY_MS", "0");
            let config = ConfigLoader::load_from("absent.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.scan.symbol_delay_ms, 0);
            Ok(())
        });
    }
}
