use railbook_catalog::CatalogLimits;
use railbook_order::OrderLimits;
use serde::Deserialize;

/// Runtime configuration, layered from optional files and the
/// environment. Every knob has a default, so running with no config at
/// all reproduces the legacy constants.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogLimits,
    #[serde(default)]
    pub orders: OrderLimits,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            // Local overrides, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // E.g. RAILBOOK_CATALOG__MAX_STATIONS=50
            .add_source(config::Environment::with_prefix("RAILBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
