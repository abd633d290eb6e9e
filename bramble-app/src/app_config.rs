use bramble_catalog::{Product, ReservationMode};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub simulation: SimulationConfig,
    pub payment: PaymentConfig,
    pub reservation: ReservationConfig,
    /// Seed catalog loaded into the ledger at startup.
    pub catalog: Vec<Product>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    pub pickers: u32,
    pub customer_id: String,
    /// Stock level at or below which the warehouse pass tops a product up.
    pub restock_threshold: u32,
    pub restock_amount: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub decline_rate: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationConfig {
    pub mode: ReservationMode,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overlay, optional.
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // E.g. BRAMBLE__PAYMENT__DECLINE_RATE=0.5
            .add_source(config::Environment::with_prefix("BRAMBLE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_mode_parses_from_config_names() {
        let cfg: ReservationConfig =
            serde_json::from_str(r#"{"mode": "LEGACY_PARTIAL"}"#).unwrap();
        assert_eq!(cfg.mode, ReservationMode::LegacyPartial);
    }
}
