use crate::domain::{Decimal, FeeAllocation, ProtocolParams, TierWeights};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub params: ProtocolParams,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    /// Every variable is optional; unset ones keep [`ProtocolParams::default`].
    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let mut params = ProtocolParams::default();
        let curve = &mut params.curve;
        set_decimal(&env_map, "R_MIN", &mut curve.r_min)?;
        set_decimal(&env_map, "CONSERVATIVE_TARGET_APY", &mut curve.conservative_target)?;
        set_decimal(&env_map, "BALANCED_TARGET_APY", &mut curve.balanced_target)?;
        set_decimal(&env_map, "K_MIN", &mut curve.k_min)?;
        set_decimal(&env_map, "K_MAX", &mut curve.k_max)?;
        set_decimal(&env_map, "PERFORMANCE_FEE_RATE", &mut params.performance_fee_rate)?;
        set_decimal(&env_map, "INITIAL_RESERVE", &mut params.reserve_amount)?;
        set_decimal(&env_map, "REMOVAL_EPSILON", &mut params.removal_epsilon)?;
        set_decimal(&env_map, "YIELD_PERIOD_FRACTION", &mut params.period_fraction)?;

        if let Some([bonus, buyback, protocol_revenue, insurance]) =
            parse_fractions(&env_map, "FEE_ALLOCATION")?
        {
            params.fee_allocation = FeeAllocation {
                bonus,
                buyback,
                protocol_revenue,
                insurance,
            };
        }
        if let Some([safe, conservative, balanced, hero]) =
            parse_fractions(&env_map, "TARGET_WEIGHTS")?
        {
            params.target_weights = TierWeights::new(safe, conservative, balanced, hero);
        }

        params.reject_yield_shortfall = match env_map
            .get("REJECT_YIELD_SHORTFALL")
            .map(|s| s.as_str())
            .unwrap_or("false")
        {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "REJECT_YIELD_SHORTFALL".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        params
            .validate()
            .map_err(|(name, reason)| ConfigError::InvalidValue(name.to_string(), reason))?;

        Ok(Config { port, params })
    }
}

fn set_decimal(
    env_map: &HashMap<String, String>,
    name: &str,
    slot: &mut Decimal,
) -> Result<(), ConfigError> {
    if let Some(raw) = env_map.get(name) {
        *slot = Decimal::from_str_canonical(raw).map_err(|_| {
            ConfigError::InvalidValue(name.to_string(), format!("not a decimal: {}", raw))
        })?;
    }
    Ok(())
}

/// Four comma-separated decimals, in tier or fee-destination order.
fn parse_fractions(
    env_map: &HashMap<String, String>,
    name: &str,
) -> Result<Option<[Decimal; 4]>, ConfigError> {
    let Some(raw) = env_map.get(name) else {
        return Ok(None);
    };
    let values = raw
        .split(',')
        .map(|s| Decimal::from_str_canonical(s))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| {
            ConfigError::InvalidValue(name.to_string(), format!("not a decimal list: {}", raw))
        })?;
    let values: [Decimal; 4] = values.try_into().map_err(|v: Vec<Decimal>| {
        ConfigError::InvalidValue(
            name.to_string(),
            format!("expected 4 values, got {}", v.len()),
        )
    })?;
    Ok(Some(values))
}
