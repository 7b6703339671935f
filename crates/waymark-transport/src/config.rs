//! Tunables for the transport network.

use serde::{Deserialize, Serialize};

/// Transport configuration, normally loaded as the `transport` section of
/// the simulation config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Delay in game milliseconds between a change and the balance pass it
    /// triggers. Changes arriving inside the window share one pass.
    #[serde(default = "default_balance_delay_ms")]
    pub balance_delay_ms: u64,

    /// Maximum route cost (in steps) considered when pairing a request with
    /// a supply. `None` searches without bound.
    #[serde(default = "default_cost_cutoff")]
    pub cost_cutoff: Option<u32>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            balance_delay_ms: default_balance_delay_ms(),
            cost_cutoff: default_cost_cutoff(),
        }
    }
}

const fn default_balance_delay_ms() -> u64 {
    200
}

#[allow(clippy::unnecessary_wraps)]
const fn default_cost_cutoff() -> Option<u32> {
    Some(1000)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.balance_delay_ms, 200);
        assert_eq!(config.cost_cutoff, Some(1000));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: TransportConfig = serde_json::from_str(r#"{"cost_cutoff": null}"#).unwrap();
        assert_eq!(config.balance_delay_ms, 200);
        assert_eq!(config.cost_cutoff, None);
    }
}
