//! Circuit configuration shared by prover and verifier.
//!
//! Every value here changes the constraint system, so a proving key is only
//! valid for the exact configuration it was generated with.

use serde::{Deserialize, Serialize};

use crate::error::CircuitError;

/// Depth of the accounts Merkle tree.
pub const TREE_DEPTH_ACCOUNTS: usize = 24;

/// Depth of the trading history Merkle tree.
pub const TREE_DEPTH_TRADING_HISTORY: usize = 16;

/// Depth of the token tree (bounds the token id width).
pub const TREE_DEPTH_TOKENS: usize = 12;

/// Width of an order id.
pub const NUM_BITS_ORDER_ID: usize = 4;

/// Width of a wallet id.
pub const NUM_BITS_WALLET_ID: usize = 24;

/// Width of the padding appended to the signed message.
pub const NUM_BITS_PADDING: usize = 1;

/// Token id of ether.
pub const TOKEN_ID_ETH: u32 = 0;

/// Largest tree depth we accept; leaf indices are handled as `u64`.
/// Also keeps the packed signed message well inside one field element.
const MAX_TREE_DEPTH: usize = 62;

/// What to do when the order being cancelled is already cancelled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecancelPolicy {
    /// Enforce `cancelledBefore != 1`.
    #[default]
    Reject,
    /// Leave `cancelledBefore` unconstrained.
    Allow,
}

/// Sizes and policies baked into the circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitConfig {
    pub accounts_depth: usize,
    pub trade_history_depth: usize,
    pub token_depth: usize,
    pub order_id_bits: usize,
    pub wallet_id_bits: usize,
    pub padding_bits: usize,
    #[serde(default)]
    pub recancel: RecancelPolicy,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            accounts_depth: TREE_DEPTH_ACCOUNTS,
            trade_history_depth: TREE_DEPTH_TRADING_HISTORY,
            token_depth: TREE_DEPTH_TOKENS,
            order_id_bits: NUM_BITS_ORDER_ID,
            wallet_id_bits: NUM_BITS_WALLET_ID,
            padding_bits: NUM_BITS_PADDING,
            recancel: RecancelPolicy::Reject,
        }
    }
}

impl CircuitConfig {
    /// Check that the configuration describes a buildable circuit.
    pub fn validate(&self) -> Result<(), CircuitError> {
        for (name, depth) in [
            ("accounts_depth", self.accounts_depth),
            ("trade_history_depth", self.trade_history_depth),
            ("token_depth", self.token_depth),
        ] {
            if depth == 0 || depth > MAX_TREE_DEPTH {
                return Err(CircuitError::InvalidConfig(format!(
                    "{} must be in 1..={}, got {}",
                    name, MAX_TREE_DEPTH, depth
                )));
            }
        }

        if self.order_id_bits == 0 || self.order_id_bits > MAX_TREE_DEPTH {
            return Err(CircuitError::InvalidConfig(format!(
                "order_id_bits must be in 1..={}, got {}",
                MAX_TREE_DEPTH, self.order_id_bits
            )));
        }

        if self.wallet_id_bits == 0 || self.wallet_id_bits > 32 {
            return Err(CircuitError::InvalidConfig(format!(
                "wallet_id_bits must be in 1..=32, got {}",
                self.wallet_id_bits
            )));
        }

        if self.padding_bits > 8 {
            return Err(CircuitError::InvalidConfig(format!(
                "padding_bits must be at most 8, got {}",
                self.padding_bits
            )));
        }

        // The trade history address is cut from orderId ‖ account.
        if self.trade_history_depth > self.order_id_bits + self.accounts_depth {
            return Err(CircuitError::InvalidConfig(format!(
                "trade_history_depth {} exceeds order_id_bits + accounts_depth ({})",
                self.trade_history_depth,
                self.order_id_bits + self.accounts_depth
            )));
        }

        Ok(())
    }

    /// Width of the signed message: account ‖ orderId ‖ padding.
    pub fn message_bits(&self) -> usize {
        self.accounts_depth + self.order_id_bits + self.padding_bits
    }

    /// Public data bits contributed by one cancellation.
    pub fn public_data_bits_per_cancel(&self) -> usize {
        self.accounts_depth + self.order_id_bits
    }

    /// Width of a token id, bounded by the token tree.
    pub fn token_id_bits(&self) -> usize {
        self.token_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CircuitConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.message_bits(), 29);
        assert_eq!(config.public_data_bits_per_cancel(), 28);
        assert_eq!(config.recancel, RecancelPolicy::Reject);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = CircuitConfig {
            accounts_depth: 0,
            ..CircuitConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CircuitError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_trade_history_deeper_than_address_rejected() {
        let config = CircuitConfig {
            accounts_depth: 4,
            order_id_bits: 4,
            trade_history_depth: 9,
            ..CircuitConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_wallet_width_bounded() {
        let config = CircuitConfig {
            wallet_id_bits: 33,
            ..CircuitConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serde_roundtrip_keeps_policy() {
        let config = CircuitConfig {
            recancel: RecancelPolicy::Allow,
            ..CircuitConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"allow\""));
        let back: CircuitConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
