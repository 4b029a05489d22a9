//! Chain configuration and the fork-epoch schedule.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Chain configuration.
///
/// Loaded from a single `meridian.toml` file. The fork schedule determines
/// which consensus rules are active at a given epoch; the rest of the
/// codebase consults it only through the named predicates below, so the
/// activation epochs themselves never leak into consensus code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Unique chain identifier
    pub chain_id: u64,

    /// Human-readable chain name
    pub chain_name: String,

    /// Block reward per block in the smallest unit (string for large numbers)
    pub block_reward: String,

    /// Fork activation schedule
    #[serde(default)]
    pub forks: ForkSchedule,
}

/// Fork activation schedule.
///
/// Each field names the first epoch at which the fork is active; `None`
/// means the fork never activates on this chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkSchedule {
    /// Epoch at which validators may pre-register for staking and the beacon
    /// shard starts producing committee-selection blocks
    pub pre_staking_epoch: Option<u64>,

    /// Epoch at which stake-weighted committees and quorums take effect
    pub staking_epoch: Option<u64>,

    /// Epoch at which re-delegation of undelegated-but-locked stake opens
    pub redelegation_epoch: Option<u64>,

    /// Epoch at which the shortened undelegation lock period takes effect
    pub quick_unlock_epoch: Option<u64>,

    /// Epoch at which early unlock (validator out of committee) is disabled
    pub no_early_unlock_epoch: Option<u64>,

    /// Epoch at which the S3 state-trie conventions take effect
    pub s3_epoch: Option<u64>,
}

impl ForkSchedule {
    fn active(epoch_field: Option<u64>, epoch: u64) -> bool {
        matches!(epoch_field, Some(activation) if epoch >= activation)
    }
}

impl ChainConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        info!(path = %path.display(), "loading chain configuration");

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: ChainConfig = toml::from_str(&content)?;
        config.validate()?;

        debug!(
            chain_id = config.chain_id,
            chain_name = %config.chain_name,
            "chain configuration loaded"
        );
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: ChainConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.chain_id == 0 {
            return Err(ConfigError::InvalidChainId);
        }
        if self.block_reward.parse::<u128>().is_err() {
            return Err(ConfigError::InvalidBalance(self.block_reward.clone()));
        }
        if let (Some(pre), Some(staking)) =
            (self.forks.pre_staking_epoch, self.forks.staking_epoch)
        {
            if staking < pre {
                return Err(ConfigError::ForkOrdering {
                    earlier: "pre_staking_epoch",
                    earlier_epoch: pre,
                    later: "staking_epoch",
                    later_epoch: staking,
                });
            }
        }
        Ok(())
    }

    /// Returns the block reward as an integer.
    pub fn block_reward_amount(&self) -> u128 {
        self.block_reward.parse().unwrap_or(0)
    }

    /// Whether stake-weighted committees are active at `epoch`.
    pub fn is_staking(&self, epoch: u64) -> bool {
        ForkSchedule::active(self.forks.staking_epoch, epoch)
    }

    /// Whether the pre-staking rules are active at `epoch`.
    pub fn is_pre_staking(&self, epoch: u64) -> bool {
        ForkSchedule::active(self.forks.pre_staking_epoch, epoch)
    }

    /// Whether re-delegation is open at `epoch`.
    pub fn is_redelegation(&self, epoch: u64) -> bool {
        ForkSchedule::active(self.forks.redelegation_epoch, epoch)
    }

    /// Whether the shortened undelegation lock period applies at `epoch`.
    pub fn is_quick_unlock(&self, epoch: u64) -> bool {
        ForkSchedule::active(self.forks.quick_unlock_epoch, epoch)
    }

    /// Whether early unlock is disabled at `epoch`.
    pub fn is_no_early_unlock(&self, epoch: u64) -> bool {
        ForkSchedule::active(self.forks.no_early_unlock_epoch, epoch)
    }

    /// Whether the S3 state-trie conventions apply at `epoch`.
    pub fn is_s3(&self, epoch: u64) -> bool {
        ForkSchedule::active(self.forks.s3_epoch, epoch)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            chain_name: "meridian-local".to_string(),
            block_reward: "2000000000000000000".to_string(),
            forks: ForkSchedule {
                pre_staking_epoch: Some(2),
                staking_epoch: Some(10),
                redelegation_epoch: Some(20),
                quick_unlock_epoch: Some(25),
                no_early_unlock_epoch: Some(25),
                s3_epoch: Some(1),
            },
        }
    }
}
