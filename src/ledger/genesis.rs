use crate::config::{ChainConfig, Config, TokenConfig};
use crate::crypto::{derive_dev_accounts, DevAccount};
use crate::error::{LedgerError, Result};

/// Everything needed to build block 0 and the token deployment. Deriving the
/// dev accounts is the expensive part, so a `Genesis` can be built once and
/// cloned into many ledgers.
#[derive(Debug, Clone)]
pub struct Genesis {
    pub chain: ChainConfig,
    pub token: TokenConfig,
    pub account_balance: u128,
    pub dev_accounts: Vec<DevAccount>,
}

impl Genesis {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let dev_accounts = derive_dev_accounts(
            &config.accounts.mnemonic,
            &config.accounts.path,
            config.accounts.count,
        )?;

        Ok(Genesis {
            chain: config.chain.clone(),
            token: config.token.clone(),
            account_balance: config.accounts.balance,
            dev_accounts,
        })
    }

    pub fn owner(&self) -> Result<&DevAccount> {
        self.dev_accounts
            .get(self.token.owner_index as usize)
            .ok_or_else(|| {
                LedgerError::Config(format!(
                    "token.owner_index {} is out of range for {} accounts",
                    self.token.owner_index,
                    self.dev_accounts.len()
                ))
            })
    }
}
