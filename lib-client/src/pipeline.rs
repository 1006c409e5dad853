//! Transaction Pipeline
//!
//! Every mutating call goes through the same five steps:
//!
//! ```text
//! pending nonce ──► estimate gas ──► apply margin ──► descriptor ──► wallet
//!   (sender)         (skipped if       ceil(g * m)      (fresh)      sign + send
//!                     limit given)
//! ```
//!
//! Nothing is retried here and no local state is touched; callers decide
//! what a successful broadcast means for their cached state.

use std::sync::Arc;

use lib_types::{Address, Gas, Nonce, TxHash};
use tracing::{debug, info, warn};

use crate::abi::{from_alloy_address, to_alloy_address};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::payload::CallPayload;
use crate::rpc::{LedgerRpc, TransactionDescriptor, Wallet};

/// Multiply an estimate by `margin`, rounding up to a whole unit
pub fn apply_gas_margin(estimate: Gas, margin: f64) -> Gas {
    (estimate as f64 * margin).ceil() as Gas
}

/// Address a contract created by `deployer` with `nonce` will receive
pub fn future_contract_address(deployer: &Address, nonce: Nonce) -> Address {
    from_alloy_address(&to_alloy_address(deployer).create(nonce))
}

/// Nonce, estimate, margin and broadcast for a single call
#[derive(Clone)]
pub struct TransactionPipeline {
    rpc: Arc<dyn LedgerRpc>,
    gas_margin: f64,
}

impl TransactionPipeline {
    pub fn new(rpc: Arc<dyn LedgerRpc>, gas_margin: f64) -> Self {
        Self { rpc, gas_margin }
    }

    /// Pipeline using the configured margin; the config is validated first
    pub fn from_config(rpc: Arc<dyn LedgerRpc>, config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(rpc, config.gas_margin))
    }

    pub fn rpc(&self) -> &Arc<dyn LedgerRpc> {
        &self.rpc
    }

    pub fn gas_margin(&self) -> f64 {
        self.gas_margin
    }

    /// Submit `payload` from `from` and return the broadcast hash
    ///
    /// # Errors
    /// - `Ledger` if the pending nonce cannot be resolved
    /// - `Estimation` if the dry run fails (the call would most likely revert)
    /// - `Submission` if signing or broadcast fails
    pub async fn submit(
        &self,
        wallet: &dyn Wallet,
        from: Address,
        payload: &CallPayload,
        explicit_gas: Option<Gas>,
    ) -> Result<TxHash> {
        let nonce = self.rpc.pending_nonce(from).await?;
        debug!("{} from {} uses nonce {}", payload.method, from, nonce);

        let gas = match explicit_gas {
            Some(limit) => limit,
            None => {
                let estimate = self.rpc.estimate_gas(from, payload).await.map_err(|e| {
                    warn!("Gas estimation failed for {}: {}", payload.method, e);
                    ClientError::estimation(&payload.method, e)
                })?;
                let gas = apply_gas_margin(estimate, self.gas_margin);
                debug!("{} estimated at {} gas, {} with margin", payload.method, estimate, gas);
                gas
            }
        };

        let tx = TransactionDescriptor {
            nonce,
            from,
            to: payload.to,
            data: payload.data.clone(),
            gas,
            method: payload.method.clone(),
        };

        let hash = wallet.sign_and_send(&tx).await.map_err(|e| {
            warn!("Submission of {} failed: {}", payload.method, e);
            ClientError::submission(&payload.method, e)
        })?;

        info!("📤 {} sent to {} (nonce {}, gas {}): {}", tx.method, tx.to, nonce, gas, hash);
        Ok(hash)
    }
}

impl std::fmt::Debug for TransactionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionPipeline")
            .field("gas_margin", &self.gas_margin)
            .finish_non_exhaustive()
    }
}
