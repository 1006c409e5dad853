//! Ledger-backed hotel
//!
//! A hotel contract holds only its `url` and `manager`; richer data lives
//! wherever the url points. `LedgerHotel` binds those two fields to a
//! [`RemoteDataset`] and drives its deploy state through the index:
//!
//! ```text
//! new ──set_local_data──► create_on_network ──► Pending (predicted address)
//!                                                  │ confirm_deployment
//!                                                  ▼
//!            update_on_network ◄──────────────── Deployed
//!                                                  │ remove_from_network
//!                                                  ▼
//!                                               Obsolete
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use lib_client::{
    future_contract_address, AbiValue, ClientError, ContractKind, LedgerError, Result, TxOptions,
    Wallet,
};
use lib_types::{Address, TxHash};
use tracing::info;

use crate::context::{expect_address, expect_string, HotelContext};
use crate::dataset::{DeployState, RemoteDataset, RemoteGetter, RemoteSetter, SyncReport};
use crate::index::HotelRecord;

const FIELD_URL: &str = "url";
const FIELD_MANAGER: &str = "manager";

// ============================================================================
// FIELD CAPABILITIES
// ============================================================================

/// Reads a no-argument getter of the hotel contract
struct HotelGetter {
    ctx: Arc<HotelContext>,
    method: &'static str,
}

#[async_trait]
impl RemoteGetter for HotelGetter {
    async fn get(&self, address: Address) -> Result<AbiValue> {
        self.ctx
            .call_single(ContractKind::Hotel, address, self.method, vec![])
            .await
    }
}

/// `editInfo(url)` forwarded through the index
struct EditInfoSetter {
    ctx: Arc<HotelContext>,
}

#[async_trait]
impl RemoteSetter for EditInfoSetter {
    async fn set(
        &self,
        wallet: &dyn Wallet,
        options: &TxOptions,
        address: Address,
        value: &AbiValue,
    ) -> Result<TxHash> {
        let inner = self
            .ctx
            .payload(ContractKind::Hotel, address, "editInfo", vec![value.clone()])?;
        self.ctx.execute_on_hotel(wallet, options, &inner).await
    }
}

// ============================================================================
// HOTEL
// ============================================================================

/// A hotel whose authoritative state is its contract
pub struct LedgerHotel {
    ctx: Arc<HotelContext>,
    dataset: RemoteDataset,
    creation_tx: Option<TxHash>,
}

impl LedgerHotel {
    /// A hotel that exists only locally
    pub fn new(ctx: Arc<HotelContext>) -> Self {
        let mut dataset = RemoteDataset::new();
        dataset.bind_field(
            FIELD_URL,
            Arc::new(HotelGetter {
                ctx: ctx.clone(),
                method: "url",
            }),
            Some(Arc::new(EditInfoSetter { ctx: ctx.clone() })),
        );
        dataset.bind_field(
            FIELD_MANAGER,
            Arc::new(HotelGetter {
                ctx: ctx.clone(),
                method: "manager",
            }),
            None,
        );
        Self {
            ctx,
            dataset,
            creation_tx: None,
        }
    }

    /// A hotel already deployed at `address`
    pub fn at(ctx: Arc<HotelContext>, address: Address) -> Result<Self> {
        let mut hotel = Self::new(ctx);
        hotel.dataset.mark_deployed(address)?;
        Ok(hotel)
    }

    pub fn address(&self) -> Option<Address> {
        self.dataset.address()
    }

    pub fn state(&self) -> DeployState {
        self.dataset.state()
    }

    pub fn is_deployed(&self) -> bool {
        self.dataset.is_deployed()
    }

    /// Hash of the creation transaction, once submitted
    pub fn creation_tx(&self) -> Option<TxHash> {
        self.creation_tx
    }

    pub async fn url(&mut self) -> Result<Option<String>> {
        match self.dataset.read(FIELD_URL).await? {
            Some(value) => Ok(Some(expect_string(&value, "url")?)),
            None => Ok(None),
        }
    }

    pub async fn manager(&mut self) -> Result<Option<Address>> {
        match self.dataset.read(FIELD_MANAGER).await? {
            Some(value) => Ok(Some(expect_address(&value, "manager")?)),
            None => Ok(None),
        }
    }

    /// Current data as an index record
    pub async fn to_record(&mut self) -> Result<HotelRecord> {
        Ok(HotelRecord {
            address: self.address(),
            manager: self.manager().await?,
            url: self.url().await?,
            ..HotelRecord::default()
        })
    }

    /// Stage `url` and `manager` from `record`; empty values are ignored
    ///
    /// The manager is fixed once the hotel is deployed, so it is only taken
    /// before deployment.
    pub fn set_local_data(&mut self, record: &HotelRecord) -> Result<()> {
        if let Some(url) = record.url.as_deref().filter(|u| !u.is_empty()) {
            self.dataset.stage(FIELD_URL, AbiValue::String(url.to_string()))?;
        }
        if let Some(manager) = record.manager.filter(|m| !m.is_zero()) {
            if !self.dataset.is_deployed() {
                self.dataset.stage(FIELD_MANAGER, AbiValue::Address(manager))?;
            }
        }
        Ok(())
    }

    /// Register the hotel on the index with its local url
    ///
    /// The sender becomes the manager; a different locally set manager is
    /// rejected with `Authorization` before any network call. The contract address is predicted from the index's nonce and stays
    /// provisional until [`confirm_deployment`](Self::confirm_deployment).
    pub async fn create_on_network(
        &mut self,
        wallet: &dyn Wallet,
        options: &TxOptions,
    ) -> Result<Vec<TxHash>> {
        if self.dataset.state() != DeployState::NotDeployed {
            return Err(ClientError::invalid_state(format!(
                "cannot create a {} hotel",
                self.dataset.state()
            )));
        }
        let url = match self.dataset.local_value(FIELD_URL) {
            Some(value) => expect_string(value, "url")?,
            None => return Err(ClientError::validation("hotel url is required")),
        };

        // the contract records the sender as manager
        let sender = AbiValue::Address(options.from);
        if let Some(claimed) = self.dataset.local_value(FIELD_MANAGER) {
            if claimed != &sender {
                return Err(ClientError::authorization(format!(
                    "hotel manager must be the sender {}",
                    options.from
                )));
            }
        }

        let index = self.ctx.index;
        let index_nonce = self.ctx.rpc.pending_nonce(index).await?;
        let predicted = future_contract_address(&index, index_nonce);

        let payload = self.ctx.payload(
            ContractKind::HotelIndex,
            index,
            "registerHotel",
            vec![AbiValue::String(url)],
        )?;
        let hash = self.ctx.submit(wallet, options, &payload).await?;

        self.dataset.stage(FIELD_MANAGER, sender)?;
        self.dataset.mark_pending(predicted)?;
        self.creation_tx = Some(hash);
        info!("🏨 Hotel registration sent, provisional address {}", predicted);
        Ok(vec![hash])
    }

    /// Poll the creation receipt
    ///
    /// Returns `true` once deployed and `false` while still pending. A
    /// reverted creation is a submission failure.
    pub async fn confirm_deployment(&mut self) -> Result<bool> {
        match self.dataset.state() {
            DeployState::Deployed => return Ok(true),
            DeployState::Pending => {}
            other => {
                return Err(ClientError::invalid_state(format!(
                    "cannot confirm a {} hotel",
                    other
                )))
            }
        }
        let (hash, address) = match (self.creation_tx, self.dataset.address()) {
            (Some(hash), Some(address)) => (hash, address),
            _ => return Err(ClientError::invalid_state("pending hotel has no creation transaction")),
        };

        match self.ctx.rpc.transaction_receipt(hash).await? {
            None => Ok(false),
            Some(receipt) if receipt.success => {
                self.dataset.mark_deployed(address)?;
                Ok(true)
            }
            Some(receipt) => Err(ClientError::submission(
                "registerHotel",
                LedgerError::Reverted(format!("creation {} reverted in block {}", hash, receipt.block_number)),
            )),
        }
    }

    /// Push locally changed fields (currently the url)
    pub async fn update_on_network(
        &mut self,
        wallet: &dyn Wallet,
        options: &TxOptions,
    ) -> Result<SyncReport> {
        self.dataset.update_remote_data(wallet, options).await
    }

    /// Delete the hotel from the index
    ///
    /// Fails with `InvalidState` before any network call unless deployed.
    pub async fn remove_from_network(
        &mut self,
        wallet: &dyn Wallet,
        options: &TxOptions,
    ) -> Result<Vec<TxHash>> {
        if self.dataset.state() != DeployState::Deployed {
            return Err(ClientError::invalid_state(format!(
                "cannot remove a {} hotel",
                self.dataset.state()
            )));
        }
        let address = self
            .dataset
            .address()
            .ok_or_else(|| ClientError::invalid_state("deployed hotel has no address"))?;

        let payload = self.ctx.payload(
            ContractKind::HotelIndex,
            self.ctx.index,
            "deleteHotel",
            vec![AbiValue::Address(address)],
        )?;
        let hash = self.ctx.submit(wallet, options, &payload).await?;

        self.dataset.mark_obsolete()?;
        info!("Hotel {} removed from index", address);
        Ok(vec![hash])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_client::mock::MockLedger;
    use lib_client::ClientConfig;

    const INDEX: u64 = 0x1d;

    fn setup() -> (Arc<MockLedger>, Arc<HotelContext>) {
        let ledger = Arc::new(MockLedger::new());
        let ctx = HotelContext::new(ledger.clone(), Address::from_low_u64(INDEX), ClientConfig::default()).unwrap();
        (ledger, Arc::new(ctx))
    }

    fn owner() -> Address {
        Address::from_low_u64(0xaa)
    }

    #[tokio::test]
    async fn test_create_predicts_address_and_confirms() {
        let (ledger, ctx) = setup();
        ledger.set_nonce(ctx.index, 3);

        let mut hotel = LedgerHotel::new(ctx.clone());
        hotel.set_local_data(&HotelRecord::new(owner(), "https://hotel.example")).unwrap();
        let txs = hotel.create_on_network(ledger.as_ref(), &TxOptions::new(owner())).await.unwrap();

        assert_eq!(txs.len(), 1);
        assert_eq!(hotel.state(), DeployState::Pending);
        assert!(!hotel.is_deployed());
        assert_eq!(hotel.address(), Some(future_contract_address(&ctx.index, 3)));
        assert_eq!(ledger.sent_invoking("registerHotel(string)"), 1);

        assert!(hotel.confirm_deployment().await.unwrap());
        assert_eq!(hotel.state(), DeployState::Deployed);
        // url was part of the creation, no fetch needed
        assert_eq!(hotel.url().await.unwrap().as_deref(), Some("https://hotel.example"));
        assert_eq!(ledger.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_requires_url() {
        let (ledger, ctx) = setup();
        let mut hotel = LedgerHotel::new(ctx);
        let err = hotel
            .create_on_network(ledger.as_ref(), &TxOptions::new(owner()))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(ledger.round_trips(), 0);
    }

    #[tokio::test]
    async fn test_confirm_pending_and_reverted() {
        let (ledger, ctx) = setup();
        ledger.set_auto_mine(false);
        let mut hotel = LedgerHotel::new(ctx);
        hotel.set_local_data(&HotelRecord::new(owner(), "https://x")).unwrap();
        let txs = hotel.create_on_network(ledger.as_ref(), &TxOptions::new(owner())).await.unwrap();

        assert!(!hotel.confirm_deployment().await.unwrap());
        ledger.mine(txs[0], false);
        let err = hotel.confirm_deployment().await.unwrap_err();
        assert!(matches!(err, ClientError::Submission { .. }));
        assert_eq!(hotel.state(), DeployState::Pending);
    }

    #[tokio::test]
    async fn test_remove_never_deployed_is_local_error() {
        let (ledger, ctx) = setup();
        let mut hotel = LedgerHotel::new(ctx);
        let err = hotel
            .remove_from_network(ledger.as_ref(), &TxOptions::new(owner()))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidState(_)));
        assert_eq!(ledger.round_trips(), 0);
    }

    #[tokio::test]
    async fn test_update_and_remove_deployed_hotel() {
        let (ledger, ctx) = setup();
        let address = Address::from_low_u64(0x40);
        ledger.respond(address, "url", vec![AbiValue::String("https://old".into())]);

        let mut hotel = LedgerHotel::at(ctx, address).unwrap();
        assert_eq!(hotel.url().await.unwrap().as_deref(), Some("https://old"));

        hotel
            .set_local_data(&HotelRecord {
                url: Some("https://new".into()),
                manager: Some(Address::from_low_u64(0xbb)),
                ..HotelRecord::default()
            })
            .unwrap();
        let report = hotel.update_on_network(ledger.as_ref(), &TxOptions::new(owner())).await.unwrap();
        assert_eq!(report.transactions.len(), 1);
        assert_eq!(ledger.sent_invoking("editInfo(string)"), 1);

        hotel.remove_from_network(ledger.as_ref(), &TxOptions::new(owner())).await.unwrap();
        assert_eq!(hotel.state(), DeployState::Obsolete);
        assert_eq!(ledger.sent_invoking("deleteHotel(address)"), 1);
    }

    #[tokio::test]
    async fn test_create_records_sender_as_manager() {
        let (ledger, ctx) = setup();
        let mut hotel = LedgerHotel::new(ctx);
        hotel
            .set_local_data(&HotelRecord {
                url: Some("https://x".into()),
                ..HotelRecord::default()
            })
            .unwrap();
        hotel.create_on_network(ledger.as_ref(), &TxOptions::new(owner())).await.unwrap();
        assert!(hotel.confirm_deployment().await.unwrap());

        assert_eq!(hotel.manager().await.unwrap(), Some(owner()));
        assert_eq!(ledger.call_count(hotel.address().unwrap(), "manager"), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_manager_other_than_sender() {
        let (ledger, ctx) = setup();
        let mut hotel = LedgerHotel::new(ctx);
        hotel
            .set_local_data(&HotelRecord::new(Address::from_low_u64(0xbb), "https://x"))
            .unwrap();

        let err = hotel
            .create_on_network(ledger.as_ref(), &TxOptions::new(owner()))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Authorization(_)));
        assert_eq!(hotel.state(), DeployState::NotDeployed);
        assert_eq!(ledger.round_trips(), 0);
    }

    #[tokio::test]
    async fn test_reverted_creation_stays_pending() {
        let (ledger, ctx) = setup();
        ledger.revert_on_mine("registerHotel(string)");
        let mut hotel = LedgerHotel::new(ctx);
        hotel.set_local_data(&HotelRecord::new(owner(), "https://x")).unwrap();
        hotel.create_on_network(ledger.as_ref(), &TxOptions::new(owner())).await.unwrap();

        let err = hotel.confirm_deployment().await.unwrap_err();
        assert!(matches!(err, ClientError::Submission { .. }));
        assert_eq!(hotel.state(), DeployState::Pending);
    }
}
