//! Ledger-backed index
//!
//! The same bookkeeping as the in-memory index, against the index contract.
//! References are real broadcast hashes and their status is polled from
//! receipts. Hotels created through this provider are tracked until their
//! creation is confirmed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lib_client::{ClientError, ContractKind, Result, TxOptions, Wallet};
use lib_types::{Address, TxHash};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{AddHotelResponse, HotelRecord, IndexDataProvider, TransactionsStatus, TxResult, TxStatus};
use crate::context::{expect_address, expect_array, HotelContext};
use crate::dataset::DeployState;
use crate::hotel::LedgerHotel;

/// Index provider over the index contract, acting as one sender
pub struct LedgerIndex {
    ctx: Arc<HotelContext>,
    wallet: Arc<dyn Wallet>,
    options: TxOptions,
    hotels: Mutex<HashMap<Address, LedgerHotel>>,
}

impl LedgerIndex {
    pub fn new(ctx: Arc<HotelContext>, wallet: Arc<dyn Wallet>, options: TxOptions) -> Self {
        Self {
            ctx,
            wallet,
            options,
            hotels: Mutex::new(HashMap::new()),
        }
    }

    /// Every hotel address the index contract lists, zero entries dropped
    pub async fn hotel_addresses(&self) -> Result<Vec<Address>> {
        let listed = self
            .ctx
            .call_single(ContractKind::HotelIndex, self.ctx.index, "getHotels", vec![])
            .await?;
        let mut addresses = Vec::new();
        for value in expect_array(&listed, "getHotels")? {
            let address = expect_address(value, "getHotels")?;
            if !address.is_zero() {
                addresses.push(address);
            }
        }
        Ok(addresses)
    }

    async fn ensure_listed(&self, address: Address) -> Result<()> {
        if self.hotel_addresses().await?.contains(&address) {
            Ok(())
        } else {
            Err(ClientError::not_found(format!("cannot find hotel at {}", address)))
        }
    }

    /// Tracked hotel at `address`, or a handle on a listed one
    async fn load<'a>(
        &self,
        hotels: &'a mut HashMap<Address, LedgerHotel>,
        address: Address,
    ) -> Result<&'a mut LedgerHotel> {
        if !hotels.contains_key(&address) {
            self.ensure_listed(address).await?;
            hotels.insert(address, LedgerHotel::at(self.ctx.clone(), address)?);
        }
        hotels
            .get_mut(&address)
            .ok_or_else(|| ClientError::not_found(format!("cannot find hotel at {}", address)))
    }
}

#[async_trait]
impl IndexDataProvider for LedgerIndex {
    async fn add(&self, record: HotelRecord) -> Result<AddHotelResponse> {
        let manager = record
            .manager
            .ok_or_else(|| ClientError::validation("cannot add hotel without manager"))?;
        if manager != self.options.from {
            return Err(ClientError::authorization(format!(
                "cannot add hotel for {} from {}",
                manager, self.options.from
            )));
        }
        let mut hotel = LedgerHotel::new(self.ctx.clone());
        hotel.set_local_data(&record)?;
        let txs = hotel
            .create_on_network(self.wallet.as_ref(), &self.options)
            .await?;
        let address = hotel
            .address()
            .ok_or_else(|| ClientError::invalid_state("created hotel has no address"))?;

        self.hotels.lock().await.insert(address, hotel);
        Ok(AddHotelResponse {
            address,
            transaction_ids: txs.iter().map(TxHash::to_string).collect(),
        })
    }

    async fn get(&self, address: Address) -> Result<HotelRecord> {
        let mut hotels = self.hotels.lock().await;
        if let Some(hotel) = hotels.get_mut(&address) {
            if hotel.state() == DeployState::Pending {
                hotel.confirm_deployment().await?;
            }
            if hotel.state() == DeployState::Obsolete {
                return Err(ClientError::not_found(format!("hotel at {} was removed", address)));
            }
        }
        let hotel = self.load(&mut hotels, address).await?;
        hotel.to_record().await
    }

    async fn update(&self, record: &HotelRecord) -> Result<Vec<String>> {
        let address = record
            .address
            .ok_or_else(|| ClientError::not_found("cannot update hotel at ~unknown~: not found"))?;
        let mut hotels = self.hotels.lock().await;
        let hotel = self.load(&mut hotels, address).await?;

        if hotel.state() == DeployState::Pending && !hotel.confirm_deployment().await? {
            return Err(ClientError::invalid_state(format!(
                "hotel at {} is not confirmed yet",
                address
            )));
        }
        hotel.set_local_data(record)?;
        let report = hotel
            .update_on_network(self.wallet.as_ref(), &self.options)
            .await?;

        if let Some(failure) = report.failures.into_iter().next() {
            return Err(failure.error);
        }
        Ok(report.transactions.iter().map(TxHash::to_string).collect())
    }

    async fn remove(&self, record: &HotelRecord) -> Result<Vec<String>> {
        let address = record
            .address
            .ok_or_else(|| ClientError::authorization("cannot remove hotel without an address"))?;
        let mut hotels = self.hotels.lock().await;
        let hotel = match self.load(&mut hotels, address).await {
            Ok(hotel) => hotel,
            Err(ClientError::NotFound(reason)) => return Err(ClientError::authorization(reason)),
            Err(other) => return Err(other),
        };

        let registered = hotel.manager().await?;
        if registered.is_none() || registered != record.manager {
            return Err(ClientError::authorization(format!(
                "cannot remove hotel at {}: not registered to this manager",
                address
            )));
        }

        let txs = hotel
            .remove_from_network(self.wallet.as_ref(), &self.options)
            .await?;
        hotels.remove(&address);
        Ok(txs.iter().map(TxHash::to_string).collect())
    }

    async fn list_all(&self) -> Result<Vec<HotelRecord>> {
        let addresses = self.hotel_addresses().await?;
        let mut records = Vec::with_capacity(addresses.len());
        let mut hotels = self.hotels.lock().await;
        for address in addresses {
            if !hotels.contains_key(&address) {
                hotels.insert(address, LedgerHotel::at(self.ctx.clone(), address)?);
            }
            if let Some(hotel) = hotels.get_mut(&address) {
                records.push(hotel.to_record().await?);
            }
        }
        debug!("Listed {} hotels from index {}", records.len(), self.ctx.index);
        Ok(records)
    }

    async fn get_transactions_status(&self, references: &[String]) -> Result<TransactionsStatus> {
        let head = self.ctx.rpc.block_number().await?;
        let mut processed = Vec::new();
        for reference in references {
            let hash: TxHash = match reference.parse() {
                Ok(hash) => hash,
                Err(_) => continue,
            };
            if let Some(receipt) = self.ctx.rpc.transaction_receipt(hash).await? {
                let status = if receipt.success {
                    TxStatus::Confirmed
                } else {
                    TxStatus::Failed
                };
                processed.push((
                    reference.clone(),
                    TxResult {
                        status,
                        block_age: head.saturating_sub(receipt.block_number),
                    },
                ));
            }
        }
        let status = TransactionsStatus::summarize(references.len(), processed);
        info!(
            "Transaction status: {}/{} processed, all passed: {}",
            status.meta.processed, status.meta.total, status.meta.all_passed
        );
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_client::mock::MockLedger;
    use lib_client::{AbiValue, ClientConfig};

    fn setup() -> (Arc<MockLedger>, LedgerIndex) {
        let ledger = Arc::new(MockLedger::new());
        let ctx = HotelContext::new(ledger.clone(), Address::from_low_u64(0x1d), ClientConfig::default()).unwrap();
        let ctx = Arc::new(ctx);
        let index = LedgerIndex::new(ctx, ledger.clone(), TxOptions::new(manager()));
        (ledger, index)
    }

    fn manager() -> Address {
        Address::from_low_u64(0xaa)
    }

    #[tokio::test]
    async fn test_add_returns_real_hash_and_confirms() {
        let (ledger, index) = setup();
        let response = index.add(HotelRecord::new(manager(), "https://a")).await.unwrap();
        assert_eq!(response.transaction_ids.len(), 1);
        assert!(response.transaction_ids[0].starts_with("0x"));

        // served from the tracked hotel, creation data counts as synced
        let record = index.get(response.address).await.unwrap();
        assert_eq!(record.url.as_deref(), Some("https://a"));
        assert_eq!(record.manager, Some(manager()));
        assert_eq!(ledger.total_calls(), 0);

        let status = index.get_transactions_status(&response.transaction_ids).await.unwrap();
        assert!(status.meta.all_passed);
    }

    #[tokio::test]
    async fn test_add_without_manager_sends_nothing() {
        let (ledger, index) = setup();
        let err = index.add(HotelRecord::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(ledger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_add_for_another_manager_is_rejected() {
        let (ledger, index) = setup();
        let other = HotelRecord::new(Address::from_low_u64(0xbb), "https://a");

        let err = index.add(other).await.unwrap_err();
        assert!(matches!(err, ClientError::Authorization(_)));
        assert!(ledger.sent().is_empty());
        assert!(index.hotels.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_unlisted_is_not_found() {
        let (ledger, index) = setup();
        ledger.respond(Address::from_low_u64(0x1d), "getHotels", vec![AbiValue::Array(vec![])]);
        let err = index.get(Address::from_low_u64(0x40)).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_checks_manager() {
        let (ledger, index) = setup();
        let hotel = Address::from_low_u64(0x40);
        ledger.respond(Address::from_low_u64(0x1d), "getHotels", vec![AbiValue::Array(vec![AbiValue::Address(hotel)])]);
        ledger.respond(hotel, "manager", vec![AbiValue::Address(manager())]);

        let intruder = HotelRecord {
            address: Some(hotel),
            manager: Some(Address::from_low_u64(0xbb)),
            ..HotelRecord::default()
        };
        assert!(matches!(index.remove(&intruder).await, Err(ClientError::Authorization(_))));
        assert!(ledger.sent().is_empty());

        let owner = HotelRecord {
            address: Some(hotel),
            manager: Some(manager()),
            ..HotelRecord::default()
        };
        let txs = index.remove(&owner).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(ledger.sent_invoking("deleteHotel(address)"), 1);
    }

    #[tokio::test]
    async fn test_update_reports_field_failure() {
        let (ledger, index) = setup();
        let hotel = Address::from_low_u64(0x40);
        ledger.respond(Address::from_low_u64(0x1d), "getHotels", vec![AbiValue::Array(vec![AbiValue::Address(hotel)])]);
        ledger.fail_estimation("editInfo(string)", lib_client::LedgerError::Reverted("not manager".into()));

        let patch = HotelRecord {
            address: Some(hotel),
            url: Some("https://new".into()),
            ..HotelRecord::default()
        };
        let err = index.update(&patch).await.unwrap_err();
        assert!(matches!(err, ClientError::Estimation { .. }));
    }

    #[tokio::test]
    async fn test_pending_transaction_is_not_processed() {
        let (ledger, index) = setup();
        ledger.set_auto_mine(false);
        let response = index.add(HotelRecord::new(manager(), "https://a")).await.unwrap();

        let status = index.get_transactions_status(&response.transaction_ids).await.unwrap();
        assert_eq!(status.meta.processed, 0);
        assert!(!status.meta.all_passed);
    }
}
