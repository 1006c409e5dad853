//! Remote Dataset
//!
//! Per-entity deploy-state machine plus a table of lazily synchronized
//! fields. Each field is a small descriptor: a remote getter, an optional
//! remote setter, the cached value and its freshness.
//!
//! ```text
//!  NotDeployed ──mark_pending──► Pending ──mark_deployed──► Deployed ──mark_obsolete──► Obsolete
//!       │                                                      ▲
//!       └──────────────────────mark_deployed───────────────────┘
//! ```
//!
//! | state        | read                         | write                      |
//! |--------------|------------------------------|----------------------------|
//! | NotDeployed  | local value, no network      | stored locally (Dirty)     |
//! | Pending      | local value, no network      | stored locally (Dirty)     |
//! | Deployed     | cache if fresh, else getter  | setter, cache invalidated  |
//! | Obsolete     | last cached value only       | `InvalidState`             |

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use lib_client::{AbiValue, ClientError, Result, TxOptions, Wallet};
use lib_types::{Address, TxHash};
use tracing::{debug, info, warn};

// ============================================================================
// STATES
// ============================================================================

/// Lifecycle of an entity relative to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    /// Local only, no address
    NotDeployed,
    /// Creation submitted, address provisional
    Pending,
    /// Confirmed on the ledger
    Deployed,
    /// Removed from the ledger
    Obsolete,
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployState::NotDeployed => "not-deployed",
            DeployState::Pending => "pending",
            DeployState::Deployed => "deployed",
            DeployState::Obsolete => "obsolete",
        };
        f.write_str(name)
    }
}

/// Freshness of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    /// Nothing trustworthy cached; the next deployed read hits the getter
    Unsynced,
    /// Cached value mirrors the ledger
    Synced,
    /// Changed locally, not yet pushed
    Dirty,
}

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Fetches one field of the entity at `address`
#[async_trait]
pub trait RemoteGetter: Send + Sync {
    async fn get(&self, address: Address) -> Result<AbiValue>;
}

/// Writes one field of the entity at `address` with a single transaction
#[async_trait]
pub trait RemoteSetter: Send + Sync {
    async fn set(
        &self,
        wallet: &dyn Wallet,
        options: &TxOptions,
        address: Address,
        value: &AbiValue,
    ) -> Result<TxHash>;
}

struct FieldDescriptor {
    getter: Arc<dyn RemoteGetter>,
    setter: Option<Arc<dyn RemoteSetter>>,
    value: Option<AbiValue>,
    state: FieldState,
}

/// A field write that failed during `update_remote_data`
#[derive(Debug)]
pub struct FieldFailure {
    pub field: String,
    pub error: ClientError,
}

/// Outcome of `update_remote_data`; failures do not stop the other fields
#[derive(Debug, Default)]
pub struct SyncReport {
    pub transactions: Vec<TxHash>,
    pub failures: Vec<FieldFailure>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// DATASET
// ============================================================================

/// Field table and deploy state of one ledger-backed entity
pub struct RemoteDataset {
    fields: BTreeMap<String, FieldDescriptor>,
    state: DeployState,
    address: Option<Address>,
}

impl RemoteDataset {
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
            state: DeployState::NotDeployed,
            address: None,
        }
    }

    /// Register a field; rebinding replaces the descriptor and drops its cache
    pub fn bind_field(
        &mut self,
        name: &str,
        getter: Arc<dyn RemoteGetter>,
        setter: Option<Arc<dyn RemoteSetter>>,
    ) {
        self.fields.insert(
            name.to_string(),
            FieldDescriptor {
                getter,
                setter,
                value: None,
                state: FieldState::Unsynced,
            },
        );
    }

    pub fn state(&self) -> DeployState {
        self.state
    }

    /// Confirmed or provisional address
    pub fn address(&self) -> Option<Address> {
        self.address
    }

    /// True once the entity has been confirmed on the ledger, even if since removed
    pub fn is_deployed(&self) -> bool {
        matches!(self.state, DeployState::Deployed | DeployState::Obsolete)
    }

    pub fn field_state(&self, name: &str) -> Option<FieldState> {
        self.fields.get(name).map(|f| f.state)
    }

    pub fn has_setter(&self, name: &str) -> bool {
        self.fields.get(name).map_or(false, |f| f.setter.is_some())
    }

    /// Locally held value, without any network access
    pub fn local_value(&self, name: &str) -> Option<&AbiValue> {
        self.fields.get(name).and_then(|f| f.value.as_ref())
    }

    fn field_mut(&mut self, name: &str) -> Result<&mut FieldDescriptor> {
        self.fields
            .get_mut(name)
            .ok_or_else(|| ClientError::not_found(format!("field {} is not bound", name)))
    }

    fn deployed_address(&self) -> Result<Address> {
        self.address
            .ok_or_else(|| ClientError::invalid_state("deployed entity has no address"))
    }

    // ------------------------------------------------------------------------
    // Reads and writes
    // ------------------------------------------------------------------------

    /// Read a field
    ///
    /// Before deployment this is the locally set value (`None` if never set)
    /// and never touches the network.
    pub async fn read(&mut self, name: &str) -> Result<Option<AbiValue>> {
        let state = self.state;
        let address = self.address;
        let field = self.field_mut(name)?;

        match state {
            DeployState::NotDeployed | DeployState::Pending => Ok(field.value.clone()),
            DeployState::Obsolete => match &field.value {
                Some(value) => Ok(Some(value.clone())),
                None => Err(ClientError::invalid_state(format!(
                    "cannot fetch {} of an obsolete entity",
                    name
                ))),
            },
            DeployState::Deployed => {
                if field.state != FieldState::Unsynced {
                    if let Some(value) = &field.value {
                        return Ok(Some(value.clone()));
                    }
                }
                let address = address
                    .ok_or_else(|| ClientError::invalid_state("deployed entity has no address"))?;
                let getter = field.getter.clone();
                let value = getter.get(address).await?;
                debug!("Fetched {} of {}", name, address);

                let field = self.field_mut(name)?;
                field.value = Some(value.clone());
                field.state = FieldState::Synced;
                Ok(Some(value))
            }
        }
    }

    /// Write a field
    ///
    /// Deployed entities push the value through the field's setter and
    /// return the transaction; the cache is invalidated only after a
    /// successful broadcast. Entities not yet deployed keep the value
    /// locally for the creation transaction and return `None`.
    pub async fn write(
        &mut self,
        name: &str,
        value: AbiValue,
        wallet: &dyn Wallet,
        options: &TxOptions,
    ) -> Result<Option<TxHash>> {
        match self.state {
            DeployState::NotDeployed | DeployState::Pending => {
                self.stage(name, value)?;
                Ok(None)
            }
            DeployState::Obsolete => Err(ClientError::invalid_state(format!(
                "cannot write {} of an obsolete entity",
                name
            ))),
            DeployState::Deployed => {
                let address = self.deployed_address()?;
                let field = self.field_mut(name)?;
                let setter = field.setter.clone().ok_or_else(|| {
                    ClientError::validation(format!("field {} is read-only", name))
                })?;

                let hash = setter.set(wallet, options, address, &value).await?;

                let field = self.field_mut(name)?;
                field.value = None;
                field.state = FieldState::Unsynced;
                Ok(Some(hash))
            }
        }
    }

    /// Change a field locally without touching the network
    ///
    /// On a deployed entity the change is pushed by the next
    /// `update_remote_data`; staging a value equal to the synced one is a
    /// no-op.
    pub fn stage(&mut self, name: &str, value: AbiValue) -> Result<()> {
        let state = self.state;
        let field = self.field_mut(name)?;
        match state {
            DeployState::Obsolete => {
                return Err(ClientError::invalid_state(format!(
                    "cannot change {} of an obsolete entity",
                    name
                )))
            }
            DeployState::Deployed if field.setter.is_none() => {
                return Err(ClientError::validation(format!("field {} is read-only", name)))
            }
            _ => {}
        }

        if field.state == FieldState::Synced && field.value.as_ref() == Some(&value) {
            return Ok(());
        }
        field.value = Some(value);
        field.state = FieldState::Dirty;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// `NotDeployed -> Pending` with a provisional address
    pub fn mark_pending(&mut self, address: Address) -> Result<()> {
        if self.state != DeployState::NotDeployed {
            return Err(ClientError::invalid_state(format!(
                "cannot mark {} entity as pending",
                self.state
            )));
        }
        self.state = DeployState::Pending;
        self.address = Some(address);
        debug!("Entity pending at provisional address {}", address);
        Ok(())
    }

    /// `NotDeployed | Pending -> Deployed`
    ///
    /// Locally held values were part of the creation and count as synced.
    pub fn mark_deployed(&mut self, address: Address) -> Result<()> {
        match self.state {
            DeployState::NotDeployed | DeployState::Pending => {}
            other => {
                return Err(ClientError::invalid_state(format!(
                    "cannot mark {} entity as deployed",
                    other
                )))
            }
        }
        if let Some(provisional) = self.address {
            if provisional != address {
                warn!("Provisional address {} replaced by {}", provisional, address);
            }
        }

        for field in self.fields.values_mut() {
            field.state = if field.value.is_some() {
                FieldState::Synced
            } else {
                FieldState::Unsynced
            };
        }
        self.state = DeployState::Deployed;
        self.address = Some(address);
        info!("✅ Entity deployed at {}", address);
        Ok(())
    }

    /// `Deployed -> Obsolete`
    pub fn mark_obsolete(&mut self) -> Result<()> {
        if self.state != DeployState::Deployed {
            return Err(ClientError::invalid_state(format!(
                "cannot mark {} entity as obsolete",
                self.state
            )));
        }
        self.state = DeployState::Obsolete;
        info!("Entity at {:?} marked obsolete", self.address);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Bulk sync
    // ------------------------------------------------------------------------

    /// Push every locally changed field that has a setter, one transaction each
    ///
    /// A failing field is reported in the returned `SyncReport` and keeps its
    /// local value; the remaining fields are still attempted.
    pub async fn update_remote_data(
        &mut self,
        wallet: &dyn Wallet,
        options: &TxOptions,
    ) -> Result<SyncReport> {
        if self.state != DeployState::Deployed {
            return Err(ClientError::invalid_state(format!(
                "cannot update remote data of {} entity",
                self.state
            )));
        }
        let address = self.deployed_address()?;

        let pending: Vec<(String, Arc<dyn RemoteSetter>, AbiValue)> = self
            .fields
            .iter()
            .filter(|(_, f)| f.state == FieldState::Dirty)
            .filter_map(|(name, f)| match (&f.setter, &f.value) {
                (Some(setter), Some(value)) => Some((name.clone(), setter.clone(), value.clone())),
                _ => None,
            })
            .collect();

        let mut report = SyncReport::default();
        for (name, setter, value) in pending {
            match setter.set(wallet, options, address, &value).await {
                Ok(hash) => {
                    report.transactions.push(hash);
                    let field = self.field_mut(&name)?;
                    field.value = None;
                    field.state = FieldState::Unsynced;
                }
                Err(error) => {
                    warn!("Sync of {} on {} failed: {}", name, address, error);
                    report.failures.push(FieldFailure { field: name, error });
                }
            }
        }

        info!(
            "Synced {} to {}: {} sent, {} failed",
            address,
            self.state,
            report.transactions.len(),
            report.failures.len()
        );
        Ok(report)
    }
}

impl Default for RemoteDataset {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RemoteDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDataset")
            .field("state", &self.state)
            .field("address", &self.address)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_client::mock::MockLedger;
    use lib_client::LedgerError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGetter {
        value: AbiValue,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteGetter for CountingGetter {
        async fn get(&self, _address: Address) -> Result<AbiValue> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.clone())
        }
    }

    struct ScriptedSetter {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteSetter for ScriptedSetter {
        async fn set(
            &self,
            _wallet: &dyn Wallet,
            _options: &TxOptions,
            _address: Address,
            _value: &AbiValue,
        ) -> Result<TxHash> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ClientError::estimation("editInfo", LedgerError::Reverted("boom".into())));
            }
            Ok(TxHash::new([n as u8 + 1; 32]))
        }
    }

    fn getter(value: AbiValue) -> Arc<CountingGetter> {
        Arc::new(CountingGetter {
            value,
            calls: AtomicUsize::new(0),
        })
    }

    fn setter(fail: bool) -> Arc<ScriptedSetter> {
        Arc::new(ScriptedSetter {
            fail,
            calls: AtomicUsize::new(0),
        })
    }

    fn options() -> TxOptions {
        TxOptions::new(Address::from_low_u64(0xaa))
    }

    #[test]
    fn test_is_deployed_per_state() {
        let mut dataset = RemoteDataset::new();
        assert!(!dataset.is_deployed());
        dataset.mark_pending(Address::from_low_u64(1)).unwrap();
        assert!(!dataset.is_deployed());
        dataset.mark_deployed(Address::from_low_u64(1)).unwrap();
        assert!(dataset.is_deployed());
        dataset.mark_obsolete().unwrap();
        assert!(dataset.is_deployed());
    }

    #[test]
    fn test_illegal_transitions() {
        let mut dataset = RemoteDataset::new();
        assert!(matches!(dataset.mark_obsolete(), Err(ClientError::InvalidState(_))));

        dataset.mark_deployed(Address::from_low_u64(1)).unwrap();
        assert!(matches!(
            dataset.mark_deployed(Address::from_low_u64(1)),
            Err(ClientError::InvalidState(_))
        ));
        assert!(matches!(
            dataset.mark_pending(Address::from_low_u64(1)),
            Err(ClientError::InvalidState(_))
        ));

        dataset.mark_obsolete().unwrap();
        assert!(matches!(dataset.mark_obsolete(), Err(ClientError::InvalidState(_))));
        assert!(matches!(
            dataset.mark_deployed(Address::from_low_u64(1)),
            Err(ClientError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_not_deployed_write_is_local() {
        let ledger = MockLedger::new();
        let url_getter = getter(AbiValue::String("remote".into()));
        let url_setter = setter(false);
        let mut dataset = RemoteDataset::new();
        dataset.bind_field("url", url_getter.clone(), Some(url_setter.clone()));

        let tx = dataset
            .write("url", AbiValue::String("local".into()), &ledger, &options())
            .await
            .unwrap();
        assert!(tx.is_none());

        let value = dataset.read("url").await.unwrap();
        assert_eq!(value, Some(AbiValue::String("local".into())));
        assert_eq!(url_getter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(url_setter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.round_trips(), 0);
    }

    #[tokio::test]
    async fn test_deployed_read_caches() {
        let url_getter = getter(AbiValue::String("remote".into()));
        let mut dataset = RemoteDataset::new();
        dataset.bind_field("url", url_getter.clone(), None);
        dataset.mark_deployed(Address::from_low_u64(1)).unwrap();

        assert_eq!(dataset.read("url").await.unwrap(), Some(AbiValue::String("remote".into())));
        assert_eq!(dataset.read("url").await.unwrap(), Some(AbiValue::String("remote".into())));
        assert_eq!(url_getter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(dataset.field_state("url"), Some(FieldState::Synced));
    }

    #[tokio::test]
    async fn test_deployed_write_invalidates_cache() {
        let ledger = MockLedger::new();
        let url_getter = getter(AbiValue::String("remote".into()));
        let url_setter = setter(false);
        let mut dataset = RemoteDataset::new();
        dataset.bind_field("url", url_getter.clone(), Some(url_setter.clone()));
        dataset.mark_deployed(Address::from_low_u64(1)).unwrap();

        dataset.read("url").await.unwrap();
        let tx = dataset
            .write("url", AbiValue::String("new".into()), &ledger, &options())
            .await
            .unwrap();
        assert!(tx.is_some());
        assert_eq!(dataset.field_state("url"), Some(FieldState::Unsynced));

        dataset.read("url").await.unwrap();
        assert_eq!(url_getter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_write_to_read_only_field() {
        let ledger = MockLedger::new();
        let mut dataset = RemoteDataset::new();
        dataset.bind_field("manager", getter(AbiValue::Address(Address::from_low_u64(3))), None);
        dataset.mark_deployed(Address::from_low_u64(1)).unwrap();

        let err = dataset
            .write("manager", AbiValue::Address(Address::from_low_u64(4)), &ledger, &options())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_field() {
        let mut dataset = RemoteDataset::new();
        assert!(matches!(dataset.read("nope").await, Err(ClientError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_obsolete_entity_rejects_writes() {
        let ledger = MockLedger::new();
        let mut dataset = RemoteDataset::new();
        dataset.bind_field("url", getter(AbiValue::String("remote".into())), Some(setter(false)));
        dataset.mark_deployed(Address::from_low_u64(1)).unwrap();
        dataset.read("url").await.unwrap();
        dataset.mark_obsolete().unwrap();

        let err = dataset
            .write("url", AbiValue::String("x".into()), &ledger, &options())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidState(_)));
        // last cached value still readable
        assert_eq!(dataset.read("url").await.unwrap(), Some(AbiValue::String("remote".into())));
    }

    #[tokio::test]
    async fn test_mark_deployed_syncs_local_values() {
        let url_getter = getter(AbiValue::String("remote".into()));
        let mut dataset = RemoteDataset::new();
        dataset.bind_field("url", url_getter.clone(), None);
        dataset.bind_field("manager", getter(AbiValue::Address(Address::from_low_u64(3))), None);
        dataset.stage("url", AbiValue::String("local".into())).unwrap();
        dataset.mark_deployed(Address::from_low_u64(1)).unwrap();

        assert_eq!(dataset.field_state("url"), Some(FieldState::Synced));
        assert_eq!(dataset.field_state("manager"), Some(FieldState::Unsynced));
        assert_eq!(dataset.read("url").await.unwrap(), Some(AbiValue::String("local".into())));
        assert_eq!(url_getter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_update_remote_data_partial_failure() {
        let ledger = MockLedger::new();
        let mut dataset = RemoteDataset::new();
        dataset.bind_field("a", getter(AbiValue::Uint(0)), Some(setter(false)));
        dataset.bind_field("b", getter(AbiValue::Uint(0)), Some(setter(true)));
        dataset.bind_field("c", getter(AbiValue::Uint(0)), Some(setter(false)));
        dataset.mark_deployed(Address::from_low_u64(1)).unwrap();

        for name in ["a", "b", "c"] {
            dataset.stage(name, AbiValue::Uint(5)).unwrap();
        }
        let report = dataset.update_remote_data(&ledger, &options()).await.unwrap();

        assert_eq!(report.transactions.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].field, "b");
        assert!(!report.is_complete());
        assert_eq!(dataset.field_state("b"), Some(FieldState::Dirty));
        assert_eq!(dataset.field_state("a"), Some(FieldState::Unsynced));
    }

    #[tokio::test]
    async fn test_update_skips_unchanged_fields() {
        let ledger = MockLedger::new();
        let a_setter = setter(false);
        let mut dataset = RemoteDataset::new();
        dataset.bind_field("a", getter(AbiValue::Uint(5)), Some(a_setter.clone()));
        dataset.mark_deployed(Address::from_low_u64(1)).unwrap();

        dataset.read("a").await.unwrap();
        dataset.stage("a", AbiValue::Uint(5)).unwrap();
        let report = dataset.update_remote_data(&ledger, &options()).await.unwrap();
        assert!(report.transactions.is_empty());
        assert_eq!(a_setter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_update_requires_deployed() {
        let ledger = MockLedger::new();
        let mut dataset = RemoteDataset::new();
        let err = dataset.update_remote_data(&ledger, &options()).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidState(_)));
    }
}
