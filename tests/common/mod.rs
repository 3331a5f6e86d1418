//! Scripted test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mintmark::rpc::{ChainReader, RpcError, TransactionQuery};
use mintmark::storage::{KeyValueStore, MemoryStore, RemoteReceipt, RemoteStore, RemoteStoreError, StorageError};
use mintmark::types::{EntryFunctionId, PendingTransaction, TransactionRecord, TransactionRequest};
use mintmark::wallet::{WalletAccount, WalletError, WalletSigner};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::{Duration, Instant};

pub const TX_HASH: &str = "0xfeed";

/// Signer that accepts or refuses submissions and counts them
pub struct MockSigner {
    name: String,
    connected: AtomicBool,
    refusal: Mutex<Option<WalletError>>,
    submissions: Mutex<Vec<TransactionRequest>>,
}

impl MockSigner {
    pub fn connected() -> Self {
        Self {
            name: "mock".to_string(),
            connected: AtomicBool::new(true),
            refusal: Mutex::new(None),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn disconnected() -> Self {
        let signer = Self::connected();
        signer.connected.store(false, Ordering::SeqCst);
        signer
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn refusing(self, error: WalletError) -> Self {
        *self.refusal.lock() = Some(error);
        self
    }

    pub fn submit_count(&self) -> usize {
        self.submissions.lock().len()
    }

    pub fn submissions(&self) -> Vec<TransactionRequest> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl WalletSigner for MockSigner {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<WalletAccount, WalletError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(WalletAccount {
            address: "0xa11ce".to_string(),
        })
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_and_submit(&self, request: &TransactionRequest) -> Result<PendingTransaction, WalletError> {
        self.submissions.lock().push(request.clone());
        if let Some(error) = self.refusal.lock().clone() {
            return Err(error);
        }
        Ok(PendingTransaction {
            hash: TX_HASH.to_string(),
        })
    }
}

pub type PollResponse = Result<Option<TransactionRecord>, RpcError>;

/// Network that replays a fixed script of poll responses.
///
/// The last response repeats once the script runs out.
pub struct ScriptedNetwork {
    script: Mutex<VecDeque<PollResponse>>,
    last: Mutex<PollResponse>,
    polls: AtomicUsize,
    poll_times: Mutex<Vec<Instant>>,
    views: Mutex<Vec<(String, Vec<Value>)>>,
    resources: Mutex<HashMap<String, Value>>,
}

impl ScriptedNetwork {
    pub fn new(script: Vec<PollResponse>) -> Self {
        let last = script.last().cloned().unwrap_or(Ok(None));
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
            polls: AtomicUsize::new(0),
            poll_times: Mutex::new(Vec::new()),
            views: Mutex::new(Vec::new()),
            resources: Mutex::new(HashMap::new()),
        }
    }

    pub fn always_pending() -> Self {
        Self::new(vec![Ok(Some(pending()))])
    }

    pub fn with_resource(self, resource_type: &str, data: Value) -> Self {
        self.resources.lock().insert(resource_type.to_string(), data);
        self
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Offsets of each poll from the first one
    pub fn poll_offsets(&self) -> Vec<Duration> {
        let times = self.poll_times.lock();
        match times.first() {
            Some(first) => times.iter().map(|t| *t - *first).collect(),
            None => Vec::new(),
        }
    }

    pub fn views(&self) -> Vec<(String, Vec<Value>)> {
        self.views.lock().clone()
    }
}

#[async_trait]
impl TransactionQuery for ScriptedNetwork {
    async fn get_transaction_by_id(&self, _id: &str) -> Result<Option<TransactionRecord>, RpcError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.poll_times.lock().push(Instant::now());
        let next = self.script.lock().pop_front();
        match next {
            Some(response) => response,
            None => self.last.lock().clone(),
        }
    }
}

#[async_trait]
impl ChainReader for ScriptedNetwork {
    async fn view(
        &self,
        function: &EntryFunctionId,
        _type_arguments: &[String],
        arguments: &[Value],
    ) -> Result<Value, RpcError> {
        self.views.lock().push((function.to_string(), arguments.to_vec()));
        Ok(Value::Array(vec![Value::String(function.function().to_string())]))
    }

    async fn account_resource(&self, _address: &str, resource_type: &str) -> Result<Value, RpcError> {
        self.resources
            .lock()
            .get(resource_type)
            .cloned()
            .ok_or_else(|| RpcError::RpcResponse {
                endpoint: "scripted".to_string(),
                status: 404,
                message: format!("resource not found: {}", resource_type),
            })
    }
}

/// Network whose status queries take `delay` before reporting pending
pub struct SlowNetwork {
    delay: Duration,
    polls: AtomicUsize,
}

impl SlowNetwork {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            polls: AtomicUsize::new(0),
        }
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionQuery for SlowNetwork {
    async fn get_transaction_by_id(&self, _id: &str) -> Result<Option<TransactionRecord>, RpcError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Some(pending()))
    }
}

pub fn pending() -> TransactionRecord {
    TransactionRecord::pending(TX_HASH)
}

pub fn succeeded() -> TransactionRecord {
    TransactionRecord::user_transaction(TX_HASH, true)
}

pub fn failed(vm_status: &str) -> TransactionRecord {
    let mut record = TransactionRecord::user_transaction(TX_HASH, false);
    record.vm_status = Some(vm_status.to_string());
    record
}

pub fn request() -> TransactionRequest {
    let function = EntryFunctionId::new("0x1", "platform", "mint_poap").unwrap();
    TransactionRequest::new(function, vec![], vec![Value::String("7".into())])
}

/// In-memory remote store
pub struct MockRemoteStore {
    configured: bool,
    failing: AtomicBool,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<(String, u8)>>,
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self {
            configured: true,
            failing: AtomicBool::new(false),
            objects: Mutex::new(HashMap::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// `(name, redundancy)` of each accepted upload
    pub fn uploads(&self) -> Vec<(String, u8)> {
        self.uploads.lock().clone()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn upload(
        &self,
        name: &str,
        _content_type: &str,
        bytes: Vec<u8>,
        redundancy: u8,
    ) -> Result<RemoteReceipt, RemoteStoreError> {
        if !self.configured {
            return Err(RemoteStoreError::NotConfigured);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteStoreError::Unavailable("scripted outage".to_string()));
        }
        let hash = format!("Qm{}", mintmark::storage::codec::checksum(&bytes));
        self.objects.lock().insert(hash.clone(), bytes);
        self.uploads.lock().push((name.to_string(), redundancy));
        Ok(RemoteReceipt {
            url: Some(format!("https://remote.test/{}", hash)),
            hash,
        })
    }

    async fn retrieve(&self, hash: &str) -> Result<Vec<u8>, RemoteStoreError> {
        if !self.configured {
            return Err(RemoteStoreError::NotConfigured);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteStoreError::Unavailable("scripted outage".to_string()));
        }
        self.objects.lock().get(hash).cloned().ok_or(RemoteStoreError::Http {
            status: 404,
            message: "not found".to_string(),
        })
    }
}

/// Which writes a `FailingStore` refuses
enum WriteFailure {
    None,
    All,
    Prefix(String),
}

/// Key/value store whose writes or reads fail on demand
pub struct FailingStore {
    inner: MemoryStore,
    writes: WriteFailure,
    unreadable_prefix: Mutex<Option<String>>,
}

impl FailingStore {
    fn build(writes: WriteFailure) -> Self {
        Self {
            inner: MemoryStore::unbounded(),
            writes,
            unreadable_prefix: Mutex::new(None),
        }
    }

    /// Every write fails
    pub fn all() -> Self {
        Self::build(WriteFailure::All)
    }

    /// Writes of keys under `prefix` fail
    pub fn with_prefix(prefix: &str) -> Self {
        Self::build(WriteFailure::Prefix(prefix.to_string()))
    }

    /// Nothing fails until `set_unreadable` is called
    pub fn healthy() -> Self {
        Self::build(WriteFailure::None)
    }

    /// Make reads of keys under `prefix` fail, or succeed again with `None`
    pub fn set_unreadable(&self, prefix: Option<&str>) {
        *self.unreadable_prefix.lock() = prefix.map(str::to_string);
    }

    fn fails(&self, key: &str) -> bool {
        match &self.writes {
            WriteFailure::None => false,
            WriteFailure::All => true,
            WriteFailure::Prefix(prefix) => key.starts_with(prefix.as_str()),
        }
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if let Some(prefix) = self.unreadable_prefix.lock().as_deref() {
            if key.starts_with(prefix) {
                return Err(StorageError::Backend(format!("read of {} failed", key)));
            }
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fails(key) {
            return Err(StorageError::QuotaExceeded {
                requested: key.len() + value.len(),
                available: 0,
            });
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.inner.keys()
    }
}
