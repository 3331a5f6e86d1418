//! Platform contract calls
//!
//! Write operations go through the active wallet and the lifecycle manager;
//! reads go straight to the node.

use crate::config::{ContractConfig, EventPricing, PlatformSettings};
use crate::lifecycle::{LifecycleError, TransactionLifecycleManager, TransactionOutcome};
use crate::rpc::{ChainReader, RpcError, TransactionQuery};
use crate::types::{EntryFunctionId, EventParams, PoapParams, TransactionRequest};
use crate::wallet::WalletManager;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub const INITIALIZE_PLATFORM: &str = "initialize_platform";
pub const INITIALIZE_EVENT_PRICING: &str = "initialize_event_pricing";
pub const CREATE_EVENT: &str = "create_event";
pub const ADD_PARTICIPANT: &str = "add_participant";
pub const MINT_POAP: &str = "mint_poap";
pub const GET_EVENT_PRICING: &str = "get_event_pricing";
pub const GET_EVENT: &str = "get_event";
pub const PLATFORM_CONFIG_RESOURCE: &str = "PlatformConfig";
pub const GUI_TOKEN_RESOURCE: &str = "GUIToken";

/// u64 arguments travel as decimal strings
fn u64_arg(v: u64) -> Value {
    Value::String(v.to_string())
}

pub struct ContractService<N> {
    contract: ContractConfig,
    wallets: Arc<WalletManager>,
    network: Arc<N>,
    lifecycle: TransactionLifecycleManager,
}

impl<N> ContractService<N>
where
    N: TransactionQuery + ChainReader,
{
    pub fn new(
        contract: ContractConfig,
        wallets: Arc<WalletManager>,
        network: Arc<N>,
        lifecycle: TransactionLifecycleManager,
    ) -> Self {
        Self {
            contract,
            wallets,
            network,
            lifecycle,
        }
    }

    pub fn function(&self, name: &str) -> Result<EntryFunctionId, LifecycleError> {
        EntryFunctionId::new(&self.contract.address, &self.contract.module, name)
    }

    fn resource_type(&self, name: &str) -> String {
        format!("{}::{}::{}", self.contract.address, self.contract.module, name)
    }

    async fn execute(&self, function: &str, arguments: Vec<Value>) -> TransactionOutcome {
        let Some(signer) = self.wallets.active_signer() else {
            return TransactionOutcome::failed(&LifecycleError::NotConnected);
        };
        let id = match self.function(function) {
            Ok(id) => id,
            Err(e) => return TransactionOutcome::failed(&e),
        };
        let request = TransactionRequest::new(id, Vec::new(), arguments);
        self.lifecycle
            .submit_and_confirm(&request, signer.as_ref(), self.network.as_ref())
            .await
    }

    pub async fn initialize_platform(&self, settings: &PlatformSettings) -> TransactionOutcome {
        self.execute(
            INITIALIZE_PLATFORM,
            vec![
                u64_arg(settings.minting_fee),
                u64_arg(settings.royalty_percentage),
                u64_arg(settings.premium_threshold),
                u64_arg(settings.reward_rate),
            ],
        )
        .await
    }

    pub async fn initialize_event_pricing(&self, pricing: &EventPricing) -> TransactionOutcome {
        self.execute(
            INITIALIZE_EVENT_PRICING,
            vec![
                u64_arg(pricing.individual_fee),
                u64_arg(pricing.small_org_fee),
                u64_arg(pricing.enterprise_fee),
                u64_arg(pricing.poap_fee),
            ],
        )
        .await
    }

    pub async fn create_event(&self, params: &EventParams) -> TransactionOutcome {
        self.execute(
            CREATE_EVENT,
            vec![
                json!(params.creator),
                json!(params.name),
                json!(params.organization_type as u8),
                json!(params.poap_enabled),
                u64_arg(params.max_attendees),
                u64_arg(params.event_date),
            ],
        )
        .await
    }

    pub async fn add_participant(&self, event_id: u64, participant: &str) -> TransactionOutcome {
        self.execute(ADD_PARTICIPANT, vec![u64_arg(event_id), json!(participant)])
            .await
    }

    pub async fn mint_poap(&self, params: &PoapParams) -> TransactionOutcome {
        self.execute(
            MINT_POAP,
            vec![u64_arg(params.event_id), json!(params.event_creator)],
        )
        .await
    }

    pub async fn get_platform_config(&self) -> Result<Value, RpcError> {
        self.network
            .account_resource(&self.contract.address, &self.resource_type(PLATFORM_CONFIG_RESOURCE))
            .await
    }

    pub async fn get_gui_token_info(&self) -> Result<Value, RpcError> {
        self.network
            .account_resource(&self.contract.address, &self.resource_type(GUI_TOKEN_RESOURCE))
            .await
    }

    pub async fn get_event_pricing(&self) -> Result<Value, RpcError> {
        let function = self
            .function(GET_EVENT_PRICING)
            .map_err(|e| RpcError::Validation(e.to_string()))?;
        self.network.view(&function, &[], &[]).await
    }

    pub async fn get_event(&self, event_creator: &str) -> Result<Value, RpcError> {
        let function = self
            .function(GET_EVENT)
            .map_err(|e| RpcError::Validation(e.to_string()))?;
        debug!(creator = %event_creator, "Fetching event");
        self.network
            .view(&function, &[], &[json!(event_creator)])
            .await
    }
}
