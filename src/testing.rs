//! An in-process chain with a deployed voting contract and a wallet holding
//! a few development accounts.

use crate::{
    contract::abi::{InterfaceDescriptor, Operation},
    jsonrpc::{self, ClientError, Params, Request, Response, Transport},
    node::types::CallRequest,
    serialization::{Bytes, Quantity, Str},
    session::Epoch,
    signer::{key::LocalKey, Signer},
    wallet::WalletProvider,
};
use alloy::{
    consensus::TxEnvelope,
    dyn_abi::DynSolValue,
    eips::eip2718::Decodable2718 as _,
    primitives::{address, keccak256, Address, B256, U256},
};
use futures_util::future::{self, BoxFuture};
use serde_json::{json, Value};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::broadcast;

pub fn provider(chain: &Arc<MockChain>) -> Arc<dyn WalletProvider> {
    chain.clone()
}

pub struct MockChain {
    state: Mutex<State>,
    changes: broadcast::Sender<Vec<Address>>,
}

struct State {
    accounts: Vec<Address>,
    candidates: Vec<(String, u64)>,
    voting_open: bool,
    remaining_seconds: u64,

    failing_methods: HashSet<String>,
    failing_reads: HashSet<Operation>,
    corrupt_reads: bool,
    reject_account_requests: bool,
    reject_transactions: bool,
    hold_receipts: bool,
    read_delay: Option<Duration>,
    base_fee: Quantity,

    nonce: u64,
    block: u64,
    receipts: HashMap<B256, (u64, bool)>,
    raw_senders: Vec<Address>,
    calls: Vec<(String, Value)>,
}

impl MockChain {
    pub const CHAIN_ID: u64 = 31337;
    pub const CONTRACT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
    pub const DEV_KEY: &'static str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    pub const DEV_ACCOUNT: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    pub const GAS_ESTIMATE: u64 = 100_000;
    pub const BASE_FEE: u64 = 7_000_000_000;
    pub const PRIORITY_FEE: u64 = 1_000_000_000;

    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            state: Mutex::new(State {
                accounts: Self::accounts(),
                candidates: vec![("Alice".to_owned(), 3), ("Bob".to_owned(), 5)],
                voting_open: true,
                remaining_seconds: 120,
                failing_methods: HashSet::new(),
                failing_reads: HashSet::new(),
                corrupt_reads: false,
                reject_account_requests: false,
                reject_transactions: false,
                hold_receipts: false,
                read_delay: None,
                base_fee: Quantity::from(Self::BASE_FEE),
                nonce: 0,
                block: 1,
                receipts: HashMap::new(),
                raw_senders: Vec::new(),
                calls: Vec::new(),
            }),
            changes,
        })
    }

    /// The accounts the wallet exposes by default.
    pub fn accounts() -> Vec<Address> {
        vec![
            Self::DEV_ACCOUNT,
            address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"),
            address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"),
        ]
    }

    /// A headless signer for the development key talking to this chain.
    pub fn key_signer(self: &Arc<Self>, epoch: &Epoch) -> Signer {
        let key = LocalKey::from_hex(Self::DEV_KEY).unwrap();
        Signer::with_key(Box::new(key), self.clone(), epoch)
    }

    pub fn fail_method(&self, method: &str) {
        self.state().failing_methods.insert(method.to_owned());
    }

    pub fn fail_read(&self, operation: Operation) {
        self.state().failing_reads.insert(operation);
    }

    pub fn corrupt_reads(&self) {
        self.state().corrupt_reads = true;
    }

    pub fn reject_account_requests(&self) {
        self.state().reject_account_requests = true;
    }

    pub fn reject_transactions(&self) {
        self.state().reject_transactions = true;
    }

    pub fn hold_receipts(&self, hold: bool) {
        self.state().hold_receipts = hold;
    }

    /// Delays every `eth_call` answer by the specified duration.
    pub fn delay_reads(&self, delay: Duration) {
        self.state().read_delay = Some(delay);
    }

    pub fn set_base_fee(&self, base_fee: Quantity) {
        self.state().base_fee = base_fee;
    }

    /// Changes the exposed accounts without notifying anyone.
    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.state().accounts = accounts;
    }

    /// Changes the exposed accounts and emits an `accountsChanged` event.
    pub fn switch_accounts(&self, accounts: Vec<Address>) {
        self.set_accounts(accounts.clone());
        let _ = self.changes.send(accounts);
    }

    pub fn set_voting_open(&self, open: bool) {
        self.state().voting_open = open;
    }

    pub fn set_remaining_seconds(&self, seconds: u64) {
        self.state().remaining_seconds = seconds;
    }

    pub fn vote_counts(&self) -> Vec<u64> {
        self.state().candidates.iter().map(|(_, votes)| *votes).collect()
    }

    /// Recovered senders of all raw transactions received so far.
    pub fn raw_senders(&self) -> Vec<Address> {
        self.state().raw_senders.clone()
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|(name, _)| name == method)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.state().calls.len()
    }

    pub fn last_params(&self, method: &str) -> Option<Value> {
        self.state()
            .calls
            .iter()
            .rev()
            .find(|(name, _)| name == method)
            .map(|(_, params)| params.clone())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn respond(&self, request: Request) -> BoxFuture<'_, Result<Response, ClientError>> {
        let delay = match request.method.as_str() {
            "eth_call" => self.state().read_delay,
            _ => None,
        };
        let response = self.handle(request);
        match delay {
            Some(delay) => Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(response)
            }),
            None => Box::pin(future::ready(Ok(response))),
        }
    }

    fn handle(&self, request: Request) -> Response {
        let params = match &request.params {
            Some(Params::Array(params)) => params.clone(),
            _ => Vec::new(),
        };
        let mut state = self.state();
        state
            .calls
            .push((request.method.clone(), Value::Array(params.clone())));

        let result = if state.failing_methods.contains(&request.method) {
            Err(rpc_error(-32000, "internal error"))
        } else {
            state.dispatch(&request.method, params)
        };
        Response::to(&request, result)
    }
}

impl State {
    fn dispatch(&mut self, method: &str, params: Vec<Value>) -> Result<Value, jsonrpc::Error> {
        let param = |index: usize| params.get(index).cloned().unwrap_or(Value::Null);

        match method {
            "eth_chainId" => Ok(json!(Quantity::from(MockChain::CHAIN_ID))),
            "eth_accounts" => Ok(self.accounts_json()),
            "eth_requestAccounts" => {
                if self.reject_account_requests {
                    return Err(jsonrpc::Error::user_rejected());
                }
                Ok(self.accounts_json())
            }
            "eth_call" => {
                let call = serde_json::from_value::<CallRequest>(param(0))
                    .map_err(|_| jsonrpc::Error::invalid_params())?;
                self.read(&call.data)
            }
            "eth_estimateGas" => Ok(json!(Quantity::from(MockChain::GAS_ESTIMATE))),
            "eth_getTransactionCount" => Ok(json!(Quantity::from(self.nonce))),
            "eth_feeHistory" => Ok(json!({
                "baseFeePerGas": [self.base_fee, self.base_fee],
                "gasUsedRatio": [0.5],
                "oldestBlock": Quantity::from(self.block),
            })),
            "eth_maxPriorityFeePerGas" => Ok(json!(Quantity::from(MockChain::PRIORITY_FEE))),
            "eth_sendTransaction" => {
                if self.reject_transactions {
                    return Err(jsonrpc::Error::user_rejected());
                }
                let call = serde_json::from_value::<CallRequest>(param(0))
                    .map_err(|_| jsonrpc::Error::invalid_params())?;
                let mut preimage = self.nonce.to_be_bytes().to_vec();
                preimage.extend_from_slice(&call.data);
                Ok(self.transact(keccak256(preimage), &call.data))
            }
            "eth_sendRawTransaction" => {
                if self.reject_transactions {
                    return Err(rpc_error(-32000, "insufficient funds for gas * price + value"));
                }
                let raw = serde_json::from_value::<Bytes>(param(0))
                    .map_err(|_| jsonrpc::Error::invalid_params())?;
                let envelope = TxEnvelope::decode_2718(&mut raw.0.as_slice())
                    .map_err(|_| jsonrpc::Error::invalid_params())?;
                let signed = envelope
                    .as_eip1559()
                    .ok_or_else(jsonrpc::Error::invalid_params)?;
                let sender = signed
                    .signature()
                    .recover_address_from_prehash(&signed.signature_hash())
                    .map_err(|_| jsonrpc::Error::invalid_params())?;
                self.raw_senders.push(sender);
                let input = signed.tx().input.to_vec();
                Ok(self.transact(keccak256(&raw.0), &input))
            }
            "eth_getTransactionReceipt" => {
                let hash = serde_json::from_value::<Str<B256>>(param(0))
                    .map_err(|_| jsonrpc::Error::invalid_params())?;
                match self.receipts.get(&hash.0) {
                    Some((block, success)) if !self.hold_receipts => Ok(json!({
                        "transactionHash": hash,
                        "blockNumber": Quantity::from(*block),
                        "status": Quantity::from(u64::from(*success)),
                        "logs": [],
                    })),
                    _ => Ok(Value::Null),
                }
            }
            _ => Err(jsonrpc::Error::method_not_found()),
        }
    }

    fn accounts_json(&self) -> Value {
        json!(self.accounts.iter().copied().map(Str).collect::<Vec<_>>())
    }

    fn read(&self, data: &[u8]) -> Result<Value, jsonrpc::Error> {
        let descriptor = InterfaceDescriptor::voting();
        let operation = Operation::ALL
            .into_iter()
            .find(|operation| data.starts_with(&descriptor.selector(*operation)))
            .ok_or_else(|| rpc_error(3, "execution reverted"))?;

        if self.failing_reads.contains(&operation) {
            return Err(rpc_error(-32000, "header not found"));
        }
        if self.corrupt_reads {
            return Ok(json!(Bytes(vec![1])));
        }

        let output = match operation {
            Operation::ListCandidates => DynSolValue::Array(
                self.candidates
                    .iter()
                    .map(|(name, votes)| {
                        DynSolValue::Tuple(vec![
                            DynSolValue::String(name.clone()),
                            DynSolValue::Uint(U256::from(*votes), 256),
                        ])
                    })
                    .collect(),
            ),
            Operation::VotingOpen => DynSolValue::Bool(self.voting_open),
            Operation::RemainingSeconds => {
                DynSolValue::Uint(U256::from(self.remaining_seconds), 256)
            }
            Operation::Vote => return Ok(json!(Bytes(vec![]))),
        };
        Ok(json!(Bytes(
            DynSolValue::Tuple(vec![output]).abi_encode_params()
        )))
    }

    /// Mines a transaction in its own block, applying it if it is a valid
    /// vote while the window is open.
    fn transact(&mut self, hash: B256, data: &[u8]) -> Value {
        let selector = InterfaceDescriptor::voting().selector(Operation::Vote);
        let candidate = (data.len() == 36 && data.starts_with(&selector))
            .then(|| U256::from_be_slice(&data[4..]))
            .and_then(|index| usize::try_from(index).ok())
            .filter(|index| *index < self.candidates.len());

        let success = match candidate {
            Some(index) if self.voting_open => {
                self.candidates[index].1 += 1;
                true
            }
            _ => false,
        };

        self.nonce += 1;
        self.block += 1;
        self.receipts.insert(hash, (self.block, success));
        json!(Str(hash))
    }
}

fn rpc_error(code: i64, message: &str) -> jsonrpc::Error {
    jsonrpc::Error {
        code,
        message: message.to_owned(),
        data: None,
    }
}

impl Transport for MockChain {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, ClientError>> {
        self.respond(request)
    }
}

impl WalletProvider for MockChain {
    fn request(&self, request: Request) -> BoxFuture<'_, Result<Response, ClientError>> {
        self.respond(request)
    }

    fn accounts_changed(&self) -> broadcast::Receiver<Vec<Address>> {
        self.changes.subscribe()
    }
}
