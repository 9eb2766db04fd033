use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use flowbridge::{
    BoxError, Capabilities, HostObject, HostRuntime, UnsupportedMethod, Value,
    codec::{Envelope, wire::AccountView},
};
use serde::de::DeserializeOwned;
use serde_json::json;

pub const GOOD_CONTRACT: &str = "access(all) contract Good {\n    init() {}\n}\n";
pub const FUNGIBLE_TOKEN: &str = "access(all) contract FungibleToken {\n    init() {}\n}\n";
pub const FUNGIBLE_TOKEN_ADDRESS: &str = "f233dcee88fe0abe";

fn arg<T: DeserializeOwned>(args: &[Value], index: usize) -> std::result::Result<T, BoxError> {
    let value = args.get(index).ok_or("missing argument")?;
    Ok(value.to_serde()?)
}

fn envelope(
    outcome: std::result::Result<serde_json::Value, String>,
) -> std::result::Result<Value, BoxError> {
    let envelope = match outcome {
        Ok(value) => Envelope::ok(value),
        Err(message) => Envelope {
            value: None,
            error: Some(message),
        },
    };
    Ok(envelope.to_value()?)
}

#[derive(Debug, Default)]
struct FsState {
    files: BTreeMap<String, String>,
    dirs: BTreeSet<String>,
}

/// `flowFileSystem` over an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    state: Arc<Mutex<FsState>>,
}

impl MemoryFs {
    #[must_use]
    pub fn with_file(self, path: &str, contents: &str) -> Self {
        self.state
            .lock()
            .expect("filesystem lock poisoned")
            .files
            .insert(path.to_owned(), contents.to_owned());
        self
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.state
            .lock()
            .expect("filesystem lock poisoned")
            .files
            .get(path)
            .cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.state
            .lock()
            .expect("filesystem lock poisoned")
            .dirs
            .contains(path)
    }
}

#[async_trait(?Send)]
impl HostObject for MemoryFs {
    async fn call(&self, method: &str, args: Vec<Value>) -> std::result::Result<Value, BoxError> {
        let path: String = arg(&args, 0)?;
        let mut state = self.state.lock().expect("filesystem lock poisoned");
        let outcome = match method {
            "readFile" => state
                .files
                .get(&path)
                .map(|contents| json!(contents))
                .ok_or_else(|| format!("open {path}: no such file or directory")),
            "writeFile" => {
                let data: String = arg(&args, 1)?;
                state.files.insert(path, data);
                Ok(serde_json::Value::Null)
            }
            "mkdirAll" => {
                state.dirs.insert(path);
                Ok(serde_json::Value::Null)
            }
            "stat" => {
                let name = path.rsplit('/').next().unwrap_or_default().to_owned();
                if let Some(contents) = state.files.get(&path) {
                    Ok(json!({
                        "name": name,
                        "size": contents.len(),
                        "mode": 0o644,
                        "modTime": 1_700_000_000_000_i64,
                        "isDir": false,
                    }))
                } else if state.dirs.contains(&path) {
                    Ok(json!({
                        "name": name,
                        "size": 0,
                        "mode": 0o755,
                        "modTime": 1_700_000_000_000_i64,
                        "isDir": true,
                    }))
                } else {
                    Err(format!("stat {path}: no such file or directory"))
                }
            }
            other => return Err(Box::new(UnsupportedMethod::new(other))),
        };
        envelope(outcome)
    }
}

#[derive(Debug, Default)]
struct PrompterState {
    update_dependencies: bool,
    deploy_to: Option<String>,
    refuse_selection: bool,
    addresses: VecDeque<String>,
    calls: Vec<(String, Vec<serde_json::Value>)>,
}

/// `prompter` answering from a script of canned replies.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    state: Arc<Mutex<PrompterState>>,
}

impl ScriptedPrompter {
    fn update(self, f: impl FnOnce(&mut PrompterState)) -> Self {
        f(&mut self.state.lock().expect("prompter lock poisoned"));
        self
    }

    #[must_use]
    pub fn update_dependencies(self, update: bool) -> Self {
        self.update(|s| s.update_dependencies = update)
    }

    #[must_use]
    pub fn deploy_to(self, account: &str) -> Self {
        self.update(|s| s.deploy_to = Some(account.to_owned()))
    }

    #[must_use]
    pub fn refuse_selection(self) -> Self {
        self.update(|s| s.refuse_selection = true)
    }

    #[must_use]
    pub fn address_answers<'a>(self, answers: impl IntoIterator<Item = &'a str>) -> Self {
        let answers = answers.into_iter().map(str::to_owned).collect::<Vec<_>>();
        self.update(|s| s.addresses.extend(answers))
    }

    /// Calls received so far, with their arguments as JSON.
    pub fn calls(&self) -> Vec<(String, Vec<serde_json::Value>)> {
        self.state
            .lock()
            .expect("prompter lock poisoned")
            .calls
            .clone()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.calls().iter().filter(|(m, _)| m == method).count()
    }
}

#[async_trait(?Send)]
impl HostObject for ScriptedPrompter {
    async fn call(&self, method: &str, args: Vec<Value>) -> std::result::Result<Value, BoxError> {
        let mut state = self.state.lock().expect("prompter lock poisoned");
        let recorded = args
            .iter()
            .map(Value::to_json_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        state.calls.push((method.to_owned(), recorded));
        match method {
            "shouldUpdateDependency" => Ok(Value::from(state.update_dependencies)),
            "addContractToDeployment" if state.refuse_selection => {
                Err("No account selected".into())
            }
            "addContractToDeployment" => Ok(Value::from(
                state.deploy_to.clone().unwrap_or_else(|| "none".to_owned()),
            )),
            "addressPromptOrEmpty" => Ok(Value::from(
                state.addresses.pop_front().unwrap_or_default(),
            )),
            other => Err(Box::new(UnsupportedMethod::new(other))),
        }
    }
}

/// A `<network>Gateway` object that only serves accounts, with nested maps
/// passed as JSON strings the way browser gateways send them.
#[derive(Debug, Clone, Default)]
pub struct RemoteNetwork {
    accounts: Arc<Mutex<BTreeMap<String, serde_json::Value>>>,
}

impl RemoteNetwork {
    #[must_use]
    pub fn with_account(self, address: &str, contracts: &[(&str, &str)]) -> Self {
        let contracts = contracts
            .iter()
            .map(|(name, code)| ((*name).to_owned(), (*code).to_owned()))
            .collect::<BTreeMap<_, _>>();
        let view = json!({
            "address": address,
            "balance": 1_000_u64,
            "code": "",
            "contracts": serde_json::to_string(&contracts).expect("contracts json"),
            "keys": "[]",
        });
        self.accounts
            .lock()
            .expect("remote network lock poisoned")
            .insert(address.to_owned(), view);
        self
    }
}

#[async_trait(?Send)]
impl HostObject for RemoteNetwork {
    async fn call(&self, method: &str, args: Vec<Value>) -> std::result::Result<Value, BoxError> {
        match method {
            "getAccount" => {
                let address: String = arg(&args, 0)?;
                let account = self
                    .accounts
                    .lock()
                    .expect("remote network lock poisoned")
                    .get(&address)
                    .cloned();
                envelope(account.ok_or_else(|| format!("account {address} not found")))
            }
            "ping" => envelope(Ok(serde_json::Value::Null)),
            other => Err(Box::new(UnsupportedMethod::new(other))),
        }
    }
}

/// A project deploying `contracts` from `cadence/contracts/<name>.cdc` to the
/// emulator service account.
pub fn flow_json(contracts: &[&str]) -> String {
    let sources = contracts
        .iter()
        .map(|name| ((*name).to_owned(), json!(format!("cadence/contracts/{name}.cdc"))))
        .collect::<serde_json::Map<_, _>>();
    serde_json::to_string_pretty(&json!({
        "contracts": sources,
        "networks": {
            "emulator": "127.0.0.1:3569",
            "testnet": "access.devnet.nodes.onflow.org:9000",
            "mainnet": "access.mainnet.nodes.onflow.org:9000",
        },
        "accounts": {
            "emulator-account": {
                "address": "f8d6e0586b0a20c7",
                "key": "6d12eebfef9866c9b6fa92b97c6e705c26a1785b1e7944da701fc545a51d4673",
            },
        },
        "deployments": {
            "emulator": {"emulator-account": contracts},
        },
    }))
    .expect("flow.json")
}

pub fn host(capabilities: Capabilities) -> Result<HostRuntime> {
    HostRuntime::new(capabilities).context("failed to build host runtime")
}

pub fn decode_account(raw: &Value) -> Result<AccountView> {
    raw.to_serde().context("failed to decode account view")
}
