//! The parts of `flow.json` used by install and deploy.

use std::{collections::BTreeMap, fmt, str::FromStr};

use flowbridge_ledger::Address;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    delegate::{DeploymentData, FileSystem, PrompterAccount, filesystem::FILE_MODE},
    error::{Error, Result},
};

/// Directory installed dependencies are written under.
pub const IMPORTS_DIR: &str = "imports";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContractEntry {
    Path(String),
    Detailed {
        source: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        aliases: BTreeMap<String, String>,
    },
}

impl ContractEntry {
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Path(source) | Self::Detailed { source, .. } => source,
        }
    }
}

/// A `network://address.Name` dependency location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySource {
    pub network: String,
    pub address: Address,
    pub name: String,
}

impl FromStr for DependencySource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Project(format!("invalid dependency source {s:?}"));
        let (network, rest) = s.split_once("://").ok_or_else(invalid)?;
        let (address, name) = rest.split_once('.').ok_or_else(invalid)?;
        if network.is_empty() || name.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            network: network.to_owned(),
            address: Address::from_hex(address).map_err(|_| invalid())?,
            name: name.to_owned(),
        })
    }
}

impl fmt::Display for DependencySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}.{}", self.network, self.address, self.name)
    }
}

impl DependencySource {
    /// Where the installed copy of this contract lives.
    #[must_use]
    pub fn install_path(&self) -> String {
        format!("{IMPORTS_DIR}/{}/{}.cdc", self.address, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dependency {
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub address: String,
    #[serde(default)]
    pub key: serde_json::Value,
}

impl AccountEntry {
    fn key_text(&self) -> String {
        match &self.key {
            serde_json::Value::String(key) => key.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeploymentContract {
    Name(String),
    WithArgs {
        name: String,
        #[serde(default)]
        args: Vec<serde_json::Value>,
    },
}

impl DeploymentContract {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::WithArgs { name, .. } => name,
        }
    }
}

pub type AccountDeployments = BTreeMap<String, Vec<DeploymentContract>>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contracts: BTreeMap<String, ContractEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, Dependency>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub accounts: BTreeMap<String, AccountEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deployments: BTreeMap<String, AccountDeployments>,
    /// Keys this crate does not interpret, kept so saving is lossless.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProjectConfig {
    /// Overlays `other` onto `self`, entry by entry.
    fn merge(&mut self, other: Self) {
        self.contracts.extend(other.contracts);
        self.dependencies.extend(other.dependencies);
        self.networks.extend(other.networks);
        self.accounts.extend(other.accounts);
        self.deployments.extend(other.deployments);
        self.extra.extend(other.extra);
    }
}

/// A loaded project and the file it is saved back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    path: String,
    pub config: ProjectConfig,
}

impl Project {
    #[must_use]
    pub fn new(path: impl Into<String>, config: ProjectConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Reads every file in `paths`, later files overriding earlier ones.
    /// The first path is where [`Project::save`] writes.
    ///
    /// # Errors
    /// [`Error::Project`] when `paths` is empty, a file cannot be read, or
    /// its contents are not a project configuration.
    pub fn load(fs: &dyn FileSystem, paths: &[String]) -> Result<Self> {
        let (first, _) = paths
            .split_first()
            .ok_or_else(|| Error::Project("no configuration paths given".to_owned()))?;
        let mut config = ProjectConfig::default();
        for path in paths {
            let contents = fs
                .read_file(path)
                .map_err(|e| Error::Project(format!("failed to load {path}: {e}")))?;
            let parsed: ProjectConfig = serde_json::from_str(&contents)
                .map_err(|e| Error::Project(format!("failed to parse {path}: {e}")))?;
            config.merge(parsed);
        }
        debug!(path = %first, files = paths.len(), "project loaded");
        Ok(Self::new(first.clone(), config))
    }

    /// # Errors
    /// Delegate faults from the write.
    pub fn save(&self, fs: &dyn FileSystem) -> Result<()> {
        let mut contents = serde_json::to_string_pretty(&self.config)?;
        contents.push('\n');
        fs.write_file(&self.path, &contents, FILE_MODE)?;
        debug!(path = %self.path, "project saved");
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// # Errors
    /// [`Error::Project`] when the account is missing or its address is invalid.
    pub fn account_address(&self, account: &str) -> Result<Address> {
        let entry = self
            .config
            .accounts
            .get(account)
            .ok_or_else(|| Error::Project(format!("account {account} is not defined")))?;
        Address::from_hex(&entry.address).map_err(|e| {
            Error::Project(format!("account {account} has an invalid address: {e}"))
        })
    }

    #[must_use]
    pub fn prompter_accounts(&self) -> Vec<PrompterAccount> {
        self.config
            .accounts
            .iter()
            .map(|(name, entry)| PrompterAccount {
                name: name.clone(),
                address: entry.address.clone(),
                key: entry.key_text(),
            })
            .collect()
    }

    /// Location of a contract's code: its configured source, or the installed
    /// copy for a dependency.
    ///
    /// # Errors
    /// [`Error::Project`] when `name` is neither a contract nor a dependency.
    pub fn contract_location(&self, name: &str) -> Result<String> {
        if let Some(contract) = self.config.contracts.get(name) {
            return Ok(contract.source().to_owned());
        }
        let dependency = self
            .config
            .dependencies
            .get(name)
            .ok_or_else(|| Error::Project(format!("contract {name} is not defined")))?;
        Ok(dependency.source.parse::<DependencySource>()?.install_path())
    }

    /// Accounts and their contract names deployed on `network`.
    #[must_use]
    pub fn deployments(&self, network: &str) -> Vec<(&str, Vec<&str>)> {
        self.config
            .deployments
            .get(network)
            .map(|accounts| {
                accounts
                    .iter()
                    .map(|(account, contracts)| {
                        (
                            account.as_str(),
                            contracts.iter().map(DeploymentContract::name).collect(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Adds the chosen contracts to a deployment, skipping ones already there.
    pub fn add_deployment(&mut self, data: DeploymentData) {
        let listed = self
            .config
            .deployments
            .entry(data.network)
            .or_default()
            .entry(data.account)
            .or_default();
        for contract in data.contracts {
            if !listed.iter().any(|c| c.name() == contract) {
                listed.push(DeploymentContract::Name(contract));
            }
        }
    }
}
