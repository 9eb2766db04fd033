use std::{collections::BTreeMap, fmt, sync::Arc};

use flowbridge_ledger::{Address, Engine, EngineError, Identifier};
use tracing::{debug, warn};

use crate::{delegate::FileSystem, error::Result, project::Project};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedContract {
    pub name: String,
    pub address: Address,
    pub transaction_id: Identifier,
}

/// Some contracts of a project failed to deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDeploymentError {
    pub deployed: Vec<DeployedContract>,
    /// Failure message per contract name.
    pub failed: BTreeMap<String, String>,
}

impl fmt::Display for ProjectDeploymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.failed.keys().map(String::as_str).collect::<Vec<_>>();
        write!(f, "failed to deploy contracts: {}", names.join(", "))
    }
}

impl std::error::Error for ProjectDeploymentError {}

/// Deploys a project's contracts for one network onto the engine.
#[derive(Clone)]
pub struct Deployer {
    engine: Arc<dyn Engine>,
    fs: Arc<dyn FileSystem>,
    network: String,
}

impl fmt::Debug for Deployer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployer")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl Deployer {
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>, fs: Arc<dyn FileSystem>, network: impl Into<String>) -> Self {
        Self {
            engine,
            fs,
            network: network.into(),
        }
    }

    /// Deploys every contract listed under the deployer's network. A contract
    /// that fails does not stop the others.
    ///
    /// # Errors
    /// [`crate::Error::Deployment`] listing every failed contract, or
    /// [`crate::Error::Project`] when a deployment account is not defined.
    pub fn deploy_project(
        &self,
        project: &Project,
        update_existing: bool,
    ) -> Result<Vec<DeployedContract>> {
        let deployments = project.deployments(&self.network);
        if deployments.is_empty() {
            warn!(network = %self.network, "no contracts configured for deployment");
        }

        let mut deployed = Vec::new();
        let mut failed = BTreeMap::new();
        for (account, contracts) in deployments {
            let address = project.account_address(account)?;
            for name in contracts {
                match self.deploy_contract(project, address, name, update_existing) {
                    Ok(transaction_id) => {
                        debug!(contract = name, %address, tx = %transaction_id, "contract deployed");
                        deployed.push(DeployedContract {
                            name: name.to_owned(),
                            address,
                            transaction_id,
                        });
                    }
                    Err(message) => {
                        failed.insert(name.to_owned(), message);
                    }
                }
            }
        }

        if failed.is_empty() {
            Ok(deployed)
        } else {
            Err(ProjectDeploymentError { deployed, failed }.into())
        }
    }

    fn deploy_contract(
        &self,
        project: &Project,
        address: Address,
        name: &str,
        update_existing: bool,
    ) -> Result<Identifier, String> {
        let location = project.contract_location(name).map_err(|e| e.to_string())?;
        let code = self.fs.read_file(&location).map_err(|e| e.to_string())?;
        self.engine
            .deploy_contract(address, name, code.as_bytes(), update_existing)
            .map_err(|err| match err {
                EngineError::ContractFailed { message, .. } => message,
                err => err.to_string(),
            })
    }
}
