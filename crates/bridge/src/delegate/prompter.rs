use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    bridge::HostChannel,
    error::{Error, Result},
    host::PROMPTER,
};

/// Default bound on address prompt attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Answer the host gives to skip adding a contract to a deployment.
const SKIP: &str = "none";

/// Account offered to the user when choosing a deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrompterAccount {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Key")]
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentData {
    pub network: String,
    pub account: String,
    pub contracts: Vec<String>,
}

pub type Validator<'a> = &'a dyn Fn(&str) -> Result<()>;

/// Interactive questions asked while installing dependencies.
pub trait Prompter: Send + Sync {
    /// # Errors
    /// Host failures.
    fn should_update_dependency(&self, contract: &str) -> Result<bool>;

    /// Asks which account `contract` should be deployed to on `network`.
    /// `None` means the user chose not to deploy it.
    ///
    /// # Errors
    /// [`Error::Delegate`] when the host reports no selection.
    fn add_contract_to_deployment(
        &self,
        network: &str,
        accounts: &[PrompterAccount],
        contract: &str,
    ) -> Result<Option<DeploymentData>>;

    /// Prompts until `validate` accepts the answer. An empty answer is passed
    /// to `validate` like any other.
    ///
    /// # Errors
    /// [`Error::PromptAttemptsExhausted`] when no answer was accepted in time.
    fn address_prompt_or_empty(&self, label: &str, validate: Validator<'_>) -> Result<String>;
}

/// [`Prompter`] backed by the host's `prompter` object.
///
/// Its functions answer directly, without an envelope.
#[derive(Debug, Clone)]
pub struct HostPrompter {
    channel: HostChannel,
    max_attempts: u32,
}

impl HostPrompter {
    #[must_use]
    pub const fn new(channel: HostChannel) -> Self {
        Self {
            channel,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Bounds the address prompt. The host is always asked at least once.
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

impl Prompter for HostPrompter {
    fn should_update_dependency(&self, contract: &str) -> Result<bool> {
        let raw = self
            .channel
            .call(PROMPTER, "shouldUpdateDependency", vec![contract.into()])?;
        raw.to_serde::<bool>()
            .map_err(|e| Error::Decode(format!("shouldUpdateDependency: {e}")))
    }

    fn add_contract_to_deployment(
        &self,
        network: &str,
        accounts: &[PrompterAccount],
        contract: &str,
    ) -> Result<Option<DeploymentData>> {
        let accounts_json = serde_json::to_string(accounts)?;
        let raw = self.channel.call(
            PROMPTER,
            "addContractToDeployment",
            vec![network.into(), accounts_json.into(), contract.into()],
        )?;
        let account = raw
            .to_serde::<String>()
            .map_err(|e| Error::Decode(format!("addContractToDeployment: {e}")))?;

        if account == SKIP {
            debug!(contract, network, "contract not added to deployment");
            return Ok(None);
        }
        Ok(Some(DeploymentData {
            network: network.to_owned(),
            account,
            contracts: vec![contract.to_owned()],
        }))
    }

    fn address_prompt_or_empty(&self, label: &str, validate: Validator<'_>) -> Result<String> {
        for attempt in 1..=self.max_attempts {
            let raw = self
                .channel
                .call(PROMPTER, "addressPromptOrEmpty", vec![label.into()])?;
            let answer = raw
                .to_serde::<Option<String>>()
                .map_err(|e| Error::Decode(format!("addressPromptOrEmpty: {e}")))?
                .unwrap_or_default();
            match validate(&answer) {
                Ok(()) => return Ok(answer),
                Err(err) => debug!(attempt, error = %err, "prompt answer rejected"),
            }
        }
        Err(Error::PromptAttemptsExhausted {
            attempts: self.max_attempts,
        })
    }
}
