use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    fmt,
    sync::Arc,
};

use flowbridge_ledger::Address;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::{
    delegate::{
        FileSystem, Prompter,
        filesystem::{DIR_MODE, FILE_MODE, read_if_present},
    },
    error::{Error, Result},
    gateway::{EMULATOR, GatewaySet, MAINNET, TESTNET},
    project::{DependencySource, IMPORTS_DIR, Project},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Installed,
    Updated,
    UpToDate,
    /// A differing local copy was kept because the user declined the update.
    Kept,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledDependency {
    pub name: String,
    pub source: DependencySource,
    pub hash: String,
    pub status: InstallStatus,
}

/// Hex SHA-256 of contract code, as recorded in the project file.
#[must_use]
pub fn contract_hash(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// `(name, address)` for every `import Name from 0xADDRESS` in `code`.
fn address_imports(code: &str) -> Vec<(String, Address)> {
    code.lines()
        .filter_map(|line| line.trim().strip_prefix("import "))
        .filter_map(|rest| rest.split_once(" from "))
        .filter_map(|(names, address)| {
            let address = Address::from_hex(address.trim()).ok()?;
            Some(
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty() && !n.starts_with('"'))
                    .map(|n| (n.to_owned(), address))
                    .collect::<Vec<_>>(),
            )
        })
        .flatten()
        .collect()
}

fn validate_alias(answer: &str) -> Result<()> {
    if answer.is_empty() {
        return Ok(());
    }
    Address::from_hex(answer)
        .map(drop)
        .map_err(|e| Error::Validation(format!("{answer:?} is not an address: {e}")))
}

/// Fetches a project's dependencies from their networks into `imports/`.
#[derive(Clone)]
pub struct DependencyInstaller {
    gateways: GatewaySet,
    fs: Arc<dyn FileSystem>,
    prompter: Arc<dyn Prompter>,
    save_state: bool,
    skip_deployments: bool,
    skip_alias: bool,
}

impl fmt::Debug for DependencyInstaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyInstaller")
            .field("gateways", &self.gateways)
            .field("save_state", &self.save_state)
            .field("skip_deployments", &self.skip_deployments)
            .field("skip_alias", &self.skip_alias)
            .finish_non_exhaustive()
    }
}

impl DependencyInstaller {
    #[must_use]
    pub fn new(gateways: GatewaySet, fs: Arc<dyn FileSystem>, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            gateways,
            fs,
            prompter,
            save_state: true,
            skip_deployments: false,
            skip_alias: false,
        }
    }

    /// Write the project file back after installing.
    #[must_use]
    pub const fn save_state(mut self, save_state: bool) -> Self {
        self.save_state = save_state;
        self
    }

    /// Do not offer newly installed contracts for deployment.
    #[must_use]
    pub const fn skip_deployments(mut self, skip: bool) -> Self {
        self.skip_deployments = skip;
        self
    }

    /// Do not ask for aliases on other networks.
    #[must_use]
    pub const fn skip_alias(mut self, skip: bool) -> Self {
        self.skip_alias = skip;
        self
    }

    /// Installs every dependency of `project` and, transitively, the
    /// contracts they import by address.
    ///
    /// # Errors
    /// Gateway, filesystem and prompt faults, or [`Error::Project`] when a
    /// source is malformed or its account lacks the contract.
    pub fn install(&self, project: &mut Project) -> Result<Vec<InstalledDependency>> {
        let mut queue = project
            .config
            .dependencies
            .iter()
            .map(|(name, dependency)| Ok((name.clone(), dependency.source.parse::<DependencySource>()?)))
            .collect::<Result<VecDeque<(String, DependencySource)>>>()?;

        let mut seen = HashSet::new();
        let mut installed = Vec::new();
        while let Some((name, source)) = queue.pop_front() {
            if !seen.insert(source.to_string()) {
                continue;
            }
            let code = self.fetch(&source)?;
            for (import, address) in address_imports(&code) {
                queue.push_back((
                    import.clone(),
                    DependencySource {
                        network: source.network.clone(),
                        address,
                        name: import,
                    },
                ));
            }
            installed.push(self.install_one(project, name, source, &code)?);
        }

        if self.save_state {
            project.save(self.fs.as_ref())?;
        }
        Ok(installed)
    }

    fn fetch(&self, source: &DependencySource) -> Result<String> {
        let account = self.gateways.get(&source.network)?.get_account(source.address)?;
        let code = account.contracts.get(&source.name).ok_or_else(|| {
            Error::Project(format!(
                "contract {} not found at address {}",
                source.name, source.address
            ))
        })?;
        String::from_utf8(code.clone())
            .map_err(|_| Error::Encoding(format!("contract {} is not UTF-8", source.name)))
    }

    fn install_one(
        &self,
        project: &mut Project,
        name: String,
        source: DependencySource,
        code: &str,
    ) -> Result<InstalledDependency> {
        let hash = contract_hash(code);
        let path = source.install_path();
        let local = read_if_present(self.fs.as_ref(), &path)?;

        let status = match local.as_deref() {
            None => InstallStatus::Installed,
            Some(existing) if existing == code => InstallStatus::UpToDate,
            Some(_) if self.prompter.should_update_dependency(&name)? => InstallStatus::Updated,
            Some(_) => InstallStatus::Kept,
        };
        if matches!(status, InstallStatus::Installed | InstallStatus::Updated) {
            self.fs
                .mkdir_all(&format!("{IMPORTS_DIR}/{}", source.address), DIR_MODE)?;
            self.fs.write_file(&path, code, FILE_MODE)?;
        }

        if status == InstallStatus::Kept {
            info!("dependency {name} kept at its local version");
        } else {
            let mut dependency = project
                .config
                .dependencies
                .get(&name)
                .cloned()
                .unwrap_or_default();
            dependency.source = source.to_string();
            dependency.hash.clone_from(&hash);
            dependency
                .aliases
                .insert(source.network.clone(), source.address.hex());
            if !self.skip_alias {
                self.prompt_aliases(&name, &source, &mut dependency.aliases)?;
            }
            project.config.dependencies.insert(name.clone(), dependency);
        }

        if status == InstallStatus::Installed && !self.skip_deployments {
            let accounts = project.prompter_accounts();
            if let Some(data) =
                self.prompter
                    .add_contract_to_deployment(EMULATOR, &accounts, &name)?
            {
                debug!(contract = %name, account = %data.account, "added to deployment");
                project.add_deployment(data);
            }
        }

        match status {
            InstallStatus::Installed => info!("{name} @ {source} installed"),
            InstallStatus::Updated => info!("{name} @ {source} updated"),
            InstallStatus::UpToDate => info!("{name} @ {source} already up to date"),
            InstallStatus::Kept => {}
        }
        Ok(InstalledDependency {
            name,
            source,
            hash,
            status,
        })
    }

    fn prompt_aliases(
        &self,
        name: &str,
        source: &DependencySource,
        aliases: &mut BTreeMap<String, String>,
    ) -> Result<()> {
        let other = match source.network.as_str() {
            MAINNET => TESTNET,
            TESTNET => MAINNET,
            _ => return Ok(()),
        };
        if aliases.contains_key(other) {
            return Ok(());
        }
        let label =
            format!("Enter an alias address for {name} on {other} if you have one, otherwise leave blank");
        let answer = self
            .prompter
            .address_prompt_or_empty(&label, &validate_alias)?;
        if !answer.is_empty() {
            aliases.insert(other.to_owned(), Address::from_hex(&answer)?.hex());
        }
        Ok(())
    }
}
