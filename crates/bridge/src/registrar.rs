//! The named operations a sandbox exposes to its host.

use std::{
    sync::{Arc, mpsc},
    thread,
};

use flowbridge_ledger::Engine;
use parking_lot::Mutex;
use tracing::{debug, dispatcher, info};

use crate::{
    bridge::{Bridge, Deferred, HostChannel},
    config::Config,
    delegate::{FileSystem, HostFileSystem, HostPrompter, Prompter},
    deploy::Deployer,
    error::{Error, Result},
    gateway::{EMULATOR, Gateway, GatewaySet, InternalGateway, LocalGateway, REMOTE_NETWORKS, RemoteGateway},
    install::DependencyInstaller,
    logging::Logger,
    project::Project,
    value::Value,
};

/// Names the host can invoke through [`EntryPoints::invoke`].
pub const ENTRY_POINTS: [&str; 4] = ["gateway", "getLogs", "install", "deploy"];

struct Inner {
    gateway: InternalGateway,
    bridge: Bridge,
    logger: Logger,
    installer: DependencyInstaller,
    deployer: Deployer,
    project: Arc<Mutex<Project>>,
    // Serializes installs. Only execution units take it.
    installing: Arc<Mutex<()>>,
    // Dropping the last sender releases the control thread.
    _alive: mpsc::Sender<()>,
}

/// Host-visible operations of a started sandbox.
///
/// Cheap to clone. The sandbox's control thread stays parked until every
/// clone is dropped.
#[derive(Clone)]
pub struct EntryPoints {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EntryPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryPoints")
            .field("gateway", &self.inner.gateway)
            .field("deployer", &self.inner.deployer)
            .finish_non_exhaustive()
    }
}

impl EntryPoints {
    /// The `gateway` object, backed by the local engine.
    #[must_use]
    pub fn gateway(&self) -> &InternalGateway {
        &self.inner.gateway
    }

    #[must_use]
    pub fn get_logs(&self) -> Vec<String> {
        self.inner.logger.history().lines()
    }

    /// Snapshot of the project as last loaded or saved.
    #[must_use]
    pub fn project(&self) -> Project {
        self.inner.project.lock().clone()
    }

    /// Installs the project's dependencies and saves the project file.
    ///
    /// The installer works on a copy of the project; the shared project is
    /// only replaced once it finishes, so [`EntryPoints::project`] never
    /// waits on an install that is itself waiting on the host.
    pub fn install(&self) -> Deferred<Value> {
        let installer = self.inner.installer.clone();
        let project = Arc::clone(&self.inner.project);
        let installing = Arc::clone(&self.inner.installing);
        self.inner.bridge.spawn("install", move || {
            let _installing = installing.lock();
            let mut working = project.lock().clone();
            installer.install(&mut working)?;
            *project.lock() = working;
            Ok(Value::null())
        })
    }

    /// Deploys the project, replacing contracts that already exist.
    ///
    /// When only some contracts fail, each failure is logged on its own line
    /// and the call rejects with a single aggregate message.
    pub fn deploy(&self) -> Deferred<Value> {
        let deployer = self.inner.deployer.clone();
        let project = Arc::clone(&self.inner.project);
        self.inner.bridge.spawn("deploy", move || {
            let project = project.lock().clone();
            match deployer.deploy_project(&project, true) {
                Ok(contracts) => {
                    for contract in contracts {
                        info!("deployed {} contract", contract.name);
                    }
                    Ok(Value::null())
                }
                Err(Error::Deployment(err)) => {
                    for contract in &err.deployed {
                        info!("deployed {} contract", contract.name);
                    }
                    for (name, message) in &err.failed {
                        info!("❌ Failed to deploy contract {name}: {message}");
                    }
                    Err(Error::DeploymentFailed)
                }
                Err(err) => Err(err),
            }
        })
    }

    /// Invokes an entry point by name. Gateway operations are addressed as
    /// `gateway.<method>`.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Deferred<Value> {
        match name {
            "install" => self.install(),
            "deploy" => self.deploy(),
            "getLogs" => match self.inner.logger.history().to_json() {
                Ok(json) => Deferred::resolved(Value::from(json)),
                Err(err) => Deferred::rejected(err),
            },
            other => match other.strip_prefix("gateway.") {
                Some(method) => self.inner.gateway.call(method, args),
                None => Deferred::rejected(Error::Unimplemented {
                    operation: other.to_owned(),
                    variant: "the entry points",
                }),
            },
        }
    }
}

fn build(
    config: &Config,
    engine: Arc<dyn Engine>,
    channel: &HostChannel,
    logger: Logger,
    alive: mpsc::Sender<()>,
) -> Result<EntryPoints> {
    let bridge = Bridge::new(config.unit_threads, logger.dispatch().clone())?;
    let fs: Arc<dyn FileSystem> = Arc::new(HostFileSystem::new(channel.clone()));
    let prompter: Arc<dyn Prompter> =
        Arc::new(HostPrompter::new(channel.clone()).max_attempts(config.prompt_max_attempts));

    let project = Project::load(fs.as_ref(), &config.config_paths)?;
    if !project.config.networks.contains_key(&config.network) {
        return Err(Error::Project(format!(
            "network {} is not defined in {}",
            config.network,
            project.path()
        )));
    }

    let local: Arc<dyn Gateway> = Arc::new(LocalGateway::new(Arc::clone(&engine)));
    let gateways = REMOTE_NETWORKS.iter().fold(
        GatewaySet::new().with(EMULATOR, Arc::clone(&local)),
        |set, network| set.with(*network, Arc::new(RemoteGateway::new(channel.clone(), network))),
    );
    debug!(?gateways, "gateways configured");

    Ok(EntryPoints {
        inner: Arc::new(Inner {
            gateway: InternalGateway::new(bridge.clone(), local),
            installer: DependencyInstaller::new(gateways, Arc::clone(&fs), prompter)
                .save_state(config.save_state)
                .skip_deployments(config.skip_deployments)
                .skip_alias(config.skip_alias),
            deployer: Deployer::new(engine, fs, config.network.clone()),
            bridge,
            logger,
            project: Arc::new(Mutex::new(project)),
            installing: Arc::new(Mutex::new(())),
            _alive: alive,
        }),
    })
}

/// Starts a sandbox on its own control thread.
///
/// The returned deferred settles exactly once: with the entry points when
/// registration succeeded, or with the start-up error. Loading the project
/// goes through `channel`, so the host must keep serving requests until the
/// deferred settles.
///
/// # Errors
/// Returns an error if the control thread cannot be spawned.
pub fn start(
    config: Config,
    engine: Arc<dyn Engine>,
    channel: HostChannel,
) -> Result<Deferred<EntryPoints>> {
    let (settler, ready) = Deferred::channel();
    thread::Builder::new()
        .name("flowbridge-control".to_owned())
        .spawn(move || {
            let logger = Logger::new(config.verbose, config.log_format, config.echo_stdout);
            let dispatch = logger.dispatch().clone();
            dispatcher::with_default(&dispatch, || {
                let (alive, released) = mpsc::channel::<()>();
                match build(&config, engine, &channel, logger, alive) {
                    Ok(entry_points) => {
                        info!(network = %config.network, "sandbox started");
                        settler.resolve(entry_points);
                        // Nothing is ever sent; this returns once all entry
                        // points are gone.
                        let _ = released.recv();
                        debug!("entry points dropped, control thread exiting");
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "sandbox failed to start");
                        settler.reject(err);
                    }
                }
            });
        })?;
    Ok(ready)
}
