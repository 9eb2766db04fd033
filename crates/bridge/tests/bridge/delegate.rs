use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use flowbridge::{
    BoxError, Bridge, Capabilities, Error, Gateway, HostObject, RemoteGateway, Value,
    bridge::Settlement,
    delegate::{
        DeploymentData, FileSystem, HostFileSystem, HostPrompter, Prompter, PrompterAccount,
        filesystem::{DIR_MODE, FILE_MODE},
    },
};
use flowbridge_ledger::Address;
use tokio::sync::Notify;
use tracing::Dispatch;

use super::common::{
    FUNGIBLE_TOKEN, FUNGIBLE_TOKEN_ADDRESS, MemoryFs, RemoteNetwork, ScriptedPrompter, host,
};

fn bridge() -> Result<Bridge> {
    Bridge::new(2, Dispatch::none()).context("failed to build bridge")
}

#[test]
fn filesystem_calls_round_trip_through_the_host() -> Result<()> {
    let fs = MemoryFs::default().with_file("flow.json", "{}");
    let mut host = host(Capabilities::new().with_file_system(fs.clone()))?;
    let proxy = HostFileSystem::new(host.channel());

    let info = host
        .block_on(bridge()?.spawn("fs", move || {
            proxy.mkdir_all("imports/01", DIR_MODE)?;
            proxy.write_file("imports/01/A.cdc", "contract A {}", FILE_MODE)?;
            let read = proxy.read_file("imports/01/A.cdc")?;
            assert_eq!(read, "contract A {}");
            proxy.stat("imports/01/A.cdc")
        }))
        .context("filesystem unit rejected")?;

    assert_eq!(info.name, "A.cdc");
    assert_eq!(info.size, 13);
    assert!(!info.is_dir);
    assert_eq!(fs.file("imports/01/A.cdc").as_deref(), Some("contract A {}"));
    assert!(fs.has_dir("imports/01"));
    Ok(())
}

#[test]
fn delegate_errors_keep_the_host_message() -> Result<()> {
    let mut host = host(Capabilities::new().with_file_system(MemoryFs::default()))?;
    let proxy = HostFileSystem::new(host.channel());

    let rejection = host
        .block_on(bridge()?.spawn("read", move || proxy.read_file("cadence/missing.cdc")))
        .expect_err("missing file");
    assert_eq!(
        rejection.message,
        "open cadence/missing.cdc: no such file or directory"
    );
    Ok(())
}

#[test]
fn address_prompt_stops_at_first_accepted_answer() -> Result<()> {
    let prompter = ScriptedPrompter::default().address_answers([
        "not an address",
        "0xzz",
        "0x9a0766d93b6608b7",
        "never asked",
    ]);
    let mut host = host(Capabilities::new().with_prompter(prompter.clone()))?;
    let proxy = HostPrompter::new(host.channel());

    let answer = host
        .block_on(bridge()?.spawn("prompt", move || {
            proxy.address_prompt_or_empty("Enter an alias", &|answer| {
                Address::from_hex(answer)
                    .map(drop)
                    .map_err(|e| Error::Validation(e.to_string()))
            })
        }))
        .context("prompt rejected")?;

    assert_eq!(answer, "0x9a0766d93b6608b7");
    assert_eq!(prompter.calls_to("addressPromptOrEmpty"), 3);
    Ok(())
}

#[test]
fn address_prompt_is_bounded() -> Result<()> {
    let prompter = ScriptedPrompter::default().address_answers(["a", "b", "c", "d", "e"]);
    let mut host = host(Capabilities::new().with_prompter(prompter.clone()))?;
    let proxy = HostPrompter::new(host.channel()).max_attempts(3);

    let rejection = host
        .block_on(bridge()?.spawn("prompt", move || {
            proxy.address_prompt_or_empty("Enter an alias", &|_| {
                Err(Error::Validation("never valid".to_owned()))
            })
        }))
        .expect_err("bounded prompt");

    assert_eq!(rejection.message, "no accepted input after 3 attempts");
    assert_eq!(prompter.calls_to("addressPromptOrEmpty"), 3);
    Ok(())
}

fn ask_for_deployment(prompter: ScriptedPrompter) -> Result<Settlement<Option<DeploymentData>>> {
    let mut host = host(Capabilities::new().with_prompter(prompter))?;
    let proxy = HostPrompter::new(host.channel());
    let accounts = vec![PrompterAccount {
        name: "emulator-account".to_owned(),
        address: "f8d6e0586b0a20c7".to_owned(),
        key: "ab".to_owned(),
    }];
    Ok(host.block_on(bridge()?.spawn("deployment", move || {
        proxy.add_contract_to_deployment("emulator", &accounts, "FungibleToken")
    })))
}

#[test]
fn deployment_prompt_answers() -> Result<()> {
    let chooses = ScriptedPrompter::default().deploy_to("emulator-account");
    let chosen = ask_for_deployment(chooses.clone())?.context("choose rejected")?;
    assert_eq!(
        chosen,
        Some(DeploymentData {
            network: "emulator".to_owned(),
            account: "emulator-account".to_owned(),
            contracts: vec!["FungibleToken".to_owned()],
        })
    );
    let (_, args) = &chooses.calls()[0];
    assert_eq!(args[0], "emulator");
    assert_eq!(
        args[1],
        r#"[{"Name":"emulator-account","Address":"f8d6e0586b0a20c7","Key":"ab"}]"#
    );
    assert_eq!(args[2], "FungibleToken");

    let skipped = ask_for_deployment(ScriptedPrompter::default())?.context("skip rejected")?;
    assert_eq!(skipped, None);

    let refused = ask_for_deployment(ScriptedPrompter::default().refuse_selection())?
        .expect_err("no selection");
    assert_eq!(refused.message, "No account selected");
    Ok(())
}

#[test]
fn host_thread_is_never_blocked() -> Result<()> {
    let host = host(Capabilities::new().with_file_system(MemoryFs::default()))?;
    let proxy = HostFileSystem::new(host.channel());

    let err = proxy.read_file("flow.json").expect_err("host thread");
    assert!(matches!(err, Error::HostThreadBlocked { .. }));
    assert_eq!(
        err.to_string(),
        "flowFileSystem.readFile was called from the host thread"
    );
    Ok(())
}

#[test]
fn remote_gateway_decodes_host_accounts() -> Result<()> {
    let mainnet = RemoteNetwork::default()
        .with_account(FUNGIBLE_TOKEN_ADDRESS, &[("FungibleToken", FUNGIBLE_TOKEN)]);
    let mut host = host(Capabilities::new().with_network_gateway("mainnet", mainnet))?;
    let gateway = RemoteGateway::new(host.channel(), "mainnet");

    let account = host
        .block_on(bridge()?.spawn("getAccount", move || {
            gateway.ping()?;
            gateway.get_account(Address::from_hex(FUNGIBLE_TOKEN_ADDRESS)?)
        }))
        .context("remote getAccount rejected")?;

    assert_eq!(account.balance, 1_000);
    assert_eq!(account.contracts["FungibleToken"], FUNGIBLE_TOKEN.as_bytes());
    Ok(())
}

#[test]
fn remote_gateway_gaps_are_unimplemented() -> Result<()> {
    let mut host =
        host(Capabilities::new().with_network_gateway("testnet", RemoteNetwork::default()))?;
    let testnet = RemoteGateway::new(host.channel(), "testnet");
    let previewnet = RemoteGateway::new(host.channel(), "previewnet");
    assert!(testnet.secure_connection());

    let (unserved, unsupported, missing) = host
        .block_on(bridge()?.spawn("gaps", move || {
            Ok((
                testnet.wait_server(),
                testnet.get_latest_block(),
                previewnet.get_latest_block(),
            ))
        }))
        .context("gaps unit rejected")?;

    let unserved = unserved.expect_err("waitServer");
    assert!(matches!(unserved, Error::Unimplemented { .. }));
    assert_eq!(
        unserved.to_string(),
        "waitServer is not implemented by the remote gateway"
    );
    assert_eq!(
        unsupported.expect_err("getLatestBlock").to_string(),
        "getLatestBlock is not implemented by the remote gateway"
    );
    assert!(matches!(
        missing,
        Err(Error::UnknownCapability(name)) if name == "previewnetGateway"
    ));
    Ok(())
}

/// Host object that is still working when the host's own future completes.
struct LateAnswer {
    entered: Arc<Notify>,
}

#[async_trait(?Send)]
impl HostObject for LateAnswer {
    async fn call(&self, _method: &str, _args: Vec<Value>) -> std::result::Result<Value, BoxError> {
        self.entered.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(Value::from("late"))
    }
}

#[test]
fn in_flight_host_calls_outlive_block_on() -> Result<()> {
    let entered = Arc::new(Notify::new());
    let mut host = host(Capabilities::new().with(
        "lateAnswer",
        LateAnswer {
            entered: Arc::clone(&entered),
        },
    ))?;
    let channel = host.channel();
    let bridge = bridge()?;

    let pending = bridge.spawn("late", move || channel.call("lateAnswer", "answer", vec![]));
    host.block_on(entered.notified());

    let answer = host.block_on(pending).context("late host call")?;
    assert_eq!(answer.to_serde::<String>()?, "late");
    Ok(())
}
