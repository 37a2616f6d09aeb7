use hooks::config::Hook;
use hooks::error::{self, Result};
use hooks::runtime::HookEnvironment;
use hooks::{enabler, teardown};
use models::cleanup::K8SClusterObjectClient;
use models::telemetry;

use argh::FromArgs;
use snafu::ResultExt;
use std::process;
use tracing::{event, Level};

#[derive(FromArgs, Debug)]
/// Hooks for the csi-nfs module.
struct Arguments {
    #[argh(subcommand)]
    subcommand: SubCommand,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum SubCommand {
    SchedulerExtenderEnabler(SchedulerExtenderEnablerArgs),
    RemoveScAndSecretsOnModuleDelete(RemoveScAndSecretsArgs),
}

#[derive(FromArgs, Debug)]
/// Enable the scheduler extender when an NFSStorageClass selects workload nodes.
#[argh(subcommand, name = "scheduler-extender-enabler")]
struct SchedulerExtenderEnablerArgs {
    /// print the hook configuration and exit
    #[argh(switch)]
    config: bool,
}

#[derive(FromArgs, Debug)]
/// Release module secrets and remove its storage classes after the module is deleted.
#[argh(subcommand, name = "remove-sc-and-secrets-on-module-delete")]
struct RemoveScAndSecretsArgs {
    /// print the hook configuration and exit
    #[argh(switch)]
    config: bool,
}

#[tokio::main]
async fn main() {
    let arguments: Arguments = argh::from_env();

    if let Err(e) = run(arguments).await {
        eprintln!("{}", e);
        process::exit(1);
    }
}

async fn run(arguments: Arguments) -> Result<()> {
    let (hook, print_config) = match arguments.subcommand {
        SubCommand::SchedulerExtenderEnabler(args) => (Hook::SchedulerExtenderEnabler, args.config),
        SubCommand::RemoveScAndSecretsOnModuleDelete(args) => {
            (Hook::RemoveScAndSecretsOnModuleDelete, args.config)
        }
    };

    if print_config {
        print!("{}", hook.config_yaml()?);
        return Ok(());
    }

    telemetry::init_telemetry_from_env().context(error::TelemetryInitSnafu)?;
    event!(Level::DEBUG, hook = hook.name(), "Running hook.");

    match hook {
        Hook::SchedulerExtenderEnabler => {
            enabler::run(&HookEnvironment::from_env())?;
        }
        Hook::RemoveScAndSecretsOnModuleDelete => {
            let k8s_client = kube::client::Client::try_default()
                .await
                .context(error::ClientCreateSnafu)?;
            teardown::run(&K8SClusterObjectClient::new(k8s_client)).await?;
        }
    }

    Ok(())
}
