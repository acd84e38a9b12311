//! Hook delivery

use anyhow::{anyhow, Result};
use sshproxy_cluster::UnitRuntime;
use sshproxy_core::{HandlerOutcome, HookEvent};
use sshproxy_effects::UnitEffectSystem;
use std::process::ExitCode;

pub async fn run(runtime: &UnitRuntime<UnitEffectSystem>, event: &str) -> Result<ExitCode> {
    let event: HookEvent = event.parse()?;
    let outcome = runtime.deliver(event.clone()).await?;

    match outcome {
        HandlerOutcome::Handled => {
            println!("{event}: handled");
            Ok(ExitCode::SUCCESS)
        }
        HandlerOutcome::Deferred => {
            println!("{event}: deferred");
            Ok(ExitCode::SUCCESS)
        }
        HandlerOutcome::Failed(e) => Err(anyhow!(e).context(format!("{event} failed"))),
    }
}

pub async fn tick(runtime: &UnitRuntime<UnitEffectSystem>) -> Result<ExitCode> {
    let remaining = runtime.tick().await?;
    println!("{remaining} event(s) still deferred");
    Ok(ExitCode::SUCCESS)
}
