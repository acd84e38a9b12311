use anyhow::Result;
use sshproxy_cluster::UnitRuntime;
use sshproxy_effects::UnitEffectSystem;
use std::process::ExitCode;

pub async fn show(runtime: &UnitRuntime<UnitEffectSystem>) -> Result<ExitCode> {
    let report = runtime.report().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}
