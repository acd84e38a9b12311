//! Operator action invocation

use anyhow::{bail, Result};
use serde_json::{Map, Value};
use sshproxy_cluster::UnitRuntime;
use sshproxy_effects::UnitEffectSystem;
use std::process::ExitCode;

/// Parse repeated `key=value` arguments into action parameters
pub fn parse_params(raw: &[String]) -> Result<Map<String, Value>> {
    let mut params = Map::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("parameter '{entry}' is not key=value");
        };
        if key.is_empty() {
            bail!("parameter '{entry}' has an empty key");
        }
        params.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(params)
}

pub async fn run(
    runtime: &UnitRuntime<UnitEffectSystem>,
    name: &str,
    raw_params: &[String],
) -> Result<ExitCode> {
    let params = parse_params(raw_params)?;
    let outcome = runtime.run_action(name, &params).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_keep_everything_after_the_first_equals() {
        let params = parse_params(&["command=echo a=b".to_string()]).unwrap();
        assert_eq!(params["command"], Value::String("echo a=b".into()));
    }

    #[test]
    fn malformed_params_are_rejected() {
        assert!(parse_params(&["command".to_string()]).is_err());
        assert!(parse_params(&["=x".to_string()]).is_err());
    }
}
