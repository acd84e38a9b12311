//! Operator actions against a simulated cluster

use serde_json::{json, Map, Value};
use sshproxy_core::{CommandOutput, HookEvent};
use sshproxy_testkit::{SimulatedCluster, VerifyBehavior};

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[tokio::test]
async fn actions_fail_on_non_leaders() {
    let cluster = SimulatedCluster::new(2).await.unwrap();
    let follower = cluster.unit(1).runtime();

    for name in ["generate-ssh-key", "get-ssh-public-key", "verify-ssh-credentials", "reboot"] {
        let outcome = follower.run_action(name, &Map::new()).await;
        assert_eq!(outcome.failure.as_deref(), Some("not leader"), "{name}");
        assert!(outcome.results.is_empty());
    }
    assert!(cluster.unit(1).remote.commands().is_empty());
    assert_eq!(cluster.directory().write_count().await, 0);
}

#[tokio::test]
async fn generate_ssh_key_bootstraps_once() {
    let cluster = SimulatedCluster::new(2).await.unwrap();
    let leader = cluster.unit(0);

    let first = leader
        .runtime()
        .run_action("generate-ssh-key", &Map::new())
        .await;
    let second = leader
        .runtime()
        .run_action("generate-ssh-key", &Map::new())
        .await;

    assert!(first.is_success());
    assert_eq!(first.results["fingerprint"], second.results["fingerprint"]);
    assert_eq!(leader.crypto.generation_count(), 1);
    assert!(cluster.published_key().await.unwrap().is_some());
}

#[tokio::test]
async fn public_key_requires_a_key() {
    let cluster = SimulatedCluster::new(1).await.unwrap();
    let runtime = cluster.unit(0).runtime();

    let missing = runtime.run_action("get-ssh-public-key", &Map::new()).await;
    assert!(missing.failure.unwrap().contains("no SSH key"));

    cluster.deliver(0, HookEvent::Install).await.unwrap();
    let present = runtime.run_action("get-ssh-public-key", &Map::new()).await;
    let line = present.results["pubkey"].as_str().unwrap().to_string();
    assert!(line.starts_with("ssh-ed25519 "));
}

#[tokio::test]
async fn run_returns_stdout_and_fails_on_stderr() {
    let cluster = SimulatedCluster::new(1).await.unwrap();
    let unit = cluster.unit(0);

    unit.remote.set_output(CommandOutput::success(" 10:00 up 3 days"));
    let ok = unit
        .runtime()
        .run_action("run", &params(json!({"command": "uptime"})))
        .await;
    assert!(ok.is_success());
    assert_eq!(ok.results["output"], json!(" 10:00 up 3 days"));

    unit.remote.set_output(CommandOutput {
        stdout: String::new(),
        stderr: "permission denied".into(),
        exit_status: Some(1),
    });
    let failed = unit
        .runtime()
        .run_action("run", &params(json!({"command": "cat /etc/shadow"})))
        .await;
    assert_eq!(failed.failure.as_deref(), Some("permission denied"));

    assert_eq!(unit.remote.commands(), vec!["uptime", "cat /etc/shadow"]);
}

#[tokio::test]
async fn touch_and_reboot_issue_remote_commands() {
    let cluster = SimulatedCluster::new(1).await.unwrap();
    let unit = cluster.unit(0);

    let touch = unit
        .runtime()
        .run_action("touch", &params(json!({"filename": "/home/ubuntu/first touch"})))
        .await;
    assert!(touch.is_success());
    unit.runtime().run_action("reboot", &Map::new()).await;

    assert_eq!(
        unit.remote.commands(),
        vec!["touch '/home/ubuntu/first touch'", "sudo reboot"]
    );
}

#[tokio::test]
async fn verify_reports_the_result_without_changing_status() {
    let cluster = SimulatedCluster::new(1).await.unwrap();
    let unit = cluster.unit(0);
    unit.remote.set_verify(VerifyBehavior::Reject);

    let outcome = unit
        .runtime()
        .run_action("verify-ssh-credentials", &Map::new())
        .await;
    assert!(outcome.is_success());
    assert_eq!(outcome.results["verified"], json!(false));
    assert!(unit.status.history().is_empty());
}

#[tokio::test]
async fn malformed_invocations_are_rejected() {
    let cluster = SimulatedCluster::new(1).await.unwrap();
    let runtime = cluster.unit(0).runtime();

    let unknown = runtime.run_action("start", &Map::new()).await;
    assert!(unknown.failure.unwrap().contains("unknown action"));

    let missing = runtime.run_action("touch", &Map::new()).await;
    assert!(missing.failure.unwrap().contains("filename"));
}
