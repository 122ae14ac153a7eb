// End-to-end tests for the rota binary.

use std::path::Path;
use std::process::{Command, Output};

fn rota(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rota"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run rota")
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    let config = dir.join("config.toml");
    std::fs::write(
        &config,
        format!(
            "[storage]\ndata_dir = {:?}\nlease_dir = {:?}\n",
            dir.join("data").display().to_string(),
            dir.join("leases").display().to_string()
        ),
    )
    .unwrap();
    config
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn cli_help_displays_correctly() {
    let output = Command::new(env!("CARGO_BIN_EXE_rota"))
        .arg("--help")
        .output()
        .expect("failed to run rota --help");

    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("Lead Rota"));
    for command in ["serve", "dispatch", "tenant", "agent", "lead", "config"] {
        assert!(stdout.contains(command), "missing {command}");
    }
}

#[test]
fn tenant_help_lists_operations() {
    let output = Command::new(env!("CARGO_BIN_EXE_rota"))
        .args(["tenant", "--help"])
        .output()
        .expect("failed to run rota tenant --help");

    assert!(output.status.success());
    let stdout = stdout(&output);
    for command in ["provision", "deprovision", "list", "status", "quota", "resolve"] {
        assert!(stdout.contains(command), "missing {command}");
    }
}

#[test]
fn provision_register_and_dispatch() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(tmp.path());

    let output = rota(
        &config,
        &["--format", "json", "tenant", "provision", "Acme", "--admin", "boss@acme.io"],
    );
    assert!(output.status.success(), "{output:?}");
    let tenant: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let tenant_id = tenant["tenantId"].as_str().unwrap().to_string();

    for agent in ["b@acme.io", "a@acme.io"] {
        let output = rota(
            &config,
            &["agent", "add", &tenant_id, agent, "--online", "--verified"],
        );
        assert!(output.status.success(), "{output:?}");
    }
    for id in ["l1", "l2", "l3"] {
        let output = rota(&config, &["lead", "add", &tenant_id, "--id", id]);
        assert!(output.status.success(), "{output:?}");
    }

    let output = rota(&config, &["--format", "json", "dispatch"]);
    assert!(output.status.success(), "{output:?}");
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let run = &report["completed"]["tenants"][0];
    assert_eq!(run["tenantId"], tenant_id.as_str());
    let assignments = run["result"]["finished"]["assignments"].as_array().unwrap();
    assert_eq!(assignments.len(), 3);
    assert_eq!(assignments[0]["agent"], "a@acme.io");

    let output = rota(&config, &["lead", "list", &tenant_id, "--unassigned"]);
    assert!(output.status.success());
    assert!(stdout(&output).trim().is_empty());

    let output = rota(&config, &["tenant", "resolve", "b@acme.io"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains(&tenant_id));
}

#[test]
fn unknown_tenant_prints_hint() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(tmp.path());

    let output = rota(&config, &["lead", "add", "NOPE"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Tenant 'NOPE' not found"), "{stderr}");
    assert!(stderr.contains("rota tenant list --all"), "{stderr}");
}
