mod support;

use std::fs;

use predicates::str::contains;

use support::{cmd_in, envelope, TestRoot};

fn initialized() -> Result<TestRoot, Box<dyn std::error::Error>> {
    let root = TestRoot::new();
    cmd_in(&root).arg("init").assert().success();
    Ok(root)
}

#[test]
fn add_and_list_emit_envelopes() -> Result<(), Box<dyn std::error::Error>> {
    let root = initialized()?;

    let output = cmd_in(&root)
        .args(["--json", "add", "Write docs", "-c", "docs", "-f", "./README.md"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let added = envelope(&output);
    assert_eq!(added["schema_version"], "tasktracker.v1");
    assert_eq!(added["command"], "add");
    assert_eq!(added["status"], "success");
    assert_eq!(added["data"]["id"], 1);
    assert_eq!(added["data"]["status"], "todo");
    assert_eq!(added["data"]["relatedFiles"][0], "README.md");

    cmd_in(&root)
        .args(["add", "Fix crash", "--category", "bugfix"])
        .assert()
        .success()
        .stdout(contains("Created task 2"));

    let output = cmd_in(&root)
        .args(["list", "--category", "bugfix", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listed = envelope(&output);
    assert_eq!(listed["data"]["total"], 1);
    assert_eq!(listed["data"]["tasks"][0]["title"], "Fix crash");
    Ok(())
}

#[test]
fn validation_errors_exit_with_user_code() -> Result<(), Box<dyn std::error::Error>> {
    let root = initialized()?;
    let long_title = "x".repeat(201);

    let output = cmd_in(&root)
        .args(["--json", "add", long_title.as_str()])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let failed = envelope(&output);
    assert_eq!(failed["status"], "error");
    assert_eq!(failed["error"]["kind"], "validation_error");
    assert_eq!(failed["error"]["details"]["field"], "title");

    cmd_in(&root)
        .args(["show", "42"])
        .assert()
        .code(2)
        .stderr(contains("Task not found: 42"))
        .stderr(contains("hint: tasktracker list"));
    Ok(())
}

#[test]
fn update_comment_and_rm() -> Result<(), Box<dyn std::error::Error>> {
    let root = initialized()?;
    cmd_in(&root).args(["add", "Draft", "-e", "3-medium"]).assert().success();

    cmd_in(&root)
        .args(["update", "1", "--status", "review", "--clear-effort"])
        .assert()
        .success();
    let task = &root.read_json("tasks.json")["tasks"][0];
    assert_eq!(task["status"], "review");
    assert!(task.get("effort").is_none());

    cmd_in(&root)
        .args(["comment", "1", "Looks good", "--author", "kim"])
        .assert()
        .success();
    cmd_in(&root)
        .args(["show", "1"])
        .assert()
        .success()
        .stdout(contains("kim: Looks good"));

    cmd_in(&root)
        .args(["update", "1"])
        .assert()
        .code(2)
        .stderr(contains("no fields to update"));

    cmd_in(&root).args(["rm", "1"]).assert().success();
    cmd_in(&root).args(["show", "1"]).assert().code(2);
    Ok(())
}

#[test]
fn dependency_commands() -> Result<(), Box<dyn std::error::Error>> {
    let root = initialized()?;
    cmd_in(&root).args(["add", "Base"]).assert().success();
    cmd_in(&root).args(["add", "Top"]).assert().success();

    cmd_in(&root)
        .args(["dep", "add", "2", "1"])
        .assert()
        .success()
        .stdout(contains("Task 2 now depends on 1"));
    cmd_in(&root)
        .args(["dep", "add", "2", "1"])
        .assert()
        .success()
        .stdout(contains("already depends"));

    let output = cmd_in(&root)
        .args(["--json", "dep", "ls", "1"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listed = envelope(&output);
    assert_eq!(listed["command"], "dep ls");
    assert_eq!(listed["data"]["blocked_by"], serde_json::json!([2]));

    cmd_in(&root).args(["dep", "add", "1", "1"]).assert().code(2);

    let output = cmd_in(&root)
        .args(["--json", "rm", "1"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let removed = envelope(&output);
    assert_eq!(removed["data"]["task"]["id"], 1);
    assert_eq!(removed["data"]["dangling"][0]["missing"], serde_json::json!([1]));

    cmd_in(&root)
        .args(["dep", "ls"])
        .assert()
        .success()
        .stdout(contains("references missing task(s) 1"));
    Ok(())
}

#[test]
fn archive_commands() -> Result<(), Box<dyn std::error::Error>> {
    let root = initialized()?;
    cmd_in(&root).args(["add", "Retire me"]).assert().success();

    cmd_in(&root)
        .args(["archive", "1", "--reason", "obsolete"])
        .assert()
        .success()
        .stdout(contains("Archived task 1"));

    let output = cmd_in(&root)
        .args(["--json", "archived", "--since", "2000-01-01"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listed = envelope(&output);
    assert_eq!(listed["data"]["total"], 1);
    assert_eq!(listed["data"]["tasks"][0]["archived"]["reason"], "obsolete");

    cmd_in(&root)
        .args(["archived", "--until", "not-a-date"])
        .assert()
        .code(2);

    cmd_in(&root).args(["restore", "1"]).assert().success();
    cmd_in(&root).args(["restore", "1"]).assert().code(2);
    cmd_in(&root).args(["show", "1"]).assert().success();
    Ok(())
}

#[test]
fn corrupt_store_warns_on_stderr() -> Result<(), Box<dyn std::error::Error>> {
    let root = initialized()?;
    fs::write(root.data_file("tasks.json"), "garbage")?;

    cmd_in(&root)
        .arg("list")
        .assert()
        .success()
        .stderr(contains("warning:"))
        .stderr(contains("tasks.json.corrupt-"));

    let output = cmd_in(&root)
        .args(["--json", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(envelope(&output).get("warnings").is_none());
    Ok(())
}

#[test]
fn json_envelope_lists_typed_store_warnings() -> Result<(), Box<dyn std::error::Error>> {
    let root = initialized()?;
    fs::write(root.data_file("tasks.json"), "{ not json")?;

    let output = cmd_in(&root)
        .args(["--json", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listed = envelope(&output);
    assert_eq!(listed["data"]["total"], 0);
    assert_eq!(listed["warnings"][0]["kind"], "corrupt_file_recovered");
    assert!(listed["warnings"][0]["backup"]
        .as_str()
        .is_some_and(|backup| backup.contains("tasks.json.corrupt-")));
    Ok(())
}

#[test]
fn error_envelope_reports_message_and_command() -> Result<(), Box<dyn std::error::Error>> {
    let root = initialized()?;
    let output = cmd_in(&root)
        .args(["--json", "dep", "rm", "5", "4"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(envelope(&output)["data"]["changed"], false);

    let output = cmd_in(&root)
        .args(["--json", "restore", "7"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let failed = envelope(&output);
    assert_eq!(failed["command"], "restore");
    assert_eq!(failed["error"]["kind"], "not_found");
    assert!(failed["error"]["message"]
        .as_str()
        .is_some_and(|message| message.contains('7')));
    Ok(())
}
