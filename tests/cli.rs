#![allow(deprecated)]

use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn cmd_bin(temp: &TempDir, bin: &str) -> assert_cmd::Command {
    let mut c = assert_cmd::Command::cargo_bin(bin).unwrap();
    c.env("HOME", temp.path())
        .env("NO_COLOR", "1")
        .env_remove("NVNOTES_CONFIG")
        .env_remove("RUST_LOG");
    c
}

fn cmd(temp: &TempDir) -> assert_cmd::Command {
    cmd_bin(temp, "nvnotes")
}

fn db_dir(temp: &TempDir) -> PathBuf {
    temp.path().join(".nvnotes")
}

fn stdout_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).to_string()
}

/// Create a note and return its key from the `Created note <key>` line.
fn new_note(temp: &TempDir, args: &[&str]) -> String {
    let mut full = vec!["new"];
    full.extend_from_slice(args);
    let out = stdout_of(cmd(temp).args(&full).assert().success());
    out.split_whitespace().nth(2).expect("key in output").to_string()
}

fn write_config(temp: &TempDir, body: &str) -> PathBuf {
    let path = temp.path().join(".nvnotesrc");
    fs::write(&path, body).unwrap();
    path
}

fn read_json(dir: &Path, key: &str) -> serde_json::Value {
    let raw = fs::read_to_string(dir.join(format!("{key}.json"))).expect("note file");
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn new_persists_json_and_lists() {
    let temp = TempDir::new().unwrap();
    let key = new_note(&temp, &["Shopping\nmilk\neggs", "-t", "home, to do"]);

    let doc = read_json(&db_dir(&temp), &key);
    assert_eq!(doc["content"], "Shopping\nmilk\neggs");
    assert_eq!(doc["tags"], serde_json::json!(["home", "todo"]));
    assert_eq!(doc["deleted"], false);
    assert!(doc["savedate"].as_f64().unwrap() >= doc["modifydate"].as_f64().unwrap());

    cmd(&temp)
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Shopping"))
        .stdout(predicate::str::contains("home, todo"))
        .stdout(predicate::str::contains(key.as_str()));

    assert!(db_dir(&temp).join("nvnotes.log").exists());
}

#[test]
fn list_search_filters_and_reports_empty() {
    let temp = TempDir::new().unwrap();
    cmd(&temp)
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No notes yet"));

    new_note(&temp, &["Alpha apples"]);
    new_note(&temp, &["Beta bananas"]);

    let out = stdout_of(cmd(&temp).args(["list", "-s", "apples"]).assert().success());
    assert!(out.contains("Alpha apples"));
    assert!(!out.contains("Beta"));

    cmd(&temp)
        .args(["list", "-s", "cherries"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No matching notes."));
}

#[test]
fn gstyle_tag_filter() {
    let temp = TempDir::new().unwrap();
    new_note(&temp, &["Report", "-t", "work"]);
    new_note(&temp, &["Recipe", "-t", "home"]);
    let out = stdout_of(cmd(&temp).args(["list", "-s", "tag:wo"]).assert().success());
    assert!(out.contains("Report"));
    assert!(!out.contains("Recipe"));
}

#[test]
fn show_numbers_links_and_handles_missing_keys() {
    let temp = TempDir::new().unwrap();
    let key = new_note(&temp, &["Links\nsee https://example.com/x and [[Other Note]]"]);

    cmd(&temp)
        .args(["show", &key, "-s", "see"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Key: "))
        .stdout(predicate::str::contains("https://example.com/x[1] and [[Other Note]][2]"));

    cmd(&temp)
        .args(["links", &key])
        .assert()
        .success()
        .stdout(predicate::str::diff("https://example.com/x[1]\n[[Other Note]][2]\n"));

    cmd(&temp)
        .args(["show", "nope"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to display."));
}

#[test]
fn show_render_markdown() {
    let temp = TempDir::new().unwrap();
    let key = new_note(&temp, &["# Plan\n\n- one\n- two"]);
    cmd(&temp)
        .args(["show", &key, "--render", "--plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Plan"))
        .stdout(predicate::str::contains("- one\n- two"));
}

#[test]
fn follow_note_reference_and_url() {
    let temp = TempDir::new().unwrap();
    let target = new_note(&temp, &["Target note\nthe body"]);
    let source = new_note(&temp, &["Source\nread [[Target note]] or https://example.org/"]);

    cmd(&temp)
        .args(["follow", &source, "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Opened note {target}")))
        .stdout(predicate::str::contains("the body"));

    cmd(&temp)
        .env("BROWSER", "true")
        .args(["follow", &source, "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Opened https://example.org/"));

    cmd(&temp)
        .args(["follow", &source, "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no link 7"));
}

#[test]
fn pinned_notes_sort_first() {
    let temp = TempDir::new().unwrap();
    let alpha = new_note(&temp, &["Alpha"]);
    cmd(&temp)
        .args(["pin", &alpha])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Pinned {alpha}")));
    new_note(&temp, &["Beta"]);

    let out = stdout_of(cmd(&temp).args(["list"]).assert().success());
    let a = out.find("Alpha").unwrap();
    let b = out.find("Beta").unwrap();
    assert!(a < b, "pinned note should be listed first:\n{out}");
    assert!(out.contains("1 | * | Alpha"));

    let doc = read_json(&db_dir(&temp), &alpha);
    assert_eq!(doc["systemtags"], serde_json::json!(["pinned"]));

    cmd(&temp).args(["unpin", &alpha]).assert().success();
    let out = stdout_of(cmd(&temp).args(["list"]).assert().success());
    assert!(!out.contains("| * |"), "{out}");
    assert_eq!(read_json(&db_dir(&temp), &alpha)["systemtags"], serde_json::json!([]));
}

#[test]
fn tag_append_and_delete() {
    let temp = TempDir::new().unwrap();
    let key = new_note(&temp, &["Groceries"]);

    cmd(&temp)
        .args(["tag", &key, "to do, x<y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("todo, xy"));

    cmd(&temp).args(["append", &key, "milk"]).assert().success();
    assert_eq!(read_json(&db_dir(&temp), &key)["content"], "Groceries\nmilk");

    cmd(&temp).args(["delete", &key]).assert().success();
    assert_eq!(read_json(&db_dir(&temp), &key)["deleted"], true);
    cmd(&temp)
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No notes yet"));
    cmd(&temp).args(["delete", &key]).assert().failure();
    cmd(&temp)
        .args(["append", &key, "eggs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(format!("Note {key} not found")));
    cmd(&temp).args(["tag", &key, "late"]).assert().failure();
    let doc = read_json(&db_dir(&temp), &key);
    assert_eq!(doc["content"], "Groceries\nmilk");
    assert_eq!(doc["tags"], serde_json::json!(["todo", "xy"]));
    cmd(&temp)
        .args(["pin", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Note missing not found"));
}

#[test]
fn corrupt_database_exits_with_error() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(db_dir(&temp)).unwrap();
    fs::write(db_dir(&temp).join("broken.json"), "{not json").unwrap();

    cmd(&temp)
        .args(["list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Sync error: Please check nvnotes.log."));

    let log = fs::read_to_string(db_dir(&temp).join("nvnotes.log")).unwrap();
    assert!(log.contains("could not open note database"));
}

#[test]
fn config_layering_and_warnings() {
    let temp = TempDir::new().unwrap();
    cmd(&temp)
        .args(["config"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No config file"));

    let rc = write_config(&temp, "[nvnotes]\nsort_mode = 0\nsn_password = secret\n");
    cmd(&temp)
        .args(["config"])
        .assert()
        .success()
        .stdout(predicate::str::contains(rc.display().to_string()))
        .stdout(predicate::str::is_match(r"sort_mode\s+= 0").unwrap())
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("secret").not());

    let extra = temp.path().join("extra.cfg");
    fs::write(&extra, "[nvnotes]\ndb_path = %(home)s/elsewhere\n").unwrap();
    cmd(&temp)
        .env("NVNOTES_CONFIG", &extra)
        .args(["path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("elsewhere"));

    write_config(&temp, "[default]\nsort_mode = 0\n");
    cmd(&temp)
        .args(["config"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Rename config section"));
}

#[test]
fn alphabetical_sort_and_regexp_mode() {
    let temp = TempDir::new().unwrap();
    write_config(&temp, "[nvnotes]\nsort_mode = 0\nsearch_mode = regexp\n");
    new_note(&temp, &["beta"]);
    new_note(&temp, &["Alpha"]);
    new_note(&temp, &["Also here"]);

    let out = stdout_of(cmd(&temp).args(["list"]).assert().success());
    let alpha = out.find("Alpha").unwrap();
    let also = out.find("Also").unwrap();
    let beta = out.find("beta").unwrap();
    assert!(alpha < also && also < beta, "{out}");

    let out = stdout_of(cmd(&temp).args(["list", "-s", "^Al"]).assert().success());
    assert!(out.contains("Alpha") && out.contains("Also"));
    assert!(!out.contains("beta"));

    let out = stdout_of(cmd(&temp).args(["list", "-s", "(unclosed"]).assert().success());
    assert!(out.contains("Alpha") && out.contains("beta"));
}

#[test]
fn notes_as_txt_writes_copies() {
    let temp = TempDir::new().unwrap();
    write_config(&temp, "[nvnotes]\nnotes_as_txt = 1\ntxt_path = txt\n");
    new_note(&temp, &["Groceries\nmilk"]);
    let copy = fs::read_to_string(temp.path().join("txt").join("Groceries.txt")).unwrap();
    assert_eq!(copy, "Groceries\nmilk");
}

#[test]
fn browse_session() {
    let temp = TempDir::new().unwrap();
    new_note(&temp, &["Milk run\nbuy milk, see [[Other]]"]);
    let other = new_note(&temp, &["Other"]);

    cmd(&temp)
        .args(["browse"])
        .write_stdin("milk\n1\np\nt errands\no 1\no 5\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Milk run"))
        .stdout(predicate::str::contains("buy milk"))
        .stdout(predicate::str::contains("Pinned."))
        .stdout(predicate::str::contains("Tags: errands"))
        .stdout(predicate::str::contains(format!("Opened note {other}")))
        .stdout(predicate::str::contains("No such link"));

    cmd(&temp)
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 | * | Milk run"))
        .stdout(predicate::str::contains("errands"));
}

#[test]
fn status_help_and_alias() {
    let temp = TempDir::new().unwrap();
    new_note(&temp, &["One"]);
    cmd(&temp)
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 of 1 notes listed."))
        .stdout(predicate::str::contains("nvnotes.log"));

    cmd(&temp)
        .args(["help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("browse"))
        .stdout(predicate::str::contains("NO_COLOR"));

    cmd(&temp)
        .args(["help", "follow"])
        .assert()
        .success()
        .stdout(predicate::str::contains("usage: nvnotes follow <key> <n>"));

    cmd(&temp)
        .args(["frobnicate"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Unknown command: frobnicate"));

    cmd_bin(&temp, "nv")
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("One"));
}

#[test]
fn usage_errors() {
    let temp = TempDir::new().unwrap();
    cmd(&temp)
        .args(["new"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Provide the note text"));
    cmd(&temp)
        .args(["show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: nvnotes show <key>"));
    cmd(&temp)
        .args(["list", "--bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown flag for list: --bogus"));
    cmd(&temp)
        .args(["follow", "k", "zero"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid link number: zero"));
}
