// ABOUTME: Integration tests for the tankobon CLI binary.
// ABOUTME: Runs list, tags and details against httpmock servers and checks JSON output and failures.

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::CommandCargoExt;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn tankobon_cmd() -> Command {
    Command::cargo_bin("tankobon").unwrap()
}

#[test]
fn unknown_source_fails() {
    tankobon_cmd()
        .arg("NOPE")
        .arg("tags")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown source: NOPE"));
}

#[test]
fn list_uses_config_file_overrides() {
    let server = MockServer::start();
    let directory = server.mock(|when, then| {
        when.method(GET)
            .path("/directory/2.htm")
            .header("user-agent", "tankobon-test");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(
                r#"<ul class="manga-list-1-list">
                     <li><a href="/manga/berserk/" title="Berserk"><img class="manga-list-1-cover" src="/b.jpg"></a></li>
                     <li><a href="/manga/vagabond/" title="Vagabond"></a></li>
                   </ul>"#,
            );
    });

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("mangahere.json");
    fs::write(
        &config_path,
        format!(
            r#"{{"domain": "{}", "scheme": "http", "user_agent": "tankobon-test"}}"#,
            server.address()
        ),
    )
    .unwrap();

    let output = tankobon_cmd()
        .arg("mangahere")
        .arg("list")
        .arg("--page")
        .arg("2")
        .arg("--order")
        .arg("popularity")
        .arg("--config")
        .arg(&config_path)
        .arg("--compact")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    directory.assert();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["source"], "MANGAHERE");
    assert_eq!(json["count"], 2);
    assert_eq!(json["order"], "popularity");
    assert_eq!(json["page_size"], 60);
    assert_eq!(json["manga"][1]["url"], "/manga/vagabond/");
}

#[test]
fn invalid_filter_reports_error() {
    tankobon_cmd()
        .args(["MANGAHERE", "list", "--tag", "action", "--tag", "drama"])
        .args(["--domain", "127.0.0.1:9", "--scheme", "http"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("only one tag is supported"));
}

#[test]
fn tags_for_template_site() {
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET).path("/manga-list.html");
        then.status(200).body(
            r#"<ul class="genres">
                 <li><a href="/lista-de-comics-genero-accion.html">Acción</a></li>
                 <li><a href="/lista-de-comics-genero-drama.html">Drama</a></li>
               </ul>"#,
        );
    });

    tankobon_cmd()
        .args(["OLIMPOSCANS", "tags"])
        .args(["--domain", &server.address().to_string(), "--scheme", "http"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"accion\""))
        .stdout(predicate::str::contains("\"drama\""))
        .stdout(predicate::str::contains("\"is_search_supported\": true"));
    listing.assert();
}

#[test]
fn details_accepts_absolute_urls() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/manga/berserk/");
        then.status(200).body(
            r#"<span class="detail-info-right-title-tip">Completed</span>
               <p class="fullcontent">Guts.</p>
               <ul class="detail-main-list">
                 <li><a href="/manga/berserk/c001/1.html"><p class="title3">Ch.001</p><p class="title2">Feb 01,2024</p></a></li>
               </ul>"#,
        );
    });

    let url = server.url("/manga/berserk/");
    tankobon_cmd()
        .args(["MANGAHERE", "details", &url])
        .args(["--domain", &server.address().to_string(), "--scheme", "http"])
        .arg("--compact")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""url":"/manga/berserk/""#))
        .stdout(predicate::str::contains(r#""state":"finished""#))
        .stdout(predicate::str::contains(r#""upload_date":1706745600000"#));
}
