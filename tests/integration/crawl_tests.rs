//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run full jobs
//! end-to-end: fetch, extract, paginate, merge and write.

use gleaner::config::{parse_config, Config};
use gleaner::crawler::{export_from_store, run_crawl, CrawlOptions, CrawlOutcome};
use gleaner::state::PageOutcome;
use gleaner::storage::{RecordStore, RunStatus, SqliteStore};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a config whose `{base}` placeholders point at the mock server
fn create_test_config(base: &str, dir: &Path, crawler: &str, output: &str, jobs: &str) -> Config {
    let toml = format!(
        "[crawler]\ntimeout-secs = 5\nretry-backoff-ms = 10\n{}\n\n[output]\ndirectory = \"{}\"\n{}\n\n{}",
        crawler,
        dir.join("out").display(),
        output,
        jobs.replace("{base}", base)
    );
    parse_config(&toml).expect("test config should be valid")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>{}</body></html>", body),
        "text/html; charset=utf-8",
    )
}

async fn crawl(config: Config) -> CrawlOutcome {
    run_crawl(
        config,
        "test-hash",
        CrawlOptions::default(),
        Arc::new(AtomicBool::new(false)),
    )
    .await
    .expect("crawl should succeed")
}

fn read_json(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path).expect("output file should exist");
    serde_json::from_str(&text).expect("output file should be JSON")
}

const API_JOB: &str = r#"
[[dataset]]
name = "characters"

[[job]]
id = "api"
dataset = "characters"
seeds = ["{base}/api/characters"]
max-pages = 5
entity-key = { field = "id" }
items-path = "results"
next-path = "next"

[[job.field]]
name = "id"
strategies = [{ path = "id" }]

[[job.field]]
name = "name"
strategies = [{ path = "name" }]

[[job.field]]
name = "species"
strategies = [{ path = "species" }]
"#;

#[tokio::test]
async fn test_structured_single_page() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/characters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "id": "1", "name": "Alpha" }],
            "next": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), temp.path(), "", "", API_JOB);
    let outcome = crawl(config).await;

    let report = &outcome.reports[0];
    assert_eq!(report.pages, 1);
    assert_eq!(report.requests_issued, 1);
    assert_eq!(report.outcome_count(PageOutcome::Extracted), 1);

    let records = read_json(&temp.path().join("out/characters.json"));
    assert_eq!(records.as_array().map(Vec::len), Some(1));
    assert_eq!(records[0]["id"], "1");
    assert_eq!(records[0]["name"], "Alpha");
    assert_eq!(records[0]["species"], "");
    assert_eq!(records[0]["_provenance"]["source"], "api");
}

const DRILL_DOWN_JOB: &str = r#"
[[dataset]]
name = "characters"

[[job]]
id = "cards"
dataset = "characters"
seeds = ["{base}/characters"]
max-pages = 3
entity-key = { field = "url", segment = 1 }
item-scope = "div.card"

[[job.field]]
name = "url"
absolute-url = true
drill-down = true
strategies = [{ css = "a", attr = "href" }]

[[job.field]]
name = "name"
strategies = [{ css = "h3.name" }, { css = "a" }]

[[job.field]]
name = "description"
strategies = [{ css = "p.desc" }]

[job.detail]
item-scope = "main"

[[job.detail.field]]
name = "description"
strategies = [{ css = "div.bio" }]
"#;

#[tokio::test]
async fn test_drill_down_merges_into_one_record() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/characters"))
        .respond_with(html(
            r#"<div class="card"><a href="/character/7">Beta</a><p class="desc"></p></div>
               <div class="card"><span>Sponsored</span></div>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/character/7"))
        .respond_with(html(r#"<main><div class="bio">  full
            bio </div></main>"#))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), temp.path(), "", "", DRILL_DOWN_JOB);
    let outcome = crawl(config).await;

    let report = &outcome.reports[0];
    assert_eq!(report.pages, 1);
    assert_eq!(report.details, 1);
    assert_eq!(report.skipped, 1);

    let output = &outcome.outputs[0];
    assert_eq!(output.records.len(), 1);
    let record = &output.records[0];
    assert_eq!(record.entity_key(), "7");
    assert_eq!(record.get("name"), "Beta");
    assert_eq!(record.get("description"), "full bio");
    assert_eq!(record.get("url"), format!("{}/character/7", server.uri()));
}

const DEFAULTED_DRILL_DOWN_JOB: &str = r#"
[[dataset]]
name = "characters"

[[job]]
id = "cards"
dataset = "characters"
seeds = ["{base}/characters"]
entity-key = { field = "url", segment = 1 }
item-scope = "div.card"

[[job.field]]
name = "url"
absolute-url = true
drill-down = true
default = "/character/none"
strategies = [{ css = "a", attr = "href" }]

[[job.field]]
name = "name"
default = "Unknown"
strategies = [{ css = "h3" }]

[job.detail]
item-scope = "main"

[[job.detail.field]]
name = "name"
default = "Unknown"
strategies = [{ css = "h1.title" }]

[[job.detail.field]]
name = "anime"
default = "Unknown"
strategies = [{ css = "span.anime" }]
"#;

#[tokio::test]
async fn test_detail_defaults_do_not_override_listing_values() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/characters"))
        .respond_with(html(
            r#"<div class="card"><a href="/character/7"></a><h3>Beta</h3></div>
               <div class="card"><h3>Sponsored</h3></div>
               <div class="card"><h3>Also sponsored</h3></div>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/character/7"))
        .respond_with(html("<main><p>No title block here</p></main>"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), temp.path(), "", "", DEFAULTED_DRILL_DOWN_JOB);
    let outcome = crawl(config).await;

    let report = &outcome.reports[0];
    assert_eq!(report.details, 1);
    assert_eq!(report.skipped, 2);

    let output = &outcome.outputs[0];
    assert_eq!(output.records.len(), 1);
    let record = &output.records[0];
    assert_eq!(record.entity_key(), "7");
    assert_eq!(record.get("name"), "Beta");
    assert_eq!(record.get("anime"), "Unknown");
}

#[tokio::test]
async fn test_no_items_and_no_cue_stops_after_one_page() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/characters"))
        .respond_with(html("<p>Nothing here yet</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), temp.path(), "", "", DRILL_DOWN_JOB);
    let outcome = crawl(config).await;

    assert_eq!(outcome.reports[0].pages, 1);
    assert_eq!(outcome.reports[0].records, 0);
    assert!(outcome.outputs[0].records.is_empty());

    let records = read_json(&temp.path().join("out/characters.json"));
    assert_eq!(records, serde_json::json!([]));
}

const GROUPED_JOB: &str = r#"
[[dataset]]
name = "characters"
group-by = ["category"]

[[job]]
id = "grouped"
dataset = "characters"
seeds = ["{base}/list/1"]
max-pages = 5
entity-key = { field = "id" }
item-scope = "li.item"

[[job.field]]
name = "id"
strategies = [{ css = "", attr = "data-id" }]

[[job.field]]
name = "category"
strategies = [{ css = "span.cat" }]
"#;

#[tokio::test]
async fn test_grouping_writes_one_file_per_value() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/list/1"))
        .respond_with(html(
            r#"<ul>
                 <li class="item" data-id="1"><span class="cat">a</span></li>
                 <li class="item" data-id="2"><span class="cat">a</span></li>
               </ul>
               <a rel="next" href="/list/2">Next</a>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/list/2"))
        .respond_with(html(
            r#"<ul><li class="item" data-id="3"><span class="cat">b</span></li></ul>"#,
        ))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), temp.path(), "", "", GROUPED_JOB);
    let outcome = crawl(config).await;

    assert_eq!(outcome.reports[0].pages, 2);
    assert_eq!(outcome.reports[0].last_page, 2);

    let out = temp.path().join("out");
    let summary = read_json(&out.join("characters-summary.json"));
    assert_eq!(summary["total_records"], 3);
    assert_eq!(summary["distinct_groups"], 2);
    assert_eq!(summary["group_names"], serde_json::json!(["a", "b"]));

    let group_a = read_json(&out.join("characters-by-category-a.json"));
    assert_eq!(group_a.as_array().map(Vec::len), Some(2));
    let group_b = read_json(&out.join("characters-by-category-b.json"));
    assert_eq!(group_b[0]["id"], "3");
    assert_eq!(group_b[0]["_provenance"]["page"], 2);
}

#[tokio::test]
async fn test_page_ceiling_stops_pagination() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    for page in 1..=2 {
        Mock::given(method("GET"))
            .and(path(format!("/list/{}", page)))
            .respond_with(html(&format!(
                r#"<li class="item" data-id="{page}"><span class="cat">x</span></li>
                   <a class="next" href="/list/{next}">More</a>"#,
                page = page,
                next = page + 1
            )))
            .expect(1)
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/list/3"))
        .respond_with(html(""))
        .expect(0)
        .mount(&server)
        .await;

    let jobs = GROUPED_JOB
        .replace("max-pages = 5", "max-pages = 2")
        .replace("item-scope", "next-css = [\"a.next\"]\nitem-scope");
    let config = create_test_config(&server.uri(), temp.path(), "", "", &jobs);
    let outcome = crawl(config).await;

    assert_eq!(outcome.reports[0].pages, 2);
    assert_eq!(outcome.outputs[0].records.len(), 2);
}

#[tokio::test]
async fn test_next_link_to_self_stops_pagination() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/list/1"))
        .respond_with(html(
            r#"<li class="item" data-id="1"><span class="cat">a</span></li>
               <a rel="next" href="/list/1/#top">Next</a>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), temp.path(), "", "", GROUPED_JOB);
    let outcome = crawl(config).await;

    assert_eq!(outcome.reports[0].pages, 1);
    assert_eq!(outcome.reports[0].requests_issued, 1);
}

#[tokio::test]
async fn test_cursor_written_as_query_parameter() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/characters"))
        .and(query_param("cursor", "start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "id": "1", "name": "Alpha" }],
            "next": "abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/characters"))
        .and(query_param("cursor", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "id": "2", "name": "Beta", "species": "fox" }],
            "next": ""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let jobs = API_JOB
        .replace("/api/characters\"]", "/api/characters?cursor=start\"]")
        .replace("next-path = \"next\"", "next-path = \"next\"\nnext-param = \"cursor\"");
    let config = create_test_config(&server.uri(), temp.path(), "", "", &jobs);
    let outcome = crawl(config).await;

    assert_eq!(outcome.reports[0].pages, 2);
    let records = &outcome.outputs[0].records;
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].get("species"), "fox");
    assert_eq!(records[1].provenance().page, 2);
}

#[tokio::test]
async fn test_record_cap_truncates_and_stops() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/characters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "id": "1" }, { "id": "2" }, { "id": "3" }],
            "next": "/api/characters/2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let jobs = API_JOB.replace("max-pages = 5", "max-pages = 5\nmax-records = 2");
    let config = create_test_config(&server.uri(), temp.path(), "", "", &jobs);
    let outcome = crawl(config).await;

    assert_eq!(outcome.reports[0].records, 2);
    assert_eq!(outcome.outputs[0].records.len(), 2);
}

#[tokio::test]
async fn test_transport_failure_keeps_earlier_pages() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/list/1"))
        .respond_with(html(
            r#"<li class="item" data-id="1"><span class="cat">a</span></li>
               <a rel="next" href="/list/2">Next</a>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/list/2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), temp.path(), "", "", GROUPED_JOB);
    let outcome = crawl(config).await;

    let report = &outcome.reports[0];
    assert_eq!(report.pages, 1);
    assert_eq!(report.outcome_count(PageOutcome::TransportFailed), 1);
    assert_eq!(outcome.outputs[0].records.len(), 1);
    assert!(temp.path().join("out/characters.json").exists());
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/characters"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/characters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "id": "1", "name": "Alpha" }]
        })))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), temp.path(), "max-retries = 1", "", API_JOB);
    let outcome = crawl(config).await;

    let report = &outcome.reports[0];
    assert_eq!(report.outcome_count(PageOutcome::Extracted), 1);
    assert_eq!(report.outcome_count(PageOutcome::TransportFailed), 0);
    assert_eq!(outcome.outputs[0].records.len(), 1);
}

#[tokio::test]
async fn test_malformed_payload_yields_no_records() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/characters"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{ not json", "application/json"))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), temp.path(), "", "", API_JOB);
    let outcome = crawl(config).await;

    let report = &outcome.reports[0];
    assert_eq!(report.outcome_count(PageOutcome::Malformed), 1);
    assert_eq!(report.pages, 0);
    assert!(outcome.outputs[0].records.is_empty());
}

#[tokio::test]
async fn test_two_jobs_feed_one_dataset() {
    let listing = MockServer::start().await;
    let api = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/list/1"))
        .respond_with(html(
            r#"<li class="item" data-id="1"><span class="cat">a</span></li>"#,
        ))
        .mount(&listing)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/characters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "id": "1", "name": "Alpha" }, { "id": "2", "name": "Beta" }]
        })))
        .mount(&api)
        .await;

    let jobs = format!(
        "{}\n{}",
        GROUPED_JOB.replace("{base}", &listing.uri()),
        API_JOB
            .replace("[[dataset]]\nname = \"characters\"\n", "")
            .replace("{base}", &api.uri())
    );
    let config = create_test_config("", temp.path(), "", "", &jobs);
    let outcome = crawl(config).await;

    assert_eq!(outcome.reports.len(), 2);
    let output = &outcome.outputs[0];
    assert_eq!(output.records.len(), 2);

    let merged = output
        .records
        .iter()
        .find(|r| r.entity_key() == "1")
        .expect("entity 1 should be present");
    assert_eq!(merged.get("category"), "a");
    assert_eq!(merged.get("name"), "Alpha");
}

#[tokio::test]
async fn test_store_backs_export() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("gleaner.db");

    Mock::given(method("GET"))
        .and(path("/api/characters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "id": "1", "name": "Alpha" }, { "id": "2", "name": "Beta" }]
        })))
        .mount(&server)
        .await;

    let output = format!("database-path = \"{}\"", db_path.display());
    let config = create_test_config(&server.uri(), temp.path(), "", &output, API_JOB);
    let outcome = crawl(config.clone()).await;
    assert!(outcome.run_id.is_some());

    let full = temp.path().join("out/characters.json");
    let crawled = std::fs::read_to_string(&full).unwrap();
    std::fs::remove_dir_all(temp.path().join("out")).unwrap();

    let exported = export_from_store(&config).expect("export should succeed");
    assert_eq!(exported.outputs[0].records.len(), 2);
    assert_eq!(std::fs::read_to_string(&full).unwrap(), crawled);

    let store = SqliteStore::new(&db_path).unwrap();
    let run = store.get_latest_run().unwrap().expect("run should be recorded");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
}

#[tokio::test]
async fn test_cancelled_run_is_interrupted() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("gleaner.db");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let output = format!("database-path = \"{}\"", db_path.display());
    let config = create_test_config(&server.uri(), temp.path(), "", &output, API_JOB);
    let outcome = run_crawl(
        config,
        "test-hash",
        CrawlOptions::default(),
        Arc::new(AtomicBool::new(true)),
    )
    .await
    .expect("cancelled crawl still finalizes");

    assert!(outcome.reports[0].cancelled);
    assert!(temp.path().join("out/characters-summary.json").exists());

    let store = SqliteStore::new(&db_path).unwrap();
    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
}
