//! Whole-application runs against mock HTTP services
//!
//! One mock server stands in for the events API, the chat-completions API
//! and both Spotify services.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use tipdj::event_pipeline::StopSignal;
use tipdj::{App, AppError, ConfigError, Settings};

fn settings_toml(server: &ServerGuard, state_dir: &Path, archive: bool) -> String {
    format!(
        r#"
        [events_api]
        url = "{url}/events/streamer/token/"
        requests_per_minute = 6000
        request_timeout_secs = 5

        [general]
        tip_multiple = 27

        [openai]
        api_key = "sk-test"
        base_url = "{url}"

        [spotify]
        client_id = "client"
        client_secret = "secret"
        refresh_token = "refresh"
        api_url = "{url}"
        accounts_url = "{url}"

        [deferred]
        database_path = "{dir}/deferred.db"

        [archive]
        enabled = {archive}
        path = "{dir}/events.jsonl"

        [cursor]
        path = "{dir}/cursor"
        "#,
        url = server.url(),
        dir = state_dir.display(),
        archive = archive,
    )
}

fn events_page(server: &mut ServerGuard, path: &str, events: serde_json::Value, next: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "events": events,
                "nextUrl": format!("{}{}", server.url(), next)
            })
            .to_string(),
        )
        .create()
}

fn spotify_mocks(server: &mut ServerGuard, active: bool) -> Mock {
    server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_body(r#"{"access_token":"tok","expires_in":3600}"#)
        .create();
    server
        .mock("GET", "/v1/search")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"tracks":{"items":[{"uri":"spotify:track:4u7EnebtmKWzUH433cf5Qv",
                "name":"Bohemian Rhapsody","artists":[{"name":"Queen"}]}]}}"#,
        )
        .create();
    server
        .mock("GET", "/v1/me/player/devices")
        .with_status(200)
        .with_body(
            json!({"devices": [{"id": "dev-1", "name": "Studio", "is_active": active}]}).to_string(),
        )
        .create();
    server
        .mock("POST", "/v1/me/player/queue")
        .match_query(Matcher::Any)
        .with_status(204)
        .expect(2)
        .create()
}

fn completion_mock(server: &mut ServerGuard, content: &str) -> Mock {
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(
            json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string(),
        )
        .create()
}

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "Timed out waiting for condition");
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_song_tip_is_queued_on_spotify() {
    let mut server = Server::new();
    let dir = tempfile::tempdir().unwrap();

    events_page(
        &mut server,
        "/events/streamer/token/",
        json!([
            {"method": "follow", "id": "1", "object": {"user": {"username": "viewer_two"}}},
            {"method": "tip", "id": "2", "object": {
                "tip": {"tokens": 54, "message": "play Bohemian Rhapsody by Queen", "isAnon": false},
                "user": {"username": "viewer_one"}
            }}
        ]),
        "/events/page2",
    );
    events_page(&mut server, "/events/page2", json!([]), "/events/page2");
    completion_mock(&mut server, "Queen--Bohemian Rhapsody|Queen--Under Pressure");
    let queue_mock = spotify_mocks(&mut server, true);

    let settings = Settings::from_toml_str(&settings_toml(&server, dir.path(), true)).unwrap();
    let app = App::from_settings(settings).unwrap();

    let stop = StopSignal::new();
    let runner = {
        let stop = stop.clone();
        thread::spawn(move || app.run(stop))
    };

    wait_for(|| queue_mock.matched());
    stop.stop();
    let summary = runner.join().unwrap().unwrap();

    queue_mock.assert();
    assert_eq!(summary.cursor.as_str(), format!("{}/events/page2", server.url()));
    assert_eq!(summary.events_handled, 2);
    assert_eq!(summary.poller.failures, 0);

    let saved = fs::read_to_string(dir.path().join("cursor")).unwrap();
    assert_eq!(saved.trim(), format!("{}/events/page2", server.url()));

    let archived = fs::read_to_string(dir.path().join("events.jsonl")).unwrap();
    assert_eq!(archived.lines().count(), 2);
}

#[test]
fn test_saved_cursor_takes_precedence() {
    let mut server = Server::new();
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("cursor"),
        format!("{}/events/page7", server.url()),
    )
    .unwrap();

    let first_page = server
        .mock("GET", "/events/streamer/token/")
        .expect(0)
        .create();
    let resumed = events_page(&mut server, "/events/page7", json!([]), "/events/page7");
    spotify_mocks(&mut server, true);

    let settings = Settings::from_toml_str(&settings_toml(&server, dir.path(), false)).unwrap();
    let app = App::from_settings(settings).unwrap();

    let stop = StopSignal::new();
    let runner = {
        let stop = stop.clone();
        thread::spawn(move || app.run(stop))
    };

    wait_for(|| resumed.matched());
    stop.stop();
    let summary = runner.join().unwrap().unwrap();

    first_page.assert();
    assert_eq!(summary.cursor.as_str(), format!("{}/events/page7", server.url()));
    assert!(!dir.path().join("events.jsonl").exists());
}

#[test]
fn test_stop_waits_for_page_in_hand_to_be_queued() {
    let mut server = Server::new();
    let dir = tempfile::tempdir().unwrap();

    let first = events_page(
        &mut server,
        "/events/streamer/token/",
        json!([
            {"method": "follow", "id": "1", "object": {}},
            {"method": "follow", "id": "2", "object": {}},
            {"method": "userEnter", "id": "3", "object": {}},
            {"method": "follow", "id": "4", "object": {}}
        ]),
        "/events/page2",
    );
    events_page(&mut server, "/events/page2", json!([]), "/events/page2");

    let contents = format!(
        "{}\n[queue]\ncapacity = 1\npush_timeout_ms = 20\n",
        settings_toml(&server, dir.path(), false)
    );
    let app = App::from_settings(Settings::from_toml_str(&contents).unwrap()).unwrap();

    let stop = StopSignal::new();
    let runner = {
        let stop = stop.clone();
        thread::spawn(move || app.run(stop))
    };

    wait_for(|| first.matched());
    stop.stop();
    let summary = runner.join().unwrap().unwrap();

    assert_eq!(summary.poller.events_queued, 4);
    assert_eq!(summary.events_handled + summary.events_left_queued as u64, 4);
    assert!(summary.cursor.as_str().ends_with("/events/page2"));
}

#[test]
fn test_missing_credentials_fail_before_start() {
    let server = Server::new();
    let dir = tempfile::tempdir().unwrap();
    let contents = settings_toml(&server, dir.path(), false).replace("sk-test", "");

    let settings = Settings::from_toml_str(&contents).unwrap();
    let err = App::from_settings(settings).err().unwrap();

    assert!(matches!(
        err,
        AppError::Config(ConfigError::Missing("openai.api_key"))
    ));
    assert!(!dir.path().join("deferred.db").exists());
}
