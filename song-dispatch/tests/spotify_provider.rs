//! HTTP-level tests for the Spotify playback provider
//!
//! One mock server plays both the accounts service and the Web API.

use std::time::Duration;

use mockito::{Matcher, Mock, Server, ServerGuard};
use rstest::rstest;
use song_dispatch::{
    EnqueueResult, PlaybackError, PlaybackProvider, PlaybackTarget, SpotifyCredentials,
    SpotifyProvider, Track,
};

fn provider(server: &ServerGuard) -> SpotifyProvider {
    let credentials = SpotifyCredentials {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        refresh_token: "refresh".to_string(),
    };
    SpotifyProvider::new(credentials, Duration::from_secs(5))
        .expect("client should build")
        .with_base_urls(server.url(), server.url())
}

fn token_mock(server: &mut ServerGuard, hits: usize) -> Mock {
    server
        .mock("POST", "/api/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "refresh".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"access_token":"tok","token_type":"Bearer","expires_in":3600}"#)
        .expect(hits)
        .create()
}

fn track() -> Track {
    Track {
        uri: "spotify:track:4u7EnebtmKWzUH433cf5Qv".to_string(),
        name: "Bohemian Rhapsody".to_string(),
        artists: vec!["Queen".to_string()],
    }
}

fn target() -> PlaybackTarget {
    PlaybackTarget {
        device_id: "dev-1".to_string(),
        name: "Studio".to_string(),
    }
}

#[test]
fn test_search_returns_first_track() {
    let mut server = Server::new();
    let token = token_mock(&mut server, 1);
    let search = server
        .mock("GET", "/v1/search")
        .match_header("authorization", "Bearer tok")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "Queen - Bohemian Rhapsody".into()),
            Matcher::UrlEncoded("type".into(), "track".into()),
            Matcher::UrlEncoded("limit".into(), "1".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"tracks":{"items":[{"uri":"spotify:track:4u7EnebtmKWzUH433cf5Qv",
                "name":"Bohemian Rhapsody","artists":[{"name":"Queen"}]}]}}"#,
        )
        .expect(2)
        .create();

    let provider = provider(&server);
    let first = provider.search("Queen - Bohemian Rhapsody").unwrap();
    let second = provider.search("Queen - Bohemian Rhapsody").unwrap();

    token.assert();
    search.assert();
    assert_eq!(first, Some(track()));
    assert_eq!(second, Some(track()));
}

#[test]
fn test_search_without_match_is_none() {
    let mut server = Server::new();
    token_mock(&mut server, 1);
    server
        .mock("GET", "/v1/search")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"tracks":{"items":[]}}"#)
        .create();

    assert_eq!(provider(&server).search("zzzz").unwrap(), None);
}

#[test]
fn test_unauthorized_forces_token_refresh() {
    let mut server = Server::new();
    let token = token_mock(&mut server, 2);
    server
        .mock("GET", "/v1/search")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"error":{"status":401,"message":"The access token expired"}}"#)
        .expect(2)
        .create();

    let provider = provider(&server);
    let err = provider.search("Queen").unwrap_err();
    assert!(matches!(err, PlaybackError::Status { status: 401, .. }));
    assert!(provider.search("Queen").is_err());

    token.assert();
}

#[test]
fn test_token_failure_is_auth_error() {
    let mut server = Server::new();
    server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create();

    let err = provider(&server).search("Queen").unwrap_err();
    assert!(matches!(err, PlaybackError::Auth(_)));
}

#[test]
fn test_active_device_picks_active_one() {
    let mut server = Server::new();
    token_mock(&mut server, 1);
    server
        .mock("GET", "/v1/me/player/devices")
        .with_status(200)
        .with_body(
            r#"{"devices":[
                {"id":"dev-0","name":"Phone","is_active":false},
                {"id":"dev-1","name":"Studio","is_active":true}
            ]}"#,
        )
        .create();

    assert_eq!(provider(&server).active_device().unwrap(), Some(target()));
}

#[test]
fn test_no_active_device_is_none() {
    let mut server = Server::new();
    token_mock(&mut server, 1);
    server
        .mock("GET", "/v1/me/player/devices")
        .with_status(200)
        .with_body(r#"{"devices":[{"id":"dev-0","name":"Phone","is_active":false}]}"#)
        .create();

    assert_eq!(provider(&server).active_device().unwrap(), None);
}

#[test]
fn test_enqueue_success() {
    let mut server = Server::new();
    token_mock(&mut server, 1);
    let queue = server
        .mock("POST", "/v1/me/player/queue")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("uri".into(), track().uri),
            Matcher::UrlEncoded("device_id".into(), "dev-1".into()),
        ]))
        .with_status(204)
        .create();

    assert_eq!(provider(&server).enqueue(&track(), &target()), EnqueueResult::Queued);
    queue.assert();
}

#[test]
fn test_enqueue_transport_failure_is_unreachable() {
    let mut server = Server::new();
    token_mock(&mut server, 1);
    let credentials = SpotifyCredentials {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        refresh_token: "refresh".to_string(),
    };
    // Nothing listens on port 1, so the queue POST never connects
    let provider = SpotifyProvider::new(credentials, Duration::from_secs(5))
        .unwrap()
        .with_base_urls("http://127.0.0.1:1", server.url());

    let result = provider.enqueue(&track(), &target());

    assert!(
        matches!(result, EnqueueResult::Unreachable(_)),
        "unexpected {:?}",
        result
    );
}

#[rstest]
#[case(
    404,
    r#"{"error":{"status":404,"message":"Player command failed: No active device found","reason":"NO_ACTIVE_DEVICE"}}"#,
    EnqueueResult::NoActiveDevice
)]
#[case(
    403,
    r#"{"error":{"status":403,"message":"Player command failed: Premium required","reason":"PREMIUM_REQUIRED"}}"#,
    EnqueueResult::Rejected("HTTP 403: PREMIUM_REQUIRED".to_string())
)]
#[case(
    429,
    r#"{"error":{"status":429,"message":"API rate limit exceeded"}}"#,
    EnqueueResult::Rejected("HTTP 429: API rate limit exceeded".to_string())
)]
#[case(502, "Bad Gateway", EnqueueResult::Rejected("HTTP 502".to_string()))]
fn test_enqueue_failures(
    #[case] status: usize,
    #[case] body: &str,
    #[case] expected: EnqueueResult,
) {
    let mut server = Server::new();
    token_mock(&mut server, 1);
    server
        .mock("POST", "/v1/me/player/queue")
        .match_query(Matcher::Any)
        .with_status(status)
        .with_body(body)
        .create();

    assert_eq!(provider(&server).enqueue(&track(), &target()), expected);
}
