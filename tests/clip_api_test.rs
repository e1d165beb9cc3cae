//! Integration tests for clip creation, delivery, and expiry over HTTP.

#![cfg(unix)]

mod common;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use clipshare_av::WorkDir;
use clipshare_core::config::Config;
use clipshare_core::{ClipToken, Clock};
use clipshare_server::resolver::LibraryResolver;
use clipshare_server::sweeper::sweep_once;

use common::{patterned_bytes, TestHarness, FAIL_SCRIPT};

const SOURCE_LEN: usize = 300_000;

async fn create(addr: SocketAddr, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/clip"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

/// Create a clip from a fresh source file and return the parsed response.
async fn create_ok(h: &TestHarness, addr: SocketAddr, extra: Value) -> Value {
    let source = h.media_file(&format!("{}.mp4", ClipToken::generate()), SOURCE_LEN);
    let mut body = json!({
        "sourcePath": source,
        "startSeconds": 30,
        "endSeconds": 45,
    });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            body.insert(k.clone(), v.clone());
        }
    }
    let resp = create(addr, body).await;
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

fn token_of(created: &Value) -> ClipToken {
    created["token"].as_str().unwrap().parse().unwrap()
}

fn output_path(h: &TestHarness, token: &ClipToken) -> std::path::PathBuf {
    h.ctx.registry.lookup(token).unwrap().output_path
}

#[tokio::test]
async fn create_then_fetch_round_trip() {
    let (h, addr) = TestHarness::with_server().await;
    let created = create_ok(&h, addr, json!({})).await;

    let url = created["url"].as_str().unwrap();
    let token = token_of(&created);
    assert_eq!(url, format!("http://{addr}/clip/{token}"));
    assert_eq!(token.as_str().len(), 22);

    let expires_at: DateTime<Utc> = serde_json::from_value(created["expiresAt"].clone()).unwrap();
    assert_eq!(expires_at, h.clock.now() + Duration::hours(72));

    let resp = reqwest::get(url).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "video/mp4");
    assert_eq!(resp.headers()["accept-ranges"], "bytes");
    assert_eq!(
        resp.headers()["content-disposition"],
        format!("inline; filename=\"clip-{token}.mp4\"").as_str()
    );
    assert_eq!(resp.headers()["cache-control"], "private, max-age=259200");
    let body = resp.bytes().await.unwrap();
    assert_eq!(body.as_ref(), patterned_bytes(SOURCE_LEN).as_slice());

    // The artifact lives in the clip directory under the token.
    let path = output_path(&h, &token);
    assert_eq!(path.parent().unwrap(), h.work_dir.path());
    assert_eq!(h.ffmpeg_runs(), 1);
}

#[tokio::test]
async fn ffmpeg_receives_stream_copy_arguments() {
    let (h, addr) = TestHarness::with_server().await;
    let created = create_ok(&h, addr, json!({})).await;
    let token = token_of(&created);

    let log = std::fs::read_to_string(h.bin_dir.path().join("invocations.log")).unwrap();
    let line = log.lines().next().unwrap();
    assert!(line.starts_with("-hide_banner -nostdin -nostats -y -ss 30.000 -t 15.000 -i "));
    assert!(line.contains(" -map 0 -c copy -avoid_negative_ts make_zero "));
    assert!(line.ends_with(&format!("{token}.mp4")));
}

#[tokio::test]
async fn ranged_requests() {
    let (h, addr) = TestHarness::with_server().await;
    let created = create_ok(&h, addr, json!({})).await;
    let url = created["url"].as_str().unwrap();
    let expected = patterned_bytes(SOURCE_LEN);
    let client = reqwest::Client::new();

    let resp = client.get(url).header("Range", "bytes=1000-1999").send().await.unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(
        resp.headers()["content-range"],
        format!("bytes 1000-1999/{SOURCE_LEN}").as_str()
    );
    assert_eq!(resp.headers()["content-length"], "1000");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), &expected[1000..2000]);

    // Suffix range.
    let resp = client.get(url).header("Range", "bytes=-100").send().await.unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), &expected[SOURCE_LEN - 100..]);

    // A range covering the whole file matches the plain download.
    let resp = client.get(url).header("Range", "bytes=0-").send().await.unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), expected.as_slice());

    // Past the end.
    let resp = client
        .get(url)
        .header("Range", format!("bytes={SOURCE_LEN}-"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 416);
    assert_eq!(
        resp.headers()["content-range"],
        format!("bytes */{SOURCE_LEN}").as_str()
    );

    // Malformed and multi-range headers get the whole file.
    for range in ["bytes=abc", "bytes=0-1,5-6"] {
        let resp = client.get(url).header("Range", range).send().await.unwrap();
        assert_eq!(resp.status(), 200, "range {range}");
        assert_eq!(resp.bytes().await.unwrap().len(), SOURCE_LEN);
    }
}

#[tokio::test]
async fn head_and_info() {
    let (h, addr) = TestHarness::with_server().await;
    let created = create_ok(&h, addr, json!({"expireHoursOverride": 2})).await;
    let token = token_of(&created);
    let client = reqwest::Client::new();

    let resp = client
        .head(format!("http://{addr}/clip/{token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "video/mp4");
    assert_eq!(resp.headers()["cache-control"], "private, max-age=7200");

    let info: Value = client
        .get(format!("http://{addr}/clip/{token}/info"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["token"], token.as_str());
    assert_eq!(info["sizeBytes"], SOURCE_LEN as u64);
    let expires_at: DateTime<Utc> = serde_json::from_value(info["expiresAt"].clone()).unwrap();
    assert_eq!(expires_at, h.clock.now() + Duration::hours(2));
}

#[tokio::test]
async fn unknown_token_is_404() {
    let (_h, addr) = TestHarness::with_server().await;
    let token = ClipToken::generate();

    let resp = reqwest::get(format!("http://{addr}/clip/{token}")).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "not_found");

    let resp = reqwest::get(format!("http://{addr}/clip/!!bad!!")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn expired_clip_is_404_and_reclaimed_on_access() {
    let (h, addr) = TestHarness::with_server().await;
    let created = create_ok(&h, addr, json!({})).await;
    let url = created["url"].as_str().unwrap().to_string();
    let token = token_of(&created);
    let path = output_path(&h, &token);

    // Exactly at expiry the clip is still served.
    h.clock.advance(Duration::hours(72));
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 200);

    h.clock.advance(Duration::hours(1));
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 404);
    assert!(!path.exists());
    assert!(h.ctx.registry.lookup(&token).is_none());

    assert_eq!(reqwest::get(&url).await.unwrap().status(), 404);
}

#[tokio::test]
async fn sweep_after_73_hours_makes_clip_404() {
    let (h, addr) = TestHarness::with_server().await;
    let created = create_ok(&h, addr, json!({})).await;
    let url = created["url"].as_str().unwrap().to_string();
    let token = token_of(&created);
    let path = output_path(&h, &token);

    assert_eq!(reqwest::get(&url).await.unwrap().status(), 200);

    h.clock.advance(Duration::hours(73));
    let report = sweep_once(&h.ctx.registry, h.clock.now());
    assert_eq!(report.reclaimed, 1);
    assert!(!path.exists());

    assert_eq!(reqwest::get(&url).await.unwrap().status(), 404);
}

#[tokio::test]
async fn sweep_converges_to_unexpired_set() {
    let (h, addr) = TestHarness::with_server().await;

    let mut short = Vec::new();
    for _ in 0..4 {
        short.push(token_of(&create_ok(&h, addr, json!({"expireHoursOverride": 1})).await));
    }
    let mut long = Vec::new();
    for _ in 0..3 {
        // Zero falls back to the 72 hour default.
        long.push(token_of(&create_ok(&h, addr, json!({"expireHoursOverride": 0})).await));
    }
    assert_eq!(h.ctx.registry.len(), 7);
    assert_eq!(h.clip_files().len(), 7);

    h.clock.advance(Duration::hours(2));
    let report = sweep_once(&h.ctx.registry, h.clock.now());
    assert_eq!(report.scanned, 7);
    assert_eq!(report.reclaimed, 4);
    assert_eq!(report.failed, 0);

    assert_eq!(h.ctx.registry.len(), 3);
    assert_eq!(h.clip_files().len(), 3);
    for token in &short {
        assert!(h.ctx.registry.lookup(token).is_none());
    }
    for token in &long {
        let resp = reqwest::get(format!("http://{addr}/clip/{token}")).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    // A second pass changes nothing.
    let report = sweep_once(&h.ctx.registry, h.clock.now());
    assert_eq!(report.reclaimed, 0);
    assert_eq!(h.ctx.registry.len(), 3);
}

#[tokio::test]
async fn concurrent_creates_yield_distinct_clips() {
    let (h, addr) = TestHarness::with_server().await;
    const K: usize = 8;

    let sources: Vec<_> = (0..K)
        .map(|i| h.media_file(&format!("movie-{i}.mp4"), 1000 + i))
        .collect();

    let requests = sources.iter().map(|source| {
        create(
            addr,
            json!({"sourcePath": source, "startSeconds": 0, "endSeconds": 10}),
        )
    });
    let responses = futures::future::join_all(requests).await;

    let mut tokens = HashSet::new();
    for resp in responses {
        assert_eq!(resp.status(), 200);
        let created: Value = resp.json().await.unwrap();
        tokens.insert(created["token"].as_str().unwrap().to_string());
    }
    assert_eq!(tokens.len(), K);
    assert_eq!(h.ctx.registry.len(), K);

    // Every clip holds its own source's bytes.
    let mut lengths = HashSet::new();
    for token in &tokens {
        let body = reqwest::get(format!("http://{addr}/clip/{token}"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        lengths.insert(body.len());
    }
    let expected: HashSet<usize> = (0..K).map(|i| 1000 + i).collect();
    assert_eq!(lengths, expected);
}

#[tokio::test]
async fn invalid_input_is_400_without_spawning() {
    let (h, addr) = TestHarness::with_server().await;
    let source = h.media_file("movie.mp4", 100);

    let bad_bodies = [
        json!({"sourcePath": source, "startSeconds": 45, "endSeconds": 30}),
        json!({"sourcePath": source, "startSeconds": 10, "endSeconds": 10}),
        json!({"sourcePath": source, "startSeconds": -1, "endSeconds": 10}),
        json!({"sourcePath": source, "startSeconds": 0, "endSeconds": 0.0004}),
        json!({"sourcePath": "", "startSeconds": 0, "endSeconds": 10}),
        json!({"startSeconds": 0, "endSeconds": 10}),
        json!({"sourcePath": source, "endSeconds": 10}),
        json!({"sourcePath": source, "startSeconds": "zero", "endSeconds": 10}),
    ];
    for body in bad_bodies {
        let resp = create(addr, body.clone()).await;
        assert_eq!(resp.status(), 400, "body {body}");
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["code"], "invalid_input");
    }

    assert_eq!(h.ffmpeg_runs(), 0);
    assert!(h.ctx.registry.is_empty());
    assert!(h.clip_files().is_empty());
}

#[tokio::test]
async fn missing_source_is_404_without_spawning() {
    let (h, addr) = TestHarness::with_server().await;
    let missing = h.media_dir.path().join("gone.mp4");

    let resp = create(
        addr,
        json!({"sourcePath": missing, "startSeconds": 0, "endSeconds": 10}),
    )
    .await;
    assert_eq!(resp.status(), 404);
    assert_eq!(h.ffmpeg_runs(), 0);
}

#[tokio::test]
async fn unwritable_clip_dir_is_io_failure_without_spawning() {
    let mut h = TestHarness::new();
    // A directory cannot be created underneath a regular file.
    let blocker = h.media_file("not-a-dir", 1);
    h.ctx.work_dir = Arc::new(WorkDir::new(blocker.join("clips")));
    let addr = h.serve().await;
    let source = h.media_file("movie.mp4", 100);

    let resp = create(
        addr,
        json!({"sourcePath": source, "startSeconds": 0, "endSeconds": 10}),
    )
    .await;
    assert_eq!(resp.status(), 500);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["code"], "io_failure");

    assert_eq!(h.ffmpeg_runs(), 0);
    assert!(h.ctx.registry.is_empty());
}

#[tokio::test]
async fn oversized_token_setting_still_yields_reachable_clips() {
    let mut config = Config::default();
    config.clips.token_bytes = 100;
    let h = TestHarness::build(config, common::COPY_SCRIPT);
    let addr = h.serve().await;

    let created = create_ok(&h, addr, json!({})).await;
    let token = token_of(&created);
    assert_eq!(token.as_str().len(), 128);

    let resp = reqwest::get(created["url"].as_str().unwrap()).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().len(), SOURCE_LEN);
}

#[tokio::test]
async fn extraction_failure_is_500_with_diagnostics() {
    let h = TestHarness::build(Config::default(), FAIL_SCRIPT);
    let addr = h.serve().await;
    let source = h.media_file("broken.mp4", 100);

    let resp = create(
        addr,
        json!({"sourcePath": source, "startSeconds": 0, "endSeconds": 10}),
    )
    .await;
    assert_eq!(resp.status(), 500);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["code"], "extraction_failed");
    let message = err["error"].as_str().unwrap();
    assert!(message.contains("exit code 1"), "message: {message}");
    assert!(message.contains("Invalid data found when processing input"));

    assert_eq!(h.ffmpeg_runs(), 1);
    assert!(h.ctx.registry.is_empty());
    assert!(h.clip_files().is_empty());
}

#[tokio::test]
async fn clean_exit_without_output_is_500() {
    let h = TestHarness::build(Config::default(), "exit 0");
    let addr = h.serve().await;
    let source = h.media_file("movie.mp4", 100);

    let resp = create(
        addr,
        json!({"sourcePath": source, "startSeconds": 0, "endSeconds": 10}),
    )
    .await;
    assert_eq!(resp.status(), 500);
    assert!(h.ctx.registry.is_empty());
}

#[tokio::test]
async fn legacy_plugin_routes() {
    let (h, addr) = TestHarness::with_server().await;
    let source = h.media_file("movie.mp4", 5000);

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/ClipShare/Create"))
        .json(&json!({
            "mediaPath": source,
            "startSeconds": 12.5,
            "endSeconds": 20,
            "expireHours": 3,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let created: Value = resp.json().await.unwrap();
    let token = token_of(&created);
    let expires_at: DateTime<Utc> = serde_json::from_value(created["expiresAt"].clone()).unwrap();
    assert_eq!(expires_at, h.clock.now() + Duration::hours(3));

    let resp = reqwest::get(format!("http://{addr}/ClipShare/video/{token}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().len(), 5000);
}

#[tokio::test]
async fn item_id_resolves_through_library() {
    let mut h = TestHarness::new();
    let source = h.media_file("library-movie.mp4", 2048);
    let mut items = std::collections::HashMap::new();
    items.insert("f00dbabe".to_string(), source);
    h.ctx = h
        .ctx
        .clone()
        .with_resolver(Arc::new(LibraryResolver::new(items)));
    let addr = h.serve().await;

    let resp = create(
        addr,
        json!({"itemId": "f00dbabe", "startSeconds": 0, "endSeconds": 5}),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let resp = create(
        addr,
        json!({"itemId": "unknown", "startSeconds": 0, "endSeconds": 5}),
    )
    .await;
    assert_eq!(resp.status(), 404);
    assert_eq!(h.ffmpeg_runs(), 1);
}

#[tokio::test]
async fn public_base_url_shapes_links() {
    let mut config = Config::default();
    config.server.public_base_url = Some("https://media.example.com/".into());
    let h = TestHarness::build(config, common::COPY_SCRIPT);
    let addr = h.serve().await;

    let created = create_ok(&h, addr, json!({})).await;
    let token = token_of(&created);
    assert_eq!(
        created["url"],
        format!("https://media.example.com/clip/{token}").as_str()
    );
}

#[tokio::test]
async fn health_counts_clips() {
    let (h, addr) = TestHarness::with_server().await;
    create_ok(&h, addr, json!({})).await;

    let health: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["clips"], 1);
}

#[tokio::test]
async fn clip_deleted_out_of_band_is_404() {
    let (h, addr) = TestHarness::with_server().await;
    let created = create_ok(&h, addr, json!({})).await;
    let token = token_of(&created);
    std::fs::remove_file(output_path(&h, &token)).unwrap();

    let resp = reqwest::get(format!("http://{addr}/clip/{token}")).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert!(!Path::new(&output_path(&h, &token)).exists());
}
