use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{
    multipart::{MultipartForm, Part},
    TestServer,
};
use serde_json::{json, Value};
use tempfile::TempDir;

use encore_api::{
    config::{Config, StorageKind},
    routes::{create_router, AppState},
};

struct TestApp {
    server: TestServer,
    static_dir: TempDir,
}

fn create_test_app() -> TestApp {
    let static_dir = tempfile::tempdir().unwrap();
    let config = Config {
        storage: StorageKind::Memory,
        static_dir: static_dir.path().to_path_buf(),
        display_utc_offset_hours: 0,
        ..Config::default()
    };

    let app = create_router(AppState::in_memory(&config));
    TestApp {
        server: TestServer::new(app).unwrap(),
        static_dir,
    }
}

async fn create_song(server: &TestServer, title: &str, artist: &str, genre: &str) -> i64 {
    let response = server
        .post("/music/create")
        .json(&json!({ "title": title, "artist_name": artist, "genre": genre }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["data"]["id"].as_i64().unwrap()
}

/// Registers an account and returns its user id
async fn register_and_login(server: &TestServer, login_id: &str, username: &str) -> String {
    server
        .post("/auth/register")
        .json(&json!({ "login_id": login_id, "username": username, "password": "secret1" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .post("/auth/login")
        .json(&json!({ "login_id": login_id, "password": "secret1" }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["user"]["userid"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn rate(server: &TestServer, userid: &str, music_id: i64, value: i64) {
    server
        .post(&format!("/music/{}/ratings", music_id))
        .json(&json!({ "userid": userid, "rating_value": value }))
        .await
        .assert_status_ok();
}

async fn play(server: &TestServer, userid: &str, music_id: i64) {
    server
        .post(&format!("/music/{}/play", music_id))
        .json(&json!({ "userid": userid }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = create_test_app();

    let response = app
        .server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("trace-abc"),
        )
        .await;
    assert_eq!(response.header("x-request-id"), "trace-abc");

    let response = app.server.get("/health").await;
    assert!(!response.header("x-request-id").is_empty());
}

#[tokio::test]
async fn test_register_and_login() {
    let app = create_test_app();
    let userid = register_and_login(&app.server, "alice01", "Alice").await;
    assert!(!userid.is_empty());

    // Same login id again
    let response = app
        .server
        .post("/auth/register")
        .json(&json!({ "login_id": "alice01", "username": "Other", "password": "secret1" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["success"], false);

    let response = app
        .server
        .post("/auth/register")
        .json(&json!({ "login_id": "bad id!", "username": "Bob", "password": "secret1" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post("/auth/register")
        .json(&json!({ "login_id": "bob", "username": "", "password": "secret1" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post("/auth/login")
        .json(&json!({ "login_id": "alice01", "password": "wrong-pass" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .post("/auth/login")
        .json(&json!({ "login_id": "nobody", "password": "secret1" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = app
        .server
        .post("/auth/login")
        .json(&json!({ "login_id": "alice01" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_non_latin_login_id() {
    let app = create_test_app();
    let userid = register_and_login(&app.server, "张三", "Zhang").await;
    assert!(!userid.is_empty());

    app.server
        .post("/auth/register")
        .json(&json!({ "login_id": "张 三", "username": "Zhang", "password": "secret1" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_change_username_and_password() {
    let app = create_test_app();
    let userid = register_and_login(&app.server, "carol", "Carol").await;

    let response = app
        .server
        .post("/auth/change-username")
        .json(&json!({ "userid": userid, "new_username": "  Caroline  " }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["user"]["username"], "Caroline");

    let response = app
        .server
        .post("/auth/change-username")
        .json(&json!({ "userid": userid, "new_username": "   " }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post("/auth/change-password")
        .json(&json!({ "userid": userid, "old_password": "secret1", "new_password": "abc" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post("/auth/change-password")
        .json(&json!({ "userid": userid, "old_password": "nope-nope", "new_password": "better-secret" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    app.server
        .post("/auth/change-password")
        .json(&json!({ "userid": userid, "old_password": "secret1", "new_password": "better-secret" }))
        .await
        .assert_status_ok();

    app.server
        .post("/auth/login")
        .json(&json!({ "login_id": "carol", "password": "better-secret" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_song_catalog_crud() {
    let app = create_test_app();
    let response = app
        .server
        .post("/music/create")
        .json(&json!({ "title": "Teardrop", "artist_name": "Massive Attack", "genre": "Trip-hop" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    assert_eq!(created["data"]["play_count"], 0);
    assert_eq!(created["data"]["genre"], "Trip-hop");
    let id = created["data"]["id"].as_i64().unwrap();

    let response = app.server.get("/music/list").await;
    response.assert_status_ok();
    let list: Value = response.json();
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
    assert_eq!(list["data"][0]["cover_url"], "/static/music_img/default_cover.jpg");
    assert!(list["data"][0].get("play_count").is_none());

    let response = app.server.get(&format!("/music/{}", id)).await;
    response.assert_status_ok();
    let detail: Value = response.json();
    assert_eq!(detail["data"]["title"], "Teardrop");
    assert_eq!(detail["data"]["play_count"], 0);

    let response = app
        .server
        .put(&format!("/music/{}", id))
        .json(&json!({ "genre": "Electronic" }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["data"]["genre"], "Electronic");
    assert_eq!(updated["data"]["title"], "Teardrop");

    app.server
        .get("/music/999999")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.server
        .post("/music/create")
        .json(&json!({ "title": "No Artist" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cover_upload_is_promoted_on_update() {
    let app = create_test_app();
    let id = create_song(&app.server, "Joga", "Bjork", "Art pop").await;

    let form = MultipartForm::new()
        .add_text("artist_name", "Bjork")
        .add_text("title", "Joga")
        .add_part(
            "file",
            Part::bytes(b"fake-jpeg".to_vec())
                .file_name("cover.jpg")
                .mime_type("image/jpeg"),
        );
    let response = app.server.post("/music/upload-cover").multipart(form).await;
    response.assert_status_ok();
    let upload: Value = response.json();
    assert_eq!(upload["filename"], "Bjork-Joga.jpg");
    assert_eq!(upload["url"], "/static/music_img/temp/Bjork-Joga.jpg");

    let response = app
        .server
        .put(&format!("/music/{}", id))
        .json(&json!({ "cover_url": upload["url"] }))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["data"]["cover_url"],
        "/static/music_img/Bjork-Joga.jpg"
    );

    assert!(app.static_dir.path().join("music_img/Bjork-Joga.jpg").exists());
    assert!(!app
        .static_dir
        .path()
        .join("music_img/temp/Bjork-Joga.jpg")
        .exists());

    let response = app.server.get("/static/music_img/Bjork-Joga.jpg").await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"fake-jpeg");
}

#[tokio::test]
async fn test_audio_upload_requires_file() {
    let app = create_test_app();

    let form = MultipartForm::new()
        .add_text("artist_name", "Low")
        .add_text("title", "Words");
    app.server
        .post("/music/upload")
        .multipart(form)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let form = MultipartForm::new()
        .add_text("artist_name", "Low")
        .add_text("title", "Words")
        .add_part("file", Part::bytes(b"id3".to_vec()).file_name("words.mp3"));
    let response = app.server.post("/music/upload").multipart(form).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["file_path"], "/static/music/Low-Words.mp3");
    assert!(app.static_dir.path().join("music/Low-Words.mp3").exists());
}

#[tokio::test]
async fn test_comments_show_author() {
    let app = create_test_app();
    let userid = register_and_login(&app.server, "dave", "Dave").await;
    let id = create_song(&app.server, "Roads", "Portishead", "Trip-hop").await;

    let response = app
        .server
        .post(&format!("/music/{}/comments", id))
        .json(&json!({ "userid": userid, "comment_text": "Haunting" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(response.json::<Value>()["data"]["username"], "Dave");

    app.server
        .post(&format!("/music/{}/comments", id))
        .json(&json!({ "userid": "ghost", "comment_text": "Who am I" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = app.server.get(&format!("/music/{}/comments", id)).await;
    response.assert_status_ok();
    let comments: Value = response.json();
    let comments = comments["data"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert!(comments.iter().any(|c| c["username"] == "Unknown user"));
    assert!(comments.iter().any(|c| c["username"] == "Dave"));

    app.server
        .post("/music/999999/comments")
        .json(&json!({ "userid": userid, "comment_text": "Nothing here" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ratings_upsert_and_validate() {
    let app = create_test_app();
    let id = create_song(&app.server, "Glory Box", "Portishead", "Trip-hop").await;

    let response = app.server.get(&format!("/music/{}/ratings", id)).await;
    let summary: Value = response.json();
    assert_eq!(summary["data"]["average_rating"], 0.0);
    assert_eq!(summary["data"]["rating_count"], 0);

    for bad in [json!(6), json!(0), json!(4.5), json!("5"), json!(null)] {
        app.server
            .post(&format!("/music/{}/ratings", id))
            .json(&json!({ "userid": "u1", "rating_value": bad }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    rate(&app.server, "u1", id, 2).await;
    rate(&app.server, "u2", id, 4).await;

    // Re-rating replaces the previous value
    let response = app
        .server
        .post(&format!("/music/{}/ratings", id))
        .json(&json!({ "userid": "u1", "rating_value": 5 }))
        .await;
    response.assert_status_ok();
    let summary: Value = response.json();
    assert_eq!(summary["data"]["new_count"], 2);
    assert_eq!(summary["data"]["new_average"], 4.5);
}

#[tokio::test]
async fn test_play_counts_and_history() {
    let app = create_test_app();
    let id = create_song(&app.server, "Unfinished Sympathy", "Massive Attack", "Trip-hop").await;

    let response = app
        .server
        .post(&format!("/music/{}/play", id))
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    app.server
        .post("/music/999999/play")
        .json(&json!({ "userid": "u1" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    play(&app.server, "u1", id).await;
    let response = app
        .server
        .post(&format!("/music/{}/play", id))
        .json(&json!({ "userid": "u1" }))
        .await;
    assert_eq!(response.json::<Value>()["data"]["play_count"], 2);

    let response = app.server.get("/music/play-history/u1").await;
    response.assert_status_ok();
    let history: Value = response.json();
    let history = history["data"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["id"], id);
    assert_eq!(history[0]["artist_name"], "Massive Attack");
    assert_eq!(history[0]["played_at"].as_str().unwrap().len(), 19);
}

#[tokio::test]
async fn test_playlist_lifecycle() {
    let app = create_test_app();
    let song = create_song(&app.server, "Angel", "Massive Attack", "Trip-hop").await;

    let response = app
        .server
        .post("/playlist/")
        .json(&json!({ "userid": "u1", "title": "Late night" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    let playlist = created["data"]["id"].as_i64().unwrap();
    assert_eq!(created["data"]["description"], "");

    app.server
        .post("/playlist")
        .json(&json!({ "userid": "u1" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let songs_url = format!("/playlist/{}/songs", playlist);
    app.server
        .post(&songs_url)
        .json(&json!({ "music_id": song }))
        .await
        .assert_status_ok();
    app.server
        .post(&songs_url)
        .json(&json!({ "music_id": song }))
        .await
        .assert_status(StatusCode::CONFLICT);
    app.server
        .post(&songs_url)
        .json(&json!({ "music_id": 999999 }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let response = app.server.get(&format!("/playlist/{}", playlist)).await;
    response.assert_status_ok();
    let detail: Value = response.json();
    assert_eq!(detail["data"]["title"], "Late night");
    assert_eq!(detail["data"]["songs"][0]["title"], "Angel");

    let response = app.server.get("/playlist/user/u1").await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 1);

    app.server
        .delete(&format!("/playlist/{}/songs/{}", playlist, song))
        .await
        .assert_status_ok();
    // Removing again is a no-op
    app.server
        .delete(&format!("/playlist/{}/songs/{}", playlist, song))
        .await
        .assert_status_ok();

    app.server
        .delete(&format!("/playlist/{}", playlist))
        .await
        .assert_status_ok();
    app.server
        .delete(&format!("/playlist/{}", playlist))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get(&format!("/playlist/{}", playlist))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_preferences_round_trip() {
    let app = create_test_app();
    let userid = register_and_login(&app.server, "erin", "Erin").await;

    let response = app
        .server
        .get("/preferences/preferences")
        .add_query_param("userid", &userid)
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["preferences"]["favorite_genres"],
        json!([])
    );

    let response = app
        .server
        .post("/preferences/preferences")
        .json(&json!({
            "userid": userid,
            "favorite_genres": [" Jazz ", "", "Rock"],
            "favorite_artists": ["Miles Davis"],
        }))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["data"]["favorite_genres"],
        json!(["Jazz", "Rock"])
    );

    let response = app
        .server
        .get("/preferences/preferences")
        .add_query_param("userid", &userid)
        .await;
    let prefs: Value = response.json();
    assert_eq!(prefs["preferences"]["favorite_artists"], json!(["Miles Davis"]));
    assert_eq!(prefs["preferences"]["listening_times"], json!([]));

    app.server
        .post("/preferences/preferences")
        .json(&json!({ "userid": userid, "favorite_genres": "Jazz,Rock" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.server
        .post("/preferences/preferences")
        .json(&json!({ "userid": "nobody", "favorite_genres": [] }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get("/preferences/preferences")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_listening_stats() {
    let app = create_test_app();
    let jazz = create_song(&app.server, "So What", "Miles Davis", "Jazz").await;
    let rock = create_song(&app.server, "Paranoid", "Black Sabbath", "Rock").await;

    play(&app.server, "u1", jazz).await;
    play(&app.server, "u1", jazz).await;
    play(&app.server, "u1", rock).await;
    play(&app.server, "u2", rock).await;

    let response = app
        .server
        .get("/user_stats/stats/music")
        .add_query_param("userid", "u1")
        .await;
    response.assert_status_ok();
    let stats: Value = response.json();
    assert_eq!(stats["stats"]["total_plays"], 3);
    assert_eq!(stats["stats"]["genre_stats"][0]["genre"], "Jazz");
    assert_eq!(stats["stats"]["genre_stats"][0]["count"], 2);
    assert_eq!(stats["stats"]["artist_stats"][1]["artist"], "Black Sabbath");

    let response = app
        .server
        .get("/user_stats/stats/recent")
        .add_query_param("userid", "u1")
        .await;
    let recent: Value = response.json();
    assert_eq!(recent["recent_plays"].as_array().unwrap().len(), 3);

    app.server
        .get("/user_stats/stats/music")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rankings_by_play_events() {
    let app = create_test_app();
    let hit = create_song(&app.server, "Karma Police", "Radiohead", "Rock").await;
    let other = create_song(&app.server, "Creep", "Radiohead", "Rock").await;
    let deep_cut = create_song(&app.server, "Halo", "Depeche Mode", "Synth").await;
    create_song(&app.server, "Never Played", "Nobody", "None").await;

    for user in ["u1", "u2", "u3"] {
        play(&app.server, user, hit).await;
    }
    play(&app.server, "u1", other).await;
    play(&app.server, "u1", deep_cut).await;

    let response = app.server.get("/rankings").await;
    response.assert_status_ok();
    let rankings: Value = response.json();

    assert_eq!(rankings["rankings"]["artists"][0]["name"], "Radiohead");
    assert_eq!(rankings["rankings"]["artists"][0]["popularity"], 4);
    let hot = rankings["rankings"]["hotSongs"].as_array().unwrap();
    assert_eq!(hot.len(), 3);
    assert_eq!(hot[0]["id"], hit);
    assert_eq!(hot[0]["popularity"], 3);
}

#[tokio::test]
async fn test_search_matches_title_or_artist() {
    let app = create_test_app();
    create_song(&app.server, "One More Time", "Daft Punk", "House").await;
    create_song(&app.server, "Punk Rock 100%", "Someone", "Punk").await;
    create_song(&app.server, "Windowlicker", "Aphex Twin", "IDM").await;

    let response = app.server.get("/search").add_query_param("query", "PUNK").await;
    response.assert_status_ok();
    let results: Value = response.json();
    let results = results["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].get("artist").is_some());
    assert!(results[0].get("cover").is_some());

    // Wildcards are literal
    let response = app.server.get("/search").add_query_param("query", "100%").await;
    assert_eq!(response.json::<Value>()["results"].as_array().unwrap().len(), 1);
    let response = app.server.get("/search").add_query_param("query", "_").await;
    assert_eq!(response.json::<Value>()["results"].as_array().unwrap().len(), 0);

    // Surrounding whitespace is part of the query
    let response = app.server.get("/search").add_query_param("query", " punk").await;
    let results: Value = response.json();
    let results = results["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["title"], "One More Time");

    app.server
        .get("/search")
        .add_query_param("query", "  ")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommendations_prefer_similar_users() {
    let app = create_test_app();
    let a = create_song(&app.server, "A", "Artist A", "Pop").await;
    let b = create_song(&app.server, "B", "Artist B", "Pop").await;
    let c = create_song(&app.server, "C", "Artist C", "Pop").await;
    let d = create_song(&app.server, "D", "Artist D", "Pop").await;

    rate(&app.server, "target", a, 5).await;
    rate(&app.server, "target", b, 4).await;
    rate(&app.server, "neighbour", a, 5).await;
    rate(&app.server, "neighbour", b, 4).await;
    rate(&app.server, "neighbour", c, 5).await;

    let response = app
        .server
        .get("/recommendations")
        .add_query_param("userid", "target")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let songs = body["recommendations"]["collaborative"].as_array().unwrap();

    assert_eq!(songs[0]["id"], c);
    assert_eq!(songs[0]["title"], "C");
    // Backfilled with the rest of the catalog, no duplicates
    let ids: Vec<i64> = songs.iter().map(|s| s["id"].as_i64().unwrap()).collect();
    assert_eq!(ids.len(), 4);
    assert!(ids.contains(&d));
}

#[tokio::test]
async fn test_recommendations_fall_back_to_popularity() {
    let app = create_test_app();
    let quiet = create_song(&app.server, "Quiet", "Artist", "Ambient").await;
    let loud = create_song(&app.server, "Loud", "Artist", "Metal").await;

    play(&app.server, "someone", loud).await;
    play(&app.server, "someone", loud).await;

    let response = app
        .server
        .get("/recommendations")
        .add_query_param("userid", "newcomer")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let ids: Vec<i64> = body["recommendations"]["collaborative"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![loud, quiet]);

    app.server
        .get("/recommendations")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

fn assert_error_envelope(response: &axum_test::TestResponse) {
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(!body["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_requests_use_error_envelope() {
    let app = create_test_app();
    let id = create_song(&app.server, "Roads", "Portishead", "Trip-hop").await;

    // Field of the wrong type
    let response = app
        .server
        .post(&format!("/music/{}/play", id))
        .json(&json!({ "userid": 42 }))
        .await;
    assert_error_envelope(&response);

    // Body that is not JSON at all
    let response = app.server.post("/auth/login").text("login_id=alice").await;
    assert_error_envelope(&response);

    let response = app.server.post("/music/create").await;
    assert_error_envelope(&response);

    let response = app
        .server
        .post("/auth/register")
        .bytes("{\"login_id\":".into())
        .content_type("application/json")
        .await;
    assert_error_envelope(&response);

    // Path segment that is not an id
    let response = app.server.get("/music/abc").await;
    assert_error_envelope(&response);

    let response = app.server.delete("/playlist/1/songs/xyz").await;
    assert_error_envelope(&response);

    // Upload without a multipart body
    let response = app
        .server
        .post("/music/upload")
        .json(&json!({ "title": "Roads" }))
        .await;
    assert_error_envelope(&response);
}
