use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use chairspace_api::auth::{AppState, AppStateInner};
use chairspace_db::Database;
use chairspace_moderation::{Detections, ImageClassifier, RemoteClassifier};

const SECRET: &str = "test-secret";

fn app_with(detections: &[(&str, f32)]) -> Router {
    let detections: Detections = detections
        .iter()
        .map(|(label, confidence)| (label.to_string(), *confidence))
        .collect();
    app_with_classifier(ImageClassifier::Static(detections))
}

fn app_with_classifier(classifier: ImageClassifier) -> Router {
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: SECRET.into(),
        classifier,
    });
    chairspace_api::router(state)
}

fn app() -> Router {
    app_with(&[("chair", 0.93)])
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

struct Account {
    id: String,
    token: String,
}

async fn register(app: &Router, handle: &str) -> Account {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "email": format!("{handle}@chairs.example"),
            "name": "Chair Enthusiast",
            "handle": handle,
            "password": "hunter22",
            "confirm_password": "hunter22",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    Account {
        id: body["user_id"].as_str().unwrap().to_string(),
        token: body["token"].as_str().unwrap().to_string(),
    }
}

async fn create_post(app: &Router, account: &Account, title: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/posts",
        Some(&account.token),
        Some(json!({ "image_url": format!("https://img.example/{title}.jpg"), "title": title })),
    )
    .await
}

async fn post_id(app: &Router, account: &Account, title: &str) -> String {
    let (status, body) = create_post(app, account, title).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["post"]["id"].as_str().unwrap().to_string()
}

async fn vote(app: &Router, account: &Account, direction: &str, target: &str) -> (StatusCode, Value) {
    let uri = format!("/karma/{direction}-karma/{}/{target}", account.id);
    send(app, Method::GET, &uri, Some(&account.token), None).await
}

#[tokio::test]
async fn register_and_login() {
    let app = app();
    let alice = register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "alice@chairs.example", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], alice.id.as_str());
    assert_eq!(body["handle"], "alice");

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "alice@chairs.example", "password": "hunter23" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = app();
    register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "email": "alice@chairs.example",
            "name": "Someone Else",
            "handle": "other",
            "password": "hunter22",
            "confirm_password": "hunter22",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already exists");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = app();
    let (status, _) = send(&app, Method::GET, "/feed", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/feed", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn repeated_upvote_retracts_and_downvote_flips() {
    let app = app();
    let alice = register(&app, "alice").await;
    let post = post_id(&app, &alice, "armchair").await;

    let (status, body) = vote(&app, &alice, "upvote", &post).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["karma"]["score"], 1);
    assert_eq!(body["outcome"], "cast");
    assert_eq!(body["karma"]["target"]["type"], "post");
    assert_eq!(body["post_id"], post.as_str());

    let (_, body) = vote(&app, &alice, "upvote", &post).await;
    assert_eq!(body["karma"]["score"], 0);
    assert_eq!(body["outcome"], "retracted");

    let (_, body) = vote(&app, &alice, "upvote", &post).await;
    assert_eq!(body["karma"]["score"], 1);

    let (_, body) = vote(&app, &alice, "downvote", &post).await;
    assert_eq!(body["karma"]["score"], -1);
    assert_eq!(body["outcome"], "changed");

    let (_, detail) = send(&app, Method::GET, &format!("/post/{post}"), Some(&alice.token), None).await;
    assert_eq!(detail["post_karma"], -1);
}

#[tokio::test]
async fn comment_votes_resolve_their_post() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let post = post_id(&app, &alice, "stool").await;

    let (status, comment) = send(
        &app,
        Method::POST,
        &format!("/post/{post}/comments"),
        Some(&bob.token),
        Some(json!({ "text": "nice legs" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = comment["id"].as_str().unwrap().to_string();

    let (_, body) = vote(&app, &alice, "downvote", &comment_id).await;
    assert_eq!(body["karma"]["target"]["type"], "comment");
    assert_eq!(body["post_id"], post.as_str());

    let (_, detail) = send(&app, Method::GET, &format!("/post/{post}"), Some(&bob.token), None).await;
    assert_eq!(detail["post_karma"], 0);
    assert_eq!(detail["comments"][0]["karma"], -1);
    assert_eq!(detail["comments"][0]["text"], "nice legs");
}

#[tokio::test]
async fn cannot_vote_as_someone_else() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let post = post_id(&app, &alice, "recliner").await;

    let uri = format!("/karma/upvote-karma/{}/{post}", alice.id);
    let (status, _) = send(&app, Method::GET, &uri, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, detail) = send(&app, Method::GET, &format!("/post/{post}"), Some(&alice.token), None).await;
    assert_eq!(detail["post_karma"], 0);
}

#[tokio::test]
async fn most_karma_feed_puts_voted_posts_first() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let unvoted = post_id(&app, &alice, "plain").await;
    let liked = post_id(&app, &alice, "throne").await;
    let disliked = post_id(&app, &alice, "beanbag").await;

    vote(&app, &alice, "upvote", &liked).await;
    vote(&app, &bob, "downvote", &disliked).await;

    let (status, body) = send(&app, Method::GET, "/feed?sort=most_karma", Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sort"], "most_karma");
    assert_eq!(body["num_posts"], 3);
    assert_eq!(body["column_size"], 1);

    let order: Vec<&str> = body["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec![liked.as_str(), disliked.as_str(), unvoted.as_str()]);
}

#[tokio::test]
async fn table_post_deletes_the_account() {
    let app = app_with(&[("dining table", 0.88), ("chair", 0.91)]);
    let alice = register(&app, "alice").await;

    let (status, body) = create_post(&app, &alice, "dinner").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["banned"], "table");

    let (status, _) = send(&app, Method::GET, "/feed", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chairless_posts_cost_strikes() {
    let app = app_with(&[("dog", 0.97)]);
    let alice = register(&app, "alice").await;

    let (status, body) = create_post(&app, &alice, "dog-1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["post"]["contains_chair"], false);
    assert_eq!(body["strikes_left"], 2);

    let (_, body) = create_post(&app, &alice, "dog-2").await;
    assert_eq!(body["strikes_left"], 1);

    let (status, body) = create_post(&app, &alice, "dog-3").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["banned"], "strike");

    let (status, _) = send(&app, Method::GET, "/profile/alice", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn comments_must_match_their_post_and_author() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let first = post_id(&app, &alice, "first").await;
    let second = post_id(&app, &alice, "second").await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/post/{}/comments", uuid::Uuid::new_v4()),
        Some(&bob.token),
        Some(json!({ "text": "hello?" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, comment) = send(
        &app,
        Method::POST,
        &format!("/post/{first}/comments"),
        Some(&bob.token),
        Some(json!({ "text": "sturdy" })),
    )
    .await;
    let comment_id = comment["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/post/{second}/comments/{comment_id}"),
        Some(&bob.token),
        Some(json!({ "text": "moved" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/post/{first}/comments/{comment_id}"),
        Some(&alice.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/post/{first}/comments/{comment_id}"),
        Some(&bob.token),
        Some(json!({ "text": "very sturdy" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "very sturdy");
}

#[tokio::test]
async fn profile_lists_posts_and_takes_a_description() {
    let app = app();
    let alice = register(&app, "alice").await;
    post_id(&app, &alice, "one").await;
    post_id(&app, &alice, "two").await;

    let (status, user) = send(
        &app,
        Method::PUT,
        &format!("/users/{}/description", alice.id),
        Some(&alice.token),
        Some(json!({ "description": "  I sit.  " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["description"], "I sit.");

    let (status, profile) = send(&app, Method::GET, "/profile/alice", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["num_posts"], 2);
    assert_eq!(profile["column_size"], 1);
    assert_eq!(profile["posts"][0]["title"], "two");

    let (status, _) = send(&app, Method::GET, "/profile/nobody", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_signups_for_one_handle_conflict() {
    let app = app();
    for round in 0..10 {
        let handle = format!("twin{round}");
        let signup = |email: String| {
            let (app, handle) = (app.clone(), handle.clone());
            async move {
                let body = json!({
                    "email": email,
                    "name": "Chair Enthusiast",
                    "handle": handle,
                    "password": "hunter22",
                    "confirm_password": "hunter22",
                });
                send(&app, Method::POST, "/auth/register", None, Some(body)).await.0.as_u16()
            }
        };

        let (a, b) = tokio::join!(
            signup(format!("a{round}@chairs.example")),
            signup(format!("b{round}@chairs.example")),
        );
        let mut statuses = vec![a, b];
        statuses.sort_unstable();
        assert_eq!(statuses, vec![201, 409], "round {round}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_chairless_posts_cannot_pass_the_strike_limit() {
    let app = app_with(&[("dog", 0.97)]);
    let alice = register(&app, "alice").await;
    let (status, _) = create_post(&app, &alice, "dog-0").await;
    assert_eq!(status, StatusCode::CREATED);

    let (a, b, c) = tokio::join!(
        create_post(&app, &alice, "dog-1"),
        create_post(&app, &alice, "dog-2"),
        create_post(&app, &alice, "dog-3"),
    );
    let statuses = [a.0, b.0, c.0];

    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    assert!(created <= 1, "{statuses:?}");
    assert!(
        statuses
            .iter()
            .all(|s| [StatusCode::CREATED, StatusCode::FORBIDDEN, StatusCode::UNAUTHORIZED].contains(s)),
        "{statuses:?}"
    );

    let (status, _) = send(&app, Method::GET, "/feed", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn table_is_checked_before_the_title() {
    let app = app_with(&[("park bench", 0.8)]);
    let alice = register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/posts",
        Some(&alice.token),
        Some(json!({ "image_url": "https://img.example/bench.jpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["banned"], "table");
}

#[tokio::test]
async fn posts_need_a_title() {
    let app = app();
    let alice = register(&app, "alice").await;

    for body in [
        json!({ "image_url": "https://img.example/a.jpg" }),
        json!({ "image_url": "https://img.example/a.jpg", "title": "   " }),
    ] {
        let (status, body) = send(&app, Method::POST, "/posts", Some(&alice.token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Title is required");
    }

    let (_, feed) = send(&app, Method::GET, "/feed", Some(&alice.token), None).await;
    assert_eq!(feed["num_posts"], 0);
}

#[tokio::test]
async fn classifier_failure_writes_nothing() {
    let classifier =
        RemoteClassifier::new("http://127.0.0.1:1/detect", Duration::from_secs(5)).unwrap();
    let app = app_with_classifier(ImageClassifier::Remote(classifier));
    let alice = register(&app, "alice").await;

    let (status, body) = create_post(&app, &alice, "unseen").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Image classification failed");

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/users/{}/avatar", alice.id),
        Some(&alice.token),
        Some(json!({ "image_url": "https://img.example/me.jpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, feed) = send(&app, Method::GET, "/feed", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed["num_posts"], 0);

    let (_, profile) = send(&app, Method::GET, "/profile/alice", Some(&alice.token), None).await;
    assert_eq!(profile["user"]["pfp_url"], "/static/user.svg");
    assert_eq!(profile["user"]["strikes"], 0);
}

#[tokio::test]
async fn clean_avatar_is_stored_for_its_owner_only() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let uri = format!("/users/{}/avatar", alice.id);

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&bob.token),
        Some(json!({ "image_url": "https://img.example/bob.jpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["banned"].is_null());

    let (status, user) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&alice.token),
        Some(json!({ "image_url": "https://img.example/alice.jpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["pfp_url"], "https://img.example/alice.jpg");

    let (_, profile) = send(&app, Method::GET, "/profile/alice", Some(&bob.token), None).await;
    assert_eq!(profile["user"]["pfp_url"], "https://img.example/alice.jpg");
}

#[tokio::test]
async fn table_avatar_deletes_the_account() {
    let app = app_with(&[("coffee table", 0.75)]);
    let alice = register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/users/{}/avatar", alice.id),
        Some(&alice.token),
        Some(json!({ "image_url": "https://img.example/table.jpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["banned"], "table");

    let (status, _) = send(&app, Method::GET, "/profile/alice", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn posts_are_changed_by_their_author_only() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let post = post_id(&app, &alice, "wingback").await;
    let uri = format!("/post/{post}");
    let missing = format!("/post/{}", uuid::Uuid::new_v4());
    let retitle = json!({ "title": "renamed" });

    let (status, _) = send(&app, Method::PATCH, &uri, Some(&bob.token), Some(retitle.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::PATCH, &missing, Some(&alice.token), Some(retitle.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, &missing, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::PATCH, &uri, Some(&alice.token), Some(retitle)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "renamed");

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
