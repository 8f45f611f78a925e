//! E2E tests for health check and basic server functionality

mod common;

use common::{FakeGithub, TestAuthority};

#[tokio::test]
async fn test_health_check() {
    let github = FakeGithub::start().await;
    let authority = TestAuthority::new(&github, common::API_SECRET).await;

    let response = authority
        .client
        .get(authority.url("/oauth/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_health_check_needs_no_secret() {
    let github = FakeGithub::start().await;
    let authority = TestAuthority::new(&github, common::API_SECRET).await;

    let response = authority
        .client
        .get(authority.url("/oauth/health"))
        .header("Authorization", "token wrong")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_root_banner() {
    let github = FakeGithub::start().await;
    let authority = TestAuthority::new(&github, "").await;

    let response = authority.client.get(authority.url("/")).send().await.unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert_eq!(body, "GitHub OAuth Authority");
}

#[tokio::test]
async fn test_404_for_unknown_routes() {
    let github = FakeGithub::start().await;
    let authority = TestAuthority::new(&github, "").await;

    let response = authority
        .client
        .get(authority.url("/unknown/route"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_metrics_exposition() {
    github_oauth_gate::metrics::init_metrics();
    let github = FakeGithub::start().await;
    let authority = TestAuthority::new(&github, common::API_SECRET).await;
    authority
        .create_attempt("http://app.local/", "http://app.local/_auth")
        .await;

    let response = authority
        .client
        .get(authority.url("/metrics"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("oauth_gate_login_attempts_total"));
    assert!(body.contains("oauth_gate_pending_attempts"));
}
