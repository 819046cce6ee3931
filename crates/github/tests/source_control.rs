use github::{GitHubClient, GitHubConfig};
use providers::SourceControl;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn repo_body(server: &MockServer) -> serde_json::Value {
    json!({
        "id": 1296269,
        "node_id": "MDEwOlJlcG9zaXRvcnkxMjk2MjY5",
        "name": "acme-42",
        "full_name": "factory/acme-42",
        "private": true,
        "url": format!("{}/repos/factory/acme-42", server.uri()),
        "html_url": "https://github.com/factory/acme-42",
        "default_branch": "main"
    })
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "message": "Not Found",
        "documentation_url": "https://docs.github.com/rest"
    }))
}

fn client(server: &MockServer, template: Option<&str>) -> GitHubClient {
    GitHubClient::new(GitHubConfig {
        api_url: Some(server.uri()),
        token: Some("ghp_test".to_string()),
        owner: Some("factory".to_string()),
        template: template.map(str::to_string),
        private: true,
    })
    .unwrap()
}

#[tokio::test]
async fn test_reuses_existing_repository() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/factory/acme-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_body(&server)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let repo = client(&server, Some("factory/tenant-template"))
        .create_or_fetch_repo("acme-42")
        .await
        .unwrap();

    assert_eq!(repo.full_name, "factory/acme-42");
    assert_eq!(repo.default_branch, "main");
}

#[tokio::test]
async fn test_generates_missing_repository_from_template() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/factory/acme-42"))
        .respond_with(not_found())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/factory/tenant-template/generate"))
        .and(body_partial_json(json!({ "owner": "factory", "name": "acme-42" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(repo_body(&server)))
        .expect(1)
        .mount(&server)
        .await;

    let repo = client(&server, Some("factory/tenant-template"))
        .create_or_fetch_repo("acme-42")
        .await
        .unwrap();

    assert_eq!(repo.owner(), "factory");
    assert_eq!(repo.name(), "acme-42");
}

#[tokio::test]
async fn test_missing_file_reports_false() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/factory/acme-42/contents/package.json"))
        .respond_with(not_found())
        .mount(&server)
        .await;

    let exists = client(&server, None)
        .file_exists("factory/acme-42", "package.json")
        .await
        .unwrap();

    assert!(!exists);
}
