//! Provider clients against a canned local HTTP server.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use mirror_core::{ProviderError, SourceProvider, TargetProvider};
use mirror_providers::{
    EnterpriseGitee, EnterpriseGiteeConfig, Gitee, GiteeConfig, GitHub, GitHubConfig, GitLab,
    GitLabConfig, Secret,
};

/// Serves `responses` in order, one connection each, recording every request.
struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl StubServer {
    fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let handle = std::thread::spawn(move || {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().expect("accept");
                stream
                    .set_read_timeout(Some(Duration::from_secs(2)))
                    .expect("set_read_timeout");
                recorded.lock().unwrap().push(read_request(&mut stream));

                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).expect("write response");
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn finish(self) -> Vec<String> {
        self.handle.join().expect("stub server thread");
        let requests = self.requests.lock().unwrap().clone();
        requests
    }
}

fn read_request(stream: &mut std::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    loop {
        let n = match stream.read(&mut tmp) {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        buf.extend_from_slice(&tmp[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|l| {
                    let (k, v) = l.split_once(':')?;
                    k.eq_ignore_ascii_case("content-length")
                        .then(|| v.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn github(base: &str) -> GitHub {
    GitHub::new(GitHubConfig {
        username: "acme".into(),
        access_token: Secret::new("ghtok"),
        is_org: true,
        api_base: base.into(),
        git_host: "github.com".into(),
    })
    .unwrap()
}

fn github_page(start: usize, count: usize) -> String {
    let repos: Vec<serde_json::Value> = (start..start + count)
        .map(|i| {
            serde_json::json!({
                "name": format!("r{i}"),
                "full_name": format!("acme/r{i}"),
                "description": null,
                "private": i % 2 == 0,
            })
        })
        .collect();
    serde_json::to_string(&repos).unwrap()
}

#[tokio::test]
async fn test_github_listing_follows_pages_until_short_page() {
    let server = StubServer::start(vec![(200, github_page(0, 100)), (200, github_page(100, 3))]);
    let gh = github(&server.base());

    let repos = gh.list_repos().await.unwrap();

    assert_eq!(repos.len(), 103);
    assert_eq!(repos[102].path_with_namespace(), "acme/r102");
    let requests = server.finish();
    assert!(requests[0].starts_with("GET /user/repos?per_page=100&page=1 "));
    assert!(requests[1].starts_with("GET /user/repos?per_page=100&page=2 "));
    assert!(requests[0].to_lowercase().contains("authorization: bearer ghtok"));
}

#[tokio::test]
async fn test_github_listing_error_status_is_api_error() {
    let server = StubServer::start(vec![(401, r#"{"message":"Bad credentials"}"#.into())]);
    let gh = github(&server.base());

    let err = gh.list_repos().await.unwrap_err();

    assert!(matches!(
        err,
        ProviderError::Api { status: 401, ref message } if message.contains("Bad credentials")
    ));
    server.finish();
}

#[tokio::test]
async fn test_github_exists_via_graphql_and_creates_under_org() {
    let server = StubServer::start(vec![
        (
            200,
            r#"{"data":{"repository":null},"errors":[{"message":"Could not resolve to a Repository with the name 'acme/api'."}]}"#.into(),
        ),
        (201, r#"{"id":1}"#.into()),
    ]);
    let gh = github(&server.base());

    assert!(!gh.repo_exists("api").await.unwrap());
    gh.create_repo("api", "the api", true).await.unwrap();

    let requests = server.finish();
    assert!(requests[0].starts_with("POST /graphql "));
    assert!(requests[0].contains(r#""repo_owner":"acme""#));
    assert!(requests[1].starts_with("POST /orgs/acme/repos "));
    assert!(requests[1].contains(r#""private":true"#));
}

#[tokio::test]
async fn test_github_create_rejection_keeps_body() {
    let server = StubServer::start(vec![(422, r#"{"message":"name already exists"}"#.into())]);
    let gh = github(&server.base());

    let err = gh.create_repo("api", "", false).await.unwrap_err();

    assert!(matches!(
        err,
        ProviderError::Api { status: 422, ref message } if message.contains("already exists")
    ));
    server.finish();
}

#[tokio::test]
async fn test_gitee_exists_maps_status_codes() {
    let server = StubServer::start(vec![
        (200, "{}".into()),
        (404, r#"{"message":"Not Found Project"}"#.into()),
        (500, "oops".into()),
    ]);
    let gitee = Gitee::new(GiteeConfig {
        username: "li".into(),
        access_token: Secret::new("gt"),
        api_base: format!("{}/api/v5", server.base()),
        git_host: "gitee.com".into(),
    })
    .unwrap();

    assert!(gitee.repo_exists("a").await.unwrap());
    assert!(!gitee.repo_exists("b").await.unwrap());
    assert!(matches!(
        gitee.repo_exists("c").await,
        Err(ProviderError::Api { status: 500, .. })
    ));

    let requests = server.finish();
    assert!(requests[0].starts_with("GET /api/v5/repos/li/a "));
}

#[tokio::test]
async fn test_gitee_create_sends_token_in_body() {
    let server = StubServer::start(vec![(201, "{}".into())]);
    let gitee = Gitee::new(GiteeConfig {
        username: "li".into(),
        access_token: Secret::new("gt"),
        api_base: format!("{}/api/v5", server.base()),
        git_host: "gitee.com".into(),
    })
    .unwrap();

    gitee.create_repo("api", "d", false).await.unwrap();

    let requests = server.finish();
    assert!(requests[0].starts_with("POST /api/v5/user/repos "));
    assert!(requests[0].contains(r#""access_token":"gt""#));
}

fn gitlab(base: &str) -> GitLab {
    GitLab::new(GitLabConfig {
        username: "bob".into(),
        access_token: Secret::new("glpat"),
        api_base: format!("{base}/api/v4"),
        git_host: "gitlab.com".into(),
    })
    .unwrap()
}

#[tokio::test]
async fn test_gitlab_existing_project_gets_branches_unprotected() {
    let server = StubServer::start(vec![
        (200, r#"{"id":9}"#.into()),
        (200, r#"[{"id":1,"name":"main"},{"id":2,"name":"release/1.0"}]"#.into()),
        (204, String::new()),
        (204, String::new()),
    ]);
    let gl = gitlab(&server.base());

    assert!(gl.repo_exists("api").await.unwrap());

    let requests = server.finish();
    assert!(requests[0].starts_with("GET /api/v4/projects/bob%2Fapi "));
    assert!(requests[0].to_lowercase().contains("private-token: glpat"));
    assert!(requests[1].starts_with("GET /api/v4/projects/bob%2Fapi/protected_branches "));
    assert!(requests[2].starts_with("DELETE /api/v4/projects/bob%2Fapi/protected_branches/main "));
    assert!(requests[3]
        .starts_with("DELETE /api/v4/projects/bob%2Fapi/protected_branches/release%2F1.0 "));
}

#[tokio::test]
async fn test_gitlab_unprotect_failure_does_not_fail_exists() {
    let server = StubServer::start(vec![
        (200, r#"{"id":9}"#.into()),
        (403, r#"{"message":"403 Forbidden"}"#.into()),
    ]);
    let gl = gitlab(&server.base());

    assert!(gl.repo_exists("api").await.unwrap());
    server.finish();
}

#[tokio::test]
async fn test_gitlab_missing_project_then_create() {
    let server = StubServer::start(vec![
        (404, r#"{"message":"404 Project Not Found"}"#.into()),
        (201, r#"{"id":10}"#.into()),
    ]);
    let gl = gitlab(&server.base());

    assert!(!gl.repo_exists("api").await.unwrap());
    gl.create_repo("api", "", true).await.unwrap();

    let requests = server.finish();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].starts_with("POST /api/v4/projects "));
    assert!(requests[1].contains(r#""visibility":"private""#));
}

#[tokio::test]
async fn test_enterprise_listing_reads_data_field() {
    let body = r#"{"total_count":2,"data":[
        {"path":"api","path_with_namespace":"corp/api","description":"API"},
        {"path":"web","path_with_namespace":"corp/web","description":null}
    ]}"#;
    let server = StubServer::start(vec![(200, body.into())]);
    let client = EnterpriseGitee::new(EnterpriseGiteeConfig {
        enterprise_id: "42".into(),
        username: "li".into(),
        access_token: Secret::new("et"),
        api_base: server.base(),
        git_host: "gitee.com".into(),
    })
    .unwrap();

    let repos = client.list_repos().await.unwrap();

    assert_eq!(repos.len(), 2);
    assert!(repos.iter().all(|r| r.is_private()));
    let requests = server.finish();
    assert!(requests[0]
        .starts_with("GET /enterprises/42/projects?access_token=et&per_page=100&page=1 "));
}

#[tokio::test]
async fn test_enterprise_invalid_project_does_not_end_pagination() {
    let mut first: Vec<serde_json::Value> = (0..99)
        .map(|i| {
            serde_json::json!({
                "path": format!("p{i}"),
                "path_with_namespace": format!("corp/p{i}"),
            })
        })
        .collect();
    first.push(serde_json::json!({"path": "", "path_with_namespace": "corp/"}));
    let second = r#"{"data":[{"path":"late","path_with_namespace":"corp/late"}]}"#;
    let server = StubServer::start(vec![
        (200, serde_json::json!({ "data": first }).to_string()),
        (200, second.into()),
    ]);
    let client = EnterpriseGitee::new(EnterpriseGiteeConfig {
        enterprise_id: "42".into(),
        username: "li".into(),
        access_token: Secret::new("et"),
        api_base: server.base(),
        git_host: "gitee.com".into(),
    })
    .unwrap();

    let repos = client.list_repos().await.unwrap();

    assert_eq!(repos.len(), 100);
    assert!(repos.iter().any(|r| r.path() == "late"));
    assert!(repos.iter().all(|r| !r.path().is_empty()));
    let requests = server.finish();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].contains("page=2 "));
}
