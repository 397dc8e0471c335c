//! Robustness tests for whole sync runs.
//!
//! A scripted RouterOS API server and a wiremock lookup service stand in for
//! the real collaborators, so these runs go through the actual TCP session
//! and HTTP client code.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use asnlist::commands::sync;
use asnlist::config::{Config, SecureString};
use asnlist::device::protocol::{read_sentence, write_sentence};
use asnlist::SyncError;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PASSWORD: &str = "secret";

#[derive(Debug, Clone)]
struct Row {
    id: String,
    list: String,
    address: String,
    comment: String,
}

#[derive(Debug, Default)]
struct RouterState {
    rows: Vec<Row>,
    next_id: u32,
    logins: usize,
}

impl RouterState {
    fn insert(&mut self, list: &str, address: &str, comment: &str) -> String {
        self.next_id += 1;
        let id = format!("*{:X}", self.next_id);
        self.rows.push(Row {
            id: id.clone(),
            list: list.to_string(),
            address: address.to_string(),
            comment: comment.to_string(),
        });
        id
    }

    fn addresses(&self, list: &str, comment: &str) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| r.list == list && r.comment == comment)
            .map(|r| r.address.clone())
            .collect()
    }
}

/// Minimal RouterOS API server for /ip/firewall/address-list
struct FakeRouter {
    port: u16,
    state: Arc<Mutex<RouterState>>,
}

impl FakeRouter {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(RouterState::default()));

        let shared = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(handle_connection(socket, Arc::clone(&shared)));
            }
        });

        Self { port, state }
    }
}

async fn handle_connection(mut socket: TcpStream, state: Arc<Mutex<RouterState>>) {
    let mut authenticated = false;
    while let Ok(words) = read_sentence(&mut socket).await {
        if words.is_empty() {
            continue;
        }
        let replies = respond(&state, &mut authenticated, &words);
        for reply in replies {
            if write_sentence(&mut socket, &reply).await.is_err() {
                return;
            }
        }
    }
}

fn trap(message: &str) -> Vec<Vec<String>> {
    vec![
        vec!["!trap".to_string(), format!("=message={}", message)],
        vec!["!done".to_string()],
    ]
}

fn respond(
    state: &Mutex<RouterState>,
    authenticated: &mut bool,
    words: &[String],
) -> Vec<Vec<String>> {
    let attr = |prefix: char, key: &str| {
        let lead = format!("{}{}=", prefix, key);
        words
            .iter()
            .find_map(|w| w.strip_prefix(lead.as_str()).map(str::to_string))
    };
    let mut router = state.lock().unwrap();

    if words[0] == "/login" {
        if attr('=', "password").as_deref() == Some(PASSWORD) {
            *authenticated = true;
            router.logins += 1;
            return vec![vec!["!done".to_string()]];
        }
        return trap("invalid user name or password (6)");
    }
    if !*authenticated {
        return vec![vec!["!fatal".to_string(), "not logged in".to_string()]];
    }

    match words[0].as_str() {
        "/ip/firewall/address-list/print" => {
            let list = attr('?', "list");
            let comment = attr('?', "comment");
            let address = attr('?', "address");
            let proplist = attr('=', ".proplist").unwrap_or_default();

            let mut replies: Vec<Vec<String>> = router
                .rows
                .iter()
                .filter(|r| list.as_ref().map_or(true, |l| *l == r.list))
                .filter(|r| comment.as_ref().map_or(true, |c| *c == r.comment))
                .filter(|r| address.as_ref().map_or(true, |a| *a == r.address))
                .map(|r| {
                    let mut sentence = vec!["!re".to_string()];
                    if proplist.contains(".id") {
                        sentence.push(format!("=.id={}", r.id));
                    }
                    if proplist.contains("address") {
                        sentence.push(format!("=address={}", r.address));
                    }
                    sentence
                })
                .collect();
            replies.push(vec!["!done".to_string()]);
            replies
        }
        "/ip/firewall/address-list/add" => {
            let (Some(list), Some(address)) = (attr('=', "list"), attr('=', "address")) else {
                return trap("missing list or address");
            };
            let comment = attr('=', "comment").unwrap_or_default();
            let id = router.insert(&list, &address, &comment);
            vec![vec!["!done".to_string(), format!("=ret={}", id)]]
        }
        "/ip/firewall/address-list/remove" => {
            let id = attr('=', ".id").unwrap_or_default();
            let before = router.rows.len();
            router.rows.retain(|r| r.id != id);
            if router.rows.len() == before {
                return trap("no such item");
            }
            vec![vec!["!done".to_string()]]
        }
        _ => trap("no such command prefix"),
    }
}

fn prefixes_body(prefixes: &[(&str, u8)]) -> serde_json::Value {
    let ipv4: Vec<_> = prefixes
        .iter()
        .map(|(ip, cidr)| {
            json!({ "prefix": format!("{}/{}", ip, cidr), "ip": ip, "cidr": cidr })
        })
        .collect();
    json!({
        "status": "ok",
        "status_message": "Query was successful",
        "data": {
            "ipv4_prefixes": ipv4,
            "ipv6_prefixes": [{ "prefix": "2001:db8::/32", "ip": "2001:db8::", "cidr": 32 }]
        }
    })
}

fn config(
    router: &FakeRouter,
    lookup: &MockServer,
    cache: &std::path::Path,
    asns: &[&str],
) -> Config {
    Config {
        router: "127.0.0.1".to_string(),
        port: Some(router.port),
        user: "admin".to_string(),
        password: SecureString::from(PASSWORD),
        list: "blocked".to_string(),
        asns: asns.iter().map(|s| s.to_string()).collect(),
        cache_path: cache.to_path_buf(),
        api_url: lookup.uri(),
        device_timeout: Some(5),
        ..Config::default()
    }
}

#[tokio::test]
async fn test_sync_leaves_foreign_entries_untouched() {
    let router = FakeRouter::start().await;
    {
        let mut state = router.state.lock().unwrap();
        state.insert("blocked", "10.0.0.0/8", "ASN64500");
        state.insert("blocked", "198.51.100.0/24", "ASN64500");
        state.insert("blocked", "198.51.100.0/24", "ASN64501");
        state.insert("blocked", "203.0.113.0/24", "manual");
        state.insert("allowed", "198.51.100.0/24", "ASN64500");
    }

    let lookup = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/asn/64500/prefixes"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(prefixes_body(&[("10.0.0.0", 8), ("11.0.0.0", 8)])),
        )
        .expect(1)
        .mount(&lookup)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let summary = sync::run(&config(&router, &lookup, dir.path(), &["64500"]))
        .await
        .unwrap();
    assert!(summary.is_complete());
    assert_eq!(summary.total_removed(), 1);
    assert_eq!(summary.total_added(), 1);

    let state = router.state.lock().unwrap();
    assert_eq!(
        state.addresses("blocked", "ASN64500"),
        vec!["10.0.0.0/8", "11.0.0.0/8"]
    );
    assert_eq!(state.addresses("blocked", "ASN64501"), vec!["198.51.100.0/24"]);
    assert_eq!(state.addresses("blocked", "manual"), vec!["203.0.113.0/24"]);
    assert_eq!(state.addresses("allowed", "ASN64500"), vec!["198.51.100.0/24"]);
}

#[tokio::test]
async fn test_failing_lookup_does_not_block_other_asns() {
    let router = FakeRouter::start().await;
    router
        .state
        .lock()
        .unwrap()
        .insert("blocked", "192.0.2.0/24", "ASN64500");

    let lookup = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/asn/64500/prefixes"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "status": "error",
            "status_message": "Too many requests"
        })))
        .mount(&lookup)
        .await;
    Mock::given(method("GET"))
        .and(path("/asn/64501/prefixes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(prefixes_body(&[("11.0.0.0", 8)])),
        )
        .mount(&lookup)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let summary = sync::run(&config(&router, &lookup, dir.path(), &["64500", "64501"]))
        .await
        .unwrap();

    assert_eq!(summary.failures.len(), 1);
    let (asn, error) = &summary.failures[0];
    assert_eq!(asn, "64500");
    assert!(matches!(error, SyncError::Fetch { .. }));
    assert!(error.to_string().contains("Too many requests"));
    assert_eq!(summary.reports[0].asn, "64501");

    let state = router.state.lock().unwrap();
    // The failed ASN's entries were not touched
    assert_eq!(state.addresses("blocked", "ASN64500"), vec!["192.0.2.0/24"]);
    assert_eq!(state.addresses("blocked", "ASN64501"), vec!["11.0.0.0/8"]);
    // Only the healthy ASN opened a session
    assert_eq!(state.logins, 1);
}

#[tokio::test]
async fn test_second_run_uses_fresh_cache() {
    let router = FakeRouter::start().await;
    let lookup = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/asn/64500/prefixes"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(prefixes_body(&[("10.0.0.0", 8), ("11.0.0.0", 8)])),
        )
        .expect(1)
        .mount(&lookup)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let config = config(&router, &lookup, dir.path(), &["64500"]);

    let first = sync::run(&config).await.unwrap();
    assert!(first.reports[0].refreshed);
    assert_eq!(first.total_added(), 2);

    let second = sync::run(&config).await.unwrap();
    assert!(!second.reports[0].refreshed);
    assert_eq!(second.total_added(), 0);
    assert_eq!(second.total_removed(), 0);
    assert_eq!(router.state.lock().unwrap().rows.len(), 2);
}

#[tokio::test]
async fn test_stale_cache_with_failing_lookup_skips_device() {
    let router = FakeRouter::start().await;
    let lookup = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&lookup)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let cache_file = dir.path().join("64500.asn");
    std::fs::write(&cache_file, "10.0.0.0/8\n").unwrap();
    std::fs::File::options()
        .write(true)
        .open(&cache_file)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(90000))
        .unwrap();

    let summary = sync::run(&config(&router, &lookup, dir.path(), &["64500"]))
        .await
        .unwrap();
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(router.state.lock().unwrap().logins, 0);
    assert_eq!(std::fs::read_to_string(&cache_file).unwrap(), "10.0.0.0/8\n");
}

#[tokio::test]
async fn test_rejected_login_is_asn_local() {
    let router = FakeRouter::start().await;
    let lookup = MockServer::start().await;

    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("64500.asn"), "10.0.0.0/8\n").unwrap();
    std::fs::write(dir.path().join("64501.asn"), "11.0.0.0/8\n").unwrap();

    let config = Config {
        password: SecureString::from("wrong"),
        ..config(&router, &lookup, dir.path(), &["64500", "64501"])
    };
    let summary = sync::run(&config).await.unwrap();

    assert_eq!(summary.failures.len(), 2);
    for (_, error) in &summary.failures {
        assert!(matches!(error, SyncError::Connection(_)));
        assert!(error.to_string().contains("invalid user name or password"));
    }
    assert!(router.state.lock().unwrap().rows.is_empty());
}

#[tokio::test]
async fn test_dry_run_leaves_device_unchanged() {
    let router = FakeRouter::start().await;
    router
        .state
        .lock()
        .unwrap()
        .insert("blocked", "192.0.2.0/24", "ASN64500");
    let lookup = MockServer::start().await;

    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("64500.asn"), "10.0.0.0/8\n10.0.0.0/8\n").unwrap();

    let config = Config {
        dry_run: true,
        ..config(&router, &lookup, dir.path(), &["64500"])
    };
    let summary = sync::run(&config).await.unwrap();
    assert_eq!(summary.total_removed(), 1);
    // Duplicates in the cache are each an addition
    assert_eq!(summary.total_added(), 2);
    assert_eq!(
        router.state.lock().unwrap().addresses("blocked", "ASN64500"),
        vec!["192.0.2.0/24"]
    );
}
