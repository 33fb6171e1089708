//! Runs the real server on a socket and drives it with reqwest.

use std::time::Duration;

use api_gatekeeper::lifecycle::Shutdown;
use reqwest::StatusCode;

mod common;
use common::*;

#[tokio::test]
async fn test_serves_and_drains_on_shutdown() {
    let (server, _) = server(config());
    let registry = server.registry().clone();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    let client = reqwest::Client::new();

    let res = client
        .get(format!("{base}/v1/whoami"))
        .bearer_auth(ALICE_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user"]["name"], "Alice");

    // Burst is 4 and one token is already spent by the peer address.
    let mut statuses = Vec::new();
    for _ in 0..4 {
        let res = client.get(format!("{base}/v1/healthcheck")).send().await.unwrap();
        statuses.push(res.status());
    }
    assert_eq!(statuses[..3], [StatusCode::OK; 3]);
    assert_eq!(statuses[3], StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(registry.len(), 1);

    drop(client);
    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
