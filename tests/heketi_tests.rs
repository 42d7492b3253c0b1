//! Heketi REST client tests against a mock server

use ocs_harness::error::HarnessError;
use ocs_harness::heketi::HeketiClient;

#[tokio::test]
async fn hello_succeeds_when_heketi_answers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/hello")
        .with_status(200)
        .with_body("Hello from Heketi")
        .create_async()
        .await;

    let client = HeketiClient::new(server.url()).unwrap();
    client.hello().await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn hello_fails_on_server_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/hello")
        .with_status(500)
        .create_async()
        .await;

    let client = HeketiClient::new(server.url()).unwrap();
    let err = client.hello().await.unwrap_err();
    assert!(matches!(err, HarnessError::Heketi(_)));
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn hello_fails_when_nothing_listens() {
    // Port reserved then dropped, so the connection is refused.
    let client = HeketiClient::new("http://127.0.0.1:1").unwrap();
    let err = client.hello().await.unwrap_err();
    assert!(matches!(err, HarnessError::Http(_)));
}

#[tokio::test]
async fn wait_until_up_returns_once_service_answers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/hello")
        .with_status(200)
        .create_async()
        .await;

    let client = HeketiClient::new(server.url()).unwrap();
    client.wait_until_up(30, 1).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn wait_until_up_times_out_against_a_dead_service() {
    let client = HeketiClient::new("http://127.0.0.1:1").unwrap();
    // Zero timeout: exactly one probe, then the deadline error.
    let err = client.wait_until_up(0, 1).await.unwrap_err();
    match err {
        HarnessError::Timeout { what, seconds } => {
            assert!(what.contains("127.0.0.1"));
            assert_eq!(seconds, 0);
        }
        other => panic!("expected timeout, got {other}"),
    }
}

#[test]
fn construction_succeeds_and_trims_trailing_slash() {
    // Builder options are static, so construction must not error.
    let client = HeketiClient::new("http://heketi:8080/").unwrap();
    assert_eq!(client.server(), "http://heketi:8080");
}
