//! Static server lifecycle against a scratch site tree

mod common;

use sitecheck::config::ServerSettings;
use sitecheck::ServerHandle;

fn ephemeral() -> ServerSettings {
    ServerSettings {
        port: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_serves_files_verbatim() {
    let site = common::site();
    let server = ServerHandle::start(site.path().to_path_buf(), &ephemeral())
        .await
        .unwrap();

    let body = reqwest::get(format!("{}/index.html", server.base_url()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, common::HOME);
    assert!(body.contains(r##"<a href="#about">About</a>"##));
    assert!(body.trim_end().ends_with("</html>"));

    let logo = reqwest::get(format!("{}/images/logo.png", server.base_url()))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(&logo[..], &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_missing_file_is_404() {
    let site = common::site();
    let server = ServerHandle::start(site.path().to_path_buf(), &ephemeral())
        .await
        .unwrap();

    let status = reqwest::get(format!("{}/no/such/page.html", server.base_url()))
        .await
        .unwrap()
        .status();
    assert_eq!(status.as_u16(), 404);
}

#[tokio::test]
async fn test_directory_serves_its_index() {
    let site = common::site();
    let server = ServerHandle::start(site.path().to_path_buf(), &ephemeral())
        .await
        .unwrap();

    let body = reqwest::get(format!("{}/services/", server.base_url()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("<title>Services - MB Secure</title>"));
}

#[tokio::test]
async fn test_stop_is_idempotent_and_frees_the_port() {
    let site = common::site();
    let mut server = ServerHandle::start(site.path().to_path_buf(), &ephemeral())
        .await
        .unwrap();
    let port = server.local_addr().port();
    assert!(server.is_running());

    server.stop().await;
    server.stop().await;
    assert!(!server.is_running());

    // The same fixed port can be bound again right away
    let again = ServerSettings {
        port,
        ..Default::default()
    };
    let restarted = ServerHandle::start(site.path().to_path_buf(), &again)
        .await
        .unwrap();
    assert_eq!(restarted.local_addr().port(), port);
}

#[test]
fn test_drop_outside_runtime_stops_server() {
    let site = common::site();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let server = runtime
        .block_on(ServerHandle::start(site.path().to_path_buf(), &ephemeral()))
        .unwrap();
    let addr = server.local_addr();

    drop(server);

    // Listener is gone once drop returns
    assert!(std::net::TcpStream::connect(addr).is_err());
}
