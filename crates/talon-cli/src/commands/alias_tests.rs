use super::*;
use talon_daemon::rpc::protocol::CommandResponse;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;

fn temp_client() -> (DaemonClient, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let socket_path = dir.path().join("daemon.sock");
    std::mem::forget(dir);
    (DaemonClient::test_connect(socket_path.clone()), socket_path)
}

#[tokio::test]
async fn resolve_prints_the_session_key() {
    let (client, socket_path) = temp_client();
    let listener = UnixListener::bind(&socket_path).expect("bind");

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buf = vec![0u8; 4096];
        let n = stream.read(&mut buf).await.expect("read");
        let line = String::from_utf8_lossy(&buf[..n]);
        let req: LegacyRequest = serde_json::from_str(line.trim()).expect("parse");
        assert!(matches!(req, LegacyRequest::AliasResolve { alias } if alias == "runbook"));

        let response = CommandResponse::ok("alias_resolve", None, serde_json::json!({"sessionKey": "socket:eng:main"}));
        let mut out = serde_json::to_string(&response).expect("serialize");
        out.push('\n');
        stream.write_all(out.as_bytes()).await.expect("write");
    });

    resolve(&client, "runbook").await.expect("resolve");
    server.await.expect("server task");
}

#[tokio::test]
async fn list_prints_nothing_fatal_when_empty() {
    let (client, socket_path) = temp_client();
    let listener = UnixListener::bind(&socket_path).expect("bind");

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buf = vec![0u8; 4096];
        let _ = stream.read(&mut buf).await.expect("read");
        let response = CommandResponse::ok("alias_list", None, serde_json::json!({"aliases": []}));
        let mut out = serde_json::to_string(&response).expect("serialize");
        out.push('\n');
        stream.write_all(out.as_bytes()).await.expect("write");
    });

    list(&client).await.expect("list");
    server.await.expect("server task");
}
