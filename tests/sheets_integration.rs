//! Sheets ledger against a local HTTP stand-in for the Sheets API.

use expense_ingest::config::{SheetsAuth, SheetsConfig};
use expense_ingest::error::LedgerError;
use expense_ingest::ledger::{AppendSummary, LedgerRow, LedgerSink, SheetsLedger};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct CapturedRequest {
    head: String,
    body: Value,
}

/// Serve exactly one request with `status` and `response`, handing the
/// request back through the returned channel.
async fn serve_once(
    status: &'static str,
    response: &'static str,
) -> (String, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/v4", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        while buf.len() < head_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = serde_json::from_slice(&buf[head_end..head_end + content_length]).unwrap();

        let reply = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{response}",
            response.len()
        );
        socket.write_all(reply.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        let _ = tx.send(CapturedRequest { head, body });
    });

    (base, rx)
}

fn ledger(api_base: String) -> SheetsLedger {
    SheetsLedger::new(SheetsConfig {
        spreadsheet_id: "sheet-123".into(),
        auth: SheetsAuth::Token(SecretString::from("ya29.test-token".to_string())),
        range: "Gastos!A1".into(),
        api_base,
    })
    .unwrap()
}

fn rows() -> Vec<LedgerRow> {
    vec![
        LedgerRow {
            date: "2025-10-23".into(),
            category: "comida".into(),
            detail: "CAFETERIA NAVAR".into(),
            amount: 1.2,
        },
        LedgerRow {
            date: "2025-10-23".into(),
            category: "otros".into(),
            detail: "UNKNOWN MERCHANT XYZ".into(),
            amount: 12.0,
        },
    ]
}

#[tokio::test]
async fn append_posts_rows_and_reads_updates() {
    let (base, captured) = serve_once(
        "200 OK",
        r#"{"spreadsheetId":"sheet-123","updates":{"updatedRange":"Gastos!A7:D8","updatedRows":2,"updatedCells":8}}"#,
    )
    .await;

    let summary = ledger(base).append(&rows()).await.unwrap();
    assert_eq!(
        summary,
        AppendSummary {
            updated_rows: 2,
            updated_cells: 8
        }
    );

    let request = captured.await.unwrap();
    let request_line = request.head.lines().next().unwrap();
    assert!(request_line.starts_with("POST /v4/spreadsheets/sheet-123/values/Gastos!A1:append?"));
    assert!(request_line.contains("valueInputOption=USER_ENTERED"));
    assert!(request_line.contains("insertDataOption=INSERT_ROWS"));
    assert!(
        request
            .head
            .to_ascii_lowercase()
            .contains("authorization: bearer ya29.test-token")
    );
    assert_eq!(
        request.body,
        json!({
            "values": [
                ["'2025-10-23", "comida", "CAFETERIA NAVAR", 1.2],
                ["'2025-10-23", "otros", "UNKNOWN MERCHANT XYZ", 12.0]
            ]
        })
    );
}

#[tokio::test]
async fn non_success_status_is_rejected() {
    let (base, _captured) = serve_once(
        "403 Forbidden",
        r#"{"error":{"code":403,"status":"PERMISSION_DENIED"}}"#,
    )
    .await;

    let err = ledger(base).append(&rows()).await.unwrap_err();
    match err {
        LedgerError::Rejected { status, body, .. } => {
            assert_eq!(status, 403);
            assert!(body.contains("PERMISSION_DENIED"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_api_is_request_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/v4", listener.local_addr().unwrap());
    drop(listener);

    let err = ledger(base).append(&rows()).await.unwrap_err();
    assert!(matches!(err, LedgerError::RequestFailed { .. }));
}
