use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use curatela::ai::{HttpInference, InferenceService};
use curatela::error::CuratelaError;
use curatela::retry::RetryPolicy;
use curatela::scan::{extract_document, ScanConfig};

struct Captured {
    request_line: String,
    headers: String,
    body: String,
}

/// Answer one connection per scripted response, in order, and hand every
/// request back through the channel.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, mpsc::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().unwrap();

            let mut buf = Vec::new();
            let mut header_end = None;
            while header_end.is_none() {
                let mut tmp = [0u8; 1024];
                let n = stream.read(&mut tmp).unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&tmp[..n]);
                if let Some(i) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    header_end = Some(i + 4);
                }
            }
            let header_end = header_end.expect("did not receive full headers");
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let lower = headers.to_lowercase();
            let content_length = lower
                .lines()
                .find_map(|l| l.strip_prefix("content-length: "))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);

            let mut body_buf = buf[header_end..].to_vec();
            while body_buf.len() < content_length {
                let mut tmp = vec![0u8; content_length - body_buf.len()];
                let n = stream.read(&mut tmp).unwrap();
                if n == 0 {
                    break;
                }
                body_buf.extend_from_slice(&tmp[..n]);
            }

            tx.send(Captured {
                request_line: headers.lines().next().unwrap_or_default().to_string(),
                headers: lower,
                body: String::from_utf8_lossy(&body_buf[..content_length.min(body_buf.len())]).to_string(),
            })
            .unwrap();

            let resp = format!(
                "HTTP/1.1 {status} OK\r\nContent-Type: application/json\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(resp.as_bytes()).unwrap();
        }
    });

    (format!("http://{addr}"), rx)
}

#[tokio::test]
async fn chat_sends_query_context_and_bearer() {
    let (url, rx) = serve(vec![(200, r#"{"reply": "  Gastou R$ 80,00 com farmácia.  "}"#)]);
    let svc = HttpInference::new(&url, "segredo").unwrap();
    let reply = svc
        .chat("Quanto gastei?", &serde_json::json!({"accounts": []}))
        .await
        .unwrap();
    assert_eq!(reply, "Gastou R$ 80,00 com farmácia.");

    let req = rx.recv().unwrap();
    assert!(req.request_line.starts_with("POST /chat"));
    assert!(req.headers.contains("authorization: bearer segredo"));
    let body: serde_json::Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(body["query"], "Quanto gastei?");
    assert!(body["context"]["accounts"].is_array());
}

#[tokio::test]
async fn non_success_status_is_remote_error() {
    let (url, _rx) = serve(vec![(503, r#"{"error": "overloaded"}"#)]);
    let svc = HttpInference::new(&url, "").unwrap();
    let err = svc.upload_handle("a.pdf").await.unwrap_err();
    match &err {
        CuratelaError::Remote { status, message } => {
            assert_eq!(*status, 503);
            assert!(message.contains("overloaded"));
        }
        other => panic!("expected Remote, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn inline_extraction_sends_base64_and_categories() {
    let (url, rx) = serve(vec![(
        200,
        r#"{"transactions": [{"date": "2024-03-01", "description": "Drogaria", "value": 35.9, "nature": "DESPESA", "category": "Farmácia"}]}"#,
    )]);
    let svc = HttpInference::new(&url, "k").unwrap();
    let rows = svc
        .analyze_inline(b"abc", "application/pdf", &["Farmácia".to_string()])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].category, "Farmácia");
    assert_eq!(rows[0].value, 35.9);

    let req = rx.recv().unwrap();
    assert!(req.request_line.starts_with("POST /extract"));
    let body: serde_json::Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(body["file_base64"], "YWJj");
    assert_eq!(body["mime_type"], "application/pdf");
    assert_eq!(body["categories"][0], "Farmácia");
    assert!(body.get("storage_path").is_none());
}

#[tokio::test]
async fn receipt_cleaned_image_is_decoded() {
    let (url, _rx) = serve(vec![(
        200,
        r#"{"value": "42,50", "date": "2024-03-09", "description": "Padaria", "cleaned_image_base64": "AQID"}"#,
    )]);
    let svc = HttpInference::new(&url, "k").unwrap();
    let receipt = svc.clean_receipt(b"jpeg", "image/jpeg").await.unwrap();
    assert_eq!(receipt.value, 42.5);
    assert_eq!(receipt.date, "2024-03-09");
    assert_eq!(receipt.cleaned_image, Some(vec![1, 2, 3]));
}

#[tokio::test]
async fn large_document_goes_through_upload() {
    let (url, rx) = serve(vec![
        (200, r#"{"path": "uploads/abc-extrato.pdf", "signed_url": "/signed/abc"}"#),
        (200, ""),
        (200, r#"{"transactions": []}"#),
    ]);
    let svc = HttpInference::new(&url, "k").unwrap();
    let cfg = ScanConfig {
        inline_threshold: 4,
        analyze_policy: RetryPolicy::new(2, Duration::from_millis(1)),
        upload_policy: RetryPolicy::new(3, Duration::from_millis(1)),
    };
    let rows = extract_document(&svc, &cfg, "extrato.pdf", b"%PDF-1.4 big", "application/pdf", &[])
        .await
        .unwrap();
    assert!(rows.is_empty());

    let handle = rx.recv().unwrap();
    assert!(handle.request_line.starts_with("POST /upload-url"));
    assert!(handle.body.contains("extrato.pdf"));

    let put = rx.recv().unwrap();
    assert!(put.request_line.starts_with("PUT /signed/abc"));
    assert_eq!(put.body, "%PDF-1.4 big");

    let analyze = rx.recv().unwrap();
    assert!(analyze.request_line.starts_with("POST /extract"));
    let body: serde_json::Value = serde_json::from_str(&analyze.body).unwrap();
    assert_eq!(body["storage_path"], "uploads/abc-extrato.pdf");
    assert!(body.get("file_base64").is_none());
}
