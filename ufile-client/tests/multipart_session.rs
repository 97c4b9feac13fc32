//! Multipart uploads through the client against an in-memory service

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;
use ufile_client::test_utils::{json_response, status_response, MockTransport};
use ufile_client::{Client, ClientError, ObjectConfig, SessionPhase};
use ufile_core::auth::LocalAuthorizer;
use ufile_core::MultipartInfo;
use ufile_net::{HttpRequest, HttpResponse, Method};

/// Stores uploaded parts and assembles them on finish
#[derive(Default)]
struct FakeService {
    parts: Mutex<BTreeMap<u32, Vec<u8>>>,
    assembled: Mutex<Option<(String, Vec<u8>)>>,
}

fn query<'a>(url: &'a str, name: &str) -> Option<&'a str> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (k == name).then_some(v)
    })
}

impl FakeService {
    fn handle(&self, req: &HttpRequest) -> ufile_net::Result<HttpResponse> {
        let url = req.url.as_str();
        Ok(match req.method {
            Method::Post if query(url, "uploads").is_some() => json_response(serde_json::json!({
                "UploadId": "upload-7",
                "BlkSize": 4,
                "Bucket": "bucket",
                "Key": "big.bin"
            })),
            Method::Put => {
                let index: u32 = query(url, "partNumber").unwrap().parse().unwrap();
                self.parts.lock().unwrap().insert(index, req.body.to_vec());
                HttpResponse::new(
                    200,
                    vec![("ETag".to_string(), format!("\"etag-{}\"", index))],
                    std::io::empty(),
                )
            }
            Method::Post => {
                let order = String::from_utf8(req.body.to_vec()).unwrap();
                let parts = self.parts.lock().unwrap();
                let data: Vec<u8> = parts.values().flatten().copied().collect();
                let key = query(url, "newKey").unwrap_or("big.bin").to_string();
                let size = data.len();
                *self.assembled.lock().unwrap() = Some((order, data));
                json_response(serde_json::json!({
                    "Bucket": "bucket",
                    "Key": key,
                    "FileSize": size
                }))
            }
            Method::Delete => status_response(200),
            _ => status_response(405),
        })
    }
}

fn setup() -> (Client, Arc<FakeService>, Arc<MockTransport>) {
    let service = Arc::new(FakeService::default());
    let handler = Arc::clone(&service);
    let transport = Arc::new(MockTransport::new(move |req| handler.handle(req)));
    let client = Client::new(
        transport.clone(),
        Arc::new(LocalAuthorizer::new("pub", "priv").unwrap()),
        ObjectConfig::new("cn-bj", "ufileos.com"),
    )
    .unwrap();
    (client, service, transport)
}

#[test]
fn parts_from_many_threads_are_joined_in_order() {
    let (client, service, _) = setup();
    let session = client
        .init_multipart("bucket", "big.bin", "application/octet-stream")
        .unwrap();
    assert_eq!(session.part_size(), Some(4));

    let chunks: Vec<Vec<u8>> = b"abcdefghijklmn".chunks(4).map(<[u8]>::to_vec).collect();
    thread::scope(|s| {
        for (i, chunk) in chunks.iter().enumerate().rev() {
            let session = &session;
            s.spawn(move || session.upload_part(i as u32, chunk).unwrap());
        }
    });

    let done = session.finish(None).unwrap();
    assert_eq!(done.file_size, 14);
    assert_eq!(done.key, "big.bin");
    assert_eq!(session.phase(), SessionPhase::Finished);

    let (order, data) = service.assembled.lock().unwrap().clone().unwrap();
    assert_eq!(order, "etag-0,etag-1,etag-2,etag-3");
    assert_eq!(data, b"abcdefghijklmn");
}

#[test]
fn upload_multipart_finishes_with_new_key_absent() {
    let (client, service, transport) = setup();
    let info = client
        .init_multipart("bucket", "big.bin", "text/plain")
        .unwrap()
        .info()
        .unwrap();

    let parts = vec![b"1111".to_vec(), b"2222".to_vec(), b"33".to_vec()];
    let done = client.upload_multipart(info, parts, 2).unwrap();

    assert_eq!(done.file_size, 10);
    let finish = transport.requests().pop().unwrap();
    assert!(query(&finish.url, "newKey").is_none());
    assert_eq!(finish.header_value("Content-Type"), Some("text/plain"));
    assert_eq!(service.assembled.lock().unwrap().as_ref().unwrap().1, b"1111222233");
}

#[test]
fn resumed_session_continues_upload() {
    let (client, service, _) = setup();
    let info = MultipartInfo {
        upload_id: "upload-7".to_string(),
        blk_size: 4,
        bucket: "bucket".to_string(),
        key: "big.bin".to_string(),
        mime_type: "text/plain".to_string(),
    };

    let session = client.resume_multipart(info);
    assert_eq!(session.phase(), SessionPhase::Initialized);
    session.upload_part(0, b"wxyz").unwrap();
    let done = session.finish(Some("renamed.bin")).unwrap();

    assert_eq!(done.key, "renamed.bin");
    assert_eq!(service.assembled.lock().unwrap().as_ref().unwrap().0, "etag-0");
}

#[test]
fn finish_after_abort_is_invalid_state() {
    let (client, _, transport) = setup();
    let session = client.init_multipart("bucket", "big.bin", "text/plain").unwrap();
    session.upload_part(0, b"abcd").unwrap();

    session.abort().unwrap();
    let requests_after_abort = transport.request_count();

    assert!(matches!(session.finish(None), Err(ClientError::InvalidState(_))));
    assert_eq!(transport.request_count(), requests_after_abort);
}

#[test]
fn oversized_part_is_a_validation_error() {
    let (client, _, _) = setup();
    let session = client.init_multipart("bucket", "big.bin", "text/plain").unwrap();
    assert!(matches!(
        session.upload_part(0, b"too long"),
        Err(ClientError::Validation(_))
    ));
    assert_eq!(session.phase(), SessionPhase::Initialized);
}
