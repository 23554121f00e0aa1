//! Cross-crate integration tests: wire encode/decode round trips and
//! the upload/download session lifecycle driven through actual
//! envelope bytes, the way two real peers would exchange them.

use std::sync::Arc;
use std::time::Duration;

use yproto_core::batch::{decode_batch, encode_batch};
use yproto_core::heartbeat::{encode_ping, encode_pong, is_ping_message, is_pong_message};
use yproto_core::message::{AwarenessStep, DocStep, Envelope, FileStep, Target};
use yproto_core::rpc::{CallOutcome, CallTable, RpcBody, RpcError, RpcFrame, RpcRequestType};
use yproto_files::chunker::split;
use yproto_files::storage::{FileMetadata, FileStore, InMemoryFileStore, InMemoryUploadStore, PermissionDecision};
use yproto_files::upload::{UploadReceiver, UploadSender};
use yproto_files::{DEFAULT_CHUNK_SIZE, DownloadResponder, DownloadSession, TransferConfig};

fn metadata(filename: &str, size: u64) -> FileMetadata {
    FileMetadata {
        filename: filename.to_string(),
        size,
        mime_type: "application/octet-stream".to_string(),
        encrypted: false,
        last_modified: 0,
    }
}

#[test]
fn doc_sync_step_round_trips_through_wire_bytes() {
    let mut envelope = Envelope::new("doc-1", false, Target::Doc(DocStep::SyncStep1(vec![1, 2, 3])));
    let bytes = envelope.encoded().to_vec();
    let decoded = Envelope::decode(&bytes).unwrap();
    assert_eq!(decoded.target, Target::Doc(DocStep::SyncStep1(vec![1, 2, 3])));
}

#[test]
fn ack_carries_the_acknowledged_message_id() {
    let mut update = Envelope::new("doc-1", false, Target::Doc(DocStep::Update(vec![4, 5])));
    let acked_id = update.id();

    let mut ack = Envelope::new(
        "doc-1",
        false,
        Target::Ack {
            message_id: acked_id.clone().into_bytes(),
        },
    );
    let decoded = Envelope::decode(ack.encoded()).unwrap();
    assert_eq!(
        decoded.target,
        Target::Ack {
            message_id: acked_id.into_bytes()
        }
    );
}

#[test]
fn awareness_request_and_update_round_trip() {
    let mut request = Envelope::new("doc-1", false, Target::Awareness(AwarenessStep::Request));
    let decoded = Envelope::decode(request.encoded()).unwrap();
    assert_eq!(decoded.target, Target::Awareness(AwarenessStep::Request));

    let mut update = Envelope::new(
        "doc-1",
        false,
        Target::Awareness(AwarenessStep::Update(vec![9, 9, 9])),
    );
    let decoded = Envelope::decode(update.encoded()).unwrap();
    assert_eq!(decoded.target, Target::Awareness(AwarenessStep::Update(vec![9, 9, 9])));
}

#[test]
fn legacy_file_taxonomy_still_decodes() {
    let mut envelope = Envelope::new(
        "doc-1",
        false,
        Target::File(FileStep::DownloadRequest {
            file_id: b"legacy-id".to_vec(),
        }),
    );
    let bytes = envelope.encoded().to_vec();
    let decoded = Envelope::decode(&bytes).unwrap();
    assert_eq!(
        decoded.target,
        Target::File(FileStep::DownloadRequest {
            file_id: b"legacy-id".to_vec(),
        })
    );
}

#[test]
fn heartbeat_messages_are_distinguishable() {
    let ping = encode_ping();
    let pong = encode_pong();
    assert!(is_ping_message(&ping));
    assert!(!is_pong_message(&ping));
    assert!(is_pong_message(&pong));
    assert!(!is_ping_message(&pong));
}

#[test]
fn batch_round_trips_heterogeneous_targets() {
    let mut envelopes = vec![
        Envelope::new("d1", false, Target::Doc(DocStep::Update(vec![1]))),
        Envelope::new("d1", false, Target::Awareness(AwarenessStep::Request)),
        Envelope::new(
            "d1",
            true,
            Target::Rpc(RpcFrame::request("upload.begin", vec![2, 2])),
        ),
    ];
    let bytes = encode_batch(&mut envelopes);
    let decoded = decode_batch(&bytes).unwrap();
    assert_eq!(decoded.len(), 3);
    assert_eq!(decoded[1].target, Target::Awareness(AwarenessStep::Request));
}

#[test]
fn batch_decode_rejects_truncated_trailing_envelope() {
    let mut envelopes = vec![Envelope::new("d1", false, Target::Doc(DocStep::Update(vec![1, 2])))];
    let mut bytes = encode_batch(&mut envelopes);
    bytes.pop();
    assert!(decode_batch(&bytes).is_err());
}

/// Drives an RPC request through an actual envelope round trip (as two
/// real peers would exchange it over a socket) and resolves it via the
/// call table, end to end.
#[tokio::test]
async fn rpc_request_response_resolves_through_call_table_and_wire_codec() {
    let table = Arc::new(CallTable::new(Duration::from_secs(5)));

    let mut request_envelope = Envelope::new(
        "doc-1",
        false,
        Target::Rpc(RpcFrame::request("download.metadata", b"content-id".to_vec())),
    );
    let request_id = request_envelope.id();
    let wire_bytes = request_envelope.encoded().to_vec();

    let (outcome_rx, _stream_rx) = table.begin(request_id.clone());

    // Simulate the peer receiving the request over the wire and replying.
    let received = Envelope::decode(&wire_bytes).unwrap();
    let Target::Rpc(frame) = &received.target else {
        panic!("expected an rpc frame");
    };
    assert_eq!(frame.request_type, RpcRequestType::Request);

    let mut response_envelope = Envelope::new(
        "doc-1",
        false,
        Target::Rpc(RpcFrame::response_ok(
            frame.method.clone(),
            request_id.clone(),
            b"ok-payload".to_vec(),
        )),
    );
    let response_bytes = response_envelope.encoded().to_vec();

    let decoded_response = Envelope::decode(&response_bytes).unwrap();
    let Target::Rpc(response_frame) = &decoded_response.target else {
        panic!("expected an rpc frame");
    };
    let correlation_id = response_frame.correlation_id.clone().unwrap();
    let RpcBody::Success { payload } = response_frame.body.clone() else {
        panic!("expected a success body");
    };
    table.complete(&correlation_id, CallOutcome::Ok(payload));

    let outcome = outcome_rx.await.unwrap();
    assert_eq!(outcome, CallOutcome::Ok(b"ok-payload".to_vec()));
}

#[tokio::test]
async fn rpc_call_times_out_without_a_response() {
    let table = CallTable::new(Duration::from_millis(5));
    let (rx, _stream_rx) = table.begin("req-timeout");
    tokio::time::sleep(Duration::from_millis(20)).await;
    table.sweep_timeouts();
    let outcome = rx.await.unwrap();
    assert_eq!(outcome, CallOutcome::Err(RpcError::timeout()));
}

/// Full upload then download of a multi-chunk file, driven through the
/// real chunk-frame and proof data an uploader and downloader would
/// exchange, with both sides backed by independent in-memory stores.
#[test]
fn end_to_end_upload_then_download_reassembles_original_bytes() {
    let data: Vec<u8> = (0..3u32).flat_map(|i| vec![i as u8; DEFAULT_CHUNK_SIZE]).collect();
    let chunks = split(&data, DEFAULT_CHUNK_SIZE);
    assert_eq!(chunks.len(), 3);

    let uploads = Arc::new(InMemoryUploadStore::new());
    let files = Arc::new(InMemoryFileStore::new());
    let receiver = UploadReceiver::new(Arc::clone(&uploads), Arc::clone(&files), TransferConfig::default());
    let mut sender = UploadSender::new(chunks).unwrap();

    receiver
        .begin("report.bin", metadata("report.bin", data.len() as u64), |_, _| {
            PermissionDecision::allow()
        })
        .unwrap();

    for index in sender.outstanding() {
        let (bytes, proof) = sender.chunk_frame(index).unwrap();
        receiver
            .accept_chunk("report.bin", index, bytes.to_vec(), proof)
            .unwrap();
    }
    for index in sender.outstanding() {
        sender.ack(index);
    }
    assert!(sender.is_complete());

    let content_id = receiver.complete("report.bin").unwrap();
    assert_eq!(content_id, sender.content_id());

    let responder = DownloadResponder::new(Arc::clone(&files));
    let stored = responder
        .handle_request(&content_id, |_| PermissionDecision::allow())
        .unwrap();

    let mut download = DownloadSession::new(content_id.clone()).unwrap();
    download.on_metadata(stored.metadata.clone());
    for (index, chunk) in stored.chunks.iter().enumerate() {
        let proof = stored.tree.proof(index).unwrap();
        download.on_chunk(index as u64, chunk.clone(), &proof).unwrap();
    }

    assert!(download.is_complete());
    assert_eq!(download.assemble().unwrap(), data);
}

#[test]
fn upload_denied_by_permission_hook_never_reaches_storage() {
    let uploads = Arc::new(InMemoryUploadStore::new());
    let files = Arc::new(InMemoryFileStore::new());
    let receiver = UploadReceiver::new(uploads, Arc::clone(&files), TransferConfig::default());

    let result = receiver.begin("secret.bin", metadata("secret.bin", 10), |_, _| {
        PermissionDecision::deny("not a collaborator")
    });
    assert!(result.is_err());
    assert!(files.get_file("secret.bin").is_none());
}

#[test]
fn download_of_unknown_content_id_is_not_found() {
    let files = Arc::new(InMemoryFileStore::new());
    let responder = DownloadResponder::new(files);
    let result = responder.handle_request("not-a-real-id", |_| PermissionDecision::allow());
    assert!(result.is_err());
}
