//! Integration tests for the event protocol's wire shape.
//!
//! Browser clients parse these frames with plain `JSON.parse`, so the exact
//! field names matter more than the Rust types.  These tests pin the payload
//! field names of every event to the protocol table and exercise the public
//! codec API end to end.

use homeshare_core::{
    decode_client_event, decode_relay_event, encode_event, split_chunks, assemble_chunks,
    total_chunks, ClientEvent, Device, DeviceId, DeviceType, Pin, RelayEvent, TransferFailure,
    TransferId,
};
use serde_json::Value;

/// Encodes an event and returns its `data` object for field inspection.
fn data_of<E: homeshare_core::protocol::codec::NamedEvent>(event: &E) -> (String, Value) {
    let text = encode_event(event).expect("encode must succeed");
    let mut frame: Value = serde_json::from_str(&text).expect("frame must be JSON");
    let name = frame["event"].as_str().expect("event name").to_string();
    (name, frame["data"].take())
}

fn keys(value: &Value) -> Vec<String> {
    let mut keys: Vec<String> = value
        .as_object()
        .expect("data must be an object")
        .keys()
        .cloned()
        .collect();
    keys.sort();
    keys
}

#[test]
fn test_start_transfer_payload_fields() {
    let event = ClientEvent::StartTransfer {
        target_id: DeviceId::new_random(),
        filename: "report.pdf".to_string(),
        size: 3 * 1024 * 1024,
        total_chunks: 3,
        transfer_id: TransferId::derive(DeviceId::new_random(), 1_700_000_000_000),
        from_name: "Amber Falcon".to_string(),
        from_type: DeviceType::Desktop,
        requires_pin: true,
        pin: Some(Pin::parse("4821").unwrap()),
    };

    let (name, data) = data_of(&event);

    assert_eq!(name, "start-transfer");
    assert_eq!(
        keys(&data),
        [
            "filename",
            "fromName",
            "fromType",
            "pin",
            "requiresPin",
            "size",
            "targetId",
            "totalChunks",
            "transferId"
        ]
    );
    assert_eq!(data["pin"], "4821");
}

#[test]
fn test_transfer_announced_payload_fields() {
    let event = RelayEvent::TransferAnnounced {
        transfer_id: TransferId::from("t"),
        filename: "a.bin".to_string(),
        size: 10,
        from: DeviceId::new_random(),
        from_name: "Hyper Circuit".to_string(),
        from_type: DeviceType::MobileAndroid,
        total_chunks: 1,
        requires_pin: false,
        pin: None,
    };

    let (name, data) = data_of(&event);

    assert_eq!(name, "transfer-announced");
    assert_eq!(
        keys(&data),
        [
            "filename",
            "from",
            "fromName",
            "fromType",
            "pin",
            "requiresPin",
            "size",
            "totalChunks",
            "transferId"
        ]
    );
    assert!(data["pin"].is_null());
}

#[test]
fn test_chunk_and_chunk_forward_share_payload_fields() {
    let chunk = ClientEvent::Chunk {
        transfer_id: TransferId::from("t"),
        chunk_index: 2,
        chunk_bytes: vec![0, 1, 2, 255],
        is_last: true,
    };
    let forward = RelayEvent::ChunkForward {
        transfer_id: TransferId::from("t"),
        chunk_index: 2,
        chunk_bytes: vec![0, 1, 2, 255],
        is_last: true,
    };

    let (chunk_name, chunk_data) = data_of(&chunk);
    let (forward_name, forward_data) = data_of(&forward);

    assert_eq!(chunk_name, "chunk");
    assert_eq!(forward_name, "chunk-forward");
    assert_eq!(chunk_data, forward_data, "payload is forwarded unchanged");
    assert_eq!(keys(&chunk_data), ["chunkBytes", "chunkIndex", "isLast", "transferId"]);
}

#[test]
fn test_progress_and_complete_payload_fields() {
    let (_, progress) = data_of(&RelayEvent::Progress {
        transfer_id: TransferId::from("t"),
        percent: 33,
        status: "Sending... 33%".to_string(),
    });
    let (_, complete) = data_of(&RelayEvent::Complete {
        transfer_id: TransferId::from("t"),
        filename: "a.bin".to_string(),
    });

    assert_eq!(keys(&progress), ["percent", "status", "transferId"]);
    assert_eq!(keys(&complete), ["filename", "transferId"]);
}

#[test]
fn test_devices_update_entries_carry_presence_fields() {
    let device = Device {
        id: DeviceId::new_random(),
        name: "Blue Owl".to_string(),
        connected_at: 1,
        device_type: DeviceType::Tablet,
        user_agent: "UA".to_string(),
    };

    let (name, data) = data_of(&RelayEvent::DevicesUpdate(vec![device]));

    assert_eq!(name, "devices-update");
    let entry = &data.as_array().expect("array")[0];
    assert_eq!(keys(entry), ["connectedAt", "id", "name", "type", "userAgent"]);
    assert_eq!(entry["type"], "tablet");
}

#[test]
fn test_browser_style_rejection_frame_decodes() {
    // What a browser sends when the user declines a file.
    let text = r#"{"event":"transfer-error","data":{"transferId":"abc-1","message":"Rejected by user","reason":"user-rejected"}}"#;

    let event = decode_client_event(text).expect("decode");

    assert_eq!(
        event,
        ClientEvent::TransferError {
            transfer_id: Some(TransferId::from("abc-1")),
            message: "Rejected by user".to_string(),
            reason: Some(TransferFailure::UserRejected),
        }
    );
}

#[test]
fn test_chunked_payload_survives_the_wire_in_any_order() {
    // Arrange: split a payload the way a sender does
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let chunk_size = 4096;
    let total = total_chunks(payload.len() as u64, chunk_size);
    let frames: Vec<String> = split_chunks(&payload, chunk_size)
        .enumerate()
        .map(|(i, bytes)| {
            encode_event(&RelayEvent::ChunkForward {
                transfer_id: TransferId::from("t"),
                chunk_index: i as u32,
                chunk_bytes: bytes.to_vec(),
                is_last: i as u32 == total - 1,
            })
            .unwrap()
        })
        .collect();

    // Act: deliver in reverse order and store by index
    let mut slots: Vec<Option<Vec<u8>>> = vec![None; total as usize];
    for text in frames.iter().rev() {
        match decode_relay_event(text).unwrap() {
            RelayEvent::ChunkForward { chunk_index, chunk_bytes, .. } => {
                slots[chunk_index as usize] = Some(chunk_bytes);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    // Assert
    assert_eq!(assemble_chunks(slots.iter().flatten()), payload);
}
