//! Engine framing vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use bytes::Bytes;

use sockwire_core::protocol::engine::decode_engine_packet;

use vector_loader::load;

#[test]
fn engine_vectors() {
    let files = [
        "engine_ping_probe.json",
        "engine_message_event.json",
        "engine_binary_payload.json",
        "engine_unknown_type.json",
        "engine_empty.json",
    ];

    for f in files {
        let v = load(f);
        let raw = v.frame.decode();
        let res = decode_engine_packet(Bytes::from(raw.clone()));

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.client_code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let packet = res.expect("expected ok packet");
        let ex = v.expect.expect("missing expect block");

        assert_eq!(packet.kind.as_str(), ex["kind"].as_str().unwrap(), "vector={}", v.description);
        assert_eq!(packet.data.len() as u64, ex["data_len"].as_u64().unwrap(), "vector={}", v.description);
        // framing is lossless
        assert_eq!(packet.encode().to_vec(), raw, "vector={}", v.description);
    }
}
