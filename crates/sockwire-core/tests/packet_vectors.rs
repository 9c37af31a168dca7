//! Application packet vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use sockwire_core::protocol::packet::decode_packet;

use vector_loader::load;

#[test]
fn packet_vectors() {
    let files = [
        "packet_connect_v4.json",
        "packet_event_with_ack.json",
        "packet_event_nsp.json",
        "packet_ack_reply.json",
        "packet_disconnect.json",
        "packet_event_empty.json",
        "packet_event_bad_json.json",
        "packet_binary_event.json",
    ];

    for f in files {
        let v = load(f);
        let raw = v.frame.decode();
        let res = decode_packet(&raw);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.client_code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let packet = res.expect("expected ok packet");
        let ex = v.expect.expect("missing expect block");

        assert_eq!(packet.kind.as_str(), ex["kind"].as_str().unwrap(), "vector={}", v.description);
        assert_eq!(packet.nsp, ex["nsp"].as_str().unwrap(), "vector={}", v.description);
        assert_eq!(packet.id, ex["id"].as_u64(), "vector={}", v.description);

        let data = packet.data.clone().map(|d| d.into_value()).unwrap_or_default();
        assert_eq!(data, ex["data"], "vector={}", v.description);

        assert_eq!(packet.encode().unwrap().to_vec(), raw, "vector={}", v.description);
    }
}
