use lrpt::framing::{decode_framed_packets, DecodedFrame, Frame, VCDUHeader};
use lrpt::spacepacket::PrimaryHeader;

/// Builds a single CCSDS space packet (primary header + `data`).
fn build_packet(apid: u16, seq_id: u16, data: &[u8]) -> Vec<u8> {
    let d1 = apid & 0x7ff;
    let d2 = (0x3u16 << 14) | (seq_id & 0x3fff); // unsegmented
    let d3 = data.len() as u16 - 1;

    let mut packet = Vec::with_capacity(PrimaryHeader::LEN + data.len());
    packet.extend_from_slice(&d1.to_be_bytes());
    packet.extend_from_slice(&d2.to_be_bytes());
    packet.extend_from_slice(&d3.to_be_bytes());
    packet.extend_from_slice(data);
    packet
}

/// Wraps a VCDU header + MPDU (first-header-pointer + payload) into a
/// complete CADU-less frame, i.e., what a [`lrpt::framing::Decoder`] would
/// hand off after RS correction and parity removal.
fn build_frame(vcid: u16, counter: u32, first_header: u16, payload: &[u8]) -> Frame {
    let mut data = Vec::new();
    // version 0, scid 10, vcid as given: version(2) | scid(8) | vcid(6)
    let x: u16 = (10u16 << 6) | (vcid & 0x3f);
    data.extend_from_slice(&x.to_be_bytes());
    data.extend_from_slice(&counter.to_be_bytes()[1..]);
    data.push(0); // replay/cycle/cycle-count
    data.extend_from_slice(&first_header.to_be_bytes());
    data.extend_from_slice(payload);

    Frame::decode(data).expect("frame should decode")
}

fn decoded(frame: Frame) -> DecodedFrame {
    DecodedFrame {
        frame,
        missing: 0,
        integrity: None,
    }
}

#[test]
fn full_decode_across_frame_boundary() {
    // A packet whose body spans two VCDU frames, with the second frame's MPDU
    // carrying no header (0x7ff), matching the protocol's continuation rule.
    let packet = build_packet(100, 5, &(0u8..20).collect::<Vec<u8>>());
    assert_eq!(packet.len(), 26);

    let (first_half, second_half) = packet.split_at(15);

    let frames = vec![
        decoded(build_frame(7, 0, 0, first_half)),
        decoded(build_frame(7, 1, 0x7ff, second_half)),
    ];

    let packets: Vec<_> = decode_framed_packets(frames.into_iter(), 0, 0, &[]).collect();

    assert_eq!(packets.len(), 1);
    let decoded_packet = &packets[0];
    assert_eq!(decoded_packet.vcid, 7);
    assert_eq!(decoded_packet.scid, 10);
    assert_eq!(decoded_packet.packet.header.apid, 100);
    assert_eq!(decoded_packet.packet.header.sequence_id, 5);
    assert_eq!(decoded_packet.packet.data, packet);
}

#[test]
fn missing_frame_resets_tracker_and_drops_continuation() {
    let packet = build_packet(100, 1, &[0xAA; 20]);
    let (first_half, second_half) = packet.split_at(15);

    // Counter jump from 0 -> 5 implies 4 missing frames before this one.
    let gapped = build_frame(7, 5, 0x7ff, second_half);

    let frames = vec![
        decoded(build_frame(7, 0, 0, first_half)),
        DecodedFrame {
            frame: gapped,
            missing: 4,
            integrity: None,
        },
    ];

    let packets: Vec<_> = decode_framed_packets(frames.into_iter(), 0, 0, &[]).collect();
    assert!(
        packets.is_empty(),
        "continuation after a frame gap should be dropped, not stitched into a corrupt packet"
    );
}

#[test]
fn fill_frames_never_produce_packets() {
    let fill = build_frame(VCDUHeader::FILL, 0, 0, &[0xff; 20]);
    assert!(fill.is_fill());

    let packets: Vec<_> =
        decode_framed_packets(vec![decoded(fill)].into_iter(), 0, 0, &[]).collect();
    assert!(packets.is_empty());
}
