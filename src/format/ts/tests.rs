use super::types::*;
use super::*;
use crate::av::{InjectBuffer, InputBuffer, InputDescriptor, ManualClock, RouteId, StreamHandle};
use crate::config::DemuxConfig;
use crate::error::DemuxError;
use crate::format::testing::RecordingPlayer;
use crate::format::{DemultiplexorContext, DemuxStatistics, MAX_ROUTES};
use bytes::{BufMut, BytesMut};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const PID: u16 = 0x20;
const STREAM: StreamHandle = StreamHandle(1);

struct Fixture {
    player: Arc<RecordingPlayer>,
    clock: Arc<ManualClock>,
    context: TsDemuxContext,
}

fn fixture() -> Fixture {
    let player = Arc::new(RecordingPlayer::new());
    let clock = Arc::new(ManualClock::new());
    let context = TsDemultiplexor::with_config(player.clone(), DemuxConfig::default())
        .with_clock(clock.clone())
        .create_ts_context();
    Fixture {
        player,
        clock,
        context,
    }
}

/// Builds one 188 byte packet; the payload is filled with the continuity counter.
fn packet_with(header: TSHeader, adaptation: Option<AdaptationField>) -> BytesMut {
    let mut buf = BytesMut::with_capacity(TS_PACKET_SIZE);
    header.write_to(&mut buf);
    if let Some(field) = adaptation {
        buf.put_u8(field.length as u8);
        if field.length > 0 {
            buf.put_u8(if field.discontinuity {
                ADAPTATION_DISCONTINUITY
            } else {
                0
            });
            buf.put_bytes(0xff, field.length - 1);
        }
    }
    let fill = header.continuity_counter;
    buf.put_bytes(fill, TS_PACKET_SIZE - buf.len());
    buf
}

fn packet(pid: u16, cc: u8) -> BytesMut {
    packet_with(
        TSHeader {
            pid,
            continuity_counter: cc,
            ..Default::default()
        },
        None,
    )
}

fn stream_of(packets: impl IntoIterator<Item = BytesMut>) -> InjectBuffer {
    let mut data = BytesMut::new();
    for p in packets {
        data.extend_from_slice(&p);
    }
    InjectBuffer::new(data.freeze())
}

fn counters(pid: u16, ccs: &[u8]) -> InjectBuffer {
    stream_of(ccs.iter().map(|&cc| packet(pid, cc)))
}

#[test]
fn test_two_packets_end_to_end() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    f.context.demux(&counters(PID, &[0, 1])).unwrap();

    let fragments = f.player.collator(STREAM).fragments();
    assert_eq!(fragments.len(), 2);
    assert!(fragments.iter().all(|fragment| fragment.len() == 184));
    assert_eq!(fragments[0][0], 0);
    assert_eq!(fragments[1][0], 1);
    assert_eq!(f.context.expected_continuity(RouteId(PID as u32)), Some(2));
    assert_eq!(f.context.layout(), PacketLayout::PLAIN);
}

#[test]
fn test_monotonic_sequence_never_glitches() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    let ccs: Vec<u8> = (0..40).map(|i| (i + 7) % 16).collect();
    f.context.demux(&counters(PID, &ccs)).unwrap();

    assert!(f.player.glitches().is_empty());
    assert_eq!(f.player.collator(STREAM).count(), 40);
    assert_eq!(f.context.statistics().discontinuities, 0);
}

#[test]
fn test_single_drop_reports_one_glitch() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    f.context.demux(&counters(PID, &[14, 0, 1])).unwrap();

    assert_eq!(f.player.glitches(), vec![STREAM]);
    // The packet after the gap is still delivered
    assert_eq!(f.player.collator(STREAM).count(), 3);
    assert_eq!(f.context.expected_continuity(RouteId(PID as u32)), Some(2));
}

#[test]
fn test_duplicate_suppressed() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    f.context.demux(&counters(PID, &[5, 5])).unwrap();

    assert!(f.player.glitches().is_empty());
    assert_eq!(f.player.collator(STREAM).count(), 1);
    assert_eq!(f.context.expected_continuity(RouteId(PID as u32)), Some(6));
    assert_eq!(f.context.statistics().duplicates, 1);
}

#[test]
fn test_glitch_reports_are_rate_limited() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    f.context.demux(&counters(PID, &[0, 3])).unwrap();
    f.clock.advance(Duration::from_millis(1999));
    f.context.demux(&counters(PID, &[9])).unwrap();
    assert_eq!(f.player.glitches().len(), 1);
    assert_eq!(f.context.statistics().discontinuities, 2);

    f.clock.advance(Duration::from_millis(1));
    f.context.demux(&counters(PID, &[2])).unwrap();
    assert_eq!(f.player.glitches().len(), 2);
}

#[test]
fn test_rate_limit_is_per_route() {
    let f = fixture();
    let other = StreamHandle(2);
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();
    f.context.add_stream(other, RouteId(0x21)).unwrap();

    f.context
        .demux(&stream_of([
            packet(PID, 0),
            packet(0x21, 0),
            packet(PID, 4),
            packet(0x21, 4),
        ]))
        .unwrap();

    assert_eq!(f.player.glitches(), vec![STREAM, other]);
}

#[test]
fn test_unmapped_pid_never_forwarded() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    f.context
        .demux(&stream_of([packet(0x99, 0), packet(PID_NULL, 0), packet(0x99, 1)]))
        .unwrap();

    assert_eq!(f.player.collator(STREAM).count(), 0);
    assert_eq!(f.context.statistics().unmapped, 3);
}

#[test]
fn test_priority_filter() {
    let f = fixture();
    let id = RouteId(PID as u32 | SELECT_ON_PRIORITY | PRIORITY_HIGH);
    f.context.add_stream(STREAM, id).unwrap();

    let low = packet_with(
        TSHeader {
            pid: PID,
            continuity_counter: 0,
            transport_priority: false,
            ..Default::default()
        },
        None,
    );
    let high = packet_with(
        TSHeader {
            pid: PID,
            continuity_counter: 1,
            transport_priority: true,
            ..Default::default()
        },
        None,
    );
    f.context.demux(&stream_of([low, high])).unwrap();

    let fragments = f.player.collator(STREAM).fragments();
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0][0], 1);
    // The filtered packet still advanced the counter
    assert_eq!(f.context.expected_continuity(id), Some(2));
    assert!(f.player.glitches().is_empty());
}

#[test]
fn test_fifth_route_rejected() {
    let f = fixture();
    for n in 0..MAX_ROUTES as u32 {
        f.context
            .add_stream(StreamHandle(n as u64 + 1), RouteId(0x100 + n))
            .unwrap();
    }

    let err = f
        .context
        .add_stream(StreamHandle(99), RouteId(0x200))
        .unwrap_err();
    assert_eq!(err, DemuxError::TooManyRoutes { capacity: 4 });
    assert_eq!(f.context.route_count(), MAX_ROUTES);
    assert_eq!(f.context.slot_for_pid(0x200), None);

    f.context
        .demux(&stream_of((0..4u16).map(|n| packet(0x100 + n, 0))))
        .unwrap();
    for n in 0..4u64 {
        assert_eq!(f.player.collator(StreamHandle(n + 1)).count(), 1);
    }
}

#[test]
fn test_fan_in_detach() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(0x20)).unwrap();
    f.context.add_stream(STREAM, RouteId(0x21)).unwrap();

    f.context.demux(&stream_of([packet(0x20, 0), packet(0x21, 0)])).unwrap();
    assert_eq!(f.player.collator(STREAM).count(), 2);

    f.context.remove_stream(RouteId(0x20)).unwrap();
    assert!(f.player.detachments().is_empty());

    f.context.remove_stream(RouteId(0x21)).unwrap();
    assert_eq!(f.player.detachments(), vec![STREAM]);
}

#[test]
fn test_removed_route_stops_receiving() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();
    f.context.remove_stream(RouteId(PID as u32)).unwrap();

    f.context.demux(&counters(PID, &[0, 1])).unwrap();
    assert_eq!(f.player.collator(STREAM).count(), 0);
}

#[test]
fn test_m2ts_buffer() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    let mut data = BytesMut::new();
    for cc in [0, 1] {
        data.put_u32(0x0000_1234); // arrival timestamp prefix
        data.extend_from_slice(&packet(PID, cc));
    }
    assert_eq!(data.len(), 384);
    f.context.demux(&InjectBuffer::new(data.freeze())).unwrap();

    assert_eq!(f.context.layout(), PacketLayout::M2TS);
    let fragments = f.player.collator(STREAM).fragments();
    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments[1].len(), 184);
    assert!(fragments[1].iter().all(|&b| b == 1));
}

#[test]
fn test_framing_error_processes_nothing() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    let mut data = BytesMut::from(&packet(PID, 0)[..]);
    data.put_u16(0);
    let err = f
        .context
        .demux(&InjectBuffer::new(data.freeze()))
        .unwrap_err();

    assert_eq!(
        err,
        DemuxError::Framing {
            length: 190,
            stride: 188
        }
    );
    assert_eq!(f.context.statistics(), DemuxStatistics::default());
    assert_eq!(f.player.collator(STREAM).count(), 0);
}

#[test]
fn test_missing_descriptor() {
    let f = fixture();
    let buffer = counters(PID, &[0]).without_descriptor();
    assert_eq!(
        f.context.demux(&buffer).unwrap_err(),
        DemuxError::MetadataUnavailable
    );
}

struct DetachedBuffer(InputDescriptor);

impl InputBuffer for DetachedBuffer {
    fn descriptor(&self) -> Option<&InputDescriptor> {
        Some(&self.0)
    }

    fn data(&self) -> Option<&[u8]> {
        None
    }
}

#[test]
fn test_missing_data() {
    let f = fixture();
    let buffer = DetachedBuffer(InputDescriptor::new(crate::av::MuxType::TransportStream));
    assert_eq!(
        f.context.demux(&buffer).unwrap_err(),
        DemuxError::DataUnavailable
    );
}

#[test]
fn test_invalid_headers_skipped() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    let mut bad_sync = packet(PID, 1);
    bad_sync[0] = 0x48;
    let errored = packet_with(
        TSHeader {
            pid: PID,
            continuity_counter: 1,
            transport_error: true,
            ..Default::default()
        },
        None,
    );

    f.context
        .demux(&stream_of([packet(PID, 0), bad_sync, errored, packet(PID, 1)]))
        .unwrap();

    assert_eq!(f.player.collator(STREAM).count(), 2);
    assert!(f.player.glitches().is_empty());
    assert_eq!(f.context.statistics().invalid, 2);
}

#[test]
fn test_adaptation_field_skipped() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    let with_field = packet_with(
        TSHeader {
            pid: PID,
            adaptation_field_exists: true,
            ..Default::default()
        },
        Some(AdaptationField {
            length: 10,
            discontinuity: false,
        }),
    );
    // Adaptation field only, filling the packet
    let stuffing = packet_with(
        TSHeader {
            pid: PID,
            adaptation_field_exists: true,
            contains_payload: false,
            continuity_counter: 1,
            ..Default::default()
        },
        Some(AdaptationField {
            length: 183,
            discontinuity: false,
        }),
    );
    f.context.demux(&stream_of([with_field, stuffing])).unwrap();

    let fragments = f.player.collator(STREAM).fragments();
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].len(), TS_PACKET_SIZE - TS_HEADER_SIZE - 11);
}

#[test]
fn test_oversized_adaptation_field_forwards_nothing() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    let mut broken = packet_with(
        TSHeader {
            pid: PID,
            adaptation_field_exists: true,
            ..Default::default()
        },
        Some(AdaptationField {
            length: 150,
            discontinuity: false,
        }),
    );
    broken[4] = 200;
    f.context.demux(&stream_of([broken])).unwrap();

    assert_eq!(f.player.collator(STREAM).count(), 0);
    assert_eq!(f.context.expected_continuity(RouteId(PID as u32)), Some(1));
}

#[test]
fn test_discontinuity_indicator_suppresses_next_glitch() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    let splice = packet_with(
        TSHeader {
            pid: PID,
            adaptation_field_exists: true,
            continuity_counter: 1,
            ..Default::default()
        },
        Some(AdaptationField {
            length: 1,
            discontinuity: true,
        }),
    );
    f.context
        .demux(&stream_of([packet(PID, 0), splice, packet(PID, 9), packet(PID, 10)]))
        .unwrap();

    assert!(f.player.glitches().is_empty());
    assert_eq!(f.player.collator(STREAM).count(), 4);
    assert_eq!(f.context.expected_continuity(RouteId(PID as u32)), Some(11));
}

#[test]
fn test_input_jump_resets_tracking() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();
    f.context.demux(&counters(PID, &[0, 1])).unwrap();

    f.context.input_jump();
    assert_eq!(f.context.expected_continuity(RouteId(PID as u32)), None);

    f.context.demux(&counters(PID, &[12, 13])).unwrap();
    assert!(f.player.glitches().is_empty());
    assert_eq!(f.player.collator(STREAM).count(), 4);
}

#[test]
fn test_switch_stream_moves_to_new_collator() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();
    f.context.demux(&counters(PID, &[0])).unwrap();
    let old = f.player.collator(STREAM);

    let new = f.player.replace_collator(STREAM);
    f.context.switch_stream(STREAM).unwrap();
    f.context.demux(&counters(PID, &[1])).unwrap();

    assert_eq!(old.count(), 1);
    assert_eq!(new.count(), 1);
    // Sequence state survives the switch
    assert!(f.player.glitches().is_empty());
}

#[test]
fn test_collator_failure_does_not_stop_others() {
    let f = fixture();
    let other = StreamHandle(2);
    f.context.add_stream(STREAM, RouteId(0x20)).unwrap();
    f.context.add_stream(other, RouteId(0x21)).unwrap();
    f.player.collator(STREAM).set_failing(true);

    f.context
        .demux(&stream_of([packet(0x20, 0), packet(0x21, 0), packet(0x20, 1)]))
        .unwrap();

    assert_eq!(f.player.collator(other).count(), 1);
    let stats = f.context.statistics();
    assert_eq!(stats.collator_failures, 2);
    assert_eq!(stats.forwarded, 1);
    assert_eq!(f.context.expected_continuity(RouteId(0x20)), Some(2));
}

#[test]
fn test_new_route_triggers_reclassification() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    // 48 plain packets: a length that also fits 47 prefixed packets
    let ccs: Vec<u8> = (0..48).map(|i| i % 16).collect();
    f.context.demux(&counters(PID, &ccs)).unwrap();
    assert_eq!(f.context.layout(), PacketLayout::PLAIN);
    assert_eq!(f.player.collator(STREAM).count(), 48);

    // Same length, prefixed packets: kept as plain until a route is added
    let mut prefixed = BytesMut::new();
    for cc in 0..47u8 {
        prefixed.put_u32(0);
        prefixed.extend_from_slice(&packet(0x30, cc % 16));
    }
    let prefixed = InjectBuffer::new(prefixed.freeze());
    assert_eq!(prefixed.len(), 9024);

    f.context.add_stream(StreamHandle(2), RouteId(0x30)).unwrap();
    f.context.demux(&prefixed).unwrap();
    assert_eq!(f.context.layout(), PacketLayout::M2TS);
    assert_eq!(f.player.collator(StreamHandle(2)).count(), 47);
}

#[test]
fn test_descriptor_timing_reaches_collator() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();

    let buffer = counters(PID, &[0, 1])
        .with_playback_time(90_000)
        .with_decode_time(87_000);
    f.context.demux(&buffer).unwrap();

    let descriptors = f.player.collator(STREAM).descriptors();
    assert_eq!(descriptors.len(), 2);
    for descriptor in descriptors {
        assert_eq!(descriptor.mux_type, crate::av::MuxType::TransportStream);
        assert_eq!(descriptor.playback_time, Some(90_000));
        assert_eq!(descriptor.decode_time, Some(87_000));
    }
}

#[test]
fn test_empty_buffer() {
    let f = fixture();
    f.context.add_stream(STREAM, RouteId(PID as u32)).unwrap();
    f.context.demux(&InjectBuffer::new(Vec::<u8>::new())).unwrap();
    assert_eq!(f.context.statistics().packets, 0);
}
