use super::types::*;

/// Decodes a packet header. Never fails: a bad sync byte or a set transport error
/// flag shows up as `is_valid() == false`.
pub fn parse_header(data: [u8; TS_HEADER_SIZE]) -> TSHeader {
    TSHeader {
        sync_byte: data[0],
        transport_error: (data[1] & 0x80) != 0,
        payload_unit_start: (data[1] & 0x40) != 0,
        transport_priority: (data[1] & 0x20) != 0,
        pid: (((data[1] & 0x1F) as u16) << 8) | data[2] as u16,
        scrambling_control: (data[3] >> 6) & 0x03,
        adaptation_field_exists: (data[3] & 0x20) != 0,
        contains_payload: (data[3] & 0x10) != 0,
        continuity_counter: data[3] & 0x0F,
    }
}

/// Decodes the start of one whole packet's header.
pub fn parse_packet_header(packet: &[u8]) -> Option<TSHeader> {
    match packet {
        [a, b, c, d, ..] => Some(parse_header([*a, *b, *c, *d])),
        _ => None,
    }
}

/// Reads the adaptation field length and discontinuity indicator of a packet
/// whose header announces an adaptation field.
///
/// The flags byte is only consulted when the field is non-empty.
pub fn parse_adaptation_field(packet: &[u8]) -> Option<AdaptationField> {
    let length = *packet.get(TS_HEADER_SIZE)? as usize;
    let discontinuity = length > 0
        && packet
            .get(TS_HEADER_SIZE + 1)
            .map_or(false, |flags| flags & ADAPTATION_DISCONTINUITY != 0);

    Some(AdaptationField {
        length,
        discontinuity,
    })
}

/// Offset of the payload within the packet. May point past the end of the packet
/// when the adaptation field claims more room than there is.
pub fn payload_offset(adaptation: Option<&AdaptationField>) -> usize {
    TS_HEADER_SIZE + adaptation.map_or(0, |field| field.length + 1)
}
