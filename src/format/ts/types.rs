use bytes::{BufMut, BytesMut};

/// Size of one transport packet.
pub const TS_PACKET_SIZE: usize = 188;
/// Size of the fixed packet header.
pub const TS_HEADER_SIZE: usize = 4;
/// First byte of every packet.
pub const TS_SYNC_BYTE: u8 = 0x47;

/// Per-packet prefix written by BluRay style recording containers (M2TS).
pub const M2TS_PREFIX_SIZE: usize = 4;

/// Number of distinct PIDs.
pub const MAX_PIDS: usize = 8192;
/// PID bits of a route identifier.
pub const PID_MASK: u32 = (MAX_PIDS - 1) as u32;
/// Stuffing PID.
pub const PID_NULL: u16 = 0x1fff;

// Route identifier flags, above the PID bits

/// Forward only packets whose priority bit matches the route.
pub const SELECT_ON_PRIORITY: u32 = 0x0000_8000;
/// Wanted priority is high.
pub const PRIORITY_HIGH: u32 = 0x0000_4000;
/// Wanted priority is low.
pub const PRIORITY_LOW: u32 = 0x0000_0000;

/// Discontinuity indicator in the adaptation field flags byte.
pub const ADAPTATION_DISCONTINUITY: u8 = 0x80;

/// Continuity counters wrap at 16.
pub const CONTINUITY_MODULUS: u8 = 16;

/// Decoded 4 byte transport packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TSHeader {
    /// Always 0x47 in a valid packet
    pub sync_byte: u8,
    /// Set by the demodulator on uncorrectable errors
    pub transport_error: bool,
    /// A PES packet or section starts in this payload
    pub payload_unit_start: bool,
    /// Transport priority bit
    pub transport_priority: bool,
    /// 13 bit packet identifier
    pub pid: u16,
    /// Two scrambling control bits
    pub scrambling_control: u8,
    /// An adaptation field follows the header
    pub adaptation_field_exists: bool,
    /// The packet carries payload
    pub contains_payload: bool,
    /// 4 bit continuity counter
    pub continuity_counter: u8,
}

impl Default for TSHeader {
    fn default() -> Self {
        Self {
            sync_byte: TS_SYNC_BYTE,
            transport_error: false,
            payload_unit_start: false,
            transport_priority: false,
            pid: 0,
            scrambling_control: 0,
            adaptation_field_exists: false,
            contains_payload: true,
            continuity_counter: 0,
        }
    }
}

impl TSHeader {
    /// Sync byte present and no transport error flagged. Other fields are
    /// meaningless when this is false.
    pub fn is_valid(&self) -> bool {
        self.sync_byte == TS_SYNC_BYTE && !self.transport_error
    }

    /// Appends the encoded 4 byte header to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.sync_byte);

        let mut b1 = 0u8;
        if self.transport_error {
            b1 |= 0x80;
        }
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        if self.transport_priority {
            b1 |= 0x20;
        }
        b1 |= ((self.pid >> 8) & 0x1f) as u8;
        buf.put_u8(b1);

        buf.put_u8((self.pid & 0xff) as u8);

        let mut b3 = (self.scrambling_control & 0x03) << 6;
        if self.adaptation_field_exists {
            b3 |= 0x20;
        }
        if self.contains_payload {
            b3 |= 0x10;
        }
        b3 |= self.continuity_counter & 0x0f;
        buf.put_u8(b3);
    }
}

/// What the demultiplexor needs from an adaptation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdaptationField {
    /// Value of the length byte, excluding the byte itself
    pub length: usize,
    /// Discontinuity indicator flag
    pub discontinuity: bool,
}

/// Priority selection carried in the upper bits of a route identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrioritySelection {
    /// Filter on the priority bit at all
    pub select_on_priority: bool,
    /// Priority bit value to forward
    pub desired_priority: bool,
}

impl PrioritySelection {
    /// Reads the flags above the PID bits of a route identifier.
    pub fn from_route_bits(id: u32) -> Self {
        Self {
            select_on_priority: id & SELECT_ON_PRIORITY != 0,
            desired_priority: id & PRIORITY_HIGH != 0,
        }
    }

    /// Whether a packet with the given priority bit should be forwarded.
    pub fn admits(&self, priority: bool) -> bool {
        !self.select_on_priority || priority == self.desired_priority
    }
}

/// PID table index for a route identifier.
pub fn pid_index(id: u32) -> usize {
    (id & PID_MASK) as usize
}
