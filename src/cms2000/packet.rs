use crate::cms2000::{reading::Reading, Error};

/// Largest chunk handed over by a single socket read.
pub const MAX_FRAME_SIZE: usize = 512;

// header bytes preceding the echoed serial / data payload in every response
const HEADER_LEN: usize = 9;
// bytes echoed back in the identify response
const SERIAL_LEN: usize = 10;
const TRAILER_LEN: usize = 2;

// Commands {{{
pub const RESET_A: [u8; 11] = [0xAA, 0xAA, 0x01, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x01, 0x59];
pub const RESET_B: [u8; 11] = [0xAA, 0xAA, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x55];
pub const ACK_1: [u8; 11] = [0xAA, 0xAA, 0x01, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x57];
pub const ACK_2: [u8; 11] = [0xAA, 0xAA, 0x01, 0x00, 0x00, 0x01, 0x01, 0x02, 0x00, 0x01, 0x59];

const IDENTIFY_HEADER: [u8; 9] = [0xAA, 0xAA, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01, 0x0B];
// }}}

// Response prefixes {{{
const IDENTIFY_PREFIX: [u8; 8] = [0xAA, 0xAA, 0x00, 0x00, 0x01, 0x00, 0x00, 0x80];
const ACK_1_PREFIX: [u8; 8] = [0xAA, 0xAA, 0x00, 0x01, 0x01, 0x00, 0x00, 0x81];
const ACK_2_PREFIX: [u8; 8] = [0xAA, 0xAA, 0x00, 0x01, 0x01, 0x00, 0x01, 0x80];
const DATA_PREFIX: [u8; 8] = [0xAA, 0xAA, 0x00, 0x01, 0x01, 0x00, 0x01, 0x82];
// }}}

/// A device response recognised inside a raw frame.
///
/// The borrowed slice starts at the recognised prefix, so header offsets are
/// relative to the message and not to the start of the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'a> {
    Identify(&'a [u8]),
    Ack1(&'a [u8]),
    Ack2(&'a [u8]),
    Data(&'a [u8]),
}

impl<'a> Response<'a> {
    /// Every known response found in `frame`, one per prefix.
    ///
    /// A single read can carry several messages. They come back in handshake
    /// order with the data response last, whatever their position in the read.
    pub fn scan(frame: &'a [u8]) -> Vec<Self> {
        let mut r = Vec::new();

        if let Some(msg) = Self::find(frame, &IDENTIFY_PREFIX) {
            r.push(Response::Identify(msg));
        }
        if let Some(msg) = Self::find(frame, &ACK_1_PREFIX) {
            r.push(Response::Ack1(msg));
        }
        if let Some(msg) = Self::find(frame, &ACK_2_PREFIX) {
            r.push(Response::Ack2(msg));
        }
        if let Some(msg) = Self::find(frame, &DATA_PREFIX) {
            r.push(Response::Data(msg));
        }

        r
    }

    fn find(frame: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
        frame
            .windows(prefix.len())
            .position(|w| w == prefix)
            .map(|pos| &frame[pos..])
    }

    pub fn name(&self) -> &'static str {
        match self {
            Response::Identify(_) => "identify",
            Response::Ack1(_) => "ack1",
            Response::Ack2(_) => "ack2",
            Response::Data(_) => "data",
        }
    }
}

/// Sums every byte and returns the low 16 bits big-endian.
pub fn checksum(input: &[u8]) -> [u8; 2] {
    input
        .iter()
        .fold(0u16, |sum, b| sum.wrapping_add(*b as u16))
        .to_be_bytes()
}

/// Compares the last two bytes of `message` against the checksum of the rest.
///
/// Only used for diagnostics; inbound frames are never rejected on this.
pub fn verify_trailer(message: &[u8]) -> bool {
    if message.len() < TRAILER_LEN {
        return false;
    }
    let (body, trailer) = message.split_at(message.len() - TRAILER_LEN);
    checksum(body) == trailer
}

/// Builds the reply to an identify response, echoing the device serial.
///
/// Returns `None` when the message is too short to carry the serial.
pub fn identify_reply(message: &[u8]) -> Option<Vec<u8>> {
    let serial = message.get(HEADER_LEN..HEADER_LEN + SERIAL_LEN)?;

    let mut r = Vec::with_capacity(IDENTIFY_HEADER.len() + SERIAL_LEN + 1 + TRAILER_LEN);
    r.extend_from_slice(&IDENTIFY_HEADER);
    r.extend_from_slice(serial);
    r.push(0x01);
    let sum = checksum(&r);
    r.extend_from_slice(&sum);

    Some(r)
}

/// Slices the telemetry payload out of a data response: everything after the
/// header up to, but excluding, the checksum trailer.
///
/// A message too short to hold header and trailer reports how many bytes
/// followed the header.
pub fn data_payload(message: &[u8]) -> Result<&[u8], Error> {
    if message.len() < HEADER_LEN + TRAILER_LEN {
        return Err(Error::MalformedPayload {
            len: message.len().saturating_sub(HEADER_LEN),
            expected: MIN_PAYLOAD_LEN,
        });
    }
    Ok(&message[HEADER_LEN..message.len() - TRAILER_LEN])
}

// Payload layout {{{
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Temp,
    EToday,
    ENow,
    ETotal,
    Vdc,
    Iac,
    Vac,
    Fac,
    Pac,
    Zac,
    HTotal,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldLayout {
    pub field: Field,
    pub offset: usize,
    pub width: usize,
    pub scale: f64,
}

const fn layout(field: Field, offset: usize, scale: f64) -> FieldLayout {
    FieldLayout {
        field,
        offset,
        width: 2,
        scale,
    }
}

// e_now and p_ac share a slice; the device reports the same register for both.
pub const PAYLOAD_LAYOUT: [FieldLayout; 11] = [
    layout(Field::Temp, 0, 10.0),
    layout(Field::EToday, 2, 100.0),
    layout(Field::Vdc, 4, 10.0),
    layout(Field::Iac, 6, 10.0),
    layout(Field::Vac, 8, 10.0),
    layout(Field::Fac, 10, 100.0),
    layout(Field::ENow, 12, 1.0),
    layout(Field::Pac, 12, 1.0),
    layout(Field::Zac, 14, 1.0),
    layout(Field::ETotal, 18, 10.0),
    layout(Field::HTotal, 20, 1.0),
];

/// Bytes a payload needs before every field in the layout can be read.
pub const MIN_PAYLOAD_LEN: usize = 22;

impl FieldLayout {
    pub fn read(&self, payload: &[u8]) -> Option<f64> {
        let bytes = payload.get(self.offset..self.offset + self.width)?;
        Some(be_uint(bytes) as i64 as f64 / self.scale)
    }
}

// big-endian unsigned integer of any width; wider than 8 bytes keeps the low 64 bits
fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

/// Turns a data payload into a [`Reading`] using [`PAYLOAD_LAYOUT`].
pub fn decode(payload: &[u8]) -> Result<Reading, Error> {
    if payload.len() < MIN_PAYLOAD_LEN {
        return Err(Error::MalformedPayload {
            len: payload.len(),
            expected: MIN_PAYLOAD_LEN,
        });
    }

    let mut r = Reading::default();
    for l in PAYLOAD_LAYOUT.iter() {
        let value = l.read(payload).ok_or(Error::MalformedPayload {
            len: payload.len(),
            expected: l.offset + l.width,
        })?;
        r.set(l.field, value);
    }

    Ok(r)
}
// }}}
