//! The zero-copy frame container exchanged by transports and engines.
//!
//! This module primarily implements the [`Packet`] buffer.

use thiserror::Error as ThisError;

/// Size in bytes of the encoded [`PacketHeader`].
pub const HEADER_SIZE: usize = 4;

/// The header version written by [`Packet::new`].
pub const PACKET_VERSION: u8 = 1;

/// The fixed header at the front of every packet's backing allocation.
///
/// The payload type is a transport-defined code; the core never interprets
/// it. `payload_len` always describes the payload actually present in the
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub version: u8,
    pub payload_type: u8,
    pub payload_len: u16,
}

impl PacketHeader {
    fn write_to(&self, buf: &mut [u8]) {
        buf[0] = self.version;
        buf[1] = self.payload_type;
        buf[2..4].copy_from_slice(&self.payload_len.to_be_bytes());
    }

    fn read_from(buf: &[u8]) -> Self {
        Self {
            version: buf[0],
            payload_type: buf[1],
            payload_len: u16::from_be_bytes([buf[2], buf[3]]),
        }
    }
}

/// A frame buffer with reserved head and tail margins.
///
/// When a transport reads a frame off the wire and knows it will hand it to
/// an engine that prepends an encapsulation header or appends a trailer, it
/// can reserve margin space up front so the engine reshapes the frame without
/// reallocating or copying the payload. The single backing allocation is laid
/// out as:
///
/// ```text
/// [header][head margin][payload][tail margin]
/// 0       4            payload  tail         data_size
/// ```
///
/// Exactly one component at a time is entitled to mutate a packet. A
/// component that wants to retain one past the call in which it received it
/// must [`copy_into`](Packet::copy_into) its own allocation.
#[derive(Debug, Clone)]
pub struct Packet {
    data: Box<[u8]>,
    payload_offset: usize,
    tail_offset: usize,
}

impl Packet {
    /// Creates a packet over a fresh `data_size`-byte allocation with
    /// `head_size` bytes of margin before the payload and `tail_size` bytes
    /// after it. The header is initialized with [`PACKET_VERSION`] and a zero
    /// payload length.
    pub fn new(data_size: usize, head_size: usize, tail_size: usize) -> Result<Self, PacketError> {
        if HEADER_SIZE + head_size + tail_size > data_size {
            return Err(PacketError::Layout {
                data_size,
                head_size,
                tail_size,
            });
        }
        let mut packet = Self {
            data: vec![0; data_size].into_boxed_slice(),
            payload_offset: HEADER_SIZE + head_size,
            tail_offset: data_size - tail_size,
        };
        packet.set_header(PacketHeader {
            version: PACKET_VERSION,
            payload_type: 0,
            payload_len: 0,
        });
        Ok(packet)
    }

    /// Creates a packet holding `payload`, sized exactly for the payload plus
    /// the requested margins. This is the shape a transport produces when
    /// reading off the wire, where the payload directly follows the header.
    pub fn from_payload(
        payload: &[u8],
        head_size: usize,
        tail_size: usize,
    ) -> Result<Self, PacketError> {
        let data_size = HEADER_SIZE + head_size + payload.len() + tail_size;
        let mut packet = Self::new(data_size, head_size, tail_size)?;
        packet.write_payload(payload)?;
        Ok(packet)
    }

    /// The total size of the backing allocation.
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Offset where the head margin starts, directly after the header.
    pub fn head_offset(&self) -> usize {
        HEADER_SIZE
    }

    /// Offset where the payload starts.
    pub fn payload_offset(&self) -> usize {
        self.payload_offset
    }

    /// Offset where the tail margin starts.
    pub fn tail_offset(&self) -> usize {
        self.tail_offset
    }

    /// Bytes of head margin still available for prepending.
    pub fn head_room(&self) -> usize {
        self.payload_offset - HEADER_SIZE
    }

    /// Bytes of tail margin still available for appending.
    pub fn tail_room(&self) -> usize {
        self.data.len() - self.tail_offset
    }

    pub fn header(&self) -> PacketHeader {
        PacketHeader::read_from(&self.data[..HEADER_SIZE])
    }

    pub fn set_header(&mut self, header: PacketHeader) {
        header.write_to(&mut self.data[..HEADER_SIZE]);
    }

    /// Sets the payload type code in the header without touching the rest.
    pub fn set_payload_type(&mut self, payload_type: u8) {
        let mut header = self.header();
        header.payload_type = payload_type;
        self.set_header(header);
    }

    /// The payload bytes currently present.
    pub fn payload(&self) -> &[u8] {
        let len = self.header().payload_len as usize;
        &self.data[self.payload_offset..self.payload_offset + len]
    }

    /// Mutable view of the payload bytes currently present.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let len = self.header().payload_len as usize;
        &mut self.data[self.payload_offset..self.payload_offset + len]
    }

    /// The payload region between the margins, regardless of how much of it
    /// is filled. Transports read into this and then call
    /// [`set_payload_len`](Packet::set_payload_len).
    pub fn payload_space_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.payload_offset..self.tail_offset]
    }

    /// Records how much of the payload region is actually in use.
    pub fn set_payload_len(&mut self, len: usize) -> Result<(), PacketError> {
        if len > self.tail_offset - self.payload_offset || len > u16::MAX as usize {
            return Err(PacketError::Length {
                len,
                capacity: self.tail_offset - self.payload_offset,
            });
        }
        let mut header = self.header();
        header.payload_len = len as u16;
        self.set_header(header);
        Ok(())
    }

    /// Replaces the payload, failing when it does not fit between the margins.
    pub fn write_payload(&mut self, payload: &[u8]) -> Result<(), PacketError> {
        self.set_payload_len(payload.len())?;
        self.data[self.payload_offset..self.payload_offset + payload.len()]
            .copy_from_slice(payload);
        Ok(())
    }

    /// Prepends `bytes` to the payload by consuming head margin. The payload
    /// itself is not moved.
    pub fn push_head(&mut self, bytes: &[u8]) -> Result<(), PacketError> {
        if bytes.len() > self.head_room() {
            return Err(PacketError::Margin {
                needed: bytes.len(),
                available: self.head_room(),
            });
        }
        let new_len = self.header().payload_len as usize + bytes.len();
        if new_len > u16::MAX as usize {
            return Err(PacketError::Length {
                len: new_len,
                capacity: u16::MAX as usize,
            });
        }
        let new_offset = self.payload_offset - bytes.len();
        self.data[new_offset..self.payload_offset].copy_from_slice(bytes);
        self.payload_offset = new_offset;
        let mut header = self.header();
        header.payload_len = new_len as u16;
        self.set_header(header);
        Ok(())
    }

    /// Appends `bytes` to the payload, consuming tail margin once the payload
    /// region is full.
    pub fn push_tail(&mut self, bytes: &[u8]) -> Result<(), PacketError> {
        let len = self.header().payload_len as usize;
        let end = self.payload_offset + len;
        if end + bytes.len() > self.data.len() {
            return Err(PacketError::Margin {
                needed: bytes.len(),
                available: self.data.len() - end,
            });
        }
        let new_len = len + bytes.len();
        if new_len > u16::MAX as usize {
            return Err(PacketError::Length {
                len: new_len,
                capacity: u16::MAX as usize,
            });
        }
        self.data[end..end + bytes.len()].copy_from_slice(bytes);
        // Keep payload_len <= tail_offset - payload_offset.
        if end + bytes.len() > self.tail_offset {
            self.tail_offset = end + bytes.len();
        }
        let mut header = self.header();
        header.payload_len = new_len as u16;
        self.set_header(header);
        Ok(())
    }

    /// Header start through tail-margin end, the span a preserving copy needs.
    pub fn used_span(&self) -> usize {
        self.data.len()
    }

    /// The raw backing allocation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Byte-for-byte copy of header, margins, and payload into `dst`,
    /// preserving this packet's margin sizes. `dst` keeps its allocation.
    pub fn copy_into(&self, dst: &mut Packet) -> Result<(), PacketError> {
        if dst.data_size() < self.used_span() {
            return Err(PacketError::Capacity {
                needed: self.used_span(),
                data_size: dst.data_size(),
            });
        }
        dst.data[..self.data.len()].copy_from_slice(&self.data);
        dst.payload_offset = self.payload_offset;
        dst.tail_offset = self.tail_offset;
        Ok(())
    }

    /// Copies header and payload only, placed at the start of `dst` with zero
    /// head margin and zero tail margin.
    pub fn compact_copy_into(&self, dst: &mut Packet) -> Result<(), PacketError> {
        let len = self.header().payload_len as usize;
        if dst.data_size() < HEADER_SIZE + len {
            return Err(PacketError::Capacity {
                needed: HEADER_SIZE + len,
                data_size: dst.data_size(),
            });
        }
        dst.data[..HEADER_SIZE].copy_from_slice(&self.data[..HEADER_SIZE]);
        dst.data[HEADER_SIZE..HEADER_SIZE + len]
            .copy_from_slice(&self.data[self.payload_offset..self.payload_offset + len]);
        dst.payload_offset = HEADER_SIZE;
        dst.tail_offset = HEADER_SIZE + len;
        Ok(())
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    #[error("margins do not fit: header + {head_size} + {tail_size} > {data_size}")]
    Layout {
        data_size: usize,
        head_size: usize,
        tail_size: usize,
    },
    #[error("payload length {len} exceeds payload region of {capacity} bytes")]
    Length { len: usize, capacity: usize },
    #[error("margin exhausted: needed {needed} bytes, {available} available")]
    Margin { needed: usize, available: usize },
    #[error("destination too small: needed {needed} bytes, data_size is {data_size}")]
    Capacity { needed: usize, data_size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_invariant() {
        let packet = Packet::new(1514, 14, 4).unwrap();
        assert!(packet.head_offset() <= packet.payload_offset());
        assert!(packet.payload_offset() <= packet.tail_offset());
        assert!(packet.tail_offset() <= packet.data_size());
        assert_eq!(packet.payload_offset() - packet.head_offset(), 14);
        assert!(packet.tail_offset() <= 1514 - 4);
    }

    #[test]
    fn layout_rejected() {
        assert!(matches!(
            Packet::new(16, 10, 10),
            Err(PacketError::Layout { .. })
        ));
    }

    #[test]
    fn zero_margins() {
        let mut packet = Packet::new(HEADER_SIZE + 8, 0, 0).unwrap();
        packet.write_payload(b"12345678").unwrap();
        assert_eq!(packet.payload(), b"12345678");
        assert_eq!(packet.head_room(), 0);
        assert_eq!(packet.tail_room(), 0);
    }

    #[test]
    fn from_payload_shape() {
        let packet = Packet::from_payload(b"frame", 4, 2).unwrap();
        assert_eq!(packet.payload(), b"frame");
        assert_eq!(packet.head_room(), 4);
        assert_eq!(packet.tail_room(), 2);
        assert_eq!(packet.header().version, PACKET_VERSION);
        assert_eq!(packet.header().payload_len, 5);
    }

    #[test]
    fn push_head_consumes_margin() {
        let mut packet = Packet::from_payload(b"payload", 4, 0).unwrap();
        packet.push_head(b"vlan").unwrap();
        assert_eq!(packet.payload(), b"vlanpayload");
        assert_eq!(packet.head_room(), 0);
        assert!(matches!(
            packet.push_head(b"x"),
            Err(PacketError::Margin { .. })
        ));
    }

    #[test]
    fn push_tail_consumes_margin() {
        let mut packet = Packet::from_payload(b"payload", 0, 4).unwrap();
        packet.push_tail(b"fcs!").unwrap();
        assert_eq!(packet.payload(), b"payloadfcs!");
        assert!(matches!(
            packet.push_tail(b"x"),
            Err(PacketError::Margin { .. })
        ));
    }

    #[test]
    fn payload_len_capped_at_header_field() {
        // Plenty of raw space, but the header's length field is a u16; a
        // push past 65535 payload bytes must fail cleanly, not wrap.
        let mut packet = Packet::new(70_000, 0, 0).unwrap();
        let body = vec![0xab; 65_000];
        packet.write_payload(&body).unwrap();

        let err = packet.push_tail(&[0xcd; 1_000]).unwrap_err();
        assert!(matches!(err, PacketError::Length { len: 66_000, .. }));
        assert_eq!(packet.header().payload_len, 65_000);
        assert_eq!(packet.payload().len(), 65_000);

        let mut packet = Packet::new(70_000, 1_000, 0).unwrap();
        packet.write_payload(&body).unwrap();
        let err = packet.push_head(&[0xcd; 1_000]).unwrap_err();
        assert!(matches!(err, PacketError::Length { len: 66_000, .. }));
        assert_eq!(packet.payload().len(), 65_000);
        assert_eq!(packet.head_room(), 1_000);
    }

    #[test]
    fn copy_preserves_margins() {
        let mut src = Packet::from_payload(b"data", 6, 2).unwrap();
        src.set_payload_type(7);
        let mut dst = Packet::new(src.data_size() + 16, 0, 0).unwrap();
        src.copy_into(&mut dst).unwrap();
        assert_eq!(dst.payload(), src.payload());
        assert_eq!(dst.header(), src.header());
        assert_eq!(dst.payload_offset(), src.payload_offset());
        assert_eq!(dst.tail_offset(), src.tail_offset());
        assert_eq!(&dst.as_bytes()[..src.used_span()], src.as_bytes());
    }

    #[test]
    fn compact_copy_drops_margins() {
        let mut src = Packet::from_payload(b"data", 6, 2).unwrap();
        src.set_payload_type(7);
        let mut dst = Packet::new(HEADER_SIZE + 4, 0, 0).unwrap();
        src.compact_copy_into(&mut dst).unwrap();
        assert_eq!(dst.payload(), b"data");
        assert_eq!(dst.header(), src.header());
        assert_eq!(dst.payload_offset(), HEADER_SIZE);
        assert_eq!(dst.head_room(), 0);
    }

    #[test]
    fn copy_checks_capacity() {
        let src = Packet::from_payload(b"data", 6, 2).unwrap();
        let mut small = Packet::new(HEADER_SIZE + 2, 0, 0).unwrap();
        assert!(matches!(
            src.copy_into(&mut small),
            Err(PacketError::Capacity { .. })
        ));
        assert!(matches!(
            src.compact_copy_into(&mut small),
            Err(PacketError::Capacity { .. })
        ));
    }
}
