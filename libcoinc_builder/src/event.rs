use super::constants::*;
use super::error::BankError;

/// Fixed 16-byte header preceding every stream record.
///
/// `unix_time` is the frontend wall-clock second; the physics timestamp
/// lives in the FPGA header bank, not here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventHeader {
    pub event_id: u16,
    pub trigger_mask: u16,
    pub serial: u32,
    pub unix_time: u32,
    pub data_size: u32,
}

impl EventHeader {
    /// Parse a header from its 16-byte wire image.
    pub fn from_bytes(bytes: &[u8; EVENT_HEADER_SIZE]) -> Self {
        EventHeader {
            event_id: u16::from_le_bytes([bytes[0], bytes[1]]),
            trigger_mask: u16::from_le_bytes([bytes[2], bytes[3]]),
            serial: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            unix_time: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            data_size: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        }
    }

    /// Serialize the header to its wire image.
    pub fn to_bytes(&self) -> [u8; EVENT_HEADER_SIZE] {
        let mut out = [0u8; EVENT_HEADER_SIZE];
        out[0..2].copy_from_slice(&self.event_id.to_le_bytes());
        out[2..4].copy_from_slice(&self.trigger_mask.to_le_bytes());
        out[4..8].copy_from_slice(&self.serial.to_le_bytes());
        out[8..12].copy_from_slice(&self.unix_time.to_le_bytes());
        out[12..16].copy_from_slice(&self.data_size.to_le_bytes());
        out
    }
}

/// One stream event: header plus its self-describing bank container.
///
/// The payload is owned; events move reader -> queue -> consumer without
/// sharing.
#[derive(Debug, Clone)]
pub struct Event {
    pub header: EventHeader,
    banks: Vec<u8>,
    pub flags: u32,
}

impl Event {
    /// Parse an event from a header and its `data_size` payload bytes.
    ///
    /// The container header is validated here; individual banks are only
    /// walked on access, so a damaged bank surfaces from [`Event::bank`].
    pub fn parse(header: EventHeader, payload: &[u8]) -> Result<Self, BankError> {
        if payload.len() < PAYLOAD_HEADER_SIZE {
            return Err(BankError::ContainerTooSmall(payload.len()));
        }
        let banks_size = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let flags = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
        let banks = &payload[PAYLOAD_HEADER_SIZE..];
        if banks_size as usize != banks.len() {
            return Err(BankError::ContainerSizeMismatch {
                written: banks_size,
                actual: banks.len(),
            });
        }
        Ok(Event {
            header,
            banks: banks.to_vec(),
            flags,
        })
    }

    /// Locate a bank by its 4-character tag.
    ///
    /// `Ok(None)` when the tag is absent (callers fall back to sentinels);
    /// `Err` when the container is malformed, which fails the whole event.
    pub fn bank(&self, tag: &[u8; 4]) -> Result<Option<Bank<'_>>, BankError> {
        let mut offset = 0usize;
        while offset < self.banks.len() {
            if offset + BANK_HEADER_SIZE > self.banks.len() {
                return Err(BankError::Truncated {
                    tag: tag_string(&self.banks[offset..]),
                });
            }
            let head = &self.banks[offset..offset + BANK_HEADER_SIZE];
            let bank_tag = [head[0], head[1], head[2], head[3]];
            let dtype = u16::from_le_bytes([head[4], head[5]]);
            let nwords = u16::from_le_bytes([head[6], head[7]]);
            let elem_size = match dtype {
                TYPE_U16 => 2,
                TYPE_U32 => 4,
                other => return Err(BankError::UnknownType(other)),
            };
            let data_len = nwords as usize * elem_size;
            let data_start = offset + BANK_HEADER_SIZE;
            if data_start + data_len > self.banks.len() {
                return Err(BankError::Truncated {
                    tag: tag_string(&bank_tag),
                });
            }
            if &bank_tag == tag {
                return Ok(Some(Bank {
                    tag: bank_tag,
                    dtype,
                    data: &self.banks[data_start..data_start + data_len],
                }));
            }
            offset = data_start + data_len;
        }
        Ok(None)
    }

    /// Re-serialize the event to its full wire image (header + payload).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(EVENT_HEADER_SIZE + PAYLOAD_HEADER_SIZE + self.banks.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&(self.banks.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.banks);
        out
    }
}

fn tag_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(&bytes[..bytes.len().min(4)]).into_owned()
}

/// A view of one bank inside an event payload.
#[derive(Debug, Clone, Copy)]
pub struct Bank<'a> {
    pub tag: [u8; 4],
    pub dtype: u16,
    data: &'a [u8],
}

impl<'a> Bank<'a> {
    /// Number of elements in the bank.
    pub fn len(&self) -> usize {
        match self.dtype {
            TYPE_U16 => self.data.len() / 2,
            _ => self.data.len() / 4,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode the bank as u16 elements.
    pub fn u16s(&self) -> Result<Vec<u16>, BankError> {
        if self.dtype != TYPE_U16 {
            return Err(BankError::WrongType {
                tag: tag_string(&self.tag),
                expected: TYPE_U16,
                found: self.dtype,
            });
        }
        Ok(self
            .data
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    /// Decode the bank as u32 elements.
    pub fn u32s(&self) -> Result<Vec<u32>, BankError> {
        if self.dtype != TYPE_U32 {
            return Err(BankError::WrongType {
                tag: tag_string(&self.tag),
                expected: TYPE_U32,
                found: self.dtype,
            });
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

/// Incrementally builds a bank container payload.
///
/// This is the writing half of the wire format, used by stream generators
/// and throughout the test suites.
#[derive(Debug, Default, Clone)]
pub struct PayloadBuilder {
    banks: Vec<u8>,
    flags: u32,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Append a bank of u16 elements.
    pub fn bank_u16(mut self, tag: &[u8; 4], words: &[u16]) -> Self {
        self.bank_header(tag, TYPE_U16, words.len() as u16);
        for w in words {
            self.banks.extend_from_slice(&w.to_le_bytes());
        }
        self
    }

    /// Append a bank of u32 elements.
    pub fn bank_u32(mut self, tag: &[u8; 4], words: &[u32]) -> Self {
        self.bank_header(tag, TYPE_U32, words.len() as u16);
        for w in words {
            self.banks.extend_from_slice(&w.to_le_bytes());
        }
        self
    }

    fn bank_header(&mut self, tag: &[u8; 4], dtype: u16, nwords: u16) {
        self.banks.extend_from_slice(tag);
        self.banks.extend_from_slice(&dtype.to_le_bytes());
        self.banks.extend_from_slice(&nwords.to_le_bytes());
    }

    /// Finish into raw payload bytes (container header + banks).
    pub fn into_payload(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAYLOAD_HEADER_SIZE + self.banks.len());
        out.extend_from_slice(&(self.banks.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.banks);
        out
    }

    /// Finish into a parsed [`Event`] with the given stream header fields.
    pub fn into_event(self, event_id: u16, serial: u32) -> Event {
        let payload = self.into_payload();
        let header = EventHeader {
            event_id,
            trigger_mask: 0,
            serial,
            unix_time: 0,
            data_size: payload.len() as u32,
        };
        Event::parse(header, &payload).expect("builder produced a malformed payload")
    }
}
