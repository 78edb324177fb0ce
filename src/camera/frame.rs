//! Codec for the `lewei_cmd` application frame.
//!
//! Every request and response starts with a 46-byte header: the ASCII tag
//! `lewei_cmd\0` followed by nine little-endian u32 slots. Slot 0 carries
//! the command code and slot 3 the payload length; the remaining slots have
//! no known meaning; we send zeros and preserve whatever the drone sends.

use crate::error::Error;

pub const HEADER_LEN: usize = 46;
pub const TAG: &[u8; 10] = b"lewei_cmd\0";

/// Header slot indexes.
pub const SLOT_CMD: usize = 0;
pub const SLOT_LEN: usize = 3;
const SLOT_COUNT: usize = 9;

// Command codes (slot 0). Requests unless noted.
pub const KEEP_ALIVE: u32 = 0x0001;
pub const SET_CLOCK: u32 = 0x0004;
pub const CHECK_VIDEO: u32 = 0x0006;
pub const LIST_VIDEOS: u32 = 0x0008;
pub const REPLAY_VIDEO: u32 = 0x0009;
/// Never observed as required; the drone tears streams down on its own.
pub const CLOSE_STREAM: u32 = 0x0010;
pub const CAPTURE_VIDEO: u32 = 0x0011;
pub const DOWNLOAD_VIDEO: u32 = 0x0012;
pub const TAKE_PHOTO: u32 = 0x0013;
pub const DELETE_VIDEO: u32 = 0x0014;
/// Response carrying one replay chunk.
pub const VIDEO_REPLAY: u32 = 0x0103;
/// Response closing a replay stream.
pub const VIDEO_REPLAY_END: u32 = 0x0105;
/// Response carrying one download frame.
pub const VIDEO_DOWNLOAD: u32 = 0x0106;

/// Data appended after the header.
///
/// The wire accepts raw bytes, little-endian u32 words, or plain text; the
/// variant records which, and [`LeweiFrame::append`] does the bookkeeping.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    None,
    Bytes(&'a [u8]),
    Words(&'a [u32]),
    Text(&'a str),
}

/// One `lewei_cmd` frame: header plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeweiFrame {
    header: [u8; HEADER_LEN],
    payload: Vec<u8>,
}

impl LeweiFrame {
    /// Fresh frame for the given command, all other slots zero.
    pub fn new(cmd: u32) -> Self {
        let mut header = [0u8; HEADER_LEN];
        header[..TAG.len()].copy_from_slice(TAG);
        let mut frame = Self {
            header,
            payload: Vec::new(),
        };
        frame.set_slot(SLOT_CMD, cmd);
        frame
    }

    /// Rebuild a frame from a received header; the payload is filled in by
    /// the transport as it drains the socket.
    pub fn from_header(header: &[u8]) -> Result<Self, Error> {
        if header.len() != HEADER_LEN || &header[..TAG.len()] != TAG {
            return Err(Error::BadHeaderTag);
        }
        let mut copy = [0u8; HEADER_LEN];
        copy.copy_from_slice(header);
        Ok(Self {
            header: copy,
            payload: Vec::new(),
        })
    }

    pub fn slot(&self, index: usize) -> u32 {
        assert!(index < SLOT_COUNT);
        let at = TAG.len() + index * 4;
        u32::from_le_bytes(self.header[at..at + 4].try_into().unwrap())
    }

    pub fn set_slot(&mut self, index: usize, value: u32) {
        assert!(index < SLOT_COUNT);
        let at = TAG.len() + index * 4;
        self.header[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn cmd(&self) -> u32 {
        self.slot(SLOT_CMD)
    }

    /// Declared payload length (slot 3).
    pub fn payload_len(&self) -> usize {
        self.slot(SLOT_LEN) as usize
    }

    /// Append data and grow slot 3 by its byte count.
    pub fn append(&mut self, payload: Payload<'_>) {
        let added = match payload {
            Payload::None => 0,
            Payload::Bytes(bytes) => {
                self.payload.extend_from_slice(bytes);
                bytes.len()
            }
            Payload::Words(words) => {
                for word in words {
                    self.payload.extend_from_slice(&word.to_le_bytes());
                }
                words.len() * 4
            }
            Payload::Text(text) => {
                self.payload.extend_from_slice(text.as_bytes());
                text.len()
            }
        };
        self.set_slot(SLOT_LEN, self.slot(SLOT_LEN) + added as u32);
    }

    pub fn header(&self) -> &[u8; HEADER_LEN] {
        &self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub(crate) fn set_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
    }
}

impl std::fmt::Display for LeweiFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lewei_cmd")?;
        for slot in 0..SLOT_COUNT {
            write!(f, " {:08x}", self.slot(slot))?;
        }
        Ok(())
    }
}
