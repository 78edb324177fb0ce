//! Payload layouts for the media operations.
//!
//! Everything here is pure parsing and building over byte buffers; the
//! state machines in [`super::Camera`] drive these against a connection.

use crate::error::Error;

/// Download frame types (first u32 of a `VIDEO_DOWNLOAD` payload).
pub const DOWNLOAD_START: u32 = 1;
pub const DOWNLOAD_CHUNK: u32 = 2;
pub const DOWNLOAD_END: u32 = 3;

/// Replay chunk types.
pub const CHUNK_DELTA: u32 = 0;
pub const CHUNK_KEY: u32 = 1;

/// Replay chunks whose 16-bit marker equals this carry no picture data.
pub const MARKER_SKIP: u16 = 0xff00;

/// One entry of the sd-card video listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEntry {
    pub name: String,
    pub duration_secs: u32,
}

/// Parse the `LIST_VIDEOS` response: 116-byte records until the buffer is
/// exhausted. A trailing partial record is ignored.
pub fn parse_video_list(payload: &[u8]) -> Vec<VideoEntry> {
    payload
        .chunks_exact(116)
        .map(|entry| VideoEntry {
            name: read_name(&entry[16..116]),
            duration_secs: read_u32(entry, 4),
        })
        .collect()
}

/// Decoded `TAKE_PHOTO` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub name: String,
    pub jpeg: Vec<u8>,
}

/// Parse the photo response: u32 size at 0, name at 12..112, image bytes
/// from 128.
pub fn parse_photo(payload: &[u8]) -> Result<Photo, Error> {
    if payload.len() < 128 {
        return Err(Error::ShortPayload(payload.len()));
    }
    let size = read_u32(payload, 0) as usize;
    let Some(jpeg) = payload.get(128..128 + size) else {
        return Err(Error::ShortPayload(payload.len()));
    };
    Ok(Photo {
        name: read_name(&payload[12..112]),
        jpeg: jpeg.to_vec(),
    })
}

/// One frame of a video download.
#[derive(Debug)]
pub struct DownloadFrame<'a> {
    pub kind: u32,
    pub chunk_size: u32,
    pub file_size: u32,
    pub name: String,
    payload: &'a [u8],
}

impl<'a> DownloadFrame<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self, Error> {
        if payload.len() < 116 {
            return Err(Error::ShortPayload(payload.len()));
        }
        Ok(Self {
            kind: read_u32(payload, 0),
            chunk_size: read_u32(payload, 4),
            file_size: read_u32(payload, 8),
            name: read_name(&payload[16..116]),
            payload,
        })
    }

    /// File data of a `DOWNLOAD_CHUNK` frame, `chunk_size` bytes from
    /// offset 196.
    pub fn chunk(&self) -> Result<&'a [u8], Error> {
        self.payload
            .get(196..196 + self.chunk_size as usize)
            .ok_or(Error::ShortPayload(self.payload.len()))
    }

    /// Trailing checksum blob of a `DOWNLOAD_END` frame.
    pub fn checksum(&self) -> &'a [u8] {
        &self.payload[116..]
    }
}

/// One frame of a replay stream.
#[derive(Debug)]
pub struct ReplayChunk<'a> {
    /// `CHUNK_KEY` roughly every two seconds, `CHUNK_DELTA` in between.
    pub kind: u32,
    pub chunk_size: u32,
    pub timing: u32,
    pub frame_seq: u16,
    pub marker: u16,
    /// Picture data, past the chunk's own 8-byte preamble.
    pub data: &'a [u8],
}

impl<'a> ReplayChunk<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self, Error> {
        if payload.len() < 16 {
            return Err(Error::ShortPayload(payload.len()));
        }
        let kind = read_u32(payload, 0);
        let chunk_size = read_u32(payload, 4);
        let timing = read_u32(payload, 12);

        // A zero-size chunk terminates the stream and has no content.
        if chunk_size == 0 {
            return Ok(Self {
                kind,
                chunk_size,
                timing,
                frame_seq: 0,
                marker: 0,
                data: &[],
            });
        }
        let Some(content) = payload.get(32..) else {
            return Err(Error::ShortPayload(payload.len()));
        };
        if content.len() < 8 {
            return Err(Error::ShortPayload(payload.len()));
        }
        Ok(Self {
            kind,
            chunk_size,
            timing,
            frame_seq: read_u16(content, 0),
            marker: read_u16(content, 2),
            data: &content[8..],
        })
    }
}

/// Build the 196-byte `DOWNLOAD_VIDEO` request, name at offset 16.
pub fn download_request(name: &str) -> Vec<u8> {
    let mut payload = vec![0u8; 196];
    write_name(&mut payload[16..116], name);
    payload
}

/// Build the 124-byte `REPLAY_VIDEO` request.
///
/// The word at offset 4 and the decorated name at offset 8 reproduce what
/// the stock app sends; the firmware rejects a bare filename here.
pub fn replay_request(name: &str) -> Vec<u8> {
    let mut payload = vec![0u8; 124];
    payload[4..8].copy_from_slice(&0x3au32.to_le_bytes());
    let decorated = format!("_lewei_lib_Lewei{name}\0ava_lang_String_2III");
    write_name(&mut payload[8..72], &decorated);
    payload
}

/// Build the 100-byte nul-padded `DELETE_VIDEO` request.
pub fn delete_request(name: &str) -> Vec<u8> {
    let mut payload = vec![0u8; 100];
    write_name(&mut payload, name);
    payload
}

pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

pub(crate) fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes(buf[at..at + 2].try_into().unwrap())
}

/// Nul-terminated, possibly nul-padded filename field.
fn read_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Copy `name` into a fixed field, truncating if it does not fit.
fn write_name(field: &mut [u8], name: &str) {
    let bytes = name.as_bytes();
    let len = bytes.len().min(field.len());
    field[..len].copy_from_slice(&bytes[..len]);
}
