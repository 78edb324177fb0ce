//! Camera and sd-card control over the drone's `lewei_cmd` service.
//!
//! [`Camera`] covers what the stock app's camera page does: sync the
//! clock, take photos, start and stop recording, and list, download,
//! replay or delete the videos on the sd card. Downloads and photos land
//! in the configured output directory under the drone-supplied basename;
//! replay captures get a `replay` prefix.

pub mod frame;
pub mod media;
mod transport;

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Error;
use frame::Payload;
pub use media::{Photo, VideoEntry};
use transport::Connection;

/// The drone's clock is hardwired to China Standard Time; timestamps sent
/// to it must be shifted by this much.
const CHINA_OFFSET_SECS: i64 = 8 * 60 * 60;

/// Recording state reported by `CHECK_VIDEO`.
const RECORDING: u32 = 1;

/// Where and how to reach the camera service.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// The drone's address.
    pub address: Ipv4Addr,
    /// Port for plain request/response commands (default 8060).
    pub control_port: u16,
    /// Port for replay, download and keep-alive (default 7060).
    pub stream_port: u16,
    /// Source address override; `None` picks the smallest host address on
    /// the drone subnet, falling back to OS-assigned.
    pub local: Option<Ipv4Addr>,
    /// Directory that photos, downloads and replay captures are written
    /// into.
    pub output_dir: PathBuf,
    /// Host UTC offset in seconds, captured once when the config is built
    /// and applied by [`Camera::set_clock`].
    pub utc_offset_secs: i64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            address: Ipv4Addr::new(192, 168, 0, 1),
            control_port: 8060,
            stream_port: 7060,
            local: None,
            output_dir: PathBuf::from("."),
            utc_offset_secs: chrono::Local::now().offset().local_minus_utc() as i64,
        }
    }
}

impl CameraConfig {
    /// Which port answers the given command.
    pub fn port_for(&self, cmd: u32) -> u16 {
        match cmd {
            frame::REPLAY_VIDEO | frame::DOWNLOAD_VIDEO | frame::KEEP_ALIVE => self.stream_port,
            _ => self.control_port,
        }
    }
}

/// Client for the camera service.
pub struct Camera {
    config: CameraConfig,
}

impl Camera {
    pub fn new() -> Self {
        Self::with_config(CameraConfig::default())
    }

    pub fn with_config(config: CameraConfig) -> Self {
        Self { config }
    }

    async fn action(&self, cmd: u32, payload: Payload<'_>) -> Result<Vec<u8>, Error> {
        transport::action(&self.config, cmd, payload).await
    }

    /// Set the drone's clock to the current time, so recordings carry real
    /// dates.
    pub async fn set_clock(&self) -> Result<(), Error> {
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before 1970")
            .as_secs() as i64;
        let shifted = (unix + self.config.utc_offset_secs - CHINA_OFFSET_SECS) as u32;
        self.action(frame::SET_CLOCK, Payload::Words(&[shifted, 0]))
            .await?;
        Ok(())
    }

    /// Take a photo and save it under its drone-side basename. Returns the
    /// written path.
    pub async fn take_photo(&self) -> Result<PathBuf, Error> {
        let payload = self.action(frame::TAKE_PHOTO, Payload::None).await?;
        let photo = media::parse_photo(&payload)?;
        let path = self.config.output_dir.join(basename(&photo.name));
        tokio::fs::write(&path, &photo.jpeg).await?;
        info!("saved photo {} ({} bytes)", path.display(), photo.jpeg.len());
        Ok(path)
    }

    /// List the videos on the sd card.
    pub async fn list_videos(&self) -> Result<Vec<VideoEntry>, Error> {
        let payload = self.action(frame::LIST_VIDEOS, Payload::None).await?;
        Ok(media::parse_video_list(&payload))
    }

    /// Delete a video by its listed name.
    pub async fn delete_video(&self, name: &str) -> Result<(), Error> {
        self.action(
            frame::DELETE_VIDEO,
            Payload::Bytes(&media::delete_request(name)),
        )
        .await?;
        Ok(())
    }

    /// Download a video into the output directory. Returns the written
    /// path.
    ///
    /// The partial file is left on disk when the transfer ends short; the
    /// returned error says so and callers should treat the file as
    /// invalid.
    pub async fn download_video(&self, name: &str) -> Result<PathBuf, Error> {
        let mut conn = Connection::open(&self.config, frame::DOWNLOAD_VIDEO).await?;
        conn.request(
            frame::DOWNLOAD_VIDEO,
            Payload::Bytes(&media::download_request(name)),
        )
        .await?;

        let path = self.config.output_dir.join(basename(name));
        let mut file: Option<tokio::fs::File> = None;
        let mut received: u64 = 0;

        loop {
            let (_, payload) = conn.read_response(frame::VIDEO_DOWNLOAD).await?;
            if payload.is_empty() {
                return Err(Error::Protocol("download stream closed early".into()));
            }
            let response = media::DownloadFrame::parse(&payload)?;
            if response.name != name {
                return Err(Error::FilenameMismatch {
                    requested: name.into(),
                    got: response.name,
                });
            }

            match response.kind {
                media::DOWNLOAD_START => {
                    debug!("downloading {name}, {} bytes", response.file_size);
                    file = Some(tokio::fs::File::create(&path).await?);
                }
                media::DOWNLOAD_CHUNK => {
                    let data = response.chunk()?;
                    let file = file
                        .as_mut()
                        .ok_or_else(|| Error::Protocol("chunk before start of download".into()))?;
                    file.write_all(data).await?;
                    received += data.len() as u64;
                }
                media::DOWNLOAD_END => {
                    debug!("checksum blob: {} bytes", response.checksum().len());
                    if let Some(mut file) = file.take() {
                        file.flush().await?;
                    }
                    if received == u64::from(response.file_size) {
                        info!("downloaded {} ({received} bytes)", path.display());
                        return Ok(path);
                    }
                    warn!(
                        "not whole file received: {received} of {} bytes",
                        response.file_size
                    );
                    return Err(Error::Protocol("not whole file received".into()));
                }
                other => {
                    return Err(Error::Protocol(format!("unknown download frame type {other}")));
                }
            }
        }
    }

    /// Stream a recorded video's raw picture data into `sink`.
    ///
    /// The drone paces the stream at its recording rate (about 20 frames
    /// per second); chunks arrive as they are sent. Runs until the drone
    /// signals the end of the recording.
    pub async fn replay_video<W>(&self, name: &str, sink: &mut W) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin,
    {
        let mut conn = Connection::open(&self.config, frame::REPLAY_VIDEO).await?;
        conn.request(
            frame::REPLAY_VIDEO,
            Payload::Bytes(&media::replay_request(name)),
        )
        .await?;

        loop {
            let (cmd, payload) = conn.read_response(frame::VIDEO_REPLAY).await?;
            if cmd == frame::VIDEO_REPLAY_END {
                debug!("replay end");
                return Ok(());
            }
            if payload.is_empty() {
                debug!("replay channel closed");
                return Ok(());
            }

            let chunk = media::ReplayChunk::parse(&payload)?;
            if chunk.chunk_size == 0 {
                debug!("replay end (empty chunk)");
                return Ok(());
            }
            if chunk.kind != media::CHUNK_DELTA && chunk.kind != media::CHUNK_KEY {
                return Err(Error::Protocol(format!(
                    "unknown replay chunk type {}",
                    chunk.kind
                )));
            }
            if chunk.marker == media::MARKER_SKIP {
                continue;
            }
            sink.write_all(chunk.data).await?;
        }
    }

    /// Replay a video into `replay<basename>` in the output directory.
    /// Returns the written path.
    pub async fn replay_to_file(&self, name: &str) -> Result<PathBuf, Error> {
        let file_name = format!("replay{}", basename(name).to_string_lossy());
        let path = self.config.output_dir.join(file_name);
        let mut file = tokio::fs::File::create(&path).await?;
        self.replay_video(name, &mut file).await?;
        file.flush().await?;
        info!("saved replay {}", path.display());
        Ok(path)
    }

    /// Record for `duration`, then stop.
    pub async fn capture_video(&self, duration: Duration) -> Result<(), Error> {
        self.start_video().await?;
        tokio::time::sleep(duration).await;
        self.stop_video().await
    }

    /// Start recording, unless already recording.
    pub async fn start_video(&self) -> Result<(), Error> {
        if self.is_capturing().await? {
            debug!("already recording");
            return Ok(());
        }
        self.action(frame::CAPTURE_VIDEO, Payload::Words(&[1, 0, 0, 0, 0]))
            .await?;
        Ok(())
    }

    /// Stop recording, unless already stopped.
    pub async fn stop_video(&self) -> Result<(), Error> {
        if !self.is_capturing().await? {
            debug!("not recording");
            return Ok(());
        }
        self.action(frame::CAPTURE_VIDEO, Payload::Words(&[0, 0, 0, 0, 0]))
            .await?;
        Ok(())
    }

    /// Whether the drone is recording right now.
    pub async fn is_capturing(&self) -> Result<bool, Error> {
        let payload = self.action(frame::CHECK_VIDEO, Payload::None).await?;
        if payload.len() < 4 {
            return Err(Error::ShortPayload(payload.len()));
        }
        Ok(media::read_u32(&payload, 0) == RECORDING)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

/// Final path component of a drone-supplied file name.
fn basename(name: &str) -> &std::ffi::OsStr {
    Path::new(name)
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new(name))
}
