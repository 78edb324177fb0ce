//! TCP plumbing for the camera protocol.
//!
//! Each operation dials its own connection: the stream port for replay,
//! download and keep-alive, the control port for everything else. The
//! drone closes sockets it has not heard from in 5-10 seconds, so every
//! connection gets a companion task writing keep-alive frames; their
//! echoes come back in-band and the response reader drops them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};

use super::frame::{LeweiFrame, Payload, HEADER_LEN, KEEP_ALIVE, VIDEO_REPLAY, VIDEO_REPLAY_END};
use super::CameraConfig;
use crate::error::Error;
use crate::net;

const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads give up when the drone has said nothing for this long.
const READ_DEADLINE: Duration = Duration::from_secs(10);

const KEEPALIVE_PERIOD: Duration = Duration::from_secs(2);

/// One dialed connection with its keep-alive companion.
pub(crate) struct Connection {
    reader: OwnedReadHalf,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    keepalive: JoinHandle<()>,
}

impl Connection {
    /// Dial the port responsible for `cmd` and start the keep-alive
    /// ticker.
    pub(crate) async fn open(config: &CameraConfig, cmd: u32) -> Result<Self, Error> {
        let remote = SocketAddr::from((config.address, config.port_for(cmd)));
        let local = config.local.or_else(net::local_ip);

        let stream = dial(remote, local).await?;
        stream.set_nodelay(true).ok();

        let (reader, writer) = stream.into_split();
        let writer = Arc::new(Mutex::new(writer));
        let keepalive = spawn_keepalive(Arc::clone(&writer));

        Ok(Self {
            reader,
            writer,
            keepalive,
        })
    }

    /// Send one request frame.
    pub(crate) async fn request(&self, cmd: u32, payload: Payload<'_>) -> Result<(), Error> {
        let mut frame = LeweiFrame::new(cmd);
        frame.append(payload);
        debug!("sending {frame}");
        let mut writer = self.writer.lock().await;
        write_frame(&mut writer, &frame).await?;
        Ok(())
    }

    /// Read one whole frame, however fragmented it arrives.
    async fn recv(&mut self) -> Result<LeweiFrame, Error> {
        let mut header = [0u8; HEADER_LEN];
        timeout(READ_DEADLINE, self.reader.read_exact(&mut header))
            .await
            .map_err(|_| Error::Timeout("response header"))??;

        let mut frame = LeweiFrame::from_header(&header)?;
        let len = frame.payload_len();
        if len > 0 {
            let mut payload = vec![0u8; len];
            timeout(READ_DEADLINE, self.reader.read_exact(&mut payload))
                .await
                .map_err(|_| Error::Timeout("response payload"))??;
            frame.set_payload(payload);
        }
        Ok(frame)
    }

    /// Read frames until one answers `expect`.
    ///
    /// Keep-alive echoes are discarded. A command code of zero is the
    /// drone's closed-channel sentinel and yields an empty payload. While
    /// expecting replay chunks, the end-of-replay frame is passed through
    /// rather than treated as a mismatch.
    pub(crate) async fn read_response(&mut self, expect: u32) -> Result<(u32, Vec<u8>), Error> {
        loop {
            let frame = self.recv().await?;
            match frame.cmd() {
                KEEP_ALIVE => {
                    debug!("dropping keep-alive echo");
                    continue;
                }
                0 => return Ok((0, Vec::new())),
                cmd if cmd == expect => return Ok((cmd, frame.into_payload())),
                VIDEO_REPLAY_END if expect == VIDEO_REPLAY => {
                    return Ok((VIDEO_REPLAY_END, frame.into_payload()))
                }
                got => {
                    return Err(Error::UnexpectedCommand {
                        expected: expect,
                        got,
                    })
                }
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.keepalive.abort();
    }
}

/// Dial, send, await the matching response, hang up.
///
/// The request/response commands with a single answer all go through here;
/// download and replay keep their connection and drive `read_response`
/// themselves.
pub(crate) async fn action(
    config: &CameraConfig,
    cmd: u32,
    payload: Payload<'_>,
) -> Result<Vec<u8>, Error> {
    let mut conn = Connection::open(config, cmd).await?;
    conn.request(cmd, payload).await?;
    let (_, data) = conn.read_response(cmd).await?;
    Ok(data)
}

/// Connect from the chosen source address, falling back to an OS-assigned
/// one when the bound dial fails.
async fn dial(remote: SocketAddr, local: Option<std::net::Ipv4Addr>) -> Result<TcpStream, Error> {
    if let Some(ip) = local {
        let attempt = async {
            let socket = TcpSocket::new_v4()?;
            socket.bind(SocketAddr::from((ip, 0)))?;
            socket.connect(remote).await
        };
        match timeout(DIAL_TIMEOUT, attempt).await {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(err)) => debug!("dial from {ip} failed ({err}), retrying unbound"),
            Err(_) => debug!("dial from {ip} timed out, retrying unbound"),
        }
    }
    match timeout(DIAL_TIMEOUT, TcpStream::connect(remote)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(err)) => Err(Error::ConnectionFailed(format!(
            "can't reach {remote}: {err} (is this the drone's wifi?)"
        ))),
        Err(_) => Err(Error::Timeout("dial")),
    }
}

async fn write_frame(writer: &mut OwnedWriteHalf, frame: &LeweiFrame) -> std::io::Result<()> {
    writer.write_all(frame.header()).await?;
    if !frame.payload().is_empty() {
        writer.write_all(frame.payload()).await?;
    }
    Ok(())
}

fn spawn_keepalive(writer: Arc<Mutex<OwnedWriteHalf>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(KEEPALIVE_PERIOD);
        ticker.tick().await; // the zeroth tick fires immediately
        loop {
            ticker.tick().await;
            let frame = LeweiFrame::new(KEEP_ALIVE);
            let mut writer = writer.lock().await;
            if let Err(err) = write_frame(&mut writer, &frame).await {
                debug!("keep-alive send failed: {err}");
                break;
            }
            debug!("keep-alive");
        }
    })
}
