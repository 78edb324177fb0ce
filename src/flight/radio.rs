//! The 50 Hz transmitter task.
//!
//! The drone treats loss of the command stream as signal loss, so the loop
//! never stops on a failed send; errors are recorded and reported to the
//! registered observer while transmission continues. The cadence is the
//! protocol's only retry mechanism.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::command::CommandBuffer;

/// 50 frames per second.
pub(crate) const TICK: Duration = Duration::from_millis(20);

pub(crate) type ErrorObserver = Arc<dyn Fn(io::Error) + Send + Sync>;

/// Handle to a running transmitter. `halt` waits for the task to finish
/// its tick; merely dropping the handle stops it without waiting.
pub(crate) struct RadioHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RadioHandle {
    /// Stop the transmitter at its next tick boundary and release the
    /// socket.
    pub(crate) async fn halt(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawn the transmitter over an already-connected socket.
pub(crate) fn spawn(
    socket: UdpSocket,
    buffer: Arc<CommandBuffer>,
    observer: Arc<Mutex<Option<ErrorObserver>>>,
    last_error: Arc<Mutex<Option<io::Error>>>,
) -> RadioHandle {
    let (shutdown, mut stop) = watch::channel(false);

    let task = tokio::spawn(async move {
        info!("radio start");
        let mut ticker = interval(TICK);
        // A missed tick is a lost frame, not a backlog to drain.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let frame = buffer.snapshot();
                    if let Err(err) = socket.send(&frame).await {
                        report(err, &observer, &last_error);
                    }
                }
                _ = stop.changed() => break,
            }
        }
        info!("radio end");
        // Socket drops here, with the task.
    });

    RadioHandle { shutdown, task }
}

/// Record a send failure and hand it to the observer off the tick path, so
/// a slow callback cannot stall the frame cadence or pin the socket.
fn report(
    err: io::Error,
    observer: &Arc<Mutex<Option<ErrorObserver>>>,
    last_error: &Arc<Mutex<Option<io::Error>>>,
) {
    warn!("radio send failed: {err}");
    let callback = observer.lock().unwrap().clone();
    let copy = io::Error::new(err.kind(), err.to_string());
    *last_error.lock().unwrap() = Some(err);

    match callback {
        Some(cb) => {
            tokio::task::spawn_blocking(move || cb(copy));
        }
        None => debug!("no error observer registered"),
    }
}
