//! Remote controller for the Visuo XS809* family.
//!
//! [`Driver`] plays the handheld transmitter: it keeps an 8-byte command
//! datagram streaming to the drone at 50 Hz over UDP and mutates that
//! datagram in response to calls.
//!
//! - `start` / `halt` turn the transmitter on and off
//! - `calibrate` levels the gyro before flight, `compass_on` / `compass_off`
//!   toggle headless mode
//! - `take_off` / `land` get the drone in the air and back down
//! - `sticks` and `hover` fly it; `flip` arms a flip; `stop` is the
//!   emergency kill
//! - the `go_*` helpers hold one axis for half a second and re-center,
//!   the `do_*_flip` helpers combine that with the flip flag
//!
//! `halt` is not `land`: halting mid-air leaves the drone without a signal.
//! `hover` re-centers the sticks but inertia and wind still move the
//! aircraft, and `stop` cuts the motors outright, so the drone falls.

mod command;
pub mod frame;
mod radio;

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;
use tokio::net::UdpSocket;
use tokio::time::sleep;

use crate::error::Error;
pub use command::CommandBuffer;
pub use frame::Flags;
use radio::{ErrorObserver, RadioHandle};

/// How long a momentary flag stays up: about 50 frames.
const FLAG_PULSE: Duration = Duration::from_secs(1);

/// How long a `go_*` helper holds the stick before re-centering.
const STEP_HOLD: Duration = Duration::from_millis(500);

/// Addresses for the command stream.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// The drone's command endpoint.
    pub remote: SocketAddr,
    /// Source address to bind, `None` for any.
    pub local: Option<SocketAddr>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            remote: "192.168.0.1:50000".parse().unwrap(),
            local: None,
        }
    }
}

/// The transmitter: public facade over the command buffer and radio loop.
pub struct Driver {
    config: DriverConfig,
    buffer: Arc<CommandBuffer>,
    radio: Option<RadioHandle>,
    observer: Arc<Mutex<Option<ErrorObserver>>>,
    last_error: Arc<Mutex<Option<io::Error>>>,
}

impl Driver {
    pub fn new() -> Self {
        Self::with_config(DriverConfig::default())
    }

    pub fn with_config(config: DriverConfig) -> Self {
        Self {
            config,
            buffer: Arc::new(CommandBuffer::new()),
            radio: None,
            observer: Arc::new(Mutex::new(None)),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Start transmitting. A second `start` while running is a no-op.
    ///
    /// Resets sticks to neutral and clears all flags before the first
    /// frame goes out.
    pub async fn start(&mut self) -> Result<(), Error> {
        if self.radio.is_some() {
            debug!("start while running ignored");
            return Ok(());
        }
        self.buffer.reset();

        let local = self
            .config
            .local
            .unwrap_or_else(|| "0.0.0.0:0".parse().unwrap());
        let socket = UdpSocket::bind(local).await?;
        socket.connect(self.config.remote).await.map_err(|e| {
            Error::ConnectionFailed(format!("can't reach {}: {e}", self.config.remote))
        })?;

        self.radio = Some(radio::spawn(
            socket,
            Arc::clone(&self.buffer),
            Arc::clone(&self.observer),
            Arc::clone(&self.last_error),
        ));
        Ok(())
    }

    /// Stop transmitting. `halt` while idle is a no-op.
    pub async fn halt(&mut self) {
        if let Some(radio) = self.radio.take() {
            radio.halt().await;
        } else {
            debug!("halt while idle ignored");
        }
    }

    pub fn is_running(&self) -> bool {
        self.radio.is_some()
    }

    /// Register an observer for radio send failures.
    ///
    /// The loop keeps transmitting after a failure; the observer is how a
    /// UI learns the drone went out of range.
    pub fn on_error(&self, callback: impl Fn(io::Error) + Send + Sync + 'static) {
        *self.observer.lock().unwrap() = Some(Arc::new(callback));
    }

    /// The most recent radio send failure, if any.
    pub fn last_error(&self) -> Option<io::Error> {
        self.last_error
            .lock()
            .unwrap()
            .as_ref()
            .map(|e| io::Error::new(e.kind(), e.to_string()))
    }

    // --- Stick control ---

    /// Fly according to stick positions, each in [-1.0, +1.0]:
    ///
    /// ```text
    ///   up        (throttle)   ↓ … ↑
    ///   rotate    (yaw)        ↷ … ↶
    ///   forwards  (pitch)      ▼ … ▲
    ///   sideways  (roll)       ◀ … ▶
    /// ```
    ///
    /// Flags are untouched.
    pub fn sticks(&self, up: f64, rotate: f64, forwards: f64, sideways: f64) {
        self.buffer.set_sticks(up, rotate, forwards, sideways);
    }

    /// Re-center all sticks. Same as `sticks(0.0, 0.0, 0.0, 0.0)`.
    pub fn hover(&self) {
        self.buffer.set_sticks(0.0, 0.0, 0.0, 0.0);
    }

    /// Climb at `speed` (0 to 1) for half a second, then hover.
    pub async fn go_up(&self, speed: f64) {
        self.step(frame::THROTTLE, speed).await;
    }

    /// Descend at `speed` (0 to 1) for half a second, then hover.
    pub async fn go_down(&self, speed: f64) {
        self.step(frame::THROTTLE, -speed).await;
    }

    /// Bank right at `speed` (0 to 1) for half a second, then hover.
    pub async fn go_right(&self, speed: f64) {
        self.step(frame::ROLL, speed).await;
    }

    /// Bank left at `speed` (0 to 1) for half a second, then hover.
    pub async fn go_left(&self, speed: f64) {
        self.step(frame::ROLL, -speed).await;
    }

    /// Pitch forward at `speed` (0 to 1) for half a second, then hover.
    pub async fn go_forward(&self, speed: f64) {
        self.step(frame::PITCH, speed).await;
    }

    /// Pitch backward at `speed` (0 to 1) for half a second, then hover.
    pub async fn go_backward(&self, speed: f64) {
        self.step(frame::PITCH, -speed).await;
    }

    /// Rotate clockwise at `speed` (0 to 1) for half a second, then hover.
    pub async fn go_clockwise(&self, speed: f64) {
        self.step(frame::YAW, -speed).await;
    }

    /// Rotate counter-clockwise at `speed` (0 to 1) for half a second,
    /// then hover.
    pub async fn go_counter_clockwise(&self, speed: f64) {
        self.step(frame::YAW, speed).await;
    }

    async fn step(&self, offset: usize, value: f64) {
        self.buffer.set_stick(offset, value);
        sleep(STEP_HOLD).await;
        self.hover();
    }

    // --- Action buttons ---

    /// Spin up and take off.
    pub fn take_off(&self) {
        self.pulse(Flags::TAKE_OFF);
    }

    /// Descend and stop the motors. The drop can be harsh; best used below
    /// a meter of altitude.
    pub fn land(&self) {
        self.pulse(Flags::LAND);
    }

    /// Emergency stop: kills the motors immediately, wherever the drone is.
    pub fn stop(&self) {
        self.pulse(Flags::STOP);
    }

    /// Calibrate the gyro. Run on a level surface before flight.
    pub fn calibrate(&self) {
        self.pulse(Flags::GYRO);
    }

    /// Arm a flip: a full stick deflection within the next second flips in
    /// that direction. No beep from the drone means the battery is too low
    /// to flip.
    pub fn flip(&self) {
        self.pulse(Flags::FLIP);
    }

    /// Enter headless mode.
    pub fn compass_on(&self) {
        self.buffer.set_flag(Flags::COMPASS);
    }

    /// Leave headless mode.
    pub fn compass_off(&self) {
        self.buffer.clear_flag(Flags::COMPASS);
    }

    /// Shutter button. On most models this only blinks the status led;
    /// [`crate::camera::Camera::take_photo`] is the reliable path.
    pub fn take_photo(&self) {
        self.pulse(Flags::PHOTO);
    }

    /// Record button, same caveat as [`Driver::take_photo`].
    pub fn capture_video(&self) {
        self.pulse(Flags::VIDEO);
    }

    pub async fn do_back_flip(&self) {
        self.flip();
        self.go_backward(1.0).await;
    }

    pub async fn do_front_flip(&self) {
        self.flip();
        self.go_forward(1.0).await;
    }

    pub async fn do_left_flip(&self) {
        self.flip();
        self.go_left(1.0).await;
    }

    pub async fn do_right_flip(&self) {
        self.flip();
        self.go_right(1.0).await;
    }

    fn pulse(&self, flags: Flags) {
        // The flag outlives any 500 ms stick helper started right after,
        // which is what makes the do_*_flip combos land.
        self.buffer.pulse_flag(flags, FLAG_PULSE);
    }

    /// The command buffer, exposed for tests and diagnostics.
    pub fn command_buffer(&self) -> &Arc<CommandBuffer> {
        &self.buffer
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.buffer)
    }
}
