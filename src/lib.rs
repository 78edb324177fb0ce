//! Remote control for the Visuo XS809 quadcopter family (xs809s, xs809,
//! xs809w, xs809h, xs809hw and compatibles).
//!
//! The drone runs an open access point and speaks two unrelated
//! protocols on it:
//!
//! * **Flight**: an 8-byte command datagram streamed over UDP to
//!   192.168.0.1:50000 at 50 Hz. [`flight::Driver`] is the transmitter.
//! * **Camera**: the `lewei_cmd` request/response protocol over TCP ports
//!   8060 (control) and 7060 (streams). [`camera::Camera`] is the client.
//!
//! Neither side authenticates anything; being on the drone's wifi is the
//! whole handshake.
//!
//! ```no_run
//! use std::time::Duration;
//! use visuo::flight::Driver;
//!
//! # async fn fly() -> Result<(), visuo::Error> {
//! let mut drone = Driver::new();
//! drone.start().await?;
//! drone.calibrate();
//! tokio::time::sleep(Duration::from_secs(2)).await;
//! drone.take_off();
//! tokio::time::sleep(Duration::from_secs(5)).await;
//! drone.go_up(0.5).await;
//! drone.land();
//! tokio::time::sleep(Duration::from_secs(3)).await;
//! drone.halt().await;
//! # Ok(())
//! # }
//! ```

pub mod camera;
mod error;
pub mod flight;
pub mod net;

pub use camera::{Camera, CameraConfig};
pub use error::Error;
pub use flight::{Driver, DriverConfig};
