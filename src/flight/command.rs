//! Live copy of the next flight datagram.
//!
//! The radio loop snapshots this buffer 50 times a second while the public
//! API mutates it, so every mutator reseals the crc before releasing the
//! write lock. Readers can only ever observe a frame that validates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::frame::{self, Flags, FLAGS, FRAME_LEN, PITCH, ROLL, THROTTLE, YAW};

/// A scheduled flag clear. `seq` tells a woken clear whether it has been
/// superseded by a newer pulse on the same mask.
struct PendingClear {
    seq: u64,
    handle: JoinHandle<()>,
}

/// Thread-safe command buffer shared between the API and the radio loop.
pub struct CommandBuffer {
    data: RwLock<[u8; FRAME_LEN]>,
    clears: Mutex<HashMap<u8, PendingClear>>,
    pulse_seq: AtomicU64,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(frame::neutral()),
            clears: Mutex::new(HashMap::new()),
            pulse_seq: AtomicU64::new(0),
        }
    }

    /// Copy of the current sealed frame.
    pub fn snapshot(&self) -> [u8; FRAME_LEN] {
        *self.data.read().unwrap()
    }

    /// Mutate the frame and reseal the crc under the same write lock.
    fn update(&self, f: impl FnOnce(&mut [u8; FRAME_LEN])) {
        let mut data = self.data.write().unwrap();
        f(&mut data);
        frame::seal(&mut data);
    }

    /// Write all four stick bytes at once. Flags are untouched.
    pub fn set_sticks(&self, up: f64, rotate: f64, forwards: f64, sideways: f64) {
        self.update(|data| {
            data[ROLL] = frame::normalize_stick(sideways);
            data[PITCH] = frame::normalize_stick(forwards);
            data[THROTTLE] = frame::normalize_stick(up);
            data[YAW] = frame::normalize_stick(rotate);
        });
    }

    /// Write a single stick byte, leaving the others alone.
    pub fn set_stick(&self, offset: usize, value: f64) {
        debug_assert!((ROLL..=YAW).contains(&offset));
        self.update(|data| data[offset] = frame::normalize_stick(value));
    }

    pub fn set_flag(&self, flags: Flags) {
        self.update(|data| data[FLAGS] |= flags.bits());
    }

    pub fn clear_flag(&self, flags: Flags) {
        self.update(|data| data[FLAGS] &= !flags.bits());
    }

    /// Set the given bits now and schedule a clear of the same bits after
    /// `duration`.
    ///
    /// A new pulse on a mask supersedes a pending clear for that mask, so
    /// the bits stay set continuously until the newest clear fires. Pulses
    /// on disjoint masks are independent. Must be called within a tokio
    /// runtime.
    pub fn pulse_flag(self: &Arc<Self>, flags: Flags, duration: Duration) {
        // The clears lock serializes this against any clear that is firing
        // right now, closing the window where a stale clear could observe
        // the freshly set bits.
        let mut clears = self.clears.lock().unwrap();
        self.set_flag(flags);

        let seq = self.pulse_seq.fetch_add(1, Ordering::Relaxed);
        let buffer = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            buffer.finish_pulse(flags, seq);
        });

        if let Some(stale) = clears.insert(flags.bits(), PendingClear { seq, handle }) {
            stale.handle.abort();
        }
    }

    /// Deferred half of `pulse_flag`: clear the bits unless a newer pulse
    /// took over the mask while we slept.
    fn finish_pulse(&self, flags: Flags, seq: u64) {
        let mut clears = self.clears.lock().unwrap();
        let current = clears
            .get(&flags.bits())
            .is_some_and(|pending| pending.seq == seq);
        if !current {
            return;
        }
        clears.remove(&flags.bits());
        // Still holding the clears lock: no pulse can interleave here.
        self.clear_flag(flags);
    }

    /// Back to neutral sticks and an empty flags byte.
    pub fn reset(&self) {
        self.update(|data| {
            data[ROLL] = frame::NEUTRAL;
            data[PITCH] = frame::NEUTRAL;
            data[THROTTLE] = frame::NEUTRAL;
            data[YAW] = frame::NEUTRAL;
            data[FLAGS] = 0;
        });
    }

    pub fn flags(&self) -> Flags {
        Flags::from_bits_truncate(self.data.read().unwrap()[FLAGS])
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.snapshot();
        for (i, byte) in data.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_neutral() {
        let buf = CommandBuffer::new();
        assert_eq!(
            buf.snapshot(),
            [0x66, 0x80, 0x80, 0x80, 0x80, 0x00, 0x00, 0x99]
        );
    }

    #[test]
    fn test_snapshots_always_validate() {
        let buf = CommandBuffer::new();
        buf.set_sticks(0.5, -0.5, 1.0, -1.0);
        frame::validate(&buf.snapshot()).unwrap();
        buf.set_flag(Flags::COMPASS);
        frame::validate(&buf.snapshot()).unwrap();
        buf.set_stick(THROTTLE, -0.3);
        frame::validate(&buf.snapshot()).unwrap();
        buf.clear_flag(Flags::COMPASS);
        frame::validate(&buf.snapshot()).unwrap();
        buf.reset();
        frame::validate(&buf.snapshot()).unwrap();
    }

    #[test]
    fn test_set_sticks_bytes() {
        let buf = CommandBuffer::new();
        buf.set_flag(Flags::COMPASS);
        buf.set_sticks(0.5, -0.5, 1.0, -1.0);
        let data = buf.snapshot();
        assert_eq!(data[ROLL], 0x01);
        assert_eq!(data[PITCH], 0xff);
        assert_eq!(data[THROTTLE], 0xbf);
        assert_eq!(data[YAW], 0x40);
        // Flags untouched by stick writes.
        assert_eq!(data[FLAGS], Flags::COMPASS.bits());
    }

    #[test]
    fn test_flag_set_and_clear() {
        let buf = CommandBuffer::new();
        buf.set_flag(Flags::COMPASS);
        buf.set_flag(Flags::GYRO);
        assert_eq!(buf.flags(), Flags::COMPASS | Flags::GYRO);
        buf.clear_flag(Flags::COMPASS);
        assert_eq!(buf.flags(), Flags::GYRO);
    }

    #[test]
    fn test_reset_preserves_magics() {
        let buf = CommandBuffer::new();
        buf.set_sticks(1.0, 1.0, 1.0, 1.0);
        buf.set_flag(Flags::FLIP);
        buf.reset();
        assert_eq!(
            buf.snapshot(),
            [0x66, 0x80, 0x80, 0x80, 0x80, 0x00, 0x00, 0x99]
        );
    }

    #[tokio::test]
    async fn test_pulse_sets_then_clears() {
        let buf = Arc::new(CommandBuffer::new());
        buf.pulse_flag(Flags::TAKE_OFF, Duration::from_millis(80));
        assert!(buf.flags().contains(Flags::TAKE_OFF));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(buf.flags().contains(Flags::TAKE_OFF));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!buf.flags().contains(Flags::TAKE_OFF));
        frame::validate(&buf.snapshot()).unwrap();
    }

    #[tokio::test]
    async fn test_pulse_does_not_touch_other_bits() {
        let buf = Arc::new(CommandBuffer::new());
        buf.set_flag(Flags::COMPASS);
        buf.pulse_flag(Flags::LAND, Duration::from_millis(40));
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(buf.flags(), Flags::COMPASS);
    }

    #[tokio::test]
    async fn test_repulse_extends_hold() {
        let buf = Arc::new(CommandBuffer::new());
        buf.pulse_flag(Flags::FLIP, Duration::from_millis(60));
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Second pulse before the first clear fires: the bit must stay set
        // until the second clear.
        buf.pulse_flag(Flags::FLIP, Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(
            buf.flags().contains(Flags::FLIP),
            "first clear fired despite newer pulse"
        );

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!buf.flags().contains(Flags::FLIP));
    }

    #[tokio::test]
    async fn test_independent_pulses() {
        let buf = Arc::new(CommandBuffer::new());
        buf.pulse_flag(Flags::TAKE_OFF, Duration::from_millis(40));
        buf.pulse_flag(Flags::GYRO, Duration::from_millis(150));

        tokio::time::sleep(Duration::from_millis(90)).await;
        assert_eq!(buf.flags(), Flags::GYRO);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(buf.flags().is_empty());
    }

    #[test]
    fn test_display_hex_dump() {
        let buf = CommandBuffer::new();
        assert_eq!(buf.to_string(), "66 80 80 80 80 00 00 99");
    }
}
