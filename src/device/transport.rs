//! Rate-limited, fire-and-forget frame delivery.
//!
//! [`DeviceTransport::send`] runs on the animation thread and must never block.
//! It encodes the color, applies the guards and hands the frame to the link
//! worker through a one-slot channel. The worker thread owns the [`Link`] and
//! does the actual (possibly slow) writes.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{Frame, Link};
use crate::color::Rgb;

/// What happened to a frame handed to [`DeviceTransport::send`].
///
/// None of these are errors: dropped frames are simply superseded by the next
/// tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the link worker
    Sent,
    /// Dropped: a different frame arrived inside the minimum write interval
    Throttled,
    /// Dropped: the same frame as the last accepted one arrived inside the interval
    Duplicate,
    /// Dropped: the worker is still writing the previous frame
    Busy,
    /// Dropped: no link connection
    Disconnected,
}

/// Front end of the link worker, owned by the animator.
pub struct DeviceTransport {
    sender: SyncSender<Frame>,
    connected: Arc<AtomicBool>,
    min_interval: Duration,
    last_accepted: Option<(Instant, Frame)>,
}

impl DeviceTransport {
    /// Create a transport feeding `sender`.
    ///
    /// `connected` is shared with whoever consumes the channel and reflects the
    /// link state; while it is false every send is a no-op.
    pub fn new(
        sender: SyncSender<Frame>,
        connected: Arc<AtomicBool>,
        min_interval: Duration,
    ) -> Self {
        Self {
            sender,
            connected,
            min_interval,
            last_accepted: None,
        }
    }

    pub fn send(&mut self, rgb: Rgb) -> SendOutcome {
        self.send_at(rgb, Instant::now())
    }

    /// Same as [`send`](Self::send) with an explicit clock reading.
    pub fn send_at(&mut self, rgb: Rgb, now: Instant) -> SendOutcome {
        if !self.connected.load(Ordering::Acquire) {
            return SendOutcome::Disconnected;
        }

        let frame = Frame::color(rgb);

        // Identical frames are still resent once the interval has passed, so a
        // steady color keeps being refreshed without flooding the link
        if let Some((last_time, last_frame)) = self.last_accepted
            && now.saturating_duration_since(last_time) < self.min_interval
        {
            return if last_frame == frame {
                SendOutcome::Duplicate
            } else {
                SendOutcome::Throttled
            };
        }

        match self.sender.try_send(frame) {
            Ok(()) => {
                self.last_accepted = Some((now, frame));
                SendOutcome::Sent
            }
            Err(TrySendError::Full(_)) => SendOutcome::Busy,
            Err(TrySendError::Disconnected(_)) => {
                self.connected.store(false, Ordering::Release);
                SendOutcome::Disconnected
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// The last frame that passed the guards, if any.
    pub fn last_frame(&self) -> Option<Frame> {
        self.last_accepted.map(|(_, frame)| frame)
    }
}

/// Handle to the link worker thread.
pub struct LinkWorker {
    handle: JoinHandle<()>,
    connected: Arc<AtomicBool>,
    settled: Arc<AtomicBool>,
}

impl LinkWorker {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Shared connection flag, for status displays.
    pub fn connection_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.connected)
    }

    /// Block until the connection attempt has finished or `timeout` passes.
    ///
    /// Returns whether the link ended up connected.
    pub fn wait_for_connection(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.settled.load(Ordering::Acquire) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        self.is_connected()
    }

    /// Wait for the worker to disconnect and exit.
    ///
    /// The worker only stops once every [`DeviceTransport`] feeding it has
    /// been dropped.
    pub fn join(self) {
        let _ = self.handle.join();
    }
}

/// Spawn the link worker and return the transport that feeds it.
///
/// The worker connects first, sends the bootstrap frame and then writes frames
/// as they arrive. Connection and write failures are logged, never retried.
pub fn spawn_link_worker(
    link: Box<dyn Link>,
    min_interval: Duration,
    debug_enabled: bool,
) -> Result<(DeviceTransport, LinkWorker)> {
    let (sender, receiver) = sync_channel::<Frame>(1);
    let connected = Arc::new(AtomicBool::new(false));
    let settled = Arc::new(AtomicBool::new(false));

    let worker_connected = Arc::clone(&connected);
    let worker_settled = Arc::clone(&settled);
    let handle = thread::Builder::new()
        .name("link-worker".to_string())
        .spawn(move || {
            run_link_worker(link, receiver, worker_connected, worker_settled, debug_enabled)
        })
        .context("failed to spawn link worker thread")?;

    let transport = DeviceTransport::new(sender, Arc::clone(&connected), min_interval);
    Ok((
        transport,
        LinkWorker {
            handle,
            connected,
            settled,
        },
    ))
}

fn run_link_worker(
    mut link: Box<dyn Link>,
    receiver: Receiver<Frame>,
    connected: Arc<AtomicBool>,
    settled: Arc<AtomicBool>,
    debug_enabled: bool,
) {
    if debug_enabled {
        log_debug!("Connecting through {} link", link.name());
    }
    match link.connect() {
        Ok(()) => {
            if let Err(e) = link.write_frame(Frame::bootstrap().as_bytes()) {
                log_pipe!();
                log_warning!("Failed to send bootstrap command: {e:#}");
            }
            let is_connected = link.is_connected();
            connected.store(is_connected, Ordering::Release);
            if is_connected {
                log_decorated!("Connected to LED strip ({})", link.name());
            }
        }
        Err(e) => {
            log_pipe!();
            log_warning!("LED strip connection failed: {e:#}");
            log_indented!("Color changes will not be transmitted this session");
        }
    }
    settled.store(true, Ordering::Release);

    for frame in receiver.iter() {
        if !connected.load(Ordering::Acquire) {
            continue;
        }

        if let Err(e) = link.write_frame(frame.as_bytes()) {
            if debug_enabled {
                log_pipe!();
                log_warning!("Dropped frame {frame}: {e:#}");
            }
            if !link.is_connected() {
                connected.store(false, Ordering::Release);
                log_pipe!();
                log_warning!("LED strip disconnected, further color changes are not sent");
            }
        }
    }

    if connected.swap(false, Ordering::AcqRel)
        && let Err(e) = link.disconnect()
    {
        log_warning!("Failed to disconnect cleanly: {e:#}");
    }

    if debug_enabled {
        log_debug!("Link worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockLink;
    use std::sync::Mutex;

    fn transport_with_receiver(capacity: usize) -> (DeviceTransport, Receiver<Frame>) {
        let (sender, receiver) = sync_channel(capacity);
        let connected = Arc::new(AtomicBool::new(true));
        (
            DeviceTransport::new(sender, connected, Duration::from_millis(10)),
            receiver,
        )
    }

    #[test]
    fn test_identical_frames_inside_interval_forward_once() {
        let (mut transport, receiver) = transport_with_receiver(8);
        let t0 = Instant::now();
        let red = Rgb::new(255, 0, 0);

        assert_eq!(transport.send_at(red, t0), SendOutcome::Sent);
        assert_eq!(
            transport.send_at(red, t0 + Duration::from_millis(4)),
            SendOutcome::Duplicate
        );

        let forwarded: Vec<Frame> = receiver.try_iter().collect();
        assert_eq!(forwarded.len(), 1);
    }

    #[test]
    fn test_identical_frames_beyond_interval_both_forward() {
        let (mut transport, receiver) = transport_with_receiver(8);
        let t0 = Instant::now();
        let red = Rgb::new(255, 0, 0);

        assert_eq!(transport.send_at(red, t0), SendOutcome::Sent);
        assert_eq!(
            transport.send_at(red, t0 + Duration::from_millis(10)),
            SendOutcome::Sent
        );

        let forwarded: Vec<Frame> = receiver.try_iter().collect();
        assert_eq!(forwarded, vec![Frame::color(red), Frame::color(red)]);
    }

    #[test]
    fn test_different_frame_inside_interval_is_throttled() {
        let (mut transport, receiver) = transport_with_receiver(8);
        let t0 = Instant::now();

        transport.send_at(Rgb::new(255, 0, 0), t0);
        assert_eq!(
            transport.send_at(Rgb::new(0, 255, 0), t0 + Duration::from_millis(9)),
            SendOutcome::Throttled
        );
        assert_eq!(receiver.try_iter().count(), 1);
    }

    #[test]
    fn test_rejected_sends_do_not_reset_the_interval() {
        let (mut transport, _receiver) = transport_with_receiver(8);
        let t0 = Instant::now();
        let color = Rgb::new(1, 2, 3);

        transport.send_at(color, t0);
        transport.send_at(color, t0 + Duration::from_millis(8));
        // Measured from the accepted send, not the dropped one
        assert_eq!(
            transport.send_at(color, t0 + Duration::from_millis(11)),
            SendOutcome::Sent
        );
    }

    #[test]
    fn test_disconnected_send_is_noop() {
        let (sender, receiver) = sync_channel(8);
        let connected = Arc::new(AtomicBool::new(false));
        let mut transport = DeviceTransport::new(sender, connected, Duration::from_millis(10));

        assert_eq!(
            transport.send(Rgb::new(9, 9, 9)),
            SendOutcome::Disconnected
        );
        assert!(receiver.try_recv().is_err());
        assert!(transport.last_frame().is_none());
    }

    #[test]
    fn test_busy_worker_drops_frame_without_blocking() {
        let (mut transport, receiver) = transport_with_receiver(1);
        let t0 = Instant::now();

        assert_eq!(transport.send_at(Rgb::new(1, 0, 0), t0), SendOutcome::Sent);
        assert_eq!(
            transport.send_at(Rgb::new(2, 0, 0), t0 + Duration::from_millis(20)),
            SendOutcome::Busy
        );
        assert_eq!(transport.last_frame(), Some(Frame::color(Rgb::new(1, 0, 0))));
        drop(receiver);
    }

    #[test]
    fn test_dead_worker_marks_disconnected() {
        let (mut transport, receiver) = transport_with_receiver(1);
        drop(receiver);
        assert_eq!(
            transport.send(Rgb::new(1, 1, 1)),
            SendOutcome::Disconnected
        );
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_worker_bootstraps_then_writes_frames() {
        let written = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
        let sink = Arc::clone(&written);

        let mut link = MockLink::new();
        link.expect_connect().times(1).returning(|| Ok(()));
        link.expect_write_frame().returning(move |frame| {
            sink.lock().unwrap().push(frame.to_vec());
            Ok(())
        });
        link.expect_is_connected().return_const(true);
        link.expect_name().return_const("mock");
        link.expect_disconnect().times(1).returning(|| Ok(()));

        let (mut transport, worker) =
            spawn_link_worker(Box::new(link), Duration::from_millis(1), false).unwrap();

        assert!(worker.wait_for_connection(Duration::from_secs(2)));
        let deadline = Instant::now() + Duration::from_secs(2);

        let mut outcome = SendOutcome::Busy;
        while outcome == SendOutcome::Busy && Instant::now() < deadline {
            outcome = transport.send(Rgb::new(0, 0, 255));
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(outcome, SendOutcome::Sent);

        drop(transport);
        worker.join();

        let written = written.lock().unwrap();
        assert_eq!(written[0], Frame::bootstrap().as_bytes());
        assert_eq!(written[1], Frame::color(Rgb::new(0, 0, 255)).as_bytes());
    }

    #[test]
    fn test_worker_connect_failure_keeps_sends_noop() {
        let mut link = MockLink::new();
        link.expect_connect()
            .returning(|| Err(anyhow::anyhow!("adapter missing")));
        link.expect_write_frame().never();
        link.expect_is_connected().return_const(false);
        link.expect_name().return_const("mock");
        link.expect_disconnect().never();

        let (mut transport, worker) =
            spawn_link_worker(Box::new(link), Duration::from_millis(1), false).unwrap();
        assert!(!worker.wait_for_connection(Duration::from_secs(2)));

        assert_eq!(transport.send(Rgb::new(1, 2, 3)), SendOutcome::Disconnected);
        drop(transport);
        worker.join();
    }

    #[test]
    fn test_worker_write_failure_with_lost_link_disconnects() {
        let mut link = MockLink::new();
        link.expect_connect().returning(|| Ok(()));
        let mut writes = 0;
        link.expect_write_frame().returning(move |_| {
            writes += 1;
            // Bootstrap succeeds, the first color write fails
            if writes == 1 {
                Ok(())
            } else {
                Err(anyhow::anyhow!("not connected"))
            }
        });
        let mut checks = 0;
        link.expect_is_connected().returning(move || {
            checks += 1;
            checks == 1
        });
        link.expect_name().return_const("mock");
        link.expect_disconnect().never();

        let (mut transport, worker) =
            spawn_link_worker(Box::new(link), Duration::from_millis(1), false).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !transport.is_connected() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        let mut outcome = SendOutcome::Busy;
        while outcome == SendOutcome::Busy && Instant::now() < deadline {
            outcome = transport.send(Rgb::new(4, 5, 6));
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(outcome, SendOutcome::Sent);

        while transport.is_connected() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!transport.is_connected());
        assert_eq!(transport.send(Rgb::new(4, 5, 6)), SendOutcome::Disconnected);

        drop(transport);
        worker.join();
    }
}
