//! Reliable delivery channel
//!
//! Owns the outbound queue and a worker thread that keeps one relay
//! session alive: it logs in, streams queued frames, drains whatever the
//! server pushes back and reconnects with a randomized backoff on any
//! socket error. The worker never gives up on connectivity; only
//! [`DeliveryChannel::stop`] ends it.

use parking_lot::Mutex;
use rand::Rng;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::Span;

use crate::codec::{encode_line, Charset, Frame};
use crate::constants::*;
use crate::error::NetworkError;
use crate::network::gateway::GatewayCycle;
use crate::network::queue::{outbound_queue, FrameReceiver, FrameSender};
use crate::network::session::{Dialer, Session};
use crate::network::stats::{DeliveryStats, DeliveryStatsSnapshot};
use crate::shutdown::StopFlag;

/// Connection state of the delivery worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Streaming,
}

/// Uniformly random delay between `min` and `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub min: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    pub fn next_delay(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            min: DEFAULT_RECONNECT_BACKOFF_MIN,
            max: DEFAULT_RECONNECT_BACKOFF_MAX,
        }
    }
}

/// Delivery channel tuning
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub queue_capacity: usize,
    /// How long `send` waits for a queue slot
    pub send_timeout: Duration,
    /// How long the worker waits for a frame per iteration
    pub poll_interval: Duration,
    /// Delay between failed connection attempts
    pub connect_retry: Duration,
    /// Delay after a connection error before reconnecting
    pub reconnect_backoff: Backoff,
    pub charset: Charset,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_retry: DEFAULT_CONNECT_RETRY,
            reconnect_backoff: Backoff::default(),
            charset: Charset::default(),
        }
    }
}

/// Handle to the running delivery worker
pub struct DeliveryChannel {
    sender: FrameSender,
    state: Arc<Mutex<ConnectionState>>,
    stats: Arc<DeliveryStats>,
    stop: StopFlag,
    thread_handle: Option<JoinHandle<()>>,
}

impl DeliveryChannel {
    /// Spawn the worker thread; it connects in the background.
    ///
    /// Log events of the worker are recorded inside `span`.
    pub fn start<D>(
        config: ChannelConfig,
        gateways: GatewayCycle,
        dialer: D,
        span: Span,
    ) -> Result<Self, NetworkError>
    where
        D: Dialer + 'static,
    {
        let stats = Arc::new(DeliveryStats::default());
        let (sender, receiver) =
            outbound_queue(config.queue_capacity, config.send_timeout, stats.clone());
        let state = Arc::new(Mutex::new(ConnectionState::Disconnected));
        let stop = StopFlag::new();

        let worker = Worker {
            dialer,
            gateways,
            receiver,
            session: None,
            pending: None,
            config,
            state: state.clone(),
            stats: stats.clone(),
            stop: stop.clone(),
        };

        let handle = thread::Builder::new()
            .name("igate-sender".into())
            .spawn(move || {
                let _enter = span.enter();
                worker.run();
            })?;

        Ok(Self {
            sender,
            state,
            stats,
            stop,
            thread_handle: Some(handle),
        })
    }

    /// Queue a frame for delivery.
    ///
    /// Blocks up to the send timeout; a frame that still finds the queue
    /// full is dropped and [`NetworkError::QueueFull`] returned.
    pub fn send(&self, frame: Frame) -> Result<(), NetworkError> {
        self.sender.send(frame)
    }

    /// Producer handle for other threads
    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn stats(&self) -> DeliveryStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.stop.is_running()
    }

    /// Ask the worker to exit and wait for it
    pub fn stop(&mut self) {
        self.stop.stop();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DeliveryChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the worker thread
struct Worker<D: Dialer> {
    dialer: D,
    gateways: GatewayCycle,
    receiver: FrameReceiver,
    session: Option<D::Session>,
    /// Frame whose write failed; sent first after reconnecting
    pending: Option<Frame>,
    config: ChannelConfig,
    state: Arc<Mutex<ConnectionState>>,
    stats: Arc<DeliveryStats>,
    stop: StopFlag,
}

impl<D: Dialer> Worker<D> {
    fn run(mut self) {
        if self.connect() {
            while self.stop.is_running() {
                if let Err(e) = self.step() {
                    if matches!(e, NetworkError::WorkerStopped) {
                        break;
                    }
                    self.recover(e);
                }
            }
        }

        self.disconnect();
        tracing::debug!("Sending thread exit");
    }

    /// Send at most one frame, then drain the socket
    fn step(&mut self) -> Result<(), NetworkError> {
        let frame = match self.pending.take() {
            Some(frame) => Some(frame),
            None => self.receiver.recv_timeout(self.config.poll_interval)?,
        };

        let session = self.session.as_mut().ok_or(NetworkError::Closed)?;

        if let Some(frame) = frame {
            tracing::debug!("Sending: {}", frame);
            let line = encode_line(&frame, self.config.charset);
            if let Err(e) = write_all(session, &line) {
                self.pending = Some(frame);
                return Err(e);
            }
            self.stats.record_sent();
        }

        let drained = session.drain()?;
        if drained > 0 {
            tracing::trace!("Drained {} bytes from server", drained);
        }
        Ok(())
    }

    /// Drop the broken session, back off, then connect again
    fn recover(&mut self, error: NetworkError) {
        let delay = self.config.reconnect_backoff.next_delay();
        tracing::warn!("Connection issue, sleeping for {:?}: {}", delay, error);
        self.disconnect();

        if self.stop.sleep(delay) {
            self.stats.record_reconnect();
            self.connect();
        }
    }

    /// Try gateways round-robin until one logs in or we are stopped
    fn connect(&mut self) -> bool {
        self.set_state(ConnectionState::Connecting);

        while self.stop.is_running() {
            let gateway = self.gateways.next_gateway().clone();
            match self.dialer.dial(&gateway) {
                Ok(session) => {
                    self.session = Some(session);
                    self.set_state(ConnectionState::Streaming);
                    return true;
                }
                Err(e) => {
                    tracing::warn!("Error when connecting to {}: {}", gateway, e);
                    self.stop.sleep(self.config.connect_retry);
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        false
    }

    /// Close the session, ignoring close errors
    fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close() {
                tracing::debug!("Ignoring error on close: {}", e);
            }
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }
}

/// Write the whole buffer, looping on partial writes
fn write_all<S: Session>(session: &mut S, buf: &[u8]) -> Result<(), NetworkError> {
    let mut total = 0;
    while total < buf.len() {
        match session.write(&buf[total..]) {
            Ok(0) => return Err(NetworkError::ZeroWrite),
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::gateway::Gateway;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Shared record of what the fake relay saw
    #[derive(Clone, Default)]
    struct Recorder {
        dials: Arc<Mutex<Vec<String>>>,
        lines: Arc<Mutex<Vec<String>>>,
        writes: Arc<AtomicUsize>,
    }

    struct FakeDialer {
        recorder: Recorder,
        /// 1-based write attempt that fails
        fail_write: Option<usize>,
        /// The failing write reports 0 bytes instead of a broken pipe
        zero_write: bool,
        /// Number of initial dials that fail
        fail_dials: usize,
    }

    struct FakeSession {
        recorder: Recorder,
        fail_write: Option<usize>,
        zero_write: bool,
        max_chunk: usize,
    }

    impl Dialer for FakeDialer {
        type Session = FakeSession;

        fn dial(&mut self, gateway: &Gateway) -> Result<FakeSession, NetworkError> {
            let attempt = {
                let mut dials = self.recorder.dials.lock();
                dials.push(gateway.to_string());
                dials.len()
            };
            if attempt <= self.fail_dials {
                return Err(NetworkError::ConnectionFailed("refused".into()));
            }
            Ok(FakeSession {
                recorder: self.recorder.clone(),
                fail_write: self.fail_write,
                zero_write: self.zero_write,
                max_chunk: 7,
            })
        }
    }

    impl Session for FakeSession {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let attempt = self.recorder.writes.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(attempt) == self.fail_write {
                if self.zero_write {
                    return Ok(0);
                }
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
            }
            // partial writes exercise the write loop
            let n = buf.len().min(self.max_chunk);
            let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
            let mut lines = self.recorder.lines.lock();
            let unfinished = lines.last().map_or(false, |l| !l.ends_with('\n'));
            match lines.last_mut() {
                Some(last) if unfinished => last.push_str(&chunk),
                _ => lines.push(chunk),
            }
            Ok(n)
        }

        fn drain(&mut self) -> io::Result<usize> {
            Ok(0)
        }

        fn close(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::NotConnected, "already closed"))
        }
    }

    fn fast_config() -> ChannelConfig {
        ChannelConfig {
            queue_capacity: 1,
            send_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            connect_retry: Duration::from_millis(5),
            reconnect_backoff: Backoff {
                min: Duration::from_millis(5),
                max: Duration::from_millis(20),
            },
            charset: Charset::Latin1,
        }
    }

    fn frame(n: usize) -> Frame {
        Frame::new("N0CALL", "APRS", vec!["WIDE1-1".into()], format!(">frame {}", n))
    }

    fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_write_failure_reconnects_and_keeps_order() {
        let recorder = Recorder::default();
        let dialer = FakeDialer {
            recorder: recorder.clone(),
            // frame 1 takes 5 partial writes; the 6th is frame 2's first
            fail_write: Some(6),
            zero_write: false,
            fail_dials: 0,
        };
        let gateways = GatewayCycle::parse(&["a:1", "b:2", "c:3"]).unwrap();
        let mut channel =
            DeliveryChannel::start(fast_config(), gateways, dialer, Span::none()).unwrap();

        for n in 1..=3 {
            channel.send(frame(n)).unwrap();
        }

        assert!(wait_for(|| recorder.lines.lock().len() == 3));
        let lines = recorder.lines.lock().clone();
        assert_eq!(
            lines,
            vec![
                "N0CALL>APRS,WIDE1-1:>frame 1\r\n",
                "N0CALL>APRS,WIDE1-1:>frame 2\r\n",
                "N0CALL>APRS,WIDE1-1:>frame 3\r\n",
            ]
        );
        assert_eq!(*recorder.dials.lock(), vec!["a:1", "b:2"]);

        let stats = channel.stats();
        assert_eq!(stats.frames_sent, 3);
        assert_eq!(stats.reconnects, 1);

        channel.stop();
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_zero_byte_write_reconnects_and_resends() {
        let recorder = Recorder::default();
        let dialer = FakeDialer {
            recorder: recorder.clone(),
            fail_write: Some(1),
            zero_write: true,
            fail_dials: 0,
        };
        let gateways = GatewayCycle::parse(&["a:1", "b:2"]).unwrap();
        let mut channel =
            DeliveryChannel::start(fast_config(), gateways, dialer, Span::none()).unwrap();

        channel.send(frame(1)).unwrap();

        assert!(wait_for(|| channel.stats().frames_sent == 1));
        assert_eq!(
            *recorder.lines.lock(),
            vec!["N0CALL>APRS,WIDE1-1:>frame 1\r\n"]
        );
        assert_eq!(*recorder.dials.lock(), vec!["a:1", "b:2"]);
        assert_eq!(channel.stats().reconnects, 1);

        channel.stop();
    }

    #[test]
    fn test_connect_cycles_gateways_until_success() {
        let recorder = Recorder::default();
        let dialer = FakeDialer {
            recorder: recorder.clone(),
            fail_write: None,
            zero_write: false,
            fail_dials: 4,
        };
        let gateways = GatewayCycle::parse(&["a:1", "b:2", "c:3"]).unwrap();
        let channel =
            DeliveryChannel::start(fast_config(), gateways, dialer, Span::none()).unwrap();

        assert!(wait_for(|| channel.state() == ConnectionState::Streaming));
        assert_eq!(
            *recorder.dials.lock(),
            vec!["a:1", "b:2", "c:3", "a:1", "b:2"]
        );
    }

    #[test]
    fn test_stop_while_connecting() {
        let recorder = Recorder::default();
        let dialer = FakeDialer {
            recorder: recorder.clone(),
            fail_write: None,
            zero_write: false,
            fail_dials: usize::MAX,
        };
        let gateways = GatewayCycle::parse(&["a:1"]).unwrap();
        let mut channel =
            DeliveryChannel::start(fast_config(), gateways, dialer, Span::none()).unwrap();

        assert!(wait_for(|| recorder.dials.lock().len() >= 2));
        channel.stop();
        assert!(!channel.is_running());
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_backoff_range() {
        let backoff = Backoff {
            min: Duration::from_secs(1),
            max: Duration::from_secs(20),
        };
        for _ in 0..100 {
            let delay = backoff.next_delay();
            assert!(delay >= backoff.min && delay <= backoff.max);
        }
        let fixed = Backoff::fixed(Duration::from_secs(1));
        assert_eq!(fixed.next_delay(), Duration::from_secs(1));
    }
}
