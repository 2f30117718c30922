//! # Transport Loop
//!
//! The fixed-rate cycle tying the protocol engine to the serial link.
//!
//! Everything runs on one task: each tick reads whatever bytes are
//! available, feeds the frame extractor, dispatches the completed frames,
//! then writes at most one pending command frame and one pending scan
//! snapshot. Pending outbound state lives in single-slot watch channels, so
//! commands arriving faster than the tick rate overwrite each other and only
//! the latest is sent; for a live control loop, stale commands are garbage,
//! not backlog.
//!
//! Write failures are logged and never retried. The next tick carries
//! fresher data than any retransmission would.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::proto::dispatch::Dispatcher;
use crate::proto::framing::FrameExtractor;
use crate::proto::packet::OutPacket;
use crate::proto::{COMMAND_FRAME_LEN, FLUSH_MARKER, SCAN_SAMPLES};
use crate::serial::SerialPortIO;
use crate::steering::{CommandTranslator, VelocityCommand};

pub mod handlers;
pub mod snapshot;

pub use handlers::register_handlers;
pub use snapshot::RangeSnapshot;

/// Bytes requested from the port per tick
const READ_CHUNK: usize = 512;

/// Ticks between loop statistics log lines (10 s at 20 Hz)
const STATS_INTERVAL_TICKS: u64 = 200;

/// Latest-value slot for inbound velocity commands.
pub type CommandSlot = watch::Sender<Option<VelocityCommand>>;

/// Latest-value slot for outbound scan snapshots.
pub type SnapshotSlot = watch::Sender<Option<RangeSnapshot>>;

/// Create the single-slot channel feeding commands into the loop.
pub fn command_slot() -> (CommandSlot, watch::Receiver<Option<VelocityCommand>>) {
    watch::channel(None)
}

/// Create the single-slot channel feeding scan snapshots into the loop.
pub fn snapshot_slot() -> (SnapshotSlot, watch::Receiver<Option<RangeSnapshot>>) {
    watch::channel(None)
}

/// The bridge's single-threaded transport loop.
///
/// Owns the frame extractor, the dispatcher, and the reusable outbound
/// packet builders; nothing here is shared across tasks, so one `&mut self`
/// cycle at a time is the whole concurrency story.
pub struct TransportLoop<P: SerialPortIO> {
    port: P,
    extractor: FrameExtractor,
    dispatcher: Dispatcher,
    translator: CommandTranslator,
    cmd_rx: watch::Receiver<Option<VelocityCommand>>,
    scan_rx: watch::Receiver<Option<RangeSnapshot>>,
    cmd_packet: OutPacket,
    scan_packet: OutPacket,
    period: Duration,
    ticks: u64,
    frames_seen: u64,
}

impl<P: SerialPortIO> TransportLoop<P> {
    /// Assemble a loop over an opened port.
    ///
    /// A `tick_hz` of zero is clamped to 1 Hz.
    pub fn new(
        port: P,
        dispatcher: Dispatcher,
        translator: CommandTranslator,
        cmd_rx: watch::Receiver<Option<VelocityCommand>>,
        scan_rx: watch::Receiver<Option<RangeSnapshot>>,
        tick_hz: u32,
    ) -> Self {
        Self {
            port,
            extractor: FrameExtractor::new(),
            dispatcher,
            translator,
            cmd_rx,
            scan_rx,
            cmd_packet: OutPacket::with_capacity(COMMAND_FRAME_LEN),
            scan_packet: OutPacket::with_capacity(1 + SCAN_SAMPLES + FLUSH_MARKER.len()),
            period: Duration::from_millis(u64::from(1000 / tick_hz.max(1))),
            ticks: 0,
            frames_seen: 0,
        }
    }

    /// Run until Ctrl+C.
    ///
    /// Consumes the loop so that shutdown also drops the dispatcher and the
    /// bus sender clones its handlers hold; downstream consumers waiting on
    /// a closed bus can then finish.
    pub async fn run(mut self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Starting transport loop, one tick every {:?}", self.period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.cycle().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down...");
                    info!("Processed {} frames over {} ticks", self.frames_seen, self.ticks);
                    break;
                }
            }
        }
    }

    /// One tick: read, dispatch, write pending outbound packets.
    ///
    /// Public so tests can drive the loop without a ticker.
    pub async fn cycle(&mut self) {
        self.ticks += 1;

        let mut buf = [0u8; READ_CHUNK];
        match self.port.read_available(&mut buf).await {
            Ok(0) => {}
            Ok(n) => {
                for frame in self.extractor.feed(&buf[..n]) {
                    self.frames_seen += 1;
                    if let Err(e) = self.dispatcher.dispatch(&frame) {
                        // Frame-local failure; the loop keeps going.
                        warn!(tag = frame.tag(), error = %e, "dropping undecodable frame");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "serial read failed");
            }
        }

        self.send_pending_command().await;
        self.send_pending_snapshot().await;

        if self.ticks % STATS_INTERVAL_TICKS == 0 {
            debug!(
                ticks = self.ticks,
                frames = self.frames_seen,
                buffered = self.extractor.buffered(),
                "transport loop statistics"
            );
        }
    }

    async fn send_pending_command(&mut self) {
        if !self.cmd_rx.has_changed().unwrap_or(false) {
            return;
        }
        let cmd = *self.cmd_rx.borrow_and_update();
        let Some(cmd) = cmd else { return };

        let out = self.translator.translate(&cmd);
        if let Err(e) = out.encode(&mut self.cmd_packet) {
            warn!(error = %e, "failed to encode command frame");
            return;
        }
        match self.cmd_packet.as_bytes() {
            Ok(bytes) => {
                if let Err(e) = self.port.write_all(bytes).await {
                    // No retry: the next command supersedes this one anyway.
                    warn!(error = %e, "failed to send command frame");
                } else {
                    let _ = self.port.flush().await;
                    debug!(speed = out.target_speed, steer = out.steer, "sent command frame");
                }
            }
            Err(e) => warn!(error = %e, "command frame not ready"),
        }
    }

    async fn send_pending_snapshot(&mut self) {
        if !self.scan_rx.has_changed().unwrap_or(false) {
            return;
        }
        let snapshot = self.scan_rx.borrow_and_update().clone();
        let Some(snapshot) = snapshot else { return };

        if let Err(e) = snapshot.encode(&mut self.scan_packet) {
            warn!(error = %e, "failed to encode scan frame");
            return;
        }
        match self.scan_packet.as_bytes() {
            Ok(bytes) => {
                if let Err(e) = self.port.write_all(bytes).await {
                    warn!(error = %e, "failed to send scan frame");
                } else {
                    let _ = self.port.flush().await;
                    debug!(len = bytes.len(), "sent scan frame");
                }
            }
            Err(e) => warn!(error = %e, "scan frame not ready"),
        }
    }

    /// Frames dispatched since startup.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{self, BusEvent};
    use crate::proto::TAG_COMMAND;
    use crate::serial::port_trait::mocks::MockSerialPort;

    fn make_loop(
        port: MockSerialPort,
    ) -> (
        TransportLoop<MockSerialPort>,
        bus::BusReceiver,
        CommandSlot,
        SnapshotSlot,
    ) {
        let (bus_tx, bus_rx) = bus::channel();
        let mut dispatcher = Dispatcher::new();
        register_handlers(&mut dispatcher, &bus_tx);
        let (cmd_tx, cmd_rx) = command_slot();
        let (scan_tx, scan_rx) = snapshot_slot();
        let transport = TransportLoop::new(
            port,
            dispatcher,
            CommandTranslator::default(),
            cmd_rx,
            scan_rx,
            20,
        );
        (transport, bus_rx, cmd_tx, scan_tx)
    }

    #[tokio::test]
    async fn test_end_to_end_odometry() {
        let port = MockSerialPort::new();
        let values = [0.25f32, -0.5, 1.25, -2.5, 0.75];
        let mut data = vec![b'O'];
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.push(b'\r');
        port.push_incoming(&data);

        let (mut transport, mut bus_rx, _cmd, _scan) = make_loop(port);
        transport.cycle().await;

        match bus_rx.try_recv().unwrap() {
            BusEvent::Odometry(odo) => {
                assert_eq!(odo.linear_velocity.to_bits(), values[0].to_bits());
                assert_eq!(odo.angular_velocity.to_bits(), values[1].to_bits());
                assert_eq!(odo.position_x.to_bits(), values[2].to_bits());
                assert_eq!(odo.position_y.to_bits(), values[3].to_bits());
                assert_eq!(odo.yaw.to_bits(), values[4].to_bits());
            }
            other => panic!("expected odometry, got {:?}", other),
        }
        assert!(matches!(
            bus_rx.try_recv().unwrap(),
            BusEvent::Transform(_)
        ));
        assert_eq!(transport.frames_seen(), 1);
    }

    #[tokio::test]
    async fn test_bad_frame_does_not_stop_the_loop() {
        let port = MockSerialPort::new();
        // A truncated odometry frame followed by a valid idle frame.
        let mut data = b"O\x01\x02\r".to_vec();
        data.extend_from_slice(b"I\x2A\x00\r");
        port.push_incoming(&data);

        let (mut transport, mut bus_rx, _cmd, _scan) = make_loop(port);
        transport.cycle().await;

        // The broken frame produced nothing; the idle frame still landed.
        match bus_rx.try_recv().unwrap() {
            BusEvent::Idle(idle) => assert_eq!(idle.count, 42),
            other => panic!("expected idle, got {:?}", other),
        }
        assert_eq!(transport.frames_seen(), 2);
    }

    #[tokio::test]
    async fn test_pending_command_is_written_once() {
        let port = MockSerialPort::new();
        let handle = port.clone();
        let (mut transport, _bus, cmd_tx, _scan) = make_loop(port);

        cmd_tx
            .send(Some(VelocityCommand {
                linear_x: 1.0,
                angular_z: 0.0,
            }))
            .unwrap();
        transport.cycle().await;

        let written = handle.get_written_data();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].len(), COMMAND_FRAME_LEN);
        assert_eq!(written[0][0], TAG_COMMAND);
        assert_eq!(&written[0][1..3], &62i16.to_le_bytes());
        assert_eq!(written[0][3], 0);

        // No new command: the next tick writes nothing.
        transport.cycle().await;
        assert_eq!(handle.get_written_data().len(), 1);
    }

    #[tokio::test]
    async fn test_latest_command_wins_within_a_tick() {
        let port = MockSerialPort::new();
        let handle = port.clone();
        let (mut transport, _bus, cmd_tx, _scan) = make_loop(port);

        cmd_tx
            .send(Some(VelocityCommand {
                linear_x: 0.5,
                angular_z: 0.0,
            }))
            .unwrap();
        cmd_tx
            .send(Some(VelocityCommand {
                linear_x: 2.0,
                angular_z: 0.0,
            }))
            .unwrap();
        transport.cycle().await;

        let written = handle.get_written_data();
        assert_eq!(written.len(), 1);
        // Only the newer command (2.0 m/s -> 125 counts) went out.
        assert_eq!(&written[0][1..3], &125i16.to_le_bytes());
    }

    #[tokio::test]
    async fn test_pending_snapshot_is_written() {
        let port = MockSerialPort::new();
        let handle = port.clone();
        let (mut transport, _bus, _cmd, scan_tx) = make_loop(port);

        scan_tx
            .send(Some(RangeSnapshot::from_ranges(&[5.0; SCAN_SAMPLES])))
            .unwrap();
        transport.cycle().await;

        let written = handle.get_written_data();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].len(), 1 + SCAN_SAMPLES + FLUSH_MARKER.len());
        assert_eq!(written[0][0], b'L');
        assert_eq!(written[0][1], 250);
    }

    #[tokio::test]
    async fn test_write_failure_is_not_retried() {
        let port = MockSerialPort::new();
        let handle = port.clone();
        handle.set_write_error(std::io::ErrorKind::BrokenPipe);
        let (mut transport, _bus, cmd_tx, _scan) = make_loop(port);

        cmd_tx
            .send(Some(VelocityCommand {
                linear_x: 1.0,
                angular_z: 0.0,
            }))
            .unwrap();
        transport.cycle().await;
        assert!(handle.get_written_data().is_empty());

        // The failed frame is gone for good; only a fresh command writes.
        transport.cycle().await;
        assert!(handle.get_written_data().is_empty());
    }

    #[tokio::test]
    async fn test_quiet_tick_does_nothing() {
        let port = MockSerialPort::new();
        let handle = port.clone();
        let (mut transport, mut bus_rx, _cmd, _scan) = make_loop(port);

        transport.cycle().await;
        assert!(bus_rx.try_recv().is_err());
        assert!(handle.get_written_data().is_empty());
    }

    #[tokio::test]
    async fn test_zero_tick_rate_is_clamped() {
        let port = MockSerialPort::new();
        let (bus_tx, _bus_rx) = bus::channel();
        let mut dispatcher = Dispatcher::new();
        register_handlers(&mut dispatcher, &bus_tx);
        let (_cmd_tx, cmd_rx) = command_slot();
        let (_scan_tx, scan_rx) = snapshot_slot();

        let mut transport = TransportLoop::new(
            port,
            dispatcher,
            CommandTranslator::default(),
            cmd_rx,
            scan_rx,
            0,
        );
        assert_eq!(transport.period, Duration::from_millis(1000));
        transport.cycle().await;
    }

    #[tokio::test]
    async fn test_dropping_the_loop_closes_the_bus() {
        // The handlers inside the loop hold bus sender clones; the telemetry
        // sink must only outlive the loop itself, not wait forever.
        let (transport, bus_rx, _cmd, _scan) = make_loop(MockSerialPort::new());
        let sink = tokio::spawn(crate::telemetry::run_sink(bus_rx, None));

        drop(transport);
        tokio::time::timeout(Duration::from_millis(500), sink)
            .await
            .expect("sink should finish once the last bus sender is gone")
            .unwrap();
    }

    #[tokio::test]
    async fn test_partial_frame_across_ticks() {
        let port = MockSerialPort::new();
        let handle = port.clone();
        handle.push_incoming(b"I\x2A");
        handle.push_incoming(b"\x00\r");

        let (mut transport, mut bus_rx, _cmd, _scan) = make_loop(port);
        transport.cycle().await;
        assert!(bus_rx.try_recv().is_err());

        transport.cycle().await;
        match bus_rx.try_recv().unwrap() {
            BusEvent::Idle(idle) => assert_eq!(idle.count, 42),
            other => panic!("expected idle, got {:?}", other),
        }
    }
}
