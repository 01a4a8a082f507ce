//! The protocol layer above the serial processor: heartbeat keepalives,
//! connection liveness, acknowledged notification delivery, and the
//! role-specific send operations.
//!
//! A link runs one pump thread for its whole lifetime; dropping the link
//! flags the pump and joins it. Handlers run on the pump thread and must not
//! wait for acknowledgements from the same link.

use crate::error::{ErrorUtils, LinkError, LinkResult};
use crate::logging::{self, Discard, Logger};
use crate::processor::{MessageHook, SerialProcessor};
use crate::transceiver::{DualUdpTransceiver, Transceiver, UdpTransceiver};
use crate::wire::{
    string_from_wire, DiagnosticState, FieldId, FrameId, KillSwitchState, LeakState,
    NotificationType, ThrusterState,
};
use hashbrown::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Which side of the tether this link runs on. The role fixes the bump frame
/// and gates the role-specific send operations.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LinkRole {
    Robot,
    Opbox,
}

impl LinkRole {
    /// Keepalive frame this role owns: each side bumps its own status frame.
    pub fn bump_frame(self) -> FrameId {
        match self {
            LinkRole::Robot => FrameId::RobotStatus,
            LinkRole::Opbox => FrameId::OpboxStatus,
        }
    }

    fn label(self) -> &'static str {
        match self {
            LinkRole::Robot => "robot-link",
            LinkRole::Opbox => "opbox-link",
        }
    }
}

pub type NotificationHandler = Box<dyn Fn(NotificationType, &str, &str) + Send + Sync>;
pub type StatusHandler =
    Box<dyn Fn(KillSwitchState, ThrusterState, DiagnosticState, LeakState) + Send + Sync>;
pub type KillButtonHandler = Box<dyn Fn(KillSwitchState) + Send + Sync>;
pub type ConnectionHandler = Box<dyn Fn(bool) + Send + Sync>;

/// Handlers dispatched synchronously from the pump thread, in decode order.
pub struct LinkCallbacks {
    pub on_notification: NotificationHandler,
    pub on_status: StatusHandler,
    pub on_kill_button: KillButtonHandler,
    pub on_connection_change: ConnectionHandler,
}

impl Default for LinkCallbacks {
    fn default() -> LinkCallbacks {
        LinkCallbacks {
            on_notification: Box::new(|_, _, _| {}),
            on_status: Box::new(|_, _, _, _| {}),
            on_kill_button: Box::new(|_| {}),
            on_connection_change: Box::new(|_| {}),
        }
    }
}

/// Result of the embedding notification surface.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NotificationOutcome {
    pub success: bool,
    pub message: String,
}

/// Notification uids are unique within a sender's outstanding-ack window;
/// one wrapping counter for the whole process is more than enough.
static NEXT_NOTIFICATION_UID: AtomicU8 = AtomicU8::new(0);

pub struct Link {
    processor: Arc<SerialProcessor>,
    role: LinkRole,
    stop: Arc<AtomicBool>,
    pump: Option<thread::JoinHandle<()>>,
    /// At most one acknowledged send may be outstanding per link.
    send_gate: Mutex<()>,
    /// Shared with the pump: explicit status sends push the next bump out.
    last_send: Arc<Mutex<Option<Instant>>>,
    log: Logger,
}

impl Link {
    /// Robot-side link: talks to the operator box at `address:port`, bumps
    /// the robot status frame.
    pub fn robot_side<'a, L: Into<Option<&'a Logger>>>(
        address: &str,
        port: u16,
        callbacks: LinkCallbacks,
        log: L,
    ) -> LinkResult<Link> {
        let transceiver = Self::build_transceiver(LinkRole::Robot, address, port)?;
        Self::new(LinkRole::Robot, transceiver, callbacks, log)
    }

    /// Opbox-side link: talks to the robot at `address:port`, bumps the
    /// opbox status frame.
    pub fn opbox_side<'a, L: Into<Option<&'a Logger>>>(
        address: &str,
        port: u16,
        callbacks: LinkCallbacks,
        log: L,
    ) -> LinkResult<Link> {
        let transceiver = Self::build_transceiver(LinkRole::Opbox, address, port)?;
        Self::new(LinkRole::Opbox, transceiver, callbacks, log)
    }

    /// On one host the peers split `{port, port + 1}`: the opbox side
    /// receives on `port`, the robot side on `port + 1`. Remote peers share
    /// a single well-known port instead.
    fn build_transceiver(
        role: LinkRole,
        address: &str,
        port: u16,
    ) -> LinkResult<Box<dyn Transceiver>> {
        if address == "localhost" || address == "127.0.0.1" {
            let (recv_port, send_port) = match role {
                LinkRole::Opbox => (port, port + 1),
                LinkRole::Robot => (port + 1, port),
            };

            Ok(Box::new(DualUdpTransceiver::new(address, recv_port, send_port)?))
        } else {
            Ok(Box::new(UdpTransceiver::new(address, port)?))
        }
    }

    /// Builds a link over an arbitrary transceiver. Writes the startup
    /// defaults, then spawns the pump thread.
    pub fn new<'a, L: Into<Option<&'a Logger>>>(
        role: LinkRole,
        transceiver: Box<dyn Transceiver>,
        callbacks: LinkCallbacks,
        log: L,
    ) -> LinkResult<Link> {
        let log = match log.into() {
            Some(log) => log.new(logging::o!("link" => role.label())),
            None => Logger::root(Discard, logging::o!()),
        };

        let callbacks = Arc::new(callbacks);
        let seen_uids = Arc::new(Mutex::new(HashSet::new()));
        let hook = Self::message_hook(callbacks.clone(), seen_uids, log.clone());
        let processor = Arc::new(SerialProcessor::new(transceiver, hook, &log));

        // Startup defaults: everything in its safe state.
        let now = Instant::now();
        processor.set_field_u8(FieldId::RobotKillState, KillSwitchState::Killed as u8, now);
        processor.set_field_u8(FieldId::ThrusterState, ThrusterState::Idle as u8, now);
        processor.set_field_u8(FieldId::DiagnosticsState, DiagnosticState::Ok as u8, now);
        processor.set_field_u8(FieldId::LeakState, LeakState::Ok as u8, now);
        processor.set_field_u8(FieldId::KillButtonState, KillSwitchState::Killed as u8, now);

        let stop = Arc::new(AtomicBool::new(false));
        let last_send = Arc::new(Mutex::new(None));
        let pump = {
            let processor = processor.clone();
            let callbacks = callbacks.clone();
            let stop = stop.clone();
            let last_send = last_send.clone();
            let log = log.clone();
            let bump = role.bump_frame();

            thread::Builder::new()
                .name(format!("{}-pump", role.label()))
                .spawn(move || Self::pump_loop(processor, callbacks, stop, last_send, bump, log))?
        };

        logging::debug!(log, "link constructed");

        Ok(Link {
            processor,
            role,
            stop,
            pump: Some(pump),
            send_gate: Mutex::new(()),
            last_send,
            log,
        })
    }

    fn message_hook(
        callbacks: Arc<LinkCallbacks>,
        seen_uids: Arc<Mutex<HashSet<u8>>>,
        log: Logger,
    ) -> MessageHook {
        Box::new(move |proc, frame| match frame.frame {
            FrameId::RobotStatus => {
                (callbacks.on_status)(
                    frame
                        .get_u8(FieldId::RobotKillState)
                        .map(KillSwitchState::from_wire)
                        .unwrap_or(KillSwitchState::Killed),
                    frame
                        .get_u8(FieldId::ThrusterState)
                        .map(ThrusterState::from_wire)
                        .unwrap_or(ThrusterState::Idle),
                    frame
                        .get_u8(FieldId::DiagnosticsState)
                        .map(DiagnosticState::from_wire)
                        .unwrap_or(DiagnosticState::Error),
                    frame
                        .get_u8(FieldId::LeakState)
                        .map(LeakState::from_wire)
                        .unwrap_or(LeakState::Leaking),
                );
            }
            FrameId::OpboxStatus => {
                (callbacks.on_kill_button)(
                    frame
                        .get_u8(FieldId::KillButtonState)
                        .map(KillSwitchState::from_wire)
                        .unwrap_or(KillSwitchState::Killed),
                );
            }
            FrameId::Notification => {
                let uid = frame.get_u8(FieldId::NotificationUid).unwrap_or(0);

                let fresh = seen_uids
                    .lock()
                    .expect("Seen-uid mutex poisoned")
                    .insert(uid);

                if fresh {
                    let sensor = frame
                        .get(FieldId::NotificationSensorName)
                        .map(string_from_wire)
                        .unwrap_or_default();
                    let desc = frame
                        .get(FieldId::NotificationDescription)
                        .map(string_from_wire)
                        .unwrap_or_default();
                    let severity = frame
                        .get_u8(FieldId::NotificationType)
                        .map(NotificationType::from_wire)
                        .unwrap_or(NotificationType::Error);

                    logging::debug!(log, "notification received";
                                    "uid" => uid,
                                    "severity" => ?severity,
                                    "sensor" => &sensor);

                    (callbacks.on_notification)(severity, &sensor, &desc);
                }

                // Duplicates are not redelivered, but they are always acked.
                proc.set_field_u8(FieldId::AckedNotificationUid, uid, Instant::now());
                if proc.send(FrameId::Ack).has_failed() {
                    logging::debug!(log, "ack transmit failed"; "uid" => uid);
                }
            }
            // The ack is visible through the field store; `send_notification`
            // polls it there.
            FrameId::Ack => {}
            // Keepalive payload is meaningless; receipt alone refreshed the
            // liveness stamp.
            FrameId::Nothing => {}
        })
    }

    fn pump_loop(
        processor: Arc<SerialProcessor>,
        callbacks: Arc<LinkCallbacks>,
        stop: Arc<AtomicBool>,
        last_send: Arc<Mutex<Option<Instant>>>,
        bump: FrameId,
        log: Logger,
    ) {
        logging::debug!(log, "pump thread starting");

        let mut connected = false;

        while !stop.load(Ordering::Relaxed) {
            let now = Instant::now();
            processor.update(now);

            let bump_due = {
                let last_send = last_send.lock().expect("Send stamp poisoned");
                last_send
                    .map(|sent| now.duration_since(sent) > crate::HEARTBEAT_INTERVAL)
                    .unwrap_or(true)
            };

            if bump_due {
                if processor.send(bump).has_failed() {
                    logging::debug!(log, "bump transmit failed"; "frame" => ?bump);
                }
                *last_send.lock().expect("Send stamp poisoned") = Some(now);
            }

            let now_connected = Self::peer_alive(&processor, Instant::now());
            if now_connected != connected {
                logging::info!(log, "connection state changed"; "connected" => now_connected);
                (callbacks.on_connection_change)(now_connected);
                connected = now_connected;
            }

            thread::sleep(crate::PUMP_TICK);
        }

        logging::debug!(log, "pump thread ending");
    }

    fn peer_alive(processor: &SerialProcessor, now: Instant) -> bool {
        processor
            .last_msg_recv_time()
            .map(|stamp| now.duration_since(stamp) < crate::STALE_TIMEOUT)
            .unwrap_or(false)
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    /// True while the peer has been heard from within the stale window.
    pub fn connected(&self) -> bool {
        Self::peer_alive(&self.processor, Instant::now())
    }

    pub fn next_notification_uid() -> u8 {
        NEXT_NOTIFICATION_UID.fetch_add(1, Ordering::Relaxed)
    }

    /// Retransmits a notification frame until the peer acknowledges its uid
    /// or `timeout` passes. Returns whether the acknowledgement arrived.
    pub fn send_notification(
        &self,
        severity: NotificationType,
        sensor: &str,
        desc: &str,
        timeout: Duration,
    ) -> bool {
        let _outstanding = self.send_gate.lock().expect("Send gate poisoned");

        let uid = Self::next_notification_uid();
        let started = Instant::now();
        let mut acked = false;

        while !acked && started.elapsed() < timeout {
            self.transmit_notification(uid, severity, sensor, desc);
            acked = self.wait_for_ack(uid, crate::ACK_POLL_WINDOW);
        }

        logging::debug!(self.log, "notification send finished";
                        "uid" => uid,
                        "acked" => acked);

        acked
    }

    /// Embedding surface for a topside client: refuses up front when the
    /// peer is gone, and reports the outcome as `{success, message}`.
    pub fn send_opbox_notification(
        &self,
        severity: NotificationType,
        sensor: &str,
        desc: &str,
    ) -> NotificationOutcome {
        if !self.connected() {
            return NotificationOutcome {
                success: false,
                message: "Cannot send notification because the peer is not connected".to_string(),
            };
        }

        let success = self.send_notification(severity, sensor, desc, crate::NOTIFICATION_TIMEOUT);

        NotificationOutcome {
            success,
            message: if success {
                "Success".to_string()
            } else {
                "Peer is connected, but the notification was not acknowledged".to_string()
            },
        }
    }

    fn transmit_notification(&self, uid: u8, severity: NotificationType, sensor: &str, desc: &str) {
        let now = Instant::now();

        self.processor.set_field_u8(FieldId::NotificationUid, uid, now);
        self.processor.set_field_u8(FieldId::NotificationType, severity as u8, now);
        self.processor.set_field_str(FieldId::NotificationSensorName, sensor, now);
        self.processor.set_field_str(FieldId::NotificationDescription, desc, now);

        if self.processor.send(FrameId::Notification).has_failed() {
            logging::debug!(self.log, "notification transmit failed"; "uid" => uid);
        }
    }

    fn wait_for_ack(&self, uid: u8, window: Duration) -> bool {
        let started = Instant::now();

        loop {
            if self.processor.get_field_u8(FieldId::AckedNotificationUid) == Some(uid) {
                return true;
            }

            if started.elapsed() >= window {
                return false;
            }

            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Writes the kill-button field and pushes an opbox status frame. Only
    /// the opbox side owns the kill button.
    pub fn send_kill_button_state(&self, state: KillSwitchState) -> LinkResult<()> {
        if self.role != LinkRole::Opbox {
            return Err(LinkError::Unsupported("send_kill_button_state"));
        }

        logging::debug!(self.log, "sending kill button state"; "state" => ?state);

        let now = Instant::now();
        self.processor.set_field_u8(FieldId::KillButtonState, state as u8, now);
        self.processor.send(FrameId::OpboxStatus)?;

        // The frame just carried the full status; push the next bump out.
        *self.last_send.lock().expect("Send stamp poisoned") = Some(now);
        Ok(())
    }

    /// Writes the four vehicle status fields and pushes a robot status
    /// frame. Only the robot side reports vehicle status.
    pub fn send_robot_state(
        &self,
        kill: KillSwitchState,
        thruster: ThrusterState,
        diag: DiagnosticState,
        leak: LeakState,
    ) -> LinkResult<()> {
        if self.role != LinkRole::Robot {
            return Err(LinkError::Unsupported("send_robot_state"));
        }

        logging::debug!(self.log, "sending robot state";
                        "kill" => ?kill,
                        "thruster" => ?thruster,
                        "diag" => ?diag,
                        "leak" => ?leak);

        let now = Instant::now();
        self.processor.set_field_u8(FieldId::RobotKillState, kill as u8, now);
        self.processor.set_field_u8(FieldId::ThrusterState, thruster as u8, now);
        self.processor.set_field_u8(FieldId::DiagnosticsState, diag as u8, now);
        self.processor.set_field_u8(FieldId::LeakState, leak as u8, now);
        self.processor.send(FrameId::RobotStatus)?;

        *self.last_send.lock().expect("Send stamp poisoned") = Some(now);
        Ok(())
    }
}

impl Drop for Link {
    /// Destruction is the cancellation primitive: flag the pump, then join.
    /// Must not run on the pump thread itself.
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);

        if let Some(pump) = self.pump.take() {
            if pump.join().is_err() {
                logging::error!(self.log, "pump thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode, Decoder};
    use crate::store::FieldStore;
    use std::net::UdpSocket;
    use std::thread::sleep;

    #[derive(Default)]
    struct Recorded {
        status: Mutex<Option<(KillSwitchState, ThrusterState, DiagnosticState, LeakState)>>,
        kill_button: Mutex<Option<KillSwitchState>>,
        notifications: Mutex<Vec<(NotificationType, String, String)>>,
        transitions: Mutex<Vec<bool>>,
    }

    fn recording_callbacks() -> (Arc<Recorded>, LinkCallbacks) {
        let recorded = Arc::new(Recorded::default());

        let status = recorded.clone();
        let kill_button = recorded.clone();
        let notifications = recorded.clone();
        let transitions = recorded.clone();

        let callbacks = LinkCallbacks {
            on_status: Box::new(move |kill, thruster, diag, leak| {
                *status.status.lock().unwrap() = Some((kill, thruster, diag, leak));
            }),
            on_kill_button: Box::new(move |state| {
                *kill_button.kill_button.lock().unwrap() = Some(state);
            }),
            on_notification: Box::new(move |severity, sensor, desc| {
                notifications.notifications.lock().unwrap().push((
                    severity,
                    sensor.to_string(),
                    desc.to_string(),
                ));
            }),
            on_connection_change: Box::new(move |connected| {
                transitions.transitions.lock().unwrap().push(connected);
            }),
        };

        (recorded, callbacks)
    }

    /// Robot and opbox links wired up over a localhost port couple. Each test
    /// gets its own port block since the suite runs in parallel.
    fn link_pair(port: u16) -> (Link, Arc<Recorded>, Link, Arc<Recorded>) {
        let (robot_recorded, robot_callbacks) = recording_callbacks();
        let (opbox_recorded, opbox_callbacks) = recording_callbacks();

        let robot = Link::robot_side("localhost", port, robot_callbacks, None).unwrap();
        let opbox = Link::opbox_side("localhost", port, opbox_callbacks, None).unwrap();

        (robot, robot_recorded, opbox, opbox_recorded)
    }

    #[test]
    fn test_bump_frame_assignment() {
        assert_eq!(LinkRole::Robot.bump_frame(), FrameId::RobotStatus);
        assert_eq!(LinkRole::Opbox.bump_frame(), FrameId::OpboxStatus);
    }

    #[test]
    fn test_role_gated_operations() {
        let (robot, _, opbox, _) = link_pair(39000);

        assert_eq!(
            robot.send_kill_button_state(KillSwitchState::Killed),
            Err(LinkError::Unsupported("send_kill_button_state"))
        );
        assert_eq!(
            opbox.send_robot_state(
                KillSwitchState::Killed,
                ThrusterState::Idle,
                DiagnosticState::Ok,
                LeakState::Ok,
            ),
            Err(LinkError::Unsupported("send_robot_state"))
        );
    }

    #[test]
    fn test_connects_within_a_heartbeat_or_two() {
        let (robot, _, opbox, _) = link_pair(39010);

        sleep(Duration::from_millis(200));

        assert!(robot.connected());
        assert!(opbox.connected());
    }

    #[test]
    fn test_kill_button_round_trip() {
        let (_robot, robot_recorded, opbox, _) = link_pair(39020);

        sleep(Duration::from_millis(150));

        opbox.send_kill_button_state(KillSwitchState::Killed).unwrap();
        sleep(Duration::from_millis(250));
        assert_eq!(
            *robot_recorded.kill_button.lock().unwrap(),
            Some(KillSwitchState::Killed)
        );

        opbox.send_kill_button_state(KillSwitchState::Unkilled).unwrap();
        sleep(Duration::from_millis(250));
        assert_eq!(
            *robot_recorded.kill_button.lock().unwrap(),
            Some(KillSwitchState::Unkilled)
        );

        // Idempotent repeats still deliver.
        opbox.send_kill_button_state(KillSwitchState::Killed).unwrap();
        sleep(Duration::from_millis(250));
        assert_eq!(
            *robot_recorded.kill_button.lock().unwrap(),
            Some(KillSwitchState::Killed)
        );

        opbox.send_kill_button_state(KillSwitchState::Killed).unwrap();
        sleep(Duration::from_millis(250));
        assert_eq!(
            *robot_recorded.kill_button.lock().unwrap(),
            Some(KillSwitchState::Killed)
        );
    }

    #[test]
    fn test_robot_state_persists_through_heartbeats() {
        let (robot, _, _opbox, opbox_recorded) = link_pair(39030);

        sleep(Duration::from_millis(150));

        robot
            .send_robot_state(
                KillSwitchState::Unkilled,
                ThrusterState::Active,
                DiagnosticState::Warn,
                LeakState::Leaking,
            )
            .unwrap();

        sleep(Duration::from_millis(250));

        let expected = (
            KillSwitchState::Unkilled,
            ThrusterState::Active,
            DiagnosticState::Warn,
            LeakState::Leaking,
        );
        assert_eq!(*opbox_recorded.status.lock().unwrap(), Some(expected));

        // No further explicit sends; the bump frame keeps carrying the state.
        sleep(Duration::from_millis(1500));
        assert_eq!(*opbox_recorded.status.lock().unwrap(), Some(expected));
    }

    #[test]
    fn test_acked_notification_success() {
        let (robot, robot_recorded, opbox, opbox_recorded) = link_pair(39040);

        sleep(Duration::from_millis(150));

        assert!(opbox.send_notification(
            NotificationType::Warning,
            "test",
            "test description",
            Duration::from_millis(500),
        ));
        {
            let notifications = robot_recorded.notifications.lock().unwrap();
            assert_eq!(
                notifications.last(),
                Some(&(
                    NotificationType::Warning,
                    "test".to_string(),
                    "test description".to_string()
                ))
            );
        }

        assert!(robot.send_notification(
            NotificationType::Fatal,
            "opbox",
            "fatal issue",
            Duration::from_millis(500),
        ));
        {
            let notifications = opbox_recorded.notifications.lock().unwrap();
            assert_eq!(
                notifications.last(),
                Some(&(
                    NotificationType::Fatal,
                    "opbox".to_string(),
                    "fatal issue".to_string()
                ))
            );
        }
    }

    #[test]
    fn test_notification_fails_without_peer() {
        let (robot, _, opbox, _) = link_pair(39050);

        sleep(Duration::from_millis(150));
        drop(opbox);
        sleep(Duration::from_millis(600));

        assert!(!robot.send_notification(
            NotificationType::Fatal,
            "opbox",
            "fatal issue",
            Duration::from_millis(500),
        ));
    }

    #[test]
    fn test_connection_loss_fires_once() {
        let (robot, robot_recorded, opbox, _) = link_pair(39060);

        sleep(Duration::from_millis(200));
        assert!(robot.connected());

        drop(opbox);

        // Inside the stale window the link still reads connected.
        sleep(Duration::from_millis(200));
        assert!(robot.connected());

        sleep(Duration::from_millis(600));
        assert!(!robot.connected());

        let transitions = robot_recorded.transitions.lock().unwrap();
        assert_eq!(*transitions, vec![true, false]);
    }

    #[test]
    fn test_embedding_surface_reports_disconnect() {
        let (robot, _, opbox, _) = link_pair(39070);

        drop(opbox);
        sleep(Duration::from_millis(600));

        let outcome =
            robot.send_opbox_notification(NotificationType::Warning, "depth", "sensor offline");

        assert!(!outcome.success);
        assert!(outcome.message.contains("not connected"));
    }

    /// Replays the same notification frame twice at the wire level: the
    /// handler must fire once, but every copy gets an acknowledgement.
    #[test]
    fn test_duplicate_notification_acked_but_not_redelivered() {
        let port = 39080;
        let (robot_recorded, robot_callbacks) = recording_callbacks();

        // Robot side receives on port + 1 and sends to port; the test poses
        // as the opbox peer on the other half of the couple.
        let robot = Link::robot_side("localhost", port, robot_callbacks, None).unwrap();
        let peer = UdpSocket::bind(("127.0.0.1", port)).unwrap();
        peer.set_read_timeout(Some(Duration::from_millis(100))).unwrap();

        let scratch = FieldStore::new();
        let now = Instant::now();
        scratch.set_u8(FieldId::NotificationType, NotificationType::Error as u8, now);
        scratch.set_u8(FieldId::NotificationUid, 211, now);
        scratch.set_str(FieldId::NotificationSensorName, "depth", now);
        scratch.set_str(FieldId::NotificationDescription, "flooded", now);
        let frame = encode(FrameId::Notification, &scratch).unwrap();

        peer.send_to(&frame, ("127.0.0.1", port + 1)).unwrap();
        sleep(Duration::from_millis(100));
        peer.send_to(&frame, ("127.0.0.1", port + 1)).unwrap();
        sleep(Duration::from_millis(100));

        // Drain everything the robot side sent us and count the acks for our
        // uid. Bump frames are interleaved; the decoder sorts them out.
        let mut decoder = Decoder::new(None);
        let mut buf = [0u8; 512];
        let mut acks = 0;

        while let Ok((count, _)) = peer.recv_from(&mut buf) {
            decoder.push(&buf[..count]);
        }

        while let Some(frame) = decoder.next_frame() {
            if frame.frame == FrameId::Ack {
                assert_eq!(frame.get_u8(FieldId::AckedNotificationUid), Some(211));
                acks += 1;
            }
        }

        assert_eq!(acks, 2);

        let notifications = robot_recorded.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0],
            (
                NotificationType::Error,
                "depth".to_string(),
                "flooded".to_string()
            )
        );

        drop(notifications);
        drop(robot);
    }

    #[test]
    fn test_notification_uids_are_distinct() {
        let first = Link::next_notification_uid();
        let second = Link::next_notification_uid();
        let third = Link::next_notification_uid();

        assert_ne!(first, second);
        assert_ne!(second, third);
    }
}
