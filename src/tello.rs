use std::{
    io::ErrorKind,
    net::UdpSocket,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex, RwLock,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    dump::ConnDumper,
    env,
    error::DroneError,
    flight::Velocity,
    messages::{self, TelloState},
    session::{CameraDirection, DroneSession},
    utils,
    video::{FrameAssembler, FrameRead, VideoDecoder},
};

const SOCKET_POLL: Duration = Duration::from_millis(500);

/// Session with a Tello drone in SDK (text command) mode.
#[derive(Debug)]
pub struct TelloSession {
    remote_addr: String,
    state_port: u16,
    video_port: u16,
    cmd_conn: UdpSocket,
    responses: Arc<Mutex<Receiver<String>>>,
    running: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    streaming: Arc<AtomicBool>,
    flying: Arc<RwLock<bool>>,
    rc: Arc<RwLock<Velocity>>,
    state: Arc<RwLock<Option<TelloState>>>,
    frames: FrameRead,
    dumper: Option<ConnDumper>,
    cmd_timeout: Duration,
    maneuver_timeout: Duration,
    rc_interval: Duration,
}

impl Clone for TelloSession {
    fn clone(&self) -> Self {
        Self {
            remote_addr: self.remote_addr.clone(),
            state_port: self.state_port,
            video_port: self.video_port,
            cmd_conn: utils::udp_sock_clone(&self.cmd_conn),
            responses: self.responses.clone(),
            running: self.running.clone(),
            connected: self.connected.clone(),
            streaming: self.streaming.clone(),
            flying: self.flying.clone(),
            rc: self.rc.clone(),
            state: self.state.clone(),
            frames: self.frames.clone(),
            dumper: self.dumper.clone(),
            cmd_timeout: self.cmd_timeout,
            maneuver_timeout: self.maneuver_timeout,
            rc_interval: self.rc_interval,
        }
    }
}

/// Addresses and timeouts of one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub remote_addr: String,
    pub local_addr: String,
    pub state_port: u16,
    pub video_port: u16,
    pub cmd_timeout: Duration,
    pub maneuver_timeout: Duration,
    pub rc_interval: Duration,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self {
            remote_addr: format!("{}:{}", *env::ENV_TELLO_ADDR, *env::ENV_TELLO_CMD_PORT),
            local_addr: format!("0.0.0.0:{}", *env::ENV_TELLO_LOCAL_PORT),
            state_port: *env::ENV_TELLO_STATE_PORT,
            video_port: *env::ENV_TELLO_VIDEO_PORT,
            cmd_timeout: Duration::from_millis(*env::ENV_TELLO_CMD_TIMEOUT_MS),
            maneuver_timeout: Duration::from_millis(*env::ENV_TELLO_MANEUVER_TIMEOUT_MS),
            rc_interval: Duration::from_millis(*env::ENV_TELLO_RC_INTERVAL_MS),
        }
    }
}

impl TelloSession {
    pub fn new() -> Result<Self, DroneError> {
        Self::with_config(SessionConfig::from_env())
    }

    /// Binds the command socket and starts listening for replies.
    pub fn with_config(config: SessionConfig) -> Result<Self, DroneError> {
        let cmd_conn = utils::udp_sock(&config.local_addr)?;
        cmd_conn.set_read_timeout(Some(SOCKET_POLL))?;
        let (tx, rx) = mpsc::channel();
        let session = Self {
            remote_addr: config.remote_addr,
            state_port: config.state_port,
            video_port: config.video_port,
            cmd_conn,
            responses: Arc::new(Mutex::new(rx)),
            running: Arc::new(AtomicBool::new(true)),
            connected: Arc::new(AtomicBool::new(false)),
            streaming: Arc::new(AtomicBool::new(false)),
            flying: Arc::new(RwLock::new(false)),
            rc: Arc::new(RwLock::new(Velocity::ZERO)),
            state: Arc::new(RwLock::new(None)),
            frames: FrameRead::new(),
            dumper: ConnDumper::from_env("ctrl_comm"),
            cmd_timeout: config.cmd_timeout,
            maneuver_timeout: config.maneuver_timeout,
            rc_interval: config.rc_interval,
        };
        let t = session.clone();
        thread::Builder::new()
            .name("tello-responses".to_owned())
            .spawn(move || t.response_receiver(tx))?;
        Ok(session)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> Option<TelloState> {
        self.state.read().ok().and_then(|g| g.clone())
    }

    fn send_control_command(&self, command: &str, timeout: Duration) -> Result<(), DroneError> {
        let method_name = "send_control_command";
        let rx = match self.responses.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        while let Ok(stale) = rx.try_recv() {
            tracing::debug!(method_name, %stale, "dropping stale response");
        }
        tracing::debug!(method_name, command, "send");
        self.cmd_conn.send_to(command.as_bytes(), &self.remote_addr)?;
        if let Some(ref dumper) = self.dumper {
            dumper.sent(command);
        }
        let started = Instant::now();
        match rx.recv_timeout(timeout) {
            Ok(response) => {
                tracing::debug!(method_name, command, %response, elapsed = ?started.elapsed(), "reply");
                if response.eq_ignore_ascii_case(messages::RESPONSE_OK) {
                    Ok(())
                } else {
                    Err(DroneError::CommandFailed {
                        command: command.to_owned(),
                        response,
                    })
                }
            }
            Err(RecvTimeoutError::Timeout) => Err(DroneError::Timeout {
                command: command.to_owned(),
                timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(DroneError::NotConnected),
        }
    }

    fn send_command_without_return(&self, command: &str) -> Result<(), DroneError> {
        let method_name = "send_command_without_return";
        tracing::trace!(method_name, command, "send");
        self.cmd_conn.send_to(command.as_bytes(), &self.remote_addr)?;
        if let Some(ref dumper) = self.dumper {
            dumper.sent(command);
        }
        Ok(())
    }

    fn set_flying(&self, flying: bool) {
        match self.flying.write() {
            Ok(mut g) => *g = flying,
            Err(poisoned) => *poisoned.into_inner() = flying,
        }
    }

    fn spawn_worker<F>(&self, name: &str, f: F) -> Result<(), DroneError>
    where
        F: FnOnce(TelloSession) + Send + 'static,
    {
        let t = self.clone();
        thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || f(t))?;
        Ok(())
    }

    fn response_receiver(&self, tx: Sender<String>) {
        let method_name = "response_recv";
        let mut buff: [u8; 1024] = [0; 1024];

        while self.running.load(Ordering::Relaxed) {
            let nread = match self.cmd_conn.recv(&mut buff) {
                Ok(n) => n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => {
                    tracing::warn!(method_name, "udp read error: {e}");
                    continue;
                }
            };
            let response = String::from_utf8_lossy(&buff[..nread]).trim().to_owned();
            if let Some(ref dumper) = self.dumper {
                dumper.received(&response);
            }
            tracing::debug!(method_name, %response, "received");
            if tx.send(response).is_err() {
                tracing::warn!(method_name, "response channel closed");
                break;
            }
        }
        tracing::debug!(method_name, "stopped");
    }

    fn state_receiver(&self, conn: UdpSocket) {
        let method_name = "state_recv";
        let mut buff: [u8; 1024] = [0; 1024];

        while self.running.load(Ordering::Relaxed) {
            let nread = match conn.recv(&mut buff) {
                Ok(n) => n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => {
                    tracing::warn!(method_name, "udp read error: {e}");
                    continue;
                }
            };
            let raw = String::from_utf8_lossy(&buff[..nread]);
            match raw.parse::<TelloState>() {
                Ok(st) => {
                    tracing::trace!(method_name, "state: {:?}", st);
                    if let Ok(mut g) = self.state.write() {
                        *g = Some(st);
                    }
                }
                Err(e) => tracing::warn!(method_name, "can't parse state: {e}"),
            }
        }
        tracing::debug!(method_name, "stopped");
    }

    fn video_receiver(&self, conn: UdpSocket) {
        let method_name = "video_recv";
        let mut decoder = match VideoDecoder::new() {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(method_name, "video disabled: {e}");
                return;
            }
        };
        let mut assembler = FrameAssembler::new();
        let mut buff: [u8; 2048] = [0; 2048];

        while self.running.load(Ordering::Relaxed) && self.streaming.load(Ordering::Relaxed) {
            let nread = match conn.recv(&mut buff) {
                Ok(n) => n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => {
                    tracing::warn!(method_name, "udp read error: {e}");
                    continue;
                }
            };
            tracing::trace!(method_name, nread, "read video stream data");
            let Some(frame) = assembler.push(&buff[..nread]) else {
                continue;
            };
            match decoder.decode(&frame) {
                Ok(Some(image)) => self.frames.publish(image),
                Ok(None) => {}
                Err(e) => tracing::warn!(method_name, "{e}"),
            }
        }
        tracing::debug!(method_name, "stopped");
    }

    /// The drone lands on its own after a few seconds without commands, so
    /// the current rc vector is re-sent while flying.
    fn rc_keepalive(&self) {
        let method_name = "rc_keepalive";
        while self.running.load(Ordering::Relaxed) {
            let start = Instant::now();
            if self.is_flying() {
                let v = match self.rc.read() {
                    Ok(g) => *g,
                    Err(poisoned) => *poisoned.into_inner(),
                };
                if let Err(e) = self.send_command_without_return(&messages::rc(&v)) {
                    tracing::warn!(method_name, "unable to send rc update: {e}");
                }
            }
            let dur = start.elapsed();
            if dur < self.rc_interval {
                thread::sleep(self.rc_interval - dur);
            }
        }
        tracing::debug!(method_name, "stopped");
    }
}

impl DroneSession for TelloSession {
    fn connect(&self) -> Result<(), DroneError> {
        let method_name = "connect";
        tracing::info!(method_name, remote_addr = %self.remote_addr, "entering sdk mode");
        self.send_control_command(messages::CMD_ENTER_SDK, self.cmd_timeout)?;
        self.connected.store(true, Ordering::Relaxed);

        let state_conn = utils::udp_sock(&format!("0.0.0.0:{}", self.state_port))?;
        state_conn.set_read_timeout(Some(SOCKET_POLL))?;
        self.spawn_worker("tello-state", move |t| t.state_receiver(state_conn))?;
        self.spawn_worker("tello-rc", |t| t.rc_keepalive())?;
        tracing::info!(method_name, "connected to tello");
        Ok(())
    }

    fn streamon(&self) -> Result<(), DroneError> {
        if !self.is_connected() {
            return Err(DroneError::NotConnected);
        }
        let video_conn = utils::udp_sock(&format!("0.0.0.0:{}", self.video_port))?;
        video_conn.set_read_timeout(Some(SOCKET_POLL))?;
        self.send_control_command(messages::CMD_STREAM_ON, self.cmd_timeout)?;
        self.streaming.store(true, Ordering::Relaxed);
        self.spawn_worker("tello-video", move |t| t.video_receiver(video_conn))
    }

    fn frame_read(&self) -> FrameRead {
        self.frames.clone()
    }

    fn set_speed(&self, speed: i16) -> Result<(), DroneError> {
        self.send_control_command(&messages::speed(speed), self.cmd_timeout)
    }

    fn is_flying(&self) -> bool {
        match self.flying.read() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn takeoff(&self) -> Result<(), DroneError> {
        let method_name = "takeoff";
        tracing::info!(method_name, "send");
        self.send_control_command(messages::CMD_TAKEOFF, self.maneuver_timeout)?;
        self.set_flying(true);
        Ok(())
    }

    fn land(&self) -> Result<(), DroneError> {
        let method_name = "land";
        tracing::info!(method_name, "send");
        self.send_control_command(messages::CMD_LAND, self.maneuver_timeout)?;
        self.set_flying(false);
        Ok(())
    }

    fn set_video_direction(&self, direction: CameraDirection) -> Result<(), DroneError> {
        let method_name = "set_video_direction";
        tracing::info!(method_name, ?direction, "send");
        self.send_control_command(&messages::downvision(direction), self.cmd_timeout)
    }

    fn send_rc_control(&self, velocity: Velocity) -> Result<(), DroneError> {
        match self.rc.write() {
            Ok(mut g) => *g = velocity,
            Err(poisoned) => *poisoned.into_inner() = velocity,
        }
        self.send_command_without_return(&messages::rc(&velocity))
    }

    fn end(&self) -> Result<(), DroneError> {
        let method_name = "end";
        let mut first_err = None;
        if let Err(e) = self.send_rc_control(Velocity::ZERO) {
            tracing::warn!(method_name, "unable to stop motion: {e}");
            first_err = first_err.or(Some(e));
        }
        if self.is_flying() {
            if let Err(e) = self.land() {
                tracing::warn!(method_name, "unable to land: {e}");
                first_err = first_err.or(Some(e));
            }
        }
        if self.streaming.swap(false, Ordering::Relaxed) {
            if let Err(e) = self.send_control_command(messages::CMD_STREAM_OFF, self.cmd_timeout) {
                tracing::warn!(method_name, "unable to stop video stream: {e}");
                first_err = first_err.or(Some(e));
            }
        }
        self.running.store(false, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
        tracing::info!(method_name, "session closed");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn battery(&self) -> Option<u8> {
        self.state().map(|st| st.battery)
    }
}

#[cfg(test)]
mod test {
    use std::{
        net::{SocketAddr, UdpSocket},
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc, Mutex,
        },
        thread,
        time::Duration,
    };

    use super::{SessionConfig, TelloSession};
    use crate::{error::DroneError, session::DroneSession};

    enum Reply {
        Text(&'static str),
        Late(&'static str, Duration),
        Silent,
    }

    /// Loopback stand-in for the drone's command port.
    struct FakeDrone {
        addr: SocketAddr,
        received: Arc<Mutex<Vec<String>>>,
        stop: Arc<AtomicBool>,
    }

    impl FakeDrone {
        fn start<F>(reply: F) -> Self
        where
            F: Fn(&str) -> Reply + Send + 'static,
        {
            let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
            sock.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
            let addr = sock.local_addr().unwrap();
            let received = Arc::new(Mutex::new(Vec::new()));
            let stop = Arc::new(AtomicBool::new(false));
            let (r, st) = (received.clone(), stop.clone());
            thread::spawn(move || {
                let mut buff = [0u8; 1024];
                while !st.load(Ordering::Relaxed) {
                    let Ok((n, from)) = sock.recv_from(&mut buff) else {
                        continue;
                    };
                    let command = String::from_utf8_lossy(&buff[..n]).to_string();
                    r.lock().unwrap().push(command.clone());
                    match reply(&command) {
                        Reply::Text(t) => {
                            let _ = sock.send_to(t.as_bytes(), from);
                        }
                        Reply::Late(t, after) => {
                            thread::sleep(after);
                            let _ = sock.send_to(t.as_bytes(), from);
                        }
                        Reply::Silent => {}
                    }
                }
            });
            Self {
                addr,
                received,
                stop,
            }
        }

        fn answering_ok() -> Self {
            Self::start(|cmd| {
                if cmd.starts_with("rc ") {
                    Reply::Silent
                } else {
                    Reply::Text("ok")
                }
            })
        }

        /// Commands received so far, rc updates left out.
        fn commands(&self) -> Vec<String> {
            self.received
                .lock()
                .unwrap()
                .iter()
                .filter(|c| !c.starts_with("rc "))
                .cloned()
                .collect()
        }

        fn rc_commands(&self) -> Vec<String> {
            self.received
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.starts_with("rc "))
                .cloned()
                .collect()
        }
    }

    impl Drop for FakeDrone {
        fn drop(&mut self) {
            self.stop.store(true, Ordering::Relaxed);
        }
    }

    fn session(drone: &FakeDrone) -> TelloSession {
        TelloSession::with_config(SessionConfig {
            remote_addr: drone.addr.to_string(),
            local_addr: "127.0.0.1:0".to_owned(),
            state_port: 0,
            video_port: 0,
            cmd_timeout: Duration::from_millis(200),
            maneuver_timeout: Duration::from_millis(500),
            rc_interval: Duration::from_millis(20),
        })
        .unwrap()
    }

    #[test]
    fn test_ok_reply() {
        let drone = FakeDrone::answering_ok();
        let s = session(&drone);
        s.connect().unwrap();
        assert!(s.is_connected());
        s.set_speed(50).unwrap();
        assert_eq!(drone.commands(), vec!["command", "speed 50"]);
        let _ = s.end();
    }

    #[test]
    fn test_error_reply_is_command_failed() {
        let drone = FakeDrone::start(|cmd| match cmd {
            "takeoff" => Reply::Text("error Motor stop"),
            c if c.starts_with("rc ") => Reply::Silent,
            _ => Reply::Text("ok"),
        });
        let s = session(&drone);
        s.connect().unwrap();
        match s.takeoff() {
            Err(DroneError::CommandFailed { command, response }) => {
                assert_eq!(command, "takeoff");
                assert_eq!(response, "error Motor stop");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!s.is_flying());
        let _ = s.end();
    }

    #[test]
    fn test_missing_reply_is_timeout() {
        let drone = FakeDrone::start(|cmd| match cmd {
            "command" => Reply::Text("ok"),
            _ => Reply::Silent,
        });
        let s = session(&drone);
        s.connect().unwrap();
        assert!(matches!(s.set_speed(30), Err(DroneError::Timeout { .. })));
        let _ = s.end();
    }

    #[test]
    fn test_not_connected_without_command_mode() {
        let drone = FakeDrone::answering_ok();
        let s = session(&drone);
        assert!(matches!(s.streamon(), Err(DroneError::NotConnected)));
        assert!(drone.commands().is_empty());
        let _ = s.end();
    }

    #[test]
    fn test_stale_reply_not_taken_for_next_command() {
        let drone = FakeDrone::start(|cmd| match cmd {
            "speed 20" => Reply::Late("ok", Duration::from_millis(300)),
            "takeoff" => Reply::Text("error"),
            c if c.starts_with("rc ") => Reply::Silent,
            _ => Reply::Text("ok"),
        });
        let s = session(&drone);
        s.connect().unwrap();
        assert!(matches!(s.set_speed(20), Err(DroneError::Timeout { .. })));
        // let the late "ok" land in the reply queue
        thread::sleep(Duration::from_millis(300));
        assert!(matches!(s.takeoff(), Err(DroneError::CommandFailed { .. })));
        assert!(!s.is_flying());
        let _ = s.end();
    }

    #[test]
    fn test_flying_follows_acks() {
        let drone = FakeDrone::answering_ok();
        let s = session(&drone);
        s.connect().unwrap();
        assert!(!s.is_flying());
        s.takeoff().unwrap();
        assert!(s.is_flying());
        // the keepalive re-sends the rc vector while flying
        thread::sleep(Duration::from_millis(100));
        assert!(!drone.rc_commands().is_empty());
        s.land().unwrap();
        assert!(!s.is_flying());
        let _ = s.end();
    }

    #[test]
    fn test_end_lands_and_stops_stream() {
        let drone = FakeDrone::answering_ok();
        let s = session(&drone);
        s.connect().unwrap();
        s.streamon().unwrap();
        assert!(s.is_streaming());
        s.takeoff().unwrap();
        s.end().unwrap();
        assert_eq!(
            drone.commands(),
            vec!["command", "streamon", "takeoff", "land", "streamoff"]
        );
        assert!(drone.rc_commands().contains(&"rc 0 0 0 0".to_owned()));
        assert!(!s.is_flying());
        assert!(!s.is_streaming());
        assert!(!s.is_running());
        assert!(!s.is_connected());
    }

    #[test]
    fn test_end_continues_after_failed_land() {
        let drone = FakeDrone::start(|cmd| match cmd {
            "land" => Reply::Text("error"),
            c if c.starts_with("rc ") => Reply::Silent,
            _ => Reply::Text("ok"),
        });
        let s = session(&drone);
        s.connect().unwrap();
        s.streamon().unwrap();
        s.takeoff().unwrap();
        assert!(matches!(s.end(), Err(DroneError::CommandFailed { .. })));
        assert_eq!(drone.commands().last().map(String::as_str), Some("streamoff"));
        assert!(!s.is_running());
    }
}
