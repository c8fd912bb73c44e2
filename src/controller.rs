use std::{
    fs,
    path::PathBuf,
    sync::Arc,
    thread::JoinHandle,
    time::Duration,
};

use crate::{
    env,
    error::DroneError,
    face::FaceDetector,
    flight::{Direction, FlightCommands},
    frame::{FrameProcessor, ProcessedFrame},
    scheduler::{Repeater, StopHandle},
    session::DroneSession,
    takeoff::{self, InFlight, Maneuver},
    toggles::Toggles,
    utils,
    video::FrameRead,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Initializing,
    Running,
    ShuttingDown,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    TakeoffLand,
    CameraDirection,
    FaceDetection,
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    KeyPress(Direction),
    KeyRelease(Direction),
    Button(Button),
    Close,
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub speed: i16,
    pub redraw_interval: Duration,
    pub pics_dir: String,
}

impl ControllerOptions {
    pub fn from_env() -> Self {
        Self {
            speed: *env::ENV_TELLO_SPEED,
            redraw_interval: Duration::from_millis(*env::ENV_TELLO_REDRAW_MS),
            pics_dir: env::ENV_TELLO_PICS_DIR.clone(),
        }
    }
}

pub struct Controller<S: DroneSession> {
    session: Arc<S>,
    lifecycle: Lifecycle,
    flight: FlightCommands,
    toggles: Toggles,
    in_flight: InFlight,
    processor: FrameProcessor,
    frames: FrameRead,
    schedule: Repeater,
    pics_dir: String,
    last_shown: Option<ProcessedFrame>,
    maneuvers: Vec<JoinHandle<()>>,
}

impl<S: DroneSession> Controller<S> {
    /// Connects, starts the video stream and sets the cruise speed. Any
    /// failure here is returned before a window exists.
    pub fn new(
        session: Arc<S>,
        options: ControllerOptions,
        detector: Option<Box<dyn FaceDetector>>,
    ) -> Result<Self, DroneError> {
        let method_name = "new";
        tracing::info!(method_name, "initializing");
        session.connect()?;
        session.streamon()?;
        session.set_speed(options.speed)?;
        let frames = session.frame_read();
        Ok(Self {
            session,
            lifecycle: Lifecycle::Initializing,
            flight: FlightCommands::new(options.speed),
            toggles: Toggles::new(),
            in_flight: InFlight::new(),
            processor: FrameProcessor::new(detector),
            frames,
            schedule: Repeater::every(options.redraw_interval),
            pics_dir: options.pics_dir,
            last_shown: None,
            maneuvers: Vec::new(),
        })
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    pub fn toggles(&self) -> &Toggles {
        &self.toggles
    }

    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    pub fn has_face_detection(&self) -> bool {
        self.processor.has_detector()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.schedule.stop_handle()
    }

    pub fn start(&mut self) {
        if self.lifecycle == Lifecycle::Initializing {
            self.lifecycle = Lifecycle::Running;
            tracing::info!("running");
        }
    }

    /// Waits for the next redraw tick. `false` once shutdown began.
    pub fn next_cycle(&mut self) -> bool {
        self.is_running() && self.schedule.wait_next()
    }

    pub fn handle(&mut self, event: UiEvent) -> Result<(), DroneError> {
        if !self.is_running() {
            tracing::debug!(?event, "ignored, controller not running");
            return Ok(());
        }
        match event {
            UiEvent::KeyPress(direction) => self.flight.begin(direction, self.session.as_ref()),
            UiEvent::KeyRelease(direction) => self.flight.end(direction, self.session.as_ref()),
            UiEvent::Button(Button::TakeoffLand) => {
                self.takeoff_land();
                Ok(())
            }
            UiEvent::Button(Button::CameraDirection) => {
                // the drone answers nothing else until the maneuver reply arrives
                if self.in_flight.is_busy() {
                    tracing::warn!("takeoff/land in progress, camera switch ignored");
                    return Ok(());
                }
                self.toggles
                    .toggle_camera(self.session.as_ref())
                    .map(|_| ())
            }
            UiEvent::Button(Button::FaceDetection) => {
                if self.processor.has_detector() {
                    self.toggles.toggle_face_detection();
                } else {
                    tracing::warn!("face detection is not available in this program");
                }
                Ok(())
            }
            UiEvent::Button(Button::Snapshot) => self.save_snapshot().map(|_| ()),
            UiEvent::Close => {
                self.shutdown();
                Ok(())
            }
        }
    }

    pub fn takeoff_land(&mut self) -> Option<Maneuver> {
        self.maneuvers.retain(|h| !h.is_finished());
        let (maneuver, handle) = takeoff::takeoff_land(&self.session, &self.in_flight)?;
        self.maneuvers.push(handle);
        Some(maneuver)
    }

    /// One redraw cycle: newest frame through the processor with the
    /// current toggle snapshot.
    pub fn redraw(&mut self) -> &ProcessedFrame {
        let frame = self.frames.latest();
        let processed = self.processor.process(&frame, self.toggles.snapshot());
        self.last_shown.insert(processed)
    }

    pub fn save_snapshot(&self) -> Result<Option<PathBuf>, DroneError> {
        let method_name = "save_snapshot";
        let Some(ref shown) = self.last_shown else {
            tracing::warn!(method_name, "nothing displayed yet");
            return Ok(None);
        };
        fs::create_dir_all(&self.pics_dir)?;
        let name = chrono::Local::now()
            .format("pic_%Y%m%d_%H%M%S_%3f.png")
            .to_string();
        let path = PathBuf::from(utils::dir_with_slash(&self.pics_dir)).join(name);
        shown.image.save(&path)?;
        tracing::info!(method_name, path = %path.display(), "snapshot saved");
        Ok(Some(path))
    }

    /// Stops the redraw loop and releases the drone. Every step runs even
    /// when an earlier one failed. Background takeoff/land calls are left
    /// to finish on their own.
    pub fn shutdown(&mut self) {
        let method_name = "shutdown";
        if matches!(self.lifecycle, Lifecycle::ShuttingDown | Lifecycle::Terminated) {
            return;
        }
        self.lifecycle = Lifecycle::ShuttingDown;
        tracing::info!(method_name, "cleaning up resources...");
        self.schedule.stop_handle().stop();

        let session = self.session.as_ref();
        if let Err(e) = self.flight.stop_all(session) {
            tracing::error!(method_name, "error stopping motion: {e}");
        }
        match self.toggles.reset_camera(session) {
            Ok(true) => tracing::info!(method_name, "camera pointed forward again"),
            Ok(false) => {}
            Err(e) => tracing::error!(method_name, "error performing cleanup: {e}"),
        }
        if let Err(e) = session.end() {
            tracing::error!(method_name, "error performing cleanup: {e}");
        }
        let pending = self.maneuvers.iter().filter(|h| !h.is_finished()).count();
        if pending > 0 {
            tracing::warn!(method_name, pending, "takeoff/land still running");
        }
        self.lifecycle = Lifecycle::Terminated;
        tracing::info!(method_name, "terminated");
    }
}

impl<S: DroneSession> Drop for Controller<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod test {
    use std::{
        cell::RefCell,
        rc::Rc,
        sync::{atomic::Ordering, Arc},
        thread,
        time::Duration,
    };

    use image::{Rgb, RgbImage};

    use super::{Button, Controller, ControllerOptions, Lifecycle, UiEvent};
    use crate::{
        flight::{Direction, Velocity},
        frame::{test::ScriptedDetector, DISPLAY_HEIGHT, DISPLAY_WIDTH, DOWN_CROP_HEIGHT, DOWN_CROP_WIDTH},
        session::{
            mock::{Call, MockSession},
            CameraDirection,
        },
    };

    fn options() -> ControllerOptions {
        ControllerOptions {
            speed: 50,
            redraw_interval: Duration::from_millis(1),
            pics_dir: std::env::temp_dir()
                .join(format!("tello_keyboard_pics_{}", std::process::id()))
                .to_string_lossy()
                .into_owned(),
        }
    }

    fn running(session: &Arc<MockSession>) -> Controller<MockSession> {
        let mut c = Controller::new(session.clone(), options(), None).unwrap();
        c.start();
        session.clear();
        c
    }

    #[test]
    fn test_init_connects_and_streams() {
        let session = Arc::new(MockSession::new());
        let c = Controller::new(session.clone(), options(), None).unwrap();
        assert_eq!(c.lifecycle(), Lifecycle::Initializing);
        assert_eq!(
            session.calls(),
            vec![Call::Connect, Call::Streamon, Call::Speed(50)]
        );
        assert!(!c.toggles().camera_down());
        assert!(!c.toggles().face_detection());
    }

    #[test]
    fn test_startup_error_propagates() {
        let session = Arc::new(MockSession::new());
        session.fail_connect.store(true, Ordering::SeqCst);
        assert!(Controller::new(session.clone(), options(), None).is_err());
        assert!(session.calls().is_empty());
    }

    #[test]
    fn test_end_to_end_key_and_takeoff() {
        let session = Arc::new(MockSession::new());
        let mut c = running(&session);
        c.handle(UiEvent::KeyPress(Direction::Upward)).unwrap();
        assert_eq!(session.rc_calls(), vec![Velocity::new(0, 0, 50, 0)]);
        c.handle(UiEvent::KeyRelease(Direction::Upward)).unwrap();
        assert_eq!(session.rc_calls().last(), Some(&Velocity::ZERO));

        c.handle(UiEvent::Button(Button::TakeoffLand)).unwrap();
        for h in c.maneuvers.drain(..) {
            h.join().unwrap();
        }
        let takeoff_thread = session.calls().into_iter().find_map(|call| match call {
            Call::Takeoff(id) => Some(id),
            _ => None,
        });
        assert!(takeoff_thread.is_some());
        assert_ne!(takeoff_thread, Some(thread::current().id()));
    }

    #[test]
    fn test_redraw_follows_camera_toggle() {
        let session = Arc::new(MockSession::new());
        session
            .frames
            .publish(RgbImage::from_pixel(960, 720, Rgb([10, 20, 30])));
        let mut c = running(&session);
        assert_eq!(c.redraw().image.dimensions(), (DISPLAY_WIDTH, DISPLAY_HEIGHT));
        c.handle(UiEvent::Button(Button::CameraDirection)).unwrap();
        assert_eq!(c.redraw().image.dimensions(), (DOWN_CROP_WIDTH, DOWN_CROP_HEIGHT));
        c.handle(UiEvent::Button(Button::CameraDirection)).unwrap();
        assert_eq!(c.redraw().image.dimensions(), (DISPLAY_WIDTH, DISPLAY_HEIGHT));
        assert_eq!(
            session.video_directions(),
            vec![CameraDirection::Downward, CameraDirection::Forward]
        );
    }

    #[test]
    fn test_camera_switch_rejected_during_takeoff() {
        let session = Arc::new(MockSession::new());
        let mut c = running(&session);
        let gate = session.gate.lock().unwrap();
        c.handle(UiEvent::Button(Button::TakeoffLand)).unwrap();
        c.handle(UiEvent::Button(Button::CameraDirection)).unwrap();
        assert!(!c.toggles().camera_down());
        assert!(session.video_directions().is_empty());
        // the loop keeps taking input meanwhile
        c.handle(UiEvent::KeyPress(Direction::Forward)).unwrap();
        assert_eq!(session.rc_calls(), vec![Velocity::new(0, 50, 0, 0)]);

        drop(gate);
        for h in c.maneuvers.drain(..) {
            h.join().unwrap();
        }
        c.handle(UiEvent::Button(Button::CameraDirection)).unwrap();
        assert!(c.toggles().camera_down());
        assert_eq!(session.video_directions(), vec![CameraDirection::Downward]);
    }

    #[test]
    fn test_face_toggle_needs_detector() {
        let session = Arc::new(MockSession::new());
        let mut c = running(&session);
        c.handle(UiEvent::Button(Button::FaceDetection)).unwrap();
        assert!(!c.toggles().face_detection());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let det = ScriptedDetector {
            faces: Vec::new(),
            seen: seen.clone(),
        };
        let mut c = Controller::new(session.clone(), options(), Some(Box::new(det))).unwrap();
        c.start();
        session.clear();
        c.handle(UiEvent::Button(Button::FaceDetection)).unwrap();
        assert!(c.toggles().face_detection());
        assert_eq!(c.redraw().faces, Some(0));
        assert_eq!(seen.borrow().len(), 1);
        c.handle(UiEvent::Button(Button::FaceDetection)).unwrap();
        assert_eq!(c.redraw().faces, None);
        assert!(session.calls().is_empty());
    }

    #[test]
    fn test_shutdown_resets_camera_when_down() {
        let session = Arc::new(MockSession::new());
        let mut c = running(&session);
        c.handle(UiEvent::Button(Button::CameraDirection)).unwrap();
        session.clear();
        c.handle(UiEvent::Close).unwrap();
        assert_eq!(c.lifecycle(), Lifecycle::Terminated);
        assert!(!c.toggles().camera_down());
        assert_eq!(
            session.calls(),
            vec![
                Call::Rc(Velocity::ZERO),
                Call::VideoDirection(CameraDirection::Forward),
                Call::End
            ]
        );
        assert!(!c.next_cycle());
    }

    #[test]
    fn test_shutdown_leaves_forward_camera_alone() {
        let session = Arc::new(MockSession::new());
        let mut c = running(&session);
        c.shutdown();
        assert!(session.video_directions().is_empty());
        assert_eq!(session.calls().last(), Some(&Call::End));
        // second shutdown is a no-op
        session.clear();
        c.shutdown();
        assert!(session.calls().is_empty());
    }

    #[test]
    fn test_shutdown_continues_after_camera_error() {
        let session = Arc::new(MockSession::new());
        let mut c = running(&session);
        c.handle(UiEvent::Button(Button::CameraDirection)).unwrap();
        session.fail_video_direction.store(true, Ordering::SeqCst);
        session.clear();
        c.shutdown();
        assert_eq!(session.calls().last(), Some(&Call::End));
        assert_eq!(c.lifecycle(), Lifecycle::Terminated);
    }

    #[test]
    fn test_events_ignored_after_shutdown() {
        let session = Arc::new(MockSession::new());
        let mut c = running(&session);
        c.shutdown();
        session.clear();
        c.handle(UiEvent::KeyPress(Direction::Forward)).unwrap();
        c.handle(UiEvent::Button(Button::CameraDirection)).unwrap();
        assert!(session.calls().is_empty());
    }

    #[test]
    fn test_drop_runs_cleanup() {
        let session = Arc::new(MockSession::new());
        {
            let _c = running(&session);
        }
        assert_eq!(session.calls().last(), Some(&Call::End));
    }

    #[test]
    fn test_snapshot_saves_last_frame() {
        let session = Arc::new(MockSession::new());
        let mut c = running(&session);
        assert!(c.save_snapshot().unwrap().is_none());
        c.redraw();
        let path = c.save_snapshot().unwrap().unwrap();
        let saved = image::open(&path).unwrap();
        assert_eq!(saved.width(), DISPLAY_WIDTH);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_next_cycle_only_while_running() {
        let session = Arc::new(MockSession::new());
        let mut c = Controller::new(session.clone(), options(), None).unwrap();
        assert!(!c.next_cycle());
        c.start();
        assert!(c.next_cycle());
        c.stop_handle().stop();
        assert!(!c.next_cycle());
    }
}
