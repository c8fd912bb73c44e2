use image::RgbImage;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::{
    controller::{Button, Controller, UiEvent},
    draw,
    error::DroneError,
    flight::Direction,
    frame::{self, DISPLAY_HEIGHT, DISPLAY_WIDTH},
    session::DroneSession,
};

pub const WINDOW_TITLE: &str = "Search and Rescue Drone Controller";

const COLUMN_WIDTHS: [u32; 3] = [240, DISPLAY_WIDTH, 0];
const ROW_HEIGHTS: [u32; 3] = [0, DISPLAY_HEIGHT, 56];
const BUTTON_PADDING: u32 = 8;
const BACKGROUND: [u8; 3] = [0xf0, 0xf0, 0xf0];

/// Screen rectangle of a grid cell or widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Cell {
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && py >= self.y && px < self.x + self.w && py < self.y + self.h
    }

    fn padded(&self, pad: u32) -> Cell {
        Cell {
            x: self.x + pad,
            y: self.y + pad,
            w: self.w.saturating_sub(2 * pad),
            h: self.h.saturating_sub(2 * pad),
        }
    }
}

/// Grid placement by (column, row).
pub fn grid(column: usize, row: usize) -> Cell {
    Cell {
        x: COLUMN_WIDTHS[..column].iter().sum(),
        y: ROW_HEIGHTS[..row].iter().sum(),
        w: COLUMN_WIDTHS[column],
        h: ROW_HEIGHTS[row],
    }
}

pub fn window_size() -> (u32, u32) {
    (COLUMN_WIDTHS.iter().sum(), ROW_HEIGHTS.iter().sum())
}

#[derive(Debug, Clone)]
pub struct ButtonWidget {
    pub button: Button,
    pub label: &'static str,
    pub shortcut: Key,
    pub cell: Cell,
}

/// Widgets of one program. The face-detection button only exists in the
/// second program.
pub fn buttons(with_face_detection: bool) -> Vec<ButtonWidget> {
    let mut v = vec![
        ButtonWidget {
            button: Button::CameraDirection,
            label: "Switch Camera Direction",
            shortcut: Key::C,
            cell: grid(0, 1).padded(BUTTON_PADDING),
        },
        ButtonWidget {
            button: Button::TakeoffLand,
            label: "Takeoff/Land",
            shortcut: Key::T,
            cell: grid(1, 2).padded(BUTTON_PADDING),
        },
    ];
    if with_face_detection {
        v.push(ButtonWidget {
            button: Button::FaceDetection,
            label: "Detect Faces",
            shortcut: Key::F,
            cell: grid(0, 2).padded(BUTTON_PADDING),
        });
    }
    v
}

pub fn key_direction(key: Key) -> Option<Direction> {
    match key {
        Key::W => Some(Direction::Upward),
        Key::S => Some(Direction::Downward),
        Key::A => Some(Direction::YawLeft),
        Key::D => Some(Direction::YawRight),
        Key::Up => Some(Direction::Forward),
        Key::Down => Some(Direction::Backward),
        Key::Left => Some(Direction::Left),
        Key::Right => Some(Direction::Right),
        _ => None,
    }
}

pub fn key_press_event(key: Key, widgets: &[ButtonWidget]) -> Option<UiEvent> {
    if let Some(direction) = key_direction(key) {
        return Some(UiEvent::KeyPress(direction));
    }
    if key == Key::Escape {
        return Some(UiEvent::Close);
    }
    if key == Key::P {
        return Some(UiEvent::Button(Button::Snapshot));
    }
    widgets
        .iter()
        .find(|w| w.shortcut == key)
        .map(|w| UiEvent::Button(w.button))
}

pub fn click_event(x: u32, y: u32, widgets: &[ButtonWidget]) -> Option<UiEvent> {
    widgets
        .iter()
        .find(|w| w.cell.contains(x, y))
        .map(|w| UiEvent::Button(w.button))
}

/// Composes the window contents: widgets plus the latest video image in
/// the video cell.
pub fn compose(canvas: &mut RgbImage, video: &RgbImage, widgets: &[ButtonWidget], active: &[Button]) {
    for p in canvas.pixels_mut() {
        p.0 = BACKGROUND;
    }
    let cell = grid(1, 1);
    image::imageops::replace(canvas, video, cell.x as i64, cell.y as i64);
    for w in widgets {
        let fill = if active.contains(&w.button) {
            draw::BUTTON_ACTIVE
        } else {
            draw::BUTTON_FACE
        };
        let c = w.cell;
        draw::fill_rect(canvas, c.x as i32, c.y as i32, c.w, c.h, fill, draw::BUTTON_BORDER);
        draw::draw_text_centered(canvas, w.label, c.x as i32, c.y as i32, c.w, c.h, draw::TEXT);
    }
}

struct Ui {
    window: Window,
    canvas: RgbImage,
    widgets: Vec<ButtonWidget>,
    mouse_was_down: bool,
    title: String,
}

impl Ui {
    fn new(with_face_detection: bool) -> Result<Self, DroneError> {
        let (w, h) = window_size();
        let window = Window::new(WINDOW_TITLE, w as usize, h as usize, WindowOptions::default())?;
        Ok(Self {
            window,
            canvas: RgbImage::new(w, h),
            widgets: buttons(with_face_detection),
            mouse_was_down: false,
            title: WINDOW_TITLE.to_owned(),
        })
    }

    /// Input gathered since the previous frame, in arrival order per kind.
    fn events(&mut self) -> Vec<UiEvent> {
        let mut events = Vec::new();
        for key in self.window.get_keys_pressed(KeyRepeat::No) {
            if let Some(ev) = key_press_event(key, &self.widgets) {
                events.push(ev);
            }
        }
        for key in self.window.get_keys_released() {
            if let Some(direction) = key_direction(key) {
                events.push(UiEvent::KeyRelease(direction));
            }
        }
        let down = self.window.get_mouse_down(MouseButton::Left);
        if down && !self.mouse_was_down {
            if let Some((x, y)) = self.window.get_mouse_pos(MouseMode::Discard) {
                if let Some(ev) = click_event(x as u32, y as u32, &self.widgets) {
                    events.push(ev);
                }
            }
        }
        self.mouse_was_down = down;
        events
    }

    fn set_battery(&mut self, battery: Option<u8>) {
        let title = match battery {
            Some(b) => format!("{WINDOW_TITLE} - battery {b}%"),
            None => WINDOW_TITLE.to_owned(),
        };
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }
    }

    fn show(&mut self, video: &RgbImage, active: &[Button]) -> Result<(), DroneError> {
        compose(&mut self.canvas, video, &self.widgets, active);
        let buffer = frame::to_display_buffer(&self.canvas);
        let (w, h) = self.canvas.dimensions();
        self.window.update_with_buffer(&buffer, w as usize, h as usize)?;
        Ok(())
    }
}

fn event_loop<S: DroneSession>(controller: &mut Controller<S>) -> Result<(), DroneError> {
    let method_name = "event_loop";
    let mut ui = Ui::new(controller.has_face_detection())?;
    controller.start();

    while controller.next_cycle() {
        if !ui.window.is_open() {
            tracing::info!(method_name, "window closed");
            break;
        }
        for ev in ui.events() {
            tracing::debug!(method_name, ?ev, "input");
            if let Err(e) = controller.handle(ev) {
                tracing::error!(method_name, ?ev, "{e}");
            }
        }
        if !controller.is_running() {
            break;
        }
        let mut active = Vec::new();
        if controller.toggles().camera_down() {
            active.push(Button::CameraDirection);
        }
        if controller.toggles().face_detection() {
            active.push(Button::FaceDetection);
        }
        ui.set_battery(controller.session().battery());
        let shown = controller.redraw();
        ui.show(&shown.image, &active)?;
    }
    Ok(())
}

/// Opens the window and blocks until it is closed. Errors end the loop,
/// cleanup always runs afterwards. The face-detection button is shown when
/// the controller has a detector.
pub fn run_app<S: DroneSession>(mut controller: Controller<S>) {
    if let Err(e) = event_loop(&mut controller) {
        tracing::error!("error running the application: {e}");
    }
    controller.shutdown();
}
