use crate::{error::DroneError, session::DroneSession};

const RC_MIN: i16 = -100;
const RC_MAX: i16 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upward,
    Downward,
    YawLeft,
    YawRight,
    Forward,
    Backward,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    LeftRight = 0,
    ForwardBackward = 1,
    UpDown = 2,
    Yaw = 3,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::Upward,
        Direction::Downward,
        Direction::YawLeft,
        Direction::YawRight,
        Direction::Forward,
        Direction::Backward,
        Direction::Left,
        Direction::Right,
    ];

    pub fn axis(&self) -> Axis {
        match self {
            Direction::Upward | Direction::Downward => Axis::UpDown,
            Direction::YawLeft | Direction::YawRight => Axis::Yaw,
            Direction::Forward | Direction::Backward => Axis::ForwardBackward,
            Direction::Left | Direction::Right => Axis::LeftRight,
        }
    }

    pub fn sign(&self) -> i16 {
        match self {
            Direction::Upward | Direction::YawRight | Direction::Forward | Direction::Right => 1,
            Direction::Downward | Direction::YawLeft | Direction::Backward | Direction::Left => -1,
        }
    }
}

/// Four-axis rc command, each component in `-100..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Velocity {
    pub left_right: i16,
    pub forward_backward: i16,
    pub up_down: i16,
    pub yaw: i16,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity {
        left_right: 0,
        forward_backward: 0,
        up_down: 0,
        yaw: 0,
    };

    pub fn new(left_right: i16, forward_backward: i16, up_down: i16, yaw: i16) -> Self {
        Self {
            left_right: left_right.clamp(RC_MIN, RC_MAX),
            forward_backward: forward_backward.clamp(RC_MIN, RC_MAX),
            up_down: up_down.clamp(RC_MIN, RC_MAX),
            yaw: yaw.clamp(RC_MIN, RC_MAX),
        }
    }

    pub fn get(&self, axis: Axis) -> i16 {
        match axis {
            Axis::LeftRight => self.left_right,
            Axis::ForwardBackward => self.forward_backward,
            Axis::UpDown => self.up_down,
            Axis::Yaw => self.yaw,
        }
    }

    fn set(&mut self, axis: Axis, v: i16) {
        let v = v.clamp(RC_MIN, RC_MAX);
        match axis {
            Axis::LeftRight => self.left_right = v,
            Axis::ForwardBackward => self.forward_backward = v,
            Axis::UpDown => self.up_down = v,
            Axis::Yaw => self.yaw = v,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

/// Key driven movement dispatcher. Every axis remembers which direction
/// wrote it last, so keys held together compose and releasing one key
/// leaves the others alone.
#[derive(Debug)]
pub struct FlightCommands {
    speed: i16,
    velocity: Velocity,
    owners: [Option<Direction>; 4],
}

impl FlightCommands {
    pub fn new(speed: i16) -> Self {
        Self {
            speed: speed.clamp(0, RC_MAX),
            velocity: Velocity::ZERO,
            owners: [None; 4],
        }
    }

    pub fn speed(&self) -> i16 {
        self.speed
    }

    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    pub fn begin<S: DroneSession + ?Sized>(
        &mut self,
        direction: Direction,
        session: &S,
    ) -> Result<(), DroneError> {
        let axis = direction.axis();
        self.velocity.set(axis, direction.sign() * self.speed);
        self.owners[axis as usize] = Some(direction);
        tracing::debug!(?direction, velocity = ?self.velocity, "begin");
        session.send_rc_control(self.velocity)
    }

    pub fn end<S: DroneSession + ?Sized>(
        &mut self,
        direction: Direction,
        session: &S,
    ) -> Result<(), DroneError> {
        let axis = direction.axis();
        if self.owners[axis as usize] != Some(direction) {
            // a later key on the same axis took over
            tracing::debug!(?direction, "release of superseded key");
            return Ok(());
        }
        self.owners[axis as usize] = None;
        self.velocity.set(axis, 0);
        tracing::debug!(?direction, velocity = ?self.velocity, "end");
        session.send_rc_control(self.velocity)
    }

    pub fn stop_all<S: DroneSession + ?Sized>(&mut self, session: &S) -> Result<(), DroneError> {
        self.owners = [None; 4];
        self.velocity = Velocity::ZERO;
        session.send_rc_control(self.velocity)
    }
}
