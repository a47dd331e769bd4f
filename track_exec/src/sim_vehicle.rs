//! # Simulated vehicle
//!
//! An in-process stand-in for the vehicle link, used for development and
//! demonstrations when no vehicle is available. The simulation doesn't model
//! the vehicle's flight, only what the camera sees: a single bright square
//! target on a dark background. Velocity commands move the target in the
//! image the way the real vehicle's motion would:
//!
//! - Positive (clockwise) yaw moves the target left.
//! - Positive up/down (climbing) moves the target down.
//! - Positive forward/backward (approaching) makes the target larger.
//! - Positive left/right moves the target left.
//!
//! The target also drifts horizontally on its own so there is something to
//! track. The battery drains while airborne, and every Nth discrete command is
//! answered with an error to exercise the dispatcher's retries.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

// Internal
use link_if::{
    Ack, ChannelError, CommandChannel, Direction, Frame, FrameSource, Rotation, VehicleStatus,
    VelocityCommand,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the simulated vehicle, loaded from `params/sim_vehicle.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Size of the rendered frames.
    ///
    /// Units: pixels
    pub frame_width: u32,
    pub frame_height: u32,

    /// Initial target centre and side length.
    ///
    /// Units: pixels
    pub target_start: [f64; 2],
    pub target_start_size: f64,

    /// Target drift speed, horizontal only.
    ///
    /// Units: pixels/second
    pub drift_px_s: f64,

    /// Image motion per unit of yaw, lateral or vertical demand.
    ///
    /// Units: pixels/second
    pub px_per_unit_s: f64,

    /// Relative growth of the target per unit of forward demand.
    ///
    /// Units: 1/second
    pub growth_per_unit_s: f64,

    /// Image motion for a discrete move or rotate.
    pub px_per_cm: f64,
    pub px_per_deg: f64,

    /// Battery at start and its drain rate while airborne.
    ///
    /// Units: percent, percent/second
    pub battery_start_pct: f64,
    pub battery_drain_pct_s: f64,

    /// Answer every Nth discrete command with an error, 0 to never fail.
    pub fail_every_nth_cmd: u64,
}

/// The simulated vehicle.
#[derive(Debug)]
pub struct SimVehicle {
    params: SimParams,
    world: Mutex<World>,
}

/// State of the simulation.
#[derive(Debug, Clone)]
struct World {
    /// Target centre in the image.
    x: f64,
    y: f64,

    /// Side length of the target.
    size: f64,

    /// Direction of the horizontal drift, +1 or -1.
    drift_dir: f64,

    vel: VelocityCommand,
    airborne: bool,
    streaming: bool,
    battery_pct: f64,

    /// Number of discrete commands received.
    num_cmds: u64,

    frame_seq: u64,
    last_update: Instant,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            frame_width: 360,
            frame_height: 240,
            target_start: [120.0, 90.0],
            target_start_size: 80.0,
            drift_px_s: 6.0,
            px_per_unit_s: 1.5,
            growth_per_unit_s: 0.01,
            px_per_cm: 1.0,
            px_per_deg: 2.0,
            battery_start_pct: 100.0,
            battery_drain_pct_s: 0.1,
            fail_every_nth_cmd: 4,
        }
    }
}

impl SimVehicle {
    pub fn new(params: SimParams) -> Self {
        let world = World {
            x: params.target_start[0],
            y: params.target_start[1],
            size: params.target_start_size,
            drift_dir: 1.0,
            vel: VelocityCommand::ZERO,
            airborne: false,
            streaming: false,
            battery_pct: params.battery_start_pct,
            num_cmds: 0,
            frame_seq: 0,
            last_update: Instant::now(),
        };

        info!(
            "Simulated vehicle created, {}x{} frames, battery {:.0}%",
            params.frame_width, params.frame_height, params.battery_start_pct
        );

        Self {
            params,
            world: Mutex::new(world),
        }
    }

    /// Lock the world and bring it up to the current time.
    fn world(&self) -> MutexGuard<'_, World> {
        let mut w = self.world.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let dt = now.saturating_duration_since(w.last_update).as_secs_f64();
        w.last_update = now;
        w.step(dt, &self.params);
        w
    }

    /// Count a discrete command, failing it if it's due to fail.
    fn discrete(
        &self,
        name: &str,
        action: impl FnOnce(&mut World, &SimParams) -> Ack,
    ) -> Result<Ack, ChannelError> {
        let mut w = self.world();
        w.num_cmds += 1;

        let n = self.params.fail_every_nth_cmd;
        if n > 0 && w.num_cmds % n == 0 {
            debug!("Sim: failing {} (command {})", name, w.num_cmds);
            return Ok(Ack::Rejected("error".into()));
        }

        let ack = action(&mut w, &self.params);
        debug!("Sim: {} -> {:?}", name, ack);
        Ok(ack)
    }
}

impl World {
    /// Advance the simulation by `dt` seconds.
    fn step(&mut self, dt: f64, params: &SimParams) {
        if dt <= 0.0 {
            return;
        }

        let w = params.frame_width as f64;
        let h = params.frame_height as f64;

        // The target drifts regardless of the vehicle, bouncing off the edges
        self.x += self.drift_dir * params.drift_px_s * dt;
        if self.x < self.size / 2.0 {
            self.drift_dir = 1.0;
        } else if self.x > w - self.size / 2.0 {
            self.drift_dir = -1.0;
        }

        if self.airborne {
            let k = params.px_per_unit_s * dt;
            self.x -= (self.vel.yaw + self.vel.left_right) as f64 * k;
            self.y += self.vel.up_down as f64 * k;
            self.size *= 1.0 + self.vel.forward_backward as f64 * params.growth_per_unit_s * dt;

            self.battery_pct = (self.battery_pct - params.battery_drain_pct_s * dt).max(0.0);
        }

        self.x = self.x.max(-w).min(2.0 * w);
        self.y = self.y.max(-h).min(2.0 * h);
        self.size = self.size.max(1.0).min(h);
    }

    fn render(&mut self, params: &SimParams) -> Frame {
        self.frame_seq += 1;
        let mut frame = Frame::blank(self.frame_seq, params.frame_width, params.frame_height);

        let half = self.size / 2.0;
        let x0 = (self.x - half).round().max(0.0) as u32;
        let y0 = (self.y - half).round().max(0.0) as u32;
        let x1 = ((self.x + half).round().max(0.0) as u32).min(params.frame_width);
        let y1 = ((self.y + half).round().max(0.0) as u32).min(params.frame_height);

        for j in y0..y1 {
            for i in x0..x1 {
                frame.pixels[(j * params.frame_width + i) as usize] = 255;
            }
        }

        frame
    }
}

impl CommandChannel for SimVehicle {
    fn takeoff(&self) -> Result<Ack, ChannelError> {
        self.discrete("takeoff", |w, _| {
            w.airborne = true;
            Ack::Ok
        })
    }

    fn land(&self) -> Result<Ack, ChannelError> {
        self.discrete("land", |w, _| {
            w.airborne = false;
            w.vel = VelocityCommand::ZERO;
            Ack::Ok
        })
    }

    fn stream_on(&self) -> Result<Ack, ChannelError> {
        self.discrete("streamon", |w, _| {
            w.streaming = true;
            Ack::Ok
        })
    }

    fn stream_off(&self) -> Result<Ack, ChannelError> {
        self.discrete("streamoff", |w, _| {
            w.streaming = false;
            Ack::Ok
        })
    }

    fn move_by(&self, direction: Direction, distance_cm: u32) -> Result<Ack, ChannelError> {
        self.discrete("move", |w, p| {
            if !w.airborne {
                return Ack::Rejected("not airborne".into());
            }

            let d = distance_cm as f64 * p.px_per_cm;
            match direction {
                Direction::Left => w.x += d,
                Direction::Right => w.x -= d,
                Direction::Up => w.y += d,
                Direction::Down => w.y -= d,
                Direction::Forward => w.size += d,
                Direction::Back => w.size = (w.size - d).max(1.0),
            }
            Ack::Ok
        })
    }

    fn rotate(&self, rotation: Rotation, degrees: u32) -> Result<Ack, ChannelError> {
        self.discrete("rotate", |w, p| {
            if !w.airborne {
                return Ack::Rejected("not airborne".into());
            }

            let d = degrees as f64 * p.px_per_deg;
            match rotation {
                Rotation::Clockwise => w.x -= d,
                Rotation::Anticlockwise => w.x += d,
            }
            Ack::Ok
        })
    }

    fn set_velocity(&self, cmd: &VelocityCommand) -> Result<Ack, ChannelError> {
        let mut w = self.world();
        if w.airborne {
            w.vel = *cmd;
        }
        Ok(Ack::Ok)
    }
}

impl VehicleStatus for SimVehicle {
    fn battery_percent(&self) -> Result<u8, ChannelError> {
        Ok(self.world().battery_pct.round() as u8)
    }
}

impl FrameSource for SimVehicle {
    fn latest_frame(&self) -> Option<Frame> {
        let mut w = self.world();
        if !w.streaming {
            return None;
        }
        Some(w.render(&self.params))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::detector::BlobDetector;
    use link_if::Detector;

    fn params() -> SimParams {
        SimParams {
            drift_px_s: 0.0,
            fail_every_nth_cmd: 0,
            ..SimParams::default()
        }
    }

    #[test]
    fn test_no_frames_until_streaming() {
        let sim = SimVehicle::new(params());
        assert!(sim.latest_frame().is_none());

        assert_eq!(sim.stream_on().unwrap(), Ack::Ok);
        let f = sim.latest_frame().unwrap();
        assert_eq!((f.width, f.height), (360, 240));
        assert_eq!(f.seq, 1);
        assert_eq!(sim.latest_frame().unwrap().seq, 2);
    }

    #[test]
    fn test_rendered_target_detected() {
        let sim = SimVehicle::new(params());
        sim.stream_on().unwrap();

        let det = BlobDetector::new(200, 16).detect(&sim.latest_frame().unwrap());

        // 80 px square centred on (120, 90)
        assert_eq!(det.area, 80 * 80);
        assert!((det.center.0 - 120).abs() <= 1);
        assert!((det.center.1 - 90).abs() <= 1);
    }

    #[test]
    fn test_velocity_moves_target() {
        let p = params();
        let mut w = SimVehicle::new(p.clone()).world().clone();
        w.airborne = true;
        w.vel = VelocityCommand::new(0, 10, -20, 20);

        let (x, y, size) = (w.x, w.y, w.size);
        w.step(1.0, &p);

        // Clockwise yaw moves the target left, descending moves it up,
        // approaching makes it larger
        assert!(w.x < x);
        assert!(w.y < y);
        assert!(w.size > size);
        assert!(w.battery_pct < p.battery_start_pct);
    }

    #[test]
    fn test_grounded_vehicle_ignores_motion() {
        let sim = SimVehicle::new(params());

        assert!(matches!(
            sim.move_by(Direction::Left, 20).unwrap(),
            Ack::Rejected(_)
        ));

        sim.set_velocity(&VelocityCommand::new(0, 0, 0, 50)).unwrap();
        assert!(sim.world().vel.is_zero());
        assert_eq!(sim.battery_percent().unwrap(), 100);
    }

    #[test]
    fn test_periodic_failures() {
        let sim = SimVehicle::new(SimParams {
            fail_every_nth_cmd: 3,
            ..params()
        });

        assert!(sim.stream_on().unwrap().is_ok());
        assert!(sim.takeoff().unwrap().is_ok());
        assert!(!sim.rotate(Rotation::Clockwise, 15).unwrap().is_ok());
        assert!(sim.rotate(Rotation::Clockwise, 15).unwrap().is_ok());
    }
}
