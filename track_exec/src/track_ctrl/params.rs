//! Parameters structure for TrackCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use link_if::cmd::VELOCITY_LIMIT;
use serde::{Deserialize, Serialize};

use super::TrackCtrlError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for tracking control.
///
/// The default value is the standard profile (`params/track_ctrl.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {

    // ---- FRAME GEOMETRY ----

    /// Width of the frames the detector runs on.
    ///
    /// Units: pixels
    pub frame_width: i32,

    /// Height of the frames the detector runs on.
    ///
    /// Units: pixels
    pub frame_height: i32,

    /// Position of the vertical centreline as a fraction of the frame height,
    /// measured from the top. `0.5` is the true centre, smaller values hold
    /// the target higher in the frame.
    pub vertical_centre_ratio: f64,

    // ---- PD CONTROLLERS ----

    /// Proportional gain, shared by the yaw and vertical controllers.
    pub k_p: f64,

    /// Integral gain. Must be zero, kept so that parameter files state it.
    #[serde(default)]
    pub k_i: f64,

    /// Derivative gain, shared by the yaw and vertical controllers.
    pub k_d: f64,

    /// Symmetric limit on every velocity demand.
    pub speed_limit: i32,

    /// Exponential smoothing factor applied to the yaw and vertical demands,
    /// or `None` for no smoothing. The factor is the weight of the newest
    /// demand.
    #[serde(default)]
    pub smoothing_factor: Option<f64>,

    // ---- AREA BANDS ----

    /// Lower bound of the hold band (inclusive).
    ///
    /// Units: pixels^2
    pub area_low: i32,

    /// Upper bound of the hold band (inclusive).
    ///
    /// Units: pixels^2
    pub area_high: i32,

    /// Areas at or below this are detector noise and produce no
    /// forward/backward demand.
    ///
    /// Units: pixels^2
    pub area_noise_floor: i32,

    /// Demand used when the target is too small (far away).
    pub forward_speed: i32,

    /// Demand used when the target is too large (too close). Negative.
    pub backward_speed: i32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            frame_width: 360,
            frame_height: 240,
            vertical_centre_ratio: 0.5,
            k_p: 0.35,
            k_i: 0.0,
            k_d: 0.35,
            speed_limit: 100,
            smoothing_factor: None,
            area_low: 5000,
            area_high: 15000,
            area_noise_floor: 100,
            forward_speed: 20,
            backward_speed: -20,
        }
    }
}

impl Params {
    /// The gentle profile (`params/track_ctrl_gentle.toml`): lower speed
    /// limit, a narrower hold band, half the forward/backward demand, and the
    /// centreline raised to 5/12 of the frame height.
    pub fn gentle() -> Self {
        Self {
            vertical_centre_ratio: 5.0 / 12.0,
            speed_limit: 60,
            area_low: 8000,
            area_high: 10000,
            forward_speed: 10,
            backward_speed: -10,
            ..Self::default()
        }
    }

    /// The point in the frame the controller steers the target towards.
    pub fn frame_centre(&self) -> (i32, i32) {
        (
            self.frame_width / 2,
            (self.frame_height as f64 * self.vertical_centre_ratio).floor() as i32,
        )
    }

    /// Check the parameters are self-consistent.
    pub fn validate(&self) -> Result<(), TrackCtrlError> {
        let invalid = |msg: String| Err(TrackCtrlError::InvalidParams(msg));

        if self.frame_width <= 0 || self.frame_height <= 0 {
            return invalid(format!(
                "frame size must be positive, found {}x{}",
                self.frame_width, self.frame_height
            ));
        }
        if !(self.vertical_centre_ratio > 0.0 && self.vertical_centre_ratio < 1.0) {
            return invalid(format!(
                "vertical_centre_ratio must be in (0, 1), found {}",
                self.vertical_centre_ratio
            ));
        }
        if self.k_i != 0.0 {
            return Err(TrackCtrlError::IntegralGainNotSupported(self.k_i));
        }
        if self.speed_limit <= 0 || self.speed_limit > VELOCITY_LIMIT {
            return invalid(format!(
                "speed_limit must be in 1..={}, found {}",
                VELOCITY_LIMIT, self.speed_limit
            ));
        }
        if let Some(f) = self.smoothing_factor {
            if !(f > 0.0 && f <= 1.0) {
                return invalid(format!("smoothing_factor must be in (0, 1], found {}", f));
            }
        }
        if !(self.area_noise_floor >= 0
            && self.area_noise_floor < self.area_low
            && self.area_low <= self.area_high)
        {
            return invalid(format!(
                "area bands must satisfy 0 <= noise floor < low <= high, found {} / {} / {}",
                self.area_noise_floor, self.area_low, self.area_high
            ));
        }
        if self.forward_speed < 0 || self.forward_speed > self.speed_limit {
            return invalid(format!(
                "forward_speed must be in 0..={}, found {}",
                self.speed_limit, self.forward_speed
            ));
        }
        if self.backward_speed > 0 || self.backward_speed < -self.speed_limit {
            return invalid(format!(
                "backward_speed must be in -{}..=0, found {}",
                self.speed_limit, self.backward_speed
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_profiles_valid() {
        assert!(Params::default().validate().is_ok());
        assert!(Params::gentle().validate().is_ok());
    }

    #[test]
    fn test_frame_centre() {
        assert_eq!(Params::default().frame_centre(), (180, 120));
        assert_eq!(Params::gentle().frame_centre(), (180, 100));
    }

    #[test]
    fn test_invalid_params() {
        let p = Params {
            k_i: 0.1,
            ..Params::default()
        };
        assert!(matches!(
            p.validate(),
            Err(TrackCtrlError::IntegralGainNotSupported(_))
        ));

        let p = Params {
            area_low: 20000,
            ..Params::default()
        };
        assert!(matches!(p.validate(), Err(TrackCtrlError::InvalidParams(_))));

        let p = Params {
            forward_speed: 80,
            ..Params::gentle()
        };
        assert!(matches!(p.validate(), Err(TrackCtrlError::InvalidParams(_))));
    }

    #[test]
    fn test_load_profile_file() {
        let p: Params = util::params::from_str(
            r#"
            frame_width = 360
            frame_height = 240
            vertical_centre_ratio = 0.5
            k_p = 0.35
            k_d = 0.35
            speed_limit = 100
            area_low = 5000
            area_high = 15000
            area_noise_floor = 100
            forward_speed = 20
            backward_speed = -20
            "#,
        )
        .unwrap();

        assert_eq!(p, Params::default());
    }
}
