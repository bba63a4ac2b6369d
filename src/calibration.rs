//! Two-point tick calibration per axis.
//!
//! The user clicks two tick marks on an axis of the waveform grid and types
//! the physical value each one stands for. From that pair any pixel on the
//! axis can be converted by linear interpolation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coords::PixelPoint;
use crate::error::{WavemarkError, WavemarkResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Horizontal, Axis::Vertical];

    pub fn name(self) -> &'static str {
        match self {
            Axis::Horizontal => "horizontal",
            Axis::Vertical => "vertical",
        }
    }

    /// Prefix used for marker labels (`H1`, `V2`, ...).
    pub fn marker_prefix(self) -> char {
        match self {
            Axis::Horizontal => 'H',
            Axis::Vertical => 'V',
        }
    }

    /// The coordinate of `point` that this axis measures.
    pub fn coordinate(self, point: PixelPoint) -> i32 {
        match self {
            Axis::Horizontal => point.x,
            Axis::Vertical => point.y,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::Horizontal => "Horizontal",
            Axis::Vertical => "Vertical",
        };
        f.write_str(name)
    }
}

/// Values typed by the user for the two ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum TickValues {
    #[default]
    Unset,
    /// The last entry did not parse; calibration is unusable until corrected.
    Invalid,
    Set { v1: f64, v2: f64 },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisCalibration {
    points: Vec<PixelPoint>,
    values: TickValues,
    unit: String,
}

impl AxisCalibration {
    pub const MAX_POINTS: usize = 2;

    pub fn points(&self) -> &[PixelPoint] {
        &self.points
    }

    pub fn values(&self) -> TickValues {
        self.values
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn is_full(&self) -> bool {
        self.points.len() >= Self::MAX_POINTS
    }

    pub fn is_usable(&self) -> bool {
        self.is_full() && matches!(self.values, TickValues::Set { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    horizontal: AxisCalibration,
    vertical: AxisCalibration,
}

impl Calibration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis(&self, axis: Axis) -> &AxisCalibration {
        match axis {
            Axis::Horizontal => &self.horizontal,
            Axis::Vertical => &self.vertical,
        }
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut AxisCalibration {
        match axis {
            Axis::Horizontal => &mut self.horizontal,
            Axis::Vertical => &mut self.vertical,
        }
    }

    /// Append a tick point. Returns `false` and leaves the store untouched
    /// when the axis already holds two points.
    pub fn add_tick_point(&mut self, axis: Axis, x: i32, y: i32) -> bool {
        let cal = self.axis_mut(axis);
        if cal.is_full() {
            return false;
        }
        cal.points.push(PixelPoint::new(x, y));
        true
    }

    pub fn clear(&mut self, axis: Axis) {
        *self.axis_mut(axis) = AxisCalibration::default();
    }

    /// Store the physical values for the two ticks of `axis`.
    ///
    /// The caller must have placed both ticks first. Unparseable values are
    /// recorded as [`TickValues::Invalid`] and reported; the unit is stored
    /// either way.
    pub fn set_values(
        &mut self,
        axis: Axis,
        v1: &str,
        v2: &str,
        unit: &str,
    ) -> WavemarkResult<()> {
        let cal = self.axis_mut(axis);
        if !cal.is_full() {
            return Err(WavemarkError::CalibrationIncomplete(axis));
        }
        cal.unit = unit.trim().to_string();

        let parse = |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| WavemarkError::InvalidTickValue {
                    axis,
                    value: raw.to_string(),
                })
        };
        match (parse(v1), parse(v2)) {
            (Ok(v1), Ok(v2)) => {
                cal.values = TickValues::Set { v1, v2 };
                Ok(())
            }
            (Err(e), _) | (_, Err(e)) => {
                cal.values = TickValues::Invalid;
                Err(e)
            }
        }
    }

    /// Convert a pixel coordinate on `axis` to its physical value.
    pub fn convert(&self, axis: Axis, pixel: f64) -> WavemarkResult<f64> {
        let cal = self.axis(axis);
        let (v1, v2) = match (cal.points.as_slice(), cal.values) {
            ([_, _], TickValues::Set { v1, v2 }) => (v1, v2),
            _ => return Err(WavemarkError::CalibrationIncomplete(axis)),
        };
        let p1 = f64::from(axis.coordinate(cal.points[0]));
        let p2 = f64::from(axis.coordinate(cal.points[1]));
        if p1 == p2 {
            return Err(WavemarkError::DegenerateCalibration(axis));
        }
        Ok(v1 + (pixel - p1) * (v2 - v1) / (p2 - p1))
    }
}
