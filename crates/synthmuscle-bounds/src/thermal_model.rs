//! First-order RC thermal model for actuator temperature estimation.
//!
//! `dT/dt = P_loss / C_th - (T - T_amb) / (R_th * C_th)`, integrated with a
//! forward Euler step. The estimate feeds [`DeratingPolicy`](crate::DeratingPolicy)
//! when no temperature sensor is available.

use serde::{Deserialize, Serialize};

use crate::error::{BoundsError, BoundsResult};

fn finite(value: f64, name: &str) -> BoundsResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(BoundsError::thermal(format!("{name} must be finite")))
    }
}

/// Thermal capacitance, resistance and ambient temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalRcParams {
    /// Thermal capacitance in J/°C.
    pub c_th_j_per_c: f64,
    /// Thermal resistance to ambient in °C/W.
    pub r_th_c_per_w: f64,
    /// Ambient temperature in °C.
    #[serde(default = "default_ambient_c")]
    pub t_amb_c: f64,
}

fn default_ambient_c() -> f64 {
    25.0
}

impl ThermalRcParams {
    /// Create parameters with a 25 °C ambient.
    #[must_use]
    pub fn new(c_th_j_per_c: f64, r_th_c_per_w: f64) -> Self {
        Self {
            c_th_j_per_c,
            r_th_c_per_w,
            t_amb_c: default_ambient_c(),
        }
    }

    /// Override the ambient temperature.
    #[must_use]
    pub fn with_ambient(mut self, t_amb_c: f64) -> Self {
        self.t_amb_c = t_amb_c;
        self
    }

    /// Require finite values and positive `C_th` and `R_th`.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::Thermal`] on the first violated condition.
    pub fn validate(&self) -> BoundsResult<()> {
        let c = finite(self.c_th_j_per_c, "c_th_j_per_c")?;
        let r = finite(self.r_th_c_per_w, "r_th_c_per_w")?;
        finite(self.t_amb_c, "t_amb_c")?;
        if c <= 0.0 {
            return Err(BoundsError::thermal("c_th_j_per_c must be > 0"));
        }
        if r <= 0.0 {
            return Err(BoundsError::thermal("r_th_c_per_w must be > 0"));
        }
        Ok(())
    }

    /// Time constant `R_th * C_th` in seconds.
    #[must_use]
    pub fn time_constant_s(&self) -> f64 {
        self.r_th_c_per_w * self.c_th_j_per_c
    }

    /// Temperature reached under constant `p_loss_w` once settled.
    #[must_use]
    pub fn steady_state_c(&self, p_loss_w: f64) -> f64 {
        self.t_amb_c + p_loss_w * self.r_th_c_per_w
    }
}

/// Mutable temperature estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalState {
    /// Current temperature in °C.
    pub t_c: f64,
}

impl Default for ThermalState {
    fn default() -> Self {
        Self { t_c: 25.0 }
    }
}

impl ThermalState {
    /// Start at `t_c`.
    #[must_use]
    pub const fn new(t_c: f64) -> Self {
        Self { t_c }
    }

    /// Advance the state by one Euler step and return the new temperature.
    ///
    /// # Errors
    ///
    /// See [`step_thermal`].
    pub fn step(&mut self, params: &ThermalRcParams, p_loss_w: f64, dt_s: f64) -> BoundsResult<f64> {
        step_thermal(params, self, p_loss_w, dt_s)
    }
}

/// Euler-step `state` forward by `dt_s` under loss `p_loss_w`.
///
/// The state is left untouched on error.
///
/// # Errors
///
/// Returns [`BoundsError::Thermal`] for invalid parameters, `dt_s <= 0`,
/// `p_loss_w < 0`, or a non-finite result.
pub fn step_thermal(
    params: &ThermalRcParams,
    state: &mut ThermalState,
    p_loss_w: f64,
    dt_s: f64,
) -> BoundsResult<f64> {
    params.validate()?;
    let t = finite(state.t_c, "t_c")?;
    let p = finite(p_loss_w, "p_loss_w")?;
    let dt = finite(dt_s, "dt_s")?;
    if dt <= 0.0 {
        return Err(BoundsError::thermal("dt_s must be > 0"));
    }
    if p < 0.0 {
        return Err(BoundsError::thermal("p_loss_w must be >= 0"));
    }

    let c = params.c_th_j_per_c;
    let dt_dt = p / c - (t - params.t_amb_c) / (params.r_th_c_per_w * c);
    let t_new = t + dt_dt * dt;
    if !t_new.is_finite() {
        return Err(BoundsError::thermal(
            "thermal integration produced non-finite temperature",
        ));
    }
    state.t_c = t_new;
    Ok(t_new)
}

/// Copper losses `I² R` in watts. The sign of `current_a` is ignored.
///
/// # Errors
///
/// Returns an error for non-finite inputs or a negative resistance.
pub fn i2r_losses_w(current_a: f64, resistance_ohm: f64) -> BoundsResult<f64> {
    let i = finite(current_a, "current_a")?.abs();
    let r = finite(resistance_ohm, "resistance_ohm")?;
    if r < 0.0 {
        return Err(BoundsError::thermal("resistance_ohm must be >= 0"));
    }
    Ok(i * i * r)
}
