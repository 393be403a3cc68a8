//! Simulation manager for the fountain
//!
//! Drives an [`Emitter`] from wall-clock frame times with a fixed logical
//! tick, and hands the result to a [`Renderer`] once per frame.

use super::emitter::Emitter;
use super::kernel::DEFAULT_TICK;
use super::render::Renderer;
use crate::error::{SimulationError, SimulationResult};
use cgmath::Vector3;

/// Wind adjustments bound to the scene's keys
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindControl {
    IncreaseX,
    DecreaseX,
    IncreaseY,
    DecreaseY,
    IncreaseZ,
    DecreaseZ,
    /// Back to `(1, 1, 1)`.
    Reset,
}

/// Ticks a single [`SimulationManager::advance`] call may run before the
/// leftover time is dropped.
pub const DEFAULT_MAX_TICKS_PER_ADVANCE: usize = 10;

/// Manages one emitter and its renderer
pub struct SimulationManager<R: Renderer> {
    emitter: Emitter,
    renderer: R,
    is_paused: bool,
    time_scale: f32,
    accumulated_time: f32,
    fixed_timestep: f32,
    max_ticks_per_advance: usize,
}

impl<R: Renderer> SimulationManager<R> {
    /// Create a new simulation manager ticking at the default 0.05
    ///
    /// # Arguments
    /// * `emitter` - Emitter to drive
    /// * `renderer` - Receives the positions after every `advance` or `tick`
    pub fn new(emitter: Emitter, renderer: R) -> Self {
        Self {
            emitter,
            renderer,
            is_paused: false,
            time_scale: 1.0,
            accumulated_time: 0.0,
            fixed_timestep: DEFAULT_TICK,
            max_ticks_per_advance: DEFAULT_MAX_TICKS_PER_ADVANCE,
        }
    }

    /// Feed elapsed wall-clock time (called every frame)
    ///
    /// Runs as many fixed ticks as the scaled, accumulated time allows, up
    /// to the per-call limit, then uploads positions and draws once. Time
    /// left over once the limit is hit is dropped.
    ///
    /// # Arguments
    /// * `elapsed` - Time since the last frame in seconds; must be finite
    ///
    /// # Returns
    /// Number of ticks run
    pub fn advance(&mut self, elapsed: f32) -> SimulationResult<usize> {
        if !elapsed.is_finite() {
            return Err(SimulationError::InvalidConfig(format!(
                "frame time must be finite, got {elapsed}"
            )));
        }

        let mut ticks = 0;
        if !self.is_paused && elapsed > 0.0 {
            self.accumulated_time += elapsed * self.time_scale;

            while self.accumulated_time >= self.fixed_timestep {
                if ticks == self.max_ticks_per_advance {
                    log::debug!(
                        "Dropping {:.3}s of simulation time after {} ticks",
                        self.accumulated_time,
                        ticks
                    );
                    self.accumulated_time = 0.0;
                    break;
                }
                self.emitter.update(self.fixed_timestep)?;
                self.accumulated_time -= self.fixed_timestep;
                ticks += 1;
            }
        }

        self.render();
        Ok(ticks)
    }

    /// Exactly one fixed tick plus render, regardless of pause state
    pub fn tick(&mut self) -> SimulationResult<()> {
        self.emitter.update(self.fixed_timestep)?;
        self.render();
        Ok(())
    }

    fn render(&mut self) {
        self.renderer.upload_positions(self.emitter.positions());
        self.renderer.draw();
    }

    /// Apply one wind key press
    ///
    /// # Arguments
    /// * `control` - Axis and direction to nudge, or a reset
    pub fn apply_wind(&mut self, control: WindControl) {
        let wind = self.emitter.wind();
        match control {
            WindControl::IncreaseX => wind.nudge_axis(0, 1.0),
            WindControl::DecreaseX => wind.nudge_axis(0, -1.0),
            WindControl::IncreaseY => wind.nudge_axis(1, 1.0),
            WindControl::DecreaseY => wind.nudge_axis(1, -1.0),
            WindControl::IncreaseZ => wind.nudge_axis(2, 1.0),
            WindControl::DecreaseZ => wind.nudge_axis(2, -1.0),
            WindControl::Reset => wind.reset(),
        }
        log::debug!("Wind now {:?}", wind.snapshot());
    }

    pub fn set_origin(&mut self, origin: Vector3<f32>) {
        self.emitter.set_origin(origin);
    }

    /// Move the emitter relative to where it is
    ///
    /// # Arguments
    /// * `delta` - Offset added to the current origin
    pub fn nudge_origin(&mut self, delta: Vector3<f32>) {
        self.emitter.nudge_origin(delta);
    }

    /// Speed up the aim target's orbit (no-op for unaimed emitters)
    ///
    /// # Arguments
    /// * `step` - Degrees per tick added to the angular speed
    pub fn increase_aim_speed(&mut self, step: f32) {
        self.emitter.adjust_aim_speed(step);
    }

    /// Slow down the aim target's orbit (no-op for unaimed emitters)
    ///
    /// # Arguments
    /// * `step` - Degrees per tick removed from the angular speed
    pub fn decrease_aim_speed(&mut self, step: f32) {
        self.emitter.adjust_aim_speed(-step);
    }

    pub fn pause(&mut self) {
        self.is_paused = true;
    }

    pub fn resume(&mut self) {
        self.is_paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Set time scale
    ///
    /// # Arguments
    /// * `scale` - Time scale multiplier (1.0 = normal speed); negative or
    ///   NaN values stop time, infinity is capped at `f32::MAX`
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.clamp(0.0, f32::MAX);
        if self.time_scale.is_nan() {
            self.time_scale = 0.0;
        }
    }

    pub fn max_ticks_per_advance(&self) -> usize {
        self.max_ticks_per_advance
    }

    /// Limit how many ticks one `advance` call may run
    ///
    /// # Arguments
    /// * `max_ticks` - Tick limit per call; at least 1
    pub fn set_max_ticks_per_advance(&mut self, max_ticks: usize) {
        self.max_ticks_per_advance = max_ticks.max(1);
    }

    pub fn fixed_timestep(&self) -> f32 {
        self.fixed_timestep
    }

    /// Change the logical tick; resets the accumulator
    ///
    /// # Arguments
    /// * `timestep` - Tick length; must be finite and positive
    pub fn set_fixed_timestep(&mut self, timestep: f32) -> SimulationResult<()> {
        if !timestep.is_finite() || timestep <= 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "fixed timestep must be positive, got {timestep}"
            )));
        }
        self.fixed_timestep = timestep;
        self.accumulated_time = 0.0;
        Ok(())
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    pub fn emitter_mut(&mut self) -> &mut Emitter {
        &mut self.emitter
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}
