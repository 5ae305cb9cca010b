use serde::{Deserialize, Serialize};

/// Gray-Scott rate constants and time step, consumed by every kernel step.
///
/// Values are taken as given: a set that makes the integration unstable is a
/// runtime behavior of the model, not an invalid input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    /// Diffusion rate of U (activator).
    pub du: f32,
    /// Diffusion rate of V (inhibitor).
    pub dv: f32,
    /// Feed rate (F).
    pub feed: f32,
    /// Kill rate (k).
    pub kill: f32,
    /// Integration time step.
    pub dt: f32,
}

impl SimulationParameters {
    pub const DEFAULT_DU: f32 = 0.16;
    pub const DEFAULT_DV: f32 = 0.08;
    pub const DEFAULT_FEED: f32 = 0.060;
    pub const DEFAULT_KILL: f32 = 0.062;
    pub const DEFAULT_DT: f32 = 1.0;

    pub fn new(du: f32, dv: f32, feed: f32, kill: f32, dt: f32) -> Self {
        Self { du, dv, feed, kill, dt }
    }

    /// Default diffusion rates and time step with the given feed/kill pair.
    pub fn with_feed_kill(feed: f32, kill: f32) -> Self {
        Self { feed, kill, ..Self::default() }
    }

    /// Checks the sign constraints on each field. The engine itself never calls
    /// this; it is used where parameters enter from outside (config files).
    pub fn check_ranges(&self) -> Result<(), String> {
        let rates = [("du", self.du), ("dv", self.dv), ("feed", self.feed), ("kill", self.kill)];
        for (name, value) in rates {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a finite non-negative number (got {})", name, value));
            }
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(format!("dt must be a finite positive number (got {})", self.dt));
        }
        Ok(())
    }
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            du: Self::DEFAULT_DU,
            dv: Self::DEFAULT_DV,
            feed: Self::DEFAULT_FEED,
            kill: Self::DEFAULT_KILL,
            dt: Self::DEFAULT_DT,
        }
    }
}
