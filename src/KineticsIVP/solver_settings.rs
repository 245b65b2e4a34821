use serde::{Deserialize, Serialize};

/// integrator used between breakpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntegrationMethod {
    /// Dormand-Prince first; when it gives up (stiffness, step budget) the run switches to BDF
    #[default]
    Auto,
    /// explicit Dormand-Prince 5(4)
    Dopri5,
    /// implicit backward differentiation formulas, for stiff mechanisms
    Bdf,
    /// implicit Radau IIA of order 7, for stiff mechanisms
    Radau,
}

/// knobs of the integrators, applied to every segment between breakpoints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub method: IntegrationMethod,
    /// relative tolerance
    pub rtol: f64,
    /// absolute tolerance
    pub atol: f64,
    /// step budget of one segment; exhausting it is a solver failure
    pub max_steps: u32,
    /// number of steps between stiffness tests
    pub stiffness_test_interval: u32,
    /// first trial step, 0.0 means automatic choice
    pub initial_step: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            method: IntegrationMethod::Auto,
            rtol: 1e-8,
            atol: 1e-10,
            max_steps: 100_000,
            stiffness_test_interval: 1000,
            initial_step: 0.0,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.rtol > 0.0 && self.rtol.is_finite()) {
            return Err(format!("rtol must be positive, got {}", self.rtol));
        }
        if !(self.atol > 0.0 && self.atol.is_finite()) {
            return Err(format!("atol must be positive, got {}", self.atol));
        }
        if self.max_steps == 0 {
            return Err("max_steps must be at least 1".to_string());
        }
        if !(self.initial_step >= 0.0 && self.initial_step.is_finite()) {
            return Err(format!(
                "initial_step must be non-negative, got {}",
                self.initial_step
            ));
        }
        Ok(())
    }
}
