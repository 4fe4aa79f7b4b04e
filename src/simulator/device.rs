/// Temperature the instrument settles to when its controller is off,
/// and the temperature it starts at.
pub const AMBIENT_TEMPERATURE: f64 = 25.0;

pub const DEFAULT_TARGET_TEMPERATURE: f64 = 37.0;

/// Ground-truth physical state of the simulated reader.
///
/// Owned by the sensor loop; `current_temperature` is only ever written by
/// its filter step.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub(crate) target_temperature: f64,
    pub(crate) current_temperature: f64,
    pub(crate) controller_enabled: bool,
}

impl DeviceState {
    pub fn initialize(target_temperature: f64, controller_enabled: bool) -> Self {
        Self {
            target_temperature,
            current_temperature: AMBIENT_TEMPERATURE,
            controller_enabled,
        }
    }

    pub fn target_temperature(&self) -> f64 {
        self.target_temperature
    }

    pub fn current_temperature(&self) -> f64 {
        self.current_temperature
    }

    pub fn controller_enabled(&self) -> bool {
        self.controller_enabled
    }

    /// Setpoint the filter tracks: the target while the controller runs,
    /// ambient otherwise.
    pub fn effective_setpoint(&self) -> f64 {
        if self.controller_enabled {
            self.target_temperature
        } else {
            AMBIENT_TEMPERATURE
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::initialize(DEFAULT_TARGET_TEMPERATURE, true)
    }
}
