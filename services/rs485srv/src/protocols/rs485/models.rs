//! Device model allowlist

use std::collections::BTreeSet;

/// Answers whether a device model may be attached to this adapter
pub trait DeviceModelCatalog: Send + Sync {
    fn is_supported(&self, model: &str) -> bool;

    /// Sorted list of known models
    fn supported_models(&self) -> Vec<String>;
}

const DRIVES: &[&str] = &[
    "ABB_ACS880_V1",
    "ABB_ACS580_V1",
    "SIEMENS_S120_V1",
    "SIEMENS_G120_V1",
    "SCHNEIDER_ATV610_V1",
    "SCHNEIDER_ATV630_V1",
    "DELTA_VFD_E_V1",
    "DELTA_VFD_MS300_V1",
];

const PLCS: &[&str] = &[
    "SIEMENS_S7_1200_V1",
    "SIEMENS_S7_1500_V1",
    "MITSUBISHI_FX3U_V1",
    "MITSUBISHI_Q_V1",
    "OMRON_CP1E_V1",
    "OMRON_CP1H_V1",
    "KEYENCE_KV_V1",
    "PANASONIC_FP_V1",
];

const SENSORS: &[&str] = &[
    "TEMP_SENSOR_485_V1",
    "HUMIDITY_SENSOR_485_V1",
    "PRESSURE_SENSOR_485_V1",
    "FLOW_SENSOR_485_V1",
    "LEVEL_SENSOR_485_V1",
    "PH_SENSOR_485_V1",
    "TURBIDITY_SENSOR_485_V1",
    "VIBRATION_SENSOR_485_V1",
];

const METERS: &[&str] = &[
    "ELECTRIC_METER_485_V1",
    "WATER_METER_485_V1",
    "GAS_METER_485_V1",
    "HEAT_METER_485_V1",
    "POWER_ANALYZER_485_V1",
    "HARMONIC_ANALYZER_485_V1",
    "INSULATION_TESTER_485_V1",
    "EARTH_TESTER_485_V1",
];

const ACTUATORS: &[&str] = &[
    "VALVE_ACTUATOR_485_V1",
    "MOTOR_CONTROLLER_485_V1",
    "SERVO_DRIVE_485_V1",
    "STEPPER_DRIVE_485_V1",
    "LINEAR_ACTUATOR_485_V1",
    "ROTARY_ACTUATOR_485_V1",
    "HYDRAULIC_VALVE_485_V1",
    "PNEUMATIC_VALVE_485_V1",
];

/// In-memory allowlist
#[derive(Debug, Clone)]
pub struct StaticModelCatalog {
    models: BTreeSet<String>,
}

impl StaticModelCatalog {
    pub fn with_models<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: models.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for StaticModelCatalog {
    /// Drives, PLCs, sensors, meters and actuators known to speak this framing
    fn default() -> Self {
        Self::with_models(
            [DRIVES, PLCS, SENSORS, METERS, ACTUATORS]
                .into_iter()
                .flatten()
                .copied(),
        )
    }
}

impl DeviceModelCatalog for StaticModelCatalog {
    fn is_supported(&self, model: &str) -> bool {
        self.models.contains(model)
    }

    fn supported_models(&self) -> Vec<String> {
        self.models.iter().cloned().collect()
    }
}
