use std::path::Path;

use config_file::FromConfigFile;
use serde::Deserialize;

use crate::animators::pulse::PulseParams;
use crate::animators::spring::SpringParams;
use crate::animators::CHANNELS_PER_LIGHT;
use crate::error::ConfigError;
use crate::mqtt::MqttConfig;
use crate::olaoutput::{OlaConfig, UNIVERSE_SIZE};

/// Cadence bounds; outside them the tick interval is not representable or
/// shorter than the scheduler can honour.
const MIN_FREQUENCY_HZ: f32 = 1e-3;
const MAX_FREQUENCY_HZ: f32 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnimatorKind {
    Spring,
    Pulse,
}

impl Default for AnimatorKind {
    fn default() -> Self {
        AnimatorKind::Spring
    }
}

/// Everything the process needs, read once at startup and handed to each
/// component.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub light_count: usize,
    pub frequency_hz: f32,
    pub animator: AnimatorKind,
    pub measure_fps: bool,
    pub spring: SpringParams,
    pub pulse: PulseParams,
    pub mqtt: MqttConfig,
    pub ola: OlaConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            light_count: 128,
            frequency_hz: 60.0,
            animator: AnimatorKind::default(),
            measure_fps: false,
            spring: SpringParams::default(),
            pulse: PulseParams::default(),
            mqtt: MqttConfig::default(),
            ola: OlaConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        Config::from_config_file(path).map_err(|err| ConfigError::File {
            path: path.display().to_string(),
            reason: format!("{:?}", err),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.light_count == 0 {
            return Err(ConfigError::invalid("light_count must be at least 1"));
        }

        let channels = self.light_count * CHANNELS_PER_LIGHT;
        if self.ola.start_channel + channels > UNIVERSE_SIZE {
            return Err(ConfigError::invalid(format!(
                "{} lights starting at channel {} do not fit a {} channel universe",
                self.light_count, self.ola.start_channel, UNIVERSE_SIZE
            )));
        }

        if !(MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&self.frequency_hz) {
            return Err(ConfigError::invalid(format!(
                "frequency_hz must be between {} and {}",
                MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ
            )));
        }

        let spring = &self.spring;
        if !(spring.mass.is_finite() && spring.mass > 0.0) {
            return Err(ConfigError::invalid("spring.mass must be positive"));
        }
        if !(spring.damping > 0.0 && spring.damping <= 1.0) {
            return Err(ConfigError::invalid("spring.damping must be in (0, 1]"));
        }
        if !(spring.stiffness.is_finite() && spring.speed.is_finite()) {
            return Err(ConfigError::invalid(
                "spring.stiffness and spring.speed must be finite",
            ));
        }

        if !(self.pulse.falloff > 0.0 && self.pulse.falloff <= 1.0) {
            return Err(ConfigError::invalid("pulse.falloff must be in (0, 1]"));
        }

        if self.mqtt.trigger_topic.is_empty() {
            return Err(ConfigError::invalid("mqtt.trigger_topic must not be empty"));
        }

        Ok(())
    }
}
