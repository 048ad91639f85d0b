use std::time::Duration;

use palette::{LinSrgb, Mix, Srgb};
use serde::Deserialize;

use crate::animators::{Animator, CHANNELS_PER_LIGHT};
use crate::trigger::TriggerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PulseParams {
    /// Fraction of brightness left after one second, in (0, 1].
    pub falloff: f32,
}

impl Default for PulseParams {
    fn default() -> Self {
        PulseParams { falloff: 0.05 }
    }
}

/// Flashes the whole rig in the result color of the last trigger and lets it
/// fade out.
pub struct PulseAnimator {
    params: PulseParams,
    color: LinSrgb,
    intensity: f32,
    buffer: Vec<u8>,
}

impl PulseAnimator {
    pub fn new(light_count: usize, params: PulseParams) -> PulseAnimator {
        PulseAnimator {
            params,
            color: LinSrgb::new(0.0, 0.0, 0.0),
            intensity: 0.0,
            buffer: vec![0; light_count * CHANNELS_PER_LIGHT],
        }
    }
}

impl Animator for PulseAnimator {
    fn light_count(&self) -> usize {
        self.buffer.len() / CHANNELS_PER_LIGHT
    }

    fn step(&mut self, dt: Duration) {
        self.intensity *= self.params.falloff.powf(dt.as_secs_f32());

        let black = LinSrgb::new(0.0, 0.0, 0.0);
        let blended = black.mix(self.color, self.intensity);
        let rgb: Srgb<u8> = Srgb::<f32>::from_linear(blended).into_format();

        for light in self.buffer.chunks_exact_mut(CHANNELS_PER_LIGHT) {
            light[0] = rgb.red;
            light[1] = rgb.green;
            light[2] = rgb.blue;
        }
    }

    fn trigger(&mut self, event: &TriggerEvent) {
        self.color = event.result_color.into_format::<f32>().into_linear();
        self.intensity = 1.0;
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }
}
