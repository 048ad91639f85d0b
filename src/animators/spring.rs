use std::time::Duration;

use serde::Deserialize;

use crate::animators::{to_channel, Animator, CHANNELS_PER_LIGHT};
use crate::trigger::TriggerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpringParams {
    pub stiffness: f32,
    /// Fraction of velocity kept per tick, in (0, 1].
    pub damping: f32,
    pub mass: f32,
    pub speed: f32,
}

impl Default for SpringParams {
    fn default() -> Self {
        SpringParams {
            stiffness: 1.0,
            damping: 0.95,
            mass: 1.0,
            speed: 1.0,
        }
    }
}

/// A chain of mass-spring oscillators, one per light. Each light is pulled
/// back to rest and towards both neighbours; a trigger kicks both ends of the
/// chain and the disturbance travels inwards.
pub struct SpringAnimator {
    params: SpringParams,
    displacement: Vec<f32>,
    velocity: Vec<f32>,
    force: Vec<f32>,
    buffer: Vec<u8>,
}

impl SpringAnimator {
    /// An empty chain is inert: steps and triggers leave an empty buffer.
    pub fn new(light_count: usize, params: SpringParams) -> SpringAnimator {
        SpringAnimator {
            params,
            displacement: vec![0.0; light_count],
            velocity: vec![0.0; light_count],
            force: vec![0.0; light_count],
            buffer: vec![0; light_count * CHANNELS_PER_LIGHT],
        }
    }

    fn integrate(&mut self, dt: f32) {
        let Some(last) = self.displacement.len().checked_sub(1) else {
            return;
        };
        let coupling = self.params.stiffness / 3.0;

        // Forces come from the displacements at the start of the tick so that
        // the update does not depend on iteration direction.
        for i in 0..=last {
            let here = self.displacement[i];
            let prev = self.displacement[i.saturating_sub(1)];
            let next = self.displacement[(i + 1).min(last)];
            self.force[i] = coupling * (((prev - here) + (next - here)) - here);
        }

        let SpringParams {
            damping,
            mass,
            speed,
            ..
        } = self.params;
        for ((velocity, displacement), force) in self
            .velocity
            .iter_mut()
            .zip(self.displacement.iter_mut())
            .zip(self.force.iter())
        {
            *velocity += force / mass;
            *velocity *= damping;
            *displacement += *velocity * dt * speed;
        }
    }

    fn render(&mut self) {
        for (light, displacement) in self
            .buffer
            .chunks_exact_mut(CHANNELS_PER_LIGHT)
            .zip(self.displacement.iter())
        {
            light[..3].fill(to_channel(*displacement));
        }
    }
}

impl Animator for SpringAnimator {
    fn light_count(&self) -> usize {
        self.displacement.len()
    }

    fn step(&mut self, dt: Duration) {
        let dt = dt.as_secs_f32();
        if dt > 0.0 {
            self.integrate(dt);
        }
        self.render();
    }

    fn trigger(&mut self, _event: &TriggerEvent) {
        if let Some(first) = self.displacement.first_mut() {
            *first = 1.0;
        }
        if let Some(last) = self.displacement.last_mut() {
            *last = 1.0;
        }
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }
}

#[cfg(test)]
impl SpringAnimator {
    pub(crate) fn displacement(&self) -> &[f32] {
        &self.displacement
    }

    pub(crate) fn velocity(&self) -> &[f32] {
        &self.velocity
    }
}
