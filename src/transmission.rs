use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::animators::{AnimatorSlot, CHANNELS_PER_LIGHT};
use crate::intervaltimer::IntervalTimer;
use crate::sink::LightSink;

const ATTACH_RECHECK: Duration = Duration::from_millis(100);

/// Steps the attached animator at a fixed cadence and hands every frame to
/// the sink, in order, from a single thread.
pub struct TransmissionLoop {
    slot: AnimatorSlot,
    sink: Box<dyn LightSink>,
    frequency_hz: f32,
    measure_fps: bool,
    running: Arc<AtomicBool>,
}

impl TransmissionLoop {
    pub fn new(
        slot: AnimatorSlot,
        sink: Box<dyn LightSink>,
        frequency_hz: f32,
        measure_fps: bool,
        running: Arc<AtomicBool>,
    ) -> TransmissionLoop {
        TransmissionLoop {
            slot,
            sink,
            frequency_hz,
            measure_fps,
            running,
        }
    }

    pub fn run(&mut self) {
        let mut timer = IntervalTimer::new(self.frequency_hz, self.measure_fps);

        log::debug!("Waiting for an animator to be attached");
        let animator = match self.slot.wait(&self.running, ATTACH_RECHECK) {
            Some(animator) => animator,
            None => {
                log::info!("Stopped before an animator was attached");
                return;
            }
        };

        let channels = animator.light_count() * CHANNELS_PER_LIGHT;
        log::info!(
            "Transmitting {} channels every {:?}",
            channels,
            timer.interval()
        );

        let mut frame = Vec::with_capacity(channels);
        timer.restart();
        while self.running.load(Ordering::SeqCst) {
            let dt = timer.begin_tick();
            animator.step(dt);
            animator.read_buffer_into(&mut frame);

            // Stale lighting data is worthless, so a failed frame is dropped.
            if let Err(err) = self.sink.send(&frame) {
                log::warn!("Dropping frame: {err}");
            }

            timer.sleep_until_next_tick();
        }

        if let Err(err) = self.sink.blackout(channels) {
            log::warn!("Blackout failed: {err}");
        }
        log::info!("Transmission stopped");
    }
}
