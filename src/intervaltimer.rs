use std::thread;
use std::time::{Duration, Instant};

/// Paces a loop at a fixed frequency. Overrunning ticks are not made up for;
/// the following tick simply reports a longer `dt`.
pub struct IntervalTimer {
    interval: Duration,
    last_tick: Instant,
    thread_name: String,
    measure_fps: bool,
    last_fps_print: Instant,
    frames: u32,
}

impl IntervalTimer {
    pub fn new(freq_hz: f32, measure_fps: bool) -> IntervalTimer {
        let cur_thread = thread::current();
        let thread_name = cur_thread.name().unwrap_or("unnamed");

        IntervalTimer {
            interval: Duration::from_secs_f32(1.0 / freq_hz),
            last_tick: Instant::now(),
            thread_name: thread_name.to_string(),
            measure_fps,
            last_fps_print: Instant::now(),
            frames: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts measuring from now, e.g. after the owning thread was parked.
    pub fn restart(&mut self) {
        self.last_tick = Instant::now();
        self.last_fps_print = self.last_tick;
        self.frames = 0;
    }

    /// Marks the start of a tick and returns the time since the previous one.
    pub fn begin_tick(&mut self) -> Duration {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        dt
    }

    /// Sleeps for whatever is left of the current tick's interval.
    pub fn sleep_until_next_tick(&mut self) {
        if self.measure_fps {
            self.update_fps();
        }

        let elapsed = self.last_tick.elapsed();
        match self.interval.checked_sub(elapsed) {
            Some(remaining) => thread::sleep(remaining),
            None => log::debug!(
                "{} overran its tick by {:?}",
                self.thread_name,
                elapsed - self.interval
            ),
        }
    }

    fn update_fps(&mut self) {
        self.frames += 1;

        if self.last_fps_print.elapsed() > Duration::from_secs(1) {
            log::info!("{} FPS: {}", self.thread_name, self.frames);
            self.frames = 0;
            self.last_fps_print = Instant::now();
        }
    }
}
