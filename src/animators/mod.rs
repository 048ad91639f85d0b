pub(crate) mod pulse;
pub(crate) mod spring;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::trigger::TriggerEvent;

/// Bytes per light in the output buffer: R, G, B, W.
pub const CHANNELS_PER_LIGHT: usize = 4;

/// A simulation strategy that owns per-light state and renders it into a
/// buffer of `light_count() * CHANNELS_PER_LIGHT` bytes.
///
/// Implementations are not synchronised themselves; all cross-thread access
/// goes through [`SharedAnimator`].
pub trait Animator: Send {
    fn light_count(&self) -> usize;

    /// Advances the simulation by `dt` and rewrites the buffer.
    fn step(&mut self, dt: Duration);

    /// Applies an external stimulus. Must be O(1).
    fn trigger(&mut self, event: &TriggerEvent);

    fn buffer(&self) -> &[u8];
}

/// Clamps a normalized value into a channel byte, truncating the fraction.
pub fn to_channel(value: f32) -> u8 {
    (value * 255.0).clamp(0.0, 255.0) as u8
}

/// Handle to an animator guarded by a single mutex. Clones share the same
/// animator.
pub struct SharedAnimator<A: Animator + ?Sized = dyn Animator> {
    inner: Arc<Mutex<A>>,
}

impl<A: Animator + ?Sized> Clone for SharedAnimator<A> {
    fn clone(&self) -> Self {
        SharedAnimator {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Animator + 'static> SharedAnimator<A> {
    pub fn new(animator: A) -> Self {
        SharedAnimator {
            inner: Arc::new(Mutex::new(animator)),
        }
    }

    /// Forgets the concrete type. The returned handle still shares the lock.
    pub fn into_dyn(self) -> SharedAnimator {
        SharedAnimator { inner: self.inner }
    }
}

impl<A: Animator + ?Sized> SharedAnimator<A> {
    fn lock(&self) -> MutexGuard<'_, A> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn light_count(&self) -> usize {
        self.lock().light_count()
    }

    pub fn step(&self, dt: Duration) {
        self.lock().step(dt);
    }

    pub fn trigger(&self, event: &TriggerEvent) {
        self.lock().trigger(event);
    }

    /// Copies the current buffer into `frame`, replacing its contents.
    pub fn read_buffer_into(&self, frame: &mut Vec<u8>) {
        let animator = self.lock();
        frame.clear();
        frame.extend_from_slice(animator.buffer());
    }

    /// Runs `f` with the animator locked.
    #[cfg(test)]
    pub fn with<R>(&self, f: impl FnOnce(&A) -> R) -> R {
        let animator = self.lock();
        f(&*animator)
    }
}

/// Late binding between startup code and the transmission thread, which may
/// start before an animator exists.
#[derive(Clone, Default)]
pub struct AnimatorSlot {
    inner: Arc<(Mutex<Option<SharedAnimator>>, Condvar)>,
}

impl AnimatorSlot {
    pub fn attach(&self, animator: SharedAnimator) {
        let (slot, attached) = &*self.inner;
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(animator);
        attached.notify_all();
    }

    /// Blocks until an animator is attached. Wakes at least every
    /// `recheck` to see whether `running` was cleared, in which case `None`
    /// is returned.
    pub fn wait(&self, running: &AtomicBool, recheck: Duration) -> Option<SharedAnimator> {
        let (slot, attached) = &*self.inner;
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(animator) = guard.as_ref() {
                return Some(animator.clone());
            }
            if !running.load(Ordering::SeqCst) {
                return None;
            }
            guard = attached
                .wait_timeout(guard, recheck)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use palette::Srgb;
    use std::thread;

    /// Writes the number of steps taken into every byte of its buffer.
    pub(crate) struct CountingAnimator {
        pub(crate) steps: u8,
        pub(crate) triggers: usize,
        buffer: Vec<u8>,
    }

    impl CountingAnimator {
        pub(crate) fn new(light_count: usize) -> Self {
            CountingAnimator {
                steps: 0,
                triggers: 0,
                buffer: vec![0; light_count * CHANNELS_PER_LIGHT],
            }
        }
    }

    impl Animator for CountingAnimator {
        fn light_count(&self) -> usize {
            self.buffer.len() / CHANNELS_PER_LIGHT
        }

        fn step(&mut self, _dt: Duration) {
            self.steps = self.steps.wrapping_add(1);
            for byte in self.buffer.iter_mut() {
                *byte = self.steps;
                std::hint::spin_loop();
            }
        }

        fn trigger(&mut self, _event: &TriggerEvent) {
            self.triggers += 1;
        }

        fn buffer(&self) -> &[u8] {
            &self.buffer
        }
    }

    pub(crate) fn event() -> TriggerEvent {
        TriggerEvent::new(
            Srgb::new(255, 0, 0),
            Srgb::new(0, 0, 255),
            Srgb::new(255, 0, 255),
        )
    }

    #[test]
    fn to_channel_clamps() {
        assert_eq!(to_channel(-0.5), 0);
        assert_eq!(to_channel(0.0), 0);
        assert_eq!(to_channel(0.5), 127);
        assert_eq!(to_channel(1.0), 255);
        assert_eq!(to_channel(3.0), 255);
    }

    #[test]
    fn clones_share_state() {
        let typed = SharedAnimator::new(CountingAnimator::new(2));
        let erased = typed.clone().into_dyn();

        erased.step(Duration::ZERO);
        erased.trigger(&event());

        assert_eq!(typed.with(|a| a.steps), 1);
        assert_eq!(typed.with(|a| a.triggers), 1);
        let mut frame = Vec::new();
        erased.read_buffer_into(&mut frame);
        assert_eq!(frame, vec![1; 8]);
        assert_eq!(erased.light_count(), 2);
    }

    #[test]
    fn reads_never_observe_partial_steps() {
        let animator = SharedAnimator::new(CountingAnimator::new(128)).into_dyn();
        let stepper = animator.clone();
        let running = Arc::new(AtomicBool::new(true));
        let stepper_running = Arc::clone(&running);

        let handle = thread::spawn(move || {
            while stepper_running.load(Ordering::SeqCst) {
                stepper.step(Duration::from_millis(1));
            }
        });

        let mut frame = Vec::new();
        for _ in 0..2000 {
            animator.read_buffer_into(&mut frame);
            assert_eq!(frame.len(), 128 * CHANNELS_PER_LIGHT);
            assert!(frame.iter().all(|byte| *byte == frame[0]), "torn frame");
        }

        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();
    }

    #[test]
    fn slot_hands_over_late_animator() {
        let slot = AnimatorSlot::default();
        let running = AtomicBool::new(true);
        let attacher = slot.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            attacher.attach(SharedAnimator::new(CountingAnimator::new(3)).into_dyn());
        });

        let animator = slot.wait(&running, Duration::from_millis(5));
        handle.join().unwrap();
        assert_eq!(animator.map(|a| a.light_count()), Some(3));
    }

    #[test]
    fn slot_gives_up_when_stopped() {
        let slot = AnimatorSlot::default();
        let running = AtomicBool::new(false);
        assert!(slot.wait(&running, Duration::from_millis(5)).is_none());
    }
}
