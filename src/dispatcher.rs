use crate::animators::SharedAnimator;
use crate::error::ValidationError;
use crate::trigger::TriggerEvent;

/// Validates inbound payloads and forwards the good ones to the animator.
#[derive(Clone)]
pub struct TriggerDispatcher {
    animator: SharedAnimator,
}

impl TriggerDispatcher {
    pub fn new(animator: SharedAnimator) -> TriggerDispatcher {
        TriggerDispatcher { animator }
    }

    /// A rejected payload never reaches the animator.
    pub fn dispatch(&self, payload: &str) -> Result<TriggerEvent, ValidationError> {
        let event = match TriggerEvent::parse(payload) {
            Ok(event) => event,
            Err(err) => {
                log::warn!("Rejected trigger: {err}");
                return Err(err);
            }
        };

        log::debug!("Triggering with {:?}", event);
        self.animator.trigger(&event);
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animators::spring::{SpringAnimator, SpringParams};
    use crate::animators::tests::CountingAnimator;
    use crate::animators::Animator;
    use std::time::Duration;

    const VALID: &str =
        r#"{"north_color": [10, 20, 30], "south_color": [40, 50, 60], "result_color": [70, 80, 90]}"#;

    #[test]
    fn forwards_valid_events() {
        let animator = SharedAnimator::new(CountingAnimator::new(2));
        let dispatcher = TriggerDispatcher::new(animator.clone().into_dyn());

        let event = dispatcher.dispatch(VALID).unwrap();

        assert_eq!(event.result_color, palette::Srgb::new(70, 80, 90));
        assert_eq!(animator.with(|a| a.triggers), 1);
    }

    #[test]
    fn rejected_event_leaves_state_untouched() {
        let animator = SharedAnimator::new(SpringAnimator::new(16, SpringParams::default()));
        let dispatcher = TriggerDispatcher::new(animator.clone().into_dyn());
        dispatcher.dispatch(VALID).unwrap();
        for _ in 0..7 {
            animator.step(Duration::from_millis(16));
        }

        let snapshot = |a: &SpringAnimator| {
            (
                a.displacement().to_vec(),
                a.velocity().to_vec(),
                a.buffer().to_vec(),
            )
        };
        let before = animator.with(snapshot);

        let err = dispatcher
            .dispatch(r#"{"north_color": [1, 2, 3], "result_color": [7, 8, 9]}"#)
            .unwrap_err();

        assert!(matches!(err, ValidationError::MissingField("south_color")));
        assert_eq!(animator.with(snapshot), before);
    }

    #[test]
    fn garbage_is_rejected() {
        let animator = SharedAnimator::new(CountingAnimator::new(1));
        let dispatcher = TriggerDispatcher::new(animator.clone().into_dyn());

        for payload in ["", "null", "42", "{\"north_color\": 1}"] {
            assert!(dispatcher.dispatch(payload).is_err(), "{payload}");
        }
        assert_eq!(animator.with(|a| a.triggers), 0);
    }
}
