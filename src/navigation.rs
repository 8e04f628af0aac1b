//! Turns wheel, touch and keyboard input into single-step feed moves.

pub const DEFAULT_SWIPE_THRESHOLD: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    ArrowDown,
    ArrowUp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Wheel { delta_y: f32 },
    TouchStart { y: f32 },
    TouchMove { y: f32 },
    TouchEnd,
    Key(NavKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavIntent {
    Advance,
    Retreat,
}

impl NavIntent {
    /// Target index for this move, or `None` when it would leave `[0, len)`.
    pub fn target(self, current: usize, len: usize) -> Option<usize> {
        match self {
            NavIntent::Advance if current + 1 < len => Some(current + 1),
            NavIntent::Retreat if current > 0 && current < len => Some(current - 1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    pub intent: Option<NavIntent>,
    /// The host should swallow its default scrolling for this event.
    pub suppress_default: bool,
}

#[derive(Debug, Clone)]
pub struct Resolver {
    threshold: f32,
    touch_start: Option<f32>,
    touch_end: Option<f32>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(DEFAULT_SWIPE_THRESHOLD)
    }
}

impl Resolver {
    pub fn new(threshold: f32) -> Self {
        let threshold = if threshold.is_finite() && threshold > 0.0 {
            threshold
        } else {
            DEFAULT_SWIPE_THRESHOLD
        };
        Self {
            threshold,
            touch_start: None,
            touch_end: None,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn resolve(&mut self, event: InputEvent) -> Resolution {
        match event {
            InputEvent::Wheel { delta_y } => Resolution {
                intent: if delta_y > 0.0 {
                    Some(NavIntent::Advance)
                } else if delta_y < 0.0 {
                    Some(NavIntent::Retreat)
                } else {
                    None
                },
                suppress_default: false,
            },
            InputEvent::TouchStart { y } => {
                self.touch_start = Some(y);
                self.touch_end = None;
                Resolution::default()
            }
            InputEvent::TouchMove { y } => {
                if self.touch_start.is_none() {
                    return Resolution::default();
                }
                self.touch_end = Some(y);
                Resolution {
                    intent: None,
                    suppress_default: true,
                }
            }
            InputEvent::TouchEnd => {
                let (Some(start), Some(end)) = (self.touch_start, self.touch_end) else {
                    return Resolution::default();
                };
                let distance = start - end;
                let intent = if distance > self.threshold {
                    Some(NavIntent::Advance)
                } else if distance < -self.threshold {
                    Some(NavIntent::Retreat)
                } else {
                    None
                };
                Resolution {
                    intent,
                    suppress_default: false,
                }
            }
            InputEvent::Key(NavKey::ArrowDown) => Resolution {
                intent: Some(NavIntent::Advance),
                suppress_default: false,
            },
            InputEvent::Key(NavKey::ArrowUp) => Resolution {
                intent: Some(NavIntent::Retreat),
                suppress_default: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swipe(resolver: &mut Resolver, from: f32, to: f32) -> Option<NavIntent> {
        resolver.resolve(InputEvent::TouchStart { y: from });
        let moved = resolver.resolve(InputEvent::TouchMove { y: to });
        assert!(moved.suppress_default);
        resolver.resolve(InputEvent::TouchEnd).intent
    }

    #[test]
    fn wheel_direction_maps_to_intent() {
        let mut resolver = Resolver::default();
        assert_eq!(
            resolver.resolve(InputEvent::Wheel { delta_y: 3.0 }).intent,
            Some(NavIntent::Advance)
        );
        assert_eq!(
            resolver.resolve(InputEvent::Wheel { delta_y: -1.0 }).intent,
            Some(NavIntent::Retreat)
        );
        assert_eq!(resolver.resolve(InputEvent::Wheel { delta_y: 0.0 }).intent, None);
    }

    #[test]
    fn swipe_needs_to_clear_threshold() {
        let mut resolver = Resolver::default();
        assert_eq!(swipe(&mut resolver, 400.0, 300.0), Some(NavIntent::Advance));
        assert_eq!(swipe(&mut resolver, 300.0, 400.0), Some(NavIntent::Retreat));
        assert_eq!(swipe(&mut resolver, 300.0, 250.0), None);
        assert_eq!(swipe(&mut resolver, 300.0, 340.0), None);
    }

    #[test]
    fn touch_end_without_move_is_ignored() {
        let mut resolver = Resolver::default();
        resolver.resolve(InputEvent::TouchStart { y: 10.0 });
        assert_eq!(resolver.resolve(InputEvent::TouchEnd), Resolution::default());
    }

    #[test]
    fn move_without_start_does_not_suppress() {
        let mut resolver = Resolver::default();
        let resolution = resolver.resolve(InputEvent::TouchMove { y: 100.0 });
        assert!(!resolution.suppress_default);
        assert_eq!(resolver.resolve(InputEvent::TouchEnd).intent, None);
    }

    #[test]
    fn custom_threshold_applies() {
        let mut resolver = Resolver::new(120.0);
        assert_eq!(swipe(&mut resolver, 400.0, 300.0), None);
        assert_eq!(swipe(&mut resolver, 400.0, 250.0), Some(NavIntent::Advance));
        assert_eq!(Resolver::new(-1.0).threshold(), DEFAULT_SWIPE_THRESHOLD);
    }

    #[test]
    fn arrow_keys_map_to_intent() {
        let mut resolver = Resolver::default();
        assert_eq!(
            resolver.resolve(InputEvent::Key(NavKey::ArrowDown)).intent,
            Some(NavIntent::Advance)
        );
        assert_eq!(
            resolver.resolve(InputEvent::Key(NavKey::ArrowUp)).intent,
            Some(NavIntent::Retreat)
        );
    }

    #[test]
    fn intent_targets_stay_in_bounds() {
        assert_eq!(NavIntent::Advance.target(0, 3), Some(1));
        assert_eq!(NavIntent::Advance.target(2, 3), None);
        assert_eq!(NavIntent::Retreat.target(0, 3), None);
        assert_eq!(NavIntent::Retreat.target(2, 3), Some(1));
        assert_eq!(NavIntent::Advance.target(0, 0), None);
    }
}
