// SPDX-License-Identifier: GPL-3.0-only

//! Device orientation
//!
//! The controller samples an [`OrientationSource`] on a fixed interval and
//! only reports changes, so sources are free to be cheap, synchronous reads.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Physical orientation of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
    #[default]
    Unknown,
}

impl Orientation {
    pub const ALL: [Orientation; 7] = [
        Orientation::Portrait,
        Orientation::PortraitUpsideDown,
        Orientation::LandscapeLeft,
        Orientation::LandscapeRight,
        Orientation::FaceUp,
        Orientation::FaceDown,
        Orientation::Unknown,
    ];

    /// Rotation (degrees, counter-clockwise) from detector space to display space
    pub fn rotation_degrees(&self) -> f64 {
        match self {
            Orientation::Portrait => 90.0,
            Orientation::PortraitUpsideDown => -90.0,
            Orientation::LandscapeRight => 180.0,
            Orientation::LandscapeLeft
            | Orientation::FaceUp
            | Orientation::FaceDown
            | Orientation::Unknown => 0.0,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Orientation::Portrait => 0,
            Orientation::PortraitUpsideDown => 1,
            Orientation::LandscapeLeft => 2,
            Orientation::LandscapeRight => 3,
            Orientation::FaceUp => 4,
            Orientation::FaceDown => 5,
            Orientation::Unknown => 6,
        }
    }

    fn from_u8(value: u8) -> Self {
        Self::ALL
            .get(value as usize)
            .copied()
            .unwrap_or(Orientation::Unknown)
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Orientation::Portrait => "portrait",
            Orientation::PortraitUpsideDown => "portrait-upside-down",
            Orientation::LandscapeLeft => "landscape-left",
            Orientation::LandscapeRight => "landscape-right",
            Orientation::FaceUp => "face-up",
            Orientation::FaceDown => "face-down",
            Orientation::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|o| o.to_string() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown orientation '{}'", s))
    }
}

/// Provider of the current device orientation
pub trait OrientationSource: Send + Sync {
    fn current(&self) -> Orientation;
}

/// Orientation that only changes when told to
///
/// Used by the CLI (which has no motion sensor) and by tests that simulate
/// device rotation.
#[derive(Debug, Clone)]
pub struct FixedOrientation {
    value: Arc<AtomicU8>,
}

impl FixedOrientation {
    pub fn new(orientation: Orientation) -> Self {
        Self {
            value: Arc::new(AtomicU8::new(orientation.to_u8())),
        }
    }

    /// Change the reported orientation; visible to every clone
    pub fn set(&self, orientation: Orientation) {
        self.value.store(orientation.to_u8(), Ordering::Relaxed);
    }
}

impl Default for FixedOrientation {
    fn default() -> Self {
        Self::new(Orientation::Portrait)
    }
}

impl OrientationSource for FixedOrientation {
    fn current(&self) -> Orientation {
        Orientation::from_u8(self.value.load(Ordering::Relaxed))
    }
}

/// Orientation read through a closure (e.g. a sensor binding)
pub struct FnOrientation<F>(pub F);

impl<F> OrientationSource for FnOrientation<F>
where
    F: Fn() -> Orientation + Send + Sync,
{
    fn current(&self) -> Orientation {
        (self.0)()
    }
}

/// Sample `source` every `period`, yielding the first reading and then only changes
///
/// The stream never ends on its own; it is stopped by cancelling the effect
/// that drives it.
pub fn watch_orientation(
    source: Arc<dyn OrientationSource>,
    period: Duration,
) -> impl Stream<Item = Orientation> + Send + 'static {
    async_stream::stream! {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = None;

        loop {
            ticker.tick().await;
            let current = source.current();
            if last != Some(current) {
                last = Some(current);
                yield current;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_fixed_orientation_shared_between_clones() {
        let source = FixedOrientation::new(Orientation::Portrait);
        let other = source.clone();
        other.set(Orientation::LandscapeRight);
        assert_eq!(source.current(), Orientation::LandscapeRight);
    }

    #[test]
    fn test_parse_round_trips_display() {
        for orientation in Orientation::ALL {
            assert_eq!(orientation.to_string().parse(), Ok(orientation));
        }
        assert!("sideways".parse::<Orientation>().is_err());
    }

    #[test]
    fn test_rotation_angles() {
        assert_eq!(Orientation::Portrait.rotation_degrees(), 90.0);
        assert_eq!(Orientation::PortraitUpsideDown.rotation_degrees(), -90.0);
        assert_eq!(Orientation::LandscapeRight.rotation_degrees(), 180.0);
        assert_eq!(Orientation::FaceUp.rotation_degrees(), 0.0);
    }

    #[tokio::test]
    async fn test_watch_emits_initial_value_then_changes() {
        let source = FixedOrientation::new(Orientation::Portrait);
        let stream = watch_orientation(Arc::new(source.clone()), Duration::from_millis(2));
        futures::pin_mut!(stream);

        assert_eq!(stream.next().await, Some(Orientation::Portrait));
        source.set(Orientation::LandscapeLeft);
        assert_eq!(stream.next().await, Some(Orientation::LandscapeLeft));
    }
}
