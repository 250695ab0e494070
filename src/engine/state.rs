use serde::{Deserialize, Serialize};

/// Engagement count of an entity together with the caller's own flag.
///
/// `count` is unsigned so it can never go negative; decrements saturate at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngagementState {
    /// Number of engagements (likes, or places in a list).
    pub count: u64,
    /// Whether the current caller has the relationship active.
    pub engaged: bool,
}

impl EngagementState {
    /// State with the given count and flag.
    pub const fn new(count: u64, engaged: bool) -> Self {
        Self { count, engaged }
    }

    /// State after one local toggle: flip the flag and move the count by one.
    pub fn toggled(self) -> Self {
        if self.engaged {
            Self {
                count: self.count.saturating_sub(1),
                engaged: false,
            }
        } else {
            Self {
                count: self.count.saturating_add(1),
                engaged: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_on_increments() {
        assert_eq!(
            EngagementState::new(10, false).toggled(),
            EngagementState::new(11, true)
        );
    }

    #[test]
    fn toggling_off_clamps_at_zero() {
        assert_eq!(
            EngagementState::new(0, true).toggled(),
            EngagementState::new(0, false)
        );
    }
}
