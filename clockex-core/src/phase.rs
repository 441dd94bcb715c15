use serde::{Deserialize, Serialize};

/// Visibility of the clock face within a trial cycle.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayPhase {
    #[default]
    Hidden,
    Visible,
}

impl DisplayPhase {
    pub fn is_visible(&self) -> bool {
        matches!(self, DisplayPhase::Visible)
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, DisplayPhase::Hidden)
    }

    /// The phase the cycle moves to next. The cycle never terminates on its
    /// own; end of set is decided by the scheduler.
    pub fn next(&self) -> Self {
        match self {
            DisplayPhase::Hidden => DisplayPhase::Visible,
            DisplayPhase::Visible => DisplayPhase::Hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_alternates() {
        let phase = DisplayPhase::default();
        assert!(phase.is_hidden());
        assert!(phase.next().is_visible());
        assert_eq!(phase.next().next(), DisplayPhase::Hidden);
    }
}
