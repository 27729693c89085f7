//! User control actions shared by speed, pitch and duration controls.

/// How a control value combines with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// Replace the current value.
    Overwrite,
    /// Add to the current value.
    Shift,
    /// Multiply the current value.
    Scale,
    /// Follow what the model generates.
    Synthetic,
    #[default]
    NoAction,
}

impl Action {
    /// Combine `value` with `current`.
    ///
    /// Returns `None` for [`Action::Synthetic`] and [`Action::NoAction`]; what
    /// that means is up to the caller.
    #[inline]
    pub fn apply(self, current: f64, value: f64) -> Option<f64> {
        match self {
            Action::Overwrite => Some(value),
            Action::Shift => Some(current + value),
            Action::Scale => Some(current * value),
            Action::Synthetic | Action::NoAction => None,
        }
    }
}
