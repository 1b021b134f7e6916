//! Hydration status.

/// Whether the persisted session has been loaded back into memory.
///
/// Starts as `NotHydrated` for every store and moves to `Hydrated` exactly
/// once. There is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HydrationStatus {
    /// Persisted data has not been read yet; the session is unknown.
    #[default]
    NotHydrated,
    /// Rehydration finished, with or without stored data.
    Hydrated,
}

impl HydrationStatus {
    /// Check if rehydration has completed.
    pub fn is_hydrated(&self) -> bool {
        matches!(self, HydrationStatus::Hydrated)
    }

    /// Move to `Hydrated`.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn mark(&mut self) -> bool {
        if self.is_hydrated() {
            return false;
        }
        *self = HydrationStatus::Hydrated;
        true
    }
}
