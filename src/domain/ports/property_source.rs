//! Property Source Port
//!
//! Ambient configuration keyed by dotted paths, used for late binding of
//! pool tuning properties.

/// Read-only view over flattened configuration.
///
/// Keys are dotted paths with array positions in brackets, e.g.
/// `system.db.data-sources[0].r2d2.max-size`.
pub trait PropertySource: Send + Sync {
    /// Get the value stored under an exact key.
    fn get(&self, key: &str) -> Option<String>;

    /// Get every entry nested under `prefix`.
    ///
    /// Returned keys are relative to the prefix (the `prefix.` part is
    /// stripped). An empty prefix returns nothing.
    fn entries_under(&self, prefix: &str) -> Vec<(String, String)>;
}
