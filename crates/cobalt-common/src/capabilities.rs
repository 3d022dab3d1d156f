//! Process-wide capabilities injected into the core rather than reached for
//! as globals.

use crate::model::SystemProfile;

/// Supplies the current device's `(os, arch, board_name, product_name)`,
/// read-only for the life of the process.
pub trait SystemProfileProvider: Send + Sync {
    fn current(&self) -> SystemProfile;
}

/// A provider that always returns a fixed profile, for tests and for
/// environments where system introspection is not available.
#[derive(Debug, Clone, Default)]
pub struct StaticSystemProfileProvider(pub SystemProfile);

impl SystemProfileProvider for StaticSystemProfileProvider {
    fn current(&self) -> SystemProfile {
        self.0.clone()
    }
}
