//! Service activation policy.
//!
//! At most one HID service is published at a time: centrals cache the
//! report map per service, and two maps visible at once make some hosts
//! bind input to the wrong one. Activating any profile therefore plans the
//! removal of whichever profile is currently active, and the composite
//! profile replaces the per-device ones wholesale.

use crate::descriptor::HidProfile;
use crate::error::Error;

#[derive(Debug, Default)]
pub(crate) struct ServiceActivator {
    active: Option<HidProfile>,
}

impl ServiceActivator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<HidProfile> {
        self.active
    }

    pub fn is_active(&self, profile: HidProfile) -> bool {
        self.active == Some(profile)
    }

    /// Decide what must be removed before `profile` can be added.
    ///
    /// `Err(AlreadyActive)` is benign: the caller treats it as success.
    pub fn plan_activate(&self, profile: HidProfile) -> Result<Option<HidProfile>, Error> {
        match self.active {
            Some(active) if active == profile => Err(Error::AlreadyActive),
            other => Ok(other),
        }
    }

    pub fn committed_add(&mut self, profile: HidProfile) {
        self.active = Some(profile);
    }

    pub fn committed_remove(&mut self, profile: HidProfile) {
        if self.active == Some(profile) {
            self.active = None;
        }
    }
}
