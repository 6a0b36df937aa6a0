//! Access policy: expiry and view ceilings.
//!
//! All checks are pure functions of the container's [`AccessRestrictions`]
//! and a caller-supplied `now`, so the service and tests control time.

use chrono::{DateTime, Utc};
use sdc_core::{AccessDenial, AccessRestrictions, Error, Result, SdcFile};

/// Outcome of [`check_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    /// First violated restriction, when denied.
    pub reason: Option<AccessDenial>,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: AccessDenial) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }

    /// `Ok(())` when allowed, `AccessDenied` otherwise.
    pub fn into_result(self) -> Result<()> {
        match self.reason {
            Some(reason) => Err(Error::AccessDenied(reason)),
            None => Ok(()),
        }
    }
}

/// Lifecycle state of a container's restrictions.
///
/// `Expired` and `Exhausted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessState {
    /// No expiry and no view limit.
    Unrestricted,
    /// Restricted, but readable now.
    Available,
    Expired,
    Exhausted,
}

/// Decide whether a read may proceed. Expiry is checked before the view
/// ceiling; the first violation wins.
pub fn check_access(access: &AccessRestrictions, now: DateTime<Utc>) -> AccessDecision {
    if let Some(expires_at) = access.expires_at {
        if now >= expires_at {
            return AccessDecision::deny(AccessDenial::Expired { expires_at });
        }
    }
    if let Some(max_views) = access.max_views {
        if access.view_count >= max_views {
            return AccessDecision::deny(AccessDenial::ViewLimitReached {
                max_views,
                view_count: access.view_count,
            });
        }
    }
    AccessDecision::allow()
}

pub fn access_state(access: &AccessRestrictions, now: DateTime<Utc>) -> AccessState {
    if access.is_unrestricted() {
        return AccessState::Unrestricted;
    }
    match check_access(access, now).reason {
        Some(AccessDenial::Expired { .. }) => AccessState::Expired,
        Some(AccessDenial::ViewLimitReached { .. }) => AccessState::Exhausted,
        None => AccessState::Available,
    }
}

/// Copy of `container` with one more recorded view.
pub fn record_view(container: &SdcFile, now: DateTime<Utc>) -> SdcFile {
    let mut updated = container.clone();
    updated.metadata.access.view_count = updated.metadata.access.view_count.saturating_add(1);
    updated.last_modified = now;
    updated
}

pub fn views_remaining(access: &AccessRestrictions) -> Option<u32> {
    access.views_remaining()
}
