//! Request-scoped authorization state and the scope predicates built on it.

use std::collections::HashSet;

use serde::Serialize;

use crate::auth::roles::{PermissionCode, RoleCode};
use crate::auth::token::SessionClaims;
use crate::error::{EisError, Result};

/// Authorization state derived from a verified session credential.
///
/// Built once per request and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
    pub email: String,
    pub role_code: RoleCode,
    pub puskesmas_id: Option<String>,
    pub wilayah_id: Option<String>,
    pub permissions: HashSet<PermissionCode>,
}

/// Facility/region restriction applied to analytics queries.
///
/// Both fields `None` means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub puskesmas_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wilayah_id: Option<String>,
}

impl AccessFilter {
    pub fn is_unrestricted(&self) -> bool {
        self.puskesmas_id.is_none() && self.wilayah_id.is_none()
    }

    /// Restrict to a single puskesmas.
    pub fn for_puskesmas(puskesmas_id: impl Into<String>) -> Self {
        Self {
            puskesmas_id: Some(puskesmas_id.into()),
            wilayah_id: None,
        }
    }
}

/// Whether a route needs a puskesmas to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacilityScope {
    NotRequired,
    /// The requested puskesmas id, if the caller named one.
    Required(Option<String>),
}

impl UserContext {
    pub fn from_claims(claims: &SessionClaims) -> Self {
        Self {
            user_id: claims.user_id.clone(),
            email: claims.email.clone(),
            role_code: claims.role_code,
            puskesmas_id: claims.puskesmas_id.clone(),
            wilayah_id: claims.wilayah_id.clone(),
            permissions: claims.permissions.iter().copied().collect(),
        }
    }

    pub fn has_permission(&self, permission: PermissionCode) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn is_district_level(&self) -> bool {
        self.role_code.is_district_level()
    }

    /// The one predicate applied before returning any facility-scoped record.
    pub fn can_access_facility(&self, puskesmas_id: &str) -> bool {
        self.is_district_level() || self.puskesmas_id.as_deref() == Some(puskesmas_id)
    }

    /// Gate for row-level (re-identifiable) data.
    ///
    /// Without a facility only district-level users pass.
    pub fn can_view_detail(&self, puskesmas_id: Option<&str>) -> bool {
        match puskesmas_id {
            Some(id) => self.can_access_facility(id),
            None => self.is_district_level(),
        }
    }

    /// A facility-level account with neither a puskesmas nor a region.
    fn is_unscoped(&self) -> bool {
        !self.is_district_level() && self.puskesmas_id.is_none() && self.wilayah_id.is_none()
    }

    /// Empty for district-level roles; never empty for anyone else.
    pub fn filter_by_access(&self) -> Result<AccessFilter> {
        if self.is_district_level() {
            return Ok(AccessFilter::default());
        }
        if self.is_unscoped() {
            return Err(EisError::forbidden("no puskesmas assigned to this account"));
        }
        Ok(AccessFilter {
            puskesmas_id: self.puskesmas_id.clone(),
            wilayah_id: self.wilayah_id.clone(),
        })
    }

    /// Permission and facility gate shared by every protected route.
    ///
    /// Returns the puskesmas the request resolves to, which is the requested
    /// one or, failing that, the caller's own.
    pub fn authorize(
        &self,
        permission: PermissionCode,
        scope: FacilityScope,
    ) -> Result<Option<String>> {
        if !self.has_permission(permission) {
            return Err(EisError::forbidden(format!("missing permission {}", permission)));
        }
        if self.is_unscoped() {
            return Err(EisError::forbidden("no puskesmas assigned to this account"));
        }

        let requested = match scope {
            FacilityScope::NotRequired => return Ok(None),
            FacilityScope::Required(requested) => requested,
        };

        match requested.or_else(|| self.puskesmas_id.clone()) {
            Some(id) if self.can_access_facility(&id) => Ok(Some(id)),
            Some(_) => Err(EisError::forbidden("puskesmas outside your scope")),
            None if self.is_district_level() => Ok(None),
            None => Err(EisError::forbidden("no puskesmas assigned to this account")),
        }
    }
}
