//! Roles, permission codes and the table that binds them.
//!
//! Permissions, not roles, gate every operation. Roles only decide which
//! permissions a user carries, their rank in the office hierarchy, and whether
//! they see every puskesmas or just their own.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capability codes carried in the session credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionCode {
    ViewDashboard,
    ViewAllPuskesmas,
    ViewOwnPuskesmas,
    ViewAggregatedData,
    ExportReports,
    SyncData,
    ManageUsers,
    ManageSettings,
}

impl PermissionCode {
    pub const ALL: [PermissionCode; 8] = [
        PermissionCode::ViewDashboard,
        PermissionCode::ViewAllPuskesmas,
        PermissionCode::ViewOwnPuskesmas,
        PermissionCode::ViewAggregatedData,
        PermissionCode::ExportReports,
        PermissionCode::SyncData,
        PermissionCode::ManageUsers,
        PermissionCode::ManageSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionCode::ViewDashboard => "VIEW_DASHBOARD",
            PermissionCode::ViewAllPuskesmas => "VIEW_ALL_PUSKESMAS",
            PermissionCode::ViewOwnPuskesmas => "VIEW_OWN_PUSKESMAS",
            PermissionCode::ViewAggregatedData => "VIEW_AGGREGATED_DATA",
            PermissionCode::ExportReports => "EXPORT_REPORTS",
            PermissionCode::SyncData => "SYNC_DATA",
            PermissionCode::ManageUsers => "MANAGE_USERS",
            PermissionCode::ManageSettings => "MANAGE_SETTINGS",
        }
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Office roles, from the head of the district health office down to
/// single-puskesmas staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleCode {
    KepalaDinas,
    SekretarisDinas,
    KepalaBidang,
    AdminDinas,
    StaffDinas,
    KepalaPuskesmas,
    StaffPuskesmas,
}

/// Unknown role code in storage or input.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role code: {0}")]
pub struct UnknownRole(pub String);

use PermissionCode::*;

const DINAS_LEADERSHIP: &[PermissionCode] = &[
    ViewDashboard,
    ViewAllPuskesmas,
    ViewOwnPuskesmas,
    ViewAggregatedData,
    ExportReports,
];

const ADMIN_DINAS: &[PermissionCode] = &[
    ViewDashboard,
    ViewAllPuskesmas,
    ViewOwnPuskesmas,
    ViewAggregatedData,
    ExportReports,
    SyncData,
    ManageUsers,
    ManageSettings,
];

const STAFF_DINAS: &[PermissionCode] = &[
    ViewDashboard,
    ViewAllPuskesmas,
    ViewOwnPuskesmas,
    ViewAggregatedData,
];

const KEPALA_PUSKESMAS: &[PermissionCode] = &[
    ViewDashboard,
    ViewOwnPuskesmas,
    ViewAggregatedData,
    ExportReports,
    SyncData,
    ManageUsers,
];

const STAFF_PUSKESMAS: &[PermissionCode] = &[ViewDashboard, ViewOwnPuskesmas, SyncData];

impl RoleCode {
    pub const ALL: [RoleCode; 7] = [
        RoleCode::KepalaDinas,
        RoleCode::SekretarisDinas,
        RoleCode::KepalaBidang,
        RoleCode::AdminDinas,
        RoleCode::StaffDinas,
        RoleCode::KepalaPuskesmas,
        RoleCode::StaffPuskesmas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleCode::KepalaDinas => "KEPALA_DINAS",
            RoleCode::SekretarisDinas => "SEKRETARIS_DINAS",
            RoleCode::KepalaBidang => "KEPALA_BIDANG",
            RoleCode::AdminDinas => "ADMIN_DINAS",
            RoleCode::StaffDinas => "STAFF_DINAS",
            RoleCode::KepalaPuskesmas => "KEPALA_PUSKESMAS",
            RoleCode::StaffPuskesmas => "STAFF_PUSKESMAS",
        }
    }

    /// Position in the office hierarchy. Lower means broader access.
    pub fn rank(&self) -> u8 {
        match self {
            RoleCode::KepalaDinas => 1,
            RoleCode::SekretarisDinas => 2,
            RoleCode::KepalaBidang | RoleCode::AdminDinas => 3,
            RoleCode::StaffDinas => 4,
            RoleCode::KepalaPuskesmas => 5,
            RoleCode::StaffPuskesmas => 6,
        }
    }

    /// District-level roles see every puskesmas without a facility filter.
    pub fn is_district_level(&self) -> bool {
        !matches!(self, RoleCode::KepalaPuskesmas | RoleCode::StaffPuskesmas)
    }

    pub fn permissions(&self) -> &'static [PermissionCode] {
        match self {
            RoleCode::KepalaDinas | RoleCode::SekretarisDinas | RoleCode::KepalaBidang => {
                DINAS_LEADERSHIP
            }
            RoleCode::AdminDinas => ADMIN_DINAS,
            RoleCode::StaffDinas => STAFF_DINAS,
            RoleCode::KepalaPuskesmas => KEPALA_PUSKESMAS,
            RoleCode::StaffPuskesmas => STAFF_PUSKESMAS,
        }
    }
}

impl fmt::Display for RoleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleCode {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleCode::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Inconsistency found in the role table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoleTableError {
    #[error("role {0} has no permissions")]
    Empty(RoleCode),

    #[error("role {0} lists {1} more than once")]
    Duplicate(RoleCode, PermissionCode),

    #[error("district-level role {0} lacks VIEW_ALL_PUSKESMAS")]
    DistrictWithoutAllPuskesmas(RoleCode),

    #[error("facility-scoped role {0} must not hold VIEW_ALL_PUSKESMAS")]
    ScopedWithAllPuskesmas(RoleCode),
}

/// Check the role table once at startup.
pub fn validate_role_table() -> Result<(), RoleTableError> {
    for role in RoleCode::ALL {
        let perms = role.permissions();
        if perms.is_empty() {
            return Err(RoleTableError::Empty(role));
        }

        let mut seen = HashSet::new();
        for perm in perms {
            if !seen.insert(*perm) {
                return Err(RoleTableError::Duplicate(role, *perm));
            }
        }

        let sees_all = seen.contains(&ViewAllPuskesmas);
        if role.is_district_level() && !sees_all {
            return Err(RoleTableError::DistrictWithoutAllPuskesmas(role));
        }
        if !role.is_district_level() && sees_all {
            return Err(RoleTableError::ScopedWithAllPuskesmas(role));
        }
    }
    Ok(())
}
