//! Plan-based limits. Pure lookup, no state: the caller reads the owning
//! account fresh and asks for its limits at the point of enforcement.

use crate::types::{Plan, Role};

const MIB: i64 = 1024 * 1024;
const GIB: i64 = 1024 * MIB;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// `None` = unlimited.
    pub max_sites: Option<i64>,
    /// `None` = unlimited.
    pub max_storage_bytes: Option<i64>,
    pub max_upload_bytes: i64,
    pub max_files_per_upload: usize,
}

/// Limits for an account. Admin role wins over plan: admins are unbounded
/// on site count and storage regardless of what their plan row says.
#[must_use]
pub fn limits(role: Role, plan: Plan) -> Limits {
    if role == Role::Admin {
        return Limits {
            max_sites: None,
            max_storage_bytes: None,
            max_upload_bytes: 100 * MIB,
            max_files_per_upload: 50,
        };
    }

    match plan {
        Plan::Pro => Limits {
            max_sites: Some(10),
            max_storage_bytes: Some(10 * GIB),
            max_upload_bytes: 50 * MIB,
            max_files_per_upload: 10,
        },
        Plan::Enterprise => Limits {
            max_sites: Some(100),
            max_storage_bytes: Some(100 * GIB),
            max_upload_bytes: 100 * MIB,
            max_files_per_upload: 20,
        },
        // `free` is also the fallback for unrecognized plan values,
        // which Plan::parse already collapses to Free.
        Plan::Free | Plan::Admin => Limits {
            max_sites: Some(1),
            max_storage_bytes: Some(100 * MIB),
            max_upload_bytes: 10 * MIB,
            max_files_per_upload: 5,
        },
    }
}
