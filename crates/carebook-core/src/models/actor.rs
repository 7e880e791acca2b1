//! Request actors supplied by the auth collaborator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role attached to an authenticated request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    /// A family/patient account.
    Patient,
    /// A therapist account.
    Therapist,
    /// An organization account (acts for its own organization id).
    Organization,
    /// Front-desk staff driving the live board.
    FrontDesk,
    /// Platform administrator.
    Admin,
    /// Internal background jobs (sweepers).
    System,
}

/// The identity the auth collaborator resolved for a request.
///
/// The core trusts this pair for permission checks; it never authenticates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    /// The internal actor used by background sweeps.
    pub fn system() -> Self {
        Self {
            user_id: Uuid::nil(),
            role: Role::System,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
