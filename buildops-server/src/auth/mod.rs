//! Authentication primitives: password hashing, TOTP, sessions and role gates

pub mod context;
pub mod mfa;
pub mod password;

pub use context::{
    clear_session_cookie, extract_token, resolve_context, session_cookie, AuthContext, Session,
    SESSION_COOKIE,
};
pub use mfa::{generate_backup_codes, normalize_backup_code, MfaSecret};
pub use password::{hash_password, verify_password};

use crate::models::UserRole;

/// Auth error type
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("totp error: {0}")]
    Totp(String),
}

/// Minimum privilege a procedure requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Any signed-in user
    Authed,
    /// Owner or admin
    Admin,
    Owner,
}

impl Gate {
    pub fn allows(self, role: UserRole) -> bool {
        match self {
            Self::Authed => true,
            Self::Admin => role.is_admin(),
            Self::Owner => role == UserRole::Owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_decisions() {
        use UserRole::*;
        let table = [
            (Owner, [true, true, true]),
            (Admin, [true, true, false]),
            (Member, [true, false, false]),
            (Client, [true, false, false]),
        ];
        for (role, [authed, admin, owner]) in table {
            assert_eq!(Gate::Authed.allows(role), authed, "{role} authed");
            assert_eq!(Gate::Admin.allows(role), admin, "{role} admin");
            assert_eq!(Gate::Owner.allows(role), owner, "{role} owner");
        }
    }
}
