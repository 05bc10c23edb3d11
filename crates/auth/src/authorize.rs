use thiserror::Error;

use storefront_core::UserId;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: not the owner of this resource")]
    NotOwner,
}

/// Check that a principal holds a permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p.as_str() == required.as_str());

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Owner-or-admin policy: administrators may act for anyone, everybody else
/// only for themselves.
pub fn authorize_owner_or_admin(principal: &Principal, target: &UserId) -> Result<(), AuthzError> {
    if principal.is_admin() || &principal.user_id == target {
        Ok(())
    } else {
        Err(AuthzError::NotOwner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    #[test]
    fn owner_may_act_for_self_only() {
        let alice = Principal::new(user("alice"), vec![Role::customer()]);
        assert!(authorize_owner_or_admin(&alice, &user("alice")).is_ok());
        assert_eq!(
            authorize_owner_or_admin(&alice, &user("bob")),
            Err(AuthzError::NotOwner)
        );
    }

    #[test]
    fn admin_may_act_for_anyone() {
        let admin = Principal::new(user("root"), vec![Role::admin()]);
        assert!(authorize_owner_or_admin(&admin, &user("bob")).is_ok());
        assert!(authorize(&admin, &Permission::new(Permission::STOCK_ALERTS_MANAGE)).is_ok());
    }

    #[test]
    fn customers_lack_admin_permissions() {
        let alice = Principal::new(user("alice"), vec![Role::customer()]);
        match authorize(&alice, &Permission::new(Permission::ORDERS_READ_ALL)) {
            Err(AuthzError::Forbidden(p)) => assert_eq!(p, "orders.read_all"),
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[test]
    fn admin_role_match_is_case_insensitive() {
        let admin = Principal::new(user("root"), vec![Role::new("Admin")]);
        assert!(admin.is_admin());
    }
}
