//! Permission table mapping roles and categories to delivery rights.
//!
//! Administrators receive every category. Every other role receives the
//! system, maintenance and user-level categories but never admin or
//! security traffic, nor admin-only variants.

use notifyhub_entity::{Namespace, NotificationCategory, NotificationMessage, UserRole};

/// Stateless authorization policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationPolicy;

impl AuthorizationPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Whether `role` may receive messages of `category`.
    pub fn allows_category(&self, role: UserRole, category: NotificationCategory) -> bool {
        if role.is_admin() {
            return true;
        }
        !category.is_admin_only()
    }

    /// Whether `role` may receive `message`.
    pub fn is_authorized(&self, role: UserRole, message: &NotificationMessage) -> bool {
        if role.is_admin() {
            return true;
        }
        self.allows_category(role, message.category) && !message.variant.is_admin_only()
    }

    /// Namespace `message` is delivered on for `role`, `None` when denied.
    pub fn resolve_namespace(&self, role: UserRole, message: &NotificationMessage) -> Option<Namespace> {
        if !self.is_authorized(role, message) {
            return None;
        }
        match message.category {
            NotificationCategory::Admin | NotificationCategory::Security => Some(Namespace::Admin),
            _ if message.variant.is_admin_only() => Some(Namespace::Admin),
            _ => Some(Namespace::General),
        }
    }

    /// Namespaces a role may attach sessions to.
    pub fn reachable_namespaces(&self, role: UserRole) -> &'static [Namespace] {
        if role.is_admin() {
            &[Namespace::General, Namespace::Admin]
        } else {
            &[Namespace::General]
        }
    }
}

#[cfg(test)]
mod tests {
    use notifyhub_entity::NotificationKind;
    use notifyhub_entity::notification::variant::{AdminContext, NotificationVariant};

    use super::*;

    fn message(category: NotificationCategory) -> NotificationMessage {
        NotificationMessage::new(category, NotificationKind::Info, "t", "b")
    }

    #[test]
    fn test_non_admins_never_get_admin_or_security() {
        let policy = AuthorizationPolicy::new();
        for role in [UserRole::Moderator, UserRole::Reviewer, UserRole::Viewer] {
            for category in [NotificationCategory::Admin, NotificationCategory::Security] {
                assert!(!policy.is_authorized(role, &message(category)));
                assert_eq!(policy.resolve_namespace(role, &message(category)), None);
            }
            assert!(policy.is_authorized(role, &message(NotificationCategory::Maintenance)));
            assert!(policy.is_authorized(role, &message(NotificationCategory::System)));
        }
    }

    #[test]
    fn test_admins_get_everything() {
        let policy = AuthorizationPolicy::new();
        for category in NotificationCategory::ALL {
            assert!(policy.is_authorized(UserRole::Admin, &message(category)));
        }
    }

    #[test]
    fn test_namespace_resolution() {
        let policy = AuthorizationPolicy::new();
        assert_eq!(
            policy.resolve_namespace(UserRole::Admin, &message(NotificationCategory::Admin)),
            Some(Namespace::Admin)
        );
        assert_eq!(
            policy.resolve_namespace(UserRole::Admin, &message(NotificationCategory::Security)),
            Some(Namespace::Admin)
        );
        assert_eq!(
            policy.resolve_namespace(UserRole::Viewer, &message(NotificationCategory::Storage)),
            Some(Namespace::General)
        );
        assert_eq!(
            policy.resolve_namespace(UserRole::Admin, &message(NotificationCategory::System)),
            Some(Namespace::General)
        );
    }

    #[test]
    fn test_admin_only_variant_requires_admin() {
        let policy = AuthorizationPolicy::new();
        let msg = message(NotificationCategory::Admin).with_variant(NotificationVariant::Admin(AdminContext {
            admin_only: true,
            action: "user.suspended".into(),
            actor: None,
            target: None,
            details: None,
        }));
        assert!(!policy.is_authorized(UserRole::Moderator, &msg));
        assert_eq!(policy.resolve_namespace(UserRole::Admin, &msg), Some(Namespace::Admin));
    }
}
