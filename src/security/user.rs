//! Per-request visibility of monitoring objects

use crate::monitoring::{Contact, Host, HostGroup, MonitoringCore, Service, ServiceGroup};
use crate::security::permissions::{AuthorizationKind, AuthorizationPolicy};

/// The requesting user, resolved from `AuthUser:`
pub enum User<'a> {
    /// No `AuthUser:` header, everything is visible
    NoAuth,
    /// `AuthUser:` names no known contact, nothing restricted is visible
    Unknown,
    Contact(AuthUser<'a>),
}

/// An authenticated contact
pub struct AuthUser<'a> {
    core: &'a dyn MonitoringCore,
    contact: &'a Contact,
    service_authorization: AuthorizationKind,
    group_authorization: AuthorizationKind,
    see_all: bool,
}

impl<'a> User<'a> {
    pub fn resolve(
        core: &'a dyn MonitoringCore,
        name: Option<&str>,
        policy: &AuthorizationPolicy,
    ) -> User<'a> {
        let Some(name) = name else {
            return User::NoAuth;
        };
        match core.find_contact(name) {
            Some(contact) => User::Contact(AuthUser {
                core,
                contact,
                service_authorization: policy.service_authorization,
                group_authorization: policy.group_authorization,
                see_all: policy.sees_all(name),
            }),
            None => User::Unknown,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            User::Contact(user) => Some(&user.contact.name),
            _ => None,
        }
    }

    fn sees_everything(&self) -> bool {
        match self {
            User::NoAuth => true,
            User::Unknown => false,
            User::Contact(user) => user.see_all,
        }
    }

    pub fn is_authorized_for_host(&self, host: &Host) -> bool {
        match self {
            User::NoAuth => true,
            User::Unknown => false,
            User::Contact(user) => user.see_all || user.is_host_contact(host),
        }
    }

    pub fn is_authorized_for_service(&self, service: &Service) -> bool {
        match self {
            User::NoAuth => true,
            User::Unknown => false,
            User::Contact(user) => {
                if user.see_all || user.is_service_contact(service) {
                    return true;
                }
                user.service_authorization == AuthorizationKind::Loose
                    && user
                        .core
                        .host(service.host)
                        .map_or(false, |host| user.is_host_contact(host))
            }
        }
    }

    pub fn is_authorized_for_host_group(&self, group: &HostGroup) -> bool {
        if self.sees_everything() {
            return true;
        }
        let User::Contact(user) = self else {
            return false;
        };
        let core = user.core;
        let mut members = group.member_ids.iter().filter_map(|id| core.host(*id));
        match user.group_authorization {
            AuthorizationKind::Loose => members.any(|h| self.is_authorized_for_host(h)),
            AuthorizationKind::Strict => members.all(|h| self.is_authorized_for_host(h)),
        }
    }

    pub fn is_authorized_for_service_group(&self, group: &ServiceGroup) -> bool {
        if self.sees_everything() {
            return true;
        }
        let User::Contact(user) = self else {
            return false;
        };
        let core = user.core;
        let mut members = group.member_ids.iter().filter_map(|id| core.service(*id));
        match user.group_authorization {
            AuthorizationKind::Loose => members.any(|s| self.is_authorized_for_service(s)),
            AuthorizationKind::Strict => members.all(|s| self.is_authorized_for_service(s)),
        }
    }

    /// Objects that may refer to a host and optionally a service, like log
    /// entries
    pub fn is_authorized_for_object(
        &self,
        host: Option<&Host>,
        service: Option<&Service>,
        authorized_if_no_host: bool,
    ) -> bool {
        if self.sees_everything() {
            return true;
        }
        match (host, service) {
            (None, _) => authorized_if_no_host && !matches!(self, User::Unknown),
            (Some(_), Some(service)) => self.is_authorized_for_service(service),
            (Some(host), None) => self.is_authorized_for_host(host),
        }
    }

    /// Event console events
    ///
    /// `contact_groups` is `None` when the rule defines no contact groups at
    /// all, which differs from an empty list.
    pub fn is_authorized_for_event(
        &self,
        precedence: &str,
        contact_groups: Option<&[&str]>,
        host: Option<&Host>,
    ) -> bool {
        if self.sees_everything() {
            return true;
        }
        let User::Contact(user) = self else {
            return false;
        };
        let via_groups = |groups: &[&str]| groups.iter().any(|g| user.is_member_of(g));
        match precedence {
            "rule" => match (contact_groups, host) {
                (Some(groups), _) => via_groups(groups),
                (None, Some(host)) => self.is_authorized_for_host(host),
                (None, None) => true,
            },
            "host" => match (host, contact_groups) {
                (Some(host), _) => self.is_authorized_for_host(host),
                (None, Some(groups)) => via_groups(groups),
                (None, None) => true,
            },
            _ => false,
        }
    }
}

impl AuthUser<'_> {
    fn is_host_contact(&self, host: &Host) -> bool {
        host.contact_ids.contains(&self.contact.id)
            || host
                .contact_group_ids
                .iter()
                .any(|g| self.contact.groups.contains(g))
    }

    fn is_service_contact(&self, service: &Service) -> bool {
        service.contact_ids.contains(&self.contact.id)
            || service
                .contact_group_ids
                .iter()
                .any(|g| self.contact.groups.contains(g))
    }

    fn is_member_of(&self, contact_group: &str) -> bool {
        self.core
            .find_contact_group(contact_group)
            .map_or(false, |g| self.contact.groups.contains(&g.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::snapshot::fixtures::site;

    fn policy() -> AuthorizationPolicy {
        AuthorizationPolicy {
            see_all: vec!["carol".to_string()],
            ..AuthorizationPolicy::default()
        }
    }

    #[test]
    fn test_no_auth_sees_everything() {
        let s = site();
        let user = User::resolve(&s, None, &policy());
        assert!(s.hosts.iter().all(|h| user.is_authorized_for_host(h)));
        assert!(user.is_authorized_for_event("bogus", None, None));
    }

    #[test]
    fn test_unknown_user_sees_nothing() {
        let s = site();
        let user = User::resolve(&s, Some("mallory"), &policy());
        assert!(s.hosts.iter().all(|h| !user.is_authorized_for_host(h)));
        assert!(!user.is_authorized_for_event("rule", None, None));
        assert!(!user.is_authorized_for_object(None, None, true));
    }

    #[test]
    fn test_host_contacts() {
        let s = site();
        let alice = User::resolve(&s, Some("alice"), &policy());
        assert!(alice.is_authorized_for_host(s.find_host("h1").unwrap()));
        assert!(alice.is_authorized_for_host(s.find_host("h2").unwrap()));
        assert!(!alice.is_authorized_for_host(s.find_host("h3").unwrap()));
    }

    #[test]
    fn test_see_all_contact() {
        let s = site();
        let carol = User::resolve(&s, Some("carol"), &policy());
        assert!(carol.is_authorized_for_host(s.find_host("h2").unwrap()));
    }

    #[test]
    fn test_loose_and_strict_services() {
        let s = site();
        let disk = s.find_service("h1", "Disk").unwrap();
        let cpu = s.find_service("h1", "CPU").unwrap();

        let loose = User::resolve(&s, Some("alice"), &AuthorizationPolicy::default());
        assert!(loose.is_authorized_for_service(disk));

        let strict_policy = AuthorizationPolicy {
            service_authorization: AuthorizationKind::Strict,
            ..AuthorizationPolicy::default()
        };
        let strict = User::resolve(&s, Some("alice"), &strict_policy);
        assert!(!strict.is_authorized_for_service(disk));

        let bob = User::resolve(&s, Some("bob"), &strict_policy);
        assert!(bob.is_authorized_for_service(cpu));
        assert!(!bob.is_authorized_for_host(s.find_host("h1").unwrap()));
    }

    #[test]
    fn test_group_authorization() {
        let s = site();
        let web = s.find_host_group("web").unwrap();
        let strict = User::resolve(&s, Some("alice"), &AuthorizationPolicy::default());
        assert!(!strict.is_authorized_for_host_group(web));

        let loose_policy = AuthorizationPolicy {
            group_authorization: AuthorizationKind::Loose,
            ..AuthorizationPolicy::default()
        };
        let loose = User::resolve(&s, Some("alice"), &loose_policy);
        assert!(loose.is_authorized_for_host_group(web));
    }

    #[test]
    fn test_event_precedence() {
        let s = site();
        let h1 = s.find_host("h1");
        let h3 = s.find_host("h3");
        let alice = User::resolve(&s, Some("alice"), &AuthorizationPolicy::default());
        let admins: &[&str] = &["web-admins"];

        assert!(!alice.is_authorized_for_event("rule", Some(admins), h1));
        assert!(alice.is_authorized_for_event("rule", None, h1));
        assert!(alice.is_authorized_for_event("rule", None, None));
        assert!(alice.is_authorized_for_event("host", Some(admins), h1));
        assert!(!alice.is_authorized_for_event("host", None, h3));
        assert!(!alice.is_authorized_for_event("host", Some(admins), None));
        assert!(!alice.is_authorized_for_event("other", None, h1));

        let carol_policy = AuthorizationPolicy::default();
        let carol = User::resolve(&s, Some("carol"), &carol_policy);
        assert!(carol.is_authorized_for_event("rule", Some(admins), None));
    }

    #[test]
    fn test_object_authorization() {
        let s = site();
        let alice = User::resolve(&s, Some("alice"), &AuthorizationPolicy::default());
        assert!(!alice.is_authorized_for_object(None, None, false));
        assert!(alice.is_authorized_for_object(s.find_host("h2"), None, false));
    }
}
