//! Route Guard: decides what a requested path renders.
//!
//! [`decide`] is total and pure. It never redirects while the session is
//! still loading.

use super::session::SessionState;
use super::types::{Role, Session};
use crate::routes::{is_onboarding_path, normalize_path, Route, HOME_PATH, SIGNIN_PATH};

/// Access requirements of one route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRequirements {
    pub require_auth: bool,
    /// Empty means any role
    pub allowed_roles: Vec<Role>,
    /// Route is part of the onboarding flow
    pub require_onboarding: bool,
}

impl RouteRequirements {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        Self {
            require_auth: true,
            ..Self::default()
        }
    }

    pub fn admin() -> Self {
        Self {
            require_auth: true,
            allowed_roles: vec![Role::Admin],
            require_onboarding: false,
        }
    }

    pub fn onboarding() -> Self {
        Self {
            require_auth: true,
            allowed_roles: Vec::new(),
            require_onboarding: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session not resolved yet; show a neutral placeholder
    Loading,
    Render,
    /// `from` is the path to return to after signing in
    RedirectToSignin { from: String },
    RedirectHome,
}

impl GuardDecision {
    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            GuardDecision::RedirectToSignin { .. } | GuardDecision::RedirectHome
        )
    }

    /// Target path for redirects.
    pub fn redirect_path(&self) -> Option<&str> {
        match self {
            GuardDecision::RedirectToSignin { .. } => Some(SIGNIN_PATH),
            GuardDecision::RedirectHome => Some(HOME_PATH),
            GuardDecision::Loading | GuardDecision::Render => None,
        }
    }
}

pub fn decide(
    session: Option<&Session>,
    loading: bool,
    path: &str,
    requirements: &RouteRequirements,
) -> GuardDecision {
    if loading {
        return GuardDecision::Loading;
    }
    if !requirements.require_auth {
        return GuardDecision::Render;
    }

    let Some(session) = session else {
        return GuardDecision::RedirectToSignin {
            from: normalize_path(path).to_string(),
        };
    };

    if !requirements.allowed_roles.is_empty() && !requirements.allowed_roles.contains(&session.role)
    {
        return GuardDecision::RedirectHome;
    }
    if is_onboarding_path(path) && !requirements.require_onboarding {
        return GuardDecision::RedirectHome;
    }

    GuardDecision::Render
}

/// Guard `path` with the requirements from the route table.
pub fn decide_for(state: &SessionState, path: &str) -> GuardDecision {
    let requirements = Route::from_path(path).requirements();
    decide(state.session(), state.loading(), path, &requirements)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Role) -> Session {
        Session {
            identity: "jane".into(),
            display_name: "Jane".into(),
            email: "jane@x.com".into(),
            avatar: None,
            role,
            onboarding_complete: false,
        }
    }

    #[test]
    fn loading_never_redirects() {
        let user = session(Role::User);
        for requirements in [
            RouteRequirements::public(),
            RouteRequirements::authenticated(),
            RouteRequirements::admin(),
            RouteRequirements::onboarding(),
        ] {
            for s in [None, Some(&user)] {
                for path in ["/", "/admin/feedback", "/onboarding/1", "/nowhere"] {
                    assert_eq!(decide(s, true, path, &requirements), GuardDecision::Loading);
                }
            }
        }
    }

    #[test]
    fn anonymous_is_sent_to_signin_with_return_path() {
        let decision = decide(None, false, "/settings/account/", &RouteRequirements::authenticated());
        assert_eq!(
            decision,
            GuardDecision::RedirectToSignin {
                from: "/settings/account".into()
            }
        );
        assert_eq!(decision.redirect_path(), Some(SIGNIN_PATH));
    }

    #[test]
    fn wrong_role_goes_home() {
        let user = session(Role::User);
        assert_eq!(
            decide(Some(&user), false, "/admin/feedback", &RouteRequirements::admin()),
            GuardDecision::RedirectHome
        );

        let admin = session(Role::Admin);
        assert_eq!(
            decide(Some(&admin), false, "/admin/feedback", &RouteRequirements::admin()),
            GuardDecision::Render
        );
    }

    #[test]
    fn onboarding_paths_need_onboarding_flag() {
        let user = session(Role::User);
        assert_eq!(
            decide(Some(&user), false, "/onboarding/2", &RouteRequirements::authenticated()),
            GuardDecision::RedirectHome
        );
        assert_eq!(
            decide(Some(&user), false, "/onboarding/2", &RouteRequirements::onboarding()),
            GuardDecision::Render
        );
    }

    #[test]
    fn route_table_drives_decide_for() {
        let anonymous = SessionState::Anonymous;
        assert_eq!(decide_for(&anonymous, "/signin"), GuardDecision::Render);
        assert!(decide_for(&anonymous, "/unlisted").is_redirect());

        let user = SessionState::Authenticated(session(Role::User));
        assert_eq!(decide_for(&user, "/onboarding/3"), GuardDecision::Render);
        assert_eq!(decide_for(&user, "/onboarding/9"), GuardDecision::RedirectHome);
        assert_eq!(decide_for(&user, "/admin/feedback"), GuardDecision::RedirectHome);
        assert_eq!(decide_for(&SessionState::Bootstrapping, "/"), GuardDecision::Loading);
    }
}
