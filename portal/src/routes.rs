use std::fmt;

use crate::models::Role;
use crate::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Services,
    Gallery,
    Contact,
    Team,
    Publications,
    Login,
    Inactive,
    Dashboard,
    Notices,
    Chat,
    Calendar,
    Documents,
    Polls,
    Users,
    NotFound,
}

const TABLE: &[(Route, &str)] = &[
    (Route::Home, "/"),
    (Route::Services, "/servicos"),
    (Route::Gallery, "/galeria"),
    (Route::Contact, "/contato"),
    (Route::Team, "/equipe"),
    (Route::Publications, "/publicacoes"),
    (Route::Login, "/admin/login"),
    (Route::Inactive, "/admin/inactive"),
    (Route::Dashboard, "/admin"),
    (Route::Notices, "/admin/notices"),
    (Route::Chat, "/admin/chat"),
    (Route::Calendar, "/admin/calendar"),
    (Route::Documents, "/admin/documents"),
    (Route::Polls, "/admin/polls"),
    (Route::Users, "/admin/users"),
];

impl Route {
    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let trimmed = path.trim_end_matches('/');
        let normalized = if trimmed.is_empty() { "/" } else { trimmed };

        TABLE
            .iter()
            .find(|(_, p)| *p == normalized)
            .map(|(route, _)| *route)
            .unwrap_or(Route::NotFound)
    }

    pub fn path(&self) -> &'static str {
        TABLE
            .iter()
            .find(|(route, _)| route == self)
            .map(|(_, path)| *path)
            .unwrap_or("/404")
    }

    /// Admin pages sit behind the session guard; login and the inactive notice do not.
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            Route::Dashboard
                | Route::Notices
                | Route::Chat
                | Route::Calendar
                | Route::Documents
                | Route::Polls
                | Route::Users
        )
    }

    pub fn required_role(&self) -> Option<Role> {
        match self {
            Route::Users => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Outcome of the protected-route wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Render,
    Loading,
    RedirectLogin,
    RedirectInactive,
    Forbidden,
}

impl Access {
    pub fn redirect_target(&self) -> Option<Route> {
        match self {
            Access::RedirectLogin => Some(Route::Login),
            Access::RedirectInactive => Some(Route::Inactive),
            Access::Forbidden => Some(Route::Dashboard),
            _ => None,
        }
    }
}

pub fn guard(state: &SessionState, route: Route) -> Access {
    if !route.is_protected() {
        return Access::Render;
    }
    if state.loading {
        return Access::Loading;
    }
    if state.user.is_none() {
        return Access::RedirectLogin;
    }

    // A user without a profile row was never provisioned and is treated like an inactive one.
    let Some(profile) = &state.profile else {
        return Access::RedirectInactive;
    };
    if !profile.active {
        return Access::RedirectInactive;
    }

    match route.required_role() {
        Some(role) if profile.role != role => Access::Forbidden,
        _ => Access::Render,
    }
}
