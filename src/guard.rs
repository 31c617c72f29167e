//! Route guards for the role-gated dashboard sections.
//!
//! SYSTEM CONTEXT
//! ==============
//! Each top-level section (super-admin, tenant-admin, tenant-staff,
//! passenger) gets a `RouteGuard` on entry. The guard decides between
//! rendering (`Authorized`) and sending the visitor to login
//! (`Redirecting`). Wrong role and no session are treated the same.
//!
//! STATES
//! ======
//! `Unchecked -> Authorized | Redirecting` for sections that trust the
//! in-memory session, and `Unchecked -> Checking -> Authorized | Redirecting`
//! for sections that must survive a fresh load with only persisted tokens.
//! `Redirecting` is sticky: re-checking never issues a second navigation.
//! Every transition is published on a `watch` channel, so a shell rendering
//! a loading view can observe `Checking` while `check` is awaiting restore.

use tokio::sync::watch;

use crate::api::client::{ApiClient, LOGIN_PATH};
use crate::api::types::Role;
use crate::session::RestoreOutcome;

pub const SUPER_ADMIN_LOGIN_PATH: &str = "/super-admin/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    SuperAdmin,
    TenantAdmin,
    TenantStaff,
    Passenger,
}

impl Section {
    /// Roles allowed to view the section.
    #[must_use]
    pub fn permitted_roles(self) -> &'static [Role] {
        match self {
            Self::SuperAdmin => &[Role::SuperAdmin],
            Self::TenantAdmin => &[Role::TenantAdmin],
            Self::TenantStaff => &[Role::TenantAdmin, Role::TenantStaff],
            Self::Passenger => &[Role::Passenger],
        }
    }

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::SuperAdmin => "/super-admin",
            Self::TenantAdmin => "/tenant-admin",
            Self::TenantStaff => "/tenant-staff",
            Self::Passenger => "/passenger",
        }
    }

    #[must_use]
    pub fn login_path(self) -> &'static str {
        match self {
            Self::SuperAdmin => SUPER_ADMIN_LOGIN_PATH,
            Self::TenantAdmin | Self::TenantStaff | Self::Passenger => LOGIN_PATH,
        }
    }

    /// Whether entry may recover a session from persisted tokens.
    #[must_use]
    pub fn restores_persisted_session(self) -> bool {
        !matches!(self, Self::SuperAdmin)
    }

    /// Section owning an in-app path, e.g. `/tenant-admin/bookings`.
    #[must_use]
    pub fn for_path(path: &str) -> Option<Self> {
        [Self::SuperAdmin, Self::TenantAdmin, Self::TenantStaff, Self::Passenger]
            .into_iter()
            .find(|section| {
                path.strip_prefix(section.path())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Unchecked,
    Checking,
    Authorized,
    Redirecting { target: String },
}

impl GuardState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authorized | Self::Redirecting { .. })
    }
}

#[derive(Debug)]
pub struct RouteGuard {
    section: Section,
    api: ApiClient,
    state: GuardState,
    transitions: watch::Sender<GuardState>,
}

impl RouteGuard {
    #[must_use]
    pub fn new(section: Section, api: ApiClient) -> Self {
        let (transitions, _rx) = watch::channel(GuardState::Unchecked);
        Self { section, api, state: GuardState::Unchecked, transitions }
    }

    /// Receiver for state transitions, including `Checking`.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.transitions.subscribe()
    }

    #[must_use]
    pub fn section(&self) -> Section {
        self.section
    }

    #[must_use]
    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// Evaluate the session against the section. Safe to call repeatedly.
    pub async fn check(&mut self) -> &GuardState {
        if matches!(self.state, GuardState::Redirecting { .. }) {
            return &self.state;
        }

        let permitted = self.section.permitted_roles();
        let login = self.section.login_path();

        if self.section.restores_persisted_session() {
            self.set_state(GuardState::Checking);
            let next = match self.api.session().restore(&self.api, permitted, login).await {
                RestoreOutcome::Authenticated(_) => GuardState::Authorized,
                RestoreOutcome::Redirected => GuardState::Redirecting { target: login.to_owned() },
            };
            self.set_state(next);
            tracing::debug!(section = ?self.section, state = ?self.state, "guard checked");
            return &self.state;
        }

        let session = self.api.session().snapshot();
        match session.role() {
            Some(role) if permitted.contains(&role) => self.set_state(GuardState::Authorized),
            Some(role) => {
                tracing::warn!(section = ?self.section, %role, "role not permitted for section");
                if let Err(e) = self.api.session().clear_auth() {
                    tracing::warn!(error = %e, "clearing persisted tokens failed");
                }
                self.redirect(login);
            }
            None => self.redirect(login),
        }
        tracing::debug!(section = ?self.section, state = ?self.state, "guard checked");
        &self.state
    }

    fn redirect(&mut self, target: &str) {
        self.api.navigator().navigate(target);
        self.set_state(GuardState::Redirecting { target: target.to_owned() });
    }

    fn set_state(&mut self, next: GuardState) {
        self.transitions.send_replace(next.clone());
        self.state = next;
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
