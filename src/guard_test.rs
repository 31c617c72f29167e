use super::*;
use crate::api::types::Method;
use crate::test_helpers::{self, MockTransport, is_call, json_response};

fn offline() -> std::sync::Arc<MockTransport> {
    MockTransport::new(|_| json_response(503, &serde_json::json!({})))
}

/// `/auth/me` answers with `user` for bearer `tok1`.
fn me_api(user: &crate::api::types::User) -> std::sync::Arc<MockTransport> {
    let body = test_helpers::user_json(user);
    MockTransport::new(move |req| {
        if is_call(req, Method::Get, "/auth/me") && req.bearer.as_deref() == Some("tok1") {
            json_response(200, &body)
        } else {
            json_response(401, &serde_json::json!({}))
        }
    })
}

// =============================================================================
// Section
// =============================================================================

#[test]
fn section_for_path_matches_prefix_segments() {
    assert_eq!(Section::for_path("/super-admin"), Some(Section::SuperAdmin));
    assert_eq!(Section::for_path("/tenant-admin/pricing"), Some(Section::TenantAdmin));
    assert_eq!(Section::for_path("/tenant-staff/bookings/42"), Some(Section::TenantStaff));
    assert_eq!(Section::for_path("/passenger"), Some(Section::Passenger));
    assert_eq!(Section::for_path("/passengers"), None);
    assert_eq!(Section::for_path("/login"), None);
}

#[test]
fn tenant_staff_section_admits_tenant_admin() {
    assert!(Section::TenantStaff.permitted_roles().contains(&Role::TenantAdmin));
    assert!(!Section::TenantAdmin.permitted_roles().contains(&Role::TenantStaff));
}

#[test]
fn super_admin_has_own_login() {
    assert_eq!(Section::SuperAdmin.login_path(), SUPER_ADMIN_LOGIN_PATH);
    assert_eq!(Section::Passenger.login_path(), LOGIN_PATH);
    assert!(!Section::SuperAdmin.restores_persisted_session());
    assert!(Section::Passenger.restores_persisted_session());
}

// =============================================================================
// strict sections
// =============================================================================

#[tokio::test]
async fn unauthenticated_visitor_redirected() {
    let h = test_helpers::harness(offline());
    let mut guard = RouteGuard::new(Section::SuperAdmin, h.client.clone());
    assert_eq!(guard.state(), &GuardState::Unchecked);

    let state = guard.check().await.clone();

    assert_eq!(state, GuardState::Redirecting { target: SUPER_ADMIN_LOGIN_PATH.to_owned() });
    assert_eq!(h.navigator.history(), vec![SUPER_ADMIN_LOGIN_PATH.to_owned()]);
}

#[tokio::test]
async fn permitted_role_authorized() {
    let transport = offline();
    let h = test_helpers::harness(transport.clone());
    h.session
        .set_auth(test_helpers::user(Role::SuperAdmin), "tok1", "rtok1")
        .unwrap();
    let mut guard = RouteGuard::new(Section::SuperAdmin, h.client.clone());

    assert_eq!(guard.check().await, &GuardState::Authorized);
    assert!(guard.state().is_terminal());
    assert!(h.navigator.history().is_empty());
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn wrong_role_clears_session_and_redirects() {
    let h = test_helpers::harness(offline());
    h.session
        .set_auth(test_helpers::user(Role::TenantAdmin), "tok1", "rtok1")
        .unwrap();
    let mut guard = RouteGuard::new(Section::SuperAdmin, h.client.clone());

    assert!(matches!(guard.check().await, GuardState::Redirecting { .. }));
    assert!(!h.session.is_authenticated());
    assert_eq!(h.session.tokens().load().unwrap(), None);
}

#[tokio::test]
async fn repeated_checks_redirect_once() {
    let h = test_helpers::harness(offline());
    let mut guard = RouteGuard::new(Section::SuperAdmin, h.client.clone());

    guard.check().await;
    guard.check().await;
    guard.check().await;

    assert_eq!(h.navigator.history().len(), 1);
}

#[tokio::test]
async fn authorized_guard_redirects_after_logout() {
    let h = test_helpers::harness(offline());
    h.session
        .set_auth(test_helpers::user(Role::SuperAdmin), "tok1", "rtok1")
        .unwrap();
    let mut guard = RouteGuard::new(Section::SuperAdmin, h.client.clone());
    assert_eq!(guard.check().await, &GuardState::Authorized);

    h.session.clear_auth().unwrap();
    guard.check().await;
    guard.check().await;

    assert!(matches!(guard.state(), GuardState::Redirecting { .. }));
    assert_eq!(h.navigator.history().len(), 1);
}

// =============================================================================
// restoring sections
// =============================================================================

#[tokio::test]
async fn passenger_in_tenant_admin_section_redirected() {
    let passenger = test_helpers::user(Role::Passenger);
    let h = test_helpers::harness(me_api(&passenger));
    h.session.set_auth(passenger, "tok1", "rtok1").unwrap();
    let mut guard = RouteGuard::new(Section::TenantAdmin, h.client.clone());

    let state = guard.check().await.clone();

    assert_eq!(state, GuardState::Redirecting { target: LOGIN_PATH.to_owned() });
    assert_eq!(h.navigator.history(), vec![LOGIN_PATH.to_owned()]);
    assert!(!h.session.is_authenticated());
}

#[tokio::test]
async fn fresh_load_restores_from_persisted_token() {
    let admin = test_helpers::user(Role::TenantAdmin);
    let transport = me_api(&admin);
    let h = test_helpers::harness(transport.clone());
    h.session
        .tokens()
        .save(&crate::storage::TokenPair::new("tok1", "rtok1"))
        .unwrap();
    let mut guard = RouteGuard::new(Section::TenantStaff, h.client.clone());

    assert_eq!(guard.check().await, &GuardState::Authorized);
    assert_eq!(h.session.current_user(), Some(admin));
    assert_eq!(transport.calls_to("/auth/me"), 1);

    // Second entry trusts the in-memory session.
    assert_eq!(guard.check().await, &GuardState::Authorized);
    assert_eq!(transport.calls_to("/auth/me"), 1);
}

#[tokio::test]
async fn fresh_load_without_tokens_redirects() {
    let transport = offline();
    let h = test_helpers::harness(transport.clone());
    let mut guard = RouteGuard::new(Section::Passenger, h.client.clone());

    assert_eq!(guard.check().await, &GuardState::Redirecting { target: LOGIN_PATH.to_owned() });
    assert!(transport.requests().is_empty());
    assert_eq!(h.navigator.history().len(), 1);
}

#[tokio::test]
async fn restoring_redirect_is_sticky() {
    let h = test_helpers::harness(offline());
    let mut guard = RouteGuard::new(Section::Passenger, h.client.clone());

    guard.check().await;
    guard.check().await;

    assert_eq!(h.navigator.history().len(), 1);
}

#[tokio::test]
async fn checking_is_observable_while_restoring() {
    let passenger = test_helpers::user(Role::Passenger);
    let transport = me_api(&passenger);
    let gate = transport.hold("/auth/me");
    let h = test_helpers::harness(transport.clone());
    h.session
        .tokens()
        .save(&crate::storage::TokenPair::new("tok1", "rtok1"))
        .unwrap();
    let mut guard = RouteGuard::new(Section::Passenger, h.client.clone());
    let mut transitions = guard.subscribe();

    let observer = async {
        transitions.changed().await.unwrap();
        let seen = transitions.borrow_and_update().clone();
        gate.notify_one();
        seen
    };
    let (state, seen) = tokio::join!(async { guard.check().await.clone() }, observer);

    assert_eq!(seen, GuardState::Checking);
    assert_eq!(state, GuardState::Authorized);
    assert_eq!(*transitions.borrow(), GuardState::Authorized);
}
