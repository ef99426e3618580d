//! End-to-end moderation flows
//!
//! These tests run the engine against the in-process registry and user
//! directory and check the visible action set before and after each step.

mod common;

use common::{admin, admin_session, alice, carol, platform, root, HOST};
use fedi_moderation::moderation::{
    compute_actions, Account, BlockRegistry, Confirmation, Dispatch, ModerationAction,
    ModerationError, ModerationEvent, ModerationTarget, Pagination, Session, Sort, SortOrder,
    UserRight,
};

fn remote_account() -> Account {
    Account::remote(50, "mallory", "example.org")
}

// =============================================================================
// Visibility
// =============================================================================

#[tokio::test]
async fn test_no_actions_on_self_or_when_anonymous() {
    let p = platform().await;

    let me = ModerationTarget::for_user(admin());
    assert!(p.engine.available_actions(&admin_session(), &me).is_empty());

    for target in [
        ModerationTarget::for_user(alice()),
        ModerationTarget::for_account(remote_account()),
    ] {
        assert!(p.engine.available_actions(&Session::anonymous(), &target).is_empty());
    }
}

#[tokio::test]
async fn test_manager_sees_user_actions() {
    let p = platform().await;
    let session = Session::authenticated(carol().with_right(UserRight::ManageUsers));
    let actions = p.engine.available_actions(&session, &ModerationTarget::for_user(alice()));

    assert!(actions.contains(ModerationAction::EditUser));
    assert!(actions.contains(ModerationAction::DeleteUser));
    assert!(actions.contains(ModerationAction::BanUser));
    assert!(!actions.contains(ModerationAction::UnbanUser));
}

#[tokio::test]
async fn test_local_account_has_no_server_actions() {
    let p = platform().await;
    let mut target = ModerationTarget::for_user(alice());

    for server_blocked in [false, true] {
        target.account.server_blocked = server_blocked;
        let actions = p.engine.available_actions(&admin_session(), &target);
        assert!(!actions.contains(ModerationAction::BlockServer));
        assert!(!actions.contains(ModerationAction::UnblockServer));
    }
}

// =============================================================================
// Block transitions
// =============================================================================

#[tokio::test]
async fn test_block_round_trip_restores_state() {
    let p = platform().await;
    let session = admin_session();
    let mut target = ModerationTarget::for_account(remote_account());
    let original = target.account.blocked;

    p.engine.block_account(&session, &mut target).await.unwrap();
    let actions = compute_actions(&session, None, &target.account);
    assert!(actions.contains(ModerationAction::UnblockAccount));
    assert!(!actions.contains(ModerationAction::BlockAccount));

    p.engine.unblock_account(&session, &mut target).await.unwrap();
    let actions = compute_actions(&session, None, &target.account);
    assert!(actions.contains(ModerationAction::BlockAccount));
    assert!(!actions.contains(ModerationAction::UnblockAccount));

    assert_eq!(target.account.blocked, original);
    assert!(!p.registry.is_account_blocked(&admin().account, &target.account).await.unwrap());
    let page = p
        .registry
        .list_account_blocks(&admin().account, &Pagination::default(), &Sort::new("createdAt", SortOrder::Descending))
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_unblock_unblocked_server_is_not_found() {
    let p = platform().await;
    let mut target = ModerationTarget::for_account(remote_account());

    let err = p.engine.unblock_server(&admin_session(), &mut target).await.unwrap_err();

    assert!(matches!(err, ModerationError::NotFound(_)));
    assert!(!target.account.server_blocked);
    assert_eq!(p.registry.request_count(), 0);
}

#[tokio::test]
async fn test_server_block_visible_after_refresh() {
    let p = platform().await;
    let session = admin_session();
    let mut first = ModerationTarget::for_account(remote_account());
    p.engine.block_server(&session, &mut first).await.unwrap();

    // Another account from the same host, loaded before the block
    let mut second = ModerationTarget::for_account(Account::remote(51, "trent", "example.org"));
    p.engine.refresh(&session, &mut second).await.unwrap();

    assert!(second.account.server_blocked);
    assert!(p
        .engine
        .available_actions(&session, &second)
        .contains(ModerationAction::UnblockServer));
}

#[tokio::test]
async fn test_events_follow_acknowledged_changes() {
    let p = platform().await;
    let mut events = p.engine.subscribe();
    let mut target = ModerationTarget::for_account(remote_account());

    p.engine.block_account(&admin_session(), &mut target).await.unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        ModerationEvent::UserChanged { name_with_host: "mallory@example.org".to_string() }
    );
}

// =============================================================================
// Protected principal
// =============================================================================

#[tokio::test]
async fn test_root_cannot_be_removed_or_banned() {
    let p = platform().await;
    let target = ModerationTarget::for_user(root());

    let err = p
        .engine
        .remove_user(&admin_session(), &target, Confirmation::Confirmed)
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "You cannot delete root.");

    let err = p.engine.open_ban(&admin_session(), &target).unwrap_err();
    assert_eq!(err.user_message(), "You cannot ban root.");

    assert_eq!(p.users.request_count(), 0);
    assert!(p.users.get(root().id).await.is_some());
}

// =============================================================================
// User lifecycle
// =============================================================================

#[tokio::test]
async fn test_ban_then_remove_user() {
    let p = platform().await;
    let session = admin_session();
    let mut target = ModerationTarget::for_user(alice());

    let dispatch = p
        .engine
        .dispatch(&session, &mut target, ModerationAction::BanUser, Confirmation::Declined)
        .await
        .unwrap();
    let request = match dispatch {
        Dispatch::OpenBan(request) => request,
        other => panic!("expected the ban workflow, got {:?}", other),
    };

    p.engine
        .ban_user(&session, &mut target, request, Some("Spam".to_string()))
        .await
        .unwrap();
    assert!(p.users.get(alice().id).await.unwrap().blocked);

    let declined = p
        .engine
        .remove_user(&session, &target, Confirmation::Declined)
        .await
        .unwrap();
    assert!(declined.is_none());
    assert!(p.users.get(alice().id).await.is_some());

    let outcome = p
        .engine
        .remove_user(&session, &target, Confirmation::Confirmed)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.message, "User alice deleted.");
    assert!(p.users.get(alice().id).await.is_none());
}

#[tokio::test]
async fn test_regular_user_cannot_ban() {
    let p = platform().await;
    let session = Session::authenticated(carol());
    let target = ModerationTarget::for_user(alice());

    let err = p.engine.open_ban(&session, &target).unwrap_err();
    assert!(matches!(err, ModerationError::Forbidden(_)));
    assert_eq!(p.users.request_count(), 0);
}

#[tokio::test]
async fn test_regular_user_blocks_local_account() {
    let p = platform().await;
    let session = Session::authenticated(carol());
    let mut target = ModerationTarget::for_user(alice());

    let outcome = p.engine.block_account(&session, &mut target).await.unwrap();
    assert_eq!(outcome.message, format!("Account alice@{} blocked.", HOST));
    assert!(target.account.blocked);
}
