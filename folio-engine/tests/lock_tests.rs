mod common;

use chrono::{Duration, Utc};
use common::{posts, t0};
use folio_engine::{arbitrate, LockArbiter, LockDecision};
use folio_model::{EditLock, LockWhenEditing};
use folio_storage::{SqliteStorage, Storage};
use folio_types::{DocumentId, FixedClock, UserId};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

fn lock_by(user: i64, acquired_at: chrono::DateTime<Utc>) -> EditLock {
    EditLock::new("posts", 1.into(), Some(UserId::from(user)), acquired_at)
}

// ── Arbitration table ────────────────────────────────────────────

#[test]
fn no_lock_proceeds() {
    let policy = LockWhenEditing::default();
    assert_eq!(
        arbitrate(None, Some(&UserId::from(9)), &policy, t0()),
        LockDecision::Proceed
    );
}

#[test]
fn live_lock_by_other_is_denied() {
    let policy = LockWhenEditing::default();
    let lock = lock_by(7, t0());
    assert_eq!(
        arbitrate(Some(&lock), Some(&UserId::from(9)), &policy, t0()),
        LockDecision::Denied {
            holder: Some(UserId::from(7)),
            acquired_at: t0(),
        }
    );
}

#[test]
fn own_lock_proceeds_and_releases() {
    let policy = LockWhenEditing::default();
    let lock = lock_by(7, t0());
    let decision = arbitrate(Some(&lock), Some(&UserId::from(7)), &policy, t0());
    assert_eq!(decision, LockDecision::ProceedAndRelease);
    assert!(decision.releases());
}

#[test]
fn lock_at_exact_duration_is_still_live() {
    let policy = LockWhenEditing::with_duration(300);
    let lock = lock_by(7, t0() - Duration::seconds(300));
    assert!(arbitrate(Some(&lock), Some(&UserId::from(9)), &policy, t0()).is_denied());
}

#[test]
fn expired_lock_is_reclaimed() {
    let policy = LockWhenEditing::with_duration(300);
    let lock = lock_by(7, t0() - Duration::seconds(301));
    assert_eq!(
        arbitrate(Some(&lock), Some(&UserId::from(9)), &policy, t0()),
        LockDecision::ProceedAndRelease
    );
}

#[test]
fn anonymous_requester_never_holds_a_lock() {
    let policy = LockWhenEditing::default();
    let orphaned = EditLock::new("posts", 1.into(), None, t0());
    assert!(arbitrate(Some(&orphaned), None, &policy, t0()).is_denied());
}

#[test]
fn disabled_locking_always_proceeds() {
    let policy = LockWhenEditing::disabled();
    let lock = lock_by(7, t0());
    assert_eq!(
        arbitrate(Some(&lock), Some(&UserId::from(9)), &policy, t0()),
        LockDecision::Proceed
    );
}

// =============================================================================
// ARBITRATION LAWS
// =============================================================================

fn user_strategy() -> impl Strategy<Value = Option<UserId>> {
    prop::option::of((1i64..50).prop_map(UserId::from))
}

proptest! {
    #[test]
    fn without_a_record_every_requester_proceeds(user in user_strategy(), secs in 1u64..10_000) {
        let policy = LockWhenEditing::with_duration(secs);
        prop_assert_eq!(arbitrate(None, user.as_ref(), &policy, t0()), LockDecision::Proceed);
    }

    #[test]
    fn fresh_locks_deny_others_and_release_for_the_holder(
        holder in 1i64..50,
        other in 50i64..100,
        secs in 1u64..10_000,
        age in 0i64..10_000,
    ) {
        let secs_i = i64::try_from(secs).unwrap();
        prop_assume!(age <= secs_i);
        let policy = LockWhenEditing::with_duration(secs);
        let lock = lock_by(holder, t0() - Duration::seconds(age));
        prop_assert!(arbitrate(Some(&lock), Some(&UserId::from(other)), &policy, t0()).is_denied());
        prop_assert_eq!(
            arbitrate(Some(&lock), Some(&UserId::from(holder)), &policy, t0()),
            LockDecision::ProceedAndRelease
        );
    }

    #[test]
    fn expired_locks_release_for_anyone(
        user in user_strategy(),
        secs in 1u64..10_000,
        overdue in 1i64..10_000,
    ) {
        let secs_i = i64::try_from(secs).unwrap();
        let policy = LockWhenEditing::with_duration(secs);
        let lock = lock_by(7, t0() - Duration::seconds(secs_i + overdue));
        prop_assert_eq!(
            arbitrate(Some(&lock), user.as_ref(), &policy, t0()),
            LockDecision::ProceedAndRelease
        );
    }
}

// ── LockArbiter against storage ──────────────────────────────────

fn arbiter_with(store: Arc<SqliteStorage>) -> LockArbiter {
    LockArbiter::new(store, Arc::new(FixedClock::new(t0())))
}

#[tokio::test]
async fn arbiter_reads_stored_lock() {
    let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
    store.save_lock(&lock_by(7, t0())).await.unwrap();
    let arbiter = arbiter_with(store.clone());
    let id = DocumentId::from(1);

    let denied = arbiter
        .check_and_acquire(None, &posts(), &id, Some(&UserId::from(9)))
        .await
        .unwrap();
    assert!(denied.is_denied());

    let own = arbiter
        .check_and_acquire(None, &posts(), &id, Some(&UserId::from(7)))
        .await
        .unwrap();
    assert_eq!(own, LockDecision::ProceedAndRelease);
}

#[tokio::test]
async fn arbiter_ignores_records_when_disabled() {
    let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
    store.save_lock(&lock_by(7, t0())).await.unwrap();
    let arbiter = arbiter_with(store);
    let schema = posts().with_lock(LockWhenEditing::disabled());

    let decision = arbiter
        .check_and_acquire(None, &schema, &1.into(), Some(&UserId::from(9)))
        .await
        .unwrap();
    assert_eq!(decision, LockDecision::Proceed);
}

#[tokio::test]
async fn release_deletes_the_record() {
    let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
    store.save_lock(&lock_by(7, t0())).await.unwrap();
    let arbiter = arbiter_with(store.clone());

    arbiter.release(None, "posts", &1.into()).await.unwrap();
    assert!(store.find_lock(None, "posts", &1.into()).await.unwrap().is_none());
}
