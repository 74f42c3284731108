mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use common::TestApp;
use surplusyard_api::entities::material;
use surplusyard_api::errors::ServiceError;
use surplusyard_api::services::edit_lock::{MaterialPatch, EDIT_LOCK_TIMEOUT_MINUTES};

/// Rewrites the lock timestamp so a held lock looks `minutes` old.
async fn backdate_lock(app: &TestApp, material_id: Uuid, minutes: i64) {
    let material = app.find_material(material_id).await.unwrap();
    let mut active: material::ActiveModel = material.into();
    active.edit_started_at = Set(Some(Utc::now() - Duration::minutes(minutes)));
    active.update(&*app.db).await.expect("backdate lock");
}

#[tokio::test]
async fn lock_is_mutually_exclusive_while_fresh() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let material = app.seed_material(seller, None, "Cement", 10, dec!(350)).await;

    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();

    let status = app
        .services
        .edit_lock
        .acquire(material.id, user_a)
        .await
        .expect("first acquire");
    assert!(status.locked);
    assert_eq!(status.edited_by, Some(user_a));

    let result = app.services.edit_lock.acquire(material.id, user_b).await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn holder_may_reacquire_its_own_lock() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let material = app.seed_material(seller, None, "Cement", 10, dec!(350)).await;
    let user = Uuid::new_v4();

    app.services
        .edit_lock
        .acquire(material.id, user)
        .await
        .expect("first acquire");
    app.services
        .edit_lock
        .acquire(material.id, user)
        .await
        .expect("re-acquire by the same user");
}

#[tokio::test]
async fn stale_lock_is_overridden_after_the_timeout() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let material = app.seed_material(seller, None, "Cement", 10, dec!(350)).await;

    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();

    app.services
        .edit_lock
        .acquire(material.id, user_a)
        .await
        .expect("acquire");
    backdate_lock(&app, material.id, EDIT_LOCK_TIMEOUT_MINUTES + 1).await;

    let status = app
        .services
        .edit_lock
        .acquire(material.id, user_b)
        .await
        .expect("stale lock is taken over");
    assert_eq!(status.edited_by, Some(user_b));
}

#[tokio::test]
async fn unlock_by_a_non_holder_is_a_no_op_success() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let material = app.seed_material(seller, None, "Cement", 10, dec!(350)).await;

    let holder = Uuid::new_v4();
    let other = Uuid::new_v4();

    app.services
        .edit_lock
        .acquire(material.id, holder)
        .await
        .expect("acquire");

    app.services
        .edit_lock
        .release(material.id, other)
        .await
        .expect("release by non-holder succeeds");

    // The real holder keeps the lock.
    let status = app.services.edit_lock.check(material.id).await.unwrap();
    assert!(status.locked);
    assert_eq!(status.edited_by, Some(holder));
}

#[tokio::test]
async fn release_by_the_holder_clears_the_lock() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let material = app.seed_material(seller, None, "Cement", 10, dec!(350)).await;
    let holder = Uuid::new_v4();

    app.services
        .edit_lock
        .acquire(material.id, holder)
        .await
        .expect("acquire");
    app.services
        .edit_lock
        .release(material.id, holder)
        .await
        .expect("release");

    let status = app.services.edit_lock.check(material.id).await.unwrap();
    assert!(!status.locked);
    assert!(!status.timed_out);
}

#[tokio::test]
async fn check_clears_an_expired_lock_and_reports_the_timeout() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let material = app.seed_material(seller, None, "Cement", 10, dec!(350)).await;

    app.services
        .edit_lock
        .acquire(material.id, Uuid::new_v4())
        .await
        .expect("acquire");
    backdate_lock(&app, material.id, EDIT_LOCK_TIMEOUT_MINUTES + 2).await;

    let status = app.services.edit_lock.check(material.id).await.unwrap();
    assert!(!status.locked);
    assert!(status.timed_out);

    // The clear is persisted, not just reported.
    let after = app.find_material(material.id).await.unwrap();
    assert!(!after.is_being_edited);
    assert!(after.edited_by.is_none());
    assert!(after.edit_started_at.is_none());
}

#[tokio::test]
async fn edit_with_lock_rejects_a_live_foreign_lock() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let material = app.seed_material(seller, None, "Cement", 10, dec!(350)).await;

    let holder = Uuid::new_v4();
    app.services
        .edit_lock
        .acquire(material.id, holder)
        .await
        .expect("acquire");

    let result = app
        .services
        .edit_lock
        .edit_with_lock(
            material.id,
            Uuid::new_v4(),
            MaterialPatch {
                quantity: Some(99),
                ..Default::default()
            },
        )
        .await;

    assert_matches!(result, Err(ServiceError::Conflict(_)));

    let after = app.find_material(material.id).await.unwrap();
    assert_eq!(after.quantity, 10);
}

#[tokio::test]
async fn successful_edit_applies_the_patch_and_releases_the_lock() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let material = app.seed_material(seller, None, "Cement", 10, dec!(350)).await;
    let holder = Uuid::new_v4();

    app.services
        .edit_lock
        .acquire(material.id, holder)
        .await
        .expect("acquire");

    let updated = app
        .services
        .edit_lock
        .edit_with_lock(
            material.id,
            holder,
            MaterialPatch {
                quantity: Some(8),
                price_today: Some(dec!(400)),
                brand: Some("UltraMix".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("edit");

    assert_eq!(updated.quantity, 8);
    assert_eq!(updated.price_today, dec!(400));
    assert_eq!(updated.brand.as_deref(), Some("UltraMix"));
    // Value follows the edited price and quantity.
    assert_eq!(updated.inventory_value, dec!(3200));
    // Edit releases the lock in the same write.
    assert!(!updated.is_being_edited);
    assert!(updated.edited_by.is_none());

    let status = app.services.edit_lock.check(material.id).await.unwrap();
    assert!(!status.locked);
}

#[tokio::test]
async fn lock_operations_on_a_missing_material_are_not_found() {
    let app = TestApp::new().await;

    let acquire = app
        .services
        .edit_lock
        .acquire(Uuid::new_v4(), Uuid::new_v4())
        .await;
    assert_matches!(acquire, Err(ServiceError::NotFound(_)));

    let check = app.services.edit_lock.check(Uuid::new_v4()).await;
    assert_matches!(check, Err(ServiceError::NotFound(_)));

    let edit = app
        .services
        .edit_lock
        .edit_with_lock(Uuid::new_v4(), Uuid::new_v4(), MaterialPatch::default())
        .await;
    assert_matches!(edit, Err(ServiceError::NotFound(_)));
}
