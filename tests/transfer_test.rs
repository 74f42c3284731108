mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::TestApp;
use surplusyard_api::entities::material::{AcquisitionType, ListingType};
use surplusyard_api::errors::ServiceError;
use surplusyard_api::services::transfer::TransferRequest;

fn transfer_request(
    user_id: Uuid,
    material_id: Uuid,
    from: Uuid,
    to: Uuid,
    quantity: i32,
) -> TransferRequest {
    TransferRequest {
        user_id,
        material_id,
        from_project_id: from,
        to_project_id: to,
        quantity_transferred: quantity,
        notes: Some("rebalancing stock".to_string()),
    }
}

#[tokio::test]
async fn transfer_creates_a_hidden_destination_material() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let site_a = app.seed_project(seller, "Site A").await;
    let site_b = app.seed_project(seller, "Site B").await;
    let source = app
        .seed_material(seller, Some(site_a.id), "Wash Basin", 10, dec!(100))
        .await;

    let receipt = app
        .services
        .transfer
        .transfer(transfer_request(seller, source.id, site_a.id, site_b.id, 4))
        .await
        .expect("transfer");

    // Source decremented in place.
    let source_after = app.find_material(source.id).await.unwrap();
    assert_eq!(source_after.quantity, 6);

    // Destination created with copied descriptive fields, hidden from the
    // marketplace until re-listed, and with its own listing code.
    let in_b = app.materials_in_project(site_b.id).await;
    assert_eq!(in_b.len(), 1);
    let destination = &in_b[0];
    assert_eq!(destination.material, "Wash Basin");
    assert_eq!(destination.quantity, 4);
    assert_eq!(destination.price_today, dec!(100));
    assert_eq!(destination.inventory_value, dec!(400));
    assert_eq!(destination.listing_type(), Some(ListingType::Acquired));
    assert_eq!(destination.acquisition_type(), Some(AcquisitionType::Acquired));
    assert_ne!(destination.listing_id, source.listing_id);

    // Quantity is conserved across the two projects.
    assert_eq!(source_after.quantity + destination.quantity, 10);

    // Side effects: transfer row, audit row, self-notification.
    let transfers = app.services.transfer.list_for_user(seller).await.unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].id, receipt.transfer_id);
    assert_eq!(transfers[0].quantity_transferred, 4);

    let history = app.history_for(seller).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, "internal_transfer");
    assert_eq!(history[0].from_project_id, Some(site_a.id));
    assert_eq!(history[0].to_project_id, Some(site_b.id));

    let notifications = app.notifications_for(seller).await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "Internal Transfer Completed");
    assert!(notifications[0].message.contains("Site A"));
    assert!(notifications[0].message.contains("Site B"));
}

#[tokio::test]
async fn full_transfer_deletes_the_source_record() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let site_a = app.seed_project(seller, "Site A").await;
    let site_b = app.seed_project(seller, "Site B").await;
    let source = app
        .seed_material(seller, Some(site_a.id), "Steel Beam", 5, dec!(1200))
        .await;

    app.services
        .transfer
        .transfer(transfer_request(seller, source.id, site_a.id, site_b.id, 5))
        .await
        .expect("transfer");

    // A fully transferred-out source is removed, not zeroed.
    assert!(app.find_material(source.id).await.is_none());

    let in_b = app.materials_in_project(site_b.id).await;
    assert_eq!(in_b.len(), 1);
    assert_eq!(in_b[0].quantity, 5);
}

#[tokio::test]
async fn transfer_merges_into_a_matching_destination_material() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let site_a = app.seed_project(seller, "Site A").await;
    let site_b = app.seed_project(seller, "Site B").await;
    let source = app
        .seed_material(seller, Some(site_a.id), "Wash Basin", 10, dec!(100))
        .await;
    // Same name, brand, and condition as the source: the transfer should
    // increment this record instead of creating a twin.
    let existing = app
        .seed_material(seller, Some(site_b.id), "Wash Basin", 2, dec!(100))
        .await;

    app.services
        .transfer
        .transfer(transfer_request(seller, source.id, site_a.id, site_b.id, 3))
        .await
        .expect("transfer");

    let in_b = app.materials_in_project(site_b.id).await;
    assert_eq!(in_b.len(), 1);
    assert_eq!(in_b[0].id, existing.id);
    assert_eq!(in_b[0].quantity, 5);

    let source_after = app.find_material(source.id).await.unwrap();
    assert_eq!(source_after.quantity, 7);
}

#[tokio::test]
async fn transfer_rejects_insufficient_stock_without_side_effects() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let site_a = app.seed_project(seller, "Site A").await;
    let site_b = app.seed_project(seller, "Site B").await;
    let source = app
        .seed_material(seller, Some(site_a.id), "Pipes", 3, dec!(60))
        .await;

    let result = app
        .services
        .transfer
        .transfer(transfer_request(seller, source.id, site_a.id, site_b.id, 4))
        .await;

    assert_matches!(result, Err(ServiceError::InsufficientStock(_)));

    // Nothing moved, nothing recorded.
    let source_after = app.find_material(source.id).await.unwrap();
    assert_eq!(source_after.quantity, 3);
    assert!(app.materials_in_project(site_b.id).await.is_empty());
    assert!(app.services.transfer.list_for_user(seller).await.unwrap().is_empty());
    assert!(app.history_for(seller).await.is_empty());
}

#[tokio::test]
async fn transfer_of_someone_elses_material_is_not_found() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let intruder = Uuid::new_v4();
    let site_a = app.seed_project(seller, "Site A").await;
    let site_b = app.seed_project(seller, "Site B").await;
    let source = app
        .seed_material(seller, Some(site_a.id), "Pipes", 10, dec!(60))
        .await;

    let result = app
        .services
        .transfer
        .transfer(transfer_request(intruder, source.id, site_a.id, site_b.id, 2))
        .await;

    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn transferred_in_stock_is_hidden_from_the_marketplace() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let site_a = app.seed_project(seller, "Site A").await;
    let site_b = app.seed_project(seller, "Site B").await;
    let source = app
        .seed_material(seller, Some(site_a.id), "Wash Basin", 10, dec!(100))
        .await;

    app.services
        .transfer
        .transfer(transfer_request(seller, source.id, site_a.id, site_b.id, 4))
        .await
        .expect("transfer");

    let (listings, total) = app
        .services
        .materials
        .list_marketplace(1, 50)
        .await
        .expect("marketplace query");

    // Only the still-listed source shows; the acquired destination does not.
    assert_eq!(total, 1);
    assert_eq!(listings[0].id, source.id);
}
