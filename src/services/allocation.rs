//! Order-request fulfillment engine.
//!
//! Resolves batches of pending buyer requests against seller inventory,
//! first come first served. Each batch is one database transaction: request
//! status updates, order creation, stock decrement, audit rows, and buyer
//! notifications all commit together or not at all.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::material::{self, Entity as MaterialEntity, ListingType};
use crate::entities::notification::NotificationKind;
use crate::entities::order::{self, OrderStatus};
use crate::entities::order_request::{self, Entity as OrderRequestEntity, RequestStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{history, notifications};

/// Platform cut taken on every fulfilled order.
const PLATFORM_FEE_RATE: Decimal = dec!(0.05);

const OUT_OF_STOCK_NOTE: &str = "Out of stock - no quantity available";

/// Outcome for a single request within a batch approval.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub request_id: Uuid,
    pub order_id: Option<Uuid>,
    pub status: RequestStatus,
    pub fulfilled_quantity: i32,
    pub requested_quantity: i32,
    pub is_partial: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalSummary {
    pub outcomes: Vec<ApprovalOutcome>,
    pub total_processed: usize,
    pub total_approved: usize,
}

/// Service resolving pending order requests into orders and declines.
#[derive(Clone)]
pub struct AllocationService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

/// Walks requested quantities in FCFS order against the available stock.
/// Returns the fulfilled quantity per request and the stock left over.
fn plan_fulfillments(available: i32, requested: &[i32]) -> (Vec<i32>, i32) {
    let mut remaining = available.max(0);
    let mut fulfilled = Vec::with_capacity(requested.len());

    for &wanted in requested {
        let take = remaining.min(wanted.max(0));
        fulfilled.push(take);
        remaining -= take;
    }

    (fulfilled, remaining)
}

/// Order total for a (possibly partial) fulfillment, proportional to the
/// fulfilled share of the originating request.
fn proportional_total(fulfilled: i32, requested: i32, original_total: Decimal) -> Decimal {
    let ratio = Decimal::from(fulfilled) / Decimal::from(requested);
    (ratio * original_total).round_dp(2)
}

fn platform_fee(total: Decimal) -> Decimal {
    (total * PLATFORM_FEE_RATE).round_dp(2)
}

impl AllocationService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Approves a batch of pending requests with FCFS semantics.
    ///
    /// Requests are grouped by material; within a group, earlier
    /// `created_at` wins. A request whose material has run out inside the
    /// batch is declined, not left pending. The whole batch commits
    /// atomically; concurrent interference with any touched material's
    /// quantity aborts everything with `Conflict`.
    #[instrument(skip(self, seller_notes), fields(requests = request_ids.len()))]
    pub async fn approve_requests(
        &self,
        request_ids: &[Uuid],
        seller_notes: Option<&str>,
    ) -> Result<ApprovalSummary, ServiceError> {
        if request_ids.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one request id is required".to_string(),
            ));
        }

        let notes = seller_notes.unwrap_or("").trim().to_string();
        let now = chrono::Utc::now();

        let txn = self.db.begin().await?;

        // FCFS: earliest request first, id as the stable tiebreak.
        let requests = OrderRequestEntity::find()
            .filter(order_request::Column::Id.is_in(request_ids.iter().copied()))
            .order_by_asc(order_request::Column::CreatedAt)
            .order_by_asc(order_request::Column::Id)
            .all(&txn)
            .await?;

        if requests.is_empty() {
            return Err(ServiceError::NotFound("No order requests found".to_string()));
        }

        for request in &requests {
            if request.status() != Some(RequestStatus::Pending) {
                return Err(ServiceError::ValidationError(format!(
                    "Order request {} is not pending (status: {})",
                    request.id, request.status
                )));
            }
        }

        // Group by material, preserving the FCFS order within each group.
        let mut groups: Vec<(Uuid, Vec<order_request::Model>)> = Vec::new();
        for request in requests {
            match groups.iter_mut().find(|(id, _)| *id == request.material_id) {
                Some((_, group)) => group.push(request),
                None => groups.push((request.material_id, vec![request])),
            }
        }

        let mut outcomes = Vec::new();
        let mut total_approved = 0usize;
        let mut events = Vec::new();

        for (material_id, group) in groups {
            let material = MaterialEntity::find_by_id(material_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Material {} not found", material_id))
                })?;

            let snapshot_quantity = material.quantity;
            let wanted: Vec<i32> = group.iter().map(|r| r.quantity).collect();
            let (fulfillments, remaining) = plan_fulfillments(snapshot_quantity, &wanted);

            for (request, fulfilled) in group.iter().zip(fulfillments) {
                if fulfilled == 0 {
                    self.decline_in_batch(&txn, request).await?;
                    events.push(Event::RequestDeclined(request.id));
                    outcomes.push(ApprovalOutcome {
                        request_id: request.id,
                        order_id: None,
                        status: RequestStatus::Declined,
                        fulfilled_quantity: 0,
                        requested_quantity: request.quantity,
                        is_partial: false,
                    });
                } else {
                    let outcome = self
                        .fulfill_in_batch(&txn, request, &material, fulfilled, &notes, now)
                        .await?;
                    events.push(Event::OrderCreated {
                        order_id: outcome.order_id.unwrap_or_default(),
                        request_id: request.id,
                        partial: outcome.is_partial,
                    });
                    total_approved += 1;
                    outcomes.push(outcome);
                }
            }

            if remaining != snapshot_quantity {
                // Guarded write: a concurrent batch that already spent this
                // stock makes the filter miss, and the whole batch aborts.
                let mut update = MaterialEntity::update_many()
                    .col_expr(material::Column::Quantity, Expr::value(remaining))
                    .col_expr(material::Column::UpdatedAt, Expr::value(now));

                if remaining == 0 {
                    update = update.col_expr(
                        material::Column::ListingType,
                        Expr::value(ListingType::Sold.as_str()),
                    );
                    events.push(Event::MaterialSoldOut(material_id));
                }

                let result = update
                    .filter(material::Column::Id.eq(material_id))
                    .filter(material::Column::Quantity.eq(snapshot_quantity))
                    .exec(&txn)
                    .await?;

                if result.rows_affected == 0 {
                    return Err(ServiceError::Conflict(format!(
                        "Material {} was modified concurrently",
                        material_id
                    )));
                }
            }
        }

        txn.commit().await?;

        let total_processed = outcomes.len();
        info!(
            total_processed,
            total_approved, "Processed order request batch"
        );

        self.emit_all(events).await;

        Ok(ApprovalSummary {
            outcomes,
            total_processed,
            total_approved,
        })
    }

    /// Single-request approval: the degenerate case of the batch algorithm.
    #[instrument(skip(self, seller_notes))]
    pub async fn approve_request(
        &self,
        request_id: Uuid,
        seller_notes: Option<&str>,
    ) -> Result<ApprovalSummary, ServiceError> {
        self.approve_requests(&[request_id], seller_notes).await
    }

    /// Declines a single pending request. Status-only: no inventory or
    /// order side effects, just the transition and a buyer notification.
    #[instrument(skip(self, seller_notes))]
    pub async fn decline_request(
        &self,
        request_id: Uuid,
        seller_notes: Option<&str>,
    ) -> Result<order_request::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let request = OrderRequestEntity::find_by_id(request_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order request not found".to_string()))?;

        if request.status() != Some(RequestStatus::Pending) {
            return Err(ServiceError::InvalidOperation(format!(
                "Order request {} is already {}",
                request.id, request.status
            )));
        }

        let reason = seller_notes
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let message = format!(
            "Your order request for {} units has been declined by the seller. Reason: {}",
            request.quantity,
            reason.as_deref().unwrap_or("No reason provided")
        );

        let buyer_id = request.buyer_id;
        let mut active: order_request::ActiveModel = request.into();
        active.status = Set(RequestStatus::Declined.as_str().to_string());
        active.seller_notes = Set(reason);
        let updated = active.update(&txn).await?;

        if let Err(e) = notifications::record(
            &txn,
            buyer_id,
            NotificationKind::OrderDeclined,
            "Order Request Declined",
            &message,
            Some(request_id),
            None,
        )
        .await
        {
            warn!(error = %e, request_id = %request_id, "Failed to create decline notification");
        }

        txn.commit().await?;

        info!(request_id = %request_id, "Order request declined");
        self.emit_all(vec![Event::RequestDeclined(request_id)]).await;

        Ok(updated)
    }

    /// Marks a request declined because stock ran out earlier in the batch.
    async fn decline_in_batch(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        request: &order_request::Model,
    ) -> Result<(), ServiceError> {
        let mut active: order_request::ActiveModel = request.clone().into();
        active.status = Set(RequestStatus::Declined.as_str().to_string());
        active.seller_notes = Set(Some(OUT_OF_STOCK_NOTE.to_string()));
        active.update(txn).await?;
        Ok(())
    }

    /// Applies a full or partial fulfillment: request transition, order
    /// creation, audit row, and buyer notification.
    async fn fulfill_in_batch(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        request: &order_request::Model,
        material: &material::Model,
        fulfilled: i32,
        seller_notes: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<ApprovalOutcome, ServiceError> {
        let is_partial = fulfilled < request.quantity;
        let status = if is_partial {
            RequestStatus::PartiallyApproved
        } else {
            RequestStatus::Approved
        };
        let request_notes = if is_partial {
            format!(
                "{} [Partial: {}/{} units fulfilled]",
                seller_notes, fulfilled, request.quantity
            )
            .trim()
            .to_string()
        } else {
            seller_notes.to_string()
        };

        let mut active: order_request::ActiveModel = request.clone().into();
        active.status = Set(status.as_str().to_string());
        active.fulfilled_quantity = Set(Some(fulfilled));
        active.approved_at = Set(Some(now));
        active.seller_notes = Set(Some(request_notes).filter(|s| !s.is_empty()));
        active.update(txn).await?;

        let order_id = Uuid::new_v4();
        let total_amount = proportional_total(fulfilled, request.quantity, request.total_amount);
        let fee = platform_fee(total_amount);

        let order = order::ActiveModel {
            id: Set(order_id),
            order_request_id: Set(request.id),
            buyer_id: Set(request.buyer_id),
            seller_id: Set(request.seller_id),
            material_id: Set(request.material_id),
            quantity: Set(fulfilled),
            unit_price: Set(request.unit_price),
            total_amount: Set(total_amount),
            platform_fee: Set(fee),
            status: Set(OrderStatus::Confirmed.as_str().to_string()),
            shipping_address: Set(request.delivery_address.clone()),
            delivery_notes: Set(request.delivery_notes.clone()),
            ..Default::default()
        };
        order.insert(txn).await?;

        history::record_sale(
            txn,
            history::SaleRecord {
                seller_id: request.seller_id,
                material_id: request.material_id,
                listing_id: Some(material.listing_id.clone()),
                buyer_id: request.buyer_id,
                order_id,
                buyer_company: request.buyer_company.clone(),
                delivery_address: request.delivery_address.clone(),
                quantity: fulfilled,
                unit_price: request.unit_price,
                total_amount,
                material_name: material.material.clone(),
                notes: Some(seller_notes.to_string()).filter(|s| !s.is_empty()),
            },
        )
        .await?;

        let message = if is_partial {
            format!(
                "Your order for {} has been partially fulfilled. {}/{} units approved. Order ID: {}",
                material.material, fulfilled, request.quantity, order_id
            )
        } else {
            format!(
                "Your order for {} units of {} has been approved. Order ID: {}",
                fulfilled, material.material, order_id
            )
        };
        let title = if is_partial {
            "Order Partially Fulfilled!"
        } else {
            "Order Approved!"
        };

        if let Err(e) = notifications::record(
            txn,
            request.buyer_id,
            NotificationKind::OrderApproved,
            title,
            &message,
            Some(order_id),
            None,
        )
        .await
        {
            warn!(error = %e, order_id = %order_id, "Failed to create approval notification");
        }

        Ok(ApprovalOutcome {
            request_id: request.id,
            order_id: Some(order_id),
            status,
            fulfilled_quantity: fulfilled,
            requested_quantity: request.quantity,
            is_partial,
        })
    }

    async fn emit_all(&self, events: Vec<Event>) {
        if let Some(sender) = &self.event_sender {
            for event in events {
                if let Err(e) = sender.send(event).await {
                    warn!(error = %e, "Failed to send allocation event");
                }
            }
        }
    }
}
