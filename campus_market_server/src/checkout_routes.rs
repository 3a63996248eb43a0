//----------------------------------------------   Checkout  ----------------------------------------------------
//
// Turning an order into money: each endpoint assembles (or re-uses) a PENDING order, asks the
// gateway for a hosted checkout session, reconciles the freshly minted payment intent onto a
// local payment record, and hands the session URL back to the buyer.
//
// A gateway failure surfaces as 502 and leaves the order PENDING, so the buyer can simply try
// again; nothing needs rolling back.

use actix_web::{web, HttpResponse};
use campus_market_engine::{
    db_types::{Order, OrderStatus, PaymentUpdate},
    helpers::order_label,
    OrderAssemblyApi,
    OrderManagement,
    PaymentReconciliation,
    SettlementApi,
};
use log::*;
use stripe_tools::{NewCheckoutSession, StripeApi};

use crate::{
    auth::AuthenticatedUser,
    config::CheckoutConfig,
    data_objects::CheckoutResponse,
    errors::ServerError,
    route,
};

route!(bid_checkout => Post "/checkout/bid/{id}" impl OrderManagement, PaymentReconciliation);
/// Start a checkout for an accepted bid. Re-invoking after a partial failure reuses the order
/// already linked to the bid, so the buyer can always retry safely.
pub async fn bid_checkout<BOrd, BPay>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    orders: web::Data<OrderAssemblyApi<BOrd>>,
    settlements: web::Data<SettlementApi<BPay>>,
    stripe: web::Data<StripeApi>,
    checkout: web::Data<CheckoutConfig>,
) -> Result<HttpResponse, ServerError>
where
    BOrd: OrderManagement,
    BPay: PaymentReconciliation,
{
    let bid_id = path.into_inner();
    debug!("💻️ POST /checkout/bid/{bid_id} by user {}", user.id);
    let (order, bid) = orders.order_for_bid(bid_id, user.id).await?;
    ensure_payable(&order)?;
    let product_name = format!("Accepted bid #{} (listing {})", bid.id, bid.listing_id);
    create_session_and_reconcile(order, product_name, &settlements, &stripe, &checkout).await
}

route!(cart_checkout => Post "/checkout/cart" impl OrderManagement, PaymentReconciliation);
/// Convert the buyer's cart into an order and start a checkout for it.
pub async fn cart_checkout<BOrd, BPay>(
    user: AuthenticatedUser,
    orders: web::Data<OrderAssemblyApi<BOrd>>,
    settlements: web::Data<SettlementApi<BPay>>,
    stripe: web::Data<StripeApi>,
    checkout: web::Data<CheckoutConfig>,
) -> Result<HttpResponse, ServerError>
where
    BOrd: OrderManagement,
    BPay: PaymentReconciliation,
{
    debug!("💻️ POST /checkout/cart by user {}", user.id);
    let assembled = orders.order_from_cart(user.id).await?;
    let product_name = format!("Campus market cart ({} items)", assembled.items.len());
    create_session_and_reconcile(assembled.order, product_name, &settlements, &stripe, &checkout).await
}

route!(order_checkout => Post "/checkout/order/{id}" impl OrderManagement, PaymentReconciliation);
/// Start (or restart) a checkout for an existing pending order, e.g. after an earlier gateway
/// failure or an abandoned session. The reconciler adopts the new intent onto the same payment.
pub async fn order_checkout<BOrd, BPay>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    orders: web::Data<OrderAssemblyApi<BOrd>>,
    settlements: web::Data<SettlementApi<BPay>>,
    stripe: web::Data<StripeApi>,
    checkout: web::Data<CheckoutConfig>,
) -> Result<HttpResponse, ServerError>
where
    BOrd: OrderManagement,
    BPay: PaymentReconciliation,
{
    let order_id = path.into_inner();
    debug!("💻️ POST /checkout/order/{order_id} by user {}", user.id);
    let order = orders
        .fetch_order(order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} does not exist")))?;
    if order.user_id != user.id {
        return Err(ServerError::AuthenticationError(crate::errors::AuthError::Forbidden(format!(
            "Order {order_id} belongs to another user"
        ))));
    }
    ensure_payable(&order)?;
    let product_name = format!("Campus market order #{order_id}");
    create_session_and_reconcile(order, product_name, &settlements, &stripe, &checkout).await
}

fn ensure_payable(order: &Order) -> Result<(), ServerError> {
    if order.status != OrderStatus::Pending {
        return Err(ServerError::Conflict(format!("Order {} is already {}", order.id, order.status)));
    }
    Ok(())
}

async fn create_session_and_reconcile<BPay: PaymentReconciliation>(
    order: Order,
    product_name: String,
    settlements: &SettlementApi<BPay>,
    stripe: &StripeApi,
    checkout: &CheckoutConfig,
) -> Result<HttpResponse, ServerError> {
    let session = stripe
        .create_checkout_session(NewCheckoutSession {
            order_id: order.id,
            amount: order.total_price,
            currency: checkout.currency.clone(),
            product_name,
            description: format!("Campus market order {}", order_label(order.id)),
            success_url: checkout.success_url.clone(),
            cancel_url: checkout.cancel_url.clone(),
        })
        .await?;
    let intent_id = session
        .payment_intent
        .ok_or_else(|| ServerError::GatewayError("The checkout session carried no payment intent".to_string()))?;
    let checkout_url = session
        .url
        .ok_or_else(|| ServerError::GatewayError("The checkout session carried no payment page URL".to_string()))?;
    // Reconcile immediately so the intent is known locally before any webhook can race us. The
    // "intent created" webhook arriving first is also fine; it merges onto the same row.
    let update = PaymentUpdate::new(intent_id, order.total_price)
        .for_order(order.id)
        .with_currency(checkout.currency.clone());
    let payment = settlements.reconcile(update).await?;
    info!("💻️ Checkout session {} ready for order #{} (payment {})", session.id, order.id, payment.id);
    Ok(HttpResponse::Ok().json(CheckoutResponse { checkout_url, order_id: order.id, payment_id: payment.id }))
}
