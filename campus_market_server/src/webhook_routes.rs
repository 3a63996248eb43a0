//----------------------------------------------   Webhooks  ----------------------------------------------------
//
// Asynchronous gateway event ingestion. Events may arrive duplicated, out of order, or before
// the synchronous checkout path has written anything locally; all of that is the settlement
// engine's problem. This route's contract is simpler: convert, dispatch, and always answer in
// the 200 range, because the gateway retries anything else and a malformed payload it already
// delivered correctly will never get better.

use actix_web::{web, HttpRequest, HttpResponse};
use campus_market_engine::{GatewayEvent, PaymentReconciliation, SettlementApi};
use log::*;
use stripe_tools::{StripeApi, StripeEvent};

use crate::{
    data_objects::JsonResponse,
    integrations::stripe::{gateway_event_from_stripe, EventConversionError},
    route,
};

route!(stripe_webhook => Post "/webhook/stripe" impl PaymentReconciliation);
pub async fn stripe_webhook<B>(
    req: HttpRequest,
    body: web::Json<StripeEvent>,
    api: web::Data<SettlementApi<B>>,
    stripe: web::Data<StripeApi>,
) -> HttpResponse
where
    B: PaymentReconciliation,
{
    trace!("🪝️ Received webhook request: {}", req.uri());
    let event = body.into_inner();
    let event_id = event.id.clone();
    let result = match gateway_event_from_stripe(&event) {
        Err(EventConversionError::UnhandledType(t)) => {
            debug!("🪝️ Ignoring {t} event [{event_id}]; not a type we act on");
            JsonResponse::success(format!("Ignoring {t}"))
        },
        Err(EventConversionError::Malformed(reason)) => {
            // Log and drop: the event is signature-valid but unusable, and bouncing it would
            // only trigger a retry storm of the same payload.
            warn!("🪝️ Dropping malformed {} event [{event_id}]: {reason}", event.event_type);
            JsonResponse::failure(reason)
        },
        Ok(mut gateway_event) => {
            enrich_receipt(&mut gateway_event, &stripe).await;
            match api.process_event(gateway_event).await {
                Ok(_) => {
                    debug!("🪝️ Event [{event_id}] processed");
                    JsonResponse::success("Event processed.")
                },
                Err(e) => {
                    warn!("🪝️ Error processing event [{event_id}]: {e}");
                    JsonResponse::failure("Unexpected error handling event.")
                },
            }
        },
    };
    HttpResponse::Ok().json(result)
}

/// Best-effort receipt resolution for success events that did not carry one: follow the intent
/// to its latest charge. Failures are logged and the settlement proceeds without a receipt; a
/// later charge.updated event will fill it in.
async fn enrich_receipt(event: &mut GatewayEvent, stripe: &StripeApi) {
    let update = match event {
        GatewayEvent::IntentSucceeded(u) | GatewayEvent::ChargeSucceeded(u) => u,
        _ => return,
    };
    if update.receipt_url.is_some() {
        return;
    }
    match stripe.receipt_url_for_intent(&update.intent_id).await {
        Ok(url) => update.receipt_url = url,
        Err(e) => {
            debug!("🪝️ Could not resolve receipt for intent [{}]: {e}. Will retry on a later event.", update.intent_id)
        },
    }
}
