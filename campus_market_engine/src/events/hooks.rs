use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    BidAcceptedEvent,
    BidCounteredEvent,
    BidPlacedEvent,
    BidRejectedEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderPaidEvent,
    PaymentFailedEvent,
};

/// The producer ends of every registered hook. Cloned into each flow API; publishing to an
/// event type nobody subscribed to is a no-op.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub bid_placed_producer: Vec<EventProducer<BidPlacedEvent>>,
    pub bid_countered_producer: Vec<EventProducer<BidCounteredEvent>>,
    pub bid_rejected_producer: Vec<EventProducer<BidRejectedEvent>>,
    pub bid_accepted_producer: Vec<EventProducer<BidAcceptedEvent>>,
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub payment_failed_producer: Vec<EventProducer<PaymentFailedEvent>>,
}

pub struct EventHandlers {
    pub on_bid_placed: Option<EventHandler<BidPlacedEvent>>,
    pub on_bid_countered: Option<EventHandler<BidCounteredEvent>>,
    pub on_bid_rejected: Option<EventHandler<BidRejectedEvent>>,
    pub on_bid_accepted: Option<EventHandler<BidAcceptedEvent>>,
    pub on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    pub on_payment_failed: Option<EventHandler<PaymentFailedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_bid_placed: hooks.on_bid_placed.map(|f| EventHandler::new(buffer_size, f)),
            on_bid_countered: hooks.on_bid_countered.map(|f| EventHandler::new(buffer_size, f)),
            on_bid_rejected: hooks.on_bid_rejected.map(|f| EventHandler::new(buffer_size, f)),
            on_bid_accepted: hooks.on_bid_accepted.map(|f| EventHandler::new(buffer_size, f)),
            on_order_paid: hooks.on_order_paid.map(|f| EventHandler::new(buffer_size, f)),
            on_payment_failed: hooks.on_payment_failed.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_bid_placed {
            result.bid_placed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_bid_countered {
            result.bid_countered_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_bid_rejected {
            result.bid_rejected_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_bid_accepted {
            result.bid_accepted_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_failed {
            result.payment_failed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_bid_placed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_bid_countered {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_bid_rejected {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_bid_accepted {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_failed {
            tokio::spawn(handler.start_handler());
        }
    }
}

type HookFn<E> = dyn (Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync;

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_bid_placed: Option<Handler<BidPlacedEvent>>,
    pub on_bid_countered: Option<Handler<BidCounteredEvent>>,
    pub on_bid_rejected: Option<Handler<BidRejectedEvent>>,
    pub on_bid_accepted: Option<Handler<BidAcceptedEvent>>,
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_payment_failed: Option<Handler<PaymentFailedEvent>>,
}

impl EventHooks {
    pub fn on_bid_placed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BidPlacedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_bid_placed = Some(Arc::new(f) as Arc<HookFn<BidPlacedEvent>>);
        self
    }

    pub fn on_bid_countered<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BidCounteredEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_bid_countered = Some(Arc::new(f) as Arc<HookFn<BidCounteredEvent>>);
        self
    }

    pub fn on_bid_rejected<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BidRejectedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_bid_rejected = Some(Arc::new(f) as Arc<HookFn<BidRejectedEvent>>);
        self
    }

    pub fn on_bid_accepted<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BidAcceptedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_bid_accepted = Some(Arc::new(f) as Arc<HookFn<BidAcceptedEvent>>);
        self
    }

    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f) as Arc<HookFn<OrderPaidEvent>>);
        self
    }

    pub fn on_payment_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentFailedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_failed = Some(Arc::new(f) as Arc<HookFn<PaymentFailedEvent>>);
        self
    }
}
