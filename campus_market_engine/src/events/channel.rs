//! Simple stateless pub-sub event plumbing.
//!
//! Flow APIs publish events after their transactions commit; each registered hook runs on its
//! own task. Handlers receive only the event itself and have no access to engine state, which
//! keeps them honest: a subscriber can never reach back in and block or fail a settlement.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until the last producer is dropped, then drains any in-flight handler tasks.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Drop the internal sender so the loop ends once every subscriber is gone.
        drop(self.sender);
        let mut jobs = JoinSet::new();
        loop {
            tokio::select! {
                event = self.listener.recv() => {
                    let Some(ev) = event else { break };
                    trace!("📬️ Handling event");
                    let handler = Arc::clone(&self.handler);
                    jobs.spawn(async move {
                        (handler)(ev).await;
                        trace!("📬️ Event handled");
                    });
                },
                // Reap finished tasks as we go so the set does not grow unbounded.
                Some(res) = jobs.join_next(), if !jobs.is_empty() => {
                    if let Err(e) = res {
                        warn!("📬️ An event hook panicked: {e}");
                    }
                },
            }
        }
        while let Some(res) = jobs.join_next().await {
            if let Err(e) = res {
                warn!("📬️ An event hook panicked during shutdown: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[tokio::test]
    async fn events_reach_the_handler() {
        let _ = env_logger::try_init();
        let count = Arc::new(AtomicU64::new(0));
        let c2 = count.clone();
        let handler = Arc::new(move |v: u64| {
            let count = count.clone();
            Box::pin(async move {
                count.fetch_add(v, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(4, handler);
        let producer_1 = event_handler.subscribe();
        let producer_2 = event_handler.subscribe();
        tokio::spawn(async move {
            for i in 0..5u64 {
                producer_1.publish_event(i * 2 + 1).await;
            }
        });
        tokio::spawn(async move {
            for i in 0..5u64 {
                producer_2.publish_event(i * 2).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(c2.load(Ordering::SeqCst), 45);
    }
}
