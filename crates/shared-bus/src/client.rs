//! # Event Client
//!
//! A consumer-side connection to the ledger event source. Handlers are
//! registered per event kind before `start`; once started, a dedicated task
//! reads the event stream and dispatches each event to its handlers in
//! order. `stop` is synchronous from the caller's point of view: when it
//! returns, no handler is running and none will run again.

use crate::events::{LedgerEvent, LedgerEventKind};
use crate::subscriber::Subscription;
use crate::BusError;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Callback invoked for each event of a registered kind.
pub type EventHandler = Arc<dyn Fn(&LedgerEvent) + Send + Sync>;

/// Something a node can connect to for commit events.
pub trait EventSource: Send + Sync {
    /// Open a new client. Fails if the source is unreachable.
    fn connect(&self) -> Result<Arc<dyn EventClient>, BusError>;
}

/// A connected, not necessarily started, event client.
#[async_trait]
pub trait EventClient: Send + Sync {
    /// Register `handler` for `kind`. Only effective before `start`.
    fn register_handler(&self, kind: LedgerEventKind, handler: EventHandler);

    /// Begin delivering events.
    fn start(&self) -> Result<(), BusError>;

    /// Stop delivering events and wait for the dispatch task to exit.
    async fn stop(&self);

    fn is_running(&self) -> bool;
}

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// [`EventClient`] over the in-memory bus.
pub struct BusEventClient {
    sender: broadcast::Sender<LedgerEvent>,
    handlers: RwLock<HashMap<LedgerEventKind, Vec<EventHandler>>>,
    running: Mutex<Option<Running>>,
}

impl BusEventClient {
    pub(crate) fn new(sender: broadcast::Sender<LedgerEvent>) -> Self {
        Self {
            sender,
            handlers: RwLock::new(HashMap::new()),
            running: Mutex::new(None),
        }
    }
}

#[async_trait]
impl EventClient for BusEventClient {
    fn register_handler(&self, kind: LedgerEventKind, handler: EventHandler) {
        self.handlers.write().entry(kind).or_default().push(handler);
    }

    fn start(&self) -> Result<(), BusError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(BusError::AlreadyStarted);
        }

        let handlers = self.handlers.read().clone();
        let subscription = Subscription::new(self.sender.subscribe());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(dispatch_loop(subscription, handlers, shutdown_rx));

        info!("Ledger event client started");
        *running = Some(Running { shutdown, task });
        Ok(())
    }

    async fn stop(&self) {
        let Some(Running { shutdown, task }) = self.running.lock().take() else {
            return;
        };
        let _ = shutdown.send(true);
        if let Err(e) = task.await {
            debug!(error = %e, "Event dispatch task ended abnormally");
        }
        info!("Ledger event client stopped");
    }

    fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

async fn dispatch_loop(
    mut subscription: Subscription,
    handlers: HashMap<LedgerEventKind, Vec<EventHandler>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = subscription.recv() => {
                let Some(event) = event else {
                    debug!("Ledger event stream closed");
                    break;
                };
                if let Some(list) = handlers.get(&event.kind) {
                    for handler in list {
                        handler(&event);
                    }
                }
            }
        }
    }
}
