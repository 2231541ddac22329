/// Shutdown Module
///
/// A cancellation signal shared by the posting loop and the retry invoker.
/// Both suspension points of the agent (backoff delays and the interval
/// between posts) race against it so the process can stop cleanly.

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Receiving side of the shutdown signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    receiver: watch::Receiver<bool>,
}

/// Sending side of the shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    sender: watch::Sender<bool>,
}

/// Create a connected trigger/receiver pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownTrigger { sender }, Shutdown { receiver })
}

impl ShutdownTrigger {
    /// Signal every receiver to stop.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Shutdown {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_trigger, shutdown) = channel();
        shutdown
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once the signal fires.
    ///
    /// If the trigger is dropped without firing, this never resolves.
    pub async fn triggered(&self) {
        let mut receiver = self.receiver.clone();
        let closed = receiver.wait_for(|stopped| *stopped).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Fire `trigger` when the process receives Ctrl+C.
pub fn trigger_on_ctrl_c(trigger: ShutdownTrigger) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Ctrl+C received, stopping after the current step...");
                trigger.trigger();
            }
            Err(e) => {
                log::error!("Unable to listen for Ctrl+C: {}", e);
            }
        }
    })
}
