//! Frame-to-payload dispatch.
//!
//! Observers are registered before the supervisor starts and never change
//! afterwards, so dispatch needs no locking.

use std::panic::{self, AssertUnwindSafe};

use tracing::{error, trace, warn};

use wbskt_protocol::ClientPayload;
use wbskt_protocol::constants::WS_MAX_MESSAGE_SIZE;

/// Callback invoked once per successfully parsed payload.
pub type Observer = Box<dyn Fn(ClientPayload) + Send + Sync>;

/// What happened to a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Empty or whitespace-only frame, dropped.
    Empty,
    /// Frame larger than [`WS_MAX_MESSAGE_SIZE`], dropped.
    Oversized,
    /// Frame did not parse as a payload, dropped.
    Malformed,
    /// Payload handed to this many observers.
    Delivered(usize),
}

/// Parses text frames and fans payloads out to observers in registration
/// order.
#[derive(Default)]
pub struct MessageDispatcher {
    observers: Vec<Observer>,
}

impl MessageDispatcher {
    pub fn new(observers: Vec<Observer>) -> Self {
        Self { observers }
    }

    /// Appends an observer. Only possible before the dispatcher is shared.
    pub fn with_observer(
        mut self,
        observer: impl Fn(ClientPayload) + Send + Sync + 'static,
    ) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Handles one raw text frame. Never fails; problems are logged and the
    /// frame is dropped.
    pub fn dispatch(&self, frame: &str) -> DispatchOutcome {
        if frame.trim().is_empty() {
            warn!("received message is empty");
            return DispatchOutcome::Empty;
        }

        if frame.len() > WS_MAX_MESSAGE_SIZE {
            warn!("message too large ({} bytes), dropping", frame.len());
            return DispatchOutcome::Oversized;
        }

        let payload = match ClientPayload::from_frame(frame) {
            Ok(p) => p,
            Err(e) => {
                error!(message = %frame, error = %e, "error while deserializing payload");
                return DispatchOutcome::Malformed;
            }
        };

        trace!(data = %payload.data, observers = self.observers.len(), "dispatching payload");

        let mut delivered = 0;
        for (index, observer) in self.observers.iter().enumerate() {
            let payload = payload.clone();
            // A panicking observer must not take the read loop down with it.
            match panic::catch_unwind(AssertUnwindSafe(|| observer(payload))) {
                Ok(()) => delivered += 1,
                Err(cause) => {
                    error!(
                        observer = index,
                        panic = %panic_message(cause.as_ref()),
                        "payload observer panicked"
                    );
                }
            }
        }
        DispatchOutcome::Delivered(delivered)
    }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = cause.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<String>>>;

    fn recording() -> (Seen, impl Fn(ClientPayload) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |p: ClientPayload| sink.lock().unwrap().push(p.data))
    }

    #[test]
    fn delivers_to_every_observer_once() {
        let (a, obs_a) = recording();
        let (b, obs_b) = recording();
        let dispatcher = MessageDispatcher::default()
            .with_observer(obs_a)
            .with_observer(obs_b);

        let outcome = dispatcher.dispatch(r#"{"data":"JIRA-123"}"#);

        assert_eq!(outcome, DispatchOutcome::Delivered(2));
        assert_eq!(*a.lock().unwrap(), vec!["JIRA-123".to_string()]);
        assert_eq!(*b.lock().unwrap(), vec!["JIRA-123".to_string()]);
    }

    #[test]
    fn observers_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (o1, o2) = (order.clone(), order.clone());
        let first: Observer = Box::new(move |_: ClientPayload| o1.lock().unwrap().push(1));
        let second: Observer = Box::new(move |_: ClientPayload| o2.lock().unwrap().push(2));
        let dispatcher = MessageDispatcher::new(vec![first, second]);

        dispatcher.dispatch(r#"{"data":"x"}"#);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn frames_are_delivered_in_receive_order() {
        let (seen, obs) = recording();
        let dispatcher = MessageDispatcher::default().with_observer(obs);

        for frame in [r#"{"data":"1"}"#, r#"{"data":"2"}"#, r#"{"data":"3"}"#] {
            dispatcher.dispatch(frame);
        }
        assert_eq!(*seen.lock().unwrap(), vec!["1", "2", "3"]);
    }

    #[test]
    fn empty_frames_are_dropped() {
        let (seen, obs) = recording();
        let dispatcher = MessageDispatcher::default().with_observer(obs);

        assert_eq!(dispatcher.dispatch(""), DispatchOutcome::Empty);
        assert_eq!(dispatcher.dispatch("  \n\t"), DispatchOutcome::Empty);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let (seen, obs) = recording();
        let dispatcher = MessageDispatcher::default().with_observer(obs);

        assert_eq!(dispatcher.dispatch("not json"), DispatchOutcome::Malformed);
        assert_eq!(dispatcher.dispatch("null"), DispatchOutcome::Malformed);
        assert_eq!(
            dispatcher.dispatch(r#"{"payload":"x"}"#),
            DispatchOutcome::Malformed
        );
        assert!(seen.lock().unwrap().is_empty());

        // Dispatcher keeps working after bad frames.
        assert_eq!(
            dispatcher.dispatch(r#"{"data":"ok"}"#),
            DispatchOutcome::Delivered(1)
        );
    }

    #[test]
    fn oversized_frames_are_dropped() {
        let (seen, obs) = recording();
        let dispatcher = MessageDispatcher::default().with_observer(obs);

        let huge = format!(r#"{{"data":"{}"}}"#, "x".repeat(WS_MAX_MESSAGE_SIZE));
        assert_eq!(dispatcher.dispatch(&huge), DispatchOutcome::Oversized);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn panicking_observer_does_not_block_the_next() {
        let (seen, obs) = recording();
        let dispatcher = MessageDispatcher::default()
            .with_observer(|_| panic!("handler exploded"))
            .with_observer(obs);

        let outcome = dispatcher.dispatch(r#"{"data":"still here"}"#);
        assert_eq!(outcome, DispatchOutcome::Delivered(1));
        assert_eq!(*seen.lock().unwrap(), vec!["still here".to_string()]);
    }

    #[test]
    fn no_observers_is_fine() {
        let dispatcher = MessageDispatcher::default();
        assert_eq!(dispatcher.observer_count(), 0);
        assert_eq!(
            dispatcher.dispatch(r#"{"data":"x"}"#),
            DispatchOutcome::Delivered(0)
        );
    }
}
