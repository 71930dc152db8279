//! Capture / target / bubble dispatch
//!
//! ```text
//! chain = ancestor_chain(target)          root-most first, target last
//! capture: chain[..last]  capture listeners only
//! target:  chain[last]    every listener, registration order
//! bubble:  chain[..last]  reversed, non-capture only, if bubbles
//! ```
//!
//! The chain and the listener lists are captured once, before the first
//! listener runs. Listeners added or removed during a dispatch take effect
//! from the next dispatch on.

use crate::error::{EventError, Result};
use crate::registry::{Registration, RegistryHandle};
use dom::{DomArena, NodeId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPhase {
    None = 0,
    Capturing = 1,
    AtTarget = 2,
    Bubbling = 3,
}

/// Event travelling through a dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub bubbles: bool,
    pub cancelable: bool,
    pub detail: serde_json::Value,
    stopped: bool,
    default_prevented: bool,
    phase: EventPhase,
    target: Option<NodeId>,
    current_target: Option<NodeId>,
}

impl Event {
    /// Non-bubbling, non-cancelable event
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            bubbles: false,
            cancelable: false,
            detail: serde_json::Value::Null,
            stopped: false,
            default_prevented: false,
            phase: EventPhase::None,
            target: None,
            current_target: None,
        }
    }

    pub fn bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    pub fn cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }

    /// No further listener in this dispatch will run
    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    /// Ignored unless the event is cancelable
    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn phase(&self) -> EventPhase {
        self.phase
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target
    }
}

/// Dispatch `event` at `target`, returning the event as the last listener left it
pub async fn dispatch_event(
    arena: &DomArena,
    registry: &RegistryHandle,
    target: NodeId,
    mut event: Event,
) -> Result<Event> {
    let chain = arena.ancestor_chain(target)?;
    let lists = registry.snapshot(chain.clone(), &event.event_type).await?;

    tracing::debug!(
        "Dispatching '{}' at node {} through {} nodes",
        event.event_type,
        target,
        chain.len()
    );

    event.target = Some(target);
    event.stopped = false;
    let result = run_phases(&chain, &lists, &mut event);

    event.phase = EventPhase::None;
    event.current_target = None;
    result.map(|()| event)
}

fn run_phases(chain: &[NodeId], lists: &[Vec<Registration>], event: &mut Event) -> Result<()> {
    let last = chain.len() - 1;

    event.phase = EventPhase::Capturing;
    for (node, list) in chain[..last].iter().zip(&lists[..last]) {
        invoke(*node, list, event, |reg| reg.capture)?;
        if event.stopped {
            return Ok(());
        }
    }

    event.phase = EventPhase::AtTarget;
    invoke(chain[last], &lists[last], event, |_| true)?;
    if event.stopped || !event.bubbles {
        return Ok(());
    }

    event.phase = EventPhase::Bubbling;
    for (node, list) in chain[..last].iter().zip(&lists[..last]).rev() {
        invoke(*node, list, event, |reg| !reg.capture)?;
        if event.stopped {
            return Ok(());
        }
    }
    Ok(())
}

fn invoke(
    node: NodeId,
    list: &[Registration],
    event: &mut Event,
    wanted: impl Fn(&Registration) -> bool,
) -> Result<()> {
    event.current_target = Some(node);

    for reg in list.iter().filter(|reg| wanted(reg)) {
        if let Err(source) = reg.listener.call(event) {
            tracing::warn!(
                "Listener {} for '{}' on node {} failed: {}",
                reg.id,
                event.event_type,
                node,
                source
            );
            return Err(EventError::Dispatch {
                node,
                event_type: event.event_type.clone(),
                listener: reg.id,
                source,
            });
        }
        if event.stopped {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EventRegistry, Listener, RegistryConfig};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, label: &str) -> Listener {
        let log = Arc::clone(log);
        let label = label.to_string();
        Listener::infallible(move |event| {
            log.lock()
                .unwrap()
                .push(format!("{}@{:?}", label, event.phase()));
        })
    }

    /// root > parent > child
    fn setup() -> (Arc<DomArena>, EventRegistry, [NodeId; 3]) {
        let arena = Arc::new(DomArena::new());
        let root = arena.create_element("html");
        let parent = arena.create_element("div");
        let child = arena.create_element("button");
        arena.append_child(root, parent).unwrap();
        arena.append_child(parent, child).unwrap();

        let registry = EventRegistry::start(Arc::clone(&arena), RegistryConfig::default());
        (arena, registry, [root, parent, child])
    }

    #[tokio::test]
    async fn test_capture_target_bubble_order() {
        let (arena, registry, [_, parent, child]) = setup();
        let handle = registry.handle();
        let log: Log = Arc::default();

        handle.add_listener(parent, "click", recorder(&log, "L1"), true).await.unwrap();
        handle.add_listener(parent, "click", recorder(&log, "L2"), false).await.unwrap();
        handle.add_listener(child, "click", recorder(&log, "L3"), false).await.unwrap();

        let event = dispatch_event(&arena, handle, child, Event::new("click").bubbles(true))
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["L1@Capturing", "L3@AtTarget", "L2@Bubbling"]
        );
        assert_eq!(event.target(), Some(child));
        assert_eq!(event.current_target(), None);
        assert_eq!(event.phase(), EventPhase::None);
    }

    #[tokio::test]
    async fn test_non_bubbling_event_skips_bubble_phase() {
        let (arena, registry, [root, _, child]) = setup();
        let handle = registry.handle();
        let log: Log = Arc::default();

        handle.add_listener(root, "focus", recorder(&log, "capture"), true).await.unwrap();
        handle.add_listener(root, "focus", recorder(&log, "bubble"), false).await.unwrap();
        handle.add_listener(child, "focus", recorder(&log, "target"), true).await.unwrap();

        dispatch_event(&arena, handle, child, Event::new("focus")).await.unwrap();

        // Capture listeners on the target itself run in the target phase
        assert_eq!(
            *log.lock().unwrap(),
            vec!["capture@Capturing", "target@AtTarget"]
        );
    }

    #[tokio::test]
    async fn test_target_phase_keeps_registration_order() {
        let (arena, registry, [_, _, child]) = setup();
        let handle = registry.handle();
        let log: Log = Arc::default();

        handle.add_listener(child, "click", recorder(&log, "a"), false).await.unwrap();
        handle.add_listener(child, "click", recorder(&log, "b"), true).await.unwrap();
        handle.add_listener(child, "click", recorder(&log, "c"), false).await.unwrap();

        dispatch_event(&arena, handle, child, Event::new("click").bubbles(true))
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a@AtTarget", "b@AtTarget", "c@AtTarget"]
        );
    }

    #[tokio::test]
    async fn test_stop_propagation_halts_everything() {
        let (arena, registry, [root, parent, child]) = setup();
        let handle = registry.handle();
        let log: Log = Arc::default();

        handle.add_listener(root, "click", recorder(&log, "root-capture"), true).await.unwrap();
        let stopper = {
            let log = Arc::clone(&log);
            Listener::infallible(move |event| {
                log.lock().unwrap().push("stopper".to_string());
                event.stop_propagation();
            })
        };
        handle.add_listener(parent, "click", stopper, true).await.unwrap();
        handle.add_listener(parent, "click", recorder(&log, "parent-capture-2"), true).await.unwrap();
        handle.add_listener(child, "click", recorder(&log, "target"), false).await.unwrap();
        handle.add_listener(root, "click", recorder(&log, "root-bubble"), false).await.unwrap();

        let event = dispatch_event(&arena, handle, child, Event::new("click").bubbles(true))
            .await
            .unwrap();

        assert!(event.is_stopped());
        assert_eq!(*log.lock().unwrap(), vec!["root-capture@Capturing", "stopper"]);
    }

    #[tokio::test]
    async fn test_prevent_default_needs_cancelable() {
        let (arena, registry, [_, _, child]) = setup();
        let handle = registry.handle();
        handle
            .add_listener(child, "submit", Listener::infallible(|e| e.prevent_default()), false)
            .await
            .unwrap();

        let plain = dispatch_event(&arena, handle, child, Event::new("submit")).await.unwrap();
        assert!(!plain.default_prevented());

        let cancelable = dispatch_event(&arena, handle, child, Event::new("submit").cancelable(true))
            .await
            .unwrap();
        assert!(cancelable.default_prevented());
    }

    #[tokio::test]
    async fn test_listener_error_aborts_dispatch() {
        let (arena, registry, [root, parent, child]) = setup();
        let handle = registry.handle();
        let log: Log = Arc::default();

        let failing = handle
            .add_listener(
                parent,
                "click",
                Listener::new(|_| Err("listener exploded".into())),
                false,
            )
            .await
            .unwrap();
        handle.add_listener(root, "click", recorder(&log, "root"), false).await.unwrap();

        let result = dispatch_event(&arena, handle, child, Event::new("click").bubbles(true)).await;
        match result {
            Err(EventError::Dispatch {
                node,
                event_type,
                listener,
                source,
            }) => {
                assert_eq!(node, parent);
                assert_eq!(event_type, "click");
                assert_eq!(listener, failing);
                assert_eq!(source.to_string(), "listener exploded");
            }
            other => panic!("expected dispatch error, got {:?}", other),
        }
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listeners_see_detail_and_current_target() {
        let (arena, registry, [root, _, child]) = setup();
        let handle = registry.handle();
        let seen: Arc<Mutex<Vec<(Option<NodeId>, serde_json::Value)>>> = Arc::default();

        let sink = Arc::clone(&seen);
        let listener = Listener::infallible(move |event| {
            sink.lock()
                .unwrap()
                .push((event.current_target(), event.detail.clone()));
        });
        handle.add_listener(root, "change", listener.clone(), false).await.unwrap();
        handle.add_listener(child, "change", listener, false).await.unwrap();

        let detail = serde_json::json!({ "value": "on" });
        dispatch_event(
            &arena,
            handle,
            child,
            Event::new("change").bubbles(true).with_detail(detail.clone()),
        )
        .await
        .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(Some(child), detail.clone()), (Some(root), detail)]
        );
    }

    #[tokio::test]
    async fn test_removal_during_dispatch_applies_next_time() {
        let (arena, registry, [_, parent, child]) = setup();
        let handle = registry.handle().clone();
        let log: Log = Arc::default();

        let late = recorder(&log, "late");
        let remover = {
            let handle = handle.clone();
            let late = late.clone();
            Listener::infallible(move |_| {
                let handle = handle.clone();
                let late = late.clone();
                tokio::spawn(async move {
                    let _ = handle.remove_listener(parent, "click", &late, false).await;
                });
            })
        };
        handle.add_listener(child, "click", remover, false).await.unwrap();
        handle.add_listener(parent, "click", late, false).await.unwrap();

        dispatch_event(&arena, &handle, child, Event::new("click").bubbles(true))
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["late@Bubbling"]);

        // Let the spawned removal run, then dispatch again
        tokio::task::yield_now().await;
        assert!(!handle.has_entry(parent).await.unwrap());
        dispatch_event(&arena, &handle, child, Event::new("click").bubbles(true))
            .await
            .unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dead_target_is_invalid() {
        let (arena, registry, [_, _, child]) = setup();
        arena.dispose(child).unwrap();

        let result = dispatch_event(&arena, registry.handle(), child, Event::new("click")).await;
        assert!(matches!(result, Err(EventError::Dom(_))));
    }
}
