use log::warn;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use crate::model::Entity;

/// Subscriber to lifecycle events of `E`. Both hooks are best-effort: failures are
/// logged by the notifier and never reach the operation that triggered them.
pub trait EntityListener<E>: Send + Sync {
    fn on_entity_saved(&self, _entity: &E) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_entity_deleted(&self, _entity: &E) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Outcome of one notification round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy)]
enum Event {
    Saved,
    Deleted,
}

/// Weak, unordered listener registrations.
///
/// The set never keeps a listener alive; registrations whose owner has been
/// dropped are pruned on the next notification.
pub struct ListenerSet<E> {
    listeners: Vec<Weak<dyn EntityListener<E>>>,
}

impl<E> Default for ListenerSet<E> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<E: Entity> ListenerSet<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`; registering the same listener twice has no effect.
    pub fn add(&mut self, listener: &Arc<dyn EntityListener<E>>) {
        let weak = Arc::downgrade(listener);
        if !self.listeners.iter().any(|l| Weak::ptr_eq(l, &weak)) {
            self.listeners.push(weak);
        }
    }

    pub fn remove(&mut self, listener: &Arc<dyn EntityListener<E>>) {
        let weak = Arc::downgrade(listener);
        self.listeners.retain(|l| !Weak::ptr_eq(l, &weak));
    }

    /// Number of registrations whose listener is still alive.
    pub fn len(&self) -> usize {
        self.listeners.iter().filter(|l| l.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify_saved(&mut self, entity: &E) -> FanOut {
        self.notify(Event::Saved, entity)
    }

    pub fn notify_deleted(&mut self, entity: &E) -> FanOut {
        self.notify(Event::Deleted, entity)
    }

    fn notify(&mut self, event: Event, entity: &E) -> FanOut {
        self.listeners.retain(|l| l.strong_count() > 0);
        let mut fan_out = FanOut::default();

        for listener in self.listeners.iter().filter_map(Weak::upgrade) {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match event {
                Event::Saved => listener.on_entity_saved(entity),
                Event::Deleted => listener.on_entity_deleted(entity),
            }));
            match outcome {
                Ok(Ok(())) => fan_out.delivered += 1,
                Ok(Err(err)) => {
                    fan_out.failed += 1;
                    warn!("{:?} listener for {} failed: {:#}", event, E::ENTITY_TYPE, err);
                }
                Err(_) => {
                    fan_out.failed += 1;
                    warn!("{:?} listener for {} panicked", event, E::ENTITY_TYPE);
                }
            }
        }
        fan_out
    }
}

/// Interactive yes/no confirmation shown before irreversible operations.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

impl<F> Confirmer for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Project;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        saved: Mutex<Vec<String>>,
        fail: bool,
    }

    impl EntityListener<Project> for Recorder {
        fn on_entity_saved(&self, entity: &Project) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("recorder refused {}", entity.name);
            }
            self.saved.lock().push(entity.name.clone());
            Ok(())
        }
    }

    struct Panicker;

    impl EntityListener<Project> for Panicker {
        fn on_entity_saved(&self, _entity: &Project) -> anyhow::Result<()> {
            panic!("listener bug");
        }
    }

    #[test]
    fn test_failing_listener_does_not_stop_the_rest() {
        let failing: Arc<dyn EntityListener<Project>> = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let panicking: Arc<dyn EntityListener<Project>> = Arc::new(Panicker);
        let healthy = Arc::new(Recorder::default());
        let healthy_dyn: Arc<dyn EntityListener<Project>> = healthy.clone();

        let mut listeners = ListenerSet::new();
        listeners.add(&failing);
        listeners.add(&panicking);
        listeners.add(&healthy_dyn);

        let fan_out = listeners.notify_saved(&Project::new("Apollo"));
        assert_eq!(fan_out, FanOut { delivered: 1, failed: 2 });
        assert_eq!(*healthy.saved.lock(), vec!["Apollo".to_string()]);
    }

    #[test]
    fn test_registrations_are_weak_and_deduplicated() {
        let listener: Arc<dyn EntityListener<Project>> = Arc::new(Recorder::default());
        let mut listeners = ListenerSet::new();
        listeners.add(&listener);
        listeners.add(&listener);
        assert_eq!(listeners.len(), 1);

        drop(listener);
        assert!(listeners.is_empty());
        assert_eq!(listeners.notify_deleted(&Project::new("Apollo")), FanOut::default());
    }

    #[test]
    fn test_closure_confirmer() {
        let confirmer = |message: &str| message.contains("delete");
        assert!(confirmer.confirm("Really delete?"));
        assert!(!Confirmer::confirm(&confirmer, "Save?"));
    }
}
