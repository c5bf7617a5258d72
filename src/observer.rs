use crate::time::NanoTime;

/// Persistent, pluggable callbacks over the lifetime of a run. Distinct from
/// the tick-scoped one-shot notifications a node can queue for itself (see
/// [GraphState::notify_before_evaluation](crate::graph::GraphState::notify_before_evaluation)/
/// [notify_after_evaluation](crate::graph::GraphState::notify_after_evaluation)).
///
/// Implementors receive every before/after pair the executor defines;
/// default bodies are no-ops so an observer only overrides what it cares
/// about. Notification order across multiple observers is insertion order.
#[allow(unused_variables)]
pub trait LifecycleObserver {
    fn on_before_start_graph(&mut self) {}
    fn on_after_start_graph(&mut self) {}

    fn on_before_stop_graph(&mut self) {}
    fn on_after_stop_graph(&mut self) {}

    fn on_before_evaluation(&mut self, time: NanoTime) {}
    fn on_after_evaluation(&mut self, time: NanoTime) {}

    fn on_before_node_evaluation(&mut self, node_index: usize, time: NanoTime) {}
    fn on_after_node_evaluation(&mut self, node_index: usize, time: NanoTime) {}

    fn on_before_start_node(&mut self, node_index: usize) {}
    fn on_after_start_node(&mut self, node_index: usize) {}

    fn on_before_stop_node(&mut self, node_index: usize) {}
    fn on_after_stop_node(&mut self, node_index: usize) {}
}

/// Ordered collection of lifecycle observers, fanning each callback out to
/// every registered observer in insertion order.
#[derive(Default)]
pub struct ObserverList {
    observers: Vec<Box<dyn LifecycleObserver>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: Box<dyn LifecycleObserver>) {
        self.observers.push(observer);
    }

    pub fn before_evaluation(&mut self, time: NanoTime) {
        for o in self.observers.iter_mut() {
            o.on_before_evaluation(time);
        }
    }

    pub fn after_evaluation(&mut self, time: NanoTime) {
        for o in self.observers.iter_mut() {
            o.on_after_evaluation(time);
        }
    }

    pub fn before_node_evaluation(&mut self, node_index: usize, time: NanoTime) {
        for o in self.observers.iter_mut() {
            o.on_before_node_evaluation(node_index, time);
        }
    }

    pub fn after_node_evaluation(&mut self, node_index: usize, time: NanoTime) {
        for o in self.observers.iter_mut() {
            o.on_after_node_evaluation(node_index, time);
        }
    }

    pub fn before_start_graph(&mut self) {
        for o in self.observers.iter_mut() {
            o.on_before_start_graph();
        }
    }

    pub fn after_start_graph(&mut self) {
        for o in self.observers.iter_mut() {
            o.on_after_start_graph();
        }
    }

    pub fn before_stop_graph(&mut self) {
        for o in self.observers.iter_mut() {
            o.on_before_stop_graph();
        }
    }

    pub fn after_stop_graph(&mut self) {
        for o in self.observers.iter_mut() {
            o.on_after_stop_graph();
        }
    }

    pub fn before_start_node(&mut self, node_index: usize) {
        for o in self.observers.iter_mut() {
            o.on_before_start_node(node_index);
        }
    }

    pub fn after_start_node(&mut self, node_index: usize) {
        for o in self.observers.iter_mut() {
            o.on_after_start_node(node_index);
        }
    }

    pub fn before_stop_node(&mut self, node_index: usize) {
        for o in self.observers.iter_mut() {
            o.on_before_stop_node(node_index);
        }
    }

    pub fn after_stop_node(&mut self, node_index: usize) {
        for o in self.observers.iter_mut() {
            o.on_after_stop_node(node_index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Counter(Rc<RefCell<Vec<&'static str>>>);

    impl LifecycleObserver for Counter {
        fn on_before_stop_node(&mut self, _node_index: usize) {
            self.0.borrow_mut().push("before_stop_node");
        }
        fn on_after_stop_node(&mut self, _node_index: usize) {
            self.0.borrow_mut().push("after_stop_node");
        }
    }

    #[test]
    fn stop_node_callbacks_fire_before_and_after_not_start() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut observers = ObserverList::new();
        observers.add(Box::new(Counter(log.clone())));

        observers.before_stop_node(0);
        observers.after_stop_node(0);

        assert_eq!(*log.borrow(), vec!["before_stop_node", "after_stop_node"]);
    }
}
