use std::rc::Rc;

use crossbeam::channel::{self, Receiver, Sender};

use crate::channel::{PushSender, SenderReceiver};
use crate::types::*;

/// A [Stream] fed from outside the graph's own thread. Drained once per
/// tick, outside the per-node observer callbacks (§4.4), ahead of every
/// ordinary node. Forbidden in back-test mode: see
/// [PushSourceInBackTest](crate::error::EngineError::PushSourceInBackTest).
pub(crate) struct PushSourceStream<T: Element> {
    receiver: Option<SenderReceiver<T>>,
    sender_tx: Sender<PushSender<T>>,
    value: T,
}

impl<T: Element> MutableNode for PushSourceStream<T> {
    fn cycle(&mut self, _state: &mut GraphState) -> anyhow::Result<bool> {
        let receiver = self.receiver.as_ref().expect("push source started before cycle");
        match receiver.try_recv() {
            Some(value) => {
                self.value = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn upstreams(&self) -> UpStreams {
        UpStreams::none()
    }

    fn start(&mut self, state: &mut GraphState) -> anyhow::Result<()> {
        if !state.is_real_time() {
            return Err(crate::error::EngineError::PushSourceInBackTest { node_index: 0 }.into());
        }
        let (sender, receiver) = SenderReceiver::new(state.push_notifier());
        self.receiver = Some(receiver);
        // the run loop that reaches this point has not yet started blocking,
        // so a bounded(1) channel never stalls it.
        let _ = self.sender_tx.send(sender);
        Ok(())
    }

    fn is_push_source(&self) -> bool {
        true
    }
}

impl<T: Element> StreamPeekRef<T> for PushSourceStream<T> {
    fn peek_ref(&self) -> &T {
        &self.value
    }
}

/// Wires up a push source and returns it alongside a [PushSourceHandle] an
/// external producer thread uses to obtain the [PushSender] that feeds it
/// values, once the graph has started.
pub fn push_source<T: Element>() -> (Rc<dyn Stream<T>>, PushSourceHandle<T>) {
    let (sender_tx, sender_rx) = channel::bounded(1);
    let node = PushSourceStream {
        receiver: None,
        sender_tx,
        value: T::default(),
    }
    .into_stream();
    (node, PushSourceHandle { sender_rx })
}

/// Blocks until the graph's [start](crate::types::MutableNode::start) pass
/// has wired the node's channel, then hands out the [PushSender] half.
/// Intended to be handed to a producer thread spawned before
/// [Graph::run](crate::graph::Graph::run) is called on the main thread.
pub struct PushSourceHandle<T: Element> {
    sender_rx: Receiver<PushSender<T>>,
}

impl<T: Element> PushSourceHandle<T> {
    pub fn recv_sender(&self) -> PushSender<T> {
        self.sender_rx
            .recv()
            .expect("push source node dropped before start")
    }
}
