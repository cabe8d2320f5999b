// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `OnNodeLatency`: two delay lines modeling the fixed latency a message
//! spends on-node before reaching the fabric (outgoing) and after arriving
//! from it before the local program observes it (incoming).

use std::collections::VecDeque;
use std::rc::Rc;

use pipeline::{Message, Pe, WorkloadComponent};

pub struct OnNodeLatency {
    inner: Box<dyn WorkloadComponent>,
    outgoing_latency: u64,
    incoming_latency: u64,
    staged: Vec<Option<(Rc<Message>, u64)>>,
    incoming: Vec<VecDeque<(Rc<Message>, u64)>>,
}

impl OnNodeLatency {
    #[must_use]
    pub fn new(inner: Box<dyn WorkloadComponent>, outgoing_latency: u64, incoming_latency: u64) -> Self {
        Self {
            inner,
            outgoing_latency,
            incoming_latency,
            staged: Vec::new(),
            incoming: Vec::new(),
        }
    }

    fn drain_incoming(&mut self, src: Pe, now: u64) {
        let idx = src as usize;
        while let Some((_, ready_time)) = self.incoming[idx].front() {
            if *ready_time > now {
                break;
            }
            let (msg, _) = self.incoming[idx].pop_front().expect("just peeked");
            self.inner.eject(src, msg, now);
        }
    }

    fn ensure_staged(&mut self, src: Pe, now: u64) {
        let idx = src as usize;
        if self.staged[idx].is_none() && self.inner.test(src, now) {
            if let Some(msg) = self.inner.get(src, now) {
                self.staged[idx] = Some((msg, now + self.outgoing_latency));
            }
        }
    }

    fn ready(&self, src: Pe, now: u64) -> bool {
        matches!(&self.staged[src as usize], Some((_, ready_time)) if *ready_time <= now)
    }
}

impl WorkloadComponent for OnNodeLatency {
    fn init(&mut self, pes: u32) {
        self.inner.init(pes);
        self.staged = vec![None; pes as usize];
        self.incoming = (0..pes).map(|_| VecDeque::new()).collect();
    }

    fn test(&mut self, src: Pe, now: u64) -> bool {
        self.drain_incoming(src, now);
        self.ensure_staged(src, now);
        self.ready(src, now)
    }

    fn get(&mut self, src: Pe, now: u64) -> Option<Rc<Message>> {
        if !self.test(src, now) {
            return None;
        }
        self.staged[src as usize].as_ref().map(|(msg, _)| msg.clone())
    }

    fn next(&mut self, src: Pe, now: u64) {
        if self.ready(src, now) {
            self.inner.next(src, now);
            self.staged[src as usize] = None;
        }
    }

    fn eject(&mut self, dest: Pe, msg: Rc<Message>, now: u64) {
        self.incoming[dest as usize].push_back((msg, now + self.incoming_latency));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::generators::random::Random;
    use crate::injection::BernoulliInjectionProcess;
    use crate::traffic::Uniform;

    struct Sink {
        ejected: std::rc::Rc<std::cell::RefCell<Vec<(Pe, u64)>>>,
    }
    impl WorkloadComponent for Sink {
        fn init(&mut self, _pes: u32) {}
        fn test(&mut self, _src: Pe, _now: u64) -> bool {
            false
        }
        fn get(&mut self, _src: Pe, _now: u64) -> Option<Rc<Message>> {
            None
        }
        fn next(&mut self, _src: Pe, _now: u64) {}
        fn eject(&mut self, dest: Pe, _msg: Rc<Message>, now: u64) {
            self.ejected.borrow_mut().push((dest, now));
        }
    }

    #[test]
    fn outgoing_message_is_not_ready_before_its_latency() {
        let r#gen = Random::new(Box::new(BernoulliInjectionProcess::new(vec![1.0])), Box::new(Uniform), 1, 4, false, 0.0);
        let mut l = OnNodeLatency::new(Box::new(r#gen), 5, 0);
        l.init(4);
        assert!(!l.test(0, 0));
        assert!(l.test(0, 5));
    }

    #[test]
    fn incoming_reply_is_delivered_after_its_latency() {
        let ejected = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = Sink { ejected: ejected.clone() };
        let mut l = OnNodeLatency::new(Box::new(sink), 0, 3);
        l.init(2);
        let msg = Rc::new(Message::Base(pipeline::BaseMessage {
            source: 1,
            dest: 0,
            size: 1,
            kind: pipeline::MessageKind::GetRequest,
            is_reply: true,
        }));
        l.eject(0, msg, 10);
        l.test(0, 12);
        assert!(ejected.borrow().is_empty());
        l.test(0, 13);
        assert!(ejected.borrow().iter().any(|(dest, now)| *dest == 0 && *now == 13));
    }
}
