// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `SmallMessageCoalescing`: bundles several small upstream messages into
//! one fabric-sized message, de-coalescing on the way back via `eject`.

use std::rc::Rc;

use pipeline::{Message, Pe, WorkloadComponent};

pub struct SmallMessageCoalescing {
    inner: Box<dyn WorkloadComponent>,
    capacity: usize,
    buffers: Vec<Vec<Rc<Message>>>,
    staged: Vec<Option<Rc<Message>>>,
}

impl SmallMessageCoalescing {
    #[must_use]
    pub fn new(inner: Box<dyn WorkloadComponent>, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            buffers: Vec::new(),
            staged: Vec::new(),
        }
    }

    fn is_full(&self, src: Pe) -> bool {
        self.buffers[src as usize].len() >= self.capacity
    }

    fn ensure_staged(&mut self, src: Pe, now: u64) {
        let idx = src as usize;
        if self.staged[idx].is_some() {
            return;
        }
        while !self.is_full(src) && self.inner.test(src, now) {
            let Some(msg) = self.inner.get(src, now) else { break };
            self.inner.next(src, now);
            self.buffers[idx].push(msg);
        }
        if self.is_full(src) {
            let parts = std::mem::take(&mut self.buffers[idx]);
            self.staged[idx] = Some(Rc::new(Message::Coalesced { parts }));
        }
    }
}

impl WorkloadComponent for SmallMessageCoalescing {
    fn init(&mut self, pes: u32) {
        self.inner.init(pes);
        self.buffers = (0..pes).map(|_| Vec::new()).collect();
        self.staged = vec![None; pes as usize];
    }

    fn test(&mut self, src: Pe, now: u64) -> bool {
        self.ensure_staged(src, now);
        self.staged[src as usize].is_some()
    }

    fn get(&mut self, src: Pe, now: u64) -> Option<Rc<Message>> {
        self.ensure_staged(src, now);
        self.staged[src as usize].clone()
    }

    fn next(&mut self, src: Pe, _now: u64) {
        self.staged[src as usize] = None;
    }

    fn eject(&mut self, dest: Pe, msg: Rc<Message>, now: u64) {
        match &*msg {
            Message::Coalesced { parts } => {
                for part in parts {
                    self.inner.eject(dest, part.clone(), now);
                }
            }
            _ => self.inner.eject(dest, msg, now),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pipeline::{BaseMessage, MessageKind};

    struct Queue(std::collections::VecDeque<BaseMessage>);
    impl WorkloadComponent for Queue {
        fn init(&mut self, _pes: u32) {}
        fn test(&mut self, _src: Pe, _now: u64) -> bool {
            !self.0.is_empty()
        }
        fn get(&mut self, _src: Pe, _now: u64) -> Option<Rc<Message>> {
            self.0.front().cloned().map(|m| Rc::new(Message::Base(m)))
        }
        fn next(&mut self, _src: Pe, _now: u64) {
            self.0.pop_front();
        }
        fn eject(&mut self, _dest: Pe, _msg: Rc<Message>, _now: u64) {}
    }

    fn msg(dest: u32) -> BaseMessage {
        BaseMessage { source: 0, dest, size: 1, kind: MessageKind::PutRequest, is_reply: false }
    }

    #[test]
    fn does_not_stage_until_buffer_is_full() {
        let q = Queue(std::collections::VecDeque::from(vec![msg(1)]));
        let mut c = SmallMessageCoalescing::new(Box::new(q), 3);
        c.init(2);
        assert!(!c.test(0, 0));
    }

    #[test]
    fn stages_a_coalesced_message_once_full() {
        let q = Queue(std::collections::VecDeque::from(vec![msg(1), msg(2), msg(3)]));
        let mut c = SmallMessageCoalescing::new(Box::new(q), 3);
        c.init(2);
        assert!(c.test(0, 0));
        let staged = c.get(0, 0).unwrap();
        assert_eq!(staged.size(), 3);
    }
}
