// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `Mppn`: multi-PE-per-node. Presents a node-indexed view downstream over
//! an upstream component that operates in the finer PE index space.

use std::collections::VecDeque;
use std::rc::Rc;

use pipeline::{Message, Pe, WorkloadComponent};

pub struct Mppn {
    inner: Box<dyn WorkloadComponent>,
    pe_per_node: u32,
    queues: Vec<VecDeque<(Pe, Rc<Message>)>>,
}

impl Mppn {
    #[must_use]
    pub fn new(inner: Box<dyn WorkloadComponent>, pe_per_node: u32) -> Self {
        Self {
            inner,
            pe_per_node,
            queues: Vec::new(),
        }
    }

    fn pe_range(&self, node: Pe) -> std::ops::Range<Pe> {
        node * self.pe_per_node..(node + 1) * self.pe_per_node
    }

    fn drain(&mut self, node: Pe, now: u64) {
        let idx = node as usize;
        if !self.queues[idx].is_empty() {
            return;
        }
        for pe in self.pe_range(node) {
            if self.inner.test(pe, now) {
                if let Some(msg) = self.inner.get(pe, now) {
                    self.queues[idx].push_back((pe, msg));
                }
            }
        }
    }

    /// `pe` identifies which upstream PE produced `msg`; `node` is what
    /// downstream observes as the translated source.
    fn wrap(&self, node: Pe, _pe: Pe, msg: &Rc<Message>) -> Rc<Message> {
        Rc::new(Message::Mppn {
            translated_dest: msg.dest() / self.pe_per_node,
            inner: msg.clone(),
            translated_source: node,
        })
    }
}

impl WorkloadComponent for Mppn {
    fn init(&mut self, nodes: u32) {
        self.inner.init(nodes * self.pe_per_node);
        self.queues = (0..nodes).map(|_| VecDeque::new()).collect();
    }

    fn test(&mut self, node: Pe, now: u64) -> bool {
        self.drain(node, now);
        !self.queues[node as usize].is_empty()
    }

    fn get(&mut self, node: Pe, now: u64) -> Option<Rc<Message>> {
        self.drain(node, now);
        let idx = node as usize;
        let (pe, msg) = self.queues[idx].front()?.clone();
        Some(self.wrap(node, pe, &msg))
    }

    fn next(&mut self, node: Pe, now: u64) {
        let idx = node as usize;
        if let Some((pe, _)) = self.queues[idx].pop_front() {
            self.inner.next(pe, now);
        }
    }

    fn eject(&mut self, _node: Pe, msg: Rc<Message>, now: u64) {
        let inner_msg = match &*msg {
            Message::Mppn { inner, .. } => inner.clone(),
            _ => msg,
        };
        let dest_pe = inner_msg.dest();
        self.inner.eject(dest_pe, inner_msg, now);
    }
}
