// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `CollectiveAccelerator`: a modifier sitting between a PE and the fabric.
//! It intercepts `Message::Collective` requests from `inner`, drives the
//! requested algorithm's [`AccelNode`], and replies to `inner` directly once
//! the node finishes, the same way `LocalShortcut` delivers a loopback
//! message without the fabric ever seeing it. The sync traffic the node's
//! algorithm produces along the way, tagged `MessageKind::AccelSync`, is
//! real fabric traffic: it is offered through this component's own
//! `test`/`get`/`next` and consumed through its own `eject`.

use std::collections::VecDeque;
use std::rc::Rc;

use config::ConfigError;
use pipeline::{BaseMessage, CollectiveOp, CollectiveRequest, Message, MessageKind, Pe, WorkloadComponent};

use crate::algorithm::{allreduce_steps, barrier_steps, bcast_steps, AllreduceAlgo, BarrierAlgo, BcastAlgo};
use crate::node::AccelNode;

const ACK_SIZE: u64 = 8;

/// Default per-cacheline local-reduction compute latency, in cycles, used
/// when a specifier doesn't override it.
const DEFAULT_COMPUTE_LAT: u64 = 4;

pub struct CollectiveAccelerator {
    inner: Box<dyn WorkloadComponent>,
    radix: u32,
    compute_lat: u64,
    barrier_name: String,
    allreduce_name: String,
    bcast_name: String,
    nodes: Vec<AccelNode>,
    pending_acks: Vec<VecDeque<Pe>>,
    staged: Vec<Option<Rc<Message>>>,
}

impl CollectiveAccelerator {
    pub fn new(
        inner: Box<dyn WorkloadComponent>,
        radix: u32,
        barrier_name: impl Into<String>,
        allreduce_name: impl Into<String>,
        bcast_name: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            radix,
            compute_lat: DEFAULT_COMPUTE_LAT,
            barrier_name: barrier_name.into(),
            allreduce_name: allreduce_name.into(),
            bcast_name: bcast_name.into(),
            nodes: Vec::new(),
            pending_acks: Vec::new(),
            staged: Vec::new(),
        }
    }

    fn start_node(&mut self, src: Pe, req: CollectiveRequest, now: u64) {
        let nnodes = req.num_pes.max(1);
        let steps = match req.operation {
            CollectiveOp::Barrier => {
                let algo = BarrierAlgo::parse(&self.barrier_name).unwrap_or_else(|e| panic!("{e}"));
                barrier_steps(algo, src, nnodes, self.radix, 0)
            }
            CollectiveOp::Bcast => {
                let bcast = BcastAlgo::parse(&self.bcast_name).unwrap_or_else(|e| panic!("{e}"));
                bcast_steps(bcast, src, nnodes, self.radix, 0, req.count, req.type_size)
            }
            CollectiveOp::Allreduce => {
                let algo = AllreduceAlgo::parse(&self.allreduce_name).unwrap_or_else(|e| panic!("{e}"));
                let bcast = BcastAlgo::parse(&self.bcast_name).unwrap_or_else(|e| panic!("{e}"));
                allreduce_steps(algo, bcast, src, nnodes, self.radix, 0, req.count, req.type_size)
                    .unwrap_or_else(|e| panic!("{e}"))
            }
            CollectiveOp::Prefix => panic!("collxl: prefix is reserved and has no algorithm"),
        };
        self.nodes[src as usize].start(req, steps, now);
    }

    /// Hands completed nodes' replies straight to `inner`, the same way
    /// `LocalShortcut` drains its loopback queue: this never flows through
    /// this component's own `test`/`get`, since it isn't fabric traffic.
    fn deliver_completed_replies(&mut self, now: u64) {
        for pe in 0..self.nodes.len() as Pe {
            if let Some(req) = self.nodes[pe as usize].take_reply() {
                let reply = CollectiveRequest { is_reply: true, ..req };
                self.inner.eject(pe, Rc::new(Message::Collective(reply)), now);
            }
        }
    }

    fn ensure_staged(&mut self, src: Pe, now: u64) {
        let idx = src as usize;
        if self.staged[idx].is_some() {
            return;
        }
        if let Some(send) = self.nodes[idx].peek_msg() {
            let base = BaseMessage {
                source: src,
                dest: send.dest,
                size: send.size,
                kind: MessageKind::AccelSync,
                is_reply: false,
            };
            self.staged[idx] = Some(Rc::new(Message::Base(base)));
            return;
        }
        if let Some(from) = self.pending_acks[idx].front().copied() {
            let base = BaseMessage { source: src, dest: from, size: ACK_SIZE, kind: MessageKind::AccelSync, is_reply: true };
            self.staged[idx] = Some(Rc::new(Message::Base(base)));
            return;
        }
        while self.inner.test(src, now) {
            let Some(msg) = self.inner.get(src, now) else { break };
            if msg.kind() == MessageKind::CollectiveRequest && !msg.is_reply() {
                self.inner.next(src, now);
                let Message::Collective(req) = (*msg).clone() else {
                    unreachable!("CollectiveRequest kind always wraps Message::Collective")
                };
                self.start_node(src, req, now);
                self.deliver_completed_replies(now);
                if let Some(send) = self.nodes[idx].peek_msg() {
                    let base = BaseMessage {
                        source: src,
                        dest: send.dest,
                        size: send.size,
                        kind: MessageKind::AccelSync,
                        is_reply: false,
                    };
                    self.staged[idx] = Some(Rc::new(Message::Base(base)));
                    return;
                }
                continue;
            }
            self.staged[idx] = Some(msg);
            return;
        }
    }
}

impl WorkloadComponent for CollectiveAccelerator {
    fn init(&mut self, pes: u32) {
        self.inner.init(pes);
        let compute_lat = self.compute_lat;
        self.nodes = (0..pes).map(|pe| AccelNode::new(pe, compute_lat)).collect();
        self.pending_acks = (0..pes).map(|_| VecDeque::new()).collect();
        self.staged = vec![None; pes as usize];
    }

    fn test(&mut self, src: Pe, now: u64) -> bool {
        self.deliver_completed_replies(now);
        self.ensure_staged(src, now);
        self.staged[src as usize].is_some()
    }

    fn get(&mut self, src: Pe, now: u64) -> Option<Rc<Message>> {
        if !self.test(src, now) {
            return None;
        }
        self.staged[src as usize].clone()
    }

    fn next(&mut self, src: Pe, now: u64) {
        let idx = src as usize;
        let Some(msg) = self.staged[idx].take() else { return };
        match &*msg {
            Message::Base(b) if b.kind == MessageKind::AccelSync && !b.is_reply => {
                self.nodes[idx].pop_msg();
            }
            Message::Base(b) if b.kind == MessageKind::AccelSync && b.is_reply => {
                self.pending_acks[idx].pop_front();
            }
            _ => self.inner.next(src, now),
        }
    }

    fn eject(&mut self, dest: Pe, msg: Rc<Message>, now: u64) {
        let base = msg.base();
        if base.kind == MessageKind::AccelSync {
            let idx = dest as usize;
            if base.is_reply {
                self.nodes[idx].reply(base.source, now);
            } else {
                self.nodes[idx].sendin(base.source, now);
                self.pending_acks[idx].push_back(base.source);
            }
            self.deliver_completed_replies(now);
        } else {
            self.inner.eject(dest, msg, now);
        }
    }
}
