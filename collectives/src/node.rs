// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-node interpreter running one node's flattened [`AccelStep`] sequence.
//! `Send` and `LocalReduce` execute inline and never suspend; `RecvFrom`,
//! `RecvAny`, `RecvMultiple` and `RecvReplies` suspend until a matching
//! fabric arrival (`sendin`) or outstanding-send ack (`reply`) resumes them,
//! the same division the original draws between steps that call `sink()`
//! and steps that don't.

use std::collections::VecDeque;

use pipeline::{CollectiveRequest, Pe};
use tracing::trace;

use crate::algorithm::AccelStep;

/// Reduction payloads are charged for compute in whole cacheline-sized
/// chunks, matching the original's hard-coded constant rather than a
/// configurable knob.
const CACHELINE: u64 = 64;

/// One pending outbound sync message: destination, payload size, whether it
/// carries data (`true`) or is a bare signal (`false`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSend {
    pub dest: Pe,
    pub size: u64,
    pub is_payload: bool,
}

pub struct AccelNode {
    me: Pe,
    req: Option<CollectiveRequest>,
    steps: Vec<AccelStep>,
    pc: usize,
    net_inq: VecDeque<Pe>,
    net_outq: VecDeque<SyncSend>,
    net_replyq: VecDeque<Pe>,
    reduce_count: u64,
    compute_lat: u64,
    xl_time: u64,
    done: bool,
    reply_ready: bool,
}

impl AccelNode {
    #[must_use]
    pub fn new(me: Pe, compute_lat: u64) -> Self {
        Self {
            me,
            req: None,
            steps: Vec::new(),
            pc: 0,
            net_inq: VecDeque::new(),
            net_outq: VecDeque::new(),
            net_replyq: VecDeque::new(),
            reduce_count: 0,
            compute_lat,
            xl_time: 0,
            done: true,
            reply_ready: false,
        }
    }

    pub fn start(&mut self, req: CollectiveRequest, steps: Vec<AccelStep>, now: u64) {
        self.req = Some(req);
        self.steps = steps;
        self.pc = 0;
        self.net_inq.clear();
        self.net_outq.clear();
        self.net_replyq.clear();
        self.reduce_count = 0;
        self.xl_time = 0;
        self.done = false;
        self.reply_ready = false;
        self.step(now);
    }

    fn step(&mut self, now: u64) {
        while self.pc < self.steps.len() {
            match self.steps[self.pc] {
                AccelStep::Send { dest, size, is_payload } => {
                    self.net_outq.push_back(SyncSend { dest, size, is_payload });
                    self.net_replyq.push_back(dest);
                    self.pc += 1;
                }
                AccelStep::RecvFrom { src } => {
                    if let Some(pos) = self.net_inq.iter().position(|from| *from == src) {
                        self.net_inq.remove(pos);
                        self.pc += 1;
                    } else {
                        return;
                    }
                }
                AccelStep::RecvAny => {
                    if self.net_inq.pop_front().is_some() {
                        self.pc += 1;
                    } else {
                        return;
                    }
                }
                AccelStep::RecvMultiple { n } => {
                    if self.net_inq.len() >= n as usize {
                        self.net_inq.clear();
                        self.pc += 1;
                    } else {
                        return;
                    }
                }
                AccelStep::RecvReplies => {
                    if self.net_replyq.is_empty() {
                        self.pc += 1;
                    } else {
                        return;
                    }
                }
                AccelStep::LocalReduce => {
                    self.reduce_count += 1;
                    if let Some(req) = &self.req {
                        let bytes = u64::from(req.count) * u64::from(req.type_size);
                        let lines = bytes.div_ceil(CACHELINE);
                        self.xl_time += lines * self.compute_lat;
                    }
                    self.pc += 1;
                }
            }
        }
        trace!(pe = self.me, time = now, "collective accelerator node done");
        self.done = true;
        self.reply_ready = true;
    }

    pub fn has_msg(&self) -> bool {
        !self.net_outq.is_empty()
    }

    pub fn peek_msg(&self) -> Option<SyncSend> {
        self.net_outq.front().copied()
    }

    /// Removes the front outbound message without re-running `step`: the
    /// node only advances past a send once the fabric has accepted it, not
    /// once it has produced it.
    pub fn pop_msg(&mut self) -> Option<SyncSend> {
        self.net_outq.pop_front()
    }

    pub fn sendin(&mut self, src: Pe, now: u64) {
        self.net_inq.push_back(src);
        self.step(now);
    }

    pub fn reply(&mut self, from: Pe, now: u64) {
        if let Some(pos) = self.net_replyq.iter().position(|dest| *dest == from) {
            self.net_replyq.remove(pos);
        }
        self.step(now);
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn reduce_count(&self) -> u64 {
        self.reduce_count
    }

    /// Cumulative local-reduction compute latency charged so far, in cycles.
    pub fn xl_time(&self) -> u64 {
        self.xl_time
    }

    /// Consumes the completed request, handing back the payload for the
    /// local reply. Returns `None` until [`Self::is_done`].
    pub fn take_reply(&mut self) -> Option<CollectiveRequest> {
        if !self.reply_ready {
            return None;
        }
        self.reply_ready = false;
        self.req.take()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pipeline::CollectiveOp;

    fn req(me: Pe) -> CollectiveRequest {
        CollectiveRequest { source: me, operation: CollectiveOp::Barrier, num_pes: 1, count: 0, type_size: 0, is_reply: false }
    }

    #[test]
    fn node_with_no_steps_completes_immediately() {
        let mut node = AccelNode::new(0, 4);
        node.start(req(0), Vec::new(), 0);
        assert!(node.is_done());
        assert!(node.take_reply().is_some());
    }

    #[test]
    fn recv_from_blocks_until_the_matching_source_arrives() {
        let mut node = AccelNode::new(0, 4);
        node.start(req(0), vec![AccelStep::RecvFrom { src: 3 }], 0);
        assert!(!node.is_done());
        node.sendin(2, 0);
        assert!(!node.is_done());
        node.sendin(3, 0);
        assert!(node.is_done());
    }

    #[test]
    fn send_is_queued_without_blocking_and_waits_for_its_reply() {
        let mut node = AccelNode::new(0, 4);
        node.start(req(0), vec![AccelStep::Send { dest: 1, size: 64, is_payload: true }, AccelStep::RecvReplies], 0);
        assert!(!node.is_done());
        assert!(node.has_msg());
        let sent = node.pop_msg().unwrap();
        assert_eq!(sent.dest, 1);
        assert!(!node.is_done());
        node.reply(1, 0);
        assert!(node.is_done());
    }

    #[test]
    fn recv_multiple_drains_once_the_threshold_is_met() {
        let mut node = AccelNode::new(0, 4);
        node.start(req(0), vec![AccelStep::RecvMultiple { n: 2 }], 0);
        node.sendin(1, 0);
        assert!(!node.is_done());
        node.sendin(2, 0);
        assert!(node.is_done());
    }

    #[test]
    fn local_reduce_counts_without_blocking() {
        let mut node = AccelNode::new(0, 4);
        node.start(req(0), vec![AccelStep::LocalReduce, AccelStep::LocalReduce], 0);
        assert!(node.is_done());
        assert_eq!(node.reduce_count(), 2);
    }

    #[test]
    fn local_reduce_charges_ceil_cachelines_times_compute_lat() {
        let mut node = AccelNode::new(0, 4);
        let mut big_req = req(0);
        big_req.count = 10;
        big_req.type_size = 16; // 160 bytes -> 3 cachelines
        node.start(big_req, vec![AccelStep::LocalReduce], 0);
        assert_eq!(node.xl_time(), 12);
    }
}
