// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The `random` generator: an injection process decides per-cycle firing,
//! a traffic pattern picks the destination.

use std::rc::Rc;

use pipeline::{BaseMessage, Message, MessageKind, Pe, WorkloadComponent};
use rand::rngs::StdRng;
use rand::SeedableRng;
use stats::WorkloadStats;

use crate::injection::InjectionProcess;
use crate::traffic::TrafficPattern;

pub struct Random {
    injection: Box<dyn InjectionProcess>,
    pattern: Box<dyn TrafficPattern>,
    rng: StdRng,
    num_nodes: u32,
    packet_size: u64,
    use_read_write: bool,
    write_fraction: f64,
    stats: WorkloadStats,

    last_decision_cycle: Vec<Option<u64>>,
    fired_this_cycle: Vec<bool>,
    consumed_this_cycle: Vec<Option<u64>>,
    last_get: Vec<Option<Rc<Message>>>,
}

impl Random {
    #[must_use]
    pub fn new(
        injection: Box<dyn InjectionProcess>,
        pattern: Box<dyn TrafficPattern>,
        seed: u64,
        packet_size: u64,
        use_read_write: bool,
        write_fraction: f64,
    ) -> Self {
        Self {
            injection,
            pattern,
            rng: StdRng::seed_from_u64(seed),
            num_nodes: 0,
            packet_size,
            use_read_write,
            write_fraction,
            stats: WorkloadStats::new("random"),
            last_decision_cycle: Vec::new(),
            fired_this_cycle: Vec::new(),
            consumed_this_cycle: Vec::new(),
            last_get: Vec::new(),
        }
    }

    fn ensure_decided(&mut self, src: Pe, now: u64) {
        let idx = src as usize;
        if self.last_decision_cycle[idx] != Some(now) {
            self.fired_this_cycle[idx] = self.injection.test(src, &mut self.rng);
            self.last_decision_cycle[idx] = Some(now);
            self.last_get[idx] = None;
        }
    }

    fn build_message(&mut self, src: Pe) -> Rc<Message> {
        let dest = self.pattern.dest(src, self.num_nodes, &mut self.rng);
        let kind = if self.use_read_write {
            if rand::Rng::random_bool(&mut self.rng, self.write_fraction) {
                MessageKind::PutRequest
            } else {
                MessageKind::GetRequest
            }
        } else {
            MessageKind::AnyRequest
        };
        Rc::new(Message::Base(BaseMessage {
            source: src,
            dest,
            size: self.packet_size,
            kind,
            is_reply: false,
        }))
    }
}

impl WorkloadComponent for Random {
    fn init(&mut self, pes: u32) {
        self.num_nodes = pes;
        self.last_decision_cycle = vec![None; pes as usize];
        self.fired_this_cycle = vec![false; pes as usize];
        self.consumed_this_cycle = vec![None; pes as usize];
        self.last_get = vec![None; pes as usize];
    }

    fn test(&mut self, src: Pe, now: u64) -> bool {
        self.ensure_decided(src, now);
        let idx = src as usize;
        let available = self.fired_this_cycle[idx] && self.consumed_this_cycle[idx] != Some(now);
        self.stats.record_test(available);
        available
    }

    fn get(&mut self, src: Pe, now: u64) -> Option<Rc<Message>> {
        if !self.test(src, now) {
            return None;
        }
        let idx = src as usize;
        if self.last_get[idx].is_none() {
            self.last_get[idx] = Some(self.build_message(src));
        }
        self.stats.record_get();
        self.last_get[idx].clone()
    }

    fn next(&mut self, src: Pe, now: u64) {
        let idx = src as usize;
        self.consumed_this_cycle[idx] = Some(now);
        self.last_get[idx] = None;
    }

    fn eject(&mut self, _dest: Pe, _msg: Rc<Message>, _now: u64) {
        self.stats.record_eject();
    }
}
