// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `Packetize`: reports a wrapped message's `size()` in flits rather than
//! bytes, accounting for frame fragmentation and per-frame overhead.

use std::rc::Rc;

use pipeline::{Message, Pe, WorkloadComponent};

pub struct Packetize {
    inner: Box<dyn WorkloadComponent>,
    max_payload: u64,
    fabric_overhead: u64,
    flit_size: u64,
}

impl Packetize {
    #[must_use]
    pub fn new(inner: Box<dyn WorkloadComponent>, max_payload: u64, fabric_overhead: u64, flit_size: u64) -> Self {
        Self {
            inner,
            max_payload: max_payload.max(1),
            fabric_overhead,
            flit_size: flit_size.max(1),
        }
    }

    fn flits_for(&self, bytes: u64) -> u64 {
        let frames = bytes.div_ceil(self.max_payload);
        let total = bytes + frames * self.fabric_overhead;
        total.div_ceil(self.flit_size)
    }

    fn wrap(&self, msg: Rc<Message>) -> Rc<Message> {
        let flits = self.flits_for(msg.size());
        Rc::new(Message::Packetized { inner: msg, flits })
    }
}

impl WorkloadComponent for Packetize {
    fn init(&mut self, pes: u32) {
        self.inner.init(pes);
    }

    fn test(&mut self, src: Pe, now: u64) -> bool {
        self.inner.test(src, now)
    }

    fn get(&mut self, src: Pe, now: u64) -> Option<Rc<Message>> {
        self.inner.get(src, now).map(|msg| self.wrap(msg))
    }

    fn next(&mut self, src: Pe, now: u64) {
        self.inner.next(src, now);
    }

    fn eject(&mut self, dest: Pe, msg: Rc<Message>, now: u64) {
        let inner_msg = match &*msg {
            Message::Packetized { inner, .. } => inner.clone(),
            _ => msg,
        };
        self.inner.eject(dest, inner_msg, now);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::generators::random::Random;
    use crate::injection::BernoulliInjectionProcess;
    use crate::traffic::Uniform;
    use pretty_assertions::assert_eq;

    fn stack(packet_bytes: u64) -> Packetize {
        let r#gen = Random::new(
            Box::new(BernoulliInjectionProcess::new(vec![1.0])),
            Box::new(Uniform),
            1,
            packet_bytes,
            false,
            0.0,
        );
        let mut p = Packetize::new(Box::new(r#gen), 64, 8, 16);
        p.init(4);
        p
    }

    #[test]
    fn single_frame_fits_in_one_flit() {
        let p = stack(0);
        // 32 bytes -> 1 frame -> 40 bytes -> ceil(40/16) = 3 flits.
        assert_eq!(p.flits_for(32), 3);
    }

    #[test]
    fn multi_frame_splits_and_adds_overhead_per_frame() {
        let p = stack(0);
        // 100 bytes, 64-byte frames -> 2 frames -> 100 + 16 = 116 -> ceil(116/16) = 8.
        assert_eq!(p.flits_for(100), 8);
    }

    #[test]
    fn get_reports_flits_not_bytes() {
        let mut p = stack(100);
        let msg = p.get(0, 0).unwrap();
        assert_eq!(msg.size(), 8);
    }
}
