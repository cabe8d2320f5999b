// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `LocalShortcut`: messages a PE addresses to itself never touch the
//! fabric; they are diverted into a loopback delay line and delivered back
//! via `eject` once it expires.

use std::collections::VecDeque;
use std::rc::Rc;

use pipeline::{BaseMessage, Message, MessageKind, Pe, WorkloadComponent};

pub struct LocalShortcut {
    inner: Box<dyn WorkloadComponent>,
    local_latency: u64,
    use_read_write: bool,
    loopback: Vec<VecDeque<(Rc<Message>, u64)>>,
    staged: Vec<Option<Rc<Message>>>,
}

impl LocalShortcut {
    #[must_use]
    pub fn new(inner: Box<dyn WorkloadComponent>, local_latency: u64, use_read_write: bool) -> Self {
        Self {
            inner,
            local_latency,
            use_read_write,
            loopback: Vec::new(),
            staged: Vec::new(),
        }
    }

    fn drain_loopback(&mut self, src: Pe, now: u64) {
        let idx = src as usize;
        while let Some((_, ready_time)) = self.loopback[idx].front() {
            if *ready_time > now {
                break;
            }
            let (msg, _) = self.loopback[idx].pop_front().expect("just peeked");
            self.inner.eject(src, msg, now);
        }
    }

    fn is_local(msg: &Message) -> bool {
        msg.dest() == msg.source() && msg.kind() != MessageKind::DummyRequest
    }

    fn ensure_staged(&mut self, src: Pe, now: u64) {
        let idx = src as usize;
        while self.staged[idx].is_none() && self.inner.test(src, now) {
            let Some(msg) = self.inner.get(src, now) else { break };
            if Self::is_local(&msg) {
                self.inner.next(src, now);
                self.loopback[idx].push_back((msg.clone(), now + self.local_latency));
                if self.use_read_write && !msg.is_reply() {
                    let reply = Rc::new(Message::Base(msg.base().reply()));
                    self.loopback[idx].push_back((reply, now + self.local_latency));
                }
            } else {
                self.staged[idx] = Some(msg);
            }
        }
    }
}

impl WorkloadComponent for LocalShortcut {
    fn init(&mut self, pes: u32) {
        self.inner.init(pes);
        self.loopback = (0..pes).map(|_| VecDeque::new()).collect();
        self.staged = vec![None; pes as usize];
    }

    fn test(&mut self, src: Pe, now: u64) -> bool {
        self.drain_loopback(src, now);
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
        if self.staged[src as usize].take().is_some() {
            self.inner.next(src, now);
        }
    }

    fn eject(&mut self, dest: Pe, msg: Rc<Message>, now: u64) {
        self.inner.eject(dest, msg, now);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Once {
        msg: Option<BaseMessage>,
    }
    impl WorkloadComponent for Once {
        fn init(&mut self, _pes: u32) {}
        fn test(&mut self, _src: Pe, _now: u64) -> bool {
            self.msg.is_some()
        }
        fn get(&mut self, _src: Pe, _now: u64) -> Option<Rc<Message>> {
            self.msg.clone().map(|m| Rc::new(Message::Base(m)))
        }
        fn next(&mut self, _src: Pe, _now: u64) {
            self.msg = None;
        }
        fn eject(&mut self, _dest: Pe, _msg: Rc<Message>, _now: u64) {}
    }

    #[test]
    fn local_message_never_reaches_fabric_test() {
        let once = Once {
            msg: Some(BaseMessage { source: 1, dest: 1, size: 4, kind: MessageKind::GetRequest, is_reply: false }),
        };
        let mut s = LocalShortcut::new(Box::new(once), 2, false);
        s.init(4);
        assert!(!s.test(1, 0));
    }

    #[test]
    fn remote_message_passes_through() {
        let once = Once {
            msg: Some(BaseMessage { source: 1, dest: 2, size: 4, kind: MessageKind::GetRequest, is_reply: false }),
        };
        let mut s = LocalShortcut::new(Box::new(once), 2, false);
        s.init(4);
        assert!(s.test(1, 0));
    }
}
