// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The `SWM` generator: one [`SwmThread`] per PE, exposed through the
//! shared [`pipeline::WorkloadComponent`] contract.

use std::cell::RefCell;
use std::rc::Rc;

use pipeline::{Message, MessageKind, Pe, WorkloadComponent};

use crate::program::SwmProgram;
use crate::roi::RoiTracker;
use crate::thread::{Overheads, SwmState, SwmThread};

pub struct Swm {
    program: SwmProgram,
    overheads: Overheads,
    track_acks: bool,
    roi: Rc<RefCell<RoiTracker>>,
    threads: Vec<SwmThread>,
}

impl Swm {
    #[must_use]
    pub fn new(program: SwmProgram, overheads: Overheads, track_acks: bool) -> Self {
        Self::with_roi(program, overheads, track_acks, RoiTracker::disabled())
    }

    #[must_use]
    pub fn with_roi(program: SwmProgram, overheads: Overheads, track_acks: bool, roi: RoiTracker) -> Self {
        Self { program, overheads, track_acks, roi: Rc::new(RefCell::new(roi)), threads: Vec::new() }
    }

    /// Whether the region of interest configured for this run is currently
    /// active, per the markers any thread has crossed so far.
    #[must_use]
    pub fn roi_active(&self) -> bool {
        self.roi.borrow().roi_active()
    }
}

impl WorkloadComponent for Swm {
    fn init(&mut self, pes: u32) {
        self.threads = (0..pes)
            .map(|pe| SwmThread::new(&self.program, pe, pes, self.overheads, self.track_acks, self.roi.clone()))
            .collect();
    }

    fn test(&mut self, src: Pe, now: u64) -> bool {
        let thread = &mut self.threads[src as usize];
        thread.ensure_started(now);
        thread.state() == SwmState::Message && thread.current().is_some()
    }

    fn get(&mut self, src: Pe, now: u64) -> Option<Rc<Message>> {
        if !self.test(src, now) {
            return None;
        }
        self.threads[src as usize].current().cloned().map(|m| Rc::new(Message::Base(m)))
    }

    fn next(&mut self, src: Pe, now: u64) {
        self.threads[src as usize].next(now);
    }

    fn eject(&mut self, dest: Pe, msg: Rc<Message>, now: u64) {
        let base = msg.base();
        let thread = &mut self.threads[dest as usize];
        if base.is_reply {
            thread.reply(now, &base);
        } else if base.kind == MessageKind::SendRequest {
            thread.sendin(now, base);
        } else {
            thread.reply(now, &base);
        }
    }
}
