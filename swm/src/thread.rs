// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `SwmThread`: the per-PE resumable state machine driving one SWM
//! program. Every primitive that would suspend a real coroutine (`put`,
//! `get`, `getnb`, `send`, an unmatched `recv`, a non-empty `quiet`,
//! `thread_yield`, a marker) instead returns control to the caller with a
//! pending message; `work` and a matched `recv` run inline.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use pipeline::{BaseMessage, MessageKind, Pe};
use tracing::trace;

use crate::program::{Cursor, SwmOp, SwmProgram};
use crate::roi::RoiTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwmState {
    Ready,
    Message,
    Wait,
    QuietWait,
    Done,
}

/// Fixed per-message overheads, in cycles, charged to the thread's local
/// clock when it issues that primitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overheads {
    pub put: u64,
    pub get: u64,
    pub send: u64,
    pub recv: u64,
}

pub struct SwmThread {
    cursor: Cursor,
    state: SwmState,
    started: bool,
    time: u64,
    me: Pe,
    num_pes: u32,
    overheads: Overheads,
    track_acks: bool,
    outstanding_acks: VecDeque<BaseMessage>,
    recvd: VecDeque<BaseMessage>,
    current: Option<BaseMessage>,
    roi: Rc<RefCell<RoiTracker>>,
    pub put_count: u64,
    pub get_count: u64,
    pub send_count: u64,
    pub reply_count: u64,
}

fn msg(kind: MessageKind, source: Pe, dest: Pe, size: u64) -> BaseMessage {
    BaseMessage { source, dest, size, kind, is_reply: false }
}

impl SwmThread {
    #[must_use]
    pub fn new(
        program: &SwmProgram,
        me: Pe,
        num_pes: u32,
        overheads: Overheads,
        track_acks: bool,
        roi: Rc<RefCell<RoiTracker>>,
    ) -> Self {
        Self {
            cursor: Cursor::new(program),
            state: SwmState::Ready,
            started: false,
            time: 0,
            me,
            num_pes,
            overheads,
            track_acks,
            outstanding_acks: VecDeque::new(),
            recvd: VecDeque::new(),
            current: None,
            roi,
            put_count: 0,
            get_count: 0,
            send_count: 0,
            reply_count: 0,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == SwmState::Done
    }

    #[must_use]
    pub fn state(&self) -> SwmState {
        self.state
    }

    #[must_use]
    pub fn current(&self) -> Option<&BaseMessage> {
        self.current.as_ref()
    }

    pub fn ensure_started(&mut self, now: u64) {
        if !self.started {
            self.started = true;
            self.go(now);
        }
    }

    pub fn go(&mut self, now: u64) {
        self.state = SwmState::Ready;
        self.time = now;
        self.step();
    }

    fn step(&mut self) {
        loop {
            match self.cursor.next_op() {
                None => {
                    self.state = SwmState::Done;
                    self.current = None;
                    trace!(pe = self.me, time = self.time, "swm thread done");
                    return;
                }
                Some(SwmOp::Work(cycles)) => {
                    self.time += cycles;
                }
                Some(op) => {
                    if self.execute_yielding_op(op) {
                        continue;
                    }
                    return;
                }
            }
        }
    }

    /// Executes one suspending primitive. Returns `true` when execution
    /// should continue inline (a matched `recv` or an already-drained
    /// `quiet`), `false` when a message is now pending for the caller.
    fn execute_yielding_op(&mut self, op: SwmOp) -> bool {
        match op {
            SwmOp::Work(_) => unreachable!("handled in step"),
            SwmOp::Put { size, dest } => {
                self.put_count += 1;
                self.time += self.overheads.put;
                let dest = dest.resolve(self.me, self.num_pes);
                self.current = Some(msg(MessageKind::PutRequest, self.me, dest, size));
                self.state = SwmState::Message;
                false
            }
            SwmOp::Get { size, dest } => {
                self.get_count += 1;
                self.time += self.overheads.get;
                let dest = dest.resolve(self.me, self.num_pes);
                self.current = Some(msg(MessageKind::GetRequest, self.me, dest, size));
                self.state = SwmState::Message;
                false
            }
            SwmOp::GetNb { size, dest } => {
                self.get_count += 1;
                self.time += self.overheads.get;
                let dest = dest.resolve(self.me, self.num_pes);
                self.current = Some(msg(MessageKind::NbGetRequest, self.me, dest, size));
                self.state = SwmState::Message;
                false
            }
            SwmOp::Send { size, dest } => {
                self.send_count += 1;
                self.time += self.overheads.send;
                let dest = dest.resolve(self.me, self.num_pes);
                self.current = Some(msg(MessageKind::SendRequest, self.me, dest, size));
                self.state = SwmState::Message;
                false
            }
            SwmOp::Recv { src } => {
                let src = src.resolve(self.me, self.num_pes);
                if let Some(pos) = self.recvd.iter().position(|m| m.source == src) {
                    self.recvd.remove(pos);
                    true
                } else {
                    self.time += self.overheads.recv;
                    self.current = Some(msg(MessageKind::RecvRequest, self.me, src, 0));
                    self.state = SwmState::Wait;
                    false
                }
            }
            SwmOp::Quiet => {
                if let Some(front) = self.outstanding_acks.front() {
                    self.current = Some(front.clone());
                    self.state = SwmState::QuietWait;
                    false
                } else {
                    true
                }
            }
            SwmOp::Yield => {
                self.current = Some(msg(MessageKind::DummyRequest, self.me, self.me, 0));
                self.state = SwmState::Message;
                false
            }
            SwmOp::Marker(id) => {
                self.roi.borrow_mut().on_marker(id);
                self.current = Some(msg(MessageKind::DummyRequest, self.me, self.me, 0));
                self.state = SwmState::Message;
                false
            }
            SwmOp::Repeat { .. } => unreachable!("unrolled by the cursor"),
        }
    }

    pub fn next(&mut self, now: u64) {
        let is_get = matches!(&self.current, Some(c) if c.kind == MessageKind::GetRequest);
        if self.state == SwmState::Message && is_get {
            self.state = SwmState::Wait;
        } else if self.state != SwmState::Wait {
            let is_dummy = matches!(&self.current, Some(c) if c.kind == MessageKind::DummyRequest);
            if self.track_acks && !is_dummy {
                if let Some(c) = self.current.clone() {
                    self.outstanding_acks.push_back(c);
                }
            }
            if !self.is_done() {
                self.go(now);
            }
        }
    }

    fn is_waiting_on(&self, m: &BaseMessage) -> bool {
        self.state == SwmState::Wait
            && matches!(&self.current, Some(w) if w.kind == MessageKind::GetRequest && w.dest == m.source)
    }

    pub fn reply(&mut self, now: u64, reply: &BaseMessage) {
        self.reply_count += 1;
        if self.is_waiting_on(reply) {
            if let Some(pos) = self.outstanding_acks.iter().position(|a| a.dest == reply.source) {
                self.outstanding_acks.remove(pos);
            }
            self.go(now);
        } else if let Some(pos) = self.outstanding_acks.iter().position(|a| a.dest == reply.source) {
            self.outstanding_acks.remove(pos);
            if self.state == SwmState::QuietWait {
                self.go(now);
            }
        }
    }

    pub fn sendin(&mut self, now: u64, sent: BaseMessage) {
        let matched = self.state == SwmState::Wait
            && matches!(&self.current, Some(c) if c.kind == MessageKind::RecvRequest && c.dest == sent.source);
        if matched {
            self.go(now);
        } else {
            self.recvd.push_back(sent);
        }
    }
}
