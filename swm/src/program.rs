// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A SWM program as a finite instruction sequence rather than an arbitrary
//! coroutine closure: Rust has no stackful coroutines, and representing
//! unstructured host-language control flow generically is out of scope.
//! `Repeat` covers the loop shapes the shipped programs (barrier rings,
//! neighbour exchanges) actually need.

use std::rc::Rc;

pub type Pe = u32;

/// How an op resolves its peer PE at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestExpr {
    Const(Pe),
    RingNext,
    RingPrev,
}

impl DestExpr {
    #[must_use]
    pub fn resolve(self, me: Pe, num_pes: u32) -> Pe {
        match self {
            DestExpr::Const(p) => p,
            DestExpr::RingNext => (me + 1) % num_pes.max(1),
            DestExpr::RingPrev => (me + num_pes.max(1) - 1) % num_pes.max(1),
        }
    }
}

/// One instruction of a SWM program, mirroring the primitives a thread
/// exposes: `work`, `put`/`get`/`getnb`, `send`/`recv`, `quiet`,
/// `thread_yield`, and region-of-interest markers.
#[derive(Debug, Clone)]
pub enum SwmOp {
    Work(u64),
    Put { size: u64, dest: DestExpr },
    Get { size: u64, dest: DestExpr },
    GetNb { size: u64, dest: DestExpr },
    Send { size: u64, dest: DestExpr },
    Recv { src: DestExpr },
    Quiet,
    Yield,
    Marker(i32),
    Repeat { count: u32, body: Rc<Vec<SwmOp>> },
}

impl SwmOp {
    #[must_use]
    pub fn repeat(count: u32, body: Vec<SwmOp>) -> Self {
        SwmOp::Repeat { count, body: Rc::new(body) }
    }
}

/// A complete program, shared by reference across every PE that runs it.
#[derive(Debug, Clone)]
pub struct SwmProgram(pub Rc<Vec<SwmOp>>);

impl SwmProgram {
    #[must_use]
    pub fn new(ops: Vec<SwmOp>) -> Self {
        Self(Rc::new(ops))
    }
}

/// One stack frame of program execution: the op list currently running and
/// how many loop iterations remain.
pub(crate) struct Frame {
    pub ops: Rc<Vec<SwmOp>>,
    pub index: usize,
    pub remaining: u32,
}

/// Call-stack interpreter over a [`SwmProgram`], transparently unrolling
/// `Repeat` frames and yielding the next leaf instruction.
pub(crate) struct Cursor {
    stack: Vec<Frame>,
}

impl Cursor {
    pub fn new(program: &SwmProgram) -> Self {
        Self {
            stack: vec![Frame { ops: program.0.clone(), index: 0, remaining: 1 }],
        }
    }

    /// Pull the next leaf op, or `None` once the program has fully run.
    pub fn next_op(&mut self) -> Option<SwmOp> {
        loop {
            let frame = self.stack.last_mut()?;
            if frame.index >= frame.ops.len() {
                if frame.remaining > 1 {
                    frame.remaining -= 1;
                    frame.index = 0;
                    continue;
                }
                self.stack.pop();
                if self.stack.is_empty() {
                    return None;
                }
                continue;
            }
            let op = frame.ops[frame.index].clone();
            frame.index += 1;
            if let SwmOp::Repeat { count, body } = &op {
                self.stack.push(Frame { ops: body.clone(), index: 0, remaining: *count });
                continue;
            }
            return Some(op);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flat_program_runs_ops_in_order() {
        let program = SwmProgram::new(vec![SwmOp::Work(1), SwmOp::Yield]);
        let mut cursor = Cursor::new(&program);
        assert!(matches!(cursor.next_op(), Some(SwmOp::Work(1))));
        assert!(matches!(cursor.next_op(), Some(SwmOp::Yield)));
        assert!(cursor.next_op().is_none());
    }

    #[test]
    fn repeat_runs_body_count_times() {
        let program = SwmProgram::new(vec![SwmOp::repeat(3, vec![SwmOp::Yield])]);
        let mut cursor = Cursor::new(&program);
        for _ in 0..3 {
            assert!(matches!(cursor.next_op(), Some(SwmOp::Yield)));
        }
        assert!(cursor.next_op().is_none());
    }

    #[test]
    fn nested_repeat_unrolls_correctly() {
        let program = SwmProgram::new(vec![SwmOp::repeat(2, vec![SwmOp::repeat(2, vec![SwmOp::Work(1)])])]);
        let mut cursor = Cursor::new(&program);
        for _ in 0..4 {
            assert!(matches!(cursor.next_op(), Some(SwmOp::Work(1))));
        }
        assert!(cursor.next_op().is_none());
    }
}
