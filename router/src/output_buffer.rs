// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! One per-output FIFO, augmented with the per-input insertion cursors that
//! keep concurrently-draining packets contiguous (`lossy_oq_router.cpp`'s
//! `_SwitchUpdate`/`_SendFlits`).

use crate::list::{Cursor, IntrusiveList};
use flit::{Flit, PacketId, PortId};

/// Per-output FIFO of flits awaiting emission, plus the bookkeeping needed
/// to insert concurrently-arriving flits from different inputs without
/// interleaving their packets.
pub struct OutputBuffer {
    flits: IntrusiveList<Flit>,
    /// `oq_insertion_iters[input]`: where the next body/tail flit from this
    /// input must land to stay contiguous with its predecessor.
    insertion_cursor: Vec<Cursor>,
    /// The input, if any, whose next flit must be prepended to the head
    /// because earlier flits of that packet have already drained.
    head_input: Option<usize>,
    /// Packet id currently draining from the front of the buffer, if any.
    current_pid_in_progress: Option<PacketId>,
}

impl OutputBuffer {
    #[must_use]
    pub fn new(num_inputs: usize) -> Self {
        Self {
            flits: IntrusiveList::new(),
            insertion_cursor: vec![Cursor::End; num_inputs],
            head_input: None,
            current_pid_in_progress: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flits.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flits.len()
    }

    #[must_use]
    pub fn front(&self) -> Option<&Flit> {
        self.flits.front()
    }

    #[must_use]
    pub fn current_pid_in_progress(&self) -> Option<PacketId> {
        self.current_pid_in_progress
    }

    /// Insert a flit drained from the crossbar for input `input`,
    /// maintaining the three-case contiguity state machine from
    /// `_SwitchUpdate`: head-driver, empty-buffer, and mid-buffer insertion.
    pub fn insert(&mut self, input: PortId, flit: Flit) {
        let i = input.index();
        let tail = flit.tail;

        if self.head_input == Some(i) {
            self.flits.push_front(flit);
            if tail {
                self.head_input = None;
                self.insertion_cursor[i] = Cursor::End;
            }
            return;
        }

        if self.flits.is_empty() {
            let key = self.flits.push_front(flit);
            match (self.head_input, tail) {
                (None, false) => {
                    self.head_input = Some(i);
                    self.insertion_cursor[i] = Cursor::End;
                }
                (Some(_), false) => {
                    self.insertion_cursor[i] = Cursor::Node(key);
                }
                (_, true) => {
                    self.insertion_cursor[i] = Cursor::End;
                }
            }
            return;
        }

        let mut cursor = self.insertion_cursor[i];
        if cursor != Cursor::End {
            cursor = self.flits.advance(cursor);
        }
        let key = self.flits.insert_before(cursor, flit);
        self.insertion_cursor[i] = if tail {
            Cursor::End
        } else {
            Cursor::Node(key)
        };
    }

    /// Pop the front flit, adjusting the head-input's cursor first if it
    /// would otherwise be invalidated by the pop (the pre-pop adjustment in
    /// `_SendFlits`).
    pub fn pop_front(&mut self) -> Option<Flit> {
        if let Some(h) = self.head_input {
            let front_key = self.flits.front_key();
            if self.insertion_cursor[h] == front_key.map(Cursor::Node).unwrap_or(Cursor::End) {
                let will_be_tail = self.flits.front().is_some_and(|f| f.tail);
                self.insertion_cursor[h] = if will_be_tail {
                    Cursor::End
                } else {
                    self.flits.advance(self.insertion_cursor[h])
                };
            }
        }
        let flit = self.flits.pop_front()?;
        if flit.head {
            self.current_pid_in_progress = Some(flit.pid);
        }
        if flit.tail {
            self.current_pid_in_progress = None;
        }
        Some(flit)
    }

    /// Front-to-back view for property tests.
    pub fn iter(&self) -> impl Iterator<Item = &Flit> {
        self.flits.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use id::Id;
    use pretty_assertions::assert_eq;

    fn flit(id: u32, pid: u32, head: bool, tail: bool) -> Flit {
        Flit {
            id: Id::from_raw(id),
            pid: Id::from_raw(pid),
            src: Id::from_raw(0),
            dest: Id::from_raw(1),
            vc: Id::from_raw(0),
            cl: 0,
            head,
            tail,
            size: 1,
            packet_seq_num: 0,
            watch: false,
            scheduled_crossbar_exit: None,
        }
    }

    #[test]
    fn single_input_packet_stays_contiguous() {
        let mut buf = OutputBuffer::new(2);
        let input = PortId::from_raw(0);
        buf.insert(input, flit(1, 100, true, false));
        buf.insert(input, flit(2, 100, false, false));
        buf.insert(input, flit(3, 100, false, true));
        let order: Vec<u32> = buf.iter().map(|f| f.id.into_raw()).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn interleaved_inputs_remain_contiguous_per_packet() {
        let mut buf = OutputBuffer::new(2);
        let in0 = PortId::from_raw(0);
        let in1 = PortId::from_raw(1);

        // Packet A (input 0) starts streaming in.
        buf.insert(in0, flit(1, 10, true, false));
        // Packet B (input 1) arrives behind it.
        buf.insert(in1, flit(2, 20, true, false));
        // More of A arrives; must land right after flit 1, not after 2.
        buf.insert(in0, flit(3, 10, false, false));
        buf.insert(in0, flit(4, 10, false, true));
        buf.insert(in1, flit(5, 20, false, true));

        let order: Vec<u32> = buf.iter().map(|f| f.id.into_raw()).collect();
        assert_eq!(order, vec![1, 3, 4, 2, 5]);
    }

    #[test]
    fn pop_front_drains_in_order() {
        let mut buf = OutputBuffer::new(1);
        let input = PortId::from_raw(0);
        buf.insert(input, flit(1, 100, true, false));
        buf.insert(input, flit(2, 100, false, true));
        assert_eq!(buf.pop_front().unwrap().id.into_raw(), 1);
        assert_eq!(buf.pop_front().unwrap().id.into_raw(), 2);
        assert!(buf.is_empty());
    }
}
