// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Shared flit/credit/buffer vocabulary for the router pipeline.
//!
//! A [`Flit`] is the atomic transport unit on a channel; a [`Packet`] is the
//! run of flits sharing a `pid`. [`Buffer`] models the per-input, per-VC
//! queue the router reads from; [`BufferState`] models the downstream
//! credit-accounting view of an output neighbour's buffer.

use std::collections::VecDeque;

use id::Id;
use thiserror::Error;

/// Marker type tagging [`Id`] values that index routers.
pub struct Router;
/// Marker type tagging [`Id`] values that index router ports (inputs or
/// outputs, disambiguated by context).
pub struct Port;
/// Marker type tagging [`Id`] values that index virtual channels within a
/// port.
pub struct Vc;
/// Marker type tagging [`Id`] values that index packets.
pub struct Packet;
/// Marker type tagging [`Id`] values that index individual flits.
pub struct FlitTag;

/// Index of a router in the arena the driver owns.
pub type NodeId = Id<Router>;
/// Index of a port on a router (input or output, disambiguated by context).
pub type PortId = Id<Port>;
/// Index of a virtual channel within a port's buffer.
pub type VcId = Id<Vc>;
/// Index of a packet, shared by every flit belonging to it.
pub type PacketId = Id<Packet>;
/// Index of an individual flit.
pub type FlitId = Id<FlitTag>;

/// Traffic class a flit belongs to; classes partition VCs and buffer
/// accounting but carry no behavior of their own in this core.
pub type TrafficClass = u32;

/// Atomic transport unit on a channel.
///
/// All flits of a packet share `pid`, `src`, `dest`, and `size`; exactly one
/// carries `head`, exactly one carries `tail`. Flits of a packet are never
/// interleaved with flits of another packet on the same `(input, vc)` or
/// `(output buffer, source input)` pair — that precondition is the caller's
/// responsibility, not something this type enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flit {
    pub id: FlitId,
    pub pid: PacketId,
    pub src: NodeId,
    pub dest: NodeId,
    pub vc: VcId,
    pub cl: TrafficClass,
    pub head: bool,
    pub tail: bool,
    /// Flits-per-packet; only meaningful on the head flit.
    pub size: u32,
    pub packet_seq_num: u64,
    /// When set, router stages emit `tracing::trace!` spans for this flit's
    /// lifecycle instead of staying silent.
    pub watch: bool,
    /// Cycle at which this flit is due to leave the crossbar, or `None` if
    /// not yet scheduled (the `-1` sentinel in the source).
    pub scheduled_crossbar_exit: Option<u64>,
}

impl Flit {
    /// A minimal 1-flit packet (head and tail coincide).
    #[must_use]
    pub fn singleton(id: FlitId, pid: PacketId, src: NodeId, dest: NodeId, vc: VcId) -> Self {
        Self {
            id,
            pid,
            src,
            dest,
            vc,
            cl: 0,
            head: true,
            tail: true,
            size: 1,
            packet_seq_num: 0,
            watch: false,
            scheduled_crossbar_exit: None,
        }
    }
}

/// Back-channel token carrying the set of VCs whose downstream buffer slots
/// have been freed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credit {
    pub vcs: Vec<VcId>,
}

impl Credit {
    #[must_use]
    pub fn single(vc: VcId) -> Self {
        Self { vcs: vec![vc] }
    }
}

/// State of a single virtual channel in a per-input [`Buffer`].
///
/// The lossy router only ever drives a VC between `Idle` and `Active`; the
/// other variants exist so the type can be reused by non-lossy routers this
/// core does not implement.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VcState {
    Idle,
    VcAlloc,
    SwAlloc,
    Active,
}

/// Per-VC queue of a [`Buffer`], invariant: `state == Idle` iff `queue` is
/// empty. A head-flit arrival on an idle VC transitions it to `Active`; a
/// tail-flit departure transitions it back to `Idle`.
#[derive(Debug, Default)]
pub struct VcQueue {
    pub state: Option<VcState>,
    pub queue: VecDeque<Flit>,
}

impl VcQueue {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !matches!(self.state, Some(VcState::Active | VcState::VcAlloc | VcState::SwAlloc))
    }
}

/// Per-input buffer: one [`VcQueue`] per virtual channel.
#[derive(Debug, Default)]
pub struct Buffer {
    vcs: Vec<VcQueue>,
}

impl Buffer {
    #[must_use]
    pub fn new(num_vcs: usize) -> Self {
        Self {
            vcs: (0..num_vcs).map(|_| VcQueue::default()).collect(),
        }
    }

    #[must_use]
    pub fn vc(&self, vc: VcId) -> &VcQueue {
        &self.vcs[vc.index()]
    }

    pub fn vc_mut(&mut self, vc: VcId) -> &mut VcQueue {
        &mut self.vcs[vc.index()]
    }

    #[must_use]
    pub fn num_vcs(&self) -> usize {
        self.vcs.len()
    }
}

/// Downstream credit-accounting view of an output neighbour's buffer,
/// keyed by VC. Tracks occupancy against a per-VC limit and the minimum
/// round-trip latency set when the channel was attached.
#[derive(Debug)]
pub struct BufferState {
    limit: Vec<u32>,
    occupancy: Vec<u32>,
    min_round_trip_latency: u64,
}

impl BufferState {
    #[must_use]
    pub fn new(num_vcs: usize, limit: u32) -> Self {
        Self {
            limit: vec![limit; num_vcs],
            occupancy: vec![0; num_vcs],
            min_round_trip_latency: 0,
        }
    }

    #[must_use]
    pub fn is_available(&self, vc: VcId) -> bool {
        self.occupancy[vc.index()] < self.limit[vc.index()]
    }

    pub fn take_buffer(&mut self, vc: VcId) {
        self.occupancy[vc.index()] += 1;
    }

    pub fn send_credit(&mut self, vc: VcId) {
        self.occupancy[vc.index()] = self.occupancy[vc.index()].saturating_sub(1);
    }

    #[must_use]
    pub fn min_round_trip_latency(&self) -> u64 {
        self.min_round_trip_latency
    }

    pub fn set_min_round_trip_latency(&mut self, latency: u64) {
        self.min_round_trip_latency = latency;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn vc_queue_idle_until_active() {
        let mut q = VcQueue::default();
        assert!(q.is_idle());
        q.state = Some(VcState::Active);
        assert!(!q.is_idle());
        q.state = None;
        assert!(q.is_idle());
    }

    #[test]
    fn buffer_state_credit_round_trip() {
        let vc = VcId::from_raw(0);
        let mut state = BufferState::new(1, 2);
        assert!(state.is_available(vc));
        state.take_buffer(vc);
        state.take_buffer(vc);
        assert!(!state.is_available(vc));
        state.send_credit(vc);
        assert!(state.is_available(vc));
    }

    #[test]
    fn buffer_state_send_credit_saturates_at_zero() {
        let vc = VcId::from_raw(0);
        let mut state = BufferState::new(1, 4);
        state.send_credit(vc);
        assert!(state.is_available(vc));
    }

    #[test]
    fn singleton_flit_is_its_own_head_and_tail() {
        let flit = Flit::singleton(
            FlitId::from_raw(0),
            PacketId::from_raw(0),
            NodeId::from_raw(0),
            NodeId::from_raw(1),
            VcId::from_raw(0),
        );
        assert!(flit.head && flit.tail);
        assert_eq!(flit.size, 1);
    }
}

/// A set of candidate output ports a [`RoutingFunction`] may propose.
///
/// The lossy router requires exactly one candidate per call; anything else
/// is a [`RouterError::NonSingletonRoute`].
#[derive(Debug, Clone, Default)]
pub struct OutputSet {
    pub candidates: Vec<PortId>,
}

/// Whether a routing function should resolve VC assignment too (unused by
/// the lossy core, which only reads the output port) or leave it open.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InVcMode {
    Resolve,
    Passthrough,
}

/// `rf(router, flit, input, &mut output_set, in_vc_mode)`: populates an
/// output set whose cardinality must be 1 for lossy operation.
pub trait RoutingFunction {
    fn route(
        &self,
        node: NodeId,
        flit: &Flit,
        input: PortId,
        output_set: &mut OutputSet,
        in_vc_mode: InVcMode,
    );
}

/// `FlitChannel.Receive()/Send(flit)`, both operating on at most one flit
/// per cycle.
pub trait FlitChannel {
    fn send(&mut self, flit: Flit);
    fn receive(&mut self) -> Option<Flit>;
    fn latency(&self) -> u64;
}

/// `CreditChannel.Receive()/Send(credit)`, both operating on at most one
/// credit per cycle.
pub trait CreditChannel {
    fn send(&mut self, credit: Credit);
    fn receive(&mut self) -> Option<Credit>;
    fn latency(&self) -> u64;
}

/// Fatal conditions the router pipeline can hit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    /// A routing function returned a cardinality other than 1.
    #[error("routing function on input {input:?} returned {candidates} candidate outputs, expected exactly 1")]
    NonSingletonRoute { input: PortId, candidates: usize },

    /// A tail flit arrived while `drop_packet_at_input[i]` was still set but
    /// the VC was observed `Idle` — the "should never get here" branch in
    /// the source. Preserved here as a hard internal-invariant violation
    /// rather than silently ignored.
    #[error("inconsistent drop state on input {input:?}: tail flit observed on idle VC while a drop was in progress")]
    InconsistentDropState { input: PortId },
}
