// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Traffic-signature builders for each collective algorithm: given the
//! static parameters of one invocation (node index, node count, radix,
//! payload shape) every algorithm's message pattern is fully determined
//! ahead of time, so it is built as a flat [`AccelStep`] sequence rather
//! than interpreted from branching control flow. Only the genuine waits
//! (`RecvFrom`, `RecvAny`, `RecvMultiple`, `RecvReplies`) suspend the node
//! that runs this sequence; everything else executes inline.

use pipeline::Pe;

use crate::error::CollectiveError;
use crate::tree::build_tree;

const SIGNAL_SIZE: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelStep {
    Send { dest: Pe, size: u64, is_payload: bool },
    RecvFrom { src: Pe },
    RecvAny,
    RecvMultiple { n: u32 },
    RecvReplies,
    LocalReduce,
}

fn signal(dest: Pe) -> AccelStep {
    AccelStep::Send { dest, size: SIGNAL_SIZE, is_payload: false }
}

fn payload(dest: Pe, size: u64) -> AccelStep {
    AccelStep::Send { dest, size, is_payload: true }
}

/// `n` repetitions of "wait for one arrival from anyone, then reduce it".
fn recv_and_reduce(n: u32, steps: &mut Vec<AccelStep>) {
    for _ in 0..n {
        steps.push(AccelStep::RecvAny);
        steps.push(AccelStep::LocalReduce);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierAlgo {
    Linear,
    Tree,
    All2all,
    Dissem,
    Butterfly,
}

impl BarrierAlgo {
    pub fn parse(name: &str) -> Result<Self, CollectiveError> {
        match name {
            "linear" => Ok(Self::Linear),
            "tree" => Ok(Self::Tree),
            "all2all" => Ok(Self::All2all),
            "dissem" => Ok(Self::Dissem),
            "butterfly" => Ok(Self::Butterfly),
            other => Err(CollectiveError::UnknownAlgorithm { kind: "barrier", name: other.to_owned() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllreduceAlgo {
    Ring,
    Tree,
    Recdbl,
    Rabenseifner,
}

impl AllreduceAlgo {
    pub fn parse(name: &str) -> Result<Self, CollectiveError> {
        match name {
            "ring" => Ok(Self::Ring),
            "tree" => Ok(Self::Tree),
            "recdbl" => Ok(Self::Recdbl),
            "rabenseifner" => Ok(Self::Rabenseifner),
            other => Err(CollectiveError::UnknownAlgorithm { kind: "reduce", name: other.to_owned() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcastAlgo {
    Linear,
    Tree,
}

impl BcastAlgo {
    pub fn parse(name: &str) -> Result<Self, CollectiveError> {
        match name {
            "linear" => Ok(Self::Linear),
            "tree" => Ok(Self::Tree),
            other => Err(CollectiveError::UnknownAlgorithm { kind: "broadcast", name: other.to_owned() }),
        }
    }
}

#[must_use]
pub fn barrier_steps(algo: BarrierAlgo, me: Pe, nnodes: u32, radix: u32, root: Pe) -> Vec<AccelStep> {
    let mut steps = Vec::new();
    match algo {
        BarrierAlgo::Linear => {
            if me == root {
                steps.push(AccelStep::RecvMultiple { n: nnodes - 1 });
                for i in 0..nnodes {
                    if i != root {
                        steps.push(signal(i));
                    }
                }
            } else {
                steps.push(signal(root));
                steps.push(AccelStep::RecvFrom { src: root });
            }
        }
        BarrierAlgo::All2all => {
            for rn in 0..nnodes {
                if rn != me {
                    steps.push(signal(rn));
                }
            }
            steps.push(AccelStep::RecvMultiple { n: nnodes - 1 });
        }
        BarrierAlgo::Tree => {
            let (parent, children) = build_tree(me, nnodes, radix);
            if !children.is_empty() {
                steps.push(AccelStep::RecvMultiple { n: children.len() as u32 });
                if parent != me {
                    steps.push(signal(parent));
                    steps.push(AccelStep::RecvFrom { src: parent });
                }
                for c in &children {
                    steps.push(signal(*c));
                }
            } else {
                steps.push(signal(parent));
                steps.push(AccelStep::RecvFrom { src: parent });
            }
        }
        BarrierAlgo::Dissem => {
            let mut distance = 1;
            while distance < nnodes {
                let to = (me + distance) % nnodes;
                let from = (me + nnodes - distance % nnodes) % nnodes;
                steps.push(signal(to));
                steps.push(AccelStep::RecvFrom { src: from });
                distance <<= 1;
            }
        }
        BarrierAlgo::Butterfly => {
            let mut distance = 1;
            while distance < nnodes {
                let grp = me / (distance * 2);
                let to = ((me + distance) % (distance * 2)) + grp * (distance * 2);
                steps.push(signal(to));
                steps.push(AccelStep::RecvMultiple { n: 1 });
                distance <<= 1;
            }
        }
    }
    steps
}

#[must_use]
pub fn bcast_steps(algo: BcastAlgo, me: Pe, nnodes: u32, radix: u32, root: Pe, count: u32, type_size: u32) -> Vec<AccelStep> {
    let mut steps = Vec::new();
    let size = u64::from(count) * u64::from(type_size);
    match algo {
        BcastAlgo::Linear => {
            if me == root {
                for i in 1..nnodes {
                    steps.push(payload(i, size));
                }
                for i in 1..nnodes {
                    steps.push(signal(i));
                }
            } else {
                steps.push(AccelStep::RecvFrom { src: root });
            }
        }
        BcastAlgo::Tree => {
            let (parent, children) = build_tree(me, nnodes, radix);
            if !children.is_empty() {
                if parent != me {
                    steps.push(AccelStep::RecvFrom { src: parent });
                }
                for c in &children {
                    steps.push(payload(*c, size));
                }
                for c in &children {
                    steps.push(signal(*c));
                }
            } else {
                steps.push(AccelStep::RecvFrom { src: parent });
            }
        }
    }
    steps
}

#[must_use]
pub fn allreduce_steps(
    algo: AllreduceAlgo,
    bcast: BcastAlgo,
    me: Pe,
    nnodes: u32,
    radix: u32,
    root: Pe,
    count: u32,
    type_size: u32,
) -> Result<Vec<AccelStep>, CollectiveError> {
    if algo == AllreduceAlgo::Rabenseifner {
        return Err(CollectiveError::Unimplemented { name: "rabenseifner all-reduce" });
    }
    if count == 0 {
        return Ok(Vec::new());
    }
    let mut steps = Vec::new();
    let size = u64::from(count) * u64::from(type_size);
    match algo {
        AllreduceAlgo::Ring => {
            let peer_send = (me + 1) % nnodes;
            let peer_recv = (me + nnodes - 1) % nnodes;
            for _ in 0..nnodes.saturating_sub(1) {
                steps.push(payload(peer_send, size));
                steps.push(signal(peer_send));
                steps.push(AccelStep::RecvFrom { src: peer_recv });
                steps.push(AccelStep::LocalReduce);
            }
            for _ in 0..nnodes.saturating_sub(1) {
                steps.push(payload(peer_send, size));
                steps.push(signal(peer_send));
                steps.push(AccelStep::RecvFrom { src: peer_recv });
            }
            steps.push(AccelStep::RecvReplies);
        }
        AllreduceAlgo::Tree => {
            let (parent, children) = build_tree(me, nnodes, radix);
            if !children.is_empty() {
                steps.push(payload(me, size));
                for c in &children {
                    steps.push(signal(*c));
                }
                recv_and_reduce(children.len() as u32, &mut steps);
            }
            if parent != me {
                steps.push(AccelStep::RecvFrom { src: parent });
                steps.push(payload(parent, size));
                steps.push(signal(parent));
            }
            steps.extend(bcast_steps(bcast, me, nnodes, radix, parent, count, type_size));
        }
        AllreduceAlgo::Recdbl => {
            let mut log2_proc = 1u32;
            let mut pow2_proc = 2u32;
            let mut i = nnodes >> 1;
            while i != 1 {
                i >>= 1;
                pow2_proc <<= 1;
                log2_proc += 1;
            }
            if me >= pow2_proc {
                let peer = me - pow2_proc;
                steps.push(AccelStep::RecvFrom { src: peer });
                steps.push(payload(peer, size));
                steps.push(signal(peer));
                steps.push(AccelStep::RecvFrom { src: peer });
            } else {
                if me < nnodes - pow2_proc {
                    let peer = me + pow2_proc;
                    steps.push(signal(peer));
                    steps.push(AccelStep::RecvFrom { src: peer });
                    steps.push(AccelStep::LocalReduce);
                }
                for i in 0..log2_proc {
                    let peer = me ^ (1 << i);
                    if me < peer {
                        steps.push(signal(peer));
                        steps.push(AccelStep::RecvFrom { src: peer });
                        steps.push(payload(peer, size));
                        steps.push(signal(peer));
                    } else {
                        steps.push(AccelStep::RecvFrom { src: peer });
                        steps.push(payload(peer, size));
                        steps.push(signal(peer));
                        steps.push(AccelStep::RecvFrom { src: peer });
                    }
                    steps.push(AccelStep::LocalReduce);
                }
                if me < nnodes - pow2_proc {
                    let peer = me + pow2_proc;
                    steps.push(payload(peer, size));
                    steps.push(signal(peer));
                }
            }
        }
        AllreduceAlgo::Rabenseifner => unreachable!("rejected above"),
    }
    Ok(steps)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn barrier_dissemination_on_eight_nodes_sends_n_log2_n_messages() {
        let nnodes = 8;
        let total: usize =
            (0..nnodes).map(|me| barrier_steps(BarrierAlgo::Dissem, me, nnodes, 2, 0).len() / 2).sum();
        assert_eq!(total, (nnodes as usize) * 3);
    }

    #[test]
    fn allreduce_ring_on_four_nodes_performs_six_puts_and_six_signals() {
        let steps = allreduce_steps(AllreduceAlgo::Ring, BcastAlgo::Linear, 0, 4, 2, 0, 16, 4).unwrap();
        let puts = steps.iter().filter(|s| matches!(s, AccelStep::Send { is_payload: true, .. })).count();
        let signals = steps.iter().filter(|s| matches!(s, AccelStep::Send { is_payload: false, .. })).count();
        assert_eq!(puts, 6);
        assert_eq!(signals, 6);
        let reduces = steps.iter().filter(|s| matches!(s, AccelStep::LocalReduce)).count();
        assert_eq!(reduces, 3);
    }

    #[test]
    fn broadcast_tree_traffic_matches_the_spanning_tree_shape() {
        let nnodes = 8;
        for me in 0..nnodes {
            let steps = bcast_steps(BcastAlgo::Tree, me, nnodes, 2, 0, 8, 4);
            let (parent, children) = build_tree(me, nnodes, 2);
            let puts = steps.iter().filter(|s| matches!(s, AccelStep::Send { is_payload: true, .. })).count();
            let signals = steps.iter().filter(|s| matches!(s, AccelStep::Send { is_payload: false, .. })).count();
            assert_eq!(puts, children.len());
            assert_eq!(signals, children.len());
            let recvs = steps.iter().filter(|s| matches!(s, AccelStep::RecvFrom { .. })).count();
            assert_eq!(recvs, usize::from(parent != me));
        }
    }

    #[test]
    fn unknown_algorithm_name_is_rejected() {
        assert!(BarrierAlgo::parse("nonexistent").is_err());
        assert!(AllreduceAlgo::parse("nonexistent").is_err());
        assert!(BcastAlgo::parse("nonexistent").is_err());
    }

    #[test]
    fn rabenseifner_is_rejected_as_unimplemented() {
        let err = allreduce_steps(AllreduceAlgo::Rabenseifner, BcastAlgo::Linear, 0, 4, 2, 0, 16, 4).unwrap_err();
        assert_eq!(err, CollectiveError::Unimplemented { name: "rabenseifner all-reduce" });
    }
}
