// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The closed tagged message variant workload components pass to each
//! other, replacing open subclassing with wrapper variants that carry an
//! inner message handle plus overridden fields.

use std::rc::Rc;

/// Processing-element index; distinct from a fabric node index once `Mppn`
/// maps several PEs onto one node.
pub type Pe = u32;

/// What a message represents, independent of which layer is carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    AnyRequest,
    GetRequest,
    NbGetRequest,
    PutRequest,
    SendRequest,
    RecvRequest,
    DummyRequest,
    /// A local PE's request into the collective-operations accelerator.
    CollectiveRequest,
    /// A sync message the accelerator exchanges with its peers on other
    /// nodes; distinct from ordinary fabric traffic so a modifier chain
    /// wrapping the accelerator can route `eject` correctly.
    AccelSync,
}

/// Which collective the accelerator is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectiveOp {
    Barrier,
    Allreduce,
    Bcast,
    /// Reserved; constructing an algorithm for it is a configuration error.
    Prefix,
}

/// A local PE's request into (or the accelerator's reply out of) the
/// collective-operations accelerator.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectiveRequest {
    pub source: Pe,
    pub operation: CollectiveOp,
    pub num_pes: u32,
    pub count: u32,
    pub type_size: u32,
    pub is_reply: bool,
}

/// A generator-produced message before any modifier has wrapped it.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseMessage {
    pub source: Pe,
    pub dest: Pe,
    pub size: u64,
    pub kind: MessageKind,
    pub is_reply: bool,
}

impl BaseMessage {
    /// The paired reply: source and dest swap, `is_reply` is set.
    #[must_use]
    pub fn reply(&self) -> Self {
        Self {
            source: self.dest,
            dest: self.source,
            size: self.size,
            kind: self.kind,
            is_reply: true,
        }
    }
}

/// A message at any point in the modifier stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Base(BaseMessage),
    /// `Mppn` wraps a message, reporting node indices instead of PE indices.
    Mppn {
        inner: Rc<Message>,
        translated_source: Pe,
        translated_dest: Pe,
    },
    /// `Packetize` wraps a message, reporting a flit count instead of bytes.
    Packetized { inner: Rc<Message>, flits: u64 },
    /// `SmallMessageCoalescing` bundles several upstream messages into one
    /// fabric-sized message; `eject` de-coalesces by calling upstream
    /// `eject` once per part.
    Coalesced { parts: Vec<Rc<Message>> },
    /// A request into, or reply out of, the collective-operations
    /// accelerator. Addressed to its own source: the accelerator sits
    /// locally between a PE and the fabric, the same way `LocalShortcut`
    /// treats a self-addressed message.
    Collective(CollectiveRequest),
}

impl Message {
    #[must_use]
    pub fn source(&self) -> Pe {
        match self {
            Message::Base(b) => b.source,
            Message::Mppn { translated_source, .. } => *translated_source,
            Message::Packetized { inner, .. } => inner.source(),
            Message::Coalesced { parts } => parts.first().map_or(0, |p| p.source()),
            Message::Collective(r) => r.source,
        }
    }

    #[must_use]
    pub fn dest(&self) -> Pe {
        match self {
            Message::Base(b) => b.dest,
            Message::Mppn { translated_dest, .. } => *translated_dest,
            Message::Packetized { inner, .. } => inner.dest(),
            Message::Coalesced { parts } => parts.first().map_or(0, |p| p.dest()),
            Message::Collective(r) => r.source,
        }
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        match self {
            Message::Base(b) => b.size,
            Message::Mppn { inner, .. } => inner.size(),
            Message::Packetized { flits, .. } => *flits,
            Message::Coalesced { parts } => parts.iter().map(|p| p.size()).sum(),
            Message::Collective(r) => u64::from(r.count) * u64::from(r.type_size),
        }
    }

    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Base(b) => b.kind,
            Message::Mppn { inner, .. } | Message::Packetized { inner, .. } => inner.kind(),
            Message::Coalesced { parts } => parts.first().map_or(MessageKind::DummyRequest, |p| p.kind()),
            Message::Collective(_) => MessageKind::CollectiveRequest,
        }
    }

    #[must_use]
    pub fn is_reply(&self) -> bool {
        match self {
            Message::Base(b) => b.is_reply,
            Message::Mppn { inner, .. } | Message::Packetized { inner, .. } => inner.is_reply(),
            Message::Coalesced { parts } => parts.first().is_some_and(|p| p.is_reply()),
            Message::Collective(r) => r.is_reply,
        }
    }

    /// The innermost [`BaseMessage`], unwrapping every modifier layer. A
    /// [`Message::Collective`] has no natural `BaseMessage` form; it
    /// synthesizes a self-addressed one with `CollectiveRequest` as the kind.
    #[must_use]
    pub fn base(&self) -> BaseMessage {
        match self {
            Message::Base(b) => b.clone(),
            Message::Mppn { inner, .. } | Message::Packetized { inner, .. } => inner.base(),
            Message::Coalesced { parts } => parts.first().expect("coalesced message has at least one part").base(),
            Message::Collective(r) => BaseMessage {
                source: r.source,
                dest: r.source,
                size: self.size(),
                kind: MessageKind::CollectiveRequest,
                is_reply: r.is_reply,
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base(source: Pe, dest: Pe) -> BaseMessage {
        BaseMessage { source, dest, size: 64, kind: MessageKind::GetRequest, is_reply: false }
    }

    #[test]
    fn reply_swaps_source_and_dest() {
        let m = base(1, 2);
        let r = m.reply();
        assert_eq!(r.source, 2);
        assert_eq!(r.dest, 1);
        assert!(r.is_reply);
    }

    #[test]
    fn mppn_wrapper_reports_translated_endpoints() {
        let inner = Rc::new(Message::Base(base(5, 9)));
        let wrapped = Message::Mppn { inner, translated_source: 1, translated_dest: 2 };
        assert_eq!(wrapped.source(), 1);
        assert_eq!(wrapped.dest(), 2);
        assert_eq!(wrapped.base().source, 5);
    }

    #[test]
    fn packetized_size_reports_flits_not_bytes() {
        let inner = Rc::new(Message::Base(base(0, 1)));
        let wrapped = Message::Packetized { inner, flits: 4 };
        assert_eq!(wrapped.size(), 4);
    }

    #[test]
    fn coalesced_size_sums_parts() {
        let a = Rc::new(Message::Base(base(0, 1)));
        let b = Rc::new(Message::Base(base(0, 1)));
        let coalesced = Message::Coalesced { parts: vec![a, b] };
        assert_eq!(coalesced.size(), 128);
    }

    #[test]
    fn collective_request_is_addressed_to_its_own_source() {
        let req = Message::Collective(CollectiveRequest {
            source: 3,
            operation: CollectiveOp::Barrier,
            num_pes: 8,
            count: 0,
            type_size: 0,
            is_reply: false,
        });
        assert_eq!(req.source(), 3);
        assert_eq!(req.dest(), 3);
        assert_eq!(req.kind(), MessageKind::CollectiveRequest);
    }
}
