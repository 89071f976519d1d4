//! Queue of announced, not yet fetched inventory vectors for a p2p node.
//!
//! [`InvQueue`] is an insertion ordered set: each identifier is held at most once, can be
//! added at either end, looked up in constant time and removed by value. It carries its
//! own cursor ([`InvQueue::front`], [`InvQueue::next`]) which keeps working when the
//! element it last returned is removed.
#![cfg_attr(invqueue_docsrs, feature(doc_auto_cfg))]

pub mod integrity;
#[cfg(feature = "inv")]
pub mod inv;
pub mod queue;

pub use integrity::Violations;
#[cfg(feature = "inv")]
pub use inv::{InvVect, ParseError};
pub use queue::{InvQueue, Iter};
