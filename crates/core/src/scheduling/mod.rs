//! Allocation scheduling: conflict detection, override gating, and
//! resolution.
//!
//! The write path runs detect -> gate -> resolve: the overlap detector finds
//! every existing booking intersecting the new window, the override policy
//! decides whether they may be rewritten, and the resolver plans the
//! trim/split/delete mutations that make the window exclusively available.
//! The [`AllocationService`] orchestrates the three over the repository
//! ports and hands the combined mutation set to the store as one atomic
//! batch.

pub mod overlap;
pub mod policy;
pub mod ports;
pub mod resolver;
pub mod service;

pub use policy::OverrideDecision;
pub use resolver::ResolutionPlan;
pub use service::AllocationService;
