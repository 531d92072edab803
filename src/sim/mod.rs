//! Concurrent ball simulation
//!
//! Shared-memory, multi-writer design: one motion driver thread per ball,
//! one fixed-rate collision engine, all mutating per-ball state through
//! synchronized accessors. Correctness rests on three locks: the per-ball
//! state mutex, the registry lock, and the global simulation lock that
//! serializes collision cycles against arena resizes.

pub mod ball;
pub mod collision;
pub mod coordinator;
pub mod motion;
pub mod quadtree;

pub use ball::{Ball, BallChange, BallId, ChangeKind, Kinematics};
pub use collision::{Arena, bounce_off_walls, resolve_pair};
pub use coordinator::Simulation;
pub use motion::refresh_interval;
pub use quadtree::{QuadTree, Rect, TreeItem};

pub(crate) use coordinator::join_with_timeout;
