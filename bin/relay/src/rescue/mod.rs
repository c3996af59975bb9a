mod coordinator;
mod friendship;

pub use coordinator::{RescueCoordinator, RescueDecline, RescueResult};
pub use friendship::{FriendshipOracle, StaticFriendships};
