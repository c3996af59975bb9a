pub mod catalog;
mod explorer;
pub mod interval;
pub mod selection;

pub use explorer::{
    ExplorationScheduler, ExploreStep, ExploringAgent, SchedulerCommand, SchedulerHandle,
    TickReport,
};
