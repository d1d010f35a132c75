pub mod config;
pub mod runner;
pub mod scheduler;
pub mod tower;

pub use config::{ResolvePolicy, TowerConfig};
pub use runner::{TowerHandle, TowerRunner};
pub use scheduler::{ChannelScheduler, ManualScheduler, Scheduler};
pub use tower::{ControlTower, Outcome};
