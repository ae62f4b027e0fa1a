//! Reactor machinery: wait contexts, the poller, the runner, prepared handles.
//!
//! # Module Structure
//!
//! - [`wait_context`]: Preparation, checkpoint, memento, and finalization contexts
//! - [`reactor`]: The single OS wait (`Poller`, `SysPoller`, `RecordingPoller`)
//! - [`event`]: Pollable one-bit signals
//! - [`runner`]: The reactor loop
//! - [`prepared`]: Cross-thread task handles and shadow proxies
//! - [`config`], [`builder`], [`env_config`]: Runner configuration

pub mod builder;
pub mod config;
pub mod env_config;
pub mod event;
pub mod prepared;
pub mod reactor;
pub mod runner;
pub mod wait_context;

pub use builder::RunnerBuilder;
pub use config::RunnerConfig;
pub use event::Event;
pub use prepared::PreparedTask;
pub use reactor::{Interest, Poller, Readiness};
pub use runner::{Runner, RunnerHandle, RunnerStats};
pub use wait_context::{Checkpoint, FinishContext, Memento, PrepareContext, Selection};
