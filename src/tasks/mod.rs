//! Task lifecycle: storage, event emission, execution and request handling.
//!
//! A task moves `submitted -> working* -> completed | failed | canceled`.
//! [`TaskUpdater`] is the only producer of a task's events and refuses
//! anything after a terminal state; [`TaskManager`] turns inbound messages
//! into tasks and keeps the stored snapshot in step with the event stream.

pub mod executor;
pub mod manager;
pub mod store;
pub mod updater;

pub use executor::{AgentExecutor, RequestContext};
pub use manager::TaskManager;
pub use store::{InMemoryTaskStore, TaskStore};
pub use updater::TaskUpdater;
