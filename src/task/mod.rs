pub mod task_models;
pub mod task_repository;

pub use task_models::{Task, TaskField};
pub use task_repository::{InMemoryTaskRepository, TaskStore};
