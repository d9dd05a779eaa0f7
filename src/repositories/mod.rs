pub mod entry_repository;
pub mod project_repository;
pub mod user_repository;

pub use entry_repository::EntryRepository;
pub use project_repository::ProjectRepository;
pub use user_repository::*;
