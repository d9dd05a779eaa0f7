pub mod catalog;
pub mod export;
pub mod seeding;
pub mod uid;

pub use catalog::{CatalogService, CreatedEntry};
pub use seeding::SeedingService;
