pub mod entry;
pub mod project;
pub mod user;

pub use entry::*;
pub use project::*;
pub use user::*;
