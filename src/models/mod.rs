mod analytics;
mod execution;
mod module;
mod organization;
mod project;
mod test_case;
mod user;

pub use analytics::*;
pub use execution::*;
pub use module::*;
pub use organization::*;
pub use project::*;
pub use test_case::*;
pub use user::*;
