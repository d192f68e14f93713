pub mod engine;
pub mod normalize;

pub use engine::{diff, first_page_unchanged, DiffOutcome};
