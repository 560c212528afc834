pub mod allergens;
pub mod api;

pub use allergens::{AllergenFlag, AllergenTags, parse_filter};
