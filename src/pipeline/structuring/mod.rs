pub mod types;
pub mod patterns;
pub mod normalize;
pub mod extractor;
pub mod validation;
pub mod confidence;

pub use types::*;
pub use patterns::{address_block, regional_name_pair, FieldRule, Matcher, FIELD_RULES};
pub use normalize::*;
pub use extractor::*;
pub use validation::*;
pub use confidence::*;
