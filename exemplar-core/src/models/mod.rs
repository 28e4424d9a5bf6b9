pub mod example;
pub mod field;

pub use example::{example_id, Candidate, ExampleMetadata, ExampleRecord, StoreHit, DEFAULT_CATEGORY};
pub use field::{parse_color_list, parse_config_fields, ConfigField};
