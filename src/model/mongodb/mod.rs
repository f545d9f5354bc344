mod bson;
mod collection;
mod counter;
mod errors;

pub use bson::Id;
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{ensure_position_counter_exists, Counter, QUESTION_POSITION_COUNTER_ID};
pub use errors::is_duplicate_key_error;
