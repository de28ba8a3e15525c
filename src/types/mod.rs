//! Record types for the three persisted collections.

pub mod collection;
pub mod student;
pub mod dictionary;
pub mod location;

pub use collection::{Collection, Record};
pub use student::StudentRecord;
pub use dictionary::DictionaryEntry;
pub use location::{Location, LocationId, Edge, MapRecord};
