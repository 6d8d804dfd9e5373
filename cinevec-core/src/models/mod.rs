pub mod entry;
pub mod movie;

pub use entry::{Metadata, MetadataFilter, MetadataValue, QueryMatch, StoredEntry};
pub use movie::{sample_movies, MovieRecord};
