use serde::{Deserialize, Serialize};

use crate::models::entry::{Metadata, MetadataValue};

/// A single movie in the demonstration dataset.
///
/// Built once from the static sample list and never mutated; the `id` is
/// unique across the dataset and becomes the stored entry's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub genre: String,
    pub year: i32,
}

impl MovieRecord {
    /// Project the non-vector attributes into store metadata.
    pub fn metadata(&self) -> Metadata {
        Metadata::from([
            ("title".to_string(), MetadataValue::from(self.title.as_str())),
            ("genre".to_string(), MetadataValue::from(self.genre.as_str())),
            ("year".to_string(), MetadataValue::from(i64::from(self.year))),
        ])
    }
}

/// The fixed five-movie sample dataset used by `seed` and `demo`.
pub fn sample_movies() -> Vec<MovieRecord> {
    vec![
        MovieRecord {
            id: "1".to_string(),
            title: "Inception".to_string(),
            description: "A mind-bending thriller about dreams and reality.".to_string(),
            genre: "Sci-Fi".to_string(),
            year: 2010,
        },
        MovieRecord {
            id: "2".to_string(),
            title: "The Matrix".to_string(),
            description: "A hacker discovers the truth about reality.".to_string(),
            genre: "Sci-Fi".to_string(),
            year: 1999,
        },
        MovieRecord {
            id: "3".to_string(),
            title: "The Godfather".to_string(),
            description: "The saga of a crime family and their legacy.".to_string(),
            genre: "Crime".to_string(),
            year: 1972,
        },
        MovieRecord {
            id: "4".to_string(),
            title: "Interstellar".to_string(),
            description: "A team of explorers travels through a wormhole.".to_string(),
            genre: "Sci-Fi".to_string(),
            year: 2014,
        },
        MovieRecord {
            id: "5".to_string(),
            title: "The Social Network".to_string(),
            description: "The story of Facebook's creation.".to_string(),
            genre: "Drama".to_string(),
            year: 2010,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sample_dataset_has_five_unique_ids() {
        let movies = sample_movies();
        assert_eq!(movies.len(), 5);

        let ids: HashSet<&str> = movies.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), 5, "ids must be unique across the dataset");
    }

    #[test]
    fn test_sample_dataset_has_single_drama_entry() {
        let movies = sample_movies();
        let dramas: Vec<&MovieRecord> =
            movies.iter().filter(|m| m.genre == "Drama").collect();

        assert_eq!(dramas.len(), 1);
        assert_eq!(dramas[0].title, "The Social Network");
    }

    #[test]
    fn test_metadata_projection() {
        let movie = &sample_movies()[0];
        let meta = movie.metadata();

        assert_eq!(
            meta.get("title"),
            Some(&MetadataValue::Str("Inception".to_string()))
        );
        assert_eq!(
            meta.get("genre"),
            Some(&MetadataValue::Str("Sci-Fi".to_string()))
        );
        assert_eq!(meta.get("year"), Some(&MetadataValue::Int(2010)));
        assert!(meta.get("description").is_none(), "description stays out of metadata");
    }
}
