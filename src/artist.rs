//! Artists and the genre-based artist distance.

use crate::genre::GenreDistanceComputer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Distance used when two artists share no comparable genre pair.
pub const MAXIMAL_ARTIST_DISTANCE: f64 = 1.0;

/// A catalog artist. Equality and hashing use the id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    /// Genre labels; order is irrelevant.
    pub genres: Vec<String>,
}

impl PartialEq for Artist {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Artist {}

impl Hash for Artist {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Artist {
    pub fn new(id: impl Into<String>, name: impl Into<String>, genres: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            genres: genres.into_iter().map(Into::into).collect(),
        }
    }

    /// Distance to `other` judged by their closest genre pair.
    ///
    /// Zero for the same artist. Otherwise the minimum genre distance over the
    /// cross product of both genre sets, skipping unknown genres. Falls back to
    /// [`MAXIMAL_ARTIST_DISTANCE`] when no known pair exists.
    #[must_use]
    pub fn distance(&self, other: &Artist, genres: &GenreDistanceComputer) -> f64 {
        if self == other {
            return 0.0;
        }

        self.genres
            .iter()
            .flat_map(|own| {
                other
                    .genres
                    .iter()
                    .filter_map(move |theirs| genres.compute_distance(own, theirs))
            })
            .fold(None, |closest: Option<f64>, distance| {
                Some(closest.map_or(distance, |c| c.min(distance)))
            })
            .unwrap_or(MAXIMAL_ARTIST_DISTANCE)
    }
}

/// Artists resolved from the catalog, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ArtistIndex {
    artists: HashMap<String, Artist>,
}

impl ArtistIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, artist: Artist) {
        self.artists.insert(artist.id.clone(), artist);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Artist> {
        self.artists.get(id)
    }

    /// Resolves `ids` in order, silently skipping ids without a record.
    #[must_use]
    pub fn resolve<'a>(&'a self, ids: &[String]) -> Vec<&'a Artist> {
        ids.iter().filter_map(|id| self.artists.get(id)).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artists.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }
}

impl FromIterator<Artist> for ArtistIndex {
    fn from_iter<I: IntoIterator<Item = Artist>>(iter: I) -> Self {
        let mut index = Self::new();
        for artist in iter {
            index.insert(artist);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genre::{GenrePoint, GenreTable};
    use approx::assert_relative_eq;

    fn computer() -> GenreDistanceComputer {
        GenreDistanceComputer::new(GenreTable::from_points([
            ("rock", GenrePoint { x: 0.0, y: 0.0, r: 0.0, g: 0.0, b: 0.0 }),
            ("punk", GenrePoint { x: 0.1, y: 0.0, r: 0.0, g: 0.0, b: 0.0 }),
            ("jazz", GenrePoint { x: 1.0, y: 1.0, r: 0.5, g: 0.5, b: 0.5 }),
        ]))
    }

    #[test]
    fn test_same_artist_is_zero_even_without_genres() {
        let genres = computer();
        let a = Artist::new("a", "A", Vec::<String>::new());
        let renamed = Artist::new("a", "Other name", ["jazz"]);
        assert_eq!(a.distance(&renamed, &genres), 0.0);
    }

    #[test]
    fn test_closest_genre_pair_wins() {
        let genres = computer();
        let a = Artist::new("a", "A", ["rock", "jazz"]);
        let b = Artist::new("b", "B", ["punk"]);
        let expected = (0.01_f64 / 5.0).sqrt();
        assert_relative_eq!(a.distance(&b, &genres), expected, epsilon = 1e-12);
        assert_relative_eq!(b.distance(&a, &genres), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_genres_are_skipped() {
        let genres = computer();
        let a = Artist::new("a", "A", ["polka", "jazz"]);
        let b = Artist::new("b", "B", ["jazz", "zydeco"]);
        assert_eq!(a.distance(&b, &genres), 0.0);
    }

    #[test]
    fn test_no_comparable_pair_is_maximal() {
        let genres = computer();
        let empty = Artist::new("a", "A", Vec::<String>::new());
        let rock = Artist::new("b", "B", ["rock"]);
        let unknown = Artist::new("c", "C", ["polka"]);
        assert_eq!(empty.distance(&rock, &genres), MAXIMAL_ARTIST_DISTANCE);
        assert_eq!(rock.distance(&unknown, &genres), MAXIMAL_ARTIST_DISTANCE);
    }

    #[test]
    fn test_index_resolves_known_ids_in_order() {
        let index: ArtistIndex = [
            Artist::new("a", "A", ["rock"]),
            Artist::new("b", "B", ["jazz"]),
        ]
        .into_iter()
        .collect();

        let ids = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
        let resolved: Vec<&str> = index.resolve(&ids).iter().map(|a| a.id.as_str()).collect();
        assert_eq!(resolved, vec!["b", "a"]);
        assert_eq!(index.len(), 2);
    }
}
