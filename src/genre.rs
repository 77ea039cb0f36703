//! Genre embedding table and pairwise genre distances.
//!
//! Every genre label is placed at a 2D position plus a chroma triple taken from an
//! external taxonomy snapshot. Two genres are close when both their position and
//! their colour are close:
//!
//! ```text
//! distance(g, h) = sqrt((dx² + dy² + dr² + dg² + db²) / 5)
//! ```
//!
//! Labels missing from the table yield `None` ("unknown"), never zero and never an
//! error. Results are memoized per unordered pair inside the computer that owns the
//! table; the cache is guarded so the computer can be shared across rayon workers.

use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::RwLock;

/// Cache entries kept before the memo table is flushed.
pub const DEFAULT_CACHE_CAPACITY: usize = 1 << 16;

/// Position and chroma of one genre label, every field already normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenrePoint {
    /// Horizontal position in [0, 1].
    pub x: f64,
    /// Vertical position in [0, 1].
    pub y: f64,
    /// Red chroma in [0, 1/√3].
    pub r: f64,
    /// Green chroma in [0, 1/√3].
    pub g: f64,
    /// Blue chroma in [0, 1/√3].
    pub b: f64,
}

impl GenrePoint {
    #[must_use]
    pub fn distance(&self, other: &GenrePoint) -> f64 {
        let squares = (self.x - other.x).powi(2)
            + (self.y - other.y).powi(2)
            + (self.r - other.r).powi(2)
            + (self.g - other.g).powi(2)
            + (self.b - other.b).powi(2);
        (squares / 5.0).sqrt()
    }
}

/// Immutable label -> embedding lookup, loaded once.
#[derive(Debug, Clone, Default)]
pub struct GenreTable {
    index: HashMap<String, usize>,
    points: Vec<GenrePoint>,
}

impl GenreTable {
    /// Builds a table from points that are already normalized.
    pub fn from_points<I, S>(points: I) -> Self
    where
        I: IntoIterator<Item = (S, GenrePoint)>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for (label, point) in points {
            let label = label.into();
            match table.index.get(&label) {
                Some(&slot) => table.points[slot] = point,
                None => {
                    table.index.insert(label, table.points.len());
                    table.points.push(point);
                }
            }
        }
        table
    }

    /// Builds a table from raw snapshot values `[left, top, red, green, blue]`.
    ///
    /// Positions are min-max normalized over the whole table; colour channels
    /// (0-255) are scaled by `1 / (√3 · 255)`.
    #[must_use]
    pub fn from_raw(raw: &BTreeMap<String, [f64; 5]>) -> Self {
        let (min_x, max_x) = min_max(raw.values().map(|v| v[0]));
        let (min_y, max_y) = min_max(raw.values().map(|v| v[1]));
        let colour_factor = 1.0 / (3.0_f64.sqrt() * 255.0);

        Self::from_points(raw.iter().map(|(label, v)| {
            (
                label.clone(),
                GenrePoint {
                    x: normalize(v[0], min_x, max_x),
                    y: normalize(v[1], min_y, max_y),
                    r: colour_factor * v[2],
                    g: colour_factor * v[3],
                    b: colour_factor * v[4],
                },
            )
        }))
    }

    /// Parses a JSON snapshot of the form `{"label": [x, y, r, g, b], ...}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, [f64; 5]> =
            serde_json::from_str(json).context("Genre snapshot is not a map of 5-element arrays")?;
        Ok(Self::from_raw(&raw))
    }

    /// Loads the genre snapshot stored at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read genre table {}", path.display()))?;
        let table = Self::from_json_str(&json)
            .with_context(|| format!("Failed to parse genre table {}", path.display()))?;
        info!("Loaded {} genres from {}", table.len(), path.display());
        Ok(table)
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<&GenrePoint> {
        self.index.get(label).map(|&slot| &self.points[slot])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn slot(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max > min {
        (value - min) / (max - min)
    } else {
        0.0
    }
}

/// Memoizing genre distance oracle.
#[derive(Debug)]
pub struct GenreDistanceComputer {
    table: GenreTable,
    cache: RwLock<HashMap<(usize, usize), f64>>,
    capacity: usize,
}

impl GenreDistanceComputer {
    #[must_use]
    pub fn new(table: GenreTable) -> Self {
        Self::with_capacity(table, DEFAULT_CACHE_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(table: GenreTable, capacity: usize) -> Self {
        Self {
            table,
            cache: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    #[must_use]
    pub fn table(&self) -> &GenreTable {
        &self.table
    }

    /// Distance between two genre labels, or `None` if either label is unknown.
    #[must_use]
    pub fn compute_distance(&self, genre1: &str, genre2: &str) -> Option<f64> {
        let slot1 = self.table.slot(genre1)?;
        let slot2 = self.table.slot(genre2)?;
        let key = (slot1.min(slot2), slot1.max(slot2));

        if let Ok(cache) = self.cache.read() {
            if let Some(&distance) = cache.get(&key) {
                return Some(distance);
            }
        }

        let distance = self.table.points[key.0].distance(&self.table.points[key.1]);

        if let Ok(mut cache) = self.cache.write() {
            if cache.len() >= self.capacity {
                debug!("Genre cache reached {} entries, flushing", cache.len());
                cache.clear();
            }
            cache.insert(key, distance);
        }

        Some(distance)
    }

    /// Number of memoized pairs.
    #[must_use]
    pub fn cached_pairs(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }
}
