use crate::hamming::{check_width, Backend};
use brisk_core::{BriskError, BriskResult, Descriptors, Match};
use log::trace;
use rayon::prelude::*;

/// Eligibility of every (query row, train row) pair for one train set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchMask {
    rows: usize,
    cols: usize,
    allowed: Vec<bool>,
}

impl MatchMask {
    /// Mask admitting every pair.
    pub fn allow_all(query_rows: usize, train_rows: usize) -> Self {
        Self {
            rows: query_rows,
            cols: train_rows,
            allowed: vec![true; query_rows * train_rows],
        }
    }

    /// Row-major flags, `query_rows` rows of `train_rows` entries.
    pub fn from_vec(query_rows: usize, train_rows: usize, allowed: Vec<bool>) -> BriskResult<Self> {
        if allowed.len() != query_rows * train_rows {
            return Err(BriskError::InvalidMask(format!(
                "{} flags for a {}x{} mask",
                allowed.len(),
                query_rows,
                train_rows
            )));
        }
        Ok(Self {
            rows: query_rows,
            cols: train_rows,
            allowed,
        })
    }

    pub fn query_rows(&self) -> usize {
        self.rows
    }

    pub fn train_rows(&self) -> usize {
        self.cols
    }

    pub fn set(&mut self, query_idx: usize, train_idx: usize, allowed: bool) {
        self.allowed[query_idx * self.cols + train_idx] = allowed;
    }

    #[inline]
    pub fn is_allowed(&self, query_idx: usize, train_idx: usize) -> bool {
        self.allowed[query_idx * self.cols + train_idx]
    }
}

/// Produces matches between a query descriptor set and stored train sets.
///
/// Results hold one list per query row, ascending by distance. With
/// `compact` set, queries without matches are left out; otherwise they
/// keep an empty list so positions follow query indices.
pub trait DescriptorMatcher {
    /// Up to `k` nearest train rows per query.
    fn knn_match(
        &self,
        query: &Descriptors,
        k: usize,
        masks: Option<&[MatchMask]>,
        compact: bool,
    ) -> BriskResult<Vec<Vec<Match>>>;

    /// Every train row closer than `max_distance` per query.
    fn radius_match(
        &self,
        query: &Descriptors,
        max_distance: f32,
        masks: Option<&[MatchMask]>,
        compact: bool,
    ) -> BriskResult<Vec<Vec<Match>>>;
}

/// Exhaustive Hamming matcher over one or more train sets.
///
/// Equal distances are resolved in enumeration order: lower train set
/// index first, then lower row index.
#[derive(Debug, Clone)]
pub struct BruteForceMatcher {
    width: usize,
    train: Vec<Descriptors>,
    backend: Backend,
}

impl BruteForceMatcher {
    /// Matcher for descriptors of `width` bytes.
    pub fn new(width: usize) -> BriskResult<Self> {
        check_width(width)?;
        Ok(Self {
            width,
            train: Vec::new(),
            backend: Backend::detect(),
        })
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Appends a train set; its index is the `img_idx` of its matches.
    pub fn add(&mut self, set: Descriptors) {
        self.train.push(set);
    }

    pub fn clear(&mut self) {
        self.train.clear();
    }

    pub fn train_sets(&self) -> &[Descriptors] {
        &self.train
    }

    /// True when no train set holds a single row.
    pub fn is_empty(&self) -> bool {
        self.train.iter().all(Descriptors::is_empty)
    }

    /// Same width and backend, no train data.
    pub fn clone_empty(&self) -> Self {
        Self {
            width: self.width,
            train: Vec::new(),
            backend: self.backend,
        }
    }

    /// Nearest train row for every query that has one.
    pub fn best_match(&self, query: &Descriptors, masks: Option<&[MatchMask]>) -> BriskResult<Vec<Match>> {
        let results = self.knn_match(query, 1, masks, true)?;
        Ok(results.into_iter().flatten().collect())
    }

    fn validate(&self, query: &Descriptors, masks: Option<&[MatchMask]>) -> BriskResult<()> {
        if query.cols() != self.width {
            return Err(BriskError::QueryWidthMismatch {
                expected: self.width,
                actual: query.cols(),
            });
        }
        for (set, train) in self.train.iter().enumerate() {
            if !train.is_empty() && train.cols() != query.cols() {
                return Err(BriskError::TrainWidthMismatch {
                    set,
                    expected: query.cols(),
                    actual: train.cols(),
                });
            }
        }
        if let Some(masks) = masks {
            if masks.len() != self.train.len() {
                return Err(BriskError::InvalidMask(format!(
                    "{} masks for {} train sets",
                    masks.len(),
                    self.train.len()
                )));
            }
            for (set, (mask, train)) in masks.iter().zip(&self.train).enumerate() {
                if mask.query_rows() != query.rows() || mask.train_rows() != train.rows() {
                    return Err(BriskError::InvalidMask(format!(
                        "mask {} is {}x{}, expected {}x{}",
                        set,
                        mask.query_rows(),
                        mask.train_rows(),
                        query.rows(),
                        train.rows()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Distances from query row `query_idx` to every train row; masked
    /// entries are `None`.
    fn distances(&self, query_idx: usize, row: &[u8], masks: Option<&[MatchMask]>) -> Vec<Vec<Option<u32>>> {
        self.train
            .iter()
            .enumerate()
            .map(|(set, train)| {
                let mask = masks.map(|m| &m[set]);
                train
                    .iter_rows()
                    .enumerate()
                    .map(|(train_idx, train_row)| {
                        let allowed = mask.map_or(true, |m| m.is_allowed(query_idx, train_idx));
                        allowed.then(|| self.backend.distance_unchecked(row, train_row))
                    })
                    .collect()
            })
            .collect()
    }

    fn knn_for_query(&self, query_idx: usize, row: &[u8], k: usize, masks: Option<&[MatchMask]>) -> Vec<Match> {
        let mut candidates = self.distances(query_idx, row, masks);
        let available: usize = candidates.iter().map(Vec::len).sum();
        let mut picked = Vec::with_capacity(k.min(available));
        while picked.len() < k {
            let mut best: Option<(usize, usize, u32)> = None;
            for (set, dists) in candidates.iter().enumerate() {
                for (train_idx, d) in dists.iter().enumerate() {
                    if let Some(d) = *d {
                        if best.map_or(true, |(_, _, bd)| d < bd) {
                            best = Some((set, train_idx, d));
                        }
                    }
                }
            }
            let Some((set, train_idx, distance)) = best else {
                break;
            };
            candidates[set][train_idx] = None;
            picked.push(Match {
                query_idx,
                train_idx,
                img_idx: set,
                distance,
            });
        }
        picked.sort_by_key(|m| m.distance);
        picked
    }

    fn radius_for_query(&self, query_idx: usize, row: &[u8], max_distance: f32, masks: Option<&[MatchMask]>) -> Vec<Match> {
        let mut found: Vec<Match> = self
            .distances(query_idx, row, masks)
            .into_iter()
            .enumerate()
            .flat_map(|(set, dists)| {
                dists.into_iter().enumerate().filter_map(move |(train_idx, d)| {
                    d.filter(|&d| (d as f32) < max_distance).map(|distance| Match {
                        query_idx,
                        train_idx,
                        img_idx: set,
                        distance,
                    })
                })
            })
            .collect();
        found.sort_by_key(|m| m.distance);
        found
    }

    fn per_query<F>(&self, query: &Descriptors, compact: bool, search: F) -> Vec<Vec<Match>>
    where
        F: Fn(usize, &[u8]) -> Vec<Match> + Sync + Send,
    {
        let mut results: Vec<Vec<Match>> = (0..query.rows())
            .into_par_iter()
            .map(|query_idx| search(query_idx, query.row(query_idx)))
            .collect();
        if compact {
            results.retain(|matches| !matches.is_empty());
        }
        results
    }
}

impl DescriptorMatcher for BruteForceMatcher {
    fn knn_match(
        &self,
        query: &Descriptors,
        k: usize,
        masks: Option<&[MatchMask]>,
        compact: bool,
    ) -> BriskResult<Vec<Vec<Match>>> {
        self.validate(query, masks)?;
        let results = self.per_query(query, compact, |query_idx, row| {
            self.knn_for_query(query_idx, row, k, masks)
        });
        trace!(
            "knn_match: {} queries, k={}, {} matches ({})",
            query.rows(),
            k,
            results.iter().map(Vec::len).sum::<usize>(),
            self.backend.name()
        );
        Ok(results)
    }

    fn radius_match(
        &self,
        query: &Descriptors,
        max_distance: f32,
        masks: Option<&[MatchMask]>,
        compact: bool,
    ) -> BriskResult<Vec<Vec<Match>>> {
        self.validate(query, masks)?;
        let results = self.per_query(query, compact, |query_idx, row| {
            self.radius_for_query(query_idx, row, max_distance, masks)
        });
        trace!(
            "radius_match: {} queries, radius={}, {} matches ({})",
            query.rows(),
            max_distance,
            results.iter().map(Vec::len).sum::<usize>(),
            self.backend.name()
        );
        Ok(results)
    }
}
