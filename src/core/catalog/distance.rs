//! Metadata distance between a flat field and the shot it should correct.
//!
//! Lower is better and 0 is a perfect match. Different camera bodies never
//! match. A lens mismatch costs `LENS_MISMATCH_PENALTY` but still allows a
//! match.
//!
//! The weights make one f-stop of aperture (an f-number ratio of √2) and a
//! 10% focal-length difference each contribute 1.0.

use crate::error::QueryError;
use serde::Serialize;

/// Weight of the relative focal-length difference
pub const W_FOCAL: f64 = 10.0;

/// Weight of the log2 f-number difference
pub const W_APERTURE: f64 = 2.0;

/// Added when the lens strings differ
pub const LENS_MISMATCH_PENALTY: f64 = 8.0;

/// Scores closer than this are treated as equal
pub const SCORE_EPSILON: f64 = 1e-9;

/// Outcome of comparing a candidate with a query
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Distance {
    /// The candidate can never be used for this query
    NoMatch,
    /// Finite dissimilarity, lower is better
    Score(f64),
}

impl Distance {
    pub fn score(&self) -> Option<f64> {
        match self {
            Distance::NoMatch => None,
            Distance::Score(s) => Some(*s),
        }
    }
}

/// The five fields that take part in matching
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot<'a> {
    pub maker: &'a str,
    pub model: &'a str,
    pub lens: &'a str,
    pub focal_length: f64,
    pub aperture: f64,
}

impl<'a> Shot<'a> {
    pub fn new(
        maker: &'a str,
        model: &'a str,
        lens: &'a str,
        focal_length: f64,
        aperture: f64,
    ) -> Self {
        Self {
            maker,
            model,
            lens,
            focal_length,
            aperture,
        }
    }

    /// Focal length and aperture must be finite and positive
    pub fn validate(&self) -> Result<(), QueryError> {
        for (field, value) in [
            ("focal length", self.focal_length),
            ("aperture", self.aperture),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(QueryError::InvalidMetadata { field, value });
            }
        }
        Ok(())
    }
}

/// Distance of `candidate` to `query`, rejecting an invalid query
pub fn distance(candidate: &Shot<'_>, query: &Shot<'_>) -> Result<Distance, QueryError> {
    query.validate()?;
    Ok(score(candidate, query))
}

/// Distance for a query that was already validated.
///
/// A candidate with an unusable focal length or aperture cannot be scored
/// and yields `NoMatch`.
pub(crate) fn score(candidate: &Shot<'_>, query: &Shot<'_>) -> Distance {
    if candidate.maker != query.maker || candidate.model != query.model {
        return Distance::NoMatch;
    }
    if candidate.validate().is_err() {
        return Distance::NoMatch;
    }

    let d_focal = (candidate.focal_length - query.focal_length).abs() / query.focal_length;
    let d_aperture = (candidate.aperture.log2() - query.aperture.log2()).abs();

    let mut total = W_FOCAL * d_focal + W_APERTURE * d_aperture;
    if candidate.lens != query.lens {
        total += LENS_MISMATCH_PENALTY;
    }

    Distance::Score(total)
}
