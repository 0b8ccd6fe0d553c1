//! Partitioning of observation times into fixed-width buckets.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CompositeError, Result};

/// Which edge of a bucket span is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    /// `[start, end)`
    Left,
    /// `(start, end]`
    #[default]
    Right,
}

impl Boundary {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl std::str::FromStr for Boundary {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(format!("unknown boundary '{}', expected left or right", other)),
        }
    }
}

impl std::fmt::Display for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A non-empty group of time-step indices sharing one interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Span start; exclusive for [`Boundary::Right`].
    pub start: DateTime<Utc>,
    /// Span end; exclusive for [`Boundary::Left`].
    pub end: DateTime<Utc>,
    pub boundary: Boundary,
    /// Ascending indices into the timestamp sequence.
    pub indices: Vec<usize>,
}

impl Bucket {
    /// Whether `t` falls in this bucket's span.
    pub fn contains(&self, t: &DateTime<Utc>) -> bool {
        match self.boundary {
            Boundary::Left => *t >= self.start && *t < self.end,
            Boundary::Right => *t > self.start && *t <= self.end,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Group strictly increasing `timestamps` into `interval`-wide buckets.
///
/// Bucket edges sit at `origin + k * interval` (origin defaults to the first
/// timestamp). Timestamps before the origin are left out, and spans without
/// any timestamp produce no bucket.
pub fn bucketize(
    timestamps: &[DateTime<Utc>],
    interval: Duration,
    origin: Option<DateTime<Utc>>,
    boundary: Boundary,
) -> Result<Vec<Bucket>> {
    let width = interval
        .num_microseconds()
        .filter(|&w| w > 0)
        .ok_or_else(|| CompositeError::invalid_interval(format!("{:?}", interval)))?;

    if let Some(index) = timestamps
        .windows(2)
        .position(|pair| pair[1] <= pair[0])
    {
        return Err(CompositeError::NotIncreasing { index: index + 1 });
    }

    let Some(origin) = origin.or_else(|| timestamps.first().copied()) else {
        return Ok(Vec::new());
    };

    let mut buckets: Vec<(i64, Bucket)> = Vec::new();

    for (index, t) in timestamps.iter().enumerate() {
        if *t < origin {
            continue;
        }

        let offset = (*t - origin)
            .num_microseconds()
            .ok_or_else(|| CompositeError::invalid_interval("timestamp too far from origin"))?;

        let key = match boundary {
            Boundary::Left => offset.div_euclid(width),
            // ceil(offset / width) for non-negative offsets
            Boundary::Right => (offset + width - 1).div_euclid(width),
        };

        match buckets.last_mut() {
            Some((last_key, bucket)) if *last_key == key => bucket.indices.push(index),
            _ => {
                let (start, end) = match boundary {
                    Boundary::Left => (key, key + 1),
                    Boundary::Right => (key - 1, key),
                };
                buckets.push((
                    key,
                    Bucket {
                        start: origin + Duration::microseconds(start * width),
                        end: origin + Duration::microseconds(end * width),
                        boundary,
                        indices: vec![index],
                    },
                ));
            }
        }
    }

    Ok(buckets.into_iter().map(|(_, bucket)| bucket).collect())
}
