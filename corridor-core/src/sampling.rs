use std::num::NonZeroUsize;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("downsampling stride must be a positive integer, got {0}")]
pub struct InvalidStride(pub usize);

/// Keep-every-nth factor. A stride of 1 keeps every point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DownsampleStride(NonZeroUsize);

impl DownsampleStride {
    pub const KEEP_ALL: Self = Self(NonZeroUsize::MIN);

    pub fn new(stride: usize) -> Result<Self, InvalidStride> {
        NonZeroUsize::new(stride)
            .map(Self)
            .ok_or(InvalidStride(stride))
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }

    pub fn sampler(&self) -> StrideSampler {
        StrideSampler {
            stride: self.get() as u64,
            seen: 0,
        }
    }
}

impl Default for DownsampleStride {
    fn default() -> Self {
        Self::KEEP_ALL
    }
}

/// Applies a stride to a stream of already-filtered items. The phase carries
/// over between batches, so `k` items fed in any number of batches keep
/// exactly `ceil(k / stride)` of them.
#[derive(Debug, Clone)]
pub struct StrideSampler {
    stride: u64,
    seen: u64,
}

impl StrideSampler {
    pub fn keep_next(&mut self) -> bool {
        let keep = self.seen % self.stride == 0;
        self.seen += 1;
        keep
    }

    pub fn retain<T>(&mut self, items: Vec<T>) -> Vec<T> {
        if self.stride == 1 {
            self.seen += items.len() as u64;
            return items;
        }
        items.into_iter().filter(|_| self.keep_next()).collect()
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_stride_is_rejected() {
        assert_eq!(DownsampleStride::new(0), Err(InvalidStride(0)));
        assert_eq!(DownsampleStride::new(1).unwrap(), DownsampleStride::KEEP_ALL);
    }

    #[test]
    fn every_third_of_seven() {
        let mut sampler = DownsampleStride::new(3).unwrap().sampler();
        let kept = sampler.retain((0..7).collect());
        assert_eq!(kept, vec![0, 3, 6]);
    }

    #[test]
    fn phase_survives_batch_boundaries() {
        for stride in 1..6 {
            for k in 0..40usize {
                let mut sampler = DownsampleStride::new(stride).unwrap().sampler();
                let mut kept = Vec::new();
                // uneven batches, including empty ones
                let mut items: Vec<usize> = (0..k).collect();
                let mut batch = 1;
                while !items.is_empty() {
                    let rest = items.split_off(batch.min(items.len()));
                    kept.extend(sampler.retain(items));
                    kept.extend(sampler.retain(Vec::<usize>::new()));
                    items = rest;
                    batch = batch % 4 + 1;
                }
                assert_eq!(kept.len(), k.div_ceil(stride), "k={k} stride={stride}");
                assert!(kept.iter().all(|i| i % stride == 0));
            }
        }
    }
}
