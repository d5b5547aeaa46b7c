//! Grouping of base-resolution pixels into coarse spectral regions.
//!
//! A region is one HEALPix pixel at `nside_spec`. In NESTED numbering the
//! base pixels it contains form the contiguous run
//! `region * k .. (region + 1) * k`, with `k = npix_base / npix_spec`; maps are
//! stored in RING order, so every run is translated before it is used to
//! index data.

use crate::domain::ConfigError;
use crate::numerics::healpix::{is_valid_nside, nest_to_ring, nside_to_npix};
use serde::Serialize;

/// Which regions to visit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RegionSelection {
    #[default]
    All,
    Single(usize),
    List(Vec<usize>),
}

impl From<usize> for RegionSelection {
    fn from(region: usize) -> Self {
        Self::Single(region)
    }
}

impl From<Vec<usize>> for RegionSelection {
    fn from(regions: Vec<usize>) -> Self {
        Self::List(regions)
    }
}

impl From<&[usize]> for RegionSelection {
    fn from(regions: &[usize]) -> Self {
        Self::List(regions.to_vec())
    }
}

impl<T: Into<RegionSelection>> From<Option<T>> for RegionSelection {
    fn from(selection: Option<T>) -> Self {
        selection.map_or(Self::All, Into::into)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    #[serde(rename = "region")]
    pub index: usize,
    /// RING-ordered base pixel indices, following NESTED order within the region.
    #[serde(rename = "pixels")]
    pub base_pixels: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialBinning {
    nside_spec: u32,
    nside_base: u32,
    region_count: usize,
    pixels_per_region: usize,
}

impl SpatialBinning {
    pub fn new(nside_spec: u32, nside_base: u32) -> Result<Self, ConfigError> {
        for nside in [nside_spec, nside_base] {
            if !is_valid_nside(nside) {
                return Err(ConfigError::InvalidNside { nside });
            }
        }

        let region_count = nside_to_npix(nside_spec);
        let base_count = nside_to_npix(nside_base);
        if base_count % region_count != 0 {
            return Err(ConfigError::IndivisiblePixelization {
                base_pixels: base_count,
                region_pixels: region_count,
            });
        }

        Ok(Self {
            nside_spec,
            nside_base,
            region_count,
            pixels_per_region: base_count / region_count,
        })
    }

    pub fn nside_spec(&self) -> u32 {
        self.nside_spec
    }

    pub fn nside_base(&self) -> u32 {
        self.nside_base
    }

    pub fn region_count(&self) -> usize {
        self.region_count
    }

    pub fn pixels_per_region(&self) -> usize {
        self.pixels_per_region
    }

    pub fn base_pixels(&self, region: usize) -> Result<Vec<usize>, ConfigError> {
        self.check_region(region)?;
        Ok(self.base_pixels_unchecked(region))
    }

    /// Lazily yields the requested regions; indices are validated up front.
    pub fn regions(&self, selection: impl Into<RegionSelection>) -> Result<Regions, ConfigError> {
        let indices = match selection.into() {
            RegionSelection::All => (0..self.region_count).collect(),
            RegionSelection::Single(region) => vec![region],
            RegionSelection::List(regions) => regions,
        };
        for &region in &indices {
            self.check_region(region)?;
        }

        Ok(Regions {
            binning: *self,
            indices: indices.into_iter(),
        })
    }

    fn check_region(&self, region: usize) -> Result<(), ConfigError> {
        if region >= self.region_count {
            return Err(ConfigError::RegionOutOfRange {
                region,
                region_count: self.region_count,
            });
        }
        Ok(())
    }

    fn base_pixels_unchecked(&self, region: usize) -> Vec<usize> {
        let first = region * self.pixels_per_region;
        (first..first + self.pixels_per_region)
            .map(|nested| nest_to_ring(self.nside_base, nested))
            .collect()
    }
}

/// Iterator over selected regions; clone it to restart.
#[derive(Debug, Clone)]
pub struct Regions {
    binning: SpatialBinning,
    indices: std::vec::IntoIter<usize>,
}

impl Iterator for Regions {
    type Item = Region;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.indices.next()?;
        Some(Region {
            index,
            base_pixels: self.binning.base_pixels_unchecked(index),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.indices.size_hint()
    }
}

impl ExactSizeIterator for Regions {}
