// Copyright 2018-2023 the NMRPack authors. All rights reserved. MIT license.

use std::cmp::Ordering;

use capacity_builder::CapacityDisplay;
use capacity_builder::StringAppendable;
use capacity_builder::StringBuilder;
use capacity_builder::StringType;
use serde::Deserialize;
use serde::Serialize;

use super::extend_version_releases;
use super::increment_version;
use super::Version;
use super::MAX_VERSION;
use super::MIN_VERSION;
use super::RELEASE_ARITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionBoundKind {
  Inclusive,
  Exclusive,
}

impl VersionBoundKind {
  pub fn flip(self) -> Self {
    match self {
      Self::Inclusive => Self::Exclusive,
      Self::Exclusive => Self::Inclusive,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionBound {
  pub kind: VersionBoundKind,
  pub version: Version,
}

impl VersionBound {
  pub fn new(kind: VersionBoundKind, version: Version) -> Self {
    Self { kind, version }
  }

  pub fn inclusive(version: Version) -> Self {
    Self::new(VersionBoundKind::Inclusive, version)
  }

  pub fn exclusive(version: Version) -> Self {
    Self::new(VersionBoundKind::Exclusive, version)
  }

  /// The same point with the opposite kind. This is the bound of the
  /// neighbouring gap when taking a complement.
  fn flipped(&self) -> Self {
    Self::new(self.kind.flip(), self.version.clone())
  }

  /// Gets the lowest version included by this bound when used as the
  /// start of a range.
  pub fn to_inclusive_start(&self) -> Version {
    match self.kind {
      VersionBoundKind::Inclusive => self.version.clone(),
      VersionBoundKind::Exclusive => increment_version(&self.version, 1),
    }
  }

  /// Gets the highest version included by this bound when used as the
  /// end of a range.
  pub fn to_inclusive_end(&self) -> Version {
    match self.kind {
      VersionBoundKind::Inclusive => self.version.clone(),
      VersionBoundKind::Exclusive => increment_version(&self.version, -1),
    }
  }

  fn cmp_as_start(&self, other: &VersionBound) -> Ordering {
    self.version.cmp(&other.version).then_with(|| {
      match (self.kind, other.kind) {
        (VersionBoundKind::Inclusive, VersionBoundKind::Exclusive) => {
          Ordering::Less
        }
        (VersionBoundKind::Exclusive, VersionBoundKind::Inclusive) => {
          Ordering::Greater
        }
        _ => Ordering::Equal,
      }
    })
  }

  fn cmp_as_end(&self, other: &VersionBound) -> Ordering {
    // difference with above is an inclusive end reaches further
    self.version.cmp(&other.version).then_with(|| {
      match (self.kind, other.kind) {
        (VersionBoundKind::Inclusive, VersionBoundKind::Exclusive) => {
          Ordering::Greater
        }
        (VersionBoundKind::Exclusive, VersionBoundKind::Inclusive) => {
          Ordering::Less
        }
        _ => Ordering::Equal,
      }
    })
  }

  fn clamp_start(&self, other: &VersionBound) -> VersionBound {
    match self.cmp_as_start(other) {
      Ordering::Less => other.clone(),
      Ordering::Greater | Ordering::Equal => self.clone(),
    }
  }

  fn clamp_end(&self, other: &VersionBound) -> VersionBound {
    match self.cmp_as_end(other) {
      Ordering::Greater => other.clone(),
      Ordering::Less | Ordering::Equal => self.clone(),
    }
  }
}

/// A non-empty interval of versions within `[MIN_VERSION, MAX_VERSION]`.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, CapacityDisplay,
)]
pub struct VersionRange {
  pub start: VersionBound,
  pub end: VersionBound,
}

impl<'a> StringAppendable<'a> for &'a VersionRange {
  fn append_to_builder<TString: StringType>(
    self,
    builder: &mut StringBuilder<'a, TString>,
  ) {
    builder.append(match self.start.kind {
      VersionBoundKind::Inclusive => '[',
      VersionBoundKind::Exclusive => '(',
    });
    builder.append(&self.start.version);
    builder.append(", ");
    builder.append(&self.end.version);
    builder.append(match self.end.kind {
      VersionBoundKind::Inclusive => ']',
      VersionBoundKind::Exclusive => ')',
    });
  }
}

impl VersionRange {
  /// Creates a range, or `None` when the bounds enclose no version.
  pub fn new(start: VersionBound, end: VersionBound) -> Option<VersionRange> {
    let is_empty = match start.version.cmp(&end.version) {
      Ordering::Less => false,
      Ordering::Equal => {
        start.kind == VersionBoundKind::Exclusive
          || end.kind == VersionBoundKind::Exclusive
      }
      Ordering::Greater => true,
    };
    if is_empty {
      None
    } else {
      Some(VersionRange { start, end })
    }
  }

  /// The whole bounded domain.
  pub fn all() -> VersionRange {
    VersionRange {
      start: VersionBound::inclusive(MIN_VERSION.clone()),
      end: VersionBound::inclusive(MAX_VERSION.clone()),
    }
  }

  /// A closed range holding a single version.
  pub fn point(version: Version) -> VersionRange {
    VersionRange {
      start: VersionBound::inclusive(version.clone()),
      end: VersionBound::inclusive(version),
    }
  }

  pub fn is_all(&self) -> bool {
    self.start.kind == VersionBoundKind::Inclusive
      && self.end.kind == VersionBoundKind::Inclusive
      && self.start.version == *MIN_VERSION
      && self.end.version == *MAX_VERSION
  }

  pub fn satisfies(&self, version: &Version) -> bool {
    self.min_satisfies(version) && self.max_satisfies(version)
  }

  fn min_satisfies(&self, version: &Version) -> bool {
    match version.cmp(&self.start.version) {
      Ordering::Less => false,
      Ordering::Equal => self.start.kind == VersionBoundKind::Inclusive,
      Ordering::Greater => true,
    }
  }

  fn max_satisfies(&self, version: &Version) -> bool {
    match version.cmp(&self.end.version) {
      Ordering::Less => true,
      Ordering::Equal => self.end.kind == VersionBoundKind::Inclusive,
      Ordering::Greater => false,
    }
  }

  /// Gets the lowest and highest versions inside the range.
  ///
  /// Open ends are stepped at the number of components shared by both
  /// ends, so `(1.0, 1.0.0.5)` gives `1.0.0.1` and `1.0.0.4`. The start
  /// is greater than the end when no version fits between them.
  pub fn to_inclusive(&self) -> (Version, Version) {
    let arity = self
      .start
      .version
      .release()
      .len()
      .max(self.end.version.release().len())
      .max(RELEASE_ARITY);
    let extend = |bound: &VersionBound| {
      VersionBound::new(
        bound.kind,
        extend_version_releases(&bound.version, arity),
      )
    };
    (
      extend(&self.start).to_inclusive_start(),
      extend(&self.end).to_inclusive_end(),
    )
  }

  /// Gets the overlap of two ranges, if any.
  pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
    let start = self.start.clamp_start(&other.start);
    let end = self.end.clamp_end(&other.end);
    VersionRange::new(start, end)
  }

  /// Gets if `next`, which starts at or after this range, overlaps or
  /// touches it so the two can be written as one range.
  fn connects_to(&self, next: &VersionRange) -> bool {
    match next.start.version.cmp(&self.end.version) {
      Ordering::Less => true,
      Ordering::Equal => {
        self.end.kind == VersionBoundKind::Inclusive
          || next.start.kind == VersionBoundKind::Inclusive
      }
      Ordering::Greater => false,
    }
  }
}

/// A union of disjoint ranges kept sorted by their start.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, CapacityDisplay,
)]
pub struct VersionRangeSet(Vec<VersionRange>);

impl<'a> StringAppendable<'a> for &'a VersionRangeSet {
  fn append_to_builder<TString: StringType>(
    self,
    builder: &mut StringBuilder<'a, TString>,
  ) {
    match self.0.len() {
      0 => builder.append("()"),
      _ => {
        for (i, range) in self.0.iter().enumerate() {
          if i > 0 {
            builder.append(" | ");
          }
          builder.append(range);
        }
      }
    }
  }
}

impl VersionRangeSet {
  /// Builds a set from arbitrary ranges, sorting them and merging the
  /// ones that overlap or touch.
  pub fn from_ranges(
    ranges: impl IntoIterator<Item = VersionRange>,
  ) -> VersionRangeSet {
    let mut ranges = ranges.into_iter().collect::<Vec<_>>();
    ranges.sort_by(|a, b| a.start.cmp_as_start(&b.start));

    let mut merged: Vec<VersionRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
      match merged.last_mut() {
        Some(last) if last.connects_to(&range) => {
          if range.end.cmp_as_end(&last.end) == Ordering::Greater {
            last.end = range.end;
          }
        }
        _ => merged.push(range),
      }
    }
    VersionRangeSet(merged)
  }

  /// Builds a set holding the range between the bounds, or the empty
  /// set when they enclose no version.
  pub fn from_bounds(
    start: VersionBound,
    end: VersionBound,
  ) -> VersionRangeSet {
    VersionRangeSet(VersionRange::new(start, end).into_iter().collect())
  }

  pub fn all() -> VersionRangeSet {
    VersionRangeSet(vec![VersionRange::all()])
  }

  pub fn none() -> VersionRangeSet {
    VersionRangeSet(Vec::new())
  }

  pub fn ranges(&self) -> &[VersionRange] {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn is_all(&self) -> bool {
    self.0.len() == 1 && self.0[0].is_all()
  }

  pub fn satisfies(&self, version: &Version) -> bool {
    self.0.iter().any(|r| r.satisfies(version))
  }

  /// Gets the versions found in both sets.
  pub fn intersect(&self, other: &VersionRangeSet) -> VersionRangeSet {
    let mut ranges = Vec::new();
    for a in &self.0 {
      for b in &other.0 {
        if let Some(range) = a.intersect(b) {
          ranges.push(range);
        }
      }
    }
    VersionRangeSet::from_ranges(ranges)
  }

  /// Gets the versions found in either set.
  pub fn union(&self, other: &VersionRangeSet) -> VersionRangeSet {
    VersionRangeSet::from_ranges(self.0.iter().chain(&other.0).cloned())
  }

  /// Gets the versions of the bounded domain not found in this set.
  pub fn complement(&self) -> VersionRangeSet {
    let mut ranges = Vec::with_capacity(self.0.len() + 1);
    let mut start = VersionBound::inclusive(MIN_VERSION.clone());
    for range in &self.0 {
      if let Some(gap) = VersionRange::new(start, range.start.flipped()) {
        ranges.push(gap);
      }
      start = range.end.flipped();
    }
    if let Some(gap) =
      VersionRange::new(start, VersionBound::inclusive(MAX_VERSION.clone()))
    {
      ranges.push(gap);
    }
    VersionRangeSet(ranges)
  }
}
