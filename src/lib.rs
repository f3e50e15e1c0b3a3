// Copyright 2018-2023 the NMRPack authors. All rights reserved. MIT license.

use std::cmp::Ordering;
use std::hash::Hash;

use capacity_builder::CapacityDisplay;
use capacity_builder::StringAppendable;
use capacity_builder::StringBuilder;
use capacity_builder::StringType;
use deno_error::JsError;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

mod common;
mod range;
pub mod requirement;
pub mod spack;
pub mod specifier;
mod string;

pub use self::range::VersionBound;
pub use self::range::VersionBoundKind;
pub use self::range::VersionRange;
pub use self::range::VersionRangeSet;
pub use self::requirement::dependency_to_version_ranges;
pub use self::requirement::PythonRequirement;
pub use self::spack::format_version_ranges;
pub use self::spack::python_spec_to_spack;
pub use self::spack::PythonSpecToSpackError;
pub use self::specifier::add_star_as_last_component;
pub use self::specifier::expand_version_star;
pub use self::specifier::Operator;
pub use self::specifier::PythonSpecParseError;
pub use self::specifier::VersionPattern;
pub use self::specifier::VersionSpecifier;
pub use self::specifier::VersionSpecifiers;
pub use self::string::SmallStackString;

/// Number of release components every version is extended to before
/// it takes part in range arithmetic.
pub const RELEASE_ARITY: usize = 3;

/// Largest value a single release component may hold.
///
/// Large enough for calendar style versions such as `2023.10`.
pub const MAX_VERSION_COMPONENT: u64 = 9999;

/// Lowest version of the bounded domain (`0.0.0`).
pub static MIN_VERSION: Lazy<Version> =
  Lazy::new(|| Version::new(vec![0; RELEASE_ARITY]));

/// Highest version of the bounded domain (`9999.9999.9999`).
pub static MAX_VERSION: Lazy<Version> =
  Lazy::new(|| Version::new(vec![MAX_VERSION_COMPONENT; RELEASE_ARITY]));

#[derive(Error, Debug, Clone, JsError)]
#[class(type)]
#[error("Invalid version. {source}")]
pub struct VersionParseError {
  #[source]
  pub(crate) source: monch::ParseErrorFailureError,
}

/// A release version such as `1.4.2`.
///
/// Versions compare component-wise with missing trailing components
/// treated as zero, so `1.0` and `1.0.0` are equal.
#[derive(Clone, Debug, CapacityDisplay)]
pub struct Version {
  release: Vec<u64>,
}

impl<'a> StringAppendable<'a> for &'a Version {
  fn append_to_builder<TString: StringType>(
    self,
    builder: &mut StringBuilder<'a, TString>,
  ) {
    for (i, component) in self.release.iter().enumerate() {
      if i > 0 {
        builder.append('.');
      }
      builder.append(*component);
    }
  }
}

impl Serialize for Version {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for Version {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    let text = String::deserialize(deserializer)?;
    match Version::parse(&text) {
      Ok(version) => Ok(version),
      Err(err) => Err(serde::de::Error::custom(err)),
    }
  }
}

impl Version {
  pub fn new(release: Vec<u64>) -> Self {
    Self { release }
  }

  /// Parse a dotted release version like `1`, `1.2` or `1.2.3.4`.
  pub fn parse(text: &str) -> Result<Version, VersionParseError> {
    let text = text.trim();
    monch::with_failure_handling(common::release)(text)
      .map(Version::new)
      .map_err(|source| VersionParseError { source })
  }

  /// The release components as written.
  pub fn release(&self) -> &[u64] {
    &self.release
  }

  fn significant_release(&self) -> &[u64] {
    let len = self
      .release
      .iter()
      .rposition(|component| *component != 0)
      .map(|index| index + 1)
      .unwrap_or(0);
    &self.release[..len]
  }
}

impl PartialEq for Version {
  fn eq(&self, other: &Self) -> bool {
    self.significant_release() == other.significant_release()
  }
}

impl Eq for Version {}

impl Hash for Version {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.significant_release().hash(state);
  }
}

impl PartialOrd for Version {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Version {
  fn cmp(&self, other: &Self) -> Ordering {
    let len = self.release.len().max(other.release.len());
    for i in 0..len {
      let a = self.release.get(i).copied().unwrap_or(0);
      let b = other.release.get(i).copied().unwrap_or(0);
      let cmp_result = a.cmp(&b);
      if cmp_result != Ordering::Equal {
        return cmp_result;
      }
    }
    Ordering::Equal
  }
}

/// Right pads the release with zeros until it has `arity` components.
///
/// Never truncates.
pub fn extend_version_releases(version: &Version, arity: usize) -> Version {
  let mut release = version.release.clone();
  if release.len() < arity {
    release.resize(arity, 0);
  }
  Version { release }
}

/// Adds `step` to the least significant release component, carrying
/// and borrowing across components with a radix of
/// `MAX_VERSION_COMPONENT + 1`.
///
/// The result saturates at `MAX_VERSION` and `MIN_VERSION`, including
/// for releases longer than `RELEASE_ARITY` that would land above
/// `MAX_VERSION`.
pub fn increment_version(version: &Version, step: i64) -> Version {
  let mut release = extend_version_releases(version, RELEASE_ARITY).release;
  let radix = i128::from(MAX_VERSION_COMPONENT) + 1;
  let mut carry = i128::from(step);
  for component in release.iter_mut().rev() {
    if carry == 0 {
      break;
    }
    let value = i128::from(*component) + carry;
    *component = value.rem_euclid(radix) as u64;
    carry = value.div_euclid(radix);
  }
  match carry.cmp(&0) {
    Ordering::Greater => MAX_VERSION.clone(),
    Ordering::Less => Version::new(vec![0; release.len()]),
    Ordering::Equal => {
      let version = Version { release };
      if version > *MAX_VERSION {
        MAX_VERSION.clone()
      } else {
        version
      }
    }
  }
}

/// Drops trailing zero components, keeping at least two.
pub fn trim_version_micros(version: &Version) -> Version {
  let mut release = version.release.clone();
  while release.len() > 2 && release.last() == Some(&0) {
    release.pop();
  }
  Version { release }
}
