// Copyright 2018-2023 the NMRPack authors. All rights reserved. MIT license.

use capacity_builder::CapacityDisplay;
use capacity_builder::StringAppendable;
use capacity_builder::StringBuilder;
use capacity_builder::StringType;
use deno_error::JsError;
use thiserror::Error;

use crate::trim_version_micros;
use crate::PythonRequirement;
use crate::PythonSpecParseError;
use crate::Version;
use crate::VersionRangeSet;
use crate::MAX_VERSION;
use crate::MIN_VERSION;

#[derive(Error, Debug, Clone, JsError, PartialEq, Eq)]
pub enum PythonSpecToSpackError {
  #[class(inherit)]
  #[error(transparent)]
  Parse(PythonSpecParseError),
  #[class(type)]
  #[error("Python version specifier '{text}' does not match any version")]
  EmptyRange { text: String },
}

/// A closed range written the way Spack spells versions: `@1.0:1.9`,
/// `@1.0:`, `@:1.9` or `@1.0`. The whole domain renders as nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, CapacityDisplay)]
pub struct SpackVersionRange {
  pub start: Version,
  pub end: Version,
}

impl<'a> StringAppendable<'a> for &'a SpackVersionRange {
  fn append_to_builder<TString: StringType>(
    self,
    builder: &mut StringBuilder<'a, TString>,
  ) {
    let open_start = self.start == *MIN_VERSION;
    let open_end = self.end == *MAX_VERSION;
    match (open_start, open_end) {
      (true, true) => {}
      (false, true) => {
        builder.append('@');
        builder.append(&self.start);
        builder.append(':');
      }
      (true, false) => {
        builder.append("@:");
        builder.append(&self.end);
      }
      (false, false) if self.start == self.end => {
        builder.append('@');
        builder.append(&self.start);
      }
      (false, false) => {
        builder.append('@');
        builder.append(&self.start);
        builder.append(':');
        builder.append(&self.end);
      }
    }
  }
}

/// Comma separated Spack version ranges, such as
/// `@1.0.1:1.3.3,@1.3.5:1.9999.9999`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, CapacityDisplay)]
pub struct SpackVersionRanges(Vec<SpackVersionRange>);

impl<'a> StringAppendable<'a> for &'a SpackVersionRanges {
  fn append_to_builder<TString: StringType>(
    self,
    builder: &mut StringBuilder<'a, TString>,
  ) {
    for (i, range) in self.0.iter().enumerate() {
      if i > 0 {
        builder.append(',');
      }
      builder.append(range);
    }
  }
}

impl std::ops::Deref for SpackVersionRanges {
  type Target = [SpackVersionRange];

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl SpackVersionRanges {
  /// Converts every range to its closed form, dropping the ones with no
  /// version left after the open ends are stepped inwards. Endpoints
  /// lose their trailing zero components.
  pub fn from_range_set(ranges: &VersionRangeSet) -> Self {
    let mut result = Vec::with_capacity(ranges.ranges().len());
    for range in ranges.ranges() {
      let (start, end) = range.to_inclusive();
      if start > end {
        tracing::debug!(
          range = %range,
          "dropping range with no version between its bounds"
        );
        continue;
      }
      result.push(SpackVersionRange {
        start: trim_version_micros(&start),
        end: trim_version_micros(&end),
      });
    }
    Self(result)
  }
}

/// Renders a range set as Spack version constraints.
///
/// An unconstrained set renders as an empty string. So does an empty
/// set, which callers should check for with `is_empty` first.
pub fn format_version_ranges(ranges: &VersionRangeSet) -> String {
  SpackVersionRanges::from_range_set(ranges).to_string()
}

/// Translates a requirement line such as `any>=1.0,<2.0` into Spack
/// version constraints (`@1.0:1.9999.9999`).
pub fn python_spec_to_spack(
  text: &str,
) -> Result<String, PythonSpecToSpackError> {
  let requirement =
    PythonRequirement::parse(text).map_err(PythonSpecToSpackError::Parse)?;
  spack_version_ranges(&requirement, text).map(|ranges| ranges.to_string())
}

impl PythonRequirement {
  /// The Spack dependency for this requirement, like
  /// `py-numpy@1.16:1.9999.9999`.
  pub fn to_spack_spec(&self) -> Result<String, PythonSpecToSpackError> {
    let text = self.to_string();
    let ranges = spack_version_ranges(self, &text)?;
    let name = self.spack_name();
    Ok(
      StringBuilder::<String>::build(|builder| {
        builder.append(&name);
        builder.append(&ranges);
      })
      .unwrap(),
    )
  }
}

fn spack_version_ranges(
  requirement: &PythonRequirement,
  text: &str,
) -> Result<SpackVersionRanges, PythonSpecToSpackError> {
  let ranges =
    SpackVersionRanges::from_range_set(&requirement.version_ranges());
  if ranges.is_empty() {
    return Err(PythonSpecToSpackError::EmptyRange {
      text: text.to_string(),
    });
  }
  Ok(ranges)
}

#[cfg(test)]
mod test {
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::dependency_to_version_ranges;

  #[test]
  fn python_to_spack() {
    #[track_caller]
    fn run_test(input: &str, expected: &str) {
      assert_eq!(python_spec_to_spack(input).unwrap(), expected);
    }

    run_test(
      "any> 1.0, != 1.3.4, < 2.0",
      "@1.0.1:1.3.3,@1.3.5:1.9999.9999",
    );
    run_test("any>=1.0", "@1.0:");
    run_test("any<=1.0", "@:1.0");
    run_test("any", "");
    run_test("any == 1.0.0", "@1.0");
    run_test("any == 1.2.3", "@1.2.3");
    run_test("any ==1.2.*", "@1.2:1.2.9999");
    run_test("any ~=2.2", "@2.2:2.2.9999");
    run_test("any !=2.2", "@:2.1.9999,@2.2.1:");
    run_test(
      "any!=2.2.*, !=4.0",
      "@:2.1.9999,@2.3:3.9999.9999,@4.0.1:",
    );
    run_test("any >=1.0, <2", "@1.0:1.9999.9999");
    run_test("any < 1.0", "@:0.9999.9999");
    run_test("any > 9999.9999.9998", "@9999.9999.9999:");
    run_test("numpy (>=1.16) ; extra == \"x\"", "@1.16:");
    // ends with different lengths step at the longer length
    run_test("any >1.0, <1.0.0.5", "@1.0.0.1:1.0.0.4");
    run_test("any !=1.2.3.4", "@:1.2.3.3,@1.2.3.5:");
    run_test("any >1.2.3.4, <2", "@1.2.3.5:1.9999.9999.9999");
    run_test("any >=1.2.3.4", "@1.2.3.4:");
  }

  #[test]
  fn python_to_spack_errors() {
    assert_eq!(
      python_spec_to_spack("any >2.0, <1.0").unwrap_err(),
      PythonSpecToSpackError::EmptyRange {
        text: "any >2.0, <1.0".to_string(),
      }
    );
    assert_eq!(
      python_spec_to_spack("any >1.0.0.4, <1.0.0.5").unwrap_err(),
      PythonSpecToSpackError::EmptyRange {
        text: "any >1.0.0.4, <1.0.0.5".to_string(),
      }
    );
    // nothing representable between the bounds
    assert_eq!(
      python_spec_to_spack("any >1.0.0, <1.0.1").unwrap_err(),
      PythonSpecToSpackError::EmptyRange {
        text: "any >1.0.0, <1.0.1".to_string(),
      }
    );
    assert_eq!(
      python_spec_to_spack("any ===1.0").unwrap_err(),
      PythonSpecToSpackError::Parse(PythonSpecParseError::UnsupportedOperator {
        operator: "===".to_string(),
        text: "any ===1.0".to_string(),
      })
    );
    let err = python_spec_to_spack("any >=1.0rc1").unwrap_err();
    assert!(matches!(err, PythonSpecToSpackError::Parse(_)), "{err:?}");
    assert!(err.to_string().contains("1.0rc1"), "{err}");
  }

  #[test]
  fn formats_range_sets() {
    #[track_caller]
    fn run_test(input: &str, expected: &str) {
      let ranges = dependency_to_version_ranges(input).unwrap();
      assert_eq!(format_version_ranges(&ranges), expected);
    }

    run_test("any", "");
    run_test("any >1.0", "@1.0.1:");
    run_test("any <=1.0.0.0", "@:1.0");
    run_test("any >1.0.0, <1.0.1", "");
    assert_eq!(format_version_ranges(&VersionRangeSet::none()), "");
  }

  #[test]
  fn closed_ranges_drop_empty_pieces() {
    let ranges = dependency_to_version_ranges("any >1.0, <1.0.1").unwrap();
    assert_eq!(ranges.ranges().len(), 1);
    assert!(SpackVersionRanges::from_range_set(&ranges).is_empty());

    let ranges =
      dependency_to_version_ranges("any >1.0, !=1.0.2, <1.0.4").unwrap();
    let closed = SpackVersionRanges::from_range_set(&ranges);
    assert_eq!(closed.len(), 2);
    assert_eq!(closed.to_string(), "@1.0.1,@1.0.3");

    let ranges = dependency_to_version_ranges("any >1.0, <1.0.0.5").unwrap();
    let closed = SpackVersionRanges::from_range_set(&ranges);
    assert_eq!(closed.len(), 1);
    assert!(closed[0].start <= closed[0].end);
    for text in ["1.0.0.1", "1.0.0.3", "1.0.0.4"] {
      assert!(ranges.satisfies(&Version::parse(text).unwrap()), "{text}");
    }
  }

  #[test]
  fn spack_specs() {
    #[track_caller]
    fn run_test(input: &str, expected: &str) {
      let requirement = PythonRequirement::parse(input).unwrap();
      assert_eq!(requirement.to_spack_spec().unwrap(), expected);
    }

    run_test("numpy (>=1.16,<2)", "py-numpy@1.16:1.9999.9999");
    run_test("MechanicalSoup", "py-mechanical-soup");
    run_test("matplotlib==2.2.5", "py-matplotlib@2.2.5");
    run_test("pytest (>=3.0) ; extra == \"test\"", "py-pytest@3.0:");

    let requirement = PythonRequirement::parse("six >2, <1").unwrap();
    assert_eq!(
      requirement.to_spack_spec().unwrap_err(),
      PythonSpecToSpackError::EmptyRange {
        text: "six>2,<1".to_string(),
      }
    );
  }
}
