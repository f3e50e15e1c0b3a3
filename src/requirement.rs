// Copyright 2018-2023 the NMRPack authors. All rights reserved. MIT license.

use std::borrow::Cow;

use capacity_builder::CapacityDisplay;
use capacity_builder::StringAppendable;
use capacity_builder::StringBuilder;
use capacity_builder::StringType;
use monch::*;
use serde::Deserialize;
use serde::Serialize;

use crate::common::comma_separator;
use crate::common::name;
use crate::specifier::raw_specifiers;
use crate::specifier::RawSpecifier;
use crate::PythonSpecParseError;
use crate::SmallStackString;
use crate::VersionRangeSet;
use crate::VersionSpecifiers;

/// A dependency line as found in a package's `requires_dist` metadata,
/// such as `numpy (>=1.16,<2) ; python_version >= "3.8"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, CapacityDisplay)]
pub struct PythonRequirement {
  pub name: SmallStackString,
  pub extras: Vec<SmallStackString>,
  pub specifiers: VersionSpecifiers,
  /// Environment marker text after the `;`, kept verbatim.
  pub marker: Option<String>,
}

impl<'a> StringAppendable<'a> for &'a PythonRequirement {
  fn append_to_builder<TString: StringType>(
    self,
    builder: &mut StringBuilder<'a, TString>,
  ) {
    builder.append(&self.name);
    if !self.extras.is_empty() {
      builder.append('[');
      for (i, extra) in self.extras.iter().enumerate() {
        if i > 0 {
          builder.append(',');
        }
        builder.append(extra);
      }
      builder.append(']');
    }
    builder.append(&self.specifiers);
    if let Some(marker) = &self.marker {
      builder.append("; ");
      builder.append(marker.as_str());
    }
  }
}

impl Serialize for PythonRequirement {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for PythonRequirement {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    let text: Cow<'de, str> = Deserialize::deserialize(deserializer)?;
    match Self::parse(&text) {
      Ok(requirement) => Ok(requirement),
      Err(err) => Err(serde::de::Error::custom(err)),
    }
  }
}

impl PythonRequirement {
  /// Parses a requirement line like `any>=1.0,!=1.3.4` or
  /// `numpy[extra] (>=1.16) ; extra == "test"`.
  pub fn parse(text: &str) -> Result<Self, PythonSpecParseError> {
    let text = text.trim();
    let raw = with_failure_handling(requirement)(text)
      .map_err(|err| PythonSpecParseError::from_failure(text, err))?;
    Ok(PythonRequirement {
      name: SmallStackString::from_str(raw.name),
      extras: raw
        .extras
        .into_iter()
        .map(SmallStackString::from_str)
        .collect(),
      specifiers: VersionSpecifiers::from_raw(raw.specifiers, text)?,
      marker: raw.marker.map(|marker| marker.to_string()),
    })
  }

  /// The versions this requirement accepts. Environment markers are not
  /// evaluated.
  pub fn version_ranges(&self) -> VersionRangeSet {
    if let Some(marker) = &self.marker {
      tracing::debug!(
        package = self.name.as_str(),
        marker = marker.as_str(),
        "ignoring environment marker"
      );
    }
    let ranges = self.specifiers.to_range_set();
    tracing::trace!(
      package = self.name.as_str(),
      specifiers = %self.specifiers,
      ranges = %ranges,
      "computed version ranges"
    );
    ranges
  }

  /// The name of the Spack package providing this requirement.
  ///
  /// Capitals after the first character start a new word, so
  /// `MechanicalSoup` becomes `py-mechanical-soup`.
  pub fn spack_name(&self) -> SmallStackString {
    let mut text = SmallStackString::with_capacity(self.name.len() + 3);
    text.push_str("py-");
    let mut last = None;
    for (i, c) in self.name.chars().enumerate() {
      let c = match c {
        '_' | '.' => '-',
        c => c,
      };
      if i > 0 && c.is_ascii_uppercase() && last != Some('-') {
        text.push('-');
      }
      text.push(c.to_ascii_lowercase());
      last = Some(c);
    }
    text
  }
}

/// Translates a requirement line into the set of versions it accepts.
///
/// The result is empty when the clauses contradict each other.
pub fn dependency_to_version_ranges(
  text: &str,
) -> Result<VersionRangeSet, PythonSpecParseError> {
  PythonRequirement::parse(text).map(|requirement| requirement.version_ranges())
}

struct RawRequirement<'a> {
  name: &'a str,
  extras: Vec<&'a str>,
  specifiers: Vec<RawSpecifier<'a>>,
  marker: Option<&'a str>,
}

// requirement ::= name ( ' ' ) * extras? ( ' ' ) * version-spec marker?
fn requirement(input: &str) -> ParseResult<RawRequirement> {
  let (input, name) = name(input)?;
  let (input, _) = skip_whitespace(input)?;
  let (input, extras) = maybe(extras)(input)?;
  let (input, _) = skip_whitespace(input)?;
  let (input, specifiers) = version_spec(input)?;
  let (input, _) = skip_whitespace(input)?;
  let (input, marker) = maybe(marker)(input)?;
  Ok((
    input,
    RawRequirement {
      name,
      extras: extras.unwrap_or_default(),
      specifiers,
      marker,
    },
  ))
}

// extras ::= '[' ( name ( separator name ) * )? ']'
fn extras(input: &str) -> ParseResult<Vec<&str>> {
  let (input, _) = ch('[')(input)?;
  let (input, _) = skip_whitespace(input)?;
  let (input, extras) = separated_list(name, comma_separator)(input)?;
  let (input, _) = skip_whitespace(input)?;
  match ch(']')(input) {
    Ok((input, _)) => Ok((input, extras)),
    Err(ParseError::Backtrace) => {
      ParseError::fail(input, "Expected ']' to close the extras.")
    }
    Err(err) => Err(err),
  }
}

// version-spec ::= '(' specifiers ')' | specifiers
fn version_spec(input: &str) -> ParseResult<Vec<RawSpecifier>> {
  let Ok((input, _)) = ch('(')(input) else {
    return raw_specifiers(input);
  };
  let (input, _) = skip_whitespace(input)?;
  let (input, specifiers) = raw_specifiers(input)?;
  let (input, _) = skip_whitespace(input)?;
  match ch(')')(input) {
    Ok((input, _)) => Ok((input, specifiers)),
    Err(ParseError::Backtrace) => {
      ParseError::fail(input, "Expected ')' to close the version specifiers.")
    }
    Err(err) => Err(err),
  }
}

// marker ::= ';' ( ' ' ) * any+
fn marker(input: &str) -> ParseResult<&str> {
  let (input, _) = ch(';')(input)?;
  let marker = input.trim();
  if marker.is_empty() {
    return ParseError::fail(input, "Expected an environment marker after ';'.");
  }
  Ok(("", marker))
}
