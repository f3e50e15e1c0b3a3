// Copyright 2018-2023 the NMRPack authors. All rights reserved. MIT license.

use std::borrow::Cow;

use capacity_builder::CapacityDisplay;
use capacity_builder::StringAppendable;
use capacity_builder::StringBuilder;
use capacity_builder::StringType;
use deno_error::JsError;
use monch::*;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::common::comma_separator;
use crate::common::operator_token;
use crate::common::release_pattern;
use crate::extend_version_releases;
use crate::Version;
use crate::VersionBound;
use crate::VersionParseError;
use crate::VersionRangeSet;
use crate::MAX_VERSION;
use crate::MAX_VERSION_COMPONENT;
use crate::MIN_VERSION;
use crate::RELEASE_ARITY;

#[derive(Error, Debug, Clone, JsError, PartialEq, Eq)]
pub enum PythonSpecParseError {
  #[class(type)]
  #[error("Invalid python version specifier '{text}'. {message}")]
  Parse { text: String, message: String },
  #[class(type)]
  #[error("Unsupported operator '{operator}' in python version specifier '{text}'")]
  UnsupportedOperator { operator: String, text: String },
  #[class(type)]
  #[error("Wildcard versions cannot be used with '{operator}' in python version specifier '{text}'")]
  WildcardNotAllowed { operator: String, text: String },
}

impl PythonSpecParseError {
  pub(crate) fn from_failure(text: &str, err: ParseErrorFailureError) -> Self {
    PythonSpecParseError::Parse {
      text: text.to_string(),
      message: format!("{err:#}"),
    }
  }
}

/// Comparison operator of a version specifier clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
  Equal,
  NotEqual,
  LessThan,
  LessThanOrEqual,
  GreaterThan,
  GreaterThanOrEqual,
  /// `~=`
  Compatible,
}

impl Operator {
  pub fn from_token(token: &str) -> Option<Operator> {
    match token {
      "==" => Some(Operator::Equal),
      "!=" => Some(Operator::NotEqual),
      "<" => Some(Operator::LessThan),
      "<=" => Some(Operator::LessThanOrEqual),
      ">" => Some(Operator::GreaterThan),
      ">=" => Some(Operator::GreaterThanOrEqual),
      "~=" => Some(Operator::Compatible),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Operator::Equal => "==",
      Operator::NotEqual => "!=",
      Operator::LessThan => "<",
      Operator::LessThanOrEqual => "<=",
      Operator::GreaterThan => ">",
      Operator::GreaterThanOrEqual => ">=",
      Operator::Compatible => "~=",
    }
  }
}

/// A release version whose last component may be a `*` wildcard,
/// such as `1.0.*`. A bare `*` matches every version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, CapacityDisplay)]
pub struct VersionPattern {
  pub release: Vec<u64>,
  pub wildcard: bool,
}

impl<'a> StringAppendable<'a> for &'a VersionPattern {
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
    if self.wildcard {
      if !self.release.is_empty() {
        builder.append('.');
      }
      builder.append('*');
    }
  }
}

impl VersionPattern {
  pub fn any() -> Self {
    Self {
      release: Vec::new(),
      wildcard: true,
    }
  }

  pub fn parse(text: &str) -> Result<Self, VersionParseError> {
    with_failure_handling(release_pattern)(text.trim())
      .map_err(|source| VersionParseError { source })
  }

  pub fn is_any(&self) -> bool {
    self.wildcard && self.release.is_empty()
  }

  /// The versions the pattern spans. One version when there is no
  /// wildcard, otherwise the lowest and highest matching versions.
  pub fn expand(&self) -> Vec<Version> {
    let (lower, upper) = self.unextended_bounds();
    if self.wildcard {
      vec![lower, upper]
    } else {
      vec![lower]
    }
  }

  /// Lowest and highest matching versions, both extended to
  /// `RELEASE_ARITY` components.
  pub fn bounds(&self) -> (Version, Version) {
    let (lower, upper) = self.unextended_bounds();
    (
      extend_version_releases(&lower, RELEASE_ARITY),
      extend_version_releases(&upper, RELEASE_ARITY),
    )
  }

  fn unextended_bounds(&self) -> (Version, Version) {
    if self.is_any() {
      return (MIN_VERSION.clone(), MAX_VERSION.clone());
    }
    if !self.wildcard {
      let version = Version::new(self.release.clone());
      return (version.clone(), version);
    }
    let with_last = |component: u64| {
      let mut release = Vec::with_capacity(self.release.len() + 1);
      release.extend_from_slice(&self.release);
      release.push(component);
      Version::new(release)
    };
    (with_last(0), with_last(MAX_VERSION_COMPONENT))
  }
}

/// Expands a version that may end in `.*` into the lowest and highest
/// versions it matches (`1.0.*` gives `1.0.0` and `1.0.9999`). A version
/// without a wildcard is returned unchanged.
pub fn expand_version_star(
  text: &str,
) -> Result<Vec<Version>, VersionParseError> {
  VersionPattern::parse(text).map(|pattern| pattern.expand())
}

/// Replaces the last release component with a wildcard (`1.1` gives `1.*`).
pub fn add_star_as_last_component(version: &Version) -> VersionPattern {
  let release = version.release();
  VersionPattern {
    release: release[..release.len().saturating_sub(1)].to_vec(),
    wildcard: true,
  }
}

/// A single clause such as `>=1.2` or `!=2.2.*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, CapacityDisplay)]
pub struct VersionSpecifier {
  pub operator: Operator,
  pub pattern: VersionPattern,
}

impl<'a> StringAppendable<'a> for &'a VersionSpecifier {
  fn append_to_builder<TString: StringType>(
    self,
    builder: &mut StringBuilder<'a, TString>,
  ) {
    builder.append(self.operator.as_str());
    builder.append(&self.pattern);
  }
}

impl VersionSpecifier {
  /// The versions this clause accepts.
  pub fn to_range_set(&self) -> VersionRangeSet {
    if self.pattern.is_any() {
      return VersionRangeSet::all();
    }

    let (lower, upper) = self.pattern.bounds();
    let min = || VersionBound::inclusive(MIN_VERSION.clone());
    let max = || VersionBound::inclusive(MAX_VERSION.clone());
    match self.operator {
      Operator::Equal => VersionRangeSet::from_bounds(
        VersionBound::inclusive(lower),
        VersionBound::inclusive(upper),
      ),
      Operator::NotEqual => VersionRangeSet::from_bounds(
        VersionBound::inclusive(lower),
        VersionBound::inclusive(upper),
      )
      .complement(),
      Operator::LessThan => {
        VersionRangeSet::from_bounds(min(), VersionBound::exclusive(lower))
      }
      Operator::LessThanOrEqual => {
        VersionRangeSet::from_bounds(min(), VersionBound::inclusive(lower))
      }
      Operator::GreaterThan => {
        VersionRangeSet::from_bounds(VersionBound::exclusive(upper), max())
      }
      Operator::GreaterThanOrEqual => {
        VersionRangeSet::from_bounds(VersionBound::inclusive(upper), max())
      }
      Operator::Compatible => {
        // ~=2.2 allows 2.2.*, after extending to the fixed arity
        let (_, compatible_upper) = add_star_as_last_component(&lower).bounds();
        VersionRangeSet::from_bounds(
          VersionBound::inclusive(lower),
          VersionBound::inclusive(compatible_upper),
        )
      }
    }
  }

  pub fn contains(&self, version: &Version) -> bool {
    self.to_range_set().satisfies(version)
  }
}

/// Comma separated clauses that must all hold, such as `>=1.0, !=1.3.4`.
///
/// No clauses matches every version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, CapacityDisplay)]
pub struct VersionSpecifiers(Vec<VersionSpecifier>);

impl<'a> StringAppendable<'a> for &'a VersionSpecifiers {
  fn append_to_builder<TString: StringType>(
    self,
    builder: &mut StringBuilder<'a, TString>,
  ) {
    for (i, specifier) in self.0.iter().enumerate() {
      if i > 0 {
        builder.append(',');
      }
      builder.append(specifier);
    }
  }
}

impl std::ops::Deref for VersionSpecifiers {
  type Target = [VersionSpecifier];

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl Serialize for VersionSpecifiers {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for VersionSpecifiers {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    let text: Cow<'de, str> = Deserialize::deserialize(deserializer)?;
    match Self::parse(&text) {
      Ok(specifiers) => Ok(specifiers),
      Err(err) => Err(serde::de::Error::custom(err)),
    }
  }
}

impl VersionSpecifiers {
  pub fn new(specifiers: Vec<VersionSpecifier>) -> Self {
    Self(specifiers)
  }

  /// Parses clauses without a package name, like `>=1.0,<2`.
  pub fn parse(text: &str) -> Result<Self, PythonSpecParseError> {
    let text = text.trim();
    let raw = with_failure_handling(raw_specifiers)(text)
      .map_err(|err| PythonSpecParseError::from_failure(text, err))?;
    Self::from_raw(raw, text)
  }

  pub(crate) fn from_raw(
    raw: Vec<RawSpecifier>,
    text: &str,
  ) -> Result<Self, PythonSpecParseError> {
    let mut specifiers = Vec::with_capacity(raw.len());
    for raw in raw {
      let Some(operator) = Operator::from_token(raw.operator) else {
        return Err(PythonSpecParseError::UnsupportedOperator {
          operator: raw.operator.to_string(),
          text: text.to_string(),
        });
      };
      if operator == Operator::Compatible && raw.pattern.wildcard {
        return Err(PythonSpecParseError::WildcardNotAllowed {
          operator: operator.as_str().to_string(),
          text: text.to_string(),
        });
      }
      specifiers.push(VersionSpecifier {
        operator,
        pattern: raw.pattern,
      });
    }
    Ok(Self(specifiers))
  }

  /// The versions accepted by every clause.
  pub fn to_range_set(&self) -> VersionRangeSet {
    self
      .0
      .iter()
      .fold(VersionRangeSet::all(), |ranges, specifier| {
        ranges.intersect(&specifier.to_range_set())
      })
  }

  pub fn contains(&self, version: &Version) -> bool {
    self.0.iter().all(|specifier| specifier.contains(version))
  }
}

/// A clause whose operator has not been validated yet.
#[derive(Debug)]
pub(crate) struct RawSpecifier<'a> {
  pub operator: &'a str,
  pub pattern: VersionPattern,
}

// specifiers ::= ( specifier ( separator specifier ) * )?
pub(crate) fn raw_specifiers(input: &str) -> ParseResult<Vec<RawSpecifier>> {
  let mut specifiers = Vec::new();
  let (mut input, first) = match raw_specifier(input) {
    Ok(result) => result,
    Err(ParseError::Backtrace) => return Ok((input, specifiers)),
    Err(err) => return Err(err),
  };
  specifiers.push(first);
  while let Ok((after_comma, _)) = comma_separator(input) {
    let (rest, specifier) = match raw_specifier(after_comma) {
      Ok(result) => result,
      Err(ParseError::Backtrace) => {
        return ParseError::fail(
          after_comma,
          "Expected a version specifier after ','.",
        )
      }
      Err(err) => return Err(err),
    };
    specifiers.push(specifier);
    input = rest;
  }
  Ok((input, specifiers))
}

// specifier ::= operator ( ' ' ) * version
fn raw_specifier(input: &str) -> ParseResult<RawSpecifier> {
  let (input, operator) = operator_token(input)?;
  let (input, _) = skip_whitespace(input)?;
  if input.is_empty() {
    return ParseError::fail(
      input,
      format!("Expected a version after '{operator}'."),
    );
  }
  let (input, pattern) = version(input)?;
  Ok((input, RawSpecifier { operator, pattern }))
}

// version ::= release-pattern, ending the clause
fn version(input: &str) -> ParseResult<VersionPattern> {
  fn is_clause_end(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | ';' | ')')
  }

  fn invalid_version(input: &str) -> ParseResult<VersionPattern> {
    let end = input.find(is_clause_end).unwrap_or(input.len());
    ParseError::fail(input, format!("Invalid version '{}'.", &input[..end]))
  }

  match release_pattern(input) {
    Ok((rest, pattern)) if rest.chars().next().map_or(true, is_clause_end) => {
      Ok((rest, pattern))
    }
    Ok(_) | Err(ParseError::Backtrace) => invalid_version(input),
    Err(err) => Err(err),
  }
}

#[cfg(test)]
mod test {
  use pretty_assertions::assert_eq;

  use super::*;

  fn version(text: &str) -> Version {
    Version::parse(text).unwrap()
  }

  fn specifier(text: &str) -> VersionSpecifier {
    let specifiers = VersionSpecifiers::parse(text).unwrap();
    assert_eq!(specifiers.len(), 1);
    specifiers[0].clone()
  }

  #[test]
  fn version_expansion() {
    #[track_caller]
    fn run_test(input: &str, expected: &[&str]) {
      let result = expand_version_star(input).unwrap();
      let expected = expected.iter().map(|v| version(v)).collect::<Vec<_>>();
      assert_eq!(result, expected);
    }

    run_test("1.0.0", &["1.0.0"]);
    run_test("1.0.*", &["1.0.0", "1.0.9999"]);
    run_test("1.*", &["1.0", "1.9999"]);
    run_test("1.5.*", &["1.5.0", "1.5.9999"]);
    run_test("*", &["0.0.0", "9999.9999.9999"]);

    // components are not extended yet
    let expanded = expand_version_star("1.*").unwrap();
    assert_eq!(expanded[1].to_string(), "1.9999");
    let expanded = expand_version_star("1").unwrap();
    assert_eq!(expanded[0].to_string(), "1");

    assert!(expand_version_star("1.a.*").is_err());
    assert!(expand_version_star("1.*.*").is_err());
  }

  #[test]
  fn star_as_last_component() {
    let pattern = add_star_as_last_component(&version("1.1"));
    assert_eq!(pattern.to_string(), "1.*");
    let pattern = add_star_as_last_component(&version("2.2.0"));
    assert_eq!(pattern.to_string(), "2.2.*");
    let pattern = add_star_as_last_component(&version("3"));
    assert_eq!(pattern.to_string(), "*");
  }

  #[test]
  fn clause_ranges() {
    #[track_caller]
    fn run_test(input: &str, expected: &str) {
      assert_eq!(specifier(input).to_range_set().to_string(), expected);
    }

    run_test("==1.0.0", "[1.0.0, 1.0.0]");
    run_test("==1.0", "[1.0.0, 1.0.0]");
    run_test("==1.0.*", "[1.0.0, 1.0.9999]");
    run_test(">=1.0", "[1.0.0, 9999.9999.9999]");
    run_test(">=1.*", "[1.9999.0, 9999.9999.9999]");
    run_test("<=1.0", "[0.0.0, 1.0.0]");
    run_test("<=1.*", "[0.0.0, 1.0.0]");
    run_test("<2", "[0.0.0, 2.0.0)");
    run_test(">2", "(2.0.0, 9999.9999.9999]");
    run_test(">2.*", "(2.9999.0, 9999.9999.9999]");
    run_test("~=2.2", "[2.2.0, 2.2.9999]");
    run_test("~=1.4.5", "[1.4.5, 1.4.9999]");
    run_test(
      "!=2.2",
      "[0.0.0, 2.2.0) | (2.2.0, 9999.9999.9999]",
    );
    run_test(
      "!=2.2.*",
      "[0.0.0, 2.2.0) | (2.2.9999, 9999.9999.9999]",
    );
    // sentinels
    run_test("<0", "()");
    run_test("!=0", "(0.0.0, 9999.9999.9999]");
    run_test(">9999.9999.9999", "()");
    // bare wildcard is the whole domain for any operator
    run_test("==*", "[0.0.0, 9999.9999.9999]");
    run_test("!=*", "[0.0.0, 9999.9999.9999]");
    run_test("<*", "[0.0.0, 9999.9999.9999]");
  }

  #[test]
  fn parse_specifiers() {
    #[track_caller]
    fn run_test(input: &str, expected: &str) {
      let specifiers = VersionSpecifiers::parse(input).unwrap();
      assert_eq!(specifiers.to_string(), expected);
    }

    run_test("", "");
    run_test(">=1.0", ">=1.0");
    run_test(" > 1.0 , != 1.3.4,< 2.0 ", ">1.0,!=1.3.4,<2.0");
    run_test("!=2.2.*, !=4.0", "!=2.2.*,!=4.0");
    run_test("~=2.2", "~=2.2");
    run_test("==*", "==*");
  }

  #[test]
  fn parse_specifier_errors() {
    #[track_caller]
    fn run_test(input: &str, expected: PythonSpecParseError) {
      let err = VersionSpecifiers::parse(input).unwrap_err();
      assert_eq!(err, expected);
    }

    run_test(
      "===1.0",
      PythonSpecParseError::UnsupportedOperator {
        operator: "===".to_string(),
        text: "===1.0".to_string(),
      },
    );
    run_test(
      ">=1.0, =<2",
      PythonSpecParseError::UnsupportedOperator {
        operator: "=<".to_string(),
        text: ">=1.0, =<2".to_string(),
      },
    );
    run_test(
      "~=1.*",
      PythonSpecParseError::WildcardNotAllowed {
        operator: "~=".to_string(),
        text: "~=1.*".to_string(),
      },
    );

    #[track_caller]
    fn run_parse_error_test(input: &str, offending: &str) {
      let err = VersionSpecifiers::parse(input).unwrap_err();
      match &err {
        PythonSpecParseError::Parse { text, message } => {
          assert_eq!(text, input.trim());
          assert!(message.contains(offending), "{message}");
        }
        err => panic!("unexpected error: {err:?}"),
      }
    }

    run_parse_error_test("==1.0rc1", "1.0rc1");
    run_parse_error_test(">=1.0.post1, <2", "post1");
    run_parse_error_test(">=v1", "v1");
    run_parse_error_test(">=1.0,", "Expected a version specifier");
    run_parse_error_test(">=", "Expected a version after '>='");
    run_parse_error_test("<1.20000", "greater than 9999");
    run_parse_error_test(">=1.0 <2.0", "<2.0");
  }

  #[test]
  fn specifiers_intersect_clauses() {
    let specifiers = VersionSpecifiers::parse("!=2.2.*, !=4.0").unwrap();
    assert_eq!(
      specifiers.to_range_set().to_string(),
      "[0.0.0, 2.2.0) | (2.2.9999, 4.0.0) | (4.0.0, 9999.9999.9999]"
    );

    let specifiers = VersionSpecifiers::parse("").unwrap();
    assert!(specifiers.to_range_set().is_all());

    let specifiers = VersionSpecifiers::parse(">2.0, <1.0").unwrap();
    assert!(specifiers.to_range_set().is_empty());
  }

  #[test]
  fn contains() {
    let specifiers =
      VersionSpecifiers::parse(">1.0, != 1.3.4, < 2.0").unwrap();
    assert!(!specifiers.contains(&version("1.0")));
    assert!(specifiers.contains(&version("1.0.1")));
    assert!(!specifiers.contains(&version("1.3.4")));
    assert!(specifiers.contains(&version("1.3.5")));
    assert!(!specifiers.contains(&version("2")));
    for text in ["1.0", "1.0.1", "1.3.4", "1.3.5", "2", "0.1"] {
      let v = version(text);
      assert_eq!(
        specifiers.contains(&v),
        specifiers.to_range_set().satisfies(&v),
        "{text}"
      );
    }
  }

  #[test]
  fn serialize_deserialize() {
    let specifiers = VersionSpecifiers::parse(">= 1.16 , <2").unwrap();
    let json = serde_json::to_string(&specifiers).unwrap();
    assert_eq!(json, "\">=1.16,<2\"");
    let result = serde_json::from_str::<VersionSpecifiers>(&json).unwrap();
    assert_eq!(result, specifiers);
    assert!(serde_json::from_str::<VersionSpecifiers>("\"=>1\"").is_err());
  }
}
