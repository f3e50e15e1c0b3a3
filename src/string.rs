// Copyright 2018-2023 the NMRPack authors. All rights reserved. MIT license.

use std::ops::Deref;

use capacity_builder::StringAppendable;
use capacity_builder::StringBuilder;
use capacity_builder::StringType;
use serde::Deserialize;
use serde::Serialize;

/// Package and extra names. Short names stay inline without allocating.
#[derive(
  Debug,
  Default,
  Clone,
  PartialOrd,
  Ord,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
pub struct SmallStackString(ecow::EcoString);

impl SmallStackString {
  #[inline(always)]
  pub fn with_capacity(size: usize) -> Self {
    Self(ecow::EcoString::with_capacity(size))
  }

  #[allow(clippy::should_implement_trait)]
  #[inline(always)]
  pub fn from_str(s: &str) -> Self {
    Self(ecow::EcoString::from(s))
  }

  #[inline(always)]
  pub fn as_str(&self) -> &str {
    self.0.as_str()
  }

  #[inline(always)]
  pub fn push(&mut self, c: char) {
    self.0.push(c);
  }

  #[inline(always)]
  pub fn push_str(&mut self, s: &str) {
    self.0.push_str(s);
  }
}

impl std::fmt::Display for SmallStackString {
  #[inline(always)]
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

impl Deref for SmallStackString {
  type Target = str;

  #[inline(always)]
  fn deref(&self) -> &Self::Target {
    self.0.as_str()
  }
}

impl PartialEq<&str> for SmallStackString {
  #[inline(always)]
  fn eq(&self, other: &&str) -> bool {
    self.0.as_str() == *other
  }
}

impl<'a> StringAppendable<'a> for &'a SmallStackString {
  #[inline(always)]
  fn append_to_builder<TString: StringType>(
    self,
    builder: &mut StringBuilder<'a, TString>,
  ) {
    builder.append(self.0.as_str())
  }
}

impl From<&str> for SmallStackString {
  #[inline(always)]
  fn from(s: &str) -> Self {
    Self(ecow::EcoString::from(s))
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn builds_from_parts() {
    let mut text = SmallStackString::with_capacity(8);
    text.push_str("py");
    text.push('-');
    text.push_str("six");
    assert_eq!(text, "py-six");
    assert_eq!(text.len(), 6);
    assert_eq!(text, SmallStackString::from("py-six"));
  }

  #[test]
  fn serialize_deserialize() {
    let text = SmallStackString::from_str("numpy");
    let json = serde_json::to_string(&text).unwrap();
    assert_eq!(json, "\"numpy\"");
    let result = serde_json::from_str::<SmallStackString>(&json).unwrap();
    assert_eq!(result, text);
  }
}
