// Copyright 2018-2023 the NMRPack authors. All rights reserved. MIT license.

use monch::*;

use crate::VersionPattern;
use crate::MAX_VERSION_COMPONENT;

// nr ::= ['0'-'9']+
pub fn nr(input: &str) -> ParseResult<u64> {
  // loose on leading zeros, so 01.02 is 1.2
  let (rest, result) =
    if_not_empty(substring(skip_while(|c| c.is_ascii_digit())))(input)?;
  let val = match result.parse::<u64>() {
    Ok(val) => val,
    Err(err) => {
      return ParseError::fail(
        input,
        format!("Error parsing '{result}' to u64.\n\n{err:#}"),
      )
    }
  };
  if val > MAX_VERSION_COMPONENT {
    return ParseError::fail(
      input,
      format!(
        "Version component '{result}' is greater than {MAX_VERSION_COMPONENT}."
      ),
    );
  }
  Ok((rest, val))
}

// release ::= nr ( '.' nr ) *
pub fn release(input: &str) -> ParseResult<Vec<u64>> {
  let (rest, pattern) = release_pattern(input)?;
  if pattern.wildcard {
    return ParseError::fail(input, "Wildcards are not allowed in a version.");
  }
  Ok((rest, pattern.release))
}

// release-pattern ::= '*' | nr ( '.' nr ) * ( '.' '*' )?
pub fn release_pattern(input: &str) -> ParseResult<VersionPattern> {
  if let Ok((input, _)) = ch('*')(input) {
    return Ok((input, VersionPattern::any()));
  }

  let (mut input, first) = nr(input)?;
  let mut release = vec![first];
  loop {
    let Ok((after_dot, _)) = ch('.')(input) else {
      break;
    };
    if let Ok((input, _)) = ch('*')(after_dot) {
      return Ok((
        input,
        VersionPattern {
          release,
          wildcard: true,
        },
      ));
    }
    let (rest, component) = match nr(after_dot) {
      Ok(result) => result,
      Err(ParseError::Backtrace) => {
        return ParseError::fail(
          after_dot,
          "Expected a number or '*' after '.'.",
        )
      }
      Err(err) => return Err(err),
    };
    release.push(component);
    input = rest;
  }
  Ok((
    input,
    VersionPattern {
      release,
      wildcard: false,
    },
  ))
}

// operator ::= [=!<>~]+
pub fn operator_token(input: &str) -> ParseResult<&str> {
  if_not_empty(take_while(|c| matches!(c, '=' | '!' | '<' | '>' | '~')))(
    input,
  )
}

// separator ::= ( ' ' ) * ',' ( ' ' ) *
pub fn comma_separator(input: &str) -> ParseResult<char> {
  delimited(skip_whitespace, ch(','), skip_whitespace)(input)
}

// name ::= [A-Za-z0-9] [-_.A-Za-z0-9] *
pub fn name(input: &str) -> ParseResult<&str> {
  let (rest, text) = if_not_empty(take_while(|c| {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
  }))(input)?;
  if !text.starts_with(|c: char| c.is_ascii_alphanumeric()) {
    return ParseError::fail(
      input,
      format!("Invalid name '{text}'. Must start with a letter or digit."),
    );
  }
  Ok((rest, text))
}
