//! Prompt templating.
//!
//! `{name}` and `{name.path}` tokens are replaced with values from the
//! variables map. Strings are inserted as-is, other values as compact JSON.
//! Tokens that do not resolve are left in place.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::input::lookup_path;

static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();

fn token_regex() -> &'static Regex {
  TOKEN_REGEX.get_or_init(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\}").expect("TOKEN_REGEX is valid")
  })
}

/// Render a prompt template against `vars`.
pub fn render(template: &str, vars: &Map<String, Value>) -> String {
  token_regex()
    .replace_all(template, |caps: &Captures| {
      let path = &caps[1];
      match lookup(vars, path) {
        Some(Value::String(s)) => s.clone(),
        Some(value) => value.to_string(),
        None => caps[0].to_string(),
      }
    })
    .into_owned()
}

fn lookup<'a>(vars: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
  let (head, rest) = match path.split_once('.') {
    Some((head, rest)) => (head, Some(rest)),
    None => (path, None),
  };
  let value = vars.get(head)?;
  match rest {
    Some(rest) => lookup_path(value, rest),
    None => Some(value),
  }
}
