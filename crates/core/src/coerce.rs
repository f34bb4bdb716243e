//! Typing of command-line arguments into payload values, and display of payloads.
//!
//! Each raw string is typed by the first rule that accepts it:
//!
//! 1. integer (`i64`)
//! 2. finite float
//! 3. boolean (`1 t T TRUE true True 0 f F FALSE false False`)
//! 4. JSON object
//! 5. JSON array of objects
//! 6. the string itself
//!
//! `1` and `0` are integers: rule 1 wins over rule 3.

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use wick_protocol::{Dict, List};

/// A typed command-line argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
	Integer(i64),
	Float(f64),
	Boolean(bool),
	Object(Dict),
	Array(Vec<Dict>),
	String(String),
}

impl From<ArgValue> for Value {
	fn from(value: ArgValue) -> Self {
		match value {
			ArgValue::Integer(n) => Value::from(n),
			ArgValue::Float(f) => Value::from(f),
			ArgValue::Boolean(b) => Value::Bool(b),
			ArgValue::Object(map) => Value::Object(map),
			ArgValue::Array(items) => Value::Array(items.into_iter().map(Value::Object).collect()),
			ArgValue::String(s) => Value::String(s),
		}
	}
}

fn parse_bool(raw: &str) -> Option<bool> {
	match raw {
		"1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
		"0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
		_ => None,
	}
}

/// Types one raw argument.
pub fn classify(raw: &str) -> ArgValue {
	if let Ok(n) = raw.parse::<i64>() {
		return ArgValue::Integer(n);
	}
	// inf and NaN have no JSON form; they stay strings
	if let Some(f) = raw.parse::<f64>().ok().filter(|f| f.is_finite()) {
		return ArgValue::Float(f);
	}
	if let Some(b) = parse_bool(raw) {
		return ArgValue::Boolean(b);
	}
	if let Ok(object) = serde_json::from_str::<Dict>(raw) {
		return ArgValue::Object(object);
	}
	if let Ok(objects) = serde_json::from_str::<Vec<Dict>>(raw) {
		return ArgValue::Array(objects);
	}
	ArgValue::String(raw.to_string())
}

/// Types positional arguments, keeping their order.
pub fn encode_args<I, S>(raw: I) -> List
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	raw.into_iter().map(|s| classify(s.as_ref()).into()).collect()
}

/// Types keyword arguments. A repeated key keeps its last value.
pub fn encode_kwargs<I, K, V>(raw: I) -> Dict
where
	I: IntoIterator<Item = (K, V)>,
	K: Into<String>,
	V: AsRef<str>,
{
	raw.into_iter().map(|(k, v)| (k.into(), classify(v.as_ref()).into())).collect()
}

/// Splits a `key=value` command-line pair on the first `=`.
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
	match raw.split_once('=') {
		Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
		_ => Err(format!("expected key=value, got '{raw}'")),
	}
}

/// Pretty JSON with a four-space indent.
pub fn render_value<T: Serialize + ?Sized>(value: &T) -> String {
	let mut buf = Vec::new();
	let mut serializer = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
	if value.serialize(&mut serializer).is_err() {
		return String::new();
	}
	String::from_utf8(buf).unwrap_or_default()
}

/// Display form of a payload, newline-terminated.
///
/// Empty collections are skipped; when both are empty the literal
/// `args: []` / `kwargs: {}` pair is printed.
pub fn render(args: &List, kwargs: &Dict) -> String {
	if args.is_empty() && kwargs.is_empty() {
		return "args: []\nkwargs: {}\n".to_string();
	}
	let mut out = String::new();
	if !args.is_empty() {
		out.push_str("args:\n");
		out.push_str(&render_value(args));
		out.push('\n');
	}
	if !kwargs.is_empty() {
		out.push_str("kwargs:\n");
		out.push_str(&render_value(kwargs));
		out.push('\n');
	}
	out
}
