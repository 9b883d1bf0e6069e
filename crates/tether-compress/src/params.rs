//! Extension parameter grammar.
//!
//! The external HTTP layer tokenizes `Sec-WebSocket-Extensions` header values
//! into a parameter multimap per extension occurrence. This module defines
//! that multimap, the strict value parsers shared by both extensions, and the
//! canonical extension string form.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::error::CompressError;

/// A single extension parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Parameter was present without a value (the boolean-true sentinel).
    Flag,
    /// Parameter carried a literal value.
    Value(String),
}

/// Parameter multimap for one extension occurrence in the header.
///
/// A `BTreeMap` keeps iteration deterministic; values accumulate in header
/// order so duplicate occurrences remain visible to the parser.
pub type ExtensionParams = BTreeMap<String, Vec<ParamValue>>;

/// Return the single value of a parameter, failing on duplicates.
///
/// # Errors
///
/// Returns [`CompressError::DuplicateParameter`] if the parameter occurred
/// more than once.
pub fn unique<'a>(
    extension: &'static str,
    param: &str,
    values: &'a [ParamValue],
) -> Result<&'a ParamValue, CompressError> {
    if values.len() > 1 {
        return Err(CompressError::DuplicateParameter {
            extension,
            param: param.to_string(),
        });
    }
    // The HTTP layer never hands over an empty value list; treat it as a
    // bare flag if it ever does.
    Ok(values.first().unwrap_or(&ParamValue::Flag))
}

/// Require a bare flag (presence without value).
///
/// # Errors
///
/// Returns [`CompressError::IllegalParameterValue`] if the parameter carried
/// any literal value.
pub fn require_flag(
    extension: &'static str,
    param: &str,
    value: &ParamValue,
) -> Result<(), CompressError> {
    match value {
        ParamValue::Flag => Ok(()),
        ParamValue::Value(v) => Err(CompressError::IllegalParameterValue {
            extension,
            param: param.to_string(),
            value: v.clone(),
        }),
    }
}

/// Parse an enumerated integer parameter from its exact decimal string form.
///
/// Only the canonical decimal renderings of the members of `allowed` are
/// accepted: leading zeroes, signs, whitespace and out-of-range values all
/// fail.
///
/// # Errors
///
/// Returns [`CompressError::IllegalParameterValue`] for a bare flag or any
/// token that is not an exact member of the closed set.
pub fn parse_enumerated(
    extension: &'static str,
    param: &str,
    value: &ParamValue,
    allowed: RangeInclusive<u8>,
) -> Result<u8, CompressError> {
    let illegal = |raw: &str| CompressError::IllegalParameterValue {
        extension,
        param: param.to_string(),
        value: raw.to_string(),
    };
    match value {
        ParamValue::Flag => Err(illegal("<flag>")),
        ParamValue::Value(raw) => {
            let parsed: u8 = raw.parse().map_err(|_| illegal(raw))?;
            // round-trip check rejects non-canonical spellings like "09"
            if parsed.to_string() == *raw && allowed.contains(&parsed) {
                Ok(parsed)
            } else {
                Err(illegal(raw))
            }
        }
    }
}

/// Render the canonical extension string `"<name>; param[=value]; ..."`.
#[must_use]
pub fn format_extension(name: &str, params: &[(&str, Option<String>)]) -> String {
    let mut out = String::from(name);
    for (param, value) in params {
        out.push_str("; ");
        out.push_str(param);
        if let Some(v) = value {
            out.push('=');
            out.push_str(v);
        }
    }
    out
}

/// Tokenize a canonical extension string back into its name and parameter
/// multimap.
///
/// This understands exactly the form produced by [`format_extension`] (and
/// by the peers this crate negotiates with): semicolon-separated tokens,
/// optional `=` values, no quoting.
///
/// # Errors
///
/// Returns [`CompressError::MalformedExtension`] on an empty string, empty
/// parameter token or empty parameter name.
pub fn parse_extension_string(s: &str) -> Result<(String, ExtensionParams), CompressError> {
    let mut tokens = s.split(';').map(str::trim);
    let name = tokens
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CompressError::MalformedExtension(s.to_string()))?;

    let mut params = ExtensionParams::new();
    for token in tokens {
        if token.is_empty() {
            return Err(CompressError::MalformedExtension(s.to_string()));
        }
        let (param, value) = match token.split_once('=') {
            Some((p, v)) => (p.trim(), ParamValue::Value(v.trim().to_string())),
            None => (token, ParamValue::Flag),
        };
        if param.is_empty() {
            return Err(CompressError::MalformedExtension(s.to_string()));
        }
        params.entry(param.to_string()).or_default().push(value);
    }
    Ok((name.to_string(), params))
}
