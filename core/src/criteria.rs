//! Restricted grammar for success-criterion `measurable` expressions
//! (§4.8). Deliberately not a general expression evaluator: no arithmetic,
//! no function calls, no boolean combinators.
//!
//! ```text
//! criterion_expr := "true" | "false" | comparison | string_eq | ident
//! comparison     := IDENT comparator NUMBER
//! comparator     := "<" | "<=" | "==" | "!=" | ">=" | ">"
//! string_eq      := IDENT "==" STRING_LITERAL
//! ident          := [A-Za-z_][A-Za-z0-9_]*
//! NUMBER         := "-"? DIGIT+ ("." DIGIT+)?
//! STRING_LITERAL := "\"" ... "\"" | "'" ... "'"
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, TaskError},
    models::{CriteriaValue, SuccessCriterion},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl Comparator {
    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparator::Lt => lhs < rhs,
            Comparator::Le => lhs <= rhs,
            Comparator::Eq => (lhs - rhs).abs() < f64::EPSILON,
            Comparator::Ne => (lhs - rhs).abs() >= f64::EPSILON,
            Comparator::Ge => lhs >= rhs,
            Comparator::Gt => lhs > rhs,
        }
    }
}

/// Parsed form of a `measurable` string.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurable {
    Bool(bool),
    Comparison { ident: String, op: Comparator, number: f64 },
    StringEq { ident: String, literal: String },
    Ident(String),
}

/// Parse a `measurable` expression without evaluating it. Used both by
/// [`evaluate`] and by validation at write time (§3 invariant 4: invalid
/// criteria are rejected at write time, never at read time).
pub fn parse_measurable(input: &str) -> Result<Measurable> {
    let trimmed = input.trim();
    match trimmed {
        "true" => return Ok(Measurable::Bool(true)),
        "false" => return Ok(Measurable::Bool(false)),
        _ => {}
    }

    if let Some((ident, rest)) = split_ident(trimmed) {
        let rest = rest.trim_start();
        if let Some(literal) = parse_string_eq(rest) {
            return Ok(Measurable::StringEq { ident, literal });
        }
        if let Some((op, number_str)) = parse_comparator_and_rhs(rest) {
            let number: f64 = number_str
                .trim()
                .parse()
                .map_err(|_| TaskError::invalid_input(format!("invalid number in '{input}'")))?;
            return Ok(Measurable::Comparison { ident, op, number });
        }
        if rest.is_empty() {
            return Ok(Measurable::Ident(ident));
        }
    }

    Err(TaskError::invalid_input(format!("unparseable measurable expression: '{input}'")))
}

fn split_ident(s: &str) -> Option<(String, &str)> {
    let mut chars = s.char_indices();
    let (_, first) = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    let mut end = first.len_utf8();
    for (idx, ch) in chars {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            end = idx + ch.len_utf8();
        } else {
            break;
        }
    }
    Some((s[..end].to_string(), &s[end..]))
}

fn parse_string_eq(rest: &str) -> Option<String> {
    let rest = rest.strip_prefix("==")?.trim_start();
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let body = &rest[1..];
    let end = body.find(quote)?;
    Some(body[..end].to_string())
}

fn parse_comparator_and_rhs(rest: &str) -> Option<(Comparator, &str)> {
    const OPS: &[(&str, Comparator)] = &[
        ("<=", Comparator::Le),
        (">=", Comparator::Ge),
        ("==", Comparator::Eq),
        ("!=", Comparator::Ne),
        ("<", Comparator::Lt),
        (">", Comparator::Gt),
    ];
    for (token, op) in OPS {
        if let Some(stripped) = rest.strip_prefix(token) {
            return Some((*op, stripped));
        }
    }
    None
}

/// Result of evaluating a single criterion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriterionResult {
    pub criterion: String,
    pub passed: bool,
    pub reason: Option<String>,
}

/// Aggregate outcome of evaluating a criteria list against a context map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationOutcome {
    pub overall_pass: bool,
    pub results: Vec<CriterionResult>,
    pub failures: Vec<CriterionResult>,
}

/// Evaluate a criteria list against a context map (§4.8). Unknown
/// identifiers evaluate to false and contribute to failure reasons.
pub fn evaluate(
    criteria: &[SuccessCriterion],
    context: &BTreeMap<String, CriteriaValue>,
) -> Result<EvaluationOutcome> {
    let mut results = Vec::with_capacity(criteria.len());
    for c in criteria {
        let parsed = parse_measurable(&c.measurable)?;
        let (passed, reason) = evaluate_parsed(&parsed, context);
        results.push(CriterionResult { criterion: c.criterion.clone(), passed, reason });
    }
    let failures: Vec<CriterionResult> = results.iter().filter(|r| !r.passed).cloned().collect();
    Ok(EvaluationOutcome { overall_pass: failures.is_empty(), results, failures })
}

fn evaluate_parsed(
    measurable: &Measurable,
    context: &BTreeMap<String, CriteriaValue>,
) -> (bool, Option<String>) {
    match measurable {
        Measurable::Bool(b) => (*b, None),
        Measurable::Comparison { ident, op, number } => match context.get(ident) {
            Some(CriteriaValue::Number(n)) => {
                let passed = op.apply(*n, *number);
                (passed, (!passed).then(|| format!("{ident}={n} did not satisfy comparison")))
            }
            Some(other) => (false, Some(format!("{ident}={other:?} is not numeric"))),
            None => (false, Some(format!("unknown identifier '{ident}'"))),
        },
        Measurable::StringEq { ident, literal } => match context.get(ident) {
            Some(CriteriaValue::Text(t)) => {
                let passed = t == literal;
                (passed, (!passed).then(|| format!("{ident}='{t}' != '{literal}'")))
            }
            Some(other) => (false, Some(format!("{ident}={other:?} is not a string"))),
            None => (false, Some(format!("unknown identifier '{ident}'"))),
        },
        Measurable::Ident(ident) => match context.get(ident) {
            Some(CriteriaValue::Bool(b)) => (*b, (!b).then(|| format!("{ident} is falsy"))),
            Some(CriteriaValue::Number(n)) => {
                let truthy = *n != 0.0;
                (truthy, (!truthy).then(|| format!("{ident}=0 is falsy")))
            }
            Some(CriteriaValue::Text(t)) => {
                let truthy = !t.is_empty();
                (truthy, (!truthy).then(|| format!("{ident} is empty")))
            }
            None => (false, Some(format!("unknown identifier '{ident}'"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, CriteriaValue)]) -> BTreeMap<String, CriteriaValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn parses_literal_bools() {
        assert_eq!(parse_measurable("true").unwrap(), Measurable::Bool(true));
        assert_eq!(parse_measurable("false").unwrap(), Measurable::Bool(false));
    }

    #[test]
    fn parses_comparison() {
        let m = parse_measurable("coverage >= 80").unwrap();
        assert_eq!(
            m,
            Measurable::Comparison { ident: "coverage".into(), op: Comparator::Ge, number: 80.0 }
        );
    }

    #[test]
    fn parses_string_eq() {
        let m = parse_measurable("env == \"prod\"").unwrap();
        assert_eq!(m, Measurable::StringEq { ident: "env".into(), literal: "prod".into() });
    }

    #[test]
    fn parses_bare_ident() {
        assert_eq!(parse_measurable("reviewed").unwrap(), Measurable::Ident("reviewed".into()));
    }

    #[test]
    fn rejects_malformed_expression() {
        assert!(parse_measurable("1 + 1").is_err());
    }

    #[test]
    fn coverage_scenario_fails_below_threshold() {
        let criteria = vec![SuccessCriterion {
            criterion: "coverage".into(),
            measurable: "coverage >= 80".into(),
        }];
        let outcome = evaluate(&criteria, &ctx(&[("coverage", CriteriaValue::Number(75.0))])).unwrap();
        assert!(!outcome.overall_pass);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].criterion, "coverage");
    }

    #[test]
    fn coverage_scenario_passes_above_threshold() {
        let criteria = vec![SuccessCriterion {
            criterion: "coverage".into(),
            measurable: "coverage >= 80".into(),
        }];
        let outcome = evaluate(&criteria, &ctx(&[("coverage", CriteriaValue::Number(85.0))])).unwrap();
        assert!(outcome.overall_pass);
    }

    #[test]
    fn unknown_identifier_is_falsy() {
        let criteria = vec![SuccessCriterion { criterion: "x".into(), measurable: "mystery".into() }];
        let outcome = evaluate(&criteria, &BTreeMap::new()).unwrap();
        assert!(!outcome.overall_pass);
        assert!(outcome.failures[0].reason.as_ref().unwrap().contains("unknown identifier"));
    }
}
