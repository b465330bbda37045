//! Condition scanning: tokens and identifier checks.
//!
//! This is deliberately not a grammar. It splits a condition string into
//! tokens so callers can verify that every referenced search identifier
//! exists and can substitute identifiers with rendered expressions.

use crate::schema::Detection;

/// One lexical element of a condition string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionToken {
    Open,
    Close,
    And,
    Or,
    Not,
    /// `1 of <pattern>` (`all == false`) or `all of <pattern>`.
    Quantifier { all: bool, pattern: String },
    Identifier(String),
    /// Everything after a `|`: a legacy aggregation expression.
    Pipe(String),
}

/// Problems found while scanning a condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    #[error("'{0} of' must be followed by a search identifier pattern")]
    DanglingQuantifier(String),

    #[error("unsupported quantifier '{0} of', only '1 of' and 'all of' are allowed")]
    UnsupportedQuantifier(String),

    #[error("unbalanced parentheses")]
    UnbalancedParentheses,

    #[error("search identifier '{0}' is not defined in the detection")]
    UnknownIdentifier(String),

    #[error("pattern '{0}' matches no search identifier")]
    EmptyPattern(String),
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '*' | '.')
}

/// Split a condition string into tokens.
pub fn tokenize(condition: &str) -> Result<Vec<ConditionToken>, ConditionError> {
    let mut tokens = Vec::new();
    let mut chars = condition.char_indices().peekable();
    let mut pipe = None;

    // First pass: raw words and punctuation.
    let mut raw: Vec<Result<String, char>> = Vec::new();
    while let Some((pos, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' | ')' => raw.push(Err(c)),
            '|' => {
                pipe = Some(condition[pos + 1..].trim().to_string());
                break;
            }
            c if is_word_char(c) => {
                let mut word = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if !is_word_char(next) {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                raw.push(Ok(word));
            }
            other => {
                return Err(ConditionError::UnexpectedCharacter {
                    ch: other,
                    position: pos,
                })
            }
        }
    }

    // Second pass: keywords and quantifiers.
    let mut iter = raw.into_iter().peekable();
    while let Some(item) = iter.next() {
        match item {
            Err('(') => tokens.push(ConditionToken::Open),
            Err(_) => tokens.push(ConditionToken::Close),
            Ok(word) => {
                let lower = word.to_ascii_lowercase();
                let is_of_next = matches!(iter.peek(), Some(Ok(w)) if w.eq_ignore_ascii_case("of"));
                if is_of_next && (lower == "all" || lower.chars().all(|c| c.is_ascii_digit())) {
                    iter.next();
                    if lower != "all" && lower != "1" {
                        return Err(ConditionError::UnsupportedQuantifier(word));
                    }
                    match iter.next() {
                        Some(Ok(pattern)) => tokens.push(ConditionToken::Quantifier {
                            all: lower == "all",
                            pattern,
                        }),
                        _ => return Err(ConditionError::DanglingQuantifier(word)),
                    }
                    continue;
                }
                tokens.push(match lower.as_str() {
                    "and" => ConditionToken::And,
                    "or" => ConditionToken::Or,
                    "not" => ConditionToken::Not,
                    _ => ConditionToken::Identifier(word),
                });
            }
        }
    }

    if let Some(rest) = pipe {
        tokens.push(ConditionToken::Pipe(rest));
    }
    Ok(tokens)
}

/// Render tokens back into condition text.
pub fn condition_text(tokens: &[ConditionToken]) -> String {
    let mut text = String::new();
    for token in tokens {
        let piece = match token {
            ConditionToken::Open => "(".to_string(),
            ConditionToken::Close => ")".to_string(),
            ConditionToken::And => "and".to_string(),
            ConditionToken::Or => "or".to_string(),
            ConditionToken::Not => "not".to_string(),
            ConditionToken::Quantifier { all: true, pattern } => format!("all of {}", pattern),
            ConditionToken::Quantifier { all: false, pattern } => format!("1 of {}", pattern),
            ConditionToken::Identifier(name) => name.clone(),
            ConditionToken::Pipe(expression) => format!("| {}", expression),
        };
        if !text.is_empty() && !text.ends_with('(') && piece != ")" {
            text.push(' ');
        }
        text.push_str(&piece);
    }
    text
}

/// `condition` as an operand of `and`: parenthesized unless it is a single,
/// possibly negated, identifier or quantifier.
pub fn grouped(condition: &str) -> String {
    let operand = |t: &ConditionToken| {
        matches!(t, ConditionToken::Identifier(_) | ConditionToken::Quantifier { .. })
    };
    let atomic = match tokenize(condition).as_deref() {
        Ok([single]) => operand(single),
        Ok([ConditionToken::Not, single]) => operand(single),
        _ => false,
    };
    if atomic {
        condition.trim().to_string()
    } else {
        format!("({})", condition.trim())
    }
}

/// Match `name` against a pattern where `*` matches any run of characters.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if pi < p.len() && p[pi] == n[ni] {
            pi += 1;
            ni += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

/// Search identifier names selected by a quantifier pattern, in declaration order.
///
/// `them` selects every identifier not starting with an underscore.
pub fn expand_pattern<'a>(pattern: &str, detection: &'a Detection) -> Vec<&'a str> {
    detection
        .searches
        .keys()
        .map(String::as_str)
        .filter(|name| {
            if pattern == "them" {
                !name.starts_with('_')
            } else {
                wildcard_match(pattern, name)
            }
        })
        .collect()
}

/// Check every condition of a detection; returns all problems found.
pub fn check_conditions(detection: &Detection) -> Vec<ConditionError> {
    let mut problems = Vec::new();
    for condition in &detection.conditions {
        match tokenize(condition) {
            Ok(tokens) => problems.extend(check_tokens(&tokens, detection)),
            Err(e) => problems.push(e),
        }
    }
    problems
}

fn check_tokens(tokens: &[ConditionToken], detection: &Detection) -> Vec<ConditionError> {
    let mut problems = Vec::new();
    let mut depth: i64 = 0;

    for token in tokens {
        match token {
            ConditionToken::Open => depth += 1,
            ConditionToken::Close => {
                depth -= 1;
                if depth < 0 {
                    break;
                }
            }
            ConditionToken::Identifier(name) => {
                if !detection.searches.contains_key(name) {
                    problems.push(ConditionError::UnknownIdentifier(name.clone()));
                }
            }
            ConditionToken::Quantifier { pattern, .. } => {
                if expand_pattern(pattern, detection).is_empty() {
                    problems.push(ConditionError::EmptyPattern(pattern.clone()));
                }
            }
            ConditionToken::And | ConditionToken::Or | ConditionToken::Not | ConditionToken::Pipe(_) => {}
        }
    }
    if depth != 0 {
        problems.push(ConditionError::UnbalancedParentheses);
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DetectionItem, DetectionValue, SearchIdentifier};

    fn detection(names: &[&str], condition: &str) -> Detection {
        let mut d = Detection::default();
        for name in names {
            d.searches.insert(
                name.to_string(),
                SearchIdentifier::Fields(vec![DetectionItem::new("f", vec![DetectionValue::Int(1)])]),
            );
        }
        d.conditions.push(condition.to_string());
        d
    }

    #[test]
    fn tokenize_keywords_and_identifiers() {
        let tokens = tokenize("selection and not (filter_a or filter_b)").unwrap();
        assert_eq!(
            tokens,
            vec![
                ConditionToken::Identifier("selection".into()),
                ConditionToken::And,
                ConditionToken::Not,
                ConditionToken::Open,
                ConditionToken::Identifier("filter_a".into()),
                ConditionToken::Or,
                ConditionToken::Identifier("filter_b".into()),
                ConditionToken::Close,
            ]
        );
    }

    #[test]
    fn tokenize_quantifiers_and_pipe() {
        let tokens = tokenize("1 of sel* and all of them | count() > 5").unwrap();
        assert_eq!(
            tokens,
            vec![
                ConditionToken::Quantifier { all: false, pattern: "sel*".into() },
                ConditionToken::And,
                ConditionToken::Quantifier { all: true, pattern: "them".into() },
                ConditionToken::Pipe("count() > 5".into()),
            ]
        );
    }

    #[test]
    fn tokenize_rejects_other_quantities() {
        assert_eq!(
            tokenize("2 of sel*"),
            Err(ConditionError::UnsupportedQuantifier("2".into()))
        );
    }

    #[test]
    fn condition_text_round_trips_spacing() {
        let text = "1 of sel* and not (a or all of them)";
        assert_eq!(condition_text(&tokenize(text).unwrap()), text);
    }

    #[test]
    fn grouped_wraps_compound_conditions_only() {
        assert_eq!(grouped("selection"), "selection");
        assert_eq!(grouped(" not filter "), "not filter");
        assert_eq!(grouped("1 of sel*"), "1 of sel*");
        assert_eq!(grouped("a or b"), "(a or b)");
        assert_eq!(grouped("not (a)"), "(not (a))");
    }

    #[test]
    fn wildcard_matching() {
        assert!(wildcard_match("sel*", "selection"));
        assert!(wildcard_match("*_filter", "main_filter"));
        assert!(wildcard_match("a*c*", "abcd"));
        assert!(!wildcard_match("sel*", "filter"));
        assert!(wildcard_match("exact", "exact"));
    }

    #[test]
    fn them_skips_underscored_identifiers() {
        let d = detection(&["selection", "_internal"], "all of them");
        assert_eq!(expand_pattern("them", &d), vec!["selection"]);
    }

    #[test]
    fn check_conditions_reports_unknown_identifiers() {
        let d = detection(&["selection"], "selection and not filter");
        assert_eq!(
            check_conditions(&d),
            vec![ConditionError::UnknownIdentifier("filter".into())]
        );
    }

    #[test]
    fn check_conditions_reports_unbalanced_parentheses() {
        let d = detection(&["selection"], "(selection");
        assert_eq!(check_conditions(&d), vec![ConditionError::UnbalancedParentheses]);
    }
}
