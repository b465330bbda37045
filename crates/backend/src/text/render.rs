//! Rendering detections into dialect text.

use sigma_rules::condition::{expand_pattern, tokenize, ConditionToken};
use sigma_rules::schema::{Detection, DetectionItem, DetectionValue, Modifier, SearchIdentifier};

/// Tokens and escaping rules of a text query language.
pub struct Dialect {
    pub and_token: &'static str,
    pub or_token: &'static str,
    pub not_token: &'static str,
    /// Between field and value, e.g. `=` or `:`.
    pub eq_token: &'static str,
    /// Wraps string values when set.
    pub quote: Option<char>,
    pub escape_char: char,
    /// Characters escaped in string values, besides the quote and escape chars.
    pub escaped: &'static str,
    /// `field` and pattern -> regex expression; `None` if unsupported.
    pub regex: Option<fn(&str, &str) -> String>,
    /// Expression matching events where `field` is absent.
    pub null: fn(&str) -> String,
}

type RenderResult = Result<String, String>;

impl Dialect {
    /// Escape a string value. `*` and `?` stay wildcards.
    fn escape(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            let special = c == self.escape_char || Some(c) == self.quote || self.escaped.contains(c);
            if special && c != '*' && c != '?' {
                out.push(self.escape_char);
            }
            out.push(c);
        }
        out
    }

    fn quoted(&self, value: &str) -> String {
        match self.quote {
            Some(q) => format!("{q}{value}{q}"),
            None => value.to_string(),
        }
    }

    fn string_value(&self, value: &str, modifiers: &[Modifier]) -> String {
        let mut escaped = self.escape(value);
        if modifiers.contains(&Modifier::Contains) || modifiers.contains(&Modifier::EndsWith) {
            if !escaped.starts_with('*') {
                escaped.insert(0, '*');
            }
        }
        if modifiers.contains(&Modifier::Contains) || modifiers.contains(&Modifier::StartsWith) {
            if !escaped.ends_with('*') {
                escaped.push('*');
            }
        }
        self.quoted(&escaped)
    }

    fn join(&self, parts: Vec<String>, all: bool) -> String {
        let token = if all { self.and_token } else { self.or_token };
        if parts.len() == 1 {
            return parts.into_iter().next().unwrap_or_default();
        }
        format!("({})", parts.join(&format!(" {} ", token)))
    }
}

fn render_value(dialect: &Dialect, field: &str, value: &DetectionValue, modifiers: &[Modifier]) -> RenderResult {
    if field.is_empty() {
        return render_keyword(dialect, value);
    }
    if modifiers.contains(&Modifier::Re) {
        let (DetectionValue::Str(pattern), Some(regex)) = (value, dialect.regex) else {
            return Err(format!("regular expression on field '{}' is not supported", field));
        };
        return Ok(regex(field, pattern));
    }
    Ok(match value {
        DetectionValue::Str(s) => format!("{}{}{}", field, dialect.eq_token, dialect.string_value(s, modifiers)),
        DetectionValue::Int(i) => format!("{}{}{}", field, dialect.eq_token, i),
        DetectionValue::Bool(b) => format!("{}{}{}", field, dialect.eq_token, b),
        DetectionValue::Null => (dialect.null)(field),
    })
}

fn render_keyword(dialect: &Dialect, value: &DetectionValue) -> RenderResult {
    match value {
        DetectionValue::Str(s) => Ok(dialect.quoted(&dialect.escape(s))),
        DetectionValue::Int(i) => Ok(i.to_string()),
        DetectionValue::Bool(b) => Ok(b.to_string()),
        DetectionValue::Null => Err("null keyword values are not supported".to_string()),
    }
}

fn render_item(dialect: &Dialect, item: &DetectionItem) -> RenderResult {
    let parts = item
        .values
        .iter()
        .map(|v| render_value(dialect, &item.field, v, &item.modifiers))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dialect.join(parts, item.has_modifier(Modifier::All)))
}

fn render_search(dialect: &Dialect, name: &str, search: &SearchIdentifier) -> RenderResult {
    if search.is_empty() {
        return Err(format!("search identifier '{}' is empty", name));
    }
    match search {
        SearchIdentifier::Fields(items) => {
            let parts = items
                .iter()
                .map(|i| render_item(dialect, i))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(dialect.join(parts, true))
        }
        SearchIdentifier::AnyOf(alternatives) => {
            let parts = alternatives
                .iter()
                .map(|a| render_search(dialect, name, a))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(dialect.join(parts, false))
        }
        SearchIdentifier::Keywords(values) => {
            let parts = values
                .iter()
                .map(|v| render_keyword(dialect, v))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(dialect.join(parts, false))
        }
    }
}

fn render_identifier(dialect: &Dialect, detection: &Detection, name: &str) -> RenderResult {
    match detection.searches.get(name) {
        Some(search) => render_search(dialect, name, search),
        None => Err(format!("search identifier '{}' is not defined in the detection", name)),
    }
}

/// Render one condition string by token substitution.
pub(crate) fn render_condition(dialect: &Dialect, detection: &Detection, condition: &str) -> RenderResult {
    let tokens = tokenize(condition).map_err(|e| e.to_string())?;
    let mut pieces: Vec<String> = Vec::with_capacity(tokens.len());

    for token in &tokens {
        let piece = match token {
            ConditionToken::Open => "(".to_string(),
            ConditionToken::Close => ")".to_string(),
            ConditionToken::And => dialect.and_token.to_string(),
            ConditionToken::Or => dialect.or_token.to_string(),
            ConditionToken::Not => dialect.not_token.to_string(),
            ConditionToken::Identifier(name) => render_identifier(dialect, detection, name)?,
            ConditionToken::Quantifier { all, pattern } => {
                let names = expand_pattern(pattern, detection);
                if names.is_empty() {
                    return Err(format!("pattern '{}' matches no search identifier", pattern));
                }
                let parts = names
                    .iter()
                    .map(|n| render_identifier(dialect, detection, n))
                    .collect::<Result<Vec<_>, _>>()?;
                dialect.join(parts, *all)
            }
            ConditionToken::Pipe(expression) => {
                return Err(format!("aggregation expression '| {}' is not supported", expression));
            }
        };
        pieces.push(piece);
    }

    let mut query = String::new();
    for piece in pieces {
        let glue = !query.is_empty() && !query.ends_with('(') && piece != ")";
        if glue {
            query.push(' ');
        }
        query.push_str(&piece);
    }
    Ok(query)
}

/// Render every condition of a detection; several conditions are OR-ed.
pub(crate) fn render_rule(dialect: &Dialect, detection: &Detection) -> RenderResult {
    let queries = detection
        .conditions
        .iter()
        .map(|c| render_condition(dialect, detection, c))
        .collect::<Result<Vec<_>, _>>()?;
    match queries.len() {
        0 => Err("detection has no condition".to_string()),
        1 => Ok(queries.into_iter().next().unwrap_or_default()),
        _ => {
            let wrapped: Vec<String> = queries.into_iter().map(|q| format!("({})", q)).collect();
            Ok(wrapped.join(&format!(" {} ", dialect.or_token)))
        }
    }
}
