//! Arithmetic folding for token expressions such as `8px * 2` or `(4 + 2) / 3`.
//!
//! Values may carry one unit (`px`, `rem`, `%`, ...); the first unit seen is kept on
//! the result. Anything that is not a pure arithmetic expression yields `None` and
//! the caller keeps the substituted text as-is.

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    Number(f64, String),
    Op(char),
    Open,
    Close,
}

/// Evaluate `expression`, returning the folded value with its unit.
#[must_use]
pub fn fold(expression: &str) -> Option<String> {
    let lexemes = lex(expression)?;
    if !lexemes.iter().any(|lexeme| matches!(lexeme, Lexeme::Op(_))) {
        return None;
    }
    let mut parser = Parser {
        lexemes: &lexemes,
        position: 0,
        unit: None,
    };
    let value = parser.expression()?;
    if parser.position != lexemes.len() || !value.is_finite() {
        return None;
    }
    Some(format!(
        "{}{}",
        format_number(value),
        parser.unit.unwrap_or_default()
    ))
}

/// Render a float without trailing zeros, rounded to four decimals.
#[must_use]
pub fn format_number(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    if rounded.fract() == 0.0 {
        return format!("{rounded:.0}");
    }
    let text = format!("{rounded:.4}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn lex(expression: &str) -> Option<Vec<Lexeme>> {
    let chars: Vec<char> = expression.chars().collect();
    let mut lexemes = Vec::new();
    let mut index = 0;
    while index < chars.len() {
        let ch = chars[index];
        if ch.is_whitespace() {
            index += 1;
            continue;
        }
        match ch {
            '(' => lexemes.push(Lexeme::Open),
            ')' => lexemes.push(Lexeme::Close),
            '+' | '*' | '/' => lexemes.push(Lexeme::Op(ch)),
            '-' if starts_operand(lexemes.last()) => {
                let (number, next) = lex_number(&chars, index)?;
                lexemes.push(number);
                index = next;
                continue;
            }
            '-' => lexemes.push(Lexeme::Op('-')),
            _ if ch.is_ascii_digit() || ch == '.' => {
                let (number, next) = lex_number(&chars, index)?;
                lexemes.push(number);
                index = next;
                continue;
            }
            _ => return None,
        }
        index += 1;
    }
    Some(lexemes)
}

const fn starts_operand(previous: Option<&Lexeme>) -> bool {
    matches!(previous, None | Some(Lexeme::Op(_) | Lexeme::Open))
}

fn lex_number(chars: &[char], start: usize) -> Option<(Lexeme, usize)> {
    let mut index = start;
    if chars.get(index) == Some(&'-') {
        index += 1;
    }
    while index < chars.len() && (chars[index].is_ascii_digit() || chars[index] == '.') {
        index += 1;
    }
    let digits: String = chars[start..index].iter().collect();
    let value = digits.parse::<f64>().ok()?;
    let unit_start = index;
    while index < chars.len() && (chars[index].is_ascii_alphabetic() || chars[index] == '%') {
        index += 1;
    }
    let unit: String = chars[unit_start..index].iter().collect();
    Some((Lexeme::Number(value, unit), index))
}

struct Parser<'a> {
    lexemes: &'a [Lexeme],
    position: usize,
    unit: Option<String>,
}

impl Parser<'_> {
    fn expression(&mut self) -> Option<f64> {
        let mut value = self.term()?;
        while let Some(Lexeme::Op(op @ ('+' | '-'))) = self.lexemes.get(self.position) {
            self.position += 1;
            let rhs = self.term()?;
            value = if *op == '+' { value + rhs } else { value - rhs };
        }
        Some(value)
    }

    fn term(&mut self) -> Option<f64> {
        let mut value = self.factor()?;
        while let Some(Lexeme::Op(op @ ('*' | '/'))) = self.lexemes.get(self.position) {
            self.position += 1;
            let rhs = self.factor()?;
            value = if *op == '*' { value * rhs } else { value / rhs };
        }
        Some(value)
    }

    fn factor(&mut self) -> Option<f64> {
        match self.lexemes.get(self.position)? {
            Lexeme::Number(value, unit) => {
                self.position += 1;
                if !unit.is_empty() {
                    match &self.unit {
                        None => self.unit = Some(unit.clone()),
                        Some(existing) if existing != unit => return None,
                        Some(_) => {}
                    }
                }
                Some(*value)
            }
            Lexeme::Open => {
                self.position += 1;
                let value = self.expression()?;
                if self.lexemes.get(self.position) != Some(&Lexeme::Close) {
                    return None;
                }
                self.position += 1;
                Some(value)
            }
            Lexeme::Op(_) | Lexeme::Close => None,
        }
    }
}
