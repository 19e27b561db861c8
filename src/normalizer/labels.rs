//! Scanner for flat label-set strings such as
//! `{service="frontend",environment="prod",remoteService="api"}`.
//!
//! Data frame responses carry one of these per row. The scanner is lenient:
//! a malformed pair (`code=500`, a bare word, an empty key) is skipped up to
//! the next comma outside quotes and scanning carries on, so one damaged
//! label never hides the others. Only an unterminated quoted value ends the
//! scan, since everything after it belongs to that value.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    pairs: Vec<(String, String)>,
}

impl LabelSet {
    pub fn parse(raw: &str) -> Self {
        let inner = raw.trim();
        let inner = inner.strip_prefix('{').unwrap_or(inner);
        let inner = inner.strip_suffix('}').unwrap_or(inner);

        let mut pairs = Vec::new();
        let mut rest = inner;
        loop {
            match next_pair(rest) {
                Step::Pair(pair, remaining) => {
                    pairs.push(pair);
                    rest = remaining;
                }
                Step::Skip(remaining) => rest = remaining,
                Step::End => break,
            }
        }
        Self { pairs }
    }

    /// First value recorded for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

enum Step<'a> {
    Pair((String, String), &'a str),
    Skip(&'a str),
    End,
}

fn next_pair(input: &str) -> Step<'_> {
    let input = input.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
    if input.is_empty() {
        return Step::End;
    }

    let Some(eq) = input.find(&['=', ','][..]).filter(|&i| input[i..].starts_with('=')) else {
        return Step::Skip(after_comma(input));
    };
    let key = input[..eq].trim();
    let after_key = &input[eq + 1..];
    if key.is_empty() {
        return Step::Skip(after_comma(after_key));
    }

    let Some(quoted) = after_key.trim_start().strip_prefix('"') else {
        return Step::Skip(after_comma(after_key));
    };

    let mut value = String::with_capacity(quoted.len());
    let mut chars = quoted.char_indices();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some((_, '\\')) => value.push('\\'),
                Some((_, '"')) => value.push('"'),
                Some((_, 'n')) => value.push('\n'),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => return Step::End,
            },
            '"' => {
                let rest = &quoted[idx + ch.len_utf8()..];
                return Step::Pair((key.to_string(), value), rest);
            }
            _ => value.push(ch),
        }
    }
    // unterminated value
    Step::End
}

/// Remainder after the next comma that is not inside a quoted value, or
/// the empty string when there is none.
fn after_comma(input: &str) -> &str {
    let mut in_quotes = false;
    let mut chars = input.char_indices();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\\' if in_quotes => {
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return &input[idx + 1..],
            _ => {}
        }
    }
    ""
}
