//! Query Parser: splits a raw search string into positive terms, negative
//! terms, and quoted phrases.
//!
//! A plain free function rather than a stateful builder, since the whole
//! query fits in one pass over whitespace-separated tokens.

/// A parsed query: `pos` (required substrings, phrases included) and `neg`
/// (forbidden substrings). Case is preserved; lowercasing happens at match
/// time in `Record::contains`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub pos: Vec<String>,
    pub neg: Vec<String>,
}

/// Splits `text` on spaces into `neg` (tokens prefixed `!`), phrases
/// (quoted spans, folded into `pos` with quotes stripped and interior
/// spaces preserved), and `pos` (everything else). Blanks are dropped.
/// An unterminated phrase is discarded entirely, not added to `pos`.
pub fn parse(text: &str) -> ParsedQuery {
    let mut pos = Vec::new();
    let mut neg = Vec::new();

    let mut tokens = text.split(' ').peekable();
    while let Some(tok) = tokens.next() {
        if tok.is_empty() {
            continue;
        }
        if let Some(rest) = tok.strip_prefix('"') {
            let mut phrase_parts = vec![rest.to_string()];
            let mut closed = !rest.is_empty() && rest.ends_with('"');
            if closed {
                phrase_parts[0] = rest.trim_end_matches('"').to_string();
            } else {
                for next in tokens.by_ref() {
                    if let Some(inner) = next.strip_suffix('"') {
                        phrase_parts.push(inner.to_string());
                        closed = true;
                        break;
                    } else {
                        phrase_parts.push(next.to_string());
                    }
                }
            }
            if closed {
                let phrase = phrase_parts.join(" ");
                if !phrase.is_empty() {
                    pos.push(phrase);
                }
            }
            // unterminated phrase: dangling tokens are discarded
            continue;
        }
        if let Some(rest) = tok.strip_prefix('!') {
            if !rest.is_empty() {
                neg.push(rest.to_string());
            }
            continue;
        }
        pos.push(tok.to_string());
    }

    ParsedQuery { pos, neg }
}
