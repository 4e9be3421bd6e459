//! Conversion of TeX markup found in BibTeX values into Markdown-friendly text.

/// Accent commands that take a single-letter argument.
const ACCENTS: &[char] = &[
    '\'', '`', '^', '"', '~', '=', '.', 'u', 'v', 'H', 'c', 'r', 'k', 'd', 'b', 't',
];

/// Convert a TeX-flavoured value into plain text.
///
/// Grouping braces are removed, accents are composed into Unicode, escaped
/// specials are unescaped, and `\emph`/`\textit`/`\textbf` become Markdown
/// emphasis.
pub fn to_text(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    convert(&chars, &mut out);
    collapse_whitespace(&out)
}

/// Lowercase a title except its first character and brace-protected text.
pub fn sentence_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut depth = 0usize;
    let mut seen_first = false;
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                depth += 1;
                seen_first = true;
                out.push(ch);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                out.push(ch);
            }
            '\\' if depth == 0 => {
                // Keep control words untouched so commands like \LaTeX survive.
                out.push(ch);
                while let Some(&next) = chars.peek() {
                    if !next.is_ascii_alphabetic() {
                        break;
                    }
                    out.push(next);
                    chars.next();
                }
            }
            _ if depth > 0 => out.push(ch),
            _ if !seen_first && ch.is_alphabetic() => {
                seen_first = true;
                out.extend(ch.to_uppercase());
            }
            _ => out.extend(ch.to_lowercase()),
        }
    }
    out
}

/// Replace `--`/`-` style page ranges with an en dash.
pub fn dashify(pages: &str) -> String {
    let mut parts = pages.split('-').map(str::trim).filter(|part| !part.is_empty());
    match (parts.next(), parts.next()) {
        (Some(start), Some(end)) => format!("{start}\u{2013}{end}"),
        _ => pages.trim().to_string(),
    }
}

fn convert(chars: &[char], out: &mut String) {
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '\\' => i = control_sequence(chars, i + 1, out),
            '{' | '}' | '$' => i += 1,
            '~' => {
                out.push(' ');
                i += 1;
            }
            '-' => {
                let run = chars[i..].iter().take_while(|&&c| c == '-').count();
                match run {
                    1 => out.push('-'),
                    2 => out.push('\u{2013}'),
                    _ => out.push('\u{2014}'),
                }
                i += run.min(3);
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }
}

/// Handle a control sequence starting after the backslash at `start`.
/// Returns the index following the consumed input.
fn control_sequence(chars: &[char], start: usize, out: &mut String) -> usize {
    let Some(&first) = chars.get(start) else {
        return start;
    };

    if !first.is_ascii_alphabetic() {
        let next = start + 1;
        return match first {
            c if ACCENTS.contains(&c) => accent(c, chars, next, out),
            '&' | '%' | '$' | '_' | '#' | '{' | '}' => {
                out.push(first);
                next
            }
            '\\' | ' ' => {
                out.push(' ');
                next
            }
            '-' | '/' => next,
            other => {
                out.push(other);
                next
            }
        };
    }

    let end = start
        + chars[start..]
            .iter()
            .take_while(|c| c.is_ascii_alphabetic())
            .count();
    let word: String = chars[start..end].iter().collect();
    let mut next = end;

    if word.len() == 1 {
        let letter = word.chars().next().unwrap_or_default();
        if ACCENTS.contains(&letter) {
            return accent(letter, chars, skip_spaces(chars, next), out);
        }
    }

    match word.as_str() {
        "emph" | "textit" | "textsl" => {
            next = skip_spaces(chars, next);
            return wrapped_argument(chars, next, "*", out);
        }
        "textbf" => {
            next = skip_spaces(chars, next);
            return wrapped_argument(chars, next, "**", out);
        }
        _ => {}
    }

    if let Some(symbol) = symbol(&word) {
        out.push_str(symbol);
        // TeX swallows the space after a control word; keep braces from `{\ss}x`.
        return skip_spaces(chars, next);
    }

    // Unknown commands are dropped; their arguments stay in the text.
    skip_spaces(chars, next)
}

fn symbol(word: &str) -> Option<&'static str> {
    Some(match word {
        "ss" => "ß",
        "o" => "ø",
        "O" => "Ø",
        "ae" => "æ",
        "AE" => "Æ",
        "oe" => "œ",
        "OE" => "Œ",
        "aa" => "å",
        "AA" => "Å",
        "l" => "ł",
        "L" => "Ł",
        "i" => "ı",
        "j" => "ȷ",
        "textendash" => "\u{2013}",
        "textemdash" => "\u{2014}",
        "ldots" | "dots" | "textellipsis" => "\u{2026}",
        "textbackslash" => "\\",
        "LaTeX" => "LaTeX",
        "TeX" => "TeX",
        "BibTeX" => "BibTeX",
        _ => return None,
    })
}

fn accent(kind: char, chars: &[char], start: usize, out: &mut String) -> usize {
    let (argument, next) = match chars.get(start) {
        Some('{') => {
            let end = matching_brace(chars, start);
            let mut inner = String::new();
            convert(&chars[start + 1..end.min(chars.len())], &mut inner);
            (inner, (end + 1).min(chars.len()))
        }
        Some('\\') => {
            let mut inner = String::new();
            let next = control_sequence(chars, start + 1, &mut inner);
            (inner, next)
        }
        Some(&c) => (c.to_string(), start + 1),
        None => (String::new(), start),
    };

    let mut letters = argument.chars();
    match letters.next() {
        Some(base) => {
            let base = match base {
                'ı' => 'i',
                'ȷ' => 'j',
                other => other,
            };
            out.push(compose(kind, base).unwrap_or(base));
            out.extend(letters);
        }
        None => {
            if kind == '~' {
                out.push('~');
            }
        }
    }
    next
}

fn compose(kind: char, base: char) -> Option<char> {
    let (from, to) = match kind {
        '\'' => ("aeiouyAEIOUYcnszCNSZ", "áéíóúýÁÉÍÓÚÝćńśźĆŃŚŹ"),
        '`' => ("aeiouAEIOU", "àèìòùÀÈÌÒÙ"),
        '^' => ("aeiouAEIOU", "âêîôûÂÊÎÔÛ"),
        '"' => ("aeiouyAEIOUY", "äëïöüÿÄËÏÖÜŸ"),
        '~' => ("anoANO", "ãñõÃÑÕ"),
        'c' => ("csCS", "çşÇŞ"),
        'v' => ("cszrneCSZRNE", "čšžřňěČŠŽŘŇĚ"),
        'u' => ("agAG", "ăğĂĞ"),
        'H' => ("ouOU", "őűŐŰ"),
        '=' => ("aeiouAEIOU", "āēīōūĀĒĪŌŪ"),
        '.' => ("zZI", "żŻİ"),
        'r' => ("aA", "åÅ"),
        'k' => ("aeAE", "ąęĄĘ"),
        _ => return None,
    };
    from.chars()
        .zip(to.chars())
        .find_map(|(plain, accented)| (plain == base).then_some(accented))
}

fn wrapped_argument(chars: &[char], start: usize, marker: &str, out: &mut String) -> usize {
    if chars.get(start) != Some(&'{') {
        return start;
    }
    let end = matching_brace(chars, start);
    let mut inner = String::new();
    convert(&chars[start + 1..end.min(chars.len())], &mut inner);
    let inner = inner.trim();
    if !inner.is_empty() {
        out.push_str(marker);
        out.push_str(inner);
        out.push_str(marker);
    }
    (end + 1).min(chars.len())
}

/// Index of the brace closing the group opened at `open`, or `chars.len()`.
fn matching_brace(chars: &[char], open: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
        i += 1;
    }
    chars.len()
}

fn skip_spaces(chars: &[char], mut i: usize) -> usize {
    while chars.get(i).is_some_and(|c| *c == ' ') {
        i += 1;
    }
    i
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
