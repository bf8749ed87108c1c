//! Text machinery shared by the regex backends.
//!
//! None of these helpers understand a grammar. They count delimiters and
//! keywords, skip string literals, and keep byte offsets stable so that a
//! match found in a masked or blanked view can be mapped back to the original
//! line numbers.

use crate::model::Annotation;

/// Comment syntax of a source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `//` and `/* */`
    CLike,
    /// `//`, `/* */` and `#` (but not `#[`)
    Php,
    /// `#` to end of line
    Hash,
}

/// Returns the index just past the string literal starting at `i`.
///
/// Triple-quoted and backtick strings may span lines; ordinary quoted strings
/// end at the first unescaped newline so that a stray apostrophe cannot
/// swallow the rest of the file.
fn skip_string(bytes: &[u8], i: usize) -> usize {
    let quote = bytes[i];
    let triple = quote != b'`'
        && bytes.len() >= i + 3
        && bytes[i + 1] == quote
        && bytes[i + 2] == quote;
    if triple {
        let mut j = i + 3;
        while j + 2 < bytes.len() {
            if bytes[j] == quote && bytes[j + 1] == quote && bytes[j + 2] == quote {
                return j + 3;
            }
            j += 1;
        }
        return bytes.len();
    }
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'\n' if quote != b'`' => return j,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

fn is_quote(c: u8) -> bool {
    matches!(c, b'"' | b'\'' | b'`')
}

/// Replace comments with spaces, preserving byte offsets and newlines.
pub fn mask_comments(text: &str, style: CommentStyle) -> String {
    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if is_quote(c) {
            i = skip_string(bytes, i);
            continue;
        }
        let next = bytes.get(i + 1).copied();
        let line_comment = match style {
            CommentStyle::CLike => c == b'/' && next == Some(b'/'),
            CommentStyle::Php => (c == b'/' && next == Some(b'/')) || (c == b'#' && next != Some(b'[')),
            CommentStyle::Hash => c == b'#' && next != Some(b'{'),
        };
        if line_comment {
            while i < bytes.len() && bytes[i] != b'\n' {
                out[i] = b' ';
                i += 1;
            }
            continue;
        }
        if style != CommentStyle::Hash && c == b'/' && next == Some(b'*') {
            let mut j = i;
            while j < bytes.len() && !(bytes[j] == b'*' && bytes.get(j + 1) == Some(&b'/')) {
                if bytes[j] != b'\n' {
                    out[j] = b' ';
                }
                j += 1;
            }
            let end = (j + 2).min(bytes.len());
            for b in out.iter_mut().take(end).skip(j) {
                *b = b' ';
            }
            i = end;
            continue;
        }
        i += 1;
    }
    // Only ASCII bytes and whole multi-byte runs inside comments were replaced.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Replace the contents of string literals with spaces, keeping the quotes.
pub fn blank_strings(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        if is_quote(bytes[i]) {
            let end = skip_string(bytes, i);
            for j in (i + 1)..end.saturating_sub(1) {
                if out[j] != b'\n' {
                    out[j] = b' ';
                }
            }
            i = end;
        } else {
            i += 1;
        }
    }
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Replace every byte in `spans` with a space, keeping newlines.
pub fn blank_spans(text: &str, spans: &[(usize, usize)]) -> String {
    let mut out = text.as_bytes().to_vec();
    for &(start, end) in spans {
        let end = end.min(out.len());
        for b in out.iter_mut().take(end).skip(start) {
            if *b != b'\n' {
                *b = b' ';
            }
        }
    }
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Blank the inside of every brace pair, leaving the braces themselves.
pub fn blank_brace_contents(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if is_quote(bytes[i]) {
            i = skip_string(bytes, i);
            continue;
        }
        if bytes[i] == b'{' {
            match find_matching(text, i) {
                Some(close) => {
                    spans.push((i + 1, close));
                    i = close + 1;
                }
                None => {
                    spans.push((i + 1, bytes.len()));
                    break;
                }
            }
            continue;
        }
        i += 1;
    }
    blank_spans(text, &spans)
}

/// 1-based line number of byte `offset` in `text`.
pub fn line_at(text: &str, offset: usize) -> usize {
    let offset = offset.min(text.len());
    1 + text.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count()
}

/// Byte offset of the start of the line containing `offset`.
pub fn line_start(text: &str, offset: usize) -> usize {
    let offset = offset.min(text.len());
    text.as_bytes()[..offset]
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|p| p + 1)
        .unwrap_or(0)
}

/// Index of the delimiter closing the one at `open`, skipping strings.
///
/// Supports `(`, `[`, `{` and `<`. Returns `None` when the input ends first.
pub fn find_matching(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let open_char = *bytes.get(open)?;
    let close_char = match open_char {
        b'(' => b')',
        b'[' => b']',
        b'{' => b'}',
        b'<' => b'>',
        _ => return None,
    };
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        let c = bytes[i];
        if is_quote(c) && open_char != b'<' {
            i = skip_string(bytes, i);
            continue;
        }
        if c == open_char {
            depth += 1;
        } else if c == close_char {
            if close_char == b'>' && i > 0 && matches!(bytes[i - 1], b'-' | b'=') {
                i += 1;
                continue;
            }
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// A delimited body located inside some text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Offset of the opening delimiter (or opening keyword)
    pub open: usize,
    /// First byte of the body
    pub start: usize,
    /// One past the last byte of the body
    pub end: usize,
    /// False when no closer was found before the end of input
    pub terminated: bool,
    /// Offset where scanning should resume after this construct
    pub after: usize,
}

impl Block {
    pub fn body<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Find the brace body of the construct starting at `from`.
///
/// Scans forward to the first `{` outside parentheses and strings; any byte
/// in `stops` seen first (at parenthesis depth 0) means the construct has no
/// body. An unterminated body yields an empty block rather than an error.
pub fn brace_block(text: &str, from: usize, stops: &[u8]) -> Option<Block> {
    let bytes = text.as_bytes();
    let mut i = from;
    let mut parens = 0i32;
    while i < bytes.len() {
        let c = bytes[i];
        if is_quote(c) {
            i = skip_string(bytes, i);
            continue;
        }
        match c {
            b'(' | b'[' => parens += 1,
            b')' | b']' => parens = (parens - 1).max(0),
            b'{' if parens == 0 => break,
            _ if parens == 0 && stops.contains(&c) => return None,
            _ => {}
        }
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }
    let open = i;
    Some(match find_matching(text, open) {
        Some(close) => Block {
            open,
            start: open + 1,
            end: close,
            terminated: true,
            after: close + 1,
        },
        None => Block {
            open,
            start: open + 1,
            end: open + 1,
            terminated: false,
            after: open + 1,
        },
    })
}

/// Keyword rules for `do ... end` style languages.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRules {
    /// Openers counted only in statement position (line start, after `=` or `;`)
    pub statement_openers: &'static [&'static str],
    /// Openers counted wherever they appear as a whole word
    pub anywhere_openers: &'static [&'static str],
    /// Statement openers whose optional trailing `do` must not count twice
    pub loop_openers: &'static [&'static str],
    pub closer: &'static str,
}

pub static RUBY_BLOCKS: KeywordRules = KeywordRules {
    statement_openers: &[
        "if", "unless", "while", "until", "case", "begin", "def", "class", "module", "for",
    ],
    anywhere_openers: &["do"],
    loop_openers: &["while", "until", "for"],
    closer: "end",
};

pub static ELIXIR_BLOCKS: KeywordRules = KeywordRules {
    statement_openers: &[],
    anywhere_openers: &["do", "fn"],
    loop_openers: &[],
    closer: "end",
};

fn is_word_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Whole words of `line` with their byte offsets and statement-position flag.
fn words(line: &str) -> Vec<(usize, &str, bool)> {
    let bytes = line.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    let mut statement = true;
    while i < bytes.len() {
        let c = bytes[i];
        if is_word_byte(c) {
            let start = i;
            while i < bytes.len() && is_word_byte(bytes[i]) {
                i += 1;
            }
            while i < bytes.len() && matches!(bytes[i], b'?' | b'!') {
                i += 1;
            }
            let prev = if start > 0 { bytes[start - 1] } else { b' ' };
            let next = bytes.get(i).copied().unwrap_or(b' ');
            // `.end`, `:end`, `@end`, `end:` are not keywords
            let qualified = matches!(prev, b'.' | b':' | b'@' | b'$') || next == b':';
            if !qualified {
                out.push((start, &line[start..i], statement));
            }
            statement = false;
            continue;
        }
        match c {
            b'=' | b';' => statement = true,
            b' ' | b'\t' | b'\r' => {}
            _ => statement = false,
        }
        i += 1;
    }
    out
}

/// Find the `end`-terminated body of the construct starting at `from`.
///
/// The first line (from `from` to its newline) must open at least one block;
/// otherwise `None` is returned. The body starts on the following line and
/// ends before the matching closer. Unterminated blocks yield an empty body.
pub fn keyword_block(text: &str, from: usize, rules: &KeywordRules) -> Option<Block> {
    let clean = blank_strings(text);
    let mut depth = 0i32;
    let mut offset = from;
    let mut first = true;
    let mut body_start = None;
    let mut open = None;

    while offset < clean.len() {
        let line_end = clean[offset..]
            .find('\n')
            .map(|p| offset + p)
            .unwrap_or(clean.len());
        let line = &clean[offset..line_end];
        let endless_def = rules.statement_openers.contains(&"def") && is_endless_def(line);
        let mut loop_line = false;

        for (pos, word, statement) in words(line) {
            let opens = (statement
                && rules.statement_openers.contains(&word)
                && !(word == "def" && endless_def))
                || (rules.anywhere_openers.contains(&word) && !(word == "do" && loop_line));
            if statement && rules.loop_openers.contains(&word) {
                loop_line = true;
            }
            if opens {
                if open.is_none() {
                    open = Some(offset + pos);
                }
                depth += 1;
            } else if word == rules.closer && depth > 0 {
                depth -= 1;
                if depth == 0 {
                    let start = body_start.unwrap_or(offset + pos);
                    let end = (offset + pos).max(start);
                    return Some(Block {
                        open: open.unwrap_or(from),
                        start,
                        end,
                        terminated: true,
                        after: offset + pos + rules.closer.len(),
                    });
                }
            }
        }

        if first {
            if depth == 0 {
                return None;
            }
            first = false;
            body_start = Some((line_end + 1).min(clean.len()));
        }
        offset = line_end + 1;
    }

    let start = body_start.unwrap_or(clean.len());
    Some(Block {
        open: open.unwrap_or(from),
        start,
        end: start,
        terminated: false,
        after: start,
    })
}

/// `def name(args) = expr` has no closing `end`.
fn is_endless_def(line: &str) -> bool {
    let trimmed = line.trim_start();
    let Some(rest) = trimmed.strip_prefix("def ") else {
        return false;
    };
    let bytes = rest.as_bytes();
    let mut i = 0;
    let mut parens = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => parens += 1,
            b')' => parens -= 1,
            b'=' if parens == 0 => {
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                return !matches!(next, b'=' | b'~' | b'>') && !matches!(prev, b'!' | b'<' | b'>' | b'=');
            }
            _ => {}
        }
        i += 1;
    }
    false
}

/// Split `text` on `sep` at nesting depth 0, outside string literals.
///
/// Tracks `()`, `[]`, `{}` and `<>` so generic types such as
/// `Dictionary<string, int>` and nested calls stay in one segment.
/// Empty segments are dropped and each segment is trimmed.
pub fn split_top_level(text: &str, sep: u8) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut angle = 0i32;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if is_quote(c) {
            i = skip_string(bytes, i);
            continue;
        }
        match c {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = (depth - 1).max(0),
            b'<' => {
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                if next != b'=' && next != b'<' {
                    angle += 1;
                }
            }
            b'>' => {
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                if !matches!(prev, b'-' | b'=') && angle > 0 {
                    angle -= 1;
                }
            }
            _ if c == sep && depth == 0 && angle == 0 => {
                parts.push(text[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(text[start..].trim().to_string());
    parts.retain(|p| !p.is_empty());
    parts
}

/// The inner text when `raw` is a single quoted string literal.
///
/// Accepts `"..."`, `'...'`, `` `...` ``, triple quotes, and the common
/// literal prefixes (`r"..."`, `f'...'`, `@"..."`, `$"..."`, `r#"..."#`).
pub fn string_literal(raw: &str) -> Option<String> {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("r#") {
        s = rest.strip_suffix('#').unwrap_or(rest);
    }
    let prefix_len = s
        .bytes()
        .take_while(|b| matches!(b, b'r' | b'b' | b'f' | b'u' | b'R' | b'B' | b'F' | b'U' | b'@' | b'$'))
        .count();
    if prefix_len <= 2 && s.len() > prefix_len && is_quote(s.as_bytes()[prefix_len]) {
        s = &s[prefix_len..];
    }
    let bytes = s.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    let quote = bytes[0];
    if !is_quote(quote) || bytes[bytes.len() - 1] != quote {
        return None;
    }
    let len = bytes.len();
    // quotes are ASCII, so slicing three bytes in from either end stays on a char boundary
    let triple = len >= 6 && bytes[..3].iter().all(|&b| b == quote) && bytes[len - 3..].iter().all(|&b| b == quote);
    let inner = if triple {
        &s[3..len - 3]
    } else {
        &s[1..s.len() - 1]
    };
    if skip_string(bytes, 0) != bytes.len() {
        return None;
    }
    Some(inner.replace(&format!("\\{}", quote as char), &(quote as char).to_string()))
}

/// Unquote a string literal, or return the trimmed text unchanged.
pub fn unquote(raw: &str) -> String {
    string_literal(raw).unwrap_or_else(|| raw.trim().to_string())
}

/// Ruby/Elixir symbol or string name: `:users`, `"users"`, `users:`.
pub fn symbol_name(raw: &str) -> String {
    let s = raw.trim();
    let s = s.strip_prefix(':').unwrap_or(s);
    let s = s.strip_suffix(':').unwrap_or(s);
    unquote(s)
}

/// Items of a bracketed list literal: `[:a, :b]`, `['a', 'b']`, `%w[a b]`.
pub fn list_items(raw: &str) -> Vec<String> {
    let s = raw.trim();
    if let Some(inner) = s
        .strip_prefix("%w[")
        .or_else(|| s.strip_prefix("%i["))
        .and_then(|r| r.strip_suffix(']'))
    {
        return inner.split_whitespace().map(|w| w.to_string()).collect();
    }
    let inner = s
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .or_else(|| s.strip_prefix('{').and_then(|r| r.strip_suffix('}')))
        .unwrap_or(s);
    split_top_level(inner, b',')
        .iter()
        .map(|item| symbol_name(item))
        .filter(|item| !item.is_empty())
        .collect()
}

/// Marker syntax for annotations preceding a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationSyntax {
    /// `@Name` / `@Name(args)` (Java, Kotlin, TypeScript, Swift, Scala)
    At,
    /// `[Name]` / `[A, B(args)]` (C#)
    Bracket,
    /// `#[Name(args)]` (PHP)
    HashBracket,
    /// `@name value` to end of line (Elixir module attributes)
    ModuleAttr,
}

impl AnnotationSyntax {
    fn starts_line(&self, trimmed: &str) -> bool {
        match self {
            AnnotationSyntax::At | AnnotationSyntax::ModuleAttr => trimmed.starts_with('@'),
            AnnotationSyntax::Bracket => trimmed.starts_with('['),
            AnnotationSyntax::HashBracket => trimmed.starts_with("#["),
        }
    }
}

/// True when `line` holds nothing but annotations (the last may be left open).
fn annotation_only(line: &str, syntax: AnnotationSyntax) -> bool {
    if syntax == AnnotationSyntax::ModuleAttr {
        return true;
    }
    let bytes = line.as_bytes();
    let mut i = 0;
    loop {
        while i < bytes.len() && matches!(bytes[i], b' ' | b'\t') {
            i += 1;
        }
        if i >= bytes.len() {
            return true;
        }
        let open = match syntax {
            AnnotationSyntax::At if bytes[i] == b'@' => {
                let mut j = i + 1;
                while j < bytes.len() && (is_word_byte(bytes[j]) || matches!(bytes[j], b'.' | b':')) {
                    j += 1;
                }
                if bytes.get(j) != Some(&b'(') {
                    i = j;
                    continue;
                }
                j
            }
            AnnotationSyntax::Bracket if bytes[i] == b'[' => i,
            AnnotationSyntax::HashBracket if bytes[i] == b'#' && bytes.get(i + 1) == Some(&b'[') => i + 1,
            _ => return false,
        };
        match find_matching(line, open) {
            Some(close) => i = close + 1,
            None => return true,
        }
    }
}

/// Net closers minus openers of `()`/`[]` on a line, ignoring strings.
fn paren_balance(line: &str) -> i32 {
    let bytes = line.as_bytes();
    let mut balance = 0;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if is_quote(c) {
            i = skip_string(bytes, i);
            continue;
        }
        match c {
            b')' | b']' => balance += 1,
            b'(' | b'[' => balance -= 1,
            _ => {}
        }
        i += 1;
    }
    balance
}

/// Collect the annotations attached to the declaration starting at `start`.
///
/// Walks backward through the immediately preceding lines while they match
/// the annotation grammar (following multi-line argument lists through their
/// parentheses), then adds annotations written on the declaration's own line
/// before `start`. Results are in source order. `base_line` is the line number
/// of `text`'s first line.
pub fn annotations_before(
    text: &str,
    start: usize,
    syntax: AnnotationSyntax,
    base_line: usize,
) -> Vec<Annotation> {
    let decl_line_start = line_start(text, start);
    let mut region_start = decl_line_start;
    let mut balance = 0;

    let mut cursor = decl_line_start;
    while cursor > 0 {
        let prev_start = line_start(text, cursor - 1);
        let line = &text[prev_start..cursor - 1];
        let trimmed = line.trim();
        if trimmed.is_empty() && balance == 0 {
            break;
        }
        balance += paren_balance(line);
        if syntax.starts_line(trimmed) && balance <= 0 && annotation_only(trimmed, syntax) {
            balance = 0;
            region_start = prev_start;
        } else if balance <= 0 {
            break;
        }
        cursor = prev_start;
    }

    let region = &text[region_start..start];
    parse_annotations(region, syntax, base_line + line_at(text, region_start) - 1)
}

/// Parse every annotation in `region`. `first_line` is the line of `region[0]`.
pub fn parse_annotations(region: &str, syntax: AnnotationSyntax, first_line: usize) -> Vec<Annotation> {
    let bytes = region.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if is_quote(c) {
            i = skip_string(bytes, i);
            continue;
        }
        match syntax {
            AnnotationSyntax::At | AnnotationSyntax::ModuleAttr if c == b'@' => {
                let name_start = i + 1;
                let mut j = name_start;
                while j < bytes.len() && (is_word_byte(bytes[j]) || matches!(bytes[j], b'.' | b':')) {
                    j += 1;
                }
                let raw_name = region[name_start..j].trim_end_matches([':', '.']);
                if raw_name.is_empty() {
                    i = j.max(i + 1);
                    continue;
                }
                // Kotlin use-site targets: `@field:JsonProperty`
                let name = raw_name.rsplit(':').next().unwrap_or(raw_name);
                let mut ann = Annotation::new(name, first_line + line_at(region, i) - 1);
                let mut k = j;
                while k < bytes.len() && matches!(bytes[k], b' ' | b'\t') {
                    k += 1;
                }
                if syntax == AnnotationSyntax::At && bytes.get(k) == Some(&b'(') {
                    if let Some(close) = find_matching(region, k) {
                        let (args, named) = parse_annotation_args(&region[k + 1..close]);
                        ann.args = args;
                        ann.named_args = named;
                        j = close + 1;
                    }
                } else if syntax == AnnotationSyntax::ModuleAttr {
                    let line_end = region[k..].find('\n').map(|p| k + p).unwrap_or(region.len());
                    let value = region[k..line_end].trim();
                    if !value.is_empty() {
                        ann.args.push(value.to_string());
                    }
                    j = line_end;
                }
                out.push(ann);
                i = j;
            }
            AnnotationSyntax::Bracket if c == b'[' => {
                i = parse_bracket_group(region, i, i + 1, first_line, &mut out);
            }
            AnnotationSyntax::HashBracket if c == b'#' && bytes.get(i + 1) == Some(&b'[') => {
                i = parse_bracket_group(region, i + 1, i + 2, first_line, &mut out);
            }
            _ => i += 1,
        }
    }
    out
}

/// Parse `[A, B(x)]` starting at `open`; returns the offset after `]`.
fn parse_bracket_group(
    region: &str,
    open: usize,
    content_start: usize,
    first_line: usize,
    out: &mut Vec<Annotation>,
) -> usize {
    let Some(close) = find_matching(region, open) else {
        return region.len();
    };
    let line = first_line + line_at(region, open) - 1;
    for item in split_top_level(&region[content_start..close], b',') {
        // `[return: NotNull]`, `[assembly: X]`
        let item = match item.split_once(':') {
            Some((target, rest)) if target.trim().chars().all(|c| c.is_ascii_alphabetic()) && !rest.starts_with(':') => rest.trim().to_string(),
            _ => item,
        };
        let name_len = item
            .bytes()
            .take_while(|&b| is_word_byte(b) || b == b'.' || b == b'\\')
            .count();
        if name_len == 0 || !item.as_bytes()[0].is_ascii_alphabetic() && item.as_bytes()[0] != b'\\' {
            continue;
        }
        let name = item[..name_len].trim_start_matches('\\');
        let mut ann = Annotation::new(name, line);
        let rest = item[name_len..].trim_start();
        if rest.starts_with('(') {
            if let Some(end) = find_matching(rest, 0) {
                let (args, named) = parse_annotation_args(&rest[1..end]);
                ann.args = args;
                ann.named_args = named;
            }
        }
        out.push(ann);
    }
    close + 1
}

/// Split annotation arguments into positional and named (`key = v`, `key: v`).
pub fn parse_annotation_args(args: &str) -> (Vec<String>, Vec<(String, String)>) {
    let mut positional = Vec::new();
    let mut named = Vec::new();
    for part in split_top_level(args, b',') {
        match split_named_arg(&part) {
            Some((key, value)) => named.push((key, value)),
            None => positional.push(part),
        }
    }
    (positional, named)
}

/// `name = value` or `name: value`, but not `a == b`, `a => b` or `A::b`.
pub fn split_named_arg(part: &str) -> Option<(String, String)> {
    let bytes = part.as_bytes();
    let ident_len = bytes.iter().take_while(|&&b| is_word_byte(b)).count();
    if ident_len == 0 || bytes[0].is_ascii_digit() {
        return None;
    }
    let mut i = ident_len;
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t') {
        i += 1;
    }
    let sep = *bytes.get(i)?;
    let next = bytes.get(i + 1).copied().unwrap_or(b' ');
    let named = match sep {
        b'=' => !matches!(next, b'=' | b'>'),
        b':' => next != b':',
        _ => false,
    };
    if !named {
        return None;
    }
    Some((part[..ident_len].to_string(), part[i + 1..].trim().to_string()))
}
