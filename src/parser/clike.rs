//! Declaration scanning shared by the brace-delimited regex backends.
//!
//! A file is viewed twice: `masked` has comments blanked, `clean` also has
//! string contents blanked. Both keep every byte offset of the original, so
//! structure is found in `clean` and literal values are read from `masked`.

use crate::lexer::{
    annotations_before, blank_strings, brace_block, find_matching, line_at, mask_comments,
    parse_annotations, split_top_level, AnnotationSyntax, Block, CommentStyle,
};
use crate::model::{Annotation, DeclKind};
use regex::Regex;
use std::collections::HashMap;

pub struct Text {
    pub masked: String,
    pub clean: String,
}

impl Text {
    pub fn new(content: &str, style: CommentStyle) -> Self {
        let masked = mask_comments(content, style);
        let clean = blank_strings(&masked);
        Self { masked, clean }
    }

    pub fn line(&self, offset: usize) -> usize {
        line_at(&self.masked, offset)
    }

    /// Comment-masked source between two offsets, string literals intact.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        let end = end.min(self.masked.len());
        self.masked.get(start.min(end)..end).unwrap_or("")
    }

    /// Comma-separated arguments of the call whose `(` is at `open`.
    pub fn call_args(&self, open: usize) -> Option<(Vec<String>, usize)> {
        let close = find_matching(&self.clean, open)?;
        Some((split_top_level(self.slice(open + 1, close), b','), close))
    }
}

/// A type declaration with its header and brace body.
#[derive(Debug, Clone)]
pub struct TypeSpan {
    pub kind: DeclKind,
    /// Keyword as written (`class`, `data class`, `record struct`, ...)
    pub keyword: String,
    pub name: String,
    pub start: usize,
    pub line: usize,
    /// Text between the name and the body (generics, bases, primary constructor)
    pub header: String,
    pub body: Option<Block>,
    /// Qualified name of the enclosing type, if nested
    pub outer: Option<String>,
    pub annotations: Vec<Annotation>,
}

impl TypeSpan {
    pub fn contains(&self, offset: usize) -> bool {
        self.body
            .map(|b| b.start <= offset && offset < b.end)
            .unwrap_or(false)
    }

    pub fn qualified_name(&self) -> String {
        match &self.outer {
            Some(outer) => format!("{}.{}", outer, self.name),
            None => self.name.clone(),
        }
    }
}

/// Find every declaration matched by `pattern` (named groups `kind` and `name`).
///
/// The body is the first brace block after the name unless a byte of `stops`
/// comes first. Nested declarations get the qualified name of the innermost
/// enclosing one as `outer`.
pub fn type_spans(
    text: &Text,
    pattern: &Regex,
    stops: &[u8],
    syntax: AnnotationSyntax,
    kind_of: impl Fn(&str) -> Option<DeclKind>,
) -> Vec<TypeSpan> {
    let mut spans: Vec<TypeSpan> = Vec::new();
    for cap in pattern.captures_iter(&text.clean) {
        let (Some(kind_match), Some(name_match)) = (cap.name("kind"), cap.name("name")) else {
            continue;
        };
        let keyword = kind_match.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
        let Some(kind) = kind_of(&keyword) else {
            continue;
        };
        let body = brace_block(&text.clean, name_match.end(), stops);
        let header_end = match body {
            Some(b) => b.open,
            None => stop_offset(&text.clean, name_match.end(), stops),
        };
        let start = kind_match.start();
        let outer = spans
            .iter()
            .filter(|s| s.contains(start))
            .max_by_key(|s| s.body.map(|b| b.start).unwrap_or(0))
            .map(|s| s.qualified_name());
        spans.push(TypeSpan {
            kind,
            keyword,
            name: name_match.as_str().to_string(),
            start,
            line: text.line(start),
            header: text.slice(name_match.end(), header_end).trim().to_string(),
            body,
            outer,
            annotations: annotations_before(&text.masked, start, syntax, 1),
        });
    }
    spans
}

fn stop_offset(text: &str, from: usize, stops: &[u8]) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = (depth - 1).max(0),
            c if depth == 0 && stops.contains(&c) => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// One member statement of a type body.
#[derive(Debug, Clone)]
pub struct Member {
    pub start: usize,
    pub line: usize,
    pub annotations: Vec<Annotation>,
    /// Declaration text without annotations and body, trimmed
    pub decl: String,
    pub body: Option<Block>,
    /// Text after the body on the same statement (`= 5` after `{ get; set; }`)
    pub trailer: String,
}

/// Split a type body into member statements.
///
/// Statements end at `;` or after a brace block at paren depth 0; with
/// `newline_ends` a line break also ends one unless the statement is
/// visibly incomplete.
pub fn members(text: &Text, body: &Block, syntax: AnnotationSyntax, newline_ends: bool) -> Vec<Member> {
    let bytes = text.clean.as_bytes();
    let end = body.end.min(bytes.len());
    let mut out = Vec::new();
    let mut seg_start = body.start;
    let mut depth = 0i32;
    let mut member_body: Option<Block> = None;
    let mut i = body.start;

    while i < end {
        let c = bytes[i];
        match c {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = (depth - 1).max(0),
            b'{' if depth == 0 && member_body.is_none() => {
                let close = find_matching(&text.clean, i).unwrap_or(end).min(end);
                member_body = Some(Block {
                    open: i,
                    start: i + 1,
                    end: close,
                    terminated: close < end,
                    after: close + 1,
                });
                i = close + 1;
                // `{ get; set; } = value;` continues the same statement
                let mut j = i;
                while j < end && matches!(bytes[j], b' ' | b'\t' | b'\r') {
                    j += 1;
                }
                if j < end && bytes[j] == b'=' {
                    continue;
                }
                if j < end && bytes[j] == b';' {
                    j += 1;
                }
                push_member(text, syntax, seg_start, j.min(end), member_body.take(), &mut out);
                seg_start = j.min(end);
                i = seg_start;
                continue;
            }
            b';' if depth == 0 => {
                push_member(text, syntax, seg_start, i, member_body.take(), &mut out);
                seg_start = i + 1;
            }
            b'\n' if newline_ends && depth == 0 && member_body.is_none() => {
                if !continues(text, seg_start, i, syntax) {
                    push_member(text, syntax, seg_start, i, None, &mut out);
                    seg_start = i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    if seg_start < end {
        push_member(text, syntax, seg_start, end, member_body.take(), &mut out);
    }
    out
}

/// Whether the statement from `start` to the newline at `at` goes on.
fn continues(text: &Text, start: usize, at: usize, syntax: AnnotationSyntax) -> bool {
    let current = text.clean[start..at].trim();
    if current.is_empty() {
        return false;
    }
    if annotation_prefix(current, syntax) == current.len() {
        return true;
    }
    if current.ends_with([',', '=', '.', ':', '(', '|', '&', '+']) || current.ends_with("->") || current.ends_with("=>") {
        return true;
    }
    let next = text.clean[at + 1..].trim_start();
    next.starts_with('.') || next.starts_with("?.") || next.starts_with(':') || next.starts_with("=") || next.starts_with("->")
}

fn push_member(
    text: &Text,
    syntax: AnnotationSyntax,
    start: usize,
    end: usize,
    body: Option<Block>,
    out: &mut Vec<Member>,
) {
    let raw = text.slice(start, end);
    let lead = raw.len() - raw.trim_start().len();
    let raw = raw.trim_start();
    let split = annotation_prefix(raw, syntax);
    let decl_end = body.map(|b| b.open.saturating_sub(start + lead)).unwrap_or(raw.len()).min(raw.len());
    let split = split.min(decl_end);
    let decl = raw[split..decl_end].trim().to_string();
    if decl.is_empty() {
        return;
    }
    let trailer = body
        .map(|b| text.slice(b.after.min(end), end).trim().trim_end_matches(';').trim().to_string())
        .unwrap_or_default();
    let first_line = text.line(start + lead);
    let decl_offset = start + lead + split + (raw[split..].len() - raw[split..].trim_start().len());
    out.push(Member {
        start: decl_offset,
        line: text.line(decl_offset),
        annotations: parse_annotations(&raw[..split], syntax, first_line),
        decl,
        body,
        trailer,
    });
}

/// Length of the leading run of annotations in `text`.
pub fn annotation_prefix(text: &str, syntax: AnnotationSyntax) -> usize {
    let bytes = text.as_bytes();
    let mut i = 0;
    let mut last = 0;
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return if last == 0 { 0 } else { bytes.len() };
        }
        let open = match syntax {
            AnnotationSyntax::At | AnnotationSyntax::ModuleAttr if bytes[i] == b'@' => {
                let mut j = i + 1;
                while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || matches!(bytes[j], b'_' | b'.' | b':')) {
                    j += 1;
                }
                if j == i + 1 {
                    return last;
                }
                let mut k = j;
                while k < bytes.len() && matches!(bytes[k], b' ' | b'\t') {
                    k += 1;
                }
                if bytes.get(k) == Some(&b'(') {
                    k
                } else {
                    i = j;
                    last = i;
                    continue;
                }
            }
            AnnotationSyntax::Bracket if bytes[i] == b'[' => i,
            AnnotationSyntax::HashBracket if bytes[i] == b'#' && bytes.get(i + 1) == Some(&b'[') => i + 1,
            _ => return last,
        };
        match find_matching(text, open) {
            Some(close) => {
                i = close + 1;
                last = i;
            }
            None => return last,
        }
    }
}

/// Annotations and remaining text of one parameter.
pub fn split_param(raw: &str, syntax: AnnotationSyntax, line: usize) -> (Vec<Annotation>, String) {
    let raw = raw.trim();
    let split = annotation_prefix(raw, syntax);
    (
        parse_annotations(&raw[..split], syntax, line),
        raw[split..].trim().to_string(),
    )
}

/// `head(params)tail` when the declaration has a parameter list before any `=`.
pub fn call_split(decl: &str) -> Option<(&str, &str, &str)> {
    let open = decl.find('(')?;
    if let Some(eq) = decl.find('=') {
        if eq < open {
            return None;
        }
    }
    let close = find_matching(decl, open)?;
    Some((decl[..open].trim(), &decl[open + 1..close], decl[close + 1..].trim()))
}

/// Split `text` at the first top-level `=` that is not part of `==`, `=>` or `>=`.
pub fn split_default(text: &str) -> (&str, Option<&str>) {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    for (i, &c) in bytes.iter().enumerate() {
        match c {
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' | b'>' => {
                if !(c == b'>' && i > 0 && bytes[i - 1] == b'=') {
                    depth = (depth - 1).max(0);
                }
            }
            b'=' if depth == 0 => {
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                if !matches!(next, b'=' | b'>') && !matches!(prev, b'=' | b'!' | b'<' | b'>') {
                    return (text[..i].trim(), Some(text[i + 1..].trim()));
                }
            }
            _ => {}
        }
    }
    (text.trim(), None)
}

/// Remove leading keywords in `modifiers`, returning them and the rest.
pub fn strip_words<'a>(text: &'a str, modifiers: &[&str]) -> (Vec<&'a str>, &'a str) {
    let mut rest = text.trim_start();
    let mut found = Vec::new();
    loop {
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let word = &rest[..end];
        if word.is_empty() || !modifiers.contains(&word) {
            return (found, rest);
        }
        found.push(word);
        rest = rest[end..].trim_start();
    }
}

/// Split `Type name` at the last top-level whitespace run.
pub fn type_and_name(text: &str) -> Option<(&str, &str)> {
    let text = text.trim();
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut split = None;
    for (i, &c) in bytes.iter().enumerate() {
        match c {
            b'<' | b'(' | b'[' => depth += 1,
            b'>' | b')' | b']' => depth = (depth - 1).max(0),
            b' ' | b'\t' | b'\n' if depth == 0 => split = Some(i),
            _ => {}
        }
    }
    let i = split?;
    let ty = text[..i].trim();
    let name = text[i..].trim();
    if ty.is_empty() || name.is_empty() {
        return None;
    }
    Some((ty, name))
}

/// Bases listed after a top-level `:` in a type header, generic arguments kept.
pub fn colon_bases(header: &str) -> Vec<String> {
    let bytes = header.as_bytes();
    let mut depth = 0i32;
    for (i, &c) in bytes.iter().enumerate() {
        match c {
            b'<' | b'(' | b'[' => depth += 1,
            b'>' | b')' | b']' => depth = (depth - 1).max(0),
            b':' if depth == 0 => {
                let rest = &header[i + 1..];
                let rest = rest.split(" where ").next().unwrap_or(rest);
                return split_top_level(rest, b',')
                    .into_iter()
                    .map(|b| strip_call(&b).to_string())
                    .filter(|b| !b.is_empty())
                    .collect();
            }
            _ => {}
        }
    }
    Vec::new()
}

/// `Base(args)` -> `Base`.
pub fn strip_call(text: &str) -> &str {
    let text = text.trim();
    match text.find('(') {
        Some(i) if !text[..i].contains('<') || text[..i].ends_with('>') => text[..i].trim(),
        _ => text,
    }
}

/// The leading `<...>` of a header, if any, and the text after it.
pub fn skip_generics(header: &str) -> &str {
    let header = header.trim_start();
    if header.starts_with('<') {
        if let Some(close) = find_matching(header, 0) {
            return header[close + 1..].trim_start();
        }
    }
    header
}

/// The parenthesized list at the start of `text` and the text after it.
pub fn leading_parens(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if !text.starts_with('(') {
        return None;
    }
    let close = find_matching(text, 0)?;
    Some((&text[1..close], &text[close + 1..]))
}

/// Enum constants: the comma list before the first top-level `;` of the body.
pub fn enum_constants(body: &str, syntax: AnnotationSyntax) -> Vec<String> {
    let head = split_top_level(body, b';').into_iter().next().unwrap_or_default();
    split_top_level(&head, b',')
        .into_iter()
        .filter_map(|item| {
            let rest = &item[annotation_prefix(&item, syntax)..];
            let name: String = rest
                .trim_start()
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            (!name.is_empty() && !name.starts_with(|c: char| c.is_ascii_digit())).then_some(name)
        })
        .collect()
}

/// Router variables derived from a parent router with a path prefix.
#[derive(Debug, Default, Clone)]
pub struct GroupVars(HashMap<String, (String, String)>);

impl GroupVars {
    pub fn insert(&mut self, name: &str, parent: &str, prefix: &str) {
        if name != parent {
            self.0.insert(name.to_string(), (parent.to_string(), prefix.to_string()));
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.0.remove(name);
    }

    /// Full prefix of `name`, outermost first: `/api/v1`, or empty.
    pub fn prefix(&self, name: &str) -> String {
        let mut parts = Vec::new();
        let mut current = name;
        while let Some((parent, prefix)) = self.0.get(current) {
            parts.push(prefix.trim_matches('/'));
            current = parent;
            if parts.len() > 32 {
                break;
            }
        }
        parts.retain(|p| !p.is_empty());
        if parts.is_empty() {
            return String::new();
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use pretty_assertions::assert_eq;

    static CLASS: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\b(?P<kind>class|enum)\s+(?P<name>[A-Za-z_]\w*)").unwrap());

    fn kind(keyword: &str) -> Option<DeclKind> {
        match keyword {
            "class" => Some(DeclKind::Class),
            "enum" => Some(DeclKind::Enum),
            _ => None,
        }
    }

    #[test]
    fn test_nested_spans_and_members() {
        let code = r#"
@Entity
class Outer extends Base {
    // class Fake {}
    @Id
    private Long id;
    private String name = "a; b";

    public String getName() { return name; }

    class Inner {
        int x;
    }
}
"#;
        let text = Text::new(code, CommentStyle::CLike);
        let spans = type_spans(&text, &CLASS, b";", AnnotationSyntax::At, kind);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].name, "Outer");
        assert_eq!(spans[0].header, "extends Base");
        assert_eq!(spans[0].annotations[0].name, "Entity");
        assert_eq!(spans[1].outer.as_deref(), Some("Outer"));

        let body = spans[0].body.unwrap();
        let members = members(&text, &body, AnnotationSyntax::At, false);
        let decls: Vec<&str> = members.iter().map(|m| m.decl.as_str()).collect();
        assert_eq!(
            decls,
            vec![
                "private Long id",
                "private String name = \"a; b\"",
                "public String getName()",
                "class Inner",
            ]
        );
        assert_eq!(members[0].annotations[0].name, "Id");
        assert_eq!(members[0].line, 6);
        assert!(members[2].body.is_some());
    }

    #[test]
    fn test_newline_terminated_members() {
        let code = "class A {\n    @Column(name = \"x\")\n    val x: Int = 1\n    val y: List<String> =\n        listOf()\n    fun f(a: Int): Int {\n        return a\n    }\n}\n";
        let text = Text::new(code, CommentStyle::CLike);
        let spans = type_spans(&text, &CLASS, b";\n", AnnotationSyntax::At, kind);
        let members = members(&text, &spans[0].body.unwrap(), AnnotationSyntax::At, true);
        let decls: Vec<&str> = members.iter().map(|m| m.decl.as_str()).collect();
        assert_eq!(decls, vec!["val x: Int = 1", "val y: List<String> =\n        listOf()", "fun f(a: Int): Int"]);
        assert_eq!(members[0].annotations[0].string_named("name").as_deref(), Some("x"));
    }

    #[test]
    fn test_property_trailer() {
        let code = "class A { public string Name { get; set; } = \"x\"; public int Age { get; set; } }";
        let text = Text::new(code, CommentStyle::CLike);
        let spans = type_spans(&text, &CLASS, b";", AnnotationSyntax::Bracket, kind);
        let members = members(&text, &spans[0].body.unwrap(), AnnotationSyntax::Bracket, false);
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].decl, "public string Name");
        assert_eq!(members[0].trailer, "= \"x\"");
        assert_eq!(members[1].decl, "public int Age");
    }

    #[test]
    fn test_unterminated_body() {
        let text = Text::new("class Broken {\n  int x;\n", CommentStyle::CLike);
        let spans = type_spans(&text, &CLASS, b";", AnnotationSyntax::At, kind);
        assert_eq!(spans.len(), 1);
        assert!(!spans[0].body.unwrap().terminated);
    }

    #[test]
    fn test_helpers() {
        assert_eq!(split_default("int x = a == b"), ("int x", Some("a == b")));
        assert_eq!(split_default("Func<int> f => x"), ("Func<int> f => x", None));
        assert_eq!(type_and_name("Map<String, Integer> counts"), Some(("Map<String, Integer>", "counts")));
        assert_eq!(strip_words("public static final int X", &["public", "static", "final"]).1, "int X");
        assert_eq!(colon_bases("<T> : Base<T>(x), IFoo where T : class"), vec!["Base<T>", "IFoo"]);
        assert_eq!(call_split("String get(int a, int b) throws X"), Some(("String get", "int a, int b", "throws X")));
        assert_eq!(call_split("List<X> xs = new ArrayList<>()"), None);
        let mut groups = GroupVars::default();
        groups.insert("api", "app", "/api/");
        groups.insert("v1", "api", "v1");
        assert_eq!(groups.prefix("v1"), "/api/v1");
        assert_eq!(groups.prefix("app"), "");
        assert_eq!(enum_constants("RED, GREEN(2), @Deprecated BLUE; int v;", AnnotationSyntax::At), vec!["RED", "GREEN", "BLUE"]);
    }
}
