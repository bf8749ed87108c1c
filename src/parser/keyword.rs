//! Statement walking shared by the `do ... end` scanners (Ruby, Elixir).

use super::clike::Text;
use crate::lexer::{find_matching, keyword_block, split_named_arg, split_top_level, symbol_name, Block, KeywordRules};

/// One statement of a block body, with the block it opens if any.
#[derive(Debug, Clone)]
pub struct Statement {
    pub start: usize,
    pub line: usize,
    /// Statement text before its block opener, continuation lines joined
    pub head: String,
    pub block: Option<Block>,
}

impl Statement {
    /// Leading word, receiver included: `resources`, `t.string`, `@primary_key`.
    pub fn keyword(&self) -> &str {
        let end = self
            .head
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '.' | '?' | '!' | '@')))
            .unwrap_or(self.head.len());
        &self.head[..end]
    }

    /// Text after the keyword with one pair of call parentheses removed.
    pub fn args(&self) -> &str {
        let rest = self.head[self.keyword().len()..].trim();
        if rest.starts_with('(') && find_matching(rest, 0) == Some(rest.len() - 1) {
            return rest[1..rest.len() - 1].trim();
        }
        rest
    }

    /// Terminated body of the statement's block.
    pub fn body(&self) -> Option<Block> {
        self.block.filter(|b| b.terminated)
    }
}

/// True when a statement visibly continues on the next line.
fn continues(text: &str) -> bool {
    let trimmed = text.trim_end();
    let mut balance = 0i32;
    for c in trimmed.bytes() {
        match c {
            b'(' | b'[' | b'{' => balance += 1,
            b')' | b']' | b'}' => balance -= 1,
            _ => {}
        }
    }
    balance > 0
        || [",", "\\", "=", "=>", "&&", "||", "."]
            .iter()
            .any(|suffix| trimmed.ends_with(suffix))
}

/// Statements between `start` and `end`, skipping over the blocks they open.
///
/// A block that never closes is reported unterminated and its lines are
/// walked as siblings.
pub fn statements(text: &Text, start: usize, end: usize, rules: &KeywordRules) -> Vec<Statement> {
    let clean = &text.clean;
    let end = end.min(clean.len());
    let line_end = |from: usize| clean[from..end].find('\n').map(|p| from + p).unwrap_or(end);
    let mut out = Vec::new();
    let mut offset = start;
    while offset < end {
        let first_end = line_end(offset);
        let line = &clean[offset..first_end];
        let indent = line.len() - line.trim_start().len();
        if line.trim().is_empty() {
            offset = first_end + 1;
            continue;
        }
        let stmt_start = offset + indent;
        let mut last_line = offset;
        let mut stmt_end = first_end;
        while stmt_end < end && continues(&clean[stmt_start..stmt_end]) {
            last_line = stmt_end + 1;
            stmt_end = line_end(last_line);
        }

        let block = keyword_block(&clean[last_line..end], 0, rules).map(|b| Block {
            open: b.open + last_line,
            start: b.start + last_line,
            end: b.end + last_line,
            terminated: b.terminated,
            after: b.after + last_line,
        });
        let head_end = match block {
            Some(b) if b.open > stmt_start && b.open <= stmt_end => b.open,
            _ => stmt_end,
        };
        let head = text
            .slice(stmt_start, head_end)
            .lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(" ");
        out.push(Statement {
            start: stmt_start,
            line: text.line(stmt_start),
            head: head.trim().to_string(),
            block,
        });
        offset = match block {
            Some(b) if b.terminated => line_end(b.after.min(end)) + 1,
            _ => stmt_end + 1,
        };
    }
    out
}

/// Positional and keyword arguments; `:key => value` counts as keyword.
pub fn call_args(args: &str) -> (Vec<String>, Vec<(String, String)>) {
    let mut positional = Vec::new();
    let mut named = Vec::new();
    for part in split_top_level(args, b',') {
        if let Some((key, value)) = split_named_arg(&part) {
            named.push((key, value));
        } else if let Some((key, value)) = part.split_once("=>").filter(|(k, _)| k.trim().starts_with(':')) {
            named.push((symbol_name(key), value.trim().to_string()));
        } else {
            positional.push(part);
        }
    }
    (positional, named)
}

/// Value of keyword argument `key`.
pub fn named<'a>(named: &'a [(String, String)], key: &str) -> Option<&'a str> {
    named.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{CommentStyle, RUBY_BLOCKS};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_statements_skip_blocks() {
        let code = "resources :users,\n  only: [:index] do\n  get :preview\nend\nroot 'home#index' # landing\n";
        let text = Text::new(code, CommentStyle::Hash);
        let stmts = statements(&text, 0, code.len(), &RUBY_BLOCKS);
        let heads: Vec<&str> = stmts.iter().map(|s| s.head.as_str()).collect();
        assert_eq!(heads, vec!["resources :users, only: [:index]", "root 'home#index'"]);
        assert_eq!(stmts[0].keyword(), "resources");
        assert_eq!(stmts[1].line, 5);
        let body = stmts[0].body().unwrap();
        let inner = statements(&text, body.start, body.end, &RUBY_BLOCKS);
        assert_eq!(inner[0].head, "get :preview");
        assert_eq!(inner[0].line, 3);
    }

    #[test]
    fn test_keyword_opener_keeps_head() {
        let code = "class User < ApplicationRecord\n  def name; end\nend\n";
        let text = Text::new(code, CommentStyle::Hash);
        let stmts = statements(&text, 0, code.len(), &RUBY_BLOCKS);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].head, "class User < ApplicationRecord");
        assert!(stmts[0].body().is_some());
    }

    #[test]
    fn test_call_args() {
        let (pos, kw) = call_args("'photos/search', to: 'photos#search', :via => [:get]");
        assert_eq!(pos, vec!["'photos/search'"]);
        assert_eq!(named(&kw, "to"), Some("'photos#search'"));
        assert_eq!(named(&kw, "via"), Some("[:get]"));

        let stmt = Statement { start: 0, line: 1, head: "get('/x', to: 'a#b')".to_string(), block: None };
        assert_eq!(stmt.args(), "'/x', to: 'a#b'");
    }
}
