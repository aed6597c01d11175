//! Line-local rebalancing of highlighted `<span>` markup.
//!
//! Syntax highlighters keep a token's span open across newlines (block
//! comments, multi-line strings). Splitting that output into one table row per
//! source line leaves dangling opens and orphaned closes. [`balance`] closes
//! every open span at the end of each line and re-opens the same stack, in
//! nesting order, at the start of the next one.

/// One lexical unit of a highlighted line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// `<span ...>`; the class is `None` when absent or unparseable.
    Open(Option<String>),
    Close,
    /// Character data, or any tag other than a span.
    Text,
}

struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.src.get(self.pos..).filter(|rest| !rest.is_empty())?;

        if rest.starts_with('<') {
            if let Some((token, consumed)) = parse_tag(rest) {
                self.pos += consumed;
                return Some(token);
            }
        }

        let end = rest
            .char_indices()
            .skip(1)
            .find(|(_, ch)| *ch == '<')
            .map_or(rest.len(), |(idx, _)| idx);
        self.pos += end;
        Some(Token::Text)
    }
}

/// Rewrite `markup` so every line is an independently well-nested fragment.
///
/// Lines without tags and with nothing carried over are returned untouched.
/// Unbalanced input never fails: a close with nothing open is left in place.
pub fn balance(markup: &str) -> String {
    let mut stack: Vec<Option<String>> = Vec::new();
    let mut out = String::with_capacity(markup.len() + markup.len() / 4);

    for (index, raw_line) in markup.split('\n').enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let (line, carriage) = match raw_line.strip_suffix('\r') {
            Some(line) => (line, "\r"),
            None => (raw_line, ""),
        };

        for class in &stack {
            push_open_tag(&mut out, class.as_deref());
        }
        out.push_str(line);

        for token in Tokenizer::new(line) {
            match token {
                Token::Open(class) => stack.push(class),
                Token::Close => {
                    stack.pop();
                }
                Token::Text => {}
            }
        }

        for _ in &stack {
            out.push_str("</span>");
        }
        out.push_str(carriage);
    }

    out
}

fn push_open_tag(out: &mut String, class: Option<&str>) {
    match class {
        Some(class) => {
            out.push_str("<span class=\"");
            out.push_str(&class.replace('"', "&quot;"));
            out.push_str("\">");
        }
        None => out.push_str("<span>"),
    }
}

/// Recognise a `span` open or close tag at the start of `rest`.
fn parse_tag(rest: &str) -> Option<(Token, usize)> {
    if let Some(after_slash) = rest.strip_prefix("</") {
        if !starts_with_span(after_slash) {
            return None;
        }
        let tail = &after_slash[4..];
        let trimmed = tail.trim_start();
        let whitespace = tail.len() - trimmed.len();
        return trimmed
            .starts_with('>')
            .then(|| (Token::Close, 2 + 4 + whitespace + 1));
    }

    let after_lt = &rest[1..];
    if !starts_with_span(after_lt) {
        return None;
    }
    let after_name = &after_lt[4..];
    match after_name.chars().next() {
        Some(ch) if ch.is_whitespace() || ch == '>' || ch == '/' => {}
        _ => return None,
    }

    let close = find_tag_end(after_name)?;
    let consumed = 1 + 4 + close + 1;
    let inner = after_name[..close].trim_end();
    if inner.ends_with('/') {
        // Self-closing spans open nothing.
        return Some((Token::Text, consumed));
    }

    Some((Token::Open(extract_class(inner)), consumed))
}

fn starts_with_span(s: &str) -> bool {
    s.get(..4).is_some_and(|name| name.eq_ignore_ascii_case("span"))
}

/// Byte offset of the `>` that ends the tag, skipping quoted attribute values.
fn find_tag_end(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in s.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == '>' => return Some(idx),
            None => {}
        }
    }
    None
}

/// Value of the first `class` attribute, matched case-insensitively.
///
/// Any malformed attribute syntax yields `None` rather than a guess.
fn extract_class(attrs: &str) -> Option<String> {
    let mut chars = attrs.char_indices().peekable();

    loop {
        while chars.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}
        let (name_start, _) = *chars.peek()?;

        let mut name_end = attrs.len();
        while let Some(&(idx, ch)) = chars.peek() {
            if ch.is_whitespace() || ch == '=' {
                name_end = idx;
                break;
            }
            if matches!(ch, '"' | '\'' | '<' | '>' | '/') {
                return None;
            }
            chars.next();
        }
        let name = &attrs[name_start..name_end];
        if name.is_empty() {
            return None;
        }

        while chars.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}
        let value = if chars.next_if(|(_, ch)| *ch == '=').is_some() {
            while chars.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}
            let (value_start, first) = chars.next()?;
            if first == '"' || first == '\'' {
                let body_start = value_start + first.len_utf8();
                let mut body_end = None;
                for (idx, ch) in chars.by_ref() {
                    if ch == first {
                        body_end = Some(idx);
                        break;
                    }
                }
                let body_end = body_end?;
                if chars.peek().is_some_and(|(_, ch)| !ch.is_whitespace()) {
                    return None;
                }
                &attrs[body_start..body_end]
            } else {
                let mut value_end = attrs.len();
                while let Some(&(idx, ch)) = chars.peek() {
                    if ch.is_whitespace() {
                        value_end = idx;
                        break;
                    }
                    if matches!(ch, '"' | '\'' | '<' | '=' | '`') {
                        return None;
                    }
                    chars.next();
                }
                &attrs[value_start..value_end]
            }
        } else {
            ""
        };

        if name.eq_ignore_ascii_case("class") {
            return Some(value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every line must open and close its own spans.
    fn assert_lines_well_formed(output: &str) {
        for (number, line) in output.split('\n').enumerate() {
            let mut depth: i64 = 0;
            for token in Tokenizer::new(line) {
                match token {
                    Token::Open(_) => depth += 1,
                    Token::Close => {
                        depth -= 1;
                        assert!(depth >= 0, "orphan close on line {number}: {line}");
                    }
                    Token::Text => {}
                }
            }
            assert_eq!(depth, 0, "unclosed span on line {number}: {line}");
        }
    }

    #[test]
    fn markup_without_tags_is_unchanged() {
        for input in [
            "",
            "plain",
            "a\nb\n",
            "\n\n",
            "x < y && y > z\r\nnext",
            "<div>not a span</div>",
        ] {
            assert_eq!(balance(input), input);
        }
    }

    #[test]
    fn span_closed_on_same_line_does_not_carry() {
        let input = "<span class=\"kw\">def</span> f():\n    pass";
        assert_eq!(balance(input), input);
    }

    #[test]
    fn multi_line_string_is_split_per_line() {
        let input = "<span class=\"s\">\"\"\"doc\nmore\"\"\"</span>\nx = 1";
        insta::assert_snapshot!(balance(input), @r#"
        <span class="s">"""doc</span>
        <span class="s">more"""</span>
        x = 1
        "#);
    }

    #[test]
    fn nested_spans_reopen_in_order() {
        let input = "<span class=\"source\"><span class=\"comment\">/* a\nb */</span> x</span>";
        insta::assert_snapshot!(balance(input), @r#"
        <span class="source"><span class="comment">/* a</span></span>
        <span class="source"><span class="comment">b */</span> x</span>
        "#);
    }

    #[test]
    fn empty_line_inside_span_is_wrapped() {
        let input = "<span class=\"c\">/*\n\n*/</span>";
        assert_eq!(
            balance(input),
            "<span class=\"c\">/*</span>\n<span class=\"c\"></span>\n<span class=\"c\">*/</span>"
        );
    }

    #[test]
    fn carriage_returns_stay_at_line_end() {
        let input = "<span class=\"s\">'a\r\nb'</span>\r\n";
        assert_eq!(
            balance(input),
            "<span class=\"s\">'a</span>\r\n<span class=\"s\">b'</span>\r\n"
        );
    }

    #[test]
    fn class_attribute_is_matched_case_insensitively() {
        let input = "<SPAN id=x CLASS='syntax-string'>a\nb</SPAN>";
        assert_eq!(
            balance(input),
            "<SPAN id=x CLASS='syntax-string'>a</span>\n<span class=\"syntax-string\">b</SPAN>"
        );
    }

    #[test]
    fn malformed_attributes_reopen_without_class() {
        let input = "<span class=\"a\"b>x\ny</span>";
        assert_eq!(balance(input), "<span class=\"a\"b>x</span>\n<span>y</span>");
    }

    #[test]
    fn unterminated_tag_is_treated_as_text() {
        let input = "<span class=\"a\\\"b\">x\ny</span>";
        assert_eq!(balance(input), input);
    }

    #[test]
    fn orphan_close_is_left_in_place() {
        let input = "a</span>\n<span class=\"k\">b";
        assert_eq!(balance(input), "a</span>\n<span class=\"k\">b</span>");
    }

    #[test]
    fn quoted_greater_than_does_not_end_tag() {
        let input = "<span title=\"a>b\" class=\"k\">x\ny</span>";
        assert_eq!(
            balance(input),
            "<span title=\"a>b\" class=\"k\">x</span>\n<span class=\"k\">y</span>"
        );
    }

    #[test]
    fn long_spans_produce_well_formed_lines() {
        let inputs = [
            "<span class=\"a\">1\n2\n3\n4</span>",
            "<span class=\"a\"><span class=\"b\">1\n2</span>\n3<span class=\"c\">4\n5</span></span>",
            "x<span class=\"a\">\n\n\n</span>y",
            "<span class=\"a\">1</span><span class=\"b\">2\n3</span><span class=\"c\">4\n5</span>",
        ];
        for input in inputs {
            assert_lines_well_formed(&balance(input));
        }
    }

    #[test]
    fn extract_class_variants() {
        assert_eq!(extract_class(" class=\"a b\""), Some("a b".to_string()));
        assert_eq!(extract_class(" Class = a"), Some("a".to_string()));
        assert_eq!(extract_class(" hidden class=''"), Some(String::new()));
        assert_eq!(extract_class(" id=\"x\""), None);
        assert_eq!(extract_class(" class=\"unterminated"), None);
        assert_eq!(extract_class(" \"class\"=x"), None);
    }
}
