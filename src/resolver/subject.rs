//! Text-level helpers for the expression at the cursor.
//!
//! An in-progress member fetch such as `$this->repo->fi|` does not parse,
//! so the receiver is recovered from the raw text instead: scan back from
//! the cursor over the partial member name and the `->` / `?->` operator,
//! then over the balanced receiver chain before it.
//!
//! | Source before cursor          | Receiver                  |
//! |-------------------------------|---------------------------|
//! | `$x->`                        | `$x`                      |
//! | `$this->repo->fi`             | `$this->repo`             |
//! | `$this->make()?->`            | `$this->make()`           |
//! | `Factory::create($a)->`       | `Factory::create($a)`     |
//! | `(new Point(1, 2))->`         | `(new Point(1, 2))`       |
//! | `new Point()->`               | `new Point()`             |
//!
//! Offsets are byte offsets.  Scanning only ever inspects ASCII bytes,
//! and bytes of multi-byte characters count as identifier bytes, so every
//! boundary found is a character boundary.
use crate::types::OffsetRange;

/// A member fetch at the cursor: `receiver->partial|`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FetchSite {
    pub receiver: OffsetRange,
    pub nullsafe: bool,
    /// The member name typed so far, up to the cursor.
    pub partial: String,
    /// The whole member name token, which may continue past the cursor.
    pub member: String,
    /// From the start of the operator to the end of the member name
    /// (which may continue past the cursor).
    pub tail: OffsetRange,
}

/// A `$variable` being typed at the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VariableSite {
    /// Text from the `$` to the cursor, e.g. `$` or `$us`.
    pub partial: String,
    pub token: OffsetRange,
}

/// Receiver expression parsed into a base and a chain of member accesses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Subject {
    pub base: SubjectBase,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubjectBase {
    /// `$name`, including the `$`.
    Variable(String),
    /// `new Name(…)`; the name as written.
    New(String),
    /// `Name::method(…)`.
    StaticCall { class: String, method: String },
    /// `name(…)`.
    FunctionCall(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Property(String),
    Method(String),
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

fn is_name_byte(b: u8) -> bool {
    is_ident_byte(b) || b == b'\\'
}

fn skip_ws_back(bytes: &[u8], mut i: usize) -> usize {
    while i > 0 && bytes[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    i
}

fn clamp_offset(text: &str, offset: u32) -> usize {
    let mut pos = (offset as usize).min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Skip backwards past a balanced `(…)` group.
///
/// `pos` must point one past the closing `)`.  Returns the index of the
/// opening `(`, or `None` if the parens are unbalanced.
fn skip_balanced_parens_back(bytes: &[u8], pos: usize) -> Option<usize> {
    if pos == 0 || bytes[pos - 1] != b')' {
        return None;
    }
    let mut depth: u32 = 0;
    let mut j = pos;
    while j > 0 {
        j -= 1;
        match bytes[j] {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            }
            _ => {}
        }
    }
    None
}

/// Detect `receiver->partial` (or `?->`) ending at the cursor.
pub(crate) fn fetch_site(text: &str, offset: u32) -> Option<FetchSite> {
    let bytes = text.as_bytes();
    let pos = clamp_offset(text, offset);

    let mut member_start = pos;
    while member_start > 0 && is_ident_byte(bytes[member_start - 1]) {
        member_start -= 1;
    }
    let mut member_end = pos;
    while member_end < bytes.len() && is_ident_byte(bytes[member_end]) {
        member_end += 1;
    }

    let op_end = skip_ws_back(bytes, member_start);
    if op_end < 2 || &bytes[op_end - 2..op_end] != b"->" {
        return None;
    }
    let (op_start, nullsafe) = if op_end >= 3 && bytes[op_end - 3] == b'?' {
        (op_end - 3, true)
    } else {
        (op_end - 2, false)
    };

    let receiver_end = skip_ws_back(bytes, op_start);
    let receiver_start = scan_chain_back(bytes, receiver_end)?;
    if receiver_start == receiver_end {
        return None;
    }

    Some(FetchSite {
        receiver: OffsetRange::new(receiver_start as u32, receiver_end as u32),
        nullsafe,
        partial: text[member_start..pos].to_string(),
        member: text[member_start..member_end].to_string(),
        tail: OffsetRange::new(op_start as u32, member_end as u32),
    })
}

/// Detect a `$name` token being typed at the cursor.
pub(crate) fn variable_site(text: &str, offset: u32) -> Option<VariableSite> {
    let bytes = text.as_bytes();
    let pos = clamp_offset(text, offset);

    let mut start = pos;
    while start > 0 && is_ident_byte(bytes[start - 1]) {
        start -= 1;
    }
    if start == 0 || bytes[start - 1] != b'$' {
        return None;
    }
    start -= 1;

    let mut end = pos;
    while end < bytes.len() && is_ident_byte(bytes[end]) {
        end += 1;
    }

    Some(VariableSite {
        partial: text[start..pos].to_string(),
        token: OffsetRange::new(start as u32, end as u32),
    })
}

/// Walk back over one receiver chain ending at `end`, returning where it
/// starts.
fn scan_chain_back(bytes: &[u8], end: usize) -> Option<usize> {
    let mut i = end;
    loop {
        let segment_start = if i > 0 && bytes[i - 1] == b')' {
            let open = skip_balanced_parens_back(bytes, i)?;
            let mut j = open;
            while j > 0 && is_name_byte(bytes[j - 1]) {
                j -= 1;
            }
            if j > 0 && j < open && bytes[j - 1] == b'$' {
                j -= 1;
            }
            j
        } else {
            let mut j = i;
            while j > 0 && is_ident_byte(bytes[j - 1]) {
                j -= 1;
            }
            if j > 0 && bytes[j - 1] == b'$' {
                j -= 1;
            }
            if j == i {
                return None;
            }
            j
        };

        let before = skip_ws_back(bytes, segment_start);
        if before >= 2 && &bytes[before - 2..before] == b"->" {
            i = before - 2;
            if i > 0 && bytes[i - 1] == b'?' {
                i -= 1;
            }
            i = skip_ws_back(bytes, i);
            continue;
        }
        if before >= 2 && &bytes[before - 2..before] == b"::" {
            i = skip_ws_back(bytes, before - 2);
            continue;
        }

        // `new Name(…)` without surrounding parens.
        if before >= 3
            && before < segment_start
            && &bytes[before - 3..before] == b"new"
            && (before == 3 || !is_ident_byte(bytes[before - 4]))
        {
            return Some(before - 3);
        }
        return Some(segment_start);
    }
}

/// Parse a receiver expression into a [`Subject`].  Returns `None` for
/// shapes that have no statically known type (array access, dynamic
/// member names, constants).
pub(crate) fn parse_subject(text: &str) -> Option<Subject> {
    let mut cursor = Cursor {
        bytes: text.as_bytes(),
        text,
        pos: 0,
    };
    let subject = cursor.subject()?;
    cursor.skip_ws();
    (cursor.pos == text.len()).then_some(subject)
}

struct Cursor<'t> {
    bytes: &'t [u8],
    text: &'t str,
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.text[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn name(&mut self, allow_namespace: bool) -> Option<&'t str> {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (is_ident_byte(self.bytes[self.pos])
                || (allow_namespace && self.bytes[self.pos] == b'\\'))
        {
            self.pos += 1;
        }
        (self.pos > start).then(|| &self.text[start..self.pos])
    }

    /// Skip a balanced `(…)` group starting at the cursor.
    fn skip_parens(&mut self) -> Option<()> {
        if self.bytes.get(self.pos) != Some(&b'(') {
            return None;
        }
        let mut depth = 0u32;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Some(());
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        None
    }

    fn subject(&mut self) -> Option<Subject> {
        self.skip_ws();
        let mut subject = if self.bytes.get(self.pos) == Some(&b'(') {
            let start = self.pos;
            self.skip_parens()?;
            parse_subject(&self.text[start + 1..self.pos - 1])?
        } else {
            Subject {
                base: self.base()?,
                segments: Vec::new(),
            }
        };

        loop {
            self.skip_ws();
            if !(self.eat("->") || self.eat("?->")) {
                break;
            }
            self.skip_ws();
            let member = self.name(false)?.to_string();
            self.skip_ws();
            if self.bytes.get(self.pos) == Some(&b'(') {
                self.skip_parens()?;
                subject.segments.push(Segment::Method(member));
            } else {
                subject.segments.push(Segment::Property(member));
            }
        }

        Some(subject)
    }

    fn base(&mut self) -> Option<SubjectBase> {
        if self.eat("$") {
            let name = self.name(false)?;
            return Some(SubjectBase::Variable(format!("${}", name)));
        }

        let name = self.name(true)?;
        if name.eq_ignore_ascii_case("new") {
            self.skip_ws();
            let class = self.name(true)?;
            self.skip_ws();
            if self.bytes.get(self.pos) == Some(&b'(') {
                self.skip_parens()?;
            }
            return Some(SubjectBase::New(class.to_string()));
        }

        self.skip_ws();
        if self.eat("::") {
            self.skip_ws();
            let method = self.name(false)?;
            self.skip_ws();
            self.skip_parens()?;
            return Some(SubjectBase::StaticCall {
                class: name.to_string(),
                method: method.to_string(),
            });
        }

        self.skip_parens()?;
        Some(SubjectBase::FunctionCall(name.to_string()))
    }
}

/// Replace `range` with spaces of the same byte length.  When the next
/// significant character does not already end the expression, the first
/// blanked byte becomes a `;`.
pub(crate) fn neutralize(text: &str, range: OffsetRange) -> String {
    let start = clamp_offset(text, range.start);
    let end = clamp_offset(text, range.end).max(start);

    let mut out = String::with_capacity(text.len() + 1);
    out.push_str(&text[..start]);
    out.push_str(&" ".repeat(end - start));
    out.push_str(&text[end..]);
    if needs_terminator(&text[end..]) {
        place_terminator(&mut out, start);
    }
    out
}

/// Terminate the expression ending at `offset` unless it is already
/// closed.  `None` when there is no room for a `;`.
pub(crate) fn terminate_at(text: &str, offset: u32) -> Option<String> {
    let pos = clamp_offset(text, offset);
    if !needs_terminator(&text[pos..]) {
        return None;
    }
    let mut out = text.to_string();
    place_terminator(&mut out, pos).then_some(out)
}

/// Overwrite the blank byte at `pos` with `;`, or append one when `pos`
/// is the end of the text.  Nothing else moves.
fn place_terminator(text: &mut String, pos: usize) -> bool {
    match text.as_bytes().get(pos) {
        Some(b) if b.is_ascii_whitespace() => {
            text.replace_range(pos..pos + 1, ";");
            true
        }
        Some(_) => false,
        None => {
            text.push(';');
            true
        }
    }
}

fn needs_terminator(rest: &str) -> bool {
    !matches!(
        rest.trim_start().chars().next(),
        Some(';') | Some(')') | Some(',') | Some(']')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receiver(text: &str) -> Option<String> {
        let site = fetch_site(text, text.len() as u32)?;
        Some(text[site.receiver.as_usize()].to_string())
    }

    #[test]
    fn test_fetch_site_receivers() {
        assert_eq!(receiver("$x->").as_deref(), Some("$x"));
        assert_eq!(receiver("  $this->repo->fi").as_deref(), Some("$this->repo"));
        assert_eq!(receiver("$this->make()?->").as_deref(), Some("$this->make()"));
        assert_eq!(
            receiver("return Factory::create($a)->").as_deref(),
            Some("Factory::create($a)")
        );
        assert_eq!(receiver("(new Point(1, 2))->").as_deref(), Some("(new Point(1, 2))"));
        assert_eq!(receiver("echo new Point()->").as_deref(), Some("new Point()"));
        assert_eq!(receiver("$a = 1;"), None);
    }

    #[test]
    fn test_fetch_site_partial_and_tail() {
        let text = "$x->getNa; ";
        let site = fetch_site(text, 9).unwrap();
        assert_eq!(site.partial, "getNa");
        assert_eq!(&text[site.tail.as_usize()], "->getNa");
        assert!(!site.nullsafe);

        let site = fetch_site("$x?->", 5).unwrap();
        assert!(site.nullsafe);
        assert_eq!(site.partial, "");
    }

    #[test]
    fn test_parse_subject_chains() {
        let subject = parse_subject("$this->repo->find(1)").unwrap();
        assert_eq!(subject.base, SubjectBase::Variable("$this".to_string()));
        assert_eq!(
            subject.segments,
            vec![
                Segment::Property("repo".to_string()),
                Segment::Method("find".to_string())
            ]
        );

        let subject = parse_subject("(new Point(1, 2))->move()").unwrap();
        assert_eq!(subject.base, SubjectBase::New("Point".to_string()));
        assert_eq!(subject.segments, vec![Segment::Method("move".to_string())]);

        let subject = parse_subject("Factory::create($a)").unwrap();
        assert_eq!(
            subject.base,
            SubjectBase::StaticCall {
                class: "Factory".to_string(),
                method: "create".to_string()
            }
        );

        assert!(parse_subject("$items[0]").is_none());
        assert!(parse_subject("Status::Active").is_none());
    }

    #[test]
    fn test_neutralize_keeps_offsets() {
        let text = "$x = new Point(); $x->";
        let out = neutralize(text, OffsetRange::new(20, 22));
        assert_eq!(out, "$x = new Point(); $x; ");
        assert_eq!(out.len(), text.len());
        assert_eq!(&out[..20], &text[..20]);

        let text = "foo($x->ba, 1);";
        let out = neutralize(text, OffsetRange::new(6, 10));
        assert_eq!(out, "foo($x    , 1);");
    }

    #[test]
    fn test_terminate_at_overwrites_blank_or_appends_at_end() {
        let text = "$co\n}\n";
        let out = terminate_at(text, 3).unwrap();
        assert_eq!(out, "$co;}\n");
        assert_eq!(out.len(), text.len());

        assert_eq!(terminate_at("$co", 3).as_deref(), Some("$co;"));
        assert_eq!(terminate_at("$co}", 3), None);
        assert_eq!(terminate_at("$co;", 3), None);
    }

    #[test]
    fn test_variable_site() {
        let site = variable_site("$user = 1; $us", 14).unwrap();
        assert_eq!(site.partial, "$us");
        assert!(variable_site("foo", 3).is_none());
    }
}
