//! Pattern specifications and the regex-subset parser
//!
//! A [`Pattern`] is an immutable expression plus per-pattern flags and a
//! caller-visible identifier. The parser turns the expression into a small
//! byte-oriented AST that the compiler lowers into the serialized program.
//!
//! Supported syntax: literal bytes, escapes (`\n`, `\t`, `\xHH`, `\d`, `\w`,
//! `\s` and their negations), `.`, bracket classes with ranges and negation,
//! grouping, alternation, `*`, `+`, `?`, `{m}`, `{m,}`, `{m,n}` repetition,
//! and the `^`/`$` anchors. Everything is byte semantics; non-ASCII bytes in
//! the expression match themselves.

/// Bound on counted repetition (`{m,n}`), to keep compiled programs small.
pub const REPEAT_LIMIT: u32 = 255;

/// Per-pattern compile flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatternFlags {
    /// Case-insensitive matching (ASCII folding)
    pub caseless: bool,
    /// `.` matches newline as well
    pub dot_all: bool,
}

impl PatternFlags {
    /// Encode into the on-disk representation
    pub(crate) fn to_bits(self) -> u32 {
        (self.caseless as u32) | ((self.dot_all as u32) << 1)
    }

    /// Decode from the on-disk representation
    pub(crate) fn from_bits(bits: u32) -> Self {
        Self {
            caseless: bits & 1 != 0,
            dot_all: bits & 2 != 0,
        }
    }
}

/// A single pattern submitted for compilation
///
/// Immutable once constructed. The `id` is reported back in match events and
/// must be unique within one compiled database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Source expression text
    pub expression: String,
    /// Caller-chosen identifier reported in match events
    pub id: u32,
    /// Compile flags
    pub flags: PatternFlags,
}

impl Pattern {
    /// Create a pattern with default flags
    pub fn new(expression: impl Into<String>, id: u32) -> Self {
        Self {
            expression: expression.into(),
            id,
            flags: PatternFlags::default(),
        }
    }

    /// Create a pattern with explicit flags
    pub fn with_flags(expression: impl Into<String>, id: u32, flags: PatternFlags) -> Self {
        Self {
            expression: expression.into(),
            id,
            flags,
        }
    }
}

/// A set of byte values, stored as sorted, non-overlapping inclusive ranges
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ByteClass {
    pub(crate) ranges: Vec<(u8, u8)>,
}

impl ByteClass {
    pub(crate) fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    pub(crate) fn singleton(b: u8) -> Self {
        Self {
            ranges: vec![(b, b)],
        }
    }

    /// `.` - every byte, optionally excluding `\n`
    pub(crate) fn any(dot_all: bool) -> Self {
        if dot_all {
            Self {
                ranges: vec![(0, 255)],
            }
        } else {
            Self {
                ranges: vec![(0, b'\n' - 1), (b'\n' + 1, 255)],
            }
        }
    }

    pub(crate) fn push(&mut self, lo: u8, hi: u8) {
        self.ranges.push((lo, hi));
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Sort and coalesce adjacent/overlapping ranges
    pub(crate) fn normalize(&mut self) {
        if self.ranges.is_empty() {
            return;
        }
        self.ranges.sort_unstable();
        let mut merged: Vec<(u8, u8)> = Vec::with_capacity(self.ranges.len());
        for &(lo, hi) in &self.ranges {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => {
                    last.1 = last.1.max(hi);
                }
                _ => merged.push((lo, hi)),
            }
        }
        self.ranges = merged;
    }

    /// Complement over the full byte range; assumes normalized input
    pub(crate) fn negate(&mut self) {
        let mut out = Vec::new();
        let mut next = 0u16;
        for &(lo, hi) in &self.ranges {
            if (lo as u16) > next {
                out.push((next as u8, lo - 1));
            }
            next = hi as u16 + 1;
        }
        if next <= 255 {
            out.push((next as u8, 255));
        }
        self.ranges = out;
    }

    /// Add ASCII case-folded counterparts for every letter in the class
    pub(crate) fn fold_case(&mut self) {
        let mut extra = Vec::new();
        for &(lo, hi) in &self.ranges {
            for b in lo..=hi {
                if b.is_ascii_lowercase() {
                    extra.push(b.to_ascii_uppercase());
                } else if b.is_ascii_uppercase() {
                    extra.push(b.to_ascii_lowercase());
                }
                if b == hi {
                    break; // avoid u8 overflow on 255
                }
            }
        }
        for b in extra {
            self.ranges.push((b, b));
        }
        self.normalize();
    }

    pub(crate) fn contains(&self, b: u8) -> bool {
        self.ranges.iter().any(|&(lo, hi)| lo <= b && b <= hi)
    }

    /// Union of two normalized classes
    pub(crate) fn union(&self, other: &ByteClass) -> ByteClass {
        let mut out = self.clone();
        out.ranges.extend_from_slice(&other.ranges);
        out.normalize();
        out
    }
}

/// Parsed pattern AST
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ast {
    /// Matches nothing (empty concatenation)
    Empty,
    /// A single byte from the class
    Class(ByteClass),
    Concat(Vec<Ast>),
    Alternate(Vec<Ast>),
    Repeat {
        node: Box<Ast>,
        min: u32,
        max: Option<u32>,
    },
    AssertStart,
    AssertEnd,
}

impl Ast {
    /// True when the node can match the empty string
    ///
    /// Patterns whose whole AST is nullable are rejected at compile time:
    /// block-mode scanning has no meaningful zero-length match stream.
    pub(crate) fn is_nullable(&self) -> bool {
        match self {
            Ast::Empty | Ast::AssertStart | Ast::AssertEnd => true,
            Ast::Class(_) => false,
            Ast::Concat(nodes) => nodes.iter().all(Ast::is_nullable),
            Ast::Alternate(nodes) => nodes.iter().any(Ast::is_nullable),
            Ast::Repeat { node, min, .. } => *min == 0 || node.is_nullable(),
        }
    }

    /// Set of bytes a match can start with, if statically determinable
    ///
    /// `None` means "unknown or anchored" and disqualifies the scan-time
    /// prefilter. Assertions at the head make the pattern ineligible since
    /// the prefilter only makes sense for unanchored seeding.
    pub(crate) fn leading_bytes(&self) -> Option<ByteClass> {
        match self {
            Ast::Empty | Ast::AssertStart | Ast::AssertEnd => None,
            Ast::Class(class) => Some(class.clone()),
            Ast::Concat(nodes) => {
                let mut acc: Option<ByteClass> = None;
                for node in nodes {
                    let lead = node.leading_bytes()?;
                    acc = Some(match acc {
                        Some(prev) => prev.union(&lead),
                        None => lead,
                    });
                    if !node.is_nullable() {
                        return acc;
                    }
                }
                // Fully nullable concat; callers reject these patterns anyway
                None
            }
            Ast::Alternate(nodes) => {
                let mut acc = ByteClass::empty();
                for node in nodes {
                    acc = acc.union(&node.leading_bytes()?);
                }
                Some(acc)
            }
            Ast::Repeat { node, min, .. } => {
                if *min == 0 {
                    None
                } else {
                    node.leading_bytes()
                }
            }
        }
    }
}

/// Parse one expression into an AST
///
/// Errors are plain messages; the compiler attaches the pattern index.
pub(crate) fn parse(expression: &str, flags: PatternFlags) -> Result<Ast, String> {
    let mut parser = Parser {
        input: expression.as_bytes(),
        pos: 0,
        flags,
    };
    let ast = parser.parse_alternation()?;
    if parser.pos != parser.input.len() {
        // Only a stray ')' can stop the top-level parse early
        return Err(format!("unmatched ')' at byte {}", parser.pos));
    }
    Ok(ast)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    flags: PatternFlags,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn parse_alternation(&mut self) -> Result<Ast, String> {
        let mut branches = vec![self.parse_concat()?];
        while self.peek() == Some(b'|') {
            self.bump();
            branches.push(self.parse_concat()?);
        }
        if branches.len() == 1 {
            Ok(branches.pop().unwrap_or(Ast::Empty))
        } else {
            Ok(Ast::Alternate(branches))
        }
    }

    fn parse_concat(&mut self) -> Result<Ast, String> {
        let mut nodes = Vec::new();
        while let Some(b) = self.peek() {
            if b == b'|' || b == b')' {
                break;
            }
            let atom = self.parse_atom()?;
            let node = self.parse_repeat(atom)?;
            nodes.push(node);
        }
        match nodes.len() {
            0 => Ok(Ast::Empty),
            1 => Ok(nodes.pop().unwrap_or(Ast::Empty)),
            _ => Ok(Ast::Concat(nodes)),
        }
    }

    fn parse_repeat(&mut self, atom: Ast) -> Result<Ast, String> {
        let (min, max) = match self.peek() {
            Some(b'*') => {
                self.bump();
                (0, None)
            }
            Some(b'+') => {
                self.bump();
                (1, None)
            }
            Some(b'?') => {
                self.bump();
                (0, Some(1))
            }
            Some(b'{') => match self.try_parse_counted()? {
                Some(bounds) => bounds,
                // Not a counted repeat; '{' is a literal handled by the
                // next parse_atom call
                None => return Ok(atom),
            },
            _ => return Ok(atom),
        };

        if matches!(atom, Ast::AssertStart | Ast::AssertEnd) {
            return Err("repetition of an anchor is not supported".to_string());
        }
        if let Some(max) = max {
            if max < min {
                return Err(format!("bad repeat bounds {{{},{}}}", min, max));
            }
        }
        Ok(Ast::Repeat {
            node: Box::new(atom),
            min,
            max,
        })
    }

    /// Parse `{m}`, `{m,}` or `{m,n}` after the atom. Returns `Ok(None)` and
    /// leaves the position untouched when the braces do not form a counted
    /// repeat, in which case `{` matches literally.
    fn try_parse_counted(&mut self) -> Result<Option<(u32, Option<u32>)>, String> {
        let start = self.pos;
        self.bump(); // '{'

        let min = match self.parse_number() {
            Some(n) => n,
            None => {
                self.pos = start;
                return Ok(None);
            }
        };
        let bounds = match self.peek() {
            Some(b'}') => {
                self.bump();
                (min, Some(min))
            }
            Some(b',') => {
                self.bump();
                match self.peek() {
                    Some(b'}') => {
                        self.bump();
                        (min, None)
                    }
                    _ => match self.parse_number() {
                        Some(max) if self.peek() == Some(b'}') => {
                            self.bump();
                            (min, Some(max))
                        }
                        _ => {
                            self.pos = start;
                            return Ok(None);
                        }
                    },
                }
            }
            _ => {
                self.pos = start;
                return Ok(None);
            }
        };
        if bounds.0 > REPEAT_LIMIT || bounds.1.is_some_and(|n| n > REPEAT_LIMIT) {
            return Err(format!("repeat bound exceeds limit of {}", REPEAT_LIMIT));
        }
        Ok(Some(bounds))
    }

    fn parse_number(&mut self) -> Option<u32> {
        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(b) = self.peek() {
            if !b.is_ascii_digit() {
                break;
            }
            value = value.checked_mul(10)?.checked_add((b - b'0') as u32)?;
            self.bump();
        }
        if self.pos == start {
            None
        } else {
            Some(value)
        }
    }

    fn parse_atom(&mut self) -> Result<Ast, String> {
        let at = self.pos;
        let b = self
            .bump()
            .ok_or_else(|| "unexpected end of pattern".to_string())?;
        match b {
            b'(' => {
                if self.peek() == Some(b'?') {
                    return Err(format!("unsupported group modifier '(?' at byte {}", at));
                }
                let inner = self.parse_alternation()?;
                if self.bump() != Some(b')') {
                    return Err(format!("unmatched '(' at byte {}", at));
                }
                Ok(inner)
            }
            b'[' => {
                let class = self.parse_class(at)?;
                Ok(Ast::Class(class))
            }
            b'.' => Ok(Ast::Class(ByteClass::any(self.flags.dot_all))),
            b'^' => Ok(Ast::AssertStart),
            b'$' => Ok(Ast::AssertEnd),
            b'*' | b'+' | b'?' => Err(format!("repetition operator with nothing to repeat at byte {}", at)),
            b'\\' => {
                let class = self.parse_escape(at)?;
                Ok(Ast::Class(self.maybe_fold(class)))
            }
            _ => Ok(Ast::Class(self.maybe_fold(ByteClass::singleton(b)))),
        }
    }

    fn maybe_fold(&self, mut class: ByteClass) -> ByteClass {
        class.normalize();
        if self.flags.caseless {
            class.fold_case();
        }
        class
    }

    /// Escape outside a bracket class
    fn parse_escape(&mut self, at: usize) -> Result<ByteClass, String> {
        let b = self
            .bump()
            .ok_or_else(|| format!("dangling '\\' at byte {}", at))?;
        match b {
            b'n' => Ok(ByteClass::singleton(b'\n')),
            b'r' => Ok(ByteClass::singleton(b'\r')),
            b't' => Ok(ByteClass::singleton(b'\t')),
            b'0' => Ok(ByteClass::singleton(0)),
            b'x' => {
                let hi = self.parse_hex_digit(at)?;
                let lo = self.parse_hex_digit(at)?;
                Ok(ByteClass::singleton(hi * 16 + lo))
            }
            b'd' | b'D' | b'w' | b'W' | b's' | b'S' => Ok(perl_class(b)),
            // Any escaped punctuation matches itself
            _ if b.is_ascii_punctuation() => Ok(ByteClass::singleton(b)),
            _ => Err(format!(
                "unsupported escape '\\{}' at byte {}",
                b as char, at
            )),
        }
    }

    fn parse_hex_digit(&mut self, at: usize) -> Result<u8, String> {
        let b = self
            .bump()
            .ok_or_else(|| format!("truncated '\\x' escape at byte {}", at))?;
        (b as char)
            .to_digit(16)
            .map(|d| d as u8)
            .ok_or_else(|| format!("bad hex digit in '\\x' escape at byte {}", at))
    }

    /// Bracket class body; the opening '[' has been consumed
    fn parse_class(&mut self, at: usize) -> Result<ByteClass, String> {
        let negated = if self.peek() == Some(b'^') {
            self.bump();
            true
        } else {
            false
        };

        let mut class = ByteClass::empty();
        let mut first = true;
        loop {
            let b = self
                .bump()
                .ok_or_else(|| format!("unmatched '[' at byte {}", at))?;
            match b {
                b']' if !first => break,
                b'\\' => {
                    let sub = self.parse_escape(self.pos - 1)?;
                    // Single-byte escapes may form ranges; multi-range
                    // escapes (\d, \w, ...) are unioned in as-is
                    if let [(lo, hi)] = sub.ranges[..] {
                        if lo == hi {
                            self.push_class_item(&mut class, lo)?;
                        } else {
                            class.ranges.extend_from_slice(&sub.ranges);
                        }
                    } else {
                        class.ranges.extend_from_slice(&sub.ranges);
                    }
                }
                _ => self.push_class_item(&mut class, b)?,
            }
            first = false;
        }
        if class.is_empty() {
            return Err(format!("empty character class at byte {}", at));
        }
        class.normalize();
        if negated {
            class.negate();
            if class.is_empty() {
                return Err(format!("negated class matches nothing at byte {}", at));
            }
        }
        if self.flags.caseless {
            class.fold_case();
        }
        Ok(class)
    }

    /// A literal class member, possibly the left side of a `a-z` range
    fn push_class_item(&mut self, class: &mut ByteClass, lo: u8) -> Result<(), String> {
        if self.peek() == Some(b'-') && self.input.get(self.pos + 1) != Some(&b']') {
            self.bump(); // '-'
            let hi = match self.bump() {
                Some(b'\\') => {
                    let sub = self.parse_escape(self.pos - 1)?;
                    match sub.ranges[..] {
                        [(b, e)] if b == e => b,
                        _ => return Err("class escape cannot end a range".to_string()),
                    }
                }
                Some(b) => b,
                None => return Err("unterminated range in character class".to_string()),
            };
            if hi < lo {
                return Err(format!(
                    "invalid range '{}-{}' in character class",
                    lo as char, hi as char
                ));
            }
            class.push(lo, hi);
        } else {
            class.push(lo, lo);
        }
        Ok(())
    }
}

/// `\d`, `\w`, `\s` and negated variants
fn perl_class(tag: u8) -> ByteClass {
    let mut class = match tag.to_ascii_lowercase() {
        b'd' => ByteClass {
            ranges: vec![(b'0', b'9')],
        },
        b'w' => ByteClass {
            ranges: vec![(b'0', b'9'), (b'A', b'Z'), (b'_', b'_'), (b'a', b'z')],
        },
        _ => ByteClass {
            ranges: vec![(b'\t', b'\r'), (b' ', b' ')],
        },
    };
    class.normalize();
    if tag.is_ascii_uppercase() {
        class.negate();
    }
    class
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(expr: &str) -> Ast {
        parse(expr, PatternFlags::default()).unwrap()
    }

    #[test]
    fn literal_concat() {
        let ast = parse_ok("abc");
        match ast {
            Ast::Concat(nodes) => assert_eq!(nodes.len(), 3),
            other => panic!("expected concat, got {:?}", other),
        }
    }

    #[test]
    fn dot_excludes_newline_by_default() {
        let ast = parse_ok("a.c");
        if let Ast::Concat(nodes) = ast {
            if let Ast::Class(class) = &nodes[1] {
                assert!(!class.contains(b'\n'));
                assert!(class.contains(b'x'));
                return;
            }
        }
        panic!("unexpected shape");
    }

    #[test]
    fn dot_all_includes_newline() {
        let flags = PatternFlags {
            dot_all: true,
            ..Default::default()
        };
        let ast = parse("a.c", flags).unwrap();
        if let Ast::Concat(nodes) = ast {
            if let Ast::Class(class) = &nodes[1] {
                assert!(class.contains(b'\n'));
                return;
            }
        }
        panic!("unexpected shape");
    }

    #[test]
    fn bracket_class_ranges_and_negation() {
        let ast = parse_ok("[a-cx]");
        if let Ast::Class(class) = ast {
            assert!(class.contains(b'a'));
            assert!(class.contains(b'c'));
            assert!(class.contains(b'x'));
            assert!(!class.contains(b'd'));
        } else {
            panic!("expected class");
        }

        let ast = parse_ok("[^a]");
        if let Ast::Class(class) = ast {
            assert!(!class.contains(b'a'));
            assert!(class.contains(b'b'));
            assert!(class.contains(0));
        } else {
            panic!("expected class");
        }
    }

    #[test]
    fn alternation_and_groups() {
        let ast = parse_ok("ab|c(d|e)f");
        match ast {
            Ast::Alternate(branches) => assert_eq!(branches.len(), 2),
            other => panic!("expected alternation, got {:?}", other),
        }
    }

    #[test]
    fn counted_repeats() {
        match parse_ok("a{2,4}") {
            Ast::Repeat { min, max, .. } => {
                assert_eq!(min, 2);
                assert_eq!(max, Some(4));
            }
            other => panic!("expected repeat, got {:?}", other),
        }
        match parse_ok("a{3}") {
            Ast::Repeat { min, max, .. } => {
                assert_eq!(min, 3);
                assert_eq!(max, Some(3));
            }
            other => panic!("expected repeat, got {:?}", other),
        }
        // Not a counted repeat: literal braces
        assert!(parse("a{x}", PatternFlags::default()).is_ok());
    }

    #[test]
    fn repeat_limit_enforced() {
        let err = parse("a{1,9999}", PatternFlags::default()).unwrap_err();
        assert!(err.contains("limit"));
    }

    #[test]
    fn caseless_folds_literals() {
        let flags = PatternFlags {
            caseless: true,
            ..Default::default()
        };
        let ast = parse("a", flags).unwrap();
        if let Ast::Class(class) = ast {
            assert!(class.contains(b'a'));
            assert!(class.contains(b'A'));
        } else {
            panic!("expected class");
        }
    }

    #[test]
    fn unsupported_constructs_error() {
        assert!(parse("a(?:b)", PatternFlags::default()).is_err());
        assert!(parse("a\\b", PatternFlags::default()).is_err()); // word boundary unsupported
        assert!(parse("(ab", PatternFlags::default()).is_err());
        assert!(parse("ab)", PatternFlags::default()).is_err());
        assert!(parse("*a", PatternFlags::default()).is_err());
        assert!(parse("[z-a]", PatternFlags::default()).is_err());
        assert!(parse("[]", PatternFlags::default()).is_err());
    }

    #[test]
    fn hex_escape() {
        let ast = parse_ok("\\x41");
        if let Ast::Class(class) = ast {
            assert!(class.contains(b'A'));
        } else {
            panic!("expected class");
        }
    }

    #[test]
    fn nullable_detection() {
        assert!(parse_ok("a*").is_nullable());
        assert!(parse_ok("a?b?").is_nullable());
        assert!(parse_ok("^").is_nullable());
        assert!(!parse_ok("a+").is_nullable());
        assert!(!parse_ok("ab|c").is_nullable());
        assert!(!parse_ok("^a$").is_nullable());
    }

    #[test]
    fn leading_bytes_for_prefilter() {
        let lead = parse_ok("abc|adx").leading_bytes().unwrap();
        assert_eq!(lead.ranges, vec![(b'a', b'a')]);

        // Anchored head disqualifies
        assert!(parse_ok("^abc").leading_bytes().is_none());

        // Nullable head widens to the following element
        let lead = parse_ok("a?bc").leading_bytes().unwrap();
        assert!(lead.contains(b'a'));
        assert!(lead.contains(b'b'));
    }

    #[test]
    fn class_negate_roundtrip() {
        let mut class = ByteClass::singleton(b'a');
        class.normalize();
        class.negate();
        class.negate();
        assert_eq!(class.ranges, vec![(b'a', b'a')]);
    }
}
