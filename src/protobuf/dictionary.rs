//! Name dictionary for template name compression.
//!
//! A name is stored as a *marked name* where every scope component left of a
//! top-level `::` and every top-level template argument is replaced by a
//! single `\0` placeholder, plus the ids of the entries the placeholders
//! stand for, in order:
//!
//! ```text
//! std::vector<int, std::allocator<int>>
//!   -> "\0::vector<\0, \0>"  markers [std, int, std::allocator<int>]
//! ```
//!
//! Sub-names are interned before the entry that references them, so a marker
//! id is always smaller than the id of the entry holding it and resolution
//! cannot cycle.

use std::collections::HashMap;

/// Placeholder byte standing for one marker
pub const PLACEHOLDER: char = '\0';

/// Operator spellings that may follow the `operator` keyword, longest first
const OPERATOR_TOKENS: &[&str] = &[
    "<<=", ">>=", "<=>", "->*", "<<", ">>", "<=", ">=", "->", "==", "!=", "&&", "||", "++", "--",
    "+=", "-=", "*=", "/=", "%=", "^=", "&=", "|=", "()", "[]", "<", ">", "+", "-", "*", "/", "%",
    "^", "&", "|", "~", "!", "=", ",",
];

/// One stored dictionary entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub marked_name: String,
    pub markers: Vec<u32>,
}

/// Growing table of names, keyed by creation order
#[derive(Debug, Default)]
pub struct NameDictionary {
    entries: Vec<DictionaryEntry>,
    ids: HashMap<String, u32>,
    resolved: Vec<Option<String>>,
    drained: usize,
}

impl NameDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&DictionaryEntry> {
        self.entries.get(id as usize)
    }

    /// Intern `name`, returning its id.
    ///
    /// Interning the same literal name again returns the same id and creates
    /// nothing new.
    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let (marked_name, markers) = self.mark_name(name);
        let id = self.push(DictionaryEntry {
            marked_name,
            markers,
        });
        self.ids.insert(name.to_string(), id);
        self.resolved[id as usize] = Some(name.to_string());
        id
    }

    /// Append an entry decoded from a trace. Returns its id.
    pub fn insert(&mut self, entry: DictionaryEntry) -> u32 {
        self.push(entry)
    }

    fn push(&mut self, entry: DictionaryEntry) -> u32 {
        let id = self.entries.len() as u32;
        self.entries.push(entry);
        self.resolved.push(None);
        id
    }

    /// Entries created since the previous call, in id order
    pub fn drain_new(&mut self) -> &[DictionaryEntry] {
        let start = self.drained;
        self.drained = self.entries.len();
        &self.entries[start..]
    }

    /// Full text of entry `id`, or `None` if `id` (or any marker it
    /// references) is undefined.
    pub fn resolve(&mut self, id: u32) -> Option<String> {
        if let Some(Some(text)) = self.resolved.get(id as usize) {
            return Some(text.clone());
        }
        let entry = self.entries.get(id as usize)?.clone();

        let mut text = String::with_capacity(entry.marked_name.len());
        let mut markers = entry.markers.iter();
        for c in entry.marked_name.chars() {
            if c != PLACEHOLDER {
                text.push(c);
                continue;
            }
            match markers.next() {
                // Markers always point backwards; anything else is corrupt.
                Some(&marker) if marker < id => text.push_str(&self.resolve(marker)?),
                Some(_) => return None,
                None => text.push(c),
            }
        }

        self.resolved[id as usize] = Some(text.clone());
        Some(text)
    }

    /// Split `name` into a marked name, interning every segment it replaces.
    fn mark_name(&mut self, name: &str) -> (String, Vec<u32>) {
        let bytes = name.as_bytes();
        let mut out = String::with_capacity(name.len());
        let mut markers = Vec::new();

        let mut angle_depth = 0usize;
        let mut paren_depth = 0usize;
        // Start of the current scope component, in `name` and in `out`.
        let mut scope_start = 0usize;
        let mut scope_out = 0usize;
        let mut scope_markers = 0usize;
        // Start of the current top-level template argument.
        let mut arg_start = 0usize;
        // Text at depth zero not yet copied into `out`.
        let mut copied_to = 0usize;

        let mut i = 0usize;
        while i < bytes.len() {
            if let Some(len) = operator_len(name, i) {
                i += len;
                continue;
            }
            match bytes[i] {
                b'(' => paren_depth += 1,
                b')' => paren_depth = paren_depth.saturating_sub(1),
                b'<' if paren_depth == 0 => {
                    angle_depth += 1;
                    if angle_depth == 1 {
                        out.push_str(&name[copied_to..=i]);
                        arg_start = i + 1;
                    }
                }
                b'>' if paren_depth == 0 && angle_depth > 0 => {
                    if angle_depth == 1 {
                        self.mark_argument(&name[arg_start..i], &mut out, &mut markers);
                        out.push('>');
                        copied_to = i + 1;
                    }
                    angle_depth -= 1;
                }
                b',' if paren_depth == 0 && angle_depth == 1 => {
                    self.mark_argument(&name[arg_start..i], &mut out, &mut markers);
                    out.push(',');
                    arg_start = i + 1;
                }
                b':' if paren_depth == 0
                    && angle_depth == 0
                    && bytes.get(i + 1) == Some(&b':') =>
                {
                    if i > scope_start {
                        // The whole component becomes one marker, replacing
                        // whatever was emitted for it so far.
                        out.truncate(scope_out);
                        markers.truncate(scope_markers);
                        let id = self.intern(&name[scope_start..i]);
                        out.push(PLACEHOLDER);
                        markers.push(id);
                    } else {
                        out.push_str(&name[copied_to..i]);
                    }
                    out.push_str("::");
                    i += 2;
                    scope_start = i;
                    copied_to = i;
                    scope_out = out.len();
                    scope_markers = markers.len();
                    continue;
                }
                _ => {}
            }
            i += 1;
        }

        if angle_depth > 0 {
            // Unbalanced argument list: keep the tail verbatim.
            out.push_str(&name[arg_start..]);
        } else {
            out.push_str(&name[copied_to..]);
        }
        (out, markers)
    }

    /// Emit one template argument as a placeholder, keeping surrounding
    /// whitespace literal.
    fn mark_argument(&mut self, arg: &str, out: &mut String, markers: &mut Vec<u32>) {
        let core = arg.trim();
        if core.is_empty() {
            out.push_str(arg);
            return;
        }
        let lead = arg.len() - arg.trim_start().len();
        out.push_str(&arg[..lead]);
        out.push(PLACEHOLDER);
        markers.push(self.intern(core));
        out.push_str(&arg[lead + core.len()..]);
    }
}

/// Length of an `operator` keyword plus its symbol at `i`, if one starts
/// there. Only the symbol spelling is consumed, so `operator<<<int>` leaves
/// the final `<` to open the argument list.
fn operator_len(name: &str, i: usize) -> Option<usize> {
    const KEYWORD: &str = "operator";
    let rest = name.get(i..)?;
    if !rest.starts_with(KEYWORD) {
        return None;
    }
    let bytes = name.as_bytes();
    if i > 0 && is_ident_byte(bytes[i - 1]) {
        return None;
    }
    let after = &rest[KEYWORD.len()..];
    if after.as_bytes().first().copied().is_some_and(is_ident_byte) {
        return None;
    }
    let spaces = after.len() - after.trim_start_matches(' ').len();
    let symbol = &after[spaces..];
    let symbol_len = OPERATOR_TOKENS
        .iter()
        .find(|token| symbol.starts_with(**token))
        .map_or(0, |token| token.len());
    Some(KEYWORD.len() + spaces + symbol_len)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
