//! Parsed Wine registry files (`user.reg`, `system.reg`).
//!
//! A registry file is a preamble followed by bracketed sections:
//!
//! ```text
//! WINE REGISTRY Version 2
//! ;; All keys relative to \\User
//!
//! [Software\\Wine\\DllOverrides] 1700000000
//! #time=1da0c1f2e3b4a5c
//! "d3dx9_43"="native"
//! "mscoree"=""
//! ```
//!
//! Every line is kept verbatim, so serializing an unmodified parse yields the
//! input byte for byte. Mutation only rewrites the value lines it replaces.
//! Values continued with a trailing backslash (multi-line hex data) stay in
//! one [`Line::Value`].

use std::fmt;
use std::path::Path;

use crate::errors::VodkaError;
use crate::manager::Result;

/// Section holding DLL overrides in `user.reg`.
pub const DLL_OVERRIDES_SECTION: &str = r"Software\\Wine\\DllOverrides";

/// Section holding environment variables in `system.reg`.
pub const ENVIRONMENT_SECTION: &str =
    r"System\\CurrentControlSet\\Control\\Session Manager\\Environment";

/// Root a registry file is relative to, used when creating a new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hive {
    /// `user.reg`
    User,
    /// `system.reg`
    Machine,
}

impl Hive {
    fn preamble(self) -> [String; 3] {
        let root = match self {
            Hive::User => "User",
            Hive::Machine => "Machine",
        };
        [
            "WINE REGISTRY Version 2\n".to_string(),
            format!(";; All keys relative to \\\\{root}\n"),
            "\n".to_string(),
        ]
    }
}

/// One physical line (or continued value) inside a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// `#time=...` modification stamp.
    Timestamp(String),
    /// `"key"=data` or `@=data`; `key` is unescaped, `raw` is verbatim.
    Value { key: String, raw: String },
    /// Anything else: blank lines, `#class=`, `#link`, comments.
    Other(String),
}

impl Line {
    fn raw(&self) -> &str {
        match self {
            Line::Timestamp(raw) | Line::Other(raw) | Line::Value { raw, .. } => raw,
        }
    }

    fn raw_mut(&mut self) -> &mut String {
        match self {
            Line::Timestamp(raw) | Line::Other(raw) | Line::Value { raw, .. } => raw,
        }
    }

    fn key_matches(&self, wanted: &str) -> bool {
        matches!(self, Line::Value { key, .. } if key.eq_ignore_ascii_case(wanted))
    }
}

/// A bracketed section and its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    header: String,
    name: String,
    body: Vec<Line>,
}

impl Section {
    fn new(name: &str, now: u64) -> Self {
        Self {
            header: format!("[{name}]\n"),
            name: name.to_string(),
            body: vec![Line::Timestamp(format!("#time={now:x}\n"))],
        }
    }

    /// Section name as written between the brackets.
    #[cfg(test)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lines after the header.
    #[cfg(test)]
    pub fn lines(&self) -> &[Line] {
        &self.body
    }

    /// Number of entries whose key matches `key`.
    #[cfg(test)]
    pub fn count(&self, key: &str) -> usize {
        self.body.iter().filter(|line| line.key_matches(key)).count()
    }

    /// Data of the entry for `key`. Quoted strings are unescaped; other data
    /// types are returned as written.
    #[cfg(test)]
    pub fn value(&self, key: &str) -> Option<String> {
        self.body.iter().find_map(|line| match line {
            Line::Value { key: k, raw } if k.eq_ignore_ascii_case(key) => {
                let (_, end) = split_key(raw)?;
                let data = raw[end..].strip_prefix('=')?.trim_end_matches(['\n', '\r']);
                Some(match data.strip_prefix('"') {
                    Some(quoted) => unescape_until_quote(quoted).map_or_else(
                        || data.to_string(),
                        |(value, _)| value,
                    ),
                    None => data.to_string(),
                })
            }
            _ => None,
        })
    }

    /// Replaces entries for the given keys with a contiguous block inserted
    /// right after the timestamp line.
    fn set_values(&mut self, values: &[(String, String)]) {
        let mut block: Vec<&(String, String)> = Vec::new();
        for (i, pair) in values.iter().enumerate() {
            let superseded = values[i + 1..]
                .iter()
                .any(|(later, _)| later.eq_ignore_ascii_case(&pair.0));
            if !superseded {
                block.push(pair);
            }
        }

        self.body
            .retain(|line| !block.iter().any(|(key, _)| line.key_matches(key)));

        let insert_at = self
            .body
            .iter()
            .position(|line| matches!(line, Line::Timestamp(_)))
            .map_or(0, |i| i + 1);

        let before = if insert_at == 0 {
            &mut self.header
        } else {
            self.body[insert_at - 1].raw_mut()
        };
        if !before.ends_with('\n') {
            before.push('\n');
        }

        let lines = block.into_iter().map(|(key, value)| Line::Value {
            key: key.clone(),
            raw: format!("\"{}\"=\"{}\"\n", escape(key), escape(value)),
        });
        self.body.splice(insert_at..insert_at, lines);
    }
}

/// A whole registry file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryFile {
    preamble: Vec<String>,
    sections: Vec<Section>,
}

impl RegistryFile {
    /// A new file containing only the standard header for `hive`.
    #[must_use]
    pub fn empty(hive: Hive) -> Self {
        Self {
            preamble: hive.preamble().into(),
            sections: Vec::new(),
        }
    }

    /// Parses registry text. `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::ConfigCorrupt`] for an unterminated section
    /// header or value key.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut preamble = Vec::new();
        let mut sections: Vec<Section> = Vec::new();
        let mut continuing = false;

        for (number, line) in content.split_inclusive('\n').enumerate() {
            let corrupt = |what: &str| {
                VodkaError::config_corrupt(path, format!("line {}: {what}", number + 1))
            };

            if continuing {
                if let Some(Line::Value { raw, .. }) =
                    sections.last_mut().and_then(|s| s.body.last_mut())
                {
                    raw.push_str(line);
                }
                continuing = is_continued(line);
                continue;
            }

            if line.starts_with('[') {
                let name = section_name(line).ok_or_else(|| corrupt("unterminated section header"))?;
                sections.push(Section {
                    header: line.to_string(),
                    name,
                    body: Vec::new(),
                });
                continue;
            }

            let Some(section) = sections.last_mut() else {
                preamble.push(line.to_string());
                continue;
            };

            let parsed = if line.starts_with("#time=") {
                Line::Timestamp(line.to_string())
            } else if line.starts_with('"') || line.starts_with('@') {
                let (key, _) = split_key(line).ok_or_else(|| corrupt("unterminated value name"))?;
                continuing = is_continued(line);
                Line::Value {
                    key,
                    raw: line.to_string(),
                }
            } else {
                Line::Other(line.to_string())
            };
            section.body.push(parsed);
        }

        Ok(Self { preamble, sections })
    }

    /// Finds a section by name, ignoring ASCII case.
    #[cfg(test)]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// All sections in file order.
    #[cfg(test)]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Writes `values` into `section`, creating it at the end of the file
    /// (stamped with `now`) if it does not exist. Existing entries for the
    /// same keys are replaced, not duplicated. Other sections are untouched.
    pub fn set_values(&mut self, section: &str, values: &[(String, String)], now: u64) {
        let index = match self
            .sections
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(section))
        {
            Some(index) => index,
            None => {
                self.append_section(section, now);
                self.sections.len() - 1
            }
        };
        self.sections[index].set_values(values);
    }

    fn append_section(&mut self, name: &str, now: u64) {
        let last = match self.sections.last_mut() {
            Some(section) => match section.body.last_mut() {
                Some(line) => Some(line.raw_mut()),
                None => Some(&mut section.header),
            },
            None => self.preamble.last_mut(),
        };
        let needs_separator = match last {
            Some(last) => {
                if !last.ends_with('\n') {
                    last.push('\n');
                }
                !last.trim().is_empty()
            }
            None => false,
        };
        if needs_separator {
            let separator = "\n".to_string();
            match self.sections.last_mut() {
                Some(section) => section.body.push(Line::Other(separator)),
                None => self.preamble.push(separator),
            }
        }
        self.sections.push(Section::new(name, now));
    }
}

impl fmt::Display for RegistryFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.preamble {
            f.write_str(line)?;
        }
        for section in &self.sections {
            f.write_str(&section.header)?;
            for line in &section.body {
                f.write_str(line.raw())?;
            }
        }
        Ok(())
    }
}

fn is_continued(line: &str) -> bool {
    line.trim_end_matches(['\n', '\r']).ends_with('\\')
}

/// Text between `[` and the first unescaped `]`.
fn section_name(line: &str) -> Option<String> {
    let inner = line.strip_prefix('[')?;
    let mut escaped = false;
    for (i, c) in inner.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ']' => return Some(inner[..i].to_string()),
            _ => {}
        }
    }
    None
}

/// Unescaped key of a value line and the byte offset just past it.
fn split_key(line: &str) -> Option<(String, usize)> {
    if line.starts_with('@') {
        return Some(("@".to_string(), 1));
    }
    let (key, consumed) = unescape_until_quote(line.strip_prefix('"')?)?;
    Some((key, 1 + consumed))
}

/// Unescapes up to the closing quote, returning the text and the bytes consumed
/// including the quote.
fn unescape_until_quote(s: &str) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((out, i + 1)),
            '\\' => {
                let (_, next) = chars.next()?;
                out.push(match next {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
            }
            other => out.push(other),
        }
    }
    None
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '"') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
