use regex::Regex;

use crate::errors::AppError;
use crate::lexicon::{alternation, Lexicon};

/// Fragments shorter than this (in characters, after trimming) are dropped.
pub const MIN_FRAGMENT_CHARS: usize = 4;

/// Stand-in for a protected `·` while bullets are being split.
const PROTECTED_DOT: char = '\u{E000}';

/// Replaces the HTML entities the feeds leave behind.
pub fn normalize_entities(text: &str) -> String {
    text.replace("&middot;", "·")
        .replace("&nbsp;", " ")
        .replace('\u{a0}', " ")
        .replace("&amp;", "&")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Splits free-text biographies into atomic candidate items.
///
/// Each rule runs over the current fragments, so earlier cuts compose with
/// later ones. Nothing is re-merged afterwards.
pub struct Segmenter {
    protected_compounds: Vec<String>,
    /// Whitespace run that follows a role/qualification suffix.
    after_suffix: Regex,
    /// Whitespace run that follows a closing parenthesis.
    after_paren: Regex,
    line_break: Regex,
    decorated_header: Regex,
    bare_header: Regex,
}

impl Segmenter {
    pub fn new(lexicon: &Lexicon) -> Result<Self, AppError> {
        let suffixes = alternation(&lexicon.split_suffixes);
        let headers = alternation(&lexicon.section_headers);

        Ok(Self {
            protected_compounds: lexicon
                .protected_compounds
                .iter()
                .filter(|c| c.contains('·'))
                .cloned()
                .collect(),
            after_suffix: Regex::new(&format!(r"(?:{})(\s+)", suffixes))?,
            after_paren: Regex::new(r"\)(\s+)")?,
            line_break: Regex::new(r"\n+| {3,}")?,
            decorated_header: Regex::new(&format!(
                r"(?:\[\s*(?:{h})\s*\]|<\s*(?:{h})\s*>|(?:\*\*|[■□○▶◆◇▲▽※☞*]|\d[.)]|[가나][.)]|[①②㉠㉡])\s*(?:{h}))\s*:?",
                h = headers
            ))?,
            bare_header: Regex::new(&format!(r"^\s*(?:{})(?:\s*:\s*|\s+|$)", headers))?,
        })
    }

    /// Runs the full rule cascade over `text`.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let mut working = vec![text.to_string()];

        working = self.split_bullets(working);
        working = flat_map(working, |f| cut_at_group(&self.after_suffix, f));
        working = flat_map(working, |f| cut_at_group(&self.after_paren, f));
        working = flat_map(working, |f| {
            self.line_break.split(f).map(str::to_string).collect()
        });
        working = flat_map(working, |f| {
            self.decorated_header
                .split(f)
                .map(|piece| self.bare_header.replace(piece, "").into_owned())
                .collect()
        });

        working
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| f.chars().count() >= MIN_FRAGMENT_CHARS)
            .collect()
    }

    fn split_bullets(&self, fragments: Vec<String>) -> Vec<String> {
        flat_map(fragments, |fragment| {
            let mut shielded = fragment.to_string();
            for compound in &self.protected_compounds {
                let masked = compound.replace('·', &PROTECTED_DOT.to_string());
                shielded = shielded.replace(compound.as_str(), &masked);
            }
            shielded
                .split(['•', '·'])
                .map(|piece| piece.replace(PROTECTED_DOT, "·"))
                .collect()
        })
    }
}

fn flat_map<F>(fragments: Vec<String>, f: F) -> Vec<String>
where
    F: Fn(&str) -> Vec<String>,
{
    fragments.iter().flat_map(|fragment| f(fragment)).collect()
}

/// Cuts `text` wherever capture group 1 of `re` matches, dropping the group.
/// The rest of the match stays with the left-hand piece, which is how the
/// trigger word survives without lookbehind support.
fn cut_at_group(re: &Regex, text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for caps in re.captures_iter(text) {
        if let Some(gap) = caps.get(1) {
            pieces.push(text[start..gap.start()].to_string());
            start = gap.end();
        }
    }
    pieces.push(text[start..].to_string());
    pieces
}
