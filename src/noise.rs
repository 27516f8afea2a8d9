use regex::Regex;

use crate::errors::AppError;
use crate::lexicon::Lexicon;

/// Indicator counts for one page. Every indicator counts once, however often
/// it occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoiseSignals {
    pub real: usize,
    pub menu: usize,
    pub suspicious: usize,
    /// Text length in characters.
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Real,
    Noise,
}

impl NoiseSignals {
    /// First matching rule wins.
    pub fn verdict(&self) -> Verdict {
        if self.real >= 5 {
            return Verdict::Real;
        }
        if (2..=4).contains(&self.real) && self.len > 600 {
            return Verdict::Real;
        }
        if self.menu >= 3 && self.real <= 1 {
            return Verdict::Noise;
        }
        if self.len < 400 && self.real == 0 {
            return Verdict::Noise;
        }
        if self.suspicious >= 2 && self.real <= 1 {
            return Verdict::Noise;
        }
        Verdict::Real
    }
}

/// Tells real biography pages apart from pages that only carry the shared
/// template's navigation menu. Counts content and menu indicators and hands
/// them to [`NoiseSignals::verdict`].
pub struct NoiseDetector {
    real_phrases: Vec<String>,
    real_patterns: Vec<Regex>,
    menu_phrases: Vec<String>,
    more_items: Regex,
    suspicious_phrases: Vec<String>,
}

impl NoiseDetector {
    pub fn new(lexicon: &Lexicon) -> Result<Self, AppError> {
        let noise = &lexicon.noise;
        let real_phrases = noise
            .section_markers
            .iter()
            .chain(&noise.content_vocabulary)
            .chain(&noise.office_titles)
            .chain(&noise.party_names)
            .cloned()
            .collect();

        Ok(Self {
            real_phrases,
            real_patterns: vec![
                // Four-digit years 1940..=2039
                Regex::new(r"(?:^|[^0-9])(?:19[4-9][0-9]|20[0-3][0-9])(?:[^0-9]|$)")?,
                // Term numbers such as 제21대
                Regex::new(r"제?\s*\d{1,2}\s*대(?:\s|국회|$)")?,
                Regex::new(r"\d{4}(?:\.\s*\d{1,2})?\s*[~～–-]\s*(?:\d{4}|현재)")?,
            ],
            menu_phrases: noise.menu_phrases.clone(),
            more_items: Regex::new(r"외\s*\d+\s*개")?,
            suspicious_phrases: noise.suspicious_ui_phrases.clone(),
        })
    }

    pub fn signals(&self, text: &str, name: &str) -> NoiseSignals {
        let real = self
            .real_phrases
            .iter()
            .filter(|p| text.contains(p.as_str()))
            .count()
            + self.real_patterns.iter().filter(|re| re.is_match(text)).count();

        let menu = self
            .menu_phrases
            .iter()
            .filter(|p| text.contains(p.replace("{name}", name).as_str()))
            .count()
            + usize::from(self.more_items.is_match(text));

        let suspicious = self
            .suspicious_phrases
            .iter()
            .filter(|p| text.contains(p.as_str()))
            .count();

        NoiseSignals {
            real,
            menu,
            suspicious,
            len: text.chars().count(),
        }
    }

    pub fn is_noise_only(&self, text: &str, name: &str) -> bool {
        let signals = self.signals(text, name);
        let verdict = signals.verdict();
        if verdict == Verdict::Noise {
            tracing::debug!(
                "Noise-only page for {} (real={}, menu={}, suspicious={}, len={})",
                name,
                signals.real,
                signals.menu,
                signals.suspicious,
                signals.len
            );
        }
        verdict == Verdict::Noise
    }
}
