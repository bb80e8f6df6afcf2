//! Plausibility scoring of trial decodes.

use crate::config::DetectionConfig;

/// Per-decode statistics behind a score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecodeStats {
    pub chars: usize,
    pub plausible: usize,
    pub garbage: usize,
    pub longest_garbage_run: usize,
}

impl DecodeStats {
    pub fn collect(text: &str) -> Self {
        let mut stats = DecodeStats::default();
        let mut run = 0;
        for c in text.chars() {
            stats.chars += 1;
            if is_garbage(c) {
                stats.garbage += 1;
                run += 1;
                stats.longest_garbage_run = stats.longest_garbage_run.max(run);
                continue;
            }
            run = 0;
            if is_plausible(c) {
                stats.plausible += 1;
            }
        }
        stats
    }

    /// Garbage decodes score zero, everything else the plausible share.
    pub fn score(&self, config: &DetectionConfig) -> f64 {
        if self.chars == 0 || self.is_garbage(config) {
            return 0.0;
        }
        self.plausible as f64 / self.chars as f64
    }

    pub fn is_garbage(&self, config: &DetectionConfig) -> bool {
        let ratio = self.garbage as f64 / self.chars.max(1) as f64;
        ratio > config.garbage_ratio || self.longest_garbage_run >= config.garbage_run
    }
}

pub fn score_decoded(text: &str, config: &DetectionConfig) -> f64 {
    DecodeStats::collect(text).score(config)
}

/// Replacement characters and control characters a decoder leaves behind
/// when it is fed the wrong encoding.
fn is_garbage(c: char) -> bool {
    c == '\u{FFFD}' || (c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\u{0C}'))
}

fn is_plausible(c: char) -> bool {
    c.is_ascii_graphic()
        || c.is_ascii_whitespace()
        || crate::text::is_cjk(c)
        || matches!(c,
            // CJK symbols and punctuation
            '\u{3000}'..='\u{303F}'
            // fullwidth ASCII variants
            | '\u{FF01}'..='\u{FF5E}'
            // general punctuation: dashes, quotes, ellipsis
            | '\u{2010}'..='\u{2027}'
            // hangul jamo
            | '\u{1100}'..='\u{11FF}'
            | '\u{3130}'..='\u{318F}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_chinese_scores_high() {
        let config = DetectionConfig::default();
        let score = score_decoded("第一章 开端\n“你好，”林老师说。", &config);
        assert!(score > 0.99, "score was {score}");
    }

    #[test]
    fn replacement_density_disqualifies() {
        let config = DetectionConfig::default();
        let mut text = "正常的文字".repeat(30);
        text.push('\u{FFFD}');
        // 1 in 151 chars is above the 0.5% limit
        assert_eq!(score_decoded(&text, &config), 0.0);
    }

    #[test]
    fn garbage_run_disqualifies() {
        let config = DetectionConfig::default();
        let text = format!("{}\u{FFFD}\u{FFFD}\u{FFFD}", "字".repeat(5000));
        let stats = DecodeStats::collect(&text);
        assert_eq!(stats.longest_garbage_run, 3);
        assert!(stats.is_garbage(&config));

        let lenient = DetectionConfig {
            garbage_run: 4,
            ..DetectionConfig::default()
        };
        assert!(!stats.is_garbage(&lenient));
    }

    #[test]
    fn control_characters_count_as_garbage() {
        let stats = DecodeStats::collect("ab\u{0001}c\u{0085}");
        assert_eq!(stats.garbage, 2);
        assert_eq!(stats.plausible, 3);
    }

    #[test]
    fn empty_text_scores_zero() {
        assert_eq!(score_decoded("", &DetectionConfig::default()), 0.0);
    }
}
