// ============================================================
// Layer 4: Sentence Preprocessor
// ============================================================
// Cleans one line of raw corpus text and splits it into tokens.
//
// Corpus files often contain:
//   - Non-breaking spaces (U+00A0) and zero-width spaces (U+200B)
//   - Byte order marks at the start of the first line
//   - Tabs and carriage returns from Windows line endings
//   - Runs of spaces left over from alignment tools
//
// Left alone these become separate "tokens" and waste vocabulary
// slots, so every variant is folded into a single plain space
// before whitespace tokenisation.
//
// Segmentation beyond whitespace (BPE, SentencePiece) is an
// external step; its output is already space-separated and
// passes through unchanged.

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Normalise a single sentence: odd whitespace becomes a plain space,
    /// runs of spaces collapse, and the ends are trimmed.
    pub fn clean(&self, line: &str) -> String {
        let mut out        = String::with_capacity(line.len());
        let mut last_space = true;

        for c in line.chars() {
            let c = match c {
                '\t' | '\r' | '\n' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            };
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        out.trim_end().to_string()
    }

    /// Clean and split a sentence into whitespace-delimited tokens.
    pub fn tokenize(&self, line: &str) -> Vec<String> {
        self.clean(line)
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hallo   wereld"), "hallo wereld");
    }

    #[test]
    fn test_trims_edges() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  hallo wereld \r\n"), "hallo wereld");
    }

    #[test]
    fn test_removes_control_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hallo\x01wereld"), "hallo wereld");
    }

    #[test]
    fn test_tokenize_handles_unicode_spaces() {
        let p = Preprocessor::new();
        assert_eq!(
            p.tokenize("\u{FEFF}Waar\u{00A0}is het\tstation ?"),
            vec!["Waar", "is", "het", "station", "?"]
        );
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean(""), "");
        assert!(p.tokenize("   ").is_empty());
    }
}
