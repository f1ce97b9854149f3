//! Text analysis shared by the corpus and query sides of the lexical index.

use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, TextAnalyzer, TokenStream};

/// Tokens longer than this many characters are dropped.
const MAX_TOKEN_CHARS: usize = 40;

/// Turns text into index terms.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// tantivy analyzer (word segmentation + lowercasing) with optional CJK bigrams.
#[derive(Clone)]
pub struct AnalyzerTokenizer {
    analyzer: TextAnalyzer,
    cjk_bigrams: bool,
}

impl AnalyzerTokenizer {
    /// Word tokens, with Hangul / Han / Kana tokens expanded to character bigrams
    /// so that a stem matches its inflected or particle-attached forms.
    pub fn multilingual() -> Self {
        Self {
            analyzer: base_analyzer(),
            cjk_bigrams: true,
        }
    }

    /// Word tokens only.
    pub fn simple() -> Self {
        Self {
            analyzer: base_analyzer(),
            cjk_bigrams: false,
        }
    }
}

fn base_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .build()
}

impl Tokenizer for AnalyzerTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        // token_stream needs exclusive access to the analyzer.
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(text);

        let mut tokens = Vec::new();
        while stream.advance() {
            let word = &stream.token().text;
            let len = word.chars().count();
            if len > MAX_TOKEN_CHARS {
                continue;
            }
            if self.cjk_bigrams && len > 1 && word.chars().any(is_cjk) {
                let chars: Vec<char> = word.chars().collect();
                tokens.extend(chars.windows(2).map(|w| w.iter().collect::<String>()));
            } else {
                tokens.push(word.clone());
            }
        }
        tokens
    }
}

/// Hangul, Han ideographs, Hiragana and Katakana.
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{1100}'..='\u{11FF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{3130}'..='\u{318F}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}'
    )
}
