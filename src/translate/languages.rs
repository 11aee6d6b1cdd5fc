use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub model_code: &'static str,
    /// How many output tokens the model may emit per input token
    pub length_factor: u32,
}

pub const LANGUAGES: &[Language] = &[
    Language { code: "en", model_code: "eng_Latn", length_factor: 3 },
    Language { code: "zh", model_code: "zho_Hans", length_factor: 6 },
    Language { code: "ja", model_code: "jpn_Jpan", length_factor: 6 },
    Language { code: "ko", model_code: "kor_Hang", length_factor: 6 },
    Language { code: "fr", model_code: "fra_Latn", length_factor: 3 },
    Language { code: "de", model_code: "deu_Latn", length_factor: 3 },
    Language { code: "es", model_code: "spa_Latn", length_factor: 3 },
    Language { code: "ru", model_code: "rus_Cyrl", length_factor: 3 },
    Language { code: "ar", model_code: "arb_Arab", length_factor: 3 },
];

const FALLBACK_SOURCE: &Language = &LANGUAGES[0];
const FALLBACK_TARGET: &Language = &LANGUAGES[1];

pub fn lookup(code: &str) -> Option<&'static Language> {
    let code = code.trim();
    LANGUAGES.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

/// Unknown source codes translate as English
pub fn resolve_source(code: &str) -> &'static Language {
    lookup(code).unwrap_or(FALLBACK_SOURCE)
}

/// Unknown target codes translate into Simplified Chinese
pub fn resolve_target(code: &str) -> &'static Language {
    lookup(code).unwrap_or(FALLBACK_TARGET)
}
