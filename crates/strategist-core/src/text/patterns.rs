//! Shared word lists and patterns for the text helpers.
//!
//! The lists cover English, Spanish and French, the languages the annotation
//! corpora are written in. Everything is lowercase.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    /// A word: letters/digits with inner apostrophes or hyphens.
    pub static ref WORD_PATTERN: Regex = Regex::new(
        r"[\p{L}\p{N}]+(?:['’\-][\p{L}\p{N}]+)*"
    ).unwrap();

    /// Past participles in the three supported languages.
    pub static ref PARTICIPLE_PATTERN: Regex = Regex::new(
        r"(?i)^(?:\p{L}+(?:ed|en)|\p{L}+(?:ado|ada|ados|adas|ido|ida|idos|idas)|\p{L}+(?:é|ée|és|ées|is|ise|it|ite|u|ue|us|ues))$"
    ).unwrap();

    /// Explicit connectors that spell out relations between ideas.
    pub static ref CONNECTOR_PATTERN: Regex = Regex::new(
        r"(?i)\b(because|therefore|that is|in other words|for example|for instance|which means|this means|as a result|so that|porque|por lo tanto|es decir|o sea|por ejemplo|esto significa|lo que significa|por eso|parce que|donc|c'est-à-dire|autrement dit|par exemple|cela signifie|ce qui veut dire|c'est pourquoi)\b"
    ).unwrap();

    pub static ref STOPWORDS: HashSet<&'static str> = [
        // English
        "a", "an", "the", "and", "or", "but", "if", "of", "to", "in", "on", "at", "by",
        "for", "with", "from", "as", "is", "are", "was", "were", "be", "been", "being",
        "it", "its", "this", "that", "these", "those", "there", "their", "they", "them",
        "he", "she", "his", "her", "we", "our", "you", "your", "i", "me", "my", "not",
        "no", "so", "than", "then", "also", "which", "who", "whom", "what", "when",
        "where", "has", "have", "had", "do", "does", "did", "will", "would", "can",
        "could", "should", "may", "might", "into", "about", "over", "after", "before",
        // Spanish
        "el", "la", "los", "las", "un", "una", "unos", "unas", "y", "o", "pero", "de",
        "del", "al", "en", "con", "por", "para", "que", "se", "su", "sus", "es", "son",
        "fue", "fueron", "era", "ser", "está", "están", "lo", "le", "les", "como",
        "más", "muy", "sin", "sobre", "entre", "este", "esta", "estos", "estas", "ese",
        "esa", "eso", "ya", "ha", "han", "hay", "también", "cuando", "donde", "porque",
        "sí", "mi", "tu", "nos",
        // French
        "le", "les", "une", "des", "du", "et", "ou", "mais", "dans", "sur", "avec",
        "pour", "par", "qui", "quoi", "ce", "cette", "ces", "ses", "son", "sa", "est",
        "sont", "été", "être", "il", "elle", "ils", "elles", "nous", "vous", "je",
        "ne", "pas", "plus", "aux", "au", "leur", "leurs", "aussi", "comme", "très",
    ]
    .into_iter()
    .collect();

    pub static ref PRONOUNS: HashSet<&'static str> = [
        "i", "me", "you", "he", "him", "she", "her", "it", "we", "us", "they", "them",
        "yo", "tú", "usted", "él", "ella", "nosotros", "nosotras", "vosotros",
        "ellos", "ellas", "ustedes", "lo", "la", "le", "les", "los", "las", "se",
        "je", "tu", "il", "elle", "nous", "vous", "ils", "elles", "on", "lui", "leur", "eux",
    ]
    .into_iter()
    .collect();

    /// Auxiliaries that introduce a passive construction.
    pub static ref PASSIVE_AUXILIARIES: HashSet<&'static str> = [
        "is", "are", "was", "were", "be", "been", "being", "gets", "got",
        "es", "son", "fue", "fueron", "era", "eran", "sido", "será", "serán",
        "est", "sont", "fut", "furent", "été", "sera", "seront", "était", "étaient",
    ]
    .into_iter()
    .collect();

    /// Abbreviations whose trailing period does not end a sentence.
    pub static ref ABBREVIATIONS: HashSet<&'static str> = [
        "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "inc", "ltd",
        "corp", "fig", "vol", "pp", "eds", "approx", "dept", "e.g", "i.e",
        "sra", "srta", "dra", "ud", "uds", "pág", "págs", "ej", "núm", "aprox",
        "avda", "cía", "admón",
        "mm", "mme", "mlle", "mgr", "env", "cf", "éd", "chap",
    ]
    .into_iter()
    .collect();
}

/// Check whether a lowercase word is a stop-word.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word)
}

/// Check whether a lowercase word is a personal pronoun.
pub fn is_pronoun(word: &str) -> bool {
    PRONOUNS.contains(word)
}

/// Check whether a lowercase word can introduce a passive.
pub fn is_passive_auxiliary(word: &str) -> bool {
    PASSIVE_AUXILIARIES.contains(word)
}

/// Check whether a word looks like a past participle.
pub fn looks_like_participle(word: &str) -> bool {
    word.chars().count() > 3 && PARTICIPLE_PATTERN.is_match(word)
}

/// Count explicit connectors in a text.
pub fn count_connectors(text: &str) -> usize {
    CONNECTOR_PATTERN.find_iter(text).count()
}
