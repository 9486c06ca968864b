//! crates/lorelog_core/src/tags.rs
//!
//! Rule-based tag normalization, noise filtering and extraction.
//!
//! Everything here is pure and deterministic. Extraction order is stable:
//! hashtags first, then keyword tags, each in first-seen order.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Maximum length of a canonical tag, in characters.
pub const MAX_TAG_CHARS: usize = 40;

/// Maximum number of tags attached to one article by extraction.
pub const MAX_ARTICLE_TAGS: usize = 20;

/// Anything that is not a letter, a digit, `_`, `-`, the prolonged sound
/// mark or the iteration mark.
static DISALLOWED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}_\-ー々]").expect("valid tag charset"));

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#＃]([\p{L}\p{N}_\-ー々]{2,40})").expect("valid hashtag pattern"));

static ASCII_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9+._-]{2,40}").expect("valid word pattern"));

static MODEL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(gpt|claude|gemini)[-_]?\d+").expect("valid model pattern"));

static RELEVANT_SUBSTRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(ai|llm|rag|auth|oauth|prisma|react|next)").expect("valid relevance pattern")
});

static KATAKANA_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ァ-ヶー]{4,20}").expect("valid katakana pattern"));

/// Generic or platform words that never make a useful tag.
const STOP_WORDS: &[&str] = &[
    "note", "qiita", "zenn", "github", "youtube", "www", "com", "jp", "html", "https", "http",
];

/// Generic Japanese words that show up in almost every title.
const JA_STOP_WORDS: &[&str] = &[
    "入門", "方法", "完全", "解説", "まとめ", "実装", "設定", "比較", "紹介", "最新", "初心者",
    "勉強", "学習", "記事", "自分", "未来", "会社", "仕事",
];

/// Katakana business buzzwords.
const KATAKANA_STOP_WORDS: &[&str] = &[
    "プロダクト",
    "アーキテクチャ",
    "テクノロジー",
    "コンテンツ",
    "マーケティング",
    "キャリア",
    "リーダーシップ",
    "ミーティング",
];

/// Known technical terms accepted as keyword tags verbatim.
const KNOWN_TECH_TERMS: &[&str] = &[
    "ai", "ml", "llm", "nlp", "rag", "gpt", "openai", "langchain", "nextjs", "next-auth",
    "nextauth", "prisma", "typescript", "javascript", "react", "node", "sql", "postgres",
    "sqlite", "docker", "kubernetes", "aws", "gcp", "azure",
];

fn is_hash_mark(c: char) -> bool {
    c == '#' || c == '＃'
}

/// Turns raw text into a canonical tag token, or `None` when nothing usable
/// remains.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let stripped = raw
        .trim()
        .trim_start_matches(is_hash_mark)
        .trim_end_matches(is_hash_mark)
        .trim();
    if stripped.is_empty() {
        return None;
    }

    let mut token = DISALLOWED_CHARS.replace_all(stripped, "").into_owned();
    if token.chars().any(|c| c.is_ascii_alphabetic()) {
        // Lowercasing can expand some letters into combining sequences.
        token = DISALLOWED_CHARS
            .replace_all(&token.to_lowercase(), "")
            .into_owned();
    }

    if token.chars().count() > MAX_TAG_CHARS {
        token = token.chars().take(MAX_TAG_CHARS).collect();
    }
    if token.chars().count() < 2 {
        return None;
    }
    if STOP_WORDS.contains(&token.as_str()) {
        return None;
    }

    Some(token)
}

/// True when `name` should never be stored as a tag: it fails
/// normalization, is purely numeric, looks like a URL or path, or is a
/// generic buzzword.
pub fn is_noisy_tag(name: &str) -> bool {
    let Some(normalized) = normalize_tag(name) else {
        return true;
    };

    if normalized.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    if name.contains('/') || name.contains(':') {
        return true;
    }

    JA_STOP_WORDS.contains(&normalized.as_str())
        || KATAKANA_STOP_WORDS.contains(&normalized.as_str())
}

/// Collects `#token` / `＃token` hashtags in first-occurrence order.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut tags = OrderedTags::default();
    for cap in HASHTAG.captures_iter(text) {
        if let Some(tag) = cap.get(1).and_then(|m| normalize_tag(m.as_str())) {
            tags.push(tag);
        }
    }
    tags.into_vec()
}

/// Collects technical-looking ASCII words and long katakana runs, in
/// first-seen order, with noisy candidates removed.
pub fn extract_keyword_tags(text: &str) -> Vec<String> {
    let mut tags = OrderedTags::default();

    for m in ASCII_WORD.find_iter(text) {
        let raw = m.as_str();
        let Some(tag) = normalize_tag(raw) else {
            continue;
        };
        if KNOWN_TECH_TERMS.contains(&tag.as_str())
            || MODEL_NAME.is_match(raw)
            || RELEVANT_SUBSTRING.is_match(raw)
        {
            tags.push(tag);
        }
    }

    for m in KATAKANA_RUN.find_iter(text) {
        if let Some(tag) = normalize_tag(m.as_str()) {
            tags.push(tag);
        }
    }

    tags.retain(|t| !is_noisy_tag(t));
    tags.into_vec()
}

/// The text an article's tags are derived from.
///
/// `url` is part of the input for completeness but is not scanned: host and
/// path fragments made poor tags.
#[derive(Debug, Clone, Copy)]
pub struct TagSource<'a> {
    pub title: &'a str,
    pub summary: Option<&'a str>,
    pub url: &'a str,
}

/// Derives at most [`MAX_ARTICLE_TAGS`] tags from an article's title and
/// summary. Hashtags come first, then keyword tags.
pub fn extract_article_tags(source: TagSource<'_>) -> Vec<String> {
    let text = [Some(source.title), source.summary]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut tags = OrderedTags::default();
    for tag in extract_hashtags(&text)
        .into_iter()
        .chain(extract_keyword_tags(&text))
    {
        tags.push(tag);
    }
    tags.retain(|t| !is_noisy_tag(t));

    let mut out = tags.into_vec();
    out.truncate(MAX_ARTICLE_TAGS);
    out
}

/// Insertion-ordered set of tag names.
#[derive(Default)]
struct OrderedTags {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl OrderedTags {
    fn push(&mut self, tag: String) {
        if self.seen.insert(tag.clone()) {
            self.items.push(tag);
        }
    }

    fn retain(&mut self, keep: impl Fn(&str) -> bool) {
        self.items.retain(|t| keep(t));
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "#Rust",
        "＃LLM＃",
        "Next.js",
        "機械学習",
        "ChatGPTの使い方",
        "C++",
        "  spaced out tag  ",
        "emoji🚀rocket",
        "İstanbul",
        "ÀÉÎ-ÕÜ",
        "コーヒー々",
        "https://example.com/path",
        "a-very-long-tag-name-that-goes-well-beyond-the-forty-character-limit",
        "12345",
        "x",
    ];

    fn allowed(c: char) -> bool {
        c.is_alphanumeric() || c == '_' || c == '-' || c == 'ー' || c == '々'
    }

    #[test]
    fn strips_hash_marks_and_lowercases_ascii() {
        assert_eq!(normalize_tag("#Rust"), Some("rust".to_string()));
        assert_eq!(normalize_tag("＃LLM＃"), Some("llm".to_string()));
        assert_eq!(normalize_tag("##TypeScript##"), Some("typescript".to_string()));
        assert_eq!(normalize_tag("Next.js"), Some("nextjs".to_string()));
    }

    #[test]
    fn leaves_non_latin_scripts_alone() {
        assert_eq!(normalize_tag("機械学習"), Some("機械学習".to_string()));
        assert_eq!(
            normalize_tag("ChatGPTの使い方"),
            Some("chatgptの使い方".to_string())
        );
    }

    #[test]
    fn rejects_short_empty_and_stop_words() {
        assert_eq!(normalize_tag(""), None);
        assert_eq!(normalize_tag("  #  "), None);
        assert_eq!(normalize_tag("x"), None);
        assert_eq!(normalize_tag("C++"), None);
        assert_eq!(normalize_tag("GitHub"), None);
        assert_eq!(normalize_tag("#https"), None);
    }

    #[test]
    fn truncates_to_forty_chars() {
        let tag = normalize_tag(&"a".repeat(55)).unwrap();
        assert_eq!(tag.chars().count(), MAX_TAG_CHARS);
    }

    #[test]
    fn normalized_output_uses_only_allowed_chars() {
        for raw in SAMPLES {
            if let Some(tag) = normalize_tag(raw) {
                let len = tag.chars().count();
                assert!((2..=MAX_TAG_CHARS).contains(&len), "{raw:?} -> {tag:?}");
                assert!(tag.chars().all(allowed), "{raw:?} -> {tag:?}");
            }
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in SAMPLES {
            if let Some(once) = normalize_tag(raw) {
                assert_eq!(normalize_tag(&once), Some(once.clone()), "input {raw:?}");
            }
        }
    }

    #[test]
    fn detects_noisy_tags() {
        assert!(is_noisy_tag("12345"));
        assert!(is_noisy_tag("https://example.com"));
        assert!(is_noisy_tag("docs/guide"));
        assert!(is_noisy_tag("まとめ"));
        assert!(is_noisy_tag("プロダクト"));
        assert!(is_noisy_tag("a"));
        assert!(!is_noisy_tag("rust"));
        assert!(!is_noisy_tag("機械学習"));
    }

    #[test]
    fn hashtags_keep_first_occurrence_order() {
        let tags = extract_hashtags("Learning #Rust and #rust with ＃機械学習 and #a #Tokio");
        assert_eq!(tags, vec!["rust", "機械学習", "tokio"]);
    }

    #[test]
    fn keyword_tags_pick_tech_terms_and_model_names() {
        let tags = extract_keyword_tags("Building RAG pipelines with LangChain and GPT-4 on Docker");
        assert_eq!(tags, vec!["rag", "langchain", "gpt-4", "docker"]);
    }

    #[test]
    fn keyword_tags_pick_katakana_runs_but_not_buzzwords() {
        let tags = extract_keyword_tags("エンジニアリングとプロダクトの話");
        assert_eq!(tags, vec!["エンジニアリング"]);
    }

    #[test]
    fn article_tags_put_hashtags_first() {
        let tags = extract_article_tags(TagSource {
            title: "Using React hooks #frontend",
            summary: Some("A tour of OAuth flows"),
            url: "https://github.com/example/react",
        });
        assert_eq!(tags, vec!["frontend", "react", "oauth"]);
    }

    #[test]
    fn article_tags_ignore_the_url() {
        let tags = extract_article_tags(TagSource {
            title: "",
            summary: None,
            url: "https://example.com/openai/langchain",
        });
        assert!(tags.is_empty());
    }

    #[test]
    fn article_tags_are_capped_and_never_noisy() {
        let title = (0..30)
            .map(|i| format!("#topic{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let tags = extract_article_tags(TagSource {
            title: &format!("{title} #2024 #まとめ"),
            summary: Some("#12345 #解説"),
            url: "https://example.com",
        });

        assert_eq!(tags.len(), MAX_ARTICLE_TAGS);
        assert_eq!(tags[0], "topic0");
        assert!(tags.iter().all(|t| !is_noisy_tag(t)));
    }

    #[test]
    fn extraction_is_deterministic() {
        let source = TagSource {
            title: "#Rust と LLM で RAG を作る",
            summary: Some("OpenAI と Claude3 の比較 エンジニアリング"),
            url: "https://example.com",
        };
        assert_eq!(extract_article_tags(source), extract_article_tags(source));
    }
}
