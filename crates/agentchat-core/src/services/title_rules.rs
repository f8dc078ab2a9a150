//! Local title heuristics: intent categories, keyword extraction, snippets
//! and timestamp titles. All of them are pure and cheap.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone};
use lazy_static::lazy_static;
use regex::Regex;

pub const TIMESTAMP_PLACEHOLDER: &str = "{{timestamp}}";
const TIMESTAMP_FORMAT: &str = "%H:%M %d/%m";
const REMOTE_TITLE_MAX_CHARS: usize = 100;
const CATEGORY_KEYWORDS: usize = 2;

lazy_static! {
    static ref CATEGORIES: Vec<(Regex, &'static str)> = [
        // Development
        (r"(tạo|viết|làm|build|create).*(website|web|site)", "Tạo website"),
        (r"(code|coding|lập trình|viết code).*(react|vue|angular|javascript|typescript)", "Lập trình Frontend"),
        (r"(code|coding|lập trình|viết code).*(python|java|c\+\+|c#|php|ruby)", "Lập trình Backend"),
        (r"(api|backend|server|database)", "Backend Development"),
        (r"(component|ui|giao diện|interface)", "UI Component"),
        // Data
        (r"(phân tích|analyze).*(dữ liệu|data)", "Phân tích dữ liệu"),
        (r"(chart|biểu đồ|visualization|dashboard)", "Trực quan hóa dữ liệu"),
        (r"(excel|csv|spreadsheet|bảng tính)", "Xử lý dữ liệu"),
        // Design
        (r"(thiết kế|design).*(ui|ux|giao diện)", "Thiết kế UI/UX"),
        (r"(logo|brand|thương hiệu)", "Thiết kế thương hiệu"),
        (r"(layout|bố cục|responsive)", "Thiết kế layout"),
        // Marketing
        (r"(seo|marketing|quảng cáo|advertisement)", "Marketing & SEO"),
        (r"(email|newsletter|chiến dịch)", "Email Marketing"),
        (r"(content|nội dung|blog|article)", "Content Marketing"),
        // Learning
        (r"(học|learning|tutorial|hướng dẫn|guide)", "Học tập & Hướng dẫn"),
        (r"(giải thích|explain|how to|làm sao)", "Giải thích & Hướng dẫn"),
        // Problem solving
        (r"(debug|fix|sửa lỗi|error|bug)", "Debug & Sửa lỗi"),
        (r"(tối ưu|optimize|performance|cải thiện)", "Tối ưu hóa"),
        (r"(help|giúp|support|hỗ trợ)", "Hỗ trợ & Giải đáp"),
        // AI and tooling
        (r"(chatbot|ai|artificial intelligence|machine learning)", "AI & Chatbot"),
        (r"(automation|tự động|script|tool)", "Tự động hóa"),
    ]
    .into_iter()
    .map(|(pattern, label)| (Regex::new(pattern).unwrap(), label))
    .collect();

    static ref TECH_WORD: Regex = Regex::new(
        r"^(react|vue|angular|javascript|typescript|python|java|sql|api|website|app|code|data|design|ui|ux|seo|marketing)"
    )
    .unwrap();

    static ref LEADING_BULLET: Regex = Regex::new(r"^[-*•]\s*").unwrap();
}

const STOPWORDS: &[&str] = &[
    "tôi", "bạn", "của", "và", "với", "trong", "là", "có", "được", "để", "cho", "từ", "này", "đó",
    "một", "các", "những", "như", "về", "trên", "hãy", "làm", "thế", "nào", "gì", "ai", "đâu",
    "khi", "sao", "muốn", "help", "please", "can", "you", "me", "i", "my", "the", "a", "an", "and",
    "for", "with",
];

fn is_keyword_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c == '_'
        || c.is_whitespace()
        || ('\u{00C0}'..='\u{024F}').contains(&c)
        || ('\u{1EA0}'..='\u{1EF9}').contains(&c)
}

/// Intent category of a message, first matching pattern wins
pub fn categorize(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    CATEGORIES
        .iter()
        .find(|(regex, _)| regex.is_match(&lowered))
        .map(|(_, label)| *label)
}

/// Most relevant words of `text`, lowercase.
///
/// Words shorter than three characters, stopwords, numbers and anything in
/// `exclude` are skipped. When at least `limit` technical terms are present
/// they win; otherwise words are ranked by frequency, ties broken by first
/// occurrence.
pub fn extract_keywords(text: &str, limit: usize, exclude: &[String]) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }

    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| is_keyword_char(*c))
        .collect();

    let words: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .filter(|w| !STOPWORDS.contains(w))
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !exclude.iter().any(|e| e == w))
        .collect();

    let tech: Vec<&str> = words.iter().copied().filter(|w| TECH_WORD.is_match(w)).collect();
    if tech.len() >= limit {
        return tech.into_iter().take(limit).map(str::to_string).collect();
    }

    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in &words {
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }
    // Stable sort keeps first-occurrence order among equal counts
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.into_iter().take(limit).map(str::to_string).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `"{category}: kw kw"` with keywords not already part of the label
pub fn category_title(text: &str) -> Option<String> {
    let category = categorize(text)?;
    let label_words: Vec<String> = category
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let keywords = extract_keywords(text, CATEGORY_KEYWORDS, &label_words);
    if keywords.is_empty() {
        Some(category.to_string())
    } else {
        Some(format!("{}: {}", category, keywords.join(" ")))
    }
}

/// Top keywords, title-cased and space-joined
pub fn keyword_title(text: &str, limit: usize) -> Option<String> {
    let keywords = extract_keywords(text, limit, &[]);
    if keywords.is_empty() {
        return None;
    }
    Some(
        keywords
            .iter()
            .map(|w| capitalize(w))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// First `max_chars` characters, backing up to a word boundary when one lies
/// past 70% of the budget. Cut snippets end with an ellipsis.
pub fn snippet_title(text: &str, max_chars: usize) -> Option<String> {
    let flat = text.trim().replace(['\r', '\n'], " ");
    if flat.is_empty() || max_chars == 0 {
        return None;
    }
    if flat.chars().count() <= max_chars {
        return Some(flat);
    }

    let cut: Vec<char> = flat.chars().take(max_chars).collect();
    let mut end = cut.len();
    if let Some(last_space) = cut.iter().rposition(|c| *c == ' ')
        && last_space * 10 > max_chars * 7
    {
        end = last_space;
    }
    let snippet: String = cut[..end].iter().collect();
    Some(format!("{}…", snippet.trim_end()))
}

/// Fill the fallback template with `HH:MM dd/MM` local time
pub fn timestamp_title<Tz: TimeZone>(template: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    template.replace(TIMESTAMP_PLACEHOLDER, &now.format(TIMESTAMP_FORMAT).to_string())
}

/// Normalise a title returned by the remote namer.
///
/// Strips quotes and a leading bullet, keeps the first line and caps the
/// length. `None` when nothing usable remains.
pub fn clean_remote_title(raw: &str) -> Option<String> {
    let first_line = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .lines()
        .find(|line| !line.trim().is_empty())?
        .trim()
        .to_string();

    let cleaned = LEADING_BULLET
        .replace(&first_line, "")
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string();

    if cleaned.is_empty() {
        None
    } else if cleaned.chars().count() > REMOTE_TITLE_MAX_CHARS {
        let head: String = cleaned.chars().take(REMOTE_TITLE_MAX_CHARS - 3).collect();
        Some(format!("{}...", head))
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_category_order() {
        assert_eq!(categorize("Tôi muốn tạo website bán hàng"), Some("Tạo website"));
        assert_eq!(categorize("Viết code React cho trang chủ"), Some("Lập trình Frontend"));
        assert_eq!(categorize("fix this bug please"), Some("Debug & Sửa lỗi"));
        assert_eq!(categorize("hello world"), None);
    }

    #[test]
    fn test_category_title_skips_label_words() {
        assert_eq!(
            category_title("Tôi muốn tạo website bán hàng").as_deref(),
            Some("Tạo website: bán hàng")
        );
    }

    #[test]
    fn test_keywords_prefer_tech_terms() {
        let words = extract_keywords("python and react and sql for my shop shop shop", 3, &[]);
        assert_eq!(words, vec!["python", "react", "sql"]);
    }

    #[test]
    fn test_keywords_by_frequency_then_first_seen() {
        let words = extract_keywords("alpha beta gamma beta 2024 gamma", 2, &[]);
        assert_eq!(words, vec!["beta", "gamma"]);
    }

    #[test]
    fn test_keyword_title_is_title_cased() {
        assert_eq!(keyword_title("hello world", 3).as_deref(), Some("Hello World"));
        assert_eq!(keyword_title("hi ok 42", 3), None);
    }

    #[test]
    fn test_snippet_backs_up_to_word_boundary() {
        let text = "the quick brown fox jumps over the lazy dog";
        assert_eq!(snippet_title(text, 20).as_deref(), Some("the quick brown fox…"));
        assert_eq!(snippet_title("short", 20).as_deref(), Some("short"));
        assert_eq!(snippet_title("   ", 20), None);
    }

    #[test]
    fn test_snippet_hard_cut_when_space_too_early() {
        assert_eq!(snippet_title("ab cdefghijklmnop", 10).as_deref(), Some("ab cdefghi…"));
    }

    #[test]
    fn test_timestamp_title_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).unwrap();
        assert_eq!(timestamp_title("Chat {{timestamp}}", &now), "Chat 09:05 07/03");
    }

    #[test]
    fn test_clean_remote_title() {
        assert_eq!(clean_remote_title("\"Trip planning\"").as_deref(), Some("Trip planning"));
        assert_eq!(clean_remote_title("- Budget review\nextra").as_deref(), Some("Budget review"));
        assert_eq!(clean_remote_title("  ''  "), None);

        let long = "x".repeat(150);
        let cleaned = clean_remote_title(&long).unwrap();
        assert_eq!(cleaned.chars().count(), 100);
        assert!(cleaned.ends_with("..."));
    }
}
