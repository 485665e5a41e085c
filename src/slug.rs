use regex::Regex;

pub const FALLBACK_SLUG: &str = "section";

fn transliterate(ch: char) -> Option<&'static str> {
    let latin = match ch {
        'أ' | 'آ' | 'ا' | 'ع' | 'ى' => "a",
        'إ' => "i",
        'ب' => "b",
        'ت' | 'ط' => "t",
        'ث' | 'ذ' => "th",
        'ج' => "j",
        'ح' | 'ه' | 'ة' => "h",
        'خ' => "kh",
        'د' | 'ض' => "d",
        'ر' => "r",
        'ز' | 'ظ' => "z",
        'س' | 'ص' => "s",
        'ش' => "sh",
        'غ' => "gh",
        'ف' => "f",
        'ق' => "q",
        'ك' => "k",
        'ل' => "l",
        'م' => "m",
        'ن' => "n",
        'و' | 'ؤ' => "w",
        'ي' | 'ئ' => "y",
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => "o",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        _ => return None,
    };
    Some(latin)
}

/// Derives the URL and folder identifier of a category from its display name.
///
/// Whitespace runs become hyphens, Arabic and accented Latin letters are
/// transliterated, every other character outside `[a-z0-9_-]` is dropped, and
/// leading/trailing separators are trimmed. An empty result becomes
/// [`FALLBACK_SLUG`].
pub fn slugify(name: &str) -> String {
    lazy_static! {
        static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
        static ref REPEATED_HYPHENS: Regex = Regex::new(r"-{2,}").unwrap();
    }
    let hyphenated = WHITESPACE.replace_all(name.trim(), "-");
    let mut slug = String::with_capacity(hyphenated.len());
    for ch in hyphenated.chars() {
        let lower = ch.to_lowercase().next().unwrap_or(ch);
        if lower.is_ascii_alphanumeric() || lower == '-' || lower == '_' {
            slug.push(lower.to_ascii_lowercase());
        } else if let Some(latin) = transliterate(lower) {
            slug.push_str(latin);
        }
    }
    let trimmed = slug.trim_matches(|ch: char| ch == '-' || ch == '_');
    let collapsed = REPEATED_HYPHENS.replace_all(trimmed, "-");
    if collapsed.is_empty() {
        FALLBACK_SLUG.to_owned()
    } else {
        collapsed.into_owned()
    }
}
