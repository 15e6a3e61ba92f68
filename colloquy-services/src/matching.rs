use regex::Regex;

/// Case-insensitive whole-phrase matcher for any of `phrases`.
///
/// Phrase boundaries are non-word characters or the ends of the text, so
/// values ending in punctuation ("Dr.") still match.
pub(crate) fn phrase_matcher<I, S>(phrases: I) -> Result<Option<Regex>, regex::Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let alternatives: Vec<String> = phrases
        .into_iter()
        .map(|p| p.as_ref().trim().to_string())
        .filter(|p| !p.is_empty())
        .map(|p| regex::escape(&p))
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!(r"(?i)(?:^|\W)(?:{})(?:$|\W)", alternatives.join("|"))).map(Some)
}

pub(crate) fn matches(matcher: &Option<Regex>, text: &str) -> bool {
    matcher.as_ref().is_some_and(|m| m.is_match(text))
}

/// `office_hours` -> `office hours`
pub(crate) fn humanize(slot: &str) -> String {
    slot.replace('_', " ")
}
