use super::CollaboratorError;
use async_trait::async_trait;

#[async_trait]
pub trait CourseSuggester: Send + Sync {
    /// Ranks catalog entries `(course_id, title)` against a CV document
    /// reference. Output is advisory and used only to pre-populate UI
    /// choices; it is never authoritative.
    async fn suggest_courses(
        &self,
        cv_reference: &str,
        catalog: &[(i64, String)],
    ) -> Result<Vec<i64>, CollaboratorError>;
}

/// Stand-in matcher: suggests courses whose title shares a significant word
/// with the CV reference text.
pub struct KeywordCourseSuggester;

const MIN_KEYWORD_LEN: usize = 4;

#[async_trait]
impl CourseSuggester for KeywordCourseSuggester {
    async fn suggest_courses(
        &self,
        cv_reference: &str,
        catalog: &[(i64, String)],
    ) -> Result<Vec<i64>, CollaboratorError> {
        let keywords: Vec<String> = cv_reference
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| word.len() >= MIN_KEYWORD_LEN)
            .map(|word| word.to_lowercase())
            .collect();

        let suggested = catalog
            .iter()
            .filter(|(_, title)| {
                title
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|word| word.len() >= MIN_KEYWORD_LEN)
                    .any(|word| keywords.contains(&word.to_lowercase()))
            })
            .map(|(id, _)| *id)
            .collect();

        Ok(suggested)
    }
}
