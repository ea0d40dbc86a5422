use super::CollaboratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Everything the generator is seeded with about the course being quizzed.
#[derive(Debug, Clone)]
pub struct CourseContext {
    pub course_id: i64,
    pub title: String,
    pub level: String,
    pub category_name: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GeneratedQuestion {
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(
        &self,
        context: &CourseContext,
    ) -> Result<Vec<GeneratedQuestion>, CollaboratorError>;
}

/// Deterministic stand-in for the question-generation backend: derives a
/// fixed-size multiple-choice quiz from the course context. Kept
/// deterministic so repeated generation for the same course is stable.
pub struct ScriptedQuestionGenerator {
    question_count: usize,
}

impl ScriptedQuestionGenerator {
    pub fn new(question_count: usize) -> Self {
        ScriptedQuestionGenerator { question_count }
    }
}

impl Default for ScriptedQuestionGenerator {
    fn default() -> Self {
        ScriptedQuestionGenerator::new(5)
    }
}

const QUESTION_STEMS: [&str; 5] = [
    "Which statement best describes the goal of '{title}'?",
    "A {level} student of '{title}' should first focus on which of the following?",
    "Which of these topics belongs to the '{category}' track covered by '{title}'?",
    "What is the expected outcome after completing '{title}'?",
    "Which practice is emphasized throughout '{title}'?",
];

#[async_trait]
impl QuestionGenerator for ScriptedQuestionGenerator {
    async fn generate(
        &self,
        context: &CourseContext,
    ) -> Result<Vec<GeneratedQuestion>, CollaboratorError> {
        if context.title.trim().is_empty() {
            return Err(CollaboratorError(format!(
                "course {} has no title to seed question generation",
                context.course_id
            )));
        }
        if self.question_count == 0 {
            return Err(CollaboratorError(
                "generator configured for an empty question set".to_string(),
            ));
        }

        let questions = (0..self.question_count)
            .map(|index| {
                let stem = QUESTION_STEMS[index % QUESTION_STEMS.len()];
                let text = stem
                    .replace("{title}", &context.title)
                    .replace("{level}", &context.level)
                    .replace("{category}", &context.category_name);
                let correct_index = index % 4;
                let options = (0..4)
                    .map(|option| {
                        if option == correct_index {
                            format!("Core concept {} of {}", index + 1, context.title)
                        } else {
                            format!("Unrelated topic {}.{}", index + 1, option + 1)
                        }
                    })
                    .collect();
                GeneratedQuestion {
                    text,
                    options,
                    correct_index,
                }
            })
            .collect();

        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> CourseContext {
        CourseContext {
            course_id: 7,
            title: "Linear Algebra".to_string(),
            level: "beginner".to_string(),
            category_name: "Mathematics".to_string(),
            description: "Vectors and matrices".to_string(),
        }
    }

    #[tokio::test]
    async fn generates_the_configured_number_of_questions() {
        let generator = ScriptedQuestionGenerator::default();
        let questions = generator.generate(&context()).await.unwrap();
        assert_eq!(questions.len(), 5);
        for question in &questions {
            assert_eq!(question.options.len(), 4);
            assert!(question.correct_index < question.options.len());
            assert!(question.text.contains("Linear Algebra"));
        }
    }

    #[tokio::test]
    async fn generation_is_deterministic() {
        let generator = ScriptedQuestionGenerator::default();
        let first = generator.generate(&context()).await.unwrap();
        let second = generator.generate(&context()).await.unwrap();
        let as_json = |qs: &[GeneratedQuestion]| serde_json::to_value(qs).unwrap();
        assert_eq!(as_json(&first), as_json(&second));
    }

    #[tokio::test]
    async fn untitled_course_fails_generation() {
        let generator = ScriptedQuestionGenerator::default();
        let mut ctx = context();
        ctx.title = "  ".to_string();
        assert!(generator.generate(&ctx).await.is_err());
    }
}
