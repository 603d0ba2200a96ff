//! Quiz game: static question bank and per-chat open sessions
//!
//! One question may be open per chat at a time. Sessions live in a moka
//! cache with a TTL, so abandoned questions expire on their own instead of
//! blocking the chat's plain-text handling forever.

use crate::config::{QUIZ_SESSION_MAX, QUIZ_SESSION_TTL_SECS};
use moka::future::Cache;
use rand::Rng;
use std::time::Duration;

/// A quiz question with its accepted answer
pub struct QuizQuestion {
    pub text: &'static str,
    answer: &'static str,
}

/// Built-in question bank
pub const QUESTIONS: &[QuizQuestion] = &[
    QuizQuestion {
        text: "What is the capital of France?",
        answer: "paris",
    },
    QuizQuestion {
        text: "How many continents are there?",
        answer: "7",
    },
    QuizQuestion {
        text: "What planet is known as the Red Planet?",
        answer: "mars",
    },
    QuizQuestion {
        text: "What is 12 × 12?",
        answer: "144",
    },
    QuizQuestion {
        text: "Which ocean is the largest?",
        answer: "pacific",
    },
    QuizQuestion {
        text: "What gas do plants absorb from the air?",
        answer: "co2",
    },
    QuizQuestion {
        text: "In what year did humans first land on the Moon?",
        answer: "1969",
    },
    QuizQuestion {
        text: "What is the chemical symbol for gold?",
        answer: "au",
    },
    QuizQuestion {
        text: "How many sides does a hexagon have?",
        answer: "6",
    },
    QuizQuestion {
        text: "What is the longest river in the world?",
        answer: "nile",
    },
];

/// Normalize a free-text answer for comparison
#[must_use]
pub fn normalize_answer(answer: &str) -> String {
    answer
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .to_lowercase()
}

/// Open quiz questions per chat
pub struct QuizSessions {
    // chat_id -> index into QUESTIONS
    open: Cache<i64, usize>,
}

impl QuizSessions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: Cache::builder()
                .max_capacity(QUIZ_SESSION_MAX)
                .time_to_live(Duration::from_secs(QUIZ_SESSION_TTL_SECS))
                .build(),
        }
    }

    /// Open a random question for the chat, replacing any previous one
    pub async fn open_question(&self, chat_id: i64) -> &'static QuizQuestion {
        let idx = rand::thread_rng().gen_range(0..QUESTIONS.len());
        self.open.insert(chat_id, idx).await;
        &QUESTIONS[idx]
    }

    /// Judge a plain-text answer against the chat's open question.
    ///
    /// Returns `None` when no question is open; otherwise closes the
    /// session and returns whether the answer was correct.
    pub async fn check_answer(&self, chat_id: i64, answer: &str) -> Option<bool> {
        let idx = self.open.get(&chat_id).await?;
        self.open.invalidate(&chat_id).await;
        Some(normalize_answer(answer) == QUESTIONS[idx].answer)
    }

    /// The chat's open question's answer, if any
    #[cfg(test)]
    async fn open_answer(&self, chat_id: i64) -> Option<&'static str> {
        let idx = self.open.get(&chat_id).await?;
        Some(QUESTIONS[idx].answer)
    }
}

impl Default for QuizSessions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_answer() {
        assert_eq!(normalize_answer("  Paris!  "), "paris");
        assert_eq!(normalize_answer("MARS"), "mars");
        assert_eq!(normalize_answer("144"), "144");
    }

    #[test]
    fn test_answers_are_pre_normalized() {
        for q in QUESTIONS {
            assert_eq!(q.answer, normalize_answer(q.answer), "{}", q.text);
        }
    }

    #[tokio::test]
    async fn test_answer_closes_session() {
        let sessions = QuizSessions::new();

        // No open question yet
        assert_eq!(sessions.check_answer(1, "paris").await, None);

        sessions.open_question(1).await;
        let answer = sessions.open_answer(1).await.expect("question open");
        assert_eq!(sessions.check_answer(1, answer).await, Some(true));

        // Session is closed after the answer
        assert_eq!(sessions.check_answer(1, answer).await, None);
    }

    #[tokio::test]
    async fn test_wrong_answer_is_judged_wrong() {
        let sessions = QuizSessions::new();
        sessions.open_question(2).await;
        assert_eq!(
            sessions.check_answer(2, "definitely not the answer").await,
            Some(false)
        );
    }

    #[tokio::test]
    async fn test_sessions_are_per_chat() {
        let sessions = QuizSessions::new();
        sessions.open_question(1).await;
        assert_eq!(sessions.check_answer(2, "paris").await, None);
        assert!(sessions.open_answer(1).await.is_some());
    }
}
