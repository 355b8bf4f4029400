//! Complexity classifier — pure function from message text to [`Tier`].
//!
//! Deterministic and total: every string, including the empty one, maps to
//! exactly one tier. Check order is part of the contract — the short-length
//! check wins over everything, so a one-word grammar keyword still counts as
//! small talk.

use std::sync::LazyLock;

use regex::Regex;

use super::Tier;

/// Trimmed messages shorter than this are always simple.
const SHORT_MESSAGE_MAX: usize = 10;

/// Messages at least this long are complex regardless of content.
const LONG_MESSAGE_MIN: usize = 150;

/// More question marks than this push a message to complex.
const MAX_QUESTION_MARKS: usize = 2;

/// Greetings, farewells and acknowledgements in the locales the bot speaks,
/// anchored at the start of the message.
static GREETING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^(hallo|hey|hi|hello|servus|moin)\b",
        r"(?i)^guten (morgen|tag|abend)\b",
        r"(?i)^(tschüss|auf wiedersehen|bis (bald|später|morgen))\b",
        r"(?i)^(danke|vielen dank|alles klar|ok(ay)?|gut|super|prima)\b",
        r"(?i)^(thanks|thank you|bye|good (morning|evening|night)|see you)\b",
        r"(?i)^(salut|bonjour|bonsoir|merci|au revoir|d'accord|ça va)\b",
        r"^(مرحبا|أهلا|السلام عليكم|شكرا|مع السلامة|صباح الخير|مساء الخير)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("Bad greeting pattern `{p}`: {e}")))
    .collect()
});

/// Keywords that mark a message as asking for explanation or grammar help.
/// Matched case-insensitively anywhere in the text.
static COMPLEX_KEYWORDS: &[&str] = &[
    // German
    "erklär",
    "warum",
    "wieso",
    "grammatik",
    "unterschied",
    "bedeutet",
    "regel",
    // English
    "explain",
    "why",
    "grammar",
    "difference",
    "meaning",
    // French
    "explique",
    "pourquoi",
    "grammaire",
    "différence",
    // Arabic
    "اشرح",
    "لماذا",
    "قواعد",
    "الفرق",
];

/// Classify one message into a difficulty tier.
pub fn classify(text: &str) -> Tier {
    let trimmed = text.trim();

    if trimmed.chars().count() < SHORT_MESSAGE_MAX {
        return Tier::Simple;
    }

    if GREETING_PATTERNS.iter().any(|re| re.is_match(trimmed)) {
        return Tier::Simple;
    }

    let lower = trimmed.to_lowercase();
    let question_marks = trimmed.chars().filter(|c| *c == '?' || *c == '؟').count();

    if COMPLEX_KEYWORDS.iter().any(|kw| lower.contains(kw))
        || trimmed.chars().count() >= LONG_MESSAGE_MIN
        || question_marks > MAX_QUESTION_MARKS
    {
        return Tier::Complex;
    }

    Tier::Medium
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_are_simple() {
        for text in ["", "Hallo", "Warum?", "ok", "    hi    ", "؟؟؟"] {
            assert_eq!(classify(text), Tier::Simple, "{text:?}");
        }
    }

    #[test]
    fn short_grammar_keyword_stays_simple() {
        // Under the length threshold, keyword checks never run.
        assert_eq!(classify("Warum???"), Tier::Simple);
        assert_eq!(classify("grammatik"), Tier::Simple);
    }

    #[test]
    fn greetings_are_simple_beyond_length_threshold() {
        for text in [
            "Guten Morgen, wie geht es Ihnen heute",
            "Hallo zusammen, ich bin wieder da",
            "Thank you very much for the lesson",
            "Bonjour, comment allez-vous aujourd'hui",
            "السلام عليكم ورحمة الله وبركاته",
        ] {
            assert_eq!(classify(text), Tier::Simple, "{text:?}");
        }
    }

    #[test]
    fn grammar_keywords_are_complex() {
        for text in [
            "Kannst du mir den Unterschied zwischen dem Dativ und dem Akkusativ zeigen",
            "Please explain the passive voice in German",
            "Peux-tu m'explique la grammaire du subjonctif",
            "ممكن اشرح لي الفرق بين الحالتين",
        ] {
            assert_eq!(classify(text), Tier::Complex, "{text:?}");
        }
    }

    #[test]
    fn long_messages_are_complex() {
        let long = "Ich habe gestern einen Brief an meine Vermieterin geschrieben und \
                    bin mir nicht sicher ob die Satzstellung in den Nebensätzen richtig \
                    war, kannst du den Text einmal ansehen bitte";
        assert!(long.chars().count() >= 150);
        assert_eq!(classify(long), Tier::Complex);
    }

    #[test]
    fn many_question_marks_are_complex() {
        assert_eq!(classify("Ist das richtig? Oder das? Oder was?"), Tier::Complex);
        // Two question marks are still fine.
        assert_eq!(classify("Ist das richtig? Oder das andere vielleicht?"), Tier::Medium);
    }

    #[test]
    fn ordinary_sentences_are_medium() {
        for text in [
            "Ich gehe heute mit meiner Freundin einkaufen",
            "Gestern habe ich meine Hausaufgaben gemacht",
            "My teacher gave me homework about the dative case",
        ] {
            assert_eq!(classify(text), Tier::Medium, "{text:?}");
        }
    }

    #[test]
    fn deterministic_across_calls() {
        let inputs = [
            "Hallo",
            "Warum ist der Himmel blau, kannst du das bitte genau erklären",
            "Ich gehe heute einkaufen im Supermarkt",
        ];
        for text in inputs {
            let first = classify(text);
            for _ in 0..10 {
                assert_eq!(classify(text), first);
            }
        }
    }
}
