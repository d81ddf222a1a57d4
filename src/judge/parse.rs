//! Grammar for judge completions. Malformed output never errors; it
//! degrades to `NoAnswer`/`NoDecision` and is not persisted.

pub const SCORE_MARKER: &str = "Relevancy:";
pub const PREFERENCE_MARKER: &str = "Preferred:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOutcome {
    Score(u8),
    NoAnswer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    PreferA,
    PreferB,
    NoDecision,
}

/// Parses the first integer following the score marker. Values above
/// `max_label` count as no answer rather than being clamped: an
/// out-of-grammar score says nothing trustworthy about relevance.
pub fn parse_score(completion: &str, max_label: u8) -> ScoreOutcome {
    let Some(idx) = completion.find(SCORE_MARKER) else {
        return ScoreOutcome::NoAnswer;
    };

    let rest = completion[idx + SCORE_MARKER.len()..].trim_start();
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return ScoreOutcome::NoAnswer;
    }

    match digits.parse::<u8>() {
        Ok(value) if value <= max_label => ScoreOutcome::Score(value),
        _ => ScoreOutcome::NoAnswer,
    }
}

/// Parses a standalone `A` or `B` token following the preference marker.
pub fn parse_preference(completion: &str) -> PairOutcome {
    let Some(idx) = completion.find(PREFERENCE_MARKER) else {
        return PairOutcome::NoDecision;
    };

    let rest = completion[idx + PREFERENCE_MARKER.len()..].trim_start();
    let mut chars = rest.chars();
    let Some(token) = chars.next() else {
        return PairOutcome::NoDecision;
    };

    // Require a word boundary so e.g. "Preferred: Absolutely" is not "A".
    let bounded = chars.next().is_none_or(|c| !c.is_ascii_alphanumeric());
    if !bounded {
        return PairOutcome::NoDecision;
    }

    match token {
        'A' | 'a' => PairOutcome::PreferA,
        'B' | 'b' => PairOutcome::PreferB,
        _ => PairOutcome::NoDecision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_score_reads_first_integer_after_marker() {
        let completion = "The result is authoritative and on topic.\nRelevancy: 3";
        assert_eq!(parse_score(completion, 4), ScoreOutcome::Score(3));
    }

    #[test]
    fn parse_score_without_marker_is_no_answer() {
        assert_eq!(parse_score("I would rate this a 3.", 4), ScoreOutcome::NoAnswer);
    }

    #[test]
    fn parse_score_rejects_out_of_range_values() {
        assert_eq!(parse_score("Relevancy: 7", 4), ScoreOutcome::NoAnswer);
        assert_eq!(parse_score("Relevancy: 400", 4), ScoreOutcome::NoAnswer);
    }

    #[test]
    fn parse_score_requires_digits_after_marker() {
        assert_eq!(parse_score("Relevancy: high", 4), ScoreOutcome::NoAnswer);
        assert_eq!(parse_score("Relevancy:", 4), ScoreOutcome::NoAnswer);
    }

    #[test]
    fn parse_score_accepts_boundary_values() {
        assert_eq!(parse_score("Relevancy: 0", 4), ScoreOutcome::Score(0));
        assert_eq!(parse_score("Relevancy: 4", 4), ScoreOutcome::Score(4));
    }

    #[test]
    fn parse_preference_reads_slot_tokens() {
        assert_eq!(parse_preference("Preferred: A"), PairOutcome::PreferA);
        assert_eq!(parse_preference("...\nPreferred: B\n"), PairOutcome::PreferB);
        assert_eq!(parse_preference("Preferred: b"), PairOutcome::PreferB);
    }

    #[test]
    fn parse_preference_requires_word_boundary() {
        assert_eq!(
            parse_preference("Preferred: Absolutely result one"),
            PairOutcome::NoDecision
        );
        assert_eq!(parse_preference("Preferred: Both"), PairOutcome::NoDecision);
    }

    #[test]
    fn parse_preference_without_marker_is_no_decision() {
        assert_eq!(parse_preference("I prefer A."), PairOutcome::NoDecision);
        assert_eq!(parse_preference("Preferred:"), PairOutcome::NoDecision);
    }
}
