use serde::{Deserialize, Serialize};

/// Coarse routing decision for a user turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Booking,
    General,
}

pub const BOOKING_KEYWORDS: [&str; 8] = [
    "book",
    "booking",
    "flight",
    "arrival",
    "departure",
    "ticket",
    "reserve",
    "reservation",
];

/// Keyword gate in front of the booking flow. Real understanding happens in
/// the NLU collaborator; this only decides whether to start collecting.
///
/// Keywords match at the start of a word, so "tickets" and "reservation"
/// count while "notebook" does not.
pub fn classify(text: &str) -> Intent {
    let lowered = text.to_lowercase();
    let mut words = lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty());
    if words.any(|word| BOOKING_KEYWORDS.iter().any(|kw| word.starts_with(kw))) {
        Intent::Booking
    } else {
        Intent::General
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_keywords_match_case_insensitively() {
        assert_eq!(classify("I want to BOOK something"), Intent::Booking);
        assert_eq!(classify("Need arrival service at SIA"), Intent::Booking);
        assert_eq!(classify("two tickets please"), Intent::Booking);
        assert_eq!(classify("Can I reserve a lounge?"), Intent::Booking);
    }

    #[test]
    fn test_everything_else_is_general() {
        assert_eq!(classify("what are your opening hours?"), Intent::General);
        assert_eq!(classify(""), Intent::General);
    }

    #[test]
    fn test_keywords_inside_other_words_do_not_match() {
        assert_eq!(classify("I left my notebook on facebook"), Intent::General);
        assert_eq!(classify("Flights to JFK?"), Intent::Booking);
        assert_eq!(classify("I'd like a reservation"), Intent::Booking);
    }
}
