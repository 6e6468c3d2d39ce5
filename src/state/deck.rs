//! The fixed estimation deck and room identifier helpers.

use std::fmt;

use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Length of generated room identifiers.
pub const ROOM_ID_LEN: usize = 8;

/// A card of the modified Fibonacci deck. `Unknown` is the `"?"` card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Card {
    Zero,
    One,
    Two,
    Three,
    Five,
    Eight,
    Thirteen,
    TwentyOne,
    ThirtyFour,
    FiftyFive,
    EightyNine,
    Unknown,
}

/// Every card, in deck order.
pub const DECK: [Card; 12] = [
    Card::Zero,
    Card::One,
    Card::Two,
    Card::Three,
    Card::Five,
    Card::Eight,
    Card::Thirteen,
    Card::TwentyOne,
    Card::ThirtyFour,
    Card::FiftyFive,
    Card::EightyNine,
    Card::Unknown,
];

impl Card {
    /// Numeric value of the card, `None` for `"?"`.
    pub fn points(self) -> Option<u32> {
        match self {
            Card::Zero => Some(0),
            Card::One => Some(1),
            Card::Two => Some(2),
            Card::Three => Some(3),
            Card::Five => Some(5),
            Card::Eight => Some(8),
            Card::Thirteen => Some(13),
            Card::TwentyOne => Some(21),
            Card::ThirtyFour => Some(34),
            Card::FiftyFive => Some(55),
            Card::EightyNine => Some(89),
            Card::Unknown => None,
        }
    }

    /// Look a card up by its numeric value.
    pub fn from_points(points: u64) -> Option<Self> {
        DECK.into_iter()
            .find(|card| card.points().map(u64::from) == Some(points))
    }

    /// String form stored in votes.
    pub fn as_vote_value(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.points() {
            Some(points) => write!(f, "{points}"),
            None => f.write_str("?"),
        }
    }
}

impl std::str::FromStr for Card {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed == "?" {
            return Ok(Card::Unknown);
        }
        trimmed
            .parse::<u64>()
            .ok()
            .and_then(Card::from_points)
            .ok_or_else(|| format!("`{raw}` is not a card of the deck"))
    }
}

impl Serialize for Card {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.points() {
            Some(points) => serializer.serialize_u32(points),
            None => serializer.serialize_str("?"),
        }
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CardVisitor)
    }
}

struct CardVisitor;

impl de::Visitor<'_> for CardVisitor {
    type Value = Card;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a deck card as a number or a string")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Card, E> {
        Card::from_points(value)
            .ok_or_else(|| E::custom(format!("{value} is not a card of the deck")))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Card, E> {
        u64::try_from(value)
            .map_err(|_| E::custom(format!("{value} is not a card of the deck")))
            .and_then(|points| self.visit_u64(points))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Card, E> {
        if value.fract() == 0.0 && value >= 0.0 {
            self.visit_u64(value as u64)
        } else {
            Err(E::custom(format!("{value} is not a card of the deck")))
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Card, E> {
        value.parse().map_err(E::custom)
    }
}

/// Canonical form of an externally supplied room id.
pub fn normalize_room_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Fresh room id: eight upper-case alphanumeric characters.
pub fn generate_room_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ROOM_ID_LEN)
        .map(|byte| char::from(byte).to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deck_serializes_numbers_and_question_mark() {
        let json = serde_json::to_string(&DECK).unwrap();
        assert_eq!(json, r#"[0,1,2,3,5,8,13,21,34,55,89,"?"]"#);
    }

    #[test]
    fn cards_accept_numbers_and_strings() {
        let from_number: Card = serde_json::from_str("13").unwrap();
        let from_string: Card = serde_json::from_str(r#""13""#).unwrap();
        let unknown: Card = serde_json::from_str(r#""?""#).unwrap();

        assert_eq!(from_number, Card::Thirteen);
        assert_eq!(from_string, Card::Thirteen);
        assert_eq!(unknown, Card::Unknown);
        assert_eq!(unknown.as_vote_value(), "?");
    }

    #[test]
    fn off_deck_values_are_rejected() {
        assert!(serde_json::from_str::<Card>("4").is_err());
        assert!(serde_json::from_str::<Card>("-1").is_err());
        assert!(serde_json::from_str::<Card>(r#""100""#).is_err());
        assert!(serde_json::from_str::<Card>("true").is_err());
    }

    #[test]
    fn room_ids_are_normalized_and_generated_upper_case() {
        assert_eq!(normalize_room_id("  abcd1234 "), "ABCD1234");

        let id = generate_room_id();
        assert_eq!(id.len(), ROOM_ID_LEN);
        assert!(
            id.chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }
}
