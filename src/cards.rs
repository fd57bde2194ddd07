use std::fmt;

use bit_set::BitSet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DECK_SIZE: usize = 52;

/// Suits in the fixed deck order. The order only matters for the dense
/// card encoding; hand comparison looks at ranks alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    Spades,
    Hearts,
    Clubs,
    Diamonds,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Clubs, Suit::Diamonds];

    fn from_char(c: char) -> Option<Suit> {
        match c {
            'S' => Some(Suit::Spades),
            'H' => Some(Suit::Hearts),
            'C' => Some(Suit::Clubs),
            'D' => Some(Suit::Diamonds),
            _ => None,
        }
    }

    fn to_char(self) -> char {
        match self {
            Suit::Spades => 'S',
            Suit::Hearts => 'H',
            Suit::Clubs => 'C',
            Suit::Diamonds => 'D',
        }
    }
}

/// Ranks ordered low to high; deuce is the weakest, ace the strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    fn from_char(c: char) -> Option<Rank> {
        match c {
            '2' => Some(Rank::Two),
            '3' => Some(Rank::Three),
            '4' => Some(Rank::Four),
            '5' => Some(Rank::Five),
            '6' => Some(Rank::Six),
            '7' => Some(Rank::Seven),
            '8' => Some(Rank::Eight),
            '9' => Some(Rank::Nine),
            'T' => Some(Rank::Ten),
            'J' => Some(Rank::Jack),
            'Q' => Some(Rank::Queen),
            'K' => Some(Rank::King),
            'A' => Some(Rank::Ace),
            _ => None,
        }
    }

    fn to_char(self) -> char {
        match self {
            Rank::Two => '2',
            Rank::Three => '3',
            Rank::Four => '4',
            Rank::Five => '5',
            Rank::Six => '6',
            Rank::Seven => '7',
            Rank::Eight => '8',
            Rank::Nine => '9',
            Rank::Ten => 'T',
            Rank::Jack => 'J',
            Rank::Queen => 'Q',
            Rank::King => 'K',
            Rank::Ace => 'A',
        }
    }
}

/// A playing card with a dense, stable integer encoding
/// (`suit * 13 + rank`, 0..52). Ordering follows the encoding, which is
/// what the canonical info-set key sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Card {
        Card { suit, rank }
    }

    pub fn id(self) -> usize {
        self.suit as usize * 13 + self.rank as usize
    }

    pub fn from_id(id: usize) -> Option<Card> {
        if id >= DECK_SIZE {
            return None;
        }
        Some(Card {
            suit: Suit::ALL[id / 13],
            rank: Rank::ALL[id % 13],
        })
    }

    /// Parses the two-character suit-then-rank token, e.g. `"SA"` or `"H7"`.
    pub fn parse(token: &str) -> Result<Card> {
        let mut chars = token.chars();
        let suit = chars.next().and_then(Suit::from_char);
        let rank = chars.next().and_then(Rank::from_char);
        match (suit, rank, chars.next()) {
            (Some(suit), Some(rank), None) => Ok(Card { suit, rank }),
            _ => Err(Error::Config(format!("unknown card {:?}", token))),
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.suit.to_char(), self.rank.to_char())
    }
}

/// The standard 52-card deck in encoding order.
pub fn full_deck() -> Vec<Card> {
    (0..DECK_SIZE).filter_map(Card::from_id).collect()
}

/// Parses a comma-separated card list (`"SA,SK,HQ"`), rejecting unknown
/// tokens and duplicates.
pub fn parse_deck(spec: &str) -> Result<Vec<Card>> {
    let mut seen = BitSet::with_capacity(DECK_SIZE);
    let mut deck = Vec::new();
    for token in spec.split(',') {
        let card = Card::parse(token.trim())?;
        if !seen.insert(card.id()) {
            return Err(Error::Config(format!("duplicate card {}", card)));
        }
        deck.push(card);
    }
    Ok(deck)
}
