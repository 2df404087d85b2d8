//! Deterministic price/speed extraction
//!
//! Three patterns look for a speed and a price within an 80-character
//! window. Every capture group is named, so a match is turned into tagged
//! tokens instead of being interpreted by position. Pairing is still best
//! effort: text that puts one plan's price next to another plan's speed
//! produces a wrong pair.

use crate::extract::{format_speed, ExtractedDeal, MAX_DEALS};
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Accepted monthly price range (GBP)
pub const PRICE_RANGE: (f64, f64) = (15.0, 150.0);

/// Accepted download speed range (Mbps)
pub const SPEED_RANGE: (f64, f64) = (10.0, 10_000.0);

/// Characters searched after a match for a contract length
const CONTRACT_WINDOW: usize = 80;

static SPEED_THEN_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<speed>\d{1,5}(?:\.\d+)?)\s*(?P<unit>gbps|gb/s|gb|mbps|mb/s|mb)\b[^£]{0,80}?£\s*(?P<price>\d{1,3}(?:\.\d{1,2})?)",
    )
    .unwrap()
});

static PRICE_THEN_SPEED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)£\s*(?P<price>\d{1,3}(?:\.\d{1,2})?)[^£]{0,80}?(?P<speed>\d{1,5}(?:\.\d+)?)\s*(?P<unit>gbps|gb/s|gb|mbps|mb/s|mb)\b",
    )
    .unwrap()
});

static FIBRE_THEN_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bfibre\s*(?P<speed>\d{2,5})\b[^£]{0,80}?£\s*(?P<price>\d{1,3}(?:\.\d{1,2})?)")
        .unwrap()
});

static CONTRACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?P<months>\d{1,2})[\s-]*month(?:s|\s+contract|\s+minimum|\s+term)\b")
        .unwrap()
});

/// A value recognized inside a match
#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    /// Download speed, already converted to Mbps
    Speed(f64),
    /// Monthly price in pounds
    Price(f64),
}

/// Reads the named groups of one match into tokens
fn tokens(caps: &Captures<'_>) -> Vec<Token> {
    let mut found = Vec::with_capacity(2);

    if let Some(speed) = caps.name("speed").and_then(|m| m.as_str().parse::<f64>().ok()) {
        let gigabit = caps
            .name("unit")
            .map(|unit| unit.as_str().to_ascii_lowercase().starts_with('g'))
            .unwrap_or(false);
        found.push(Token::Speed(if gigabit { speed * 1000.0 } else { speed }));
    }

    if let Some(price) = caps.name("price").and_then(|m| m.as_str().parse::<f64>().ok()) {
        found.push(Token::Price(price));
    }

    found
}

/// Pairs the tokens of one match, if it holds exactly one of each kind
fn pair(tokens: &[Token]) -> Option<(f64, f64)> {
    let mut speed = None;
    let mut price = None;
    for token in tokens {
        match *token {
            Token::Speed(value) if speed.is_none() => speed = Some(value),
            Token::Price(value) if price.is_none() => price = Some(value),
            _ => return None,
        }
    }
    Some((speed?, price?))
}

/// Applies the sanity bounds and returns the speed in whole Mbps
///
/// A speed of 10 or less that survives the bounds is read as Gbps and
/// multiplied by 1000. This cannot tell a genuine 10 Mbps plan from a
/// misread gigabit figure; it is kept as an approximation.
fn checked(speed: f64, price: f64) -> Option<(u32, f64)> {
    if !(PRICE_RANGE.0..=PRICE_RANGE.1).contains(&price) {
        return None;
    }
    if !(SPEED_RANGE.0..=SPEED_RANGE.1).contains(&speed) {
        return None;
    }

    let speed = if speed <= 10.0 { speed * 1000.0 } else { speed };
    Some((speed.round() as u32, price))
}

/// Finds a contract length shortly after a match
fn contract_after(text: &str, end: usize) -> Option<String> {
    let window: String = text[end..].chars().take(CONTRACT_WINDOW).collect();
    let caps = CONTRACT.captures(&window)?;
    let months: u32 = caps.name("months")?.as_str().parse().ok()?;
    (1..=48)
        .contains(&months)
        .then(|| format!("{} months", months))
}

/// Label for a deal of the given speed
pub fn deal_label(speed_mbps: u32) -> String {
    if speed_mbps >= 500 {
        format!("Full Fibre {}", speed_mbps)
    } else {
        format!("Fibre {}", speed_mbps)
    }
}

/// Extracts up to five deals from rendered text using regular expressions
///
/// # Algorithm
///
/// 1. Run the speed→price, price→speed and `Fibre N … £price` patterns
/// 2. Convert explicit Gb units to Mbps, apply the sanity bounds
///    (£15–£150, 10–10000 Mbps) and the ≤10 ⇒ ×1000 reading
/// 3. Keep the first deal for every `(speed, price)` pair
/// 4. Sort by speed, fastest first, and keep five
///
/// # Example
///
/// ```
/// use fibre_scout::extract::extract_with_patterns;
///
/// let deals = extract_with_patterns("Superfast 150Mbps for just £27.50 a month");
/// assert_eq!(deals.len(), 1);
/// assert_eq!(deals[0].speed, "150 Mbps");
/// assert_eq!(deals[0].price, "27.50");
/// ```
pub fn extract_with_patterns(text: &str) -> Vec<ExtractedDeal> {
    let mut seen: HashSet<(u32, String)> = HashSet::new();
    let mut deals: Vec<(u32, ExtractedDeal)> = Vec::new();

    for pattern in [&*SPEED_THEN_PRICE, &*PRICE_THEN_SPEED, &*FIBRE_THEN_PRICE] {
        for caps in pattern.captures_iter(text) {
            let Some((speed, price)) = pair(&tokens(&caps)).and_then(|(s, p)| checked(s, p))
            else {
                continue;
            };

            let price = format!("{:.2}", price);
            if !seen.insert((speed, price.clone())) {
                continue;
            }

            let end = caps.get(0).map(|m| m.end()).unwrap_or(text.len());
            deals.push((
                speed,
                ExtractedDeal {
                    name: deal_label(speed),
                    speed: format_speed(speed),
                    price,
                    contract: contract_after(text, end),
                },
            ));
        }
    }

    // Stable sort keeps first-seen order among equal speeds
    deals.sort_by(|a, b| b.0.cmp(&a.0));
    deals.into_iter().take(MAX_DEALS).map(|(_, deal)| deal).collect()
}
