//! L2 order-book frame decoding
//!
//! Frame shape: `{"symbol": "...", "asks": [[price, size], ...], "bids": [...]}`.
//! Levels may be JSON numbers or numeric strings (`"95445.5"`); extra fields
//! are ignored. Level order is taken as sent. Prices must be positive and
//! sizes non-negative.

use serde_json::Value;

use crate::models::{PriceLevel, Snapshot};

/// A frame that could not be turned into a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedMessage {
    InvalidJson,
    NotObject,
    MissingField(&'static str),
    /// Field present with the wrong JSON type
    InvalidField(&'static str),
    /// Level is not a `[price, size]` pair with price > 0 and size >= 0
    InvalidLevel { side: &'static str, index: usize },
}

impl std::fmt::Display for MalformedMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "frame is not valid JSON"),
            Self::NotObject => write!(f, "frame is not a JSON object"),
            Self::MissingField(name) => write!(f, "missing field '{}'", name),
            Self::InvalidField(name) => write!(f, "field '{}' has the wrong type", name),
            Self::InvalidLevel { side, index } => {
                write!(f, "{} level {} is not a valid [price, size] pair", side, index)
            }
        }
    }
}

impl std::error::Error for MalformedMessage {}

/// Decode one frame into a snapshot stamped with the local clock
pub fn parse_snapshot(raw: &[u8]) -> Result<Snapshot, MalformedMessage> {
    let value: Value = serde_json::from_slice(raw).map_err(|_| MalformedMessage::InvalidJson)?;
    let obj = value.as_object().ok_or(MalformedMessage::NotObject)?;

    let symbol = obj
        .get("symbol")
        .ok_or(MalformedMessage::MissingField("symbol"))?
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or(MalformedMessage::InvalidField("symbol"))?;

    let asks = parse_side(obj.get("asks"), "asks")?;
    let bids = parse_side(obj.get("bids"), "bids")?;

    Ok(Snapshot::new(symbol, bids, asks))
}

fn parse_side(value: Option<&Value>, side: &'static str) -> Result<Vec<PriceLevel>, MalformedMessage> {
    let levels = value
        .ok_or(MalformedMessage::MissingField(side))?
        .as_array()
        .ok_or(MalformedMessage::InvalidField(side))?;

    levels
        .iter()
        .enumerate()
        .map(|(index, level)| {
            parse_level(level).ok_or(MalformedMessage::InvalidLevel { side, index })
        })
        .collect()
}

#[inline]
fn parse_level(level: &Value) -> Option<PriceLevel> {
    let pair = level.as_array()?;
    if pair.len() < 2 {
        return None;
    }
    let price = parse_number(&pair[0])?;
    let size = parse_number(&pair[1])?;
    if price <= 0.0 || size < 0.0 {
        return None;
    }
    Some(PriceLevel::new(price, size))
}

#[inline]
fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => fast_float::parse(s.trim()).ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}
