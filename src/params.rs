//! Startup parameters: tracked symbol and recommendation thresholds

use std::str::FromStr;

use rust_decimal::Decimal;

/// Symbols the monitor accepts
pub const ACCEPTED_SYMBOLS: [&str; 4] = ["PETR4", "VALE3", "ITUB4", "MGLU3"];

/// Read-only parameters shared by every monitor that needs them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    pub symbol: String,
    pub buy_threshold: Decimal,
    pub sell_threshold: Decimal,
}

impl Parameters {
    /// Validate raw process arguments.
    ///
    /// Thresholds only accept `.` as the decimal separator (`74.8`), whatever
    /// the host locale.
    pub fn parse(symbol: &str, sell_threshold: &str, buy_threshold: &str) -> Result<Self, ParamsError> {
        if !ACCEPTED_SYMBOLS.contains(&symbol) {
            return Err(ParamsError::UnknownSymbol(symbol.to_string()));
        }

        let sell_threshold = parse_threshold(sell_threshold)?;
        let buy_threshold = parse_threshold(buy_threshold)?;

        Ok(Self {
            symbol: symbol.to_string(),
            buy_threshold,
            sell_threshold,
        })
    }
}

fn parse_threshold(raw: &str) -> Result<Decimal, ParamsError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains(',') {
        return Err(ParamsError::InvalidThreshold(raw.to_string()));
    }

    Decimal::from_str(trimmed).map_err(|_| ParamsError::InvalidThreshold(raw.to_string()))
}

/// Parameter validation errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("Invalid stock symbol {:?}. Accepted symbols: {}", .0, ACCEPTED_SYMBOLS.join(", "))]
    UnknownSymbol(String),

    #[error("Invalid threshold {0:?}. Must be a decimal number using '.' as separator (e.g. 74.8)")]
    InvalidThreshold(String),
}
