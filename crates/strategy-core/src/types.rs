use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ScreenerError;

/// Predefined gateway scanner queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanCode {
    TopPercGain,
    TopPercLose,
    MostActive,
    HotByVolume,
    HotByPrice,
    TopTradeCount,
    TopVolumeRate,
    TopOpenPercGain,
    TopOpenPercLose,
    HighOptImpVolat,
    LowOptImpVolat,
    TopOptImpVolatGain,
    #[serde(rename = "HIGH_VS_52W_HL")]
    HighVs52wHl,
    #[serde(rename = "LOW_VS_52W_HL")]
    LowVs52wHl,
    Halted,
}

impl ScanCode {
    pub const ALL: [ScanCode; 15] = [
        ScanCode::TopPercGain,
        ScanCode::TopPercLose,
        ScanCode::MostActive,
        ScanCode::HotByVolume,
        ScanCode::HotByPrice,
        ScanCode::TopTradeCount,
        ScanCode::TopVolumeRate,
        ScanCode::TopOpenPercGain,
        ScanCode::TopOpenPercLose,
        ScanCode::HighOptImpVolat,
        ScanCode::LowOptImpVolat,
        ScanCode::TopOptImpVolatGain,
        ScanCode::HighVs52wHl,
        ScanCode::LowVs52wHl,
        ScanCode::Halted,
    ];

    /// Wire name expected by the gateway scanner.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanCode::TopPercGain => "TOP_PERC_GAIN",
            ScanCode::TopPercLose => "TOP_PERC_LOSE",
            ScanCode::MostActive => "MOST_ACTIVE",
            ScanCode::HotByVolume => "HOT_BY_VOLUME",
            ScanCode::HotByPrice => "HOT_BY_PRICE",
            ScanCode::TopTradeCount => "TOP_TRADE_COUNT",
            ScanCode::TopVolumeRate => "TOP_VOLUME_RATE",
            ScanCode::TopOpenPercGain => "TOP_OPEN_PERC_GAIN",
            ScanCode::TopOpenPercLose => "TOP_OPEN_PERC_LOSE",
            ScanCode::HighOptImpVolat => "HIGH_OPT_IMP_VOLAT",
            ScanCode::LowOptImpVolat => "LOW_OPT_IMP_VOLAT",
            ScanCode::TopOptImpVolatGain => "TOP_OPT_IMP_VOLAT_GAIN",
            ScanCode::HighVs52wHl => "HIGH_VS_52W_HL",
            ScanCode::LowVs52wHl => "LOW_VS_52W_HL",
            ScanCode::Halted => "HALTED",
        }
    }
}

impl fmt::Display for ScanCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanCode {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        ScanCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == wanted)
            .ok_or_else(|| ScreenerError::Validation(format!("unknown scan code '{}'", s)))
    }
}

/// Directional bias of a strategy's picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingBias {
    Long,
    Short,
    #[default]
    Neutral,
}

impl TradingBias {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingBias::Long => "long",
            TradingBias::Short => "short",
            TradingBias::Neutral => "neutral",
        }
    }
}

impl fmt::Display for TradingBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingBias {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" => Ok(TradingBias::Long),
            "short" => Ok(TradingBias::Short),
            "neutral" => Ok(TradingBias::Neutral),
            other => Err(ScreenerError::Validation(format!(
                "unknown bias '{}' (expected long, short or neutral)",
                other
            ))),
        }
    }
}

/// Trading style category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingStyle {
    Momentum,
    MeanReversion,
    Breakout,
    Value,
    Volatility,
    #[default]
    Custom,
}

impl TradingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingStyle::Momentum => "momentum",
            TradingStyle::MeanReversion => "mean_reversion",
            TradingStyle::Breakout => "breakout",
            TradingStyle::Value => "value",
            TradingStyle::Volatility => "volatility",
            TradingStyle::Custom => "custom",
        }
    }
}

impl fmt::Display for TradingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingStyle {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "momentum" => Ok(TradingStyle::Momentum),
            "mean_reversion" => Ok(TradingStyle::MeanReversion),
            "breakout" => Ok(TradingStyle::Breakout),
            "value" => Ok(TradingStyle::Value),
            "volatility" => Ok(TradingStyle::Volatility),
            "custom" => Ok(TradingStyle::Custom),
            other => Err(ScreenerError::Validation(format!("unknown style '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_code_wire_names_match_serde() {
        for code in ScanCode::ALL {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
            assert_eq!(code.as_str().parse::<ScanCode>().unwrap(), code);
        }
    }

    #[test]
    fn unknown_scan_code_is_a_validation_error() {
        let err = "TOP_PERC_SIDEWAYS".parse::<ScanCode>().unwrap_err();
        assert!(matches!(err, ScreenerError::Validation(_)));
    }

    #[test]
    fn bias_and_style_parse_case_insensitively() {
        assert_eq!("LONG".parse::<TradingBias>().unwrap(), TradingBias::Long);
        assert_eq!(
            "mean-reversion".parse::<TradingStyle>().unwrap(),
            TradingStyle::MeanReversion
        );
        assert!("sideways".parse::<TradingBias>().is_err());
        assert!("scalping".parse::<TradingStyle>().is_err());
    }

    #[test]
    fn style_serializes_snake_case() {
        let json = serde_json::to_string(&TradingStyle::MeanReversion).unwrap();
        assert_eq!(json, "\"mean_reversion\"");
    }
}
