use strategy_core::{ScreenFilters, ScreenerError, ScreeningStrategy, TradingBias, TradingStyle};

/// Strategies shipped with the screener. `seed_presets` writes the ones a
/// library does not have yet.
pub fn predefined_strategies() -> Result<Vec<ScreeningStrategy>, ScreenerError> {
    Ok(vec![
        ScreeningStrategy::builder("momentum_long", "TOP_PERC_GAIN")
            .description(
                "Ross Cameron style momentum - Low float, high volume % gainers in $2-$20 range",
            )
            .filters(ScreenFilters {
                price_min: Some(2.0),
                price_max: Some(20.0),
                volume_min: Some(500_000),
                ..Default::default()
            })
            .bias(TradingBias::Long)
            .style(TradingStyle::Momentum)
            .tags(["momentum", "long", "gainers", "ross_cameron", "day_trading"])
            .build()?,
        ScreeningStrategy::builder("short_bias", "TOP_PERC_GAIN")
            .description("Alex Temiz style shorts - Overextended parabolic gainers due for pullback")
            .filters(ScreenFilters {
                price_min: Some(1.0),
                price_max: Some(30.0),
                volume_min: Some(2_000_000),
                market_cap_min: Some(5_000_000.0),
                market_cap_max: Some(300_000_000.0),
                ..Default::default()
            })
            .bias(TradingBias::Short)
            .style(TradingStyle::MeanReversion)
            .tags(["short", "overextended", "parabolic", "alex_temiz", "fade"])
            .build()?,
        ScreeningStrategy::builder("high_volume_breakout", "HOT_BY_VOLUME")
            .description("Breakout candidates with unusual volume")
            .filters(ScreenFilters {
                price_min: Some(10.0),
                price_max: Some(200.0),
                volume_min: Some(2_000_000),
                ..Default::default()
            })
            .bias(TradingBias::Long)
            .style(TradingStyle::Breakout)
            .tags(["breakout", "volume", "long"])
            .build()?,
        ScreeningStrategy::builder("high_volatility", "HIGH_OPT_IMP_VOLAT")
            .description("High option implied volatility - potential for big moves")
            .filters(ScreenFilters {
                price_min: Some(5.0),
                price_max: Some(500.0),
                volume_min: Some(500_000),
                ..Default::default()
            })
            .bias(TradingBias::Neutral)
            .style(TradingStyle::Volatility)
            .tags(["volatility", "options"])
            .build()?,
    ])
}
