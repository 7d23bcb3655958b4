//! Properties that must hold for any well-formed price history.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use market_regime::regime::efficiency::EfficiencyScorer;
use market_regime::{
    Bar, IndicatorFrame, LatentStateCapability, RegimeAggregator, RegimeClassifier, RegimeConfig,
    RegimeSnapshot, Series, StrategyFitEvaluator, TrendRegime, VolatilityRegime, VolumeRegime,
};

fn frame(closes: &[f64], volumes: &[f64]) -> IndicatorFrame {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let bars = closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| Bar {
            timestamp: start + Duration::minutes(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume,
        })
        .collect();
    IndicatorFrame::new(Series::new(bars).unwrap())
}

fn history() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (3usize..160).prop_flat_map(|n| {
        (
            prop::collection::vec(1.0f64..1_000.0, n),
            prop::collection::vec(0.0f64..1_000_000.0, n),
        )
    })
}

fn snapshot_strategy() -> impl Strategy<Value = RegimeSnapshot> {
    (0u8..3, 0u8..2, 0u8..3, 0.0f64..=1.0, 0usize..3).prop_map(
        |(volatility, trend, volume, efficiency, cluster)| RegimeSnapshot {
            volatility: VolatilityRegime::from_code(volatility).unwrap(),
            trend: TrendRegime::from_code(trend).unwrap(),
            volume: VolumeRegime::from_code(volume).unwrap(),
            efficiency,
            cluster,
            hmm_state: None,
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Efficiency is always a number in [0, 1], one per bar.
    #[test]
    fn efficiency_stays_in_unit_interval((closes, volumes) in history()) {
        let frame = frame(&closes, &volumes);
        let scores = EfficiencyScorer::default().classify(&frame).unwrap();

        prop_assert_eq!(scores.len(), closes.len());
        for score in scores.iter() {
            prop_assert!((0.0..=1.0).contains(score), "score {} out of range", score);
        }
    }

    /// Every snapshot field is a valid label and serializes with its codes.
    #[test]
    fn snapshot_labels_are_valid((closes, volumes) in history()) {
        let mut config = RegimeConfig::default();
        config.aggregator.parallel = false;
        let aggregator = RegimeAggregator::new(config)
            .with_capability(LatentStateCapability::Unavailable);

        let frame = frame(&closes, &volumes);
        let snapshot = aggregator.snapshot(&frame).unwrap();

        prop_assert!(snapshot.efficiency.is_finite());
        prop_assert!((0.0..=1.0).contains(&snapshot.efficiency));
        prop_assert!(snapshot.cluster < aggregator.config().cluster.n_clusters);
        prop_assert!(snapshot.hmm_state.is_none());

        let json = serde_json::to_value(&snapshot).unwrap();
        prop_assert_eq!(json["volatility"].as_u64(), Some(snapshot.volatility.code() as u64));
        prop_assert_eq!(json["trend_label"].as_str(), Some(snapshot.trend_label()));
        prop_assert_eq!(json["volume_label"].as_str(), Some(snapshot.volume_label()));
    }

    /// Styles outside the known set are never vetoed.
    #[test]
    fn unknown_style_always_favorable(
        snapshot in snapshot_strategy(),
        style in "[a-z]{1,12}",
    ) {
        prop_assume!(style != "trend_following" && style != "mean_reversion");
        prop_assert!(StrategyFitEvaluator::default().evaluate(&snapshot, &style));
    }

    /// The two known styles never both pass on the same snapshot.
    #[test]
    fn trend_and_reversion_exclusive(snapshot in snapshot_strategy()) {
        let evaluator = StrategyFitEvaluator::default();
        prop_assert!(
            !(evaluator.evaluate(&snapshot, "trend_following")
                && evaluator.evaluate(&snapshot, "mean_reversion"))
        );
    }
}
