use serde::{Deserialize, Serialize};

use crate::types::TradeCategory;

/// Trades risking more than this share of the account are rejected.
const MAX_ACCOUNT_RISK_PERCENT: f64 = 5.0;

/// Result of a position size calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizeResult {
    pub position_size: f64,
    pub distance_to_stop: f64,
    /// Risk capital after the category multiplier.
    pub risk_amount: f64,
    pub account_risk_percentage: f64,
    pub is_valid: bool,
    pub trade_category: Option<TradeCategory>,
    pub risk_multiplier: f64,
    pub original_risk_amount: Option<f64>,
    pub category_explanation: Option<String>,
}

/// Risk/reward quality bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeRecommendation {
    Excellent,
    Good,
    Marginal,
    Poor,
}

/// Result of a risk/reward calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRewardResult {
    pub risk_reward_ratio: f64,
    pub target_ratios: Vec<f64>,
    pub potential_profit: f64,
    pub potential_loss: f64,
    pub recommendation: TradeRecommendation,
    pub is_valid: bool,
}

/// Position size from risk parameters: adjusted risk / distance to stop.
///
/// When a category is supplied the risk capital is scaled by its
/// multiplier (1.0 / 0.5 / 0.25) before sizing. A trade is invalid when
/// inputs are non-positive, the stop equals the entry, or more than 5%
/// of the account would be at risk.
pub fn calculate_position_size(
    entry_price: f64,
    stop_loss: f64,
    risk_capital: f64,
    account_balance: f64,
    trade_category: Option<TradeCategory>,
) -> PositionSizeResult {
    let risk_multiplier = trade_category.map_or(1.0, |c| c.risk_multiplier());
    let category_explanation = trade_category.map(|c| c.explanation().to_string());
    let original_risk_amount = trade_category.map(|_| risk_capital);
    let adjusted_risk = risk_capital * risk_multiplier;

    let invalid = |risk_amount: f64| PositionSizeResult {
        position_size: 0.0,
        distance_to_stop: 0.0,
        risk_amount,
        account_risk_percentage: 0.0,
        is_valid: false,
        trade_category,
        risk_multiplier,
        original_risk_amount,
        category_explanation: category_explanation.clone(),
    };

    if entry_price <= 0.0 || stop_loss <= 0.0 {
        return invalid(adjusted_risk);
    }
    if risk_capital < 0.0 {
        return invalid(0.0);
    }

    let distance_to_stop = (entry_price - stop_loss).abs();
    if distance_to_stop == 0.0 {
        return invalid(adjusted_risk);
    }

    let position_size = adjusted_risk / distance_to_stop;

    let account_risk_percentage = if account_balance > 0.0 {
        adjusted_risk / account_balance * 100.0
    } else {
        0.0
    };

    let is_valid =
        !(account_balance > 0.0 && account_risk_percentage > MAX_ACCOUNT_RISK_PERCENT);

    PositionSizeResult {
        position_size,
        distance_to_stop,
        risk_amount: adjusted_risk,
        account_risk_percentage,
        is_valid,
        trade_category,
        risk_multiplier,
        original_risk_amount,
        category_explanation,
    }
}

/// Risk/reward ratios against a target ladder. The primary ratio uses
/// the first target.
pub fn calculate_risk_reward(
    entry_price: f64,
    stop_loss: f64,
    targets: &[f64],
    position_size: f64,
) -> RiskRewardResult {
    let stop_distance = (entry_price - stop_loss).abs();

    if stop_distance == 0.0 {
        return RiskRewardResult {
            risk_reward_ratio: 0.0,
            target_ratios: Vec::new(),
            potential_profit: 0.0,
            potential_loss: 0.0,
            recommendation: TradeRecommendation::Poor,
            is_valid: false,
        };
    }

    if targets.is_empty() {
        return RiskRewardResult {
            risk_reward_ratio: 0.0,
            target_ratios: Vec::new(),
            potential_profit: 0.0,
            potential_loss: position_size * stop_distance,
            recommendation: TradeRecommendation::Poor,
            is_valid: false,
        };
    }

    let target_ratios: Vec<f64> = targets
        .iter()
        .map(|t| (t - entry_price).abs() / stop_distance)
        .collect();
    let primary_ratio = target_ratios[0];

    let first_target_distance = (targets[0] - entry_price).abs();
    let recommendation = if primary_ratio >= 3.0 {
        TradeRecommendation::Excellent
    } else if primary_ratio >= 2.0 {
        TradeRecommendation::Good
    } else if primary_ratio >= 1.0 {
        TradeRecommendation::Marginal
    } else {
        TradeRecommendation::Poor
    };

    RiskRewardResult {
        risk_reward_ratio: primary_ratio,
        target_ratios,
        potential_profit: position_size * first_target_distance,
        potential_loss: position_size * stop_distance,
        recommendation,
        is_valid: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_trend_halves_the_risk() {
        let result = calculate_position_size(
            100.0,
            95.0,
            500.0,
            10_000.0,
            Some(TradeCategory::CounterTrend),
        );

        assert_eq!(result.position_size, 50.0);
        assert_eq!(result.risk_amount, 250.0);
        assert_eq!(result.risk_multiplier, 0.5);
        assert_eq!(result.account_risk_percentage, 2.5);
        assert_eq!(result.original_risk_amount, Some(500.0));
        assert!(result.is_valid);
    }

    #[test]
    fn with_trend_uses_full_risk() {
        let result = calculate_position_size(
            100.0,
            95.0,
            500.0,
            100_000.0,
            Some(TradeCategory::WithTrend),
        );

        assert_eq!(result.position_size, 100.0);
        assert_eq!(result.risk_amount, 500.0);
        assert_eq!(result.risk_multiplier, 1.0);
    }

    #[test]
    fn reversal_attempt_quarters_the_risk() {
        let result = calculate_position_size(
            100.0,
            95.0,
            1_000.0,
            100_000.0,
            Some(TradeCategory::ReversalAttempt),
        );

        assert_eq!(result.risk_amount, 250.0);
        assert_eq!(result.position_size, 50.0);
    }

    #[test]
    fn no_category_means_no_adjustment() {
        let result = calculate_position_size(100.0, 95.0, 500.0, 0.0, None);

        assert_eq!(result.position_size, 100.0);
        assert!(result.trade_category.is_none());
        assert!(result.original_risk_amount.is_none());
        assert!(result.is_valid);
    }

    #[test]
    fn excessive_account_risk_is_invalid() {
        let result = calculate_position_size(100.0, 95.0, 600.0, 10_000.0, None);

        assert!(!result.is_valid);
        assert_eq!(result.account_risk_percentage, 6.0);
    }

    #[test]
    fn degenerate_inputs_are_invalid() {
        assert!(!calculate_position_size(0.0, 95.0, 500.0, 0.0, None).is_valid);
        assert!(!calculate_position_size(100.0, 0.0, 500.0, 0.0, None).is_valid);
        assert!(!calculate_position_size(100.0, 100.0, 500.0, 0.0, None).is_valid);
        assert!(!calculate_position_size(100.0, 95.0, -1.0, 0.0, None).is_valid);
    }

    #[test]
    fn risk_reward_buckets() {
        let excellent = calculate_risk_reward(100.0, 95.0, &[115.0], 10.0);
        assert_eq!(excellent.recommendation, TradeRecommendation::Excellent);
        assert_eq!(excellent.risk_reward_ratio, 3.0);
        assert_eq!(excellent.potential_profit, 150.0);
        assert_eq!(excellent.potential_loss, 50.0);

        let good = calculate_risk_reward(100.0, 95.0, &[110.0], 10.0);
        assert_eq!(good.recommendation, TradeRecommendation::Good);

        let marginal = calculate_risk_reward(100.0, 95.0, &[105.0], 10.0);
        assert_eq!(marginal.recommendation, TradeRecommendation::Marginal);

        let poor = calculate_risk_reward(100.0, 95.0, &[102.0], 10.0);
        assert_eq!(poor.recommendation, TradeRecommendation::Poor);
    }

    #[test]
    fn risk_reward_without_targets_is_invalid() {
        let result = calculate_risk_reward(100.0, 95.0, &[], 10.0);
        assert!(!result.is_valid);
        assert_eq!(result.potential_loss, 50.0);
    }

    #[test]
    fn multiple_targets_all_get_ratios() {
        let result = calculate_risk_reward(100.0, 95.0, &[105.0, 110.0, 115.0], 1.0);
        assert_eq!(result.target_ratios, vec![1.0, 2.0, 3.0]);
    }
}
