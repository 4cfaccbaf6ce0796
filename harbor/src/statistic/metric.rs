/// Mean of a sample, `None` for an empty sample.
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation.
fn std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    if values.len() < 2 {
        return None;
    }
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Sharpe ratio over per-interval returns with the provided per-interval risk free rate.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> Option<f64> {
    let mean_return = mean(returns)?;
    let dispersion = std_dev(returns)?;
    if dispersion == 0.0 {
        return None;
    }
    Some((mean_return - risk_free_rate) / dispersion)
}

/// Sortino ratio: like Sharpe, but the denominator only penalises downside dispersion.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64) -> Option<f64> {
    let mean_return = mean(returns)?;
    let downside = returns
        .iter()
        .filter(|value| **value < risk_free_rate)
        .map(|value| (value - risk_free_rate).powi(2))
        .collect::<Vec<_>>();
    if downside.is_empty() {
        return None;
    }
    let downside_deviation = (downside.iter().sum::<f64>() / downside.len() as f64).sqrt();
    if downside_deviation == 0.0 {
        return None;
    }
    Some((mean_return - risk_free_rate) / downside_deviation)
}

/// Maximum peak-to-trough drawdown of an equity curve, as a non-negative fraction of the peak.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_drawdown = 0.0f64;
    for value in equity {
        peak = peak.max(*value);
        if peak > 0.0 {
            max_drawdown = max_drawdown.max((peak - value) / peak);
        }
    }
    max_drawdown
}

/// Fraction of winning outcomes, `None` for an empty sample.
pub fn win_rate(outcomes: &[f64]) -> Option<f64> {
    if outcomes.is_empty() {
        return None;
    }
    let wins = outcomes.iter().filter(|outcome| **outcome > 0.0).count();
    Some(wins as f64 / outcomes.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharpe_ratio() {
        let returns = vec![0.01, 0.02, -0.005, 0.015];
        let sharpe = sharpe_ratio(&returns, 0.0).unwrap();
        assert!(sharpe > 0.0);

        // Constant returns have zero dispersion
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01], 0.0), None);
        assert_eq!(sharpe_ratio(&[], 0.0), None);
    }

    #[test]
    fn test_sortino_only_penalises_downside() {
        let returns = vec![0.05, 0.04, -0.01, 0.03];
        let sortino = sortino_ratio(&returns, 0.0).unwrap();
        let sharpe = sharpe_ratio(&returns, 0.0).unwrap();
        assert!(sortino > sharpe);

        // All-positive returns have no downside sample
        assert_eq!(sortino_ratio(&[0.01, 0.02], 0.0), None);
    }

    #[test]
    fn test_max_drawdown() {
        let equity = vec![100.0, 120.0, 90.0, 110.0, 80.0];
        // Peak 120 to trough 80
        assert!((max_drawdown(&equity) - (120.0 - 80.0) / 120.0).abs() < 1e-12);
        assert_eq!(max_drawdown(&[100.0, 110.0, 120.0]), 0.0);
    }

    #[test]
    fn test_win_rate() {
        assert_eq!(win_rate(&[1.0, -1.0, 2.0, -0.5]), Some(0.5));
        assert_eq!(win_rate(&[]), None);
    }
}
