//! Token accounting across a creation session.

use claude::Usage;
use serde::Serialize;

/// USD prices per 1000 tokens for a model family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TokenPrices {
    pub input: f64,
    pub output: f64,
}

/// Prices for known model families, matched by prefix.
const PRICE_TABLE: &[(&str, TokenPrices)] = &[
    ("claude-opus-4", TokenPrices { input: 0.015, output: 0.075 }),
    ("claude-sonnet-4", TokenPrices { input: 0.003, output: 0.015 }),
    ("claude-3-7-sonnet", TokenPrices { input: 0.003, output: 0.015 }),
    ("claude-3-5-sonnet", TokenPrices { input: 0.003, output: 0.015 }),
    ("claude-3-5-haiku", TokenPrices { input: 0.0008, output: 0.004 }),
    ("claude-3-haiku", TokenPrices { input: 0.00025, output: 0.00125 }),
];

impl TokenPrices {
    /// Look up prices for `model`. Unknown models have no price.
    pub fn for_model(model: &str) -> Option<TokenPrices> {
        PRICE_TABLE
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
            .map(|(_, prices)| *prices)
    }
}

/// Running totals of prompt and completion tokens.
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    prices: Option<TokenPrices>,
    prompt_tokens: usize,
    completion_tokens: usize,
    requests: usize,
}

/// A point-in-time summary of a [`UsageTracker`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub requests: usize,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
    /// Costs in USD; `None` when the model has no known price.
    pub prompt_cost: Option<f64>,
    pub completion_cost: Option<f64>,
    pub total_cost: Option<f64>,
}

impl UsageTracker {
    pub fn new(model: &str) -> Self {
        Self {
            prices: TokenPrices::for_model(model),
            ..Default::default()
        }
    }

    /// Add the usage of one API call.
    pub fn record(&mut self, usage: &Usage) {
        self.requests += 1;
        self.prompt_tokens += usage.input_tokens;
        self.completion_tokens += usage.output_tokens;
    }

    pub fn report(&self) -> UsageReport {
        let prompt_cost = self
            .prices
            .map(|p| p.input * self.prompt_tokens as f64 / 1000.0);
        let completion_cost = self
            .prices
            .map(|p| p.output * self.completion_tokens as f64 / 1000.0);

        UsageReport {
            requests: self.requests,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.prompt_tokens + self.completion_tokens,
            prompt_cost,
            completion_cost,
            total_cost: prompt_cost.zip(completion_cost).map(|(a, b)| a + b),
        }
    }
}

impl std::fmt::Display for UsageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} requests, {} prompt + {} completion = {} tokens",
            self.requests, self.prompt_tokens, self.completion_tokens, self.total_tokens
        )?;
        if let Some(cost) = self.total_cost {
            write!(f, " (${cost:.4})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: usize, output: usize) -> Usage {
        Usage {
            input_tokens: input,
            output_tokens: output,
        }
    }

    #[test]
    fn test_accumulates_across_requests() {
        let mut tracker = UsageTracker::new("claude-sonnet-4-20250514");
        tracker.record(&usage(1000, 200));
        tracker.record(&usage(500, 300));

        let report = tracker.report();
        assert_eq!(report.requests, 2);
        assert_eq!(report.prompt_tokens, 1500);
        assert_eq!(report.completion_tokens, 500);
        assert_eq!(report.total_tokens, 2000);
    }

    #[test]
    fn test_cost_for_known_model() {
        let mut tracker = UsageTracker::new("claude-sonnet-4-20250514");
        tracker.record(&usage(2000, 1000));

        let report = tracker.report();
        assert!((report.prompt_cost.unwrap() - 0.006).abs() < 1e-9);
        assert!((report.completion_cost.unwrap() - 0.015).abs() < 1e-9);
        assert!((report.total_cost.unwrap() - 0.021).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_has_no_cost() {
        let mut tracker = UsageTracker::new("some-local-model");
        tracker.record(&usage(10, 10));

        let report = tracker.report();
        assert_eq!(report.total_tokens, 20);
        assert!(report.total_cost.is_none());
        assert!(!report.to_string().contains('$'));
    }

    #[test]
    fn test_sub_thousand_tokens_still_cost_something() {
        let mut tracker = UsageTracker::new("claude-opus-4-20250514");
        tracker.record(&usage(100, 0));
        assert!(tracker.report().prompt_cost.unwrap() > 0.0);
    }
}
