//! Cost estimation from token counts.

/// Per-million-token rates in USD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
    pub cache_write: f64,
    pub cache_read: f64,
}

const fn rates(input: f64, output: f64, cache_write: f64, cache_read: f64) -> ModelPricing {
    ModelPricing {
        input,
        output,
        cache_write,
        cache_read,
    }
}

const OPUS_4: ModelPricing = rates(15.0, 75.0, 18.75, 1.50);
const OPUS_4_5: ModelPricing = rates(5.0, 25.0, 6.25, 0.50);
const SONNET: ModelPricing = rates(3.0, 15.0, 3.75, 0.30);
const HAIKU_4_5: ModelPricing = rates(1.0, 5.0, 1.25, 0.10);
const HAIKU_3_5: ModelPricing = rates(0.80, 4.00, 1.00, 0.08);
const HAIKU_3: ModelPricing = rates(0.25, 1.25, 0.30, 0.03);

/// Dated model ids first, then the undated aliases used for substring lookup.
const PRICE_TABLE: &[(&str, ModelPricing)] = &[
    ("claude-opus-4-5-20251101", OPUS_4_5),
    ("claude-opus-4-1-20250805", OPUS_4),
    ("claude-opus-4-20250514", OPUS_4),
    ("claude-sonnet-4-5-20250929", SONNET),
    ("claude-sonnet-4-20250514", SONNET),
    ("claude-3-7-sonnet-20250219", SONNET),
    ("claude-3-5-sonnet-20241022", SONNET),
    ("claude-3-5-sonnet-20240620", SONNET),
    ("claude-haiku-4-5-20251001", HAIKU_4_5),
    ("claude-3-5-haiku-20241022", HAIKU_3_5),
    ("claude-3-opus-20240229", OPUS_4),
    ("claude-3-haiku-20240307", HAIKU_3),
    ("claude-opus-4-5", OPUS_4_5),
    ("claude-opus-4-1", OPUS_4),
    ("claude-opus-4", OPUS_4),
    ("claude-sonnet-4-5", SONNET),
    ("claude-sonnet-4", SONNET),
    ("claude-3-7-sonnet", SONNET),
    ("claude-3-5-sonnet", SONNET),
    ("claude-haiku-4-5", HAIKU_4_5),
    ("claude-3-5-haiku", HAIKU_3_5),
    ("claude-3-opus", OPUS_4),
    ("claude-3-haiku", HAIKU_3),
];

/// Token counts by pricing category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCounts {
    pub input: u64,
    pub cache_write: u64,
    pub cache_read: u64,
    pub output: u64,
}

/// Look up rates for a model id.
///
/// Exact match first. Otherwise the longest table key contained in the model
/// id, then the shortest table key containing the model id.
pub fn pricing_for_model(model: &str) -> Option<ModelPricing> {
    let model = model.trim();
    if model.is_empty() {
        return None;
    }

    if let Some((_, p)) = PRICE_TABLE.iter().find(|(key, _)| *key == model) {
        return Some(*p);
    }

    let contained = PRICE_TABLE
        .iter()
        .filter(|(key, _)| model.contains(key))
        .max_by_key(|(key, _)| key.len());
    if let Some((_, p)) = contained {
        return Some(*p);
    }

    PRICE_TABLE
        .iter()
        .filter(|(key, _)| key.contains(model))
        .min_by_key(|(key, _)| key.len())
        .map(|(_, p)| *p)
}

/// Estimated cost in USD; zero when the model is unknown or missing.
pub fn estimate_cost(model: Option<&str>, tokens: TokenCounts) -> f64 {
    let Some(p) = model.and_then(pricing_for_model) else {
        return 0.0;
    };

    (tokens.input as f64 * p.input
        + tokens.cache_write as f64 * p.cache_write
        + tokens.cache_read as f64 * p.cache_read
        + tokens.output as f64 * p.output)
        / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_haiku_3_5_cost() {
        let tokens = TokenCounts {
            input: 100,
            output: 50,
            ..TokenCounts::default()
        };
        let cost = estimate_cost(Some("claude-3-5-haiku-20241022"), tokens);
        assert!(approx_eq(cost, 0.00028), "got {cost}");
    }

    #[test]
    fn test_unknown_models_cost_zero() {
        let tokens = TokenCounts {
            input: 1_000_000,
            cache_write: 5,
            cache_read: 7,
            output: 1_000_000,
        };
        for model in ["gpt-4o", "llama-3-70b", "", "   ", "<synthetic>"] {
            assert_eq!(estimate_cost(Some(model), tokens), 0.0, "model {model:?}");
        }
        assert_eq!(estimate_cost(None, tokens), 0.0);
    }

    #[test]
    fn test_all_categories_are_priced() {
        let tokens = TokenCounts {
            input: 1_000_000,
            cache_write: 1_000_000,
            cache_read: 1_000_000,
            output: 1_000_000,
        };
        let cost = estimate_cost(Some("claude-sonnet-4-20250514"), tokens);
        assert!(approx_eq(cost, 3.0 + 3.75 + 0.30 + 15.0), "got {cost}");
    }

    #[test]
    fn test_substring_lookup_both_directions() {
        // Table key inside a provider-prefixed id.
        assert_eq!(
            pricing_for_model("anthropic.claude-3-5-haiku-20241022-v1:0"),
            Some(HAIKU_3_5)
        );
        // Longest contained key wins over a shorter alias.
        assert_eq!(pricing_for_model("claude-opus-4-5-preview"), Some(OPUS_4_5));
        // Model id inside a table key.
        assert_eq!(pricing_for_model("haiku-4-5"), Some(HAIKU_4_5));
        assert_eq!(pricing_for_model("3-opus"), Some(OPUS_4));
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(pricing_for_model("claude-opus-4-1-20250805"), Some(OPUS_4));
        assert_eq!(pricing_for_model(" claude-3-haiku-20240307 "), Some(HAIKU_3));
    }
}
