//! Static per-model USD pricing used by the quota enforcer's cost ceilings
//! (spec §4.6, check 5). Prices are USD per token, derived from published
//! per-million-token list prices; `cache_read`/`cache_write` fall back to
//! `input` when a provider doesn't price them separately.

#[derive(Debug, Clone, Copy)]
pub struct ModelPrice {
    pub input_per_million: f64,
    pub output_per_million: f64,
    pub cache_read_per_million: f64,
    pub cache_write_per_million: f64,
}

impl ModelPrice {
    const fn uniform_cache(input: f64, output: f64) -> Self {
        Self {
            input_per_million: input,
            output_per_million: output,
            cache_read_per_million: input,
            cache_write_per_million: input,
        }
    }
}

/// Ordered by specificity; the first prefix match wins, so longer/more
/// specific prefixes must come before their shorter siblings.
const TABLE: &[(&str, ModelPrice)] = &[
    (
        "claude-opus-4",
        ModelPrice {
            input_per_million: 15.0,
            output_per_million: 75.0,
            cache_read_per_million: 1.5,
            cache_write_per_million: 18.75,
        },
    ),
    (
        "claude-sonnet-4",
        ModelPrice {
            input_per_million: 3.0,
            output_per_million: 15.0,
            cache_read_per_million: 0.3,
            cache_write_per_million: 3.75,
        },
    ),
    (
        "claude-3-5-haiku",
        ModelPrice {
            input_per_million: 0.8,
            output_per_million: 4.0,
            cache_read_per_million: 0.08,
            cache_write_per_million: 1.0,
        },
    ),
    (
        "gemini-2.5-pro",
        ModelPrice {
            input_per_million: 1.25,
            output_per_million: 10.0,
            cache_read_per_million: 0.31,
            cache_write_per_million: 1.25,
        },
    ),
    (
        "gemini-2.5-flash",
        ModelPrice {
            input_per_million: 0.3,
            output_per_million: 2.5,
            cache_read_per_million: 0.075,
            cache_write_per_million: 0.3,
        },
    ),
    ("gpt-4o-mini", ModelPrice::uniform_cache(0.15, 0.6)),
    ("gpt-4o", ModelPrice::uniform_cache(2.5, 10.0)),
    ("o1-mini", ModelPrice::uniform_cache(1.1, 4.4)),
    ("o1", ModelPrice::uniform_cache(15.0, 60.0)),
    (
        "gpt-4.1-mini",
        ModelPrice::uniform_cache(0.4, 1.6),
    ),
    ("gpt-4.1", ModelPrice::uniform_cache(2.0, 8.0)),
];

/// Conservative default for models not in `TABLE` (priced like a mid-tier
/// model so an unrecognized model contributes to cost ceilings rather than
/// being silently free).
const FALLBACK: ModelPrice = ModelPrice::uniform_cache(3.0, 15.0);

fn price_for_model(model: &str) -> ModelPrice {
    let normalized = model.trim();
    TABLE
        .iter()
        .find(|(prefix, _)| normalized.starts_with(prefix))
        .map(|(_, price)| *price)
        .unwrap_or(FALLBACK)
}

/// Cost in USD for one completion given provider-native token counts.
pub fn cost_usd(
    model: &str,
    input_tokens: i64,
    output_tokens: i64,
    cache_read_tokens: i64,
    cache_creation_tokens: i64,
) -> f64 {
    let price = price_for_model(model);
    let million = 1_000_000.0;
    (input_tokens as f64 / million) * price.input_per_million
        + (output_tokens as f64 / million) * price.output_per_million
        + (cache_read_tokens as f64 / million) * price.cache_read_per_million
        + (cache_creation_tokens as f64 / million) * price.cache_write_per_million
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_prefix_matches() {
        let price = price_for_model("claude-opus-4-20250514");
        assert_eq!(price.input_per_million, 15.0);
    }

    #[test]
    fn unknown_model_uses_fallback() {
        let price = price_for_model("some-future-model-9000");
        assert_eq!(price.input_per_million, FALLBACK.input_per_million);
    }

    #[test]
    fn cost_usd_scales_with_tokens() {
        let cost = cost_usd("gpt-4o-mini", 1_000_000, 1_000_000, 0, 0);
        assert!((cost - 0.75).abs() < 1e-9);
    }
}
