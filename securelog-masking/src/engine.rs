//! Shape dispatch: one message in, masked message + collected originals out.

use std::sync::Arc;

use securelog_core::ConfigSnapshot;

use crate::collector::SensitiveCollector;
use crate::fallback::PlainTextFallbackMasker;
use crate::json::JsonMasker;
use crate::kv::KeyValuePairsMasker;
use crate::query::QueryStringMasker;
use crate::rules::MaskingRules;
use crate::sql::SqlParametersMasker;

/// Masking outcome for a single message. `collected` holds the original
/// sensitive values in collection order, ready for envelope encryption.
#[derive(Debug)]
pub struct MaskResult {
    pub masked: String,
    pub collected: Vec<(String, String)>,
}

/// Dispatches a message through the shape maskers in priority order.
///
/// JSON runs first because any later heuristic would corrupt its structure;
/// SQL `Parameters:` is specific enough to beat the generic key/value scan;
/// plain text is the safety net. The first shape that applies wins.
pub struct MaskingEngine {
    config: Arc<ConfigSnapshot>,
    json: JsonMasker,
    query: Arc<QueryStringMasker>,
    sql: SqlParametersMasker,
    kv: KeyValuePairsMasker,
    fallback: PlainTextFallbackMasker,
}

impl MaskingEngine {
    pub fn new(config: Arc<ConfigSnapshot>) -> Self {
        let rules = Arc::new(MaskingRules::new(config.clone()));
        let query = Arc::new(QueryStringMasker::new(config.clone(), rules.clone()));
        Self {
            json: JsonMasker::new(config.clone(), rules.clone(), query.clone()),
            sql: SqlParametersMasker::new(rules.clone()),
            kv: KeyValuePairsMasker::new(config.clone(), rules.clone()),
            fallback: PlainTextFallbackMasker::new(config.clone(), rules),
            query,
            config,
        }
    }

    pub fn mask(&self, message: &str) -> MaskResult {
        let mut collector = SensitiveCollector::new();
        if message.is_empty() {
            return MaskResult { masked: message.to_string(), collected: collector.into_pairs() };
        }

        let trimmed = message.trim();

        if looks_like_json(trimmed) {
            if let Some(masked) = self.json.try_mask_json(message, &mut collector) {
                return MaskResult { masked, collected: collector.into_pairs() };
            }
        }

        let sql_masked = self.sql.mask_sql_parameters_line(message, &mut collector);
        if sql_masked != message {
            return MaskResult { masked: sql_masked, collected: collector.into_pairs() };
        }

        let url_masked = self.query.mask_url_query_in_text(message, "query", &mut collector);
        if url_masked != message {
            return MaskResult { masked: url_masked, collected: collector.into_pairs() };
        }

        if self.config.query_string_enabled && self.query.looks_like_query_string(trimmed) {
            let masked = self.query.mask_query_string(message, "", &mut collector);
            return MaskResult { masked, collected: collector.into_pairs() };
        }

        let kv_masked = self.kv.mask_key_value_pairs(message, &mut collector);
        if kv_masked != message {
            return MaskResult { masked: kv_masked, collected: collector.into_pairs() };
        }

        let masked = self.fallback.mask_plain_text(message, &mut collector);
        MaskResult { masked, collected: collector.into_pairs() }
    }
}

fn looks_like_json(trimmed: &str) -> bool {
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}
