//! Request ID generation for outgoing calls.

use rand::Rng;
use uuid::Uuid;

use crate::config::{self, ALGORITHM_RANGE_ID, ALGORITHM_UUID};

/// Generates the value stamped into the request-id header when a call
/// does not already carry one.
pub struct RequestIdGenerator {
    algorithm: String,
    range_id: config::RangeId,
}

impl RequestIdGenerator {
    pub fn from_config(config: &config::Client) -> Self {
        Self {
            algorithm: config.request_id_algorithm.clone(),
            range_id: config.range_id.clone(),
        }
    }

    pub fn generate(&self) -> String {
        match self.algorithm.as_str() {
            ALGORITHM_UUID => Uuid::new_v4().to_string(),
            ALGORITHM_RANGE_ID => self.range_id(),
            _ => Uuid::new_v4().to_string(), // Fallback for invalid algorithm
        }
    }

    fn range_id(&self) -> String {
        let char_set = if self.range_id.char_set.is_empty() {
            config::RangeId::default_char_set()
        } else {
            self.range_id.char_set.clone()
        };
        let chars: Vec<char> = char_set.chars().collect();
        let mut rng = rand::thread_rng();
        (0..self.range_id.length)
            .map(|_| chars[rng.gen_range(0..chars.len())])
            .collect()
    }
}
