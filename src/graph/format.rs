//! Query-result formatting and token budgeting
//!
//! Every formatted tool result passes through the token-budget
//! truncator: text is encoded with the fixed o200k_base encoding and,
//! when over budget, the token stream is cut to leave room for a fixed
//! truncation marker. Queries with no matches yield a fixed sentinel
//! message instead of an empty success.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;

/// Sentinel returned when a query matches nothing
pub const EMPTY_DATA_MESSAGE: &str =
    "Your query returned empty result, please try a different query!";

/// Marker appended to results cut down to the token budget
pub const TRUNCATION_MARKER: &str = "...truncated";

/// One result row: record key -> store row value, ordered by key
pub type Record = BTreeMap<String, serde_json::Value>;

static BPE: Lazy<CoreBPE> =
    Lazy::new(|| tiktoken_rs::o200k_base().expect("o200k_base vocabulary is bundled"));

/// Encoded token length of `text`
pub fn count_tokens(text: &str) -> usize {
    BPE.encode_ordinary(text).len()
}

/// Enforce a token budget on formatted output.
///
/// Identity when the encoded length already fits. Otherwise the token
/// stream is truncated to `max_tokens` minus the marker's own length
/// and the marker is appended, so the result never exceeds the budget.
pub fn truncate_to_token_budget(text: &str, max_tokens: usize) -> String {
    let tokens = BPE.encode_ordinary(text);
    if tokens.len() <= max_tokens {
        return text.to_string();
    }

    let reserved = BPE.encode_ordinary(TRUNCATION_MARKER).len();
    let mut keep = max_tokens.saturating_sub(reserved);
    loop {
        match BPE.decode(tokens[..keep].to_vec()) {
            Ok(prefix) => {
                // Re-encoding the spliced text can merge tokens across
                // the cut; back off until the budget provably holds.
                let candidate = format!("{prefix}{TRUNCATION_MARKER}");
                if keep == 0 || count_tokens(&candidate) <= max_tokens {
                    return candidate;
                }
                keep -= 1;
            }
            // A cut can land inside a multi-byte character; back off
            // until the prefix decodes cleanly.
            Err(_) if keep > 0 => keep -= 1,
            Err(_) => return TRUNCATION_MARKER.to_string(),
        }
    }
}

/// Format result rows the way the query tools present them:
///
/// ```text
/// Result 1:
/// ASTNode: {...}
/// FileNode: {...}
/// ```
///
/// Keys are emitted in sorted order; the whole output is pushed
/// through the token budget. No rows yields the sentinel message.
pub fn format_records(records: &[Record], max_token_per_result: usize) -> String {
    if records.is_empty() {
        return EMPTY_DATA_MESSAGE.to_string();
    }

    let mut output = String::new();
    for (index, record) in records.iter().enumerate() {
        output.push_str(&format!("Result {}:\n", index + 1));
        for (key, value) in record {
            let rendered = serde_json::to_string(value).unwrap_or_else(|_| value.to_string());
            output.push_str(&format!("{key}: {rendered}\n"));
        }
        output.push_str("\n\n");
    }

    truncate_to_token_budget(output.trim_end(), max_token_per_result)
}

/// Prefix 1-based line numbers, like `3. let x = 1;`
pub fn prepend_line_numbers(text: &str, start_line: usize) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| format!("{}. {line}", start_line + i))
        .collect::<Vec<_>>()
        .join("\n")
}
