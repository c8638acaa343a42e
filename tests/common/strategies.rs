//! Proptest strategies for error messages and classified contexts.

use proptest::prelude::*;
use trade_resilience::resilience::{
    ErrorCategory, ErrorClassifier, ErrorContext, ErrorSeverity, StandardErrorClassifier,
};
use trade_resilience::RpcError;

/// `text` with each ASCII letter's case chosen by `upper`
fn mixed_case(text: &str, upper: &[bool]) -> String {
    text.chars()
        .zip(upper.iter().cycle())
        .map(|(c, &up)| if up { c.to_ascii_uppercase() } else { c })
        .collect()
}

/// Messages containing "rate limit" in arbitrary case, with noise around it
pub fn rate_limit_message_strategy() -> impl Strategy<Value = String> {
    (
        "[a-z0-9 :,.]{0,24}",
        prop::collection::vec(any::<bool>(), 10),
        "[a-z0-9 :,.]{0,24}",
    )
        .prop_map(|(prefix, upper, suffix)| {
            format!("{prefix}{}{suffix}", mixed_case("rate limit", &upper))
        })
}

/// Error kinds whose classification falls through to message matching
pub fn message_driven_error_strategy(message: String) -> impl Strategy<Value = RpcError> {
    prop_oneof![
        Just(RpcError::Other(message.clone())),
        Just(RpcError::Sdk(message.clone())),
        Just(RpcError::Transaction(message)),
    ]
}

pub fn any_rpc_error_strategy() -> impl Strategy<Value = RpcError> {
    let message = "[a-zA-Z0-9 :_=]{0,48}";
    prop_oneof![
        message.prop_map(RpcError::Connection),
        message.prop_map(RpcError::Timeout),
        message.prop_map(RpcError::Sdk),
        message.prop_map(RpcError::Transaction),
        message.prop_map(RpcError::Other),
    ]
}

pub fn category_strategy() -> impl Strategy<Value = ErrorCategory> {
    prop::sample::select(ErrorCategory::ALL.to_vec())
}

pub fn severity_strategy() -> impl Strategy<Value = ErrorSeverity> {
    prop_oneof![
        Just(ErrorSeverity::Low),
        Just(ErrorSeverity::Medium),
        Just(ErrorSeverity::High),
        Just(ErrorSeverity::Critical),
    ]
}

/// Contexts with arbitrary category, severity and retry index
pub fn error_context_strategy() -> impl Strategy<Value = ErrorContext> {
    (category_strategy(), severity_strategy(), 0u32..32).prop_map(
        |(category, severity, retry_count)| {
            let mut context = StandardErrorClassifier::default()
                .classify(&RpcError::Other("generated".into()), "generated_op", None)
                .with_retry_count(retry_count);
            context.category = category;
            context.severity = severity;
            context
        },
    )
}
