mod common;

use common::strategies::*;
use proptest::prelude::*;
use std::time::Duration;
use trade_resilience::resilience::{
    ErrorCategory, ErrorClassifier, ErrorSeverity, RecoveryPolicy, StandardErrorClassifier,
};
use trade_resilience::sanitize;

proptest! {
    /// Property: any message mentioning "rate limit", in any case, is rate limiting
    #[test]
    fn rate_limit_messages_classify_as_rate_limit(
        error in rate_limit_message_strategy().prop_flat_map(message_driven_error_strategy)
    ) {
        let context = StandardErrorClassifier::default().classify(&error, "get_quote", None);
        prop_assert_eq!(context.category, ErrorCategory::RpcRateLimit);
        prop_assert_eq!(context.severity, ErrorSeverity::High);
    }

    /// Property: classification is a pure function of kind and message
    #[test]
    fn classification_is_deterministic(error in any_rpc_error_strategy()) {
        let classifier = StandardErrorClassifier::default();
        let first = classifier.classify(&error, "op", None);
        let second = classifier.classify(&error, "op", None);
        prop_assert_eq!(first.category, second.category);
        prop_assert_eq!(first.severity, second.severity);
        prop_assert_ne!(first.error_id, second.error_id);
    }

    /// Property: decide() yields a coherent action for every category
    #[test]
    fn recovery_policy_is_total(context in error_context_strategy(), breaker in any::<bool>()) {
        let action = RecoveryPolicy::default().decide(&context, breaker);

        if action.stop_trading {
            prop_assert!(!action.should_retry);
        }
        if action.adjusts_parameters() {
            prop_assert!(action.should_retry);
        }
        if !action.should_retry {
            prop_assert_eq!(action.delay, Duration::ZERO);
        }
        prop_assert!(
            action.delay <= Duration::from_secs(300)
                || context.category == ErrorCategory::NetworkCongestion
        );
    }

    /// Property: an active breaker forces a halt regardless of category
    #[test]
    fn active_breaker_always_halts(context in error_context_strategy()) {
        let action = RecoveryPolicy::default().decide(&context, true);
        prop_assert!(!action.should_retry);
        prop_assert!(action.stop_trading);
    }

    /// Property: long hex runs never survive sanitization
    #[test]
    fn long_hex_strings_are_redacted(
        prefix in "[g-z ]{0,12}",
        hex in "[0-9a-f]{40,80}",
        with_0x in any::<bool>(),
    ) {
        let key = if with_0x { format!("0x{hex}") } else { hex.clone() };
        let sanitized = sanitize(&format!("{prefix} {key} rejected"));
        prop_assert!(!sanitized.contains(&hex));
    }
}
