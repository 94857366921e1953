//! Key codec determinism and injectivity

use proptest::prelude::*;
use ratewarden::cache::key::{cache_key, parse_key, rate_limit_key, split_field, KeyBuilder};

fn segment() -> impl Strategy<Value = String> {
    // bias toward the characters the codec has to escape
    prop_oneof![
        "[a-z0-9]{0,8}",
        "[:=%a-z]{0,8}",
        any::<String>(),
    ]
}

proptest! {
    #[test]
    fn prop_equal_inputs_equal_keys(
        prefix in segment(),
        args in prop::collection::vec(segment(), 0..5),
    ) {
        let build = || {
            args.iter()
                .fold(KeyBuilder::new(&prefix), |b, a| b.arg(a.as_str()))
                .build()
        };
        prop_assert_eq!(build(), build());
    }

    #[test]
    fn prop_segments_round_trip(
        prefix in segment(),
        args in prop::collection::vec(segment(), 0..5),
    ) {
        let key = args
            .iter()
            .fold(KeyBuilder::new(&prefix), |b, a| b.arg(a.as_str()))
            .build();
        let mut expected = vec![prefix.clone()];
        expected.extend(args.iter().cloned());
        prop_assert_eq!(parse_key(key.as_str()).unwrap(), expected);
    }

    #[test]
    fn prop_distinct_arguments_distinct_keys(
        a in prop::collection::vec(segment(), 1..4),
        b in prop::collection::vec(segment(), 1..4),
    ) {
        prop_assume!(a != b);
        let key_a = a.iter().fold(KeyBuilder::new("p"), |k, s| k.arg(s.as_str())).build();
        let key_b = b.iter().fold(KeyBuilder::new("p"), |k, s| k.arg(s.as_str())).build();
        prop_assert_ne!(key_a, key_b);
    }

    #[test]
    fn prop_rate_limit_keys_distinguish_client_and_route(
        c1 in segment(), r1 in segment(), c2 in segment(), r2 in segment(),
    ) {
        prop_assume!((c1.as_str(), r1.as_str()) != (c2.as_str(), r2.as_str()));
        prop_assert_ne!(rate_limit_key(&c1, &r1), rate_limit_key(&c2, &r2));
    }
}

#[test]
fn test_ipv6_client_does_not_split() {
    let key = rate_limit_key("2001:db8::1", "/api/v1/auth/login");
    assert_eq!(key.as_str(), "rate_limit:2001%3Adb8%3A%3A1:/api/v1/auth/login");
    assert_eq!(key.segments().unwrap().len(), 3);
}

#[test]
fn test_positional_and_named_arguments_differ() {
    let positional = KeyBuilder::new("p").arg("a=b").build();
    let named = KeyBuilder::new("p").field("a", "b").build();
    assert_ne!(positional, named);

    let raw = named.as_str().rsplit(':').next().unwrap();
    assert_eq!(
        split_field(raw).unwrap(),
        Some(("a".to_string(), "b".to_string()))
    );
}

#[test]
fn test_typed_and_text_arguments_share_keys() {
    assert_eq!(cache_key("users", 123_u64), cache_key("users", "123"));
    assert_ne!(cache_key("users", 123_u64), cache_key("orders", 123_u64));
}
