//! Integration test: wire layout of the swap payload and its entry-point
//! wrapping, checked word by word against the ABI tuple
//! `(uint256,uint256,uint256,address[],address,uint256,bool)`.

use alloy_primitives::U256;
use anycall_core::{swap, xcm, CodecError, EntryPoint, MultiLocation, Payload, PayloadLayout, XcmTransferPayload};
use anycall_integration_tests::{address_word, example_payload, token_a, token_b, wallet, word};

fn expected_params_layout() -> Vec<u8> {
    let words = [
        word(U256::ZERO),
        word(U256::ZERO),
        word(U256::from(1_000_000_000_000_000_000u128)),
        word(U256::from(7 * 32)),
        address_word(wallet()),
        word(U256::MAX),
        word(U256::ZERO),
        word(U256::from(2)),
        address_word(token_a()),
        address_word(token_b()),
    ];
    words.concat()
}

// =========================================================================
// Canonical layout
// =========================================================================

#[test]
fn test_example_payload_matches_abi_layout() {
    let encoded = swap::encode(&example_payload(wallet())).unwrap();
    assert_eq!(encoded.to_vec(), expected_params_layout());
}

#[test]
fn test_encoding_is_deterministic() {
    let first = swap::encode(&example_payload(wallet())).unwrap();
    let second = swap::encode(&example_payload(wallet())).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_single_tuple_is_offset_prefixed_params() {
    let params = swap::encode(&example_payload(wallet())).unwrap();
    let single = swap::encode_single(&example_payload(wallet())).unwrap();

    assert_eq!(&single[..32], &word(U256::from(32)));
    assert_eq!(&single[32..], &params[..]);
}

#[test]
fn test_layouts_do_not_cross_decode() {
    let single = swap::encode_single(&example_payload(wallet())).unwrap();
    // Slot 3 of the single form holds amount_in_max, not a valid offset.
    assert!(matches!(
        swap::decode(&single),
        Err(CodecError::MalformedEncoding(_))
    ));
}

// =========================================================================
// Round trips through every wrapper
// =========================================================================

#[test]
fn test_round_trip_through_exec() {
    let payload = example_payload(wallet())
        .with_min_out(U256::from(5))
        .with_deadline(U256::from(1_900_000_000u64))
        .with_to_native(true);

    for layout in [PayloadLayout::Params, PayloadLayout::SingleTuple] {
        let entry = EntryPoint::AnycallExec {
            token: token_a(),
            receiver: wallet(),
            amount: U256::from(10u64),
        };
        let calldata = entry.wrap(swap::encode_with(&payload, layout).unwrap());

        let (decoded_entry, inner) = EntryPoint::split_calldata(&calldata).unwrap();
        assert_eq!(decoded_entry, entry);
        assert_eq!(swap::decode_with(&inner, layout).unwrap(), payload);
    }
}

#[test]
fn test_payload_enum_dispatch() {
    let transfer = XcmTransferPayload::new(MultiLocation::sibling_account(2011, [9u8; 32]), 5_000);
    let swap_bytes = Payload::from(example_payload(wallet()))
        .encode(PayloadLayout::Params)
        .unwrap();
    let xcm_bytes = Payload::from(transfer.clone())
        .encode(PayloadLayout::Params)
        .unwrap();

    assert_eq!(swap::decode(&swap_bytes).unwrap(), example_payload(wallet()));
    assert_eq!(xcm::decode(&xcm_bytes).unwrap(), transfer);
}

// =========================================================================
// Rejections
// =========================================================================

#[test]
fn test_short_path_rejected() {
    let mut payload = example_payload(wallet());
    payload.path.truncate(1);
    assert!(matches!(
        swap::encode(&payload),
        Err(CodecError::InvalidPayload(_))
    ));
}

#[test]
fn test_zero_buffers_rejected() {
    for len in [0usize, 1, 32, 7 * 32, 8 * 32 - 1] {
        assert!(
            matches!(swap::decode(&vec![0u8; len]), Err(CodecError::MalformedEncoding(_))),
            "len {}",
            len
        );
    }
}

#[test]
fn test_truncated_encoding_rejected() {
    let encoded = swap::encode(&example_payload(wallet())).unwrap();
    let truncated = &encoded[..encoded.len() - 32];
    assert!(matches!(
        swap::decode(truncated),
        Err(CodecError::MalformedEncoding(_))
    ));
}
