//! Property-based tests over the pure delivery-fabric logic
//!
//! Uses proptest to cover the canonicalization, stamping, and fan-out
//! helpers for arbitrary inputs.

use chrono::Utc;
use proptest::prelude::*;

use ripple::models::{canonical_pair, ConversationKind, MessageKind};
use ripple::service::messages::fanout_recipients;
use ripple::wire::{ClientEnvelope, InboundRecord};

proptest! {
    #[test]
    fn canonical_pair_is_order_insensitive(a in any::<i64>(), b in any::<i64>()) {
        prop_assert_eq!(canonical_pair(a, b), canonical_pair(b, a));
    }

    #[test]
    fn canonical_pair_orders_lo_hi(a in any::<i64>(), b in any::<i64>()) {
        let (lo, hi) = canonical_pair(a, b);
        prop_assert!(lo <= hi);
        // Same two values, just ordered.
        let mut sorted = [a, b];
        sorted.sort_unstable();
        prop_assert_eq!((lo, hi), (sorted[0], sorted[1]));
    }

    #[test]
    fn stamping_overwrites_sender_and_preserves_payload(
        sender in 1i64..1_000_000,
        spoofed in "[0-9]{1,6}",
        receiver in "[0-9]{1,6}",
        content in ".{0,64}",
    ) {
        // The envelope arrives claiming an arbitrary sender; the record must
        // carry the authenticated one.
        let json = serde_json::json!({
            "type": "text",
            "content": content,
            "receiverId": receiver,
            "senderId": spoofed,
        });
        let envelope: ClientEnvelope = serde_json::from_value(json).unwrap();
        let record = InboundRecord::from_client(envelope, sender, Utc::now());
        prop_assert_eq!(record.sender_id, sender.to_string());
        prop_assert_eq!(record.receiver_id, receiver);
        prop_assert_eq!(record.content, content);
        prop_assert_eq!(record.kind, MessageKind::Text);
    }

    #[test]
    fn group_fanout_covers_exactly_the_other_participants(
        participants in proptest::collection::hash_set(1i64..1000, 1..20),
        sender_index in any::<prop::sample::Index>(),
    ) {
        let participants: Vec<i64> = participants.into_iter().collect();
        let sender = participants[sender_index.index(participants.len())];

        let recipients = fanout_recipients(ConversationKind::Group, sender, None, &participants);

        prop_assert!(!recipients.contains(&sender));
        prop_assert_eq!(recipients.len(), participants.len() - 1);
        for recipient in &recipients {
            prop_assert!(participants.contains(recipient));
        }
    }

    #[test]
    fn private_fanout_is_a_single_recipient(
        sender in 1i64..1000,
        receiver in 1i64..1000,
    ) {
        prop_assume!(sender != receiver);
        let recipients = fanout_recipients(
            ConversationKind::Private,
            sender,
            Some(receiver),
            &[sender, receiver],
        );
        prop_assert_eq!(recipients, vec![receiver]);
    }
}
