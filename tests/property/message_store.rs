#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Property-based tests for the room message store.
//!
//! Uses proptest to verify:
//! 1. N unique live arrivals after history grow the store by exactly N, in arrival order.
//! 2. Re-delivered messages never grow the store.
//! 3. Arrivals buffered before history end up after it, in arrival order, without duplicates.
//! 4. History for another room leaves the store untouched.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use roomchat::chat::store::{AppendOutcome, MessageStore};
use roomchat_proto::model::{Message, MessageId, Participant, ParticipantId, RoomId};

const ROOM: RoomId = RoomId::new(7);

fn message(id: i64) -> Message {
    Message {
        id: MessageId::new(id),
        body: format!("#{id}"),
        created_at: DateTime::from_timestamp(1_700_000_000 + id, 0).unwrap_or_else(Utc::now),
        user: Participant::new(ParticipantId::new(id % 5), "someone"),
    }
}

fn ids(store: &MessageStore) -> Vec<i64> {
    store.snapshot().iter().map(|m| m.id.get()).collect()
}

/// Distinct ids in arbitrary order, split into (history, live).
fn arb_history_and_live() -> impl Strategy<Value = (Vec<i64>, Vec<i64>)> {
    prop::collection::hash_set(0i64..100_000, 0..60)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
        .prop_flat_map(|all| {
            let len = all.len();
            (Just(all), 0..=len)
        })
        .prop_map(|(all, split)| {
            let (history, live) = all.split_at(split);
            (history.to_vec(), live.to_vec())
        })
}

proptest! {
    #[test]
    fn unique_arrivals_append_in_order((history, live) in arb_history_and_live()) {
        let store = MessageStore::new(ROOM);
        store.load_history(ROOM, history.iter().copied().map(message).collect()).unwrap();

        for &id in &live {
            prop_assert_eq!(store.append(message(id)), AppendOutcome::Appended);
        }

        prop_assert_eq!(store.len(), history.len() + live.len());
        let expected: Vec<i64> = history.iter().chain(live.iter()).copied().collect();
        prop_assert_eq!(ids(&store), expected);
    }

    #[test]
    fn redelivery_never_grows_the_store(
        (history, live) in arb_history_and_live(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..40),
    ) {
        let store = MessageStore::new(ROOM);
        store.load_history(ROOM, history.iter().copied().map(message).collect()).unwrap();
        for &id in &live {
            store.append(message(id));
        }
        let before = ids(&store);

        if !before.is_empty() {
            for pick in picks {
                let id = before[pick.index(before.len())];
                prop_assert_eq!(store.append(message(id)), AppendOutcome::Duplicate);
            }
        }

        prop_assert_eq!(ids(&store), before);
    }

    #[test]
    fn buffered_arrivals_follow_history(
        (history, live) in arb_history_and_live(),
        early in 0usize..60,
        echoes in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
    ) {
        let store = MessageStore::new(ROOM);
        let early = early.min(live.len());
        let (before_history, after_history) = live.split_at(early);

        for &id in before_history {
            prop_assert_eq!(store.append(message(id)), AppendOutcome::Buffered);
        }
        prop_assert!(store.is_empty());

        // Some history messages were also seen live before the load.
        let mut buffered_echoes = HashSet::new();
        if !history.is_empty() {
            for pick in echoes {
                let id = history[pick.index(history.len())];
                if buffered_echoes.insert(id) {
                    prop_assert_eq!(store.append(message(id)), AppendOutcome::Buffered);
                }
            }
        }

        store.load_history(ROOM, history.iter().copied().map(message).collect()).unwrap();
        for &id in after_history {
            store.append(message(id));
        }

        let expected: Vec<i64> = history.iter().chain(live.iter()).copied().collect();
        prop_assert_eq!(ids(&store), expected);
        prop_assert_eq!(store.buffered_len(), 0);
    }

    #[test]
    fn stale_history_is_rejected((history, live) in arb_history_and_live(), other in 0i64..1000) {
        prop_assume!(RoomId::new(other) != ROOM);
        let store = MessageStore::new(ROOM);
        for &id in &live {
            store.append(message(id));
        }

        let result = store.load_history(RoomId::new(other), history.iter().copied().map(message).collect());

        prop_assert!(result.is_err());
        prop_assert!(!store.is_history_loaded());
        prop_assert_eq!(store.buffered_len(), live.len());
    }
}
