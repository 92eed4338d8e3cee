// tests/ingest_properties.rs

use std::collections::HashSet;

use proptest::prelude::*;
use stepwatch::bus::EventBus;
use stepwatch::monitor::{EventHistory, ingest_page};
use stepwatch::types::{EventType, TASK_LIFECYCLE_EVENT_TYPES, TERMINAL_EVENT_TYPES};
use stepwatch_test_utils::builders::{event, history_page};

// Event type is a pure function of the id, so a repeated id always carries
// the same event, the way a real history does.
fn type_for(id: i64, terminal_id: Option<i64>) -> EventType {
    if Some(id) == terminal_id {
        return EventType::ExecutionSucceeded;
    }
    let idx = (id as usize) % TASK_LIFECYCLE_EVENT_TYPES.len();
    TASK_LIFECYCLE_EVENT_TYPES[idx].clone()
}

fn pages_strategy() -> impl Strategy<Value = Vec<Vec<i64>>> {
    proptest::collection::vec(proptest::collection::vec(1i64..40, 0..12), 1..8)
}

proptest! {
    #[test]
    fn ingestion_publishes_each_id_once_in_first_seen_order(
        pages in pages_strategy(),
        terminal_id in proptest::option::of(1i64..40),
    ) {
        let bus = EventBus::new();
        let mut topics: Vec<EventType> = TASK_LIFECYCLE_EVENT_TYPES.to_vec();
        topics.extend(TERMINAL_EVENT_TYPES);
        let mut rx = bus.subscribe_all(&topics);
        let mut history = EventHistory::new();

        let mut expected = Vec::new();
        let mut seen = HashSet::new();
        let mut completed_any = false;

        for ids in &pages {
            let events = ids.iter().map(|&id| event(id, type_for(id, terminal_id))).collect();
            let completed = ingest_page(history_page(events, None), &bus, &mut history);

            let mut page_has_new_terminal = false;
            for &id in ids {
                if seen.insert(id) {
                    expected.push(id);
                    page_has_new_terminal |= Some(id) == terminal_id;
                }
            }
            prop_assert_eq!(completed, page_has_new_terminal);
            completed_any |= completed;
        }

        let mut published = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            published.push(ev.id);
        }

        prop_assert_eq!(&published, &expected);
        prop_assert_eq!(history.len(), expected.len());
        prop_assert_eq!(history.last_id(), expected.iter().max().copied());
        prop_assert_eq!(
            completed_any,
            terminal_id.is_some_and(|id| seen.contains(&id))
        );
    }

    #[test]
    fn reingesting_a_page_changes_nothing(ids in proptest::collection::vec(1i64..40, 0..20)) {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_all(&TASK_LIFECYCLE_EVENT_TYPES);
        let mut history = EventHistory::new();
        let page = history_page(
            ids.iter().map(|&id| event(id, type_for(id, None))).collect(),
            None,
        );

        ingest_page(page.clone(), &bus, &mut history);
        let len_after_first = history.len();
        let mut first_round = 0;
        while rx.try_recv().is_ok() {
            first_round += 1;
        }

        ingest_page(page, &bus, &mut history);
        prop_assert_eq!(history.len(), len_after_first);
        prop_assert_eq!(first_round, len_after_first);
        prop_assert!(rx.try_recv().is_err());
    }
}
