use proptest::prelude::*;

use buildterm::engine::{AppendOutcome, OutputQueue};

// Appended chunks mixing ASCII, multi-byte chars and newlines.
fn chunks_strategy() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z\u{e9}\u{4e2d}\n]{0,40}", 0..20)
}

proptest! {
    #[test]
    fn drained_blocks_reassemble_the_input(
        chunks in chunks_strategy(),
        block_size in 1usize..16,
    ) {
        let mut queue = OutputQueue::with_block_size(block_size);
        queue.set_owner(Some(1));
        for chunk in &chunks {
            let outcome = queue.append(Some(1), chunk);
            let queued = matches!(outcome, AppendOutcome::Queued { .. });
            prop_assert!(queued);
        }

        let mut drained = String::new();
        let mut blocks = Vec::new();
        while let Some((block, now_empty)) = queue.pop_front() {
            prop_assert_eq!(now_empty, queue.is_empty());
            drained.push_str(&block);
            blocks.push(block);
        }

        prop_assert_eq!(drained, chunks.concat());
        for block in &blocks {
            prop_assert!(block.chars().count() <= block_size);
        }
        // Only the last block may be partially filled.
        if let Some((_, full)) = blocks.split_last() {
            for block in full {
                prop_assert_eq!(block.chars().count(), block_size);
            }
        }
    }

    #[test]
    fn stale_producers_never_reach_the_queue(
        owner in 1u64..5,
        producer in 1u64..5,
        text in "[a-z]{1,10}",
    ) {
        let mut queue = OutputQueue::new();
        queue.set_owner(Some(owner));
        let outcome = queue.append(Some(producer), &text);

        if producer == owner {
            prop_assert_eq!(outcome, AppendOutcome::Queued { was_empty: true });
            prop_assert_eq!(queue.len(), 1);
        } else {
            prop_assert_eq!(outcome, AppendOutcome::Stale);
            prop_assert!(queue.is_empty());
        }
    }
}
