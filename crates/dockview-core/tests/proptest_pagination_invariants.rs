//! Property-based invariant tests for paged log retrieval.
//!
//! 1. Backward pagination over a stable source yields the newest entries in
//!    chronological order, with no gaps or repeats.
//! 2. The page cursor never exceeds the ceiling, whatever the call sequence.
//! 3. Refresh is idempotent for a stable source.
//! 4. Load-older while a fetch is in flight changes nothing.
//! 5. The level filter keeps exactly the selected records, in buffer order.
//! 6. Anchor restoration returns the anchor to its viewport offset.

use dockview_core::{
    FetchError, LevelFilter, LevelSet, LoadGate, LogFetchController, LogLevel, LogRecord,
    LogSource, MemorySource, MergeOutcome, RawEntry, RowLayout, ScrollAnchoredLoader,
    ScrollTrigger,
};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn level_strategy() -> impl Strategy<Value = LogLevel> {
    prop::sample::select(LogLevel::ALL.to_vec())
}

fn entries_strategy(max: usize) -> impl Strategy<Value = Vec<RawEntry>> {
    prop::collection::vec(level_strategy(), 0..max).prop_map(|levels| {
        levels
            .into_iter()
            .enumerate()
            .map(|(i, level)| {
                RawEntry::new(
                    format!("2024-01-01T00:{:02}:{:02}Z", i / 60, i % 60),
                    format!("entry {i}"),
                    Some(level.as_str()),
                )
            })
            .collect()
    })
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Refresh,
    LoadOlder,
    BeginLoadOlder,
    Fail,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => Just(Op::Refresh),
        6 => Just(Op::LoadOlder),
        1 => Just(Op::BeginLoadOlder),
        1 => Just(Op::Fail),
    ]
}

fn messages(ctl: &LogFetchController) -> Vec<String> {
    ctl.records().iter().map(|r| r.message.clone()).collect()
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Prepend ordering
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn pages_concatenate_to_newest_suffix(
        entries in entries_strategy(300),
        page_size in 1u32..40,
        loads in 0usize..20,
    ) {
        let source = MemorySource::new().with_container("svc", entries.clone());
        let mut ctl = LogFetchController::with_limits(page_size, 50);
        ctl.refresh("svc", &source);
        for _ in 0..loads {
            ctl.load_older("svc", &source);
        }

        let pages = ctl.pagination().current_page as usize;
        let expected_len = entries.len().min(pages * page_size as usize);
        let expected: Vec<String> = entries[entries.len() - expected_len..]
            .iter()
            .map(|e| e.message.clone())
            .collect();
        prop_assert_eq!(messages(&ctl), expected);
        prop_assert_eq!(
            ctl.pagination().has_more,
            entries.len() > pages * page_size as usize
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Ceiling
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn cursor_never_exceeds_ceiling(
        entries in entries_strategy(200),
        page_size in 1u32..10,
        max_pages in 1u32..8,
        ops in prop::collection::vec(op_strategy(), 0..40),
    ) {
        let source = MemorySource::new().with_container("svc", entries);
        let mut ctl = LogFetchController::with_limits(page_size, max_pages);
        let mut held = None;
        for op in ops {
            match op {
                Op::Refresh => { ctl.refresh("svc", &source); }
                Op::LoadOlder => { ctl.load_older("svc", &source); }
                Op::BeginLoadOlder => {
                    if let Some(ticket) = ctl.begin_load_older() {
                        held = Some(ticket);
                    } else if let Some(ticket) = held.take() {
                        let result = source.fetch_page(&ticket.request);
                        ctl.complete(&ticket, result);
                    }
                }
                Op::Fail => source.fail_next(FetchError::Transport("injected".into())),
            }
            prop_assert!(ctl.pagination().current_page <= max_pages);
            prop_assert!(ctl.records().len() <= (page_size * max_pages) as usize);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Refresh idempotence
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn refresh_is_idempotent(entries in entries_strategy(120), page_size in 1u32..50) {
        let source = MemorySource::new().with_container("svc", entries);
        let mut ctl = LogFetchController::with_limits(page_size, 50);
        ctl.refresh("svc", &source);
        let first = ctl.records().to_vec();
        let first_state = ctl.pagination();
        ctl.refresh("svc", &source);
        prop_assert_eq!(ctl.records(), first.as_slice());
        prop_assert_eq!(ctl.pagination(), first_state);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. In-flight guard
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn load_older_in_flight_is_noop(entries in entries_strategy(200), page_size in 1u32..20) {
        let source = MemorySource::new().with_container("svc", entries);
        let mut ctl = LogFetchController::with_limits(page_size, 50);
        ctl.refresh("svc", &source);
        if let Some(ticket) = ctl.begin_load_older() {
            let before = messages(&ctl);
            let calls = source.call_count();
            prop_assert_eq!(ctl.load_older("svc", &source), MergeOutcome::Skipped);
            prop_assert_eq!(messages(&ctl), before);
            prop_assert_eq!(source.call_count(), calls);
            prop_assert_eq!(ctl.pagination().current_page, 1);
            prop_assert_eq!(ctl.outstanding(), Some(&ticket));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Filter count and order
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn filter_keeps_selected_in_order(
        levels in prop::collection::vec(level_strategy(), 0..100),
        bits in 0u8..32,
    ) {
        let records: Vec<LogRecord> = levels
            .iter()
            .enumerate()
            .map(|(i, level)| LogRecord::new(format!("t{i}"), format!("m{i}"), *level))
            .collect();
        let selected = LevelSet::from_bits_truncate(bits);
        let filter = LevelFilter::with_selected(selected);

        let visible: Vec<&LogRecord> = filter.visible(&records).collect();
        let expected = records.iter().filter(|r| selected.includes(r.level)).count();
        prop_assert_eq!(visible.len(), expected);
        prop_assert_eq!(filter.summary(&records).visible, expected);
        prop_assert!(visible.iter().all(|r| selected.includes(r.level)));

        // Buffer order: positions are strictly increasing.
        let positions: Vec<usize> = visible
            .iter()
            .map(|v| records.iter().position(|r| r.id == v.id).unwrap())
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Anchor restoration
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn anchor_offset_survives_prepend(
        heights in prop::collection::vec(1u32..40, 1..30),
        older in prop::collection::vec(1u32..40, 0..30),
        inset in 0u32..10,
        gap in 0u32..4,
    ) {
        let before: Vec<LogRecord> = (0..heights.len())
            .map(|i| LogRecord::new(format!("b{i}"), "m", LogLevel::Info))
            .collect();
        let prepended: Vec<LogRecord> = (0..older.len())
            .map(|i| LogRecord::new(format!("o{i}"), "m", LogLevel::Info))
            .collect();

        let layout = RowLayout::from_heights(heights.clone(), inset, gap);
        let mut loader = ScrollAnchoredLoader::new(1);
        let gate = LoadGate { has_more: true, in_flight: false, can_load: true };
        let visible: Vec<&LogRecord> = before.iter().collect();
        prop_assert_eq!(loader.on_scroll(0, &visible, &layout, gate), ScrollTrigger::LoadOlder);
        let offset_before = loader.offset_of(0, &layout);

        let after: Vec<LogRecord> = prepended.iter().chain(&before).cloned().collect();
        let after_layout =
            RowLayout::from_heights(older.iter().chain(&heights).copied(), inset, gap);
        let visible: Vec<&LogRecord> = after.iter().collect();
        let restored = loader.restore(&visible, &after_layout, prepended.len());
        prop_assert!(restored.is_ok());
        prop_assert_eq!(loader.offset_of(prepended.len(), &after_layout), offset_before);
    }
}
