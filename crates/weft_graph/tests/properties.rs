//! Property tests over randomly shaped graphs.
//!
//! Each case builds a random DAG where node `i` depends on an arbitrary subset
//! of earlier nodes (through `when_all` when there is more than one), then
//! checks that:
//! - Every node runs exactly once per submission
//! - Every node runs after all of its predecessors
//! - Resubmitting a shared graph repeats the same order


use proptest::prelude::*;
use proptest::sample::Index;
use test_utils::ExecutionLog;
use weft_exec::{ExecutionSpace, Serial, Threads};
use weft_graph::{Graph, GraphNodeRef, create_graph};

/// For each node, indices into the nodes created before it.
fn arb_shape() -> impl Strategy<Value = Vec<Vec<Index>>> {
    prop::collection::vec(prop::collection::vec(any::<Index>(), 0..4), 1..40)
}

fn build<E: ExecutionSpace>(
    space: E,
    shape: &[Vec<Index>],
    log: &ExecutionLog<usize>,
) -> (Graph<E>, Vec<Vec<usize>>) {
    let mut expected = Vec::with_capacity(shape.len());
    let graph = create_graph(space, |builder| {
        let mut refs: Vec<GraphNodeRef<'_, E>> = Vec::with_capacity(shape.len());
        for (i, picks) in shape.iter().enumerate() {
            let mut preds: Vec<usize> = if i == 0 {
                Vec::new()
            } else {
                picks.iter().map(|pick| pick.index(i)).collect()
            };
            preds.sort_unstable();
            preds.dedup();

            let node = match preds.as_slice() {
                [] => builder.then_kernel("node", log.recorder(i))?,
                [only] => refs[*only].then_kernel("node", log.recorder(i))?,
                many => {
                    let joined: Vec<_> = many.iter().map(|&p| refs[p]).collect();
                    builder.when_all(joined)?.then_kernel("node", log.recorder(i))?
                }
            };
            refs.push(node);
            expected.push(preds);
        }
        Ok(())
    })
    .expect("random graph");
    (graph, expected)
}

fn check_order(events: &[usize], expected: &[Vec<usize>]) -> Result<(), TestCaseError> {
    prop_assert_eq!(events.len(), expected.len());
    let mut position = vec![usize::MAX; expected.len()];
    for (at, &node) in events.iter().enumerate() {
        prop_assert_eq!(position[node], usize::MAX, "node {} ran twice", node);
        position[node] = at;
    }
    for (node, preds) in expected.iter().enumerate() {
        for &pred in preds {
            prop_assert!(
                position[pred] < position[node],
                "node {} ran before its predecessor {}",
                node,
                pred
            );
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_every_node_once_after_predecessors(shape in arb_shape()) {
        let log = ExecutionLog::new();
        let (graph, expected) = build(Serial, &shape, &log);
        graph.submit();
        check_order(&log.events(), &expected)?;
    }

    #[test]
    fn prop_resubmission_is_idempotent(shape in arb_shape()) {
        let log = ExecutionLog::new();
        let (graph, expected) = build(Serial, &shape, &log);
        let other = graph.clone();

        graph.submit();
        let first = log.events();
        log.clear();
        other.submit();
        prop_assert_eq!(log.events(), first.clone());

        log.clear();
        let report = graph.submit_once();
        prop_assert!(!report.destructive);
        prop_assert_eq!(log.events(), first);
        check_order(&log.events(), &expected)?;
    }

    #[test]
    fn prop_destructive_matches_shared(shape in arb_shape()) {
        let shared = ExecutionLog::new();
        let (graph, _) = build(Serial, &shape, &shared);
        graph.submit();

        let unique = ExecutionLog::new();
        let (graph, expected) = build(Threads::with_threads(2).expect("pool"), &shape, &unique);
        let report = graph.submit_once();
        prop_assert!(report.destructive);
        prop_assert_eq!(unique.events(), shared.events());
        check_order(&unique.events(), &expected)?;
    }
}
