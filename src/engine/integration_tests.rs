// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::{LocalDispatcher, RemoteDispatcher, RemoteWait, UnitRegistry, WorkerPool};
use crate::engine::{ExecutorSettings, InvocationId, Runtime, SessionState};
use crate::errors::{ExecutionError, RetrievalError, StructuralError, UnitError};
use crate::graph::Graph;
use crate::units::{FunctionUnit, Route, RouterUnit};

/// Integration tests running whole graphs through the runtime
#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Request {
        subject: String,
        priority: u8,
    }

    /// intake (fan-out) -> triage (router) -> {urgent, routine} -> report (join)
    fn triage_graph() -> Graph {
        let mut graph = Graph::new(
            "triage",
            FunctionUnit::fan_out("intake", |text: String| async move {
                text.lines()
                    .map(|line| {
                        let (subject, priority) = line
                            .split_once('|')
                            .ok_or_else(|| UnitError::failed(format!("malformed line '{}'", line)))?;
                        let priority = priority.trim().parse::<u8>().map_err(UnitError::failed)?;
                        Ok(Request {
                            subject: subject.trim().to_string(),
                            priority,
                        })
                    })
                    .collect::<Result<Vec<_>, UnitError>>()
            }),
        );
        graph
            .add_node(RouterUnit::new("triage", |request: Request| {
                if request.priority >= 3 {
                    Route::to("urgent")
                } else {
                    Route::to("routine")
                }
            }))
            .unwrap();
        graph
            .add_node(FunctionUnit::step("urgent", |r: Request| async move {
                Ok(format!("URGENT: {}", r.subject))
            }))
            .unwrap();
        graph
            .add_node(FunctionUnit::step("routine", |r: Request| async move {
                Ok(format!("routine: {}", r.subject))
            }))
            .unwrap();
        graph
            .add_node(FunctionUnit::reduce("report", |lines: Vec<String>| async move {
                Ok(lines.join("; "))
            }))
            .unwrap();

        graph.add_edge("intake", "triage").unwrap();
        graph.route("triage", ["urgent", "routine"]).unwrap();
        graph.add_edge("urgent", "report").unwrap();
        graph.add_edge("routine", "report").unwrap();
        graph
    }

    const TICKETS: &str = "disk full|5\nprinter jam|1\nserver down|4";

    fn settings(max_concurrency: usize) -> ExecutorSettings {
        ExecutorSettings {
            max_concurrency,
            retry_attempts: 0,
        }
    }

    fn counted_step(name: &str, counter: Arc<AtomicUsize>) -> FunctionUnit {
        FunctionUnit::step(name, move |x: i64| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(x)
            }
        })
    }

    #[tokio::test]
    async fn test_router_selects_candidates_per_input() {
        let runtime = Runtime::local(triage_graph()).unwrap();
        let id = runtime.run(TICKETS, true).await;

        assert_eq!(runtime.status(id).await.unwrap(), SessionState::Completed);
        let urgent: Vec<String> = runtime.output_as(id, "urgent").await.unwrap();
        assert_eq!(urgent, vec!["URGENT: disk full", "URGENT: server down"]);
        let routine: Vec<String> = runtime.output_as(id, "routine").await.unwrap();
        assert_eq!(routine, vec!["routine: printer jam"]);

        let routes: Vec<Route> = runtime.output_as(id, "triage").await.unwrap();
        assert_eq!(routes, vec![Route::to("urgent"), Route::to("routine"), Route::to("urgent")]);

        let report: Vec<String> = runtime.output_as(id, "report").await.unwrap();
        assert_eq!(report, vec!["URGENT: disk full; URGENT: server down; routine: printer jam"]);
    }

    #[tokio::test]
    async fn test_unselected_candidate_is_pruned_and_join_still_runs() {
        let runtime = Runtime::local(triage_graph()).unwrap();
        let id = runtime.run("printer jam|1\nmouse broken|2", true).await;

        assert_eq!(runtime.status(id).await.unwrap(), SessionState::Completed);
        assert!(runtime.output(id, "urgent").await.unwrap().is_empty());

        let session = runtime.session(id).await.unwrap();
        assert_eq!(session.pruned(), ["urgent".to_string()]);
        assert!(!session.has_output("urgent"));

        let report: Vec<String> = runtime.output_as(id, "report").await.unwrap();
        assert_eq!(report, vec!["routine: printer jam; routine: mouse broken"]);
    }

    #[tokio::test]
    async fn test_halt_prunes_every_candidate() {
        let mut graph = Graph::new("halting", FunctionUnit::step("a", |x: i64| async move { Ok(x) }));
        graph.add_node(RouterUnit::new("gate", |_: i64| Route::halt())).unwrap();
        graph.add_node(FunctionUnit::step("c", |x: i64| async move { Ok(x) })).unwrap();
        graph.add_node(FunctionUnit::step("d", |x: i64| async move { Ok(x) })).unwrap();
        graph.add_node(FunctionUnit::step("after_c", |x: i64| async move { Ok(x) })).unwrap();
        graph.add_edge("a", "gate").unwrap();
        graph.route("gate", ["c", "d"]).unwrap();
        graph.add_edge("c", "after_c").unwrap();

        let runtime = Runtime::local(graph).unwrap();
        let id = runtime.run(1, true).await;

        assert_eq!(runtime.status(id).await.unwrap(), SessionState::Completed);
        let session = runtime.session(id).await.unwrap();
        assert_eq!(session.committed(), ["a".to_string(), "gate".to_string()]);
        assert_eq!(session.pruned().len(), 3);
        assert!(runtime.output(id, "after_c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fan_out_maps_each_instance_and_reduce_runs_once() {
        let mapped = Arc::new(AtomicUsize::new(0));
        let reduced = Arc::new(AtomicUsize::new(0));

        let mut graph = Graph::new(
            "fan",
            FunctionUnit::fan_out("split", |n: i64| async move { Ok((1..=n).collect::<Vec<i64>>()) }),
        );
        graph.add_node(counted_step("square_source", Arc::clone(&mapped))).unwrap();
        let reduced_in = Arc::clone(&reduced);
        graph
            .add_node(FunctionUnit::reduce("total", move |xs: Vec<i64>| {
                let reduced = Arc::clone(&reduced_in);
                async move {
                    reduced.fetch_add(1, Ordering::SeqCst);
                    Ok(xs.iter().map(|x| x * x).sum::<i64>())
                }
            }))
            .unwrap();
        graph.add_edge("split", "square_source").unwrap();
        graph.add_edge("square_source", "total").unwrap();

        let runtime = Runtime::local(graph).unwrap();
        let id = runtime.run(3, true).await;

        assert_eq!(runtime.output(id, "split").await.unwrap(), vec![json!(1), json!(2), json!(3)]);
        assert_eq!(runtime.output(id, "square_source").await.unwrap().len(), 3);
        assert_eq!(runtime.output(id, "total").await.unwrap(), vec![json!(14)]);
        assert_eq!(mapped.load(Ordering::SeqCst), 3);
        assert_eq!(reduced.load(Ordering::SeqCst), 1);

        let session = runtime.session(id).await.unwrap();
        let record = session.records().iter().find(|r| r.node == "square_source").unwrap();
        assert_eq!((record.calls, record.outputs), (3, 3));
    }

    #[tokio::test]
    async fn test_empty_fan_out_still_reduces_once() {
        let mut graph = Graph::new(
            "empty",
            FunctionUnit::fan_out("split", |_: i64| async move { Ok(Vec::<i64>::new()) }),
        );
        graph.add_node(FunctionUnit::step("each", |x: i64| async move { Ok(x) })).unwrap();
        graph
            .add_node(FunctionUnit::reduce("count", |xs: Vec<i64>| async move { Ok(xs.len()) }))
            .unwrap();
        graph.add_edge("split", "each").unwrap();
        graph.add_edge("each", "count").unwrap();

        let runtime = Runtime::local(graph).unwrap();
        let id = runtime.run(0, true).await;

        assert_eq!(runtime.status(id).await.unwrap(), SessionState::Completed);
        let session = runtime.session(id).await.unwrap();
        assert!(session.has_output("each"));
        assert!(session.outputs("each").is_empty());
        assert_eq!(session.outputs("count"), [json!(0)]);
    }

    #[tokio::test]
    async fn test_failing_node_fails_invocation() {
        let downstream = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new(
            "failing",
            FunctionUnit::step("a", |_: i64| async move { Err::<i64, _>(UnitError::failed("disk on fire")) }),
        );
        graph.add_node(counted_step("b", Arc::clone(&downstream))).unwrap();
        graph.add_edge("a", "b").unwrap();

        let runtime = Runtime::local(graph).unwrap();
        let id = runtime.run(1, true).await;

        let expected = ExecutionError::UnitExecution {
            node: "a".into(),
            source: UnitError::failed("disk on fire"),
        };
        assert_eq!(runtime.status(id).await.unwrap(), SessionState::Failed(expected.clone()));
        assert_eq!(runtime.error(id).await.unwrap(), Some(expected));
        assert!(runtime.output(id, "a").await.unwrap().is_empty());
        assert!(runtime.output(id, "b").await.unwrap().is_empty());
        assert_eq!(downstream.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_branch_keeps_sibling_outputs() {
        let mut graph = Graph::new("siblings", FunctionUnit::step("a", |x: i64| async move { Ok(x) }));
        graph
            .add_node(FunctionUnit::step("bad", |_: i64| async move {
                Err::<i64, _>(UnitError::failed("codec crashed"))
            }))
            .unwrap();
        graph
            .add_node(FunctionUnit::step("slow", |x: i64| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(x + 2)
            }))
            .unwrap();
        graph.add_edge("a", "bad").unwrap();
        graph.add_edge("a", "slow").unwrap();

        let runtime = Runtime::new(graph, Arc::new(LocalDispatcher), settings(2)).unwrap();
        let id = runtime.run(1, true).await;

        assert_eq!(
            runtime.status(id).await.unwrap(),
            SessionState::Failed(ExecutionError::UnitExecution {
                node: "bad".into(),
                source: UnitError::failed("codec crashed"),
            })
        );
        assert_eq!(runtime.output(id, "a").await.unwrap(), vec![json!(1)]);
        assert!(runtime.output(id, "bad").await.unwrap().is_empty());
        assert_eq!(runtime.output(id, "slow").await.unwrap(), vec![json!(3)]);
    }

    #[tokio::test]
    async fn test_join_binds_in_edge_order_regardless_of_finish_order() {
        let mut graph = Graph::new("join", FunctionUnit::step("a", |s: String| async move { Ok(s) }));
        graph
            .add_node(FunctionUnit::step("slow", |s: String| async move {
                tokio::time::sleep(Duration::from_millis(40)).await;
                Ok(format!("slow-{}", s))
            }))
            .unwrap();
        graph
            .add_node(FunctionUnit::step("fast", |s: String| async move { Ok(format!("fast-{}", s)) }))
            .unwrap();
        graph
            .add_node(FunctionUnit::reduce("d", |parts: Vec<String>| async move { Ok(parts) }))
            .unwrap();
        graph.add_edge("a", "slow").unwrap();
        graph.add_edge("a", "fast").unwrap();
        graph.add_edge("slow", "d").unwrap();
        graph.add_edge("fast", "d").unwrap();

        let runtime = Runtime::new(graph, Arc::new(LocalDispatcher), settings(4)).unwrap();
        let id = runtime.run("x", true).await;

        let session = runtime.session(id).await.unwrap();
        assert_eq!(session.outputs("d"), [json!(["slow-x", "fast-x"])]);
        let committed = session.committed();
        let position = |n: &str| committed.iter().position(|c| c == n).unwrap();
        assert!(position("fast") < position("slow"));
        assert!(position("slow") < position("d"));
    }

    #[tokio::test]
    async fn test_router_selecting_outside_candidates_is_ambiguous() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new("ambiguous", FunctionUnit::step("a", |x: i64| async move { Ok(x) }));
        graph.add_node(RouterUnit::new("r", |_: i64| Route::to_all(["c", "nowhere"]))).unwrap();
        graph.add_node(counted_step("c", Arc::clone(&ran))).unwrap();
        graph.add_node(counted_step("d", Arc::clone(&ran))).unwrap();
        graph.add_edge("a", "r").unwrap();
        graph.route("r", ["c", "d"]).unwrap();

        let runtime = Runtime::local(graph).unwrap();
        let id = runtime.run(5, true).await;

        assert_eq!(
            runtime.error(id).await.unwrap(),
            Some(ExecutionError::RouterAmbiguity {
                router: "r".into(),
                selected: "nowhere".into(),
                candidates: vec!["c".into(), "d".into()],
            })
        );
        assert!(runtime.output(id, "r").await.unwrap().is_empty());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_type_mismatch_fails_before_node_runs() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new(
            "mismatch",
            FunctionUnit::step("loose", |_: Value| async move { Ok(json!("not a number")) }),
        );
        graph.add_node(counted_step("strict", Arc::clone(&ran))).unwrap();
        graph.add_edge("loose", "strict").unwrap();

        let runtime = Runtime::local(graph).unwrap();
        let id = runtime.run(json!({}), true).await;

        match runtime.error(id).await.unwrap() {
            Some(ExecutionError::TypeMismatch { node, .. }) => assert_eq!(node, "strict"),
            other => panic!("expected a type mismatch, got {:?}", other),
        }
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(runtime.output(id, "loose").await.unwrap(), vec![json!("not a number")]);
    }

    #[tokio::test]
    async fn test_unencodable_input_fails_at_start() {
        let ran = Arc::new(AtomicUsize::new(0));
        let graph = Graph::new("start", counted_step("a", Arc::clone(&ran)));
        let runtime = Runtime::local(graph).unwrap();

        let input: HashMap<(i32, i32), i32> = HashMap::from([((1, 2), 3)]);
        let id = runtime.run(input, true).await;

        assert!(matches!(
            runtime.error(id).await.unwrap(),
            Some(ExecutionError::TypeMismatch { ref node, .. }) if node == "a"
        ));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retrieval_errors() {
        let runtime = Runtime::local(triage_graph()).unwrap();
        let id = runtime.run(TICKETS, true).await;

        let unknown = InvocationId::new();
        assert_eq!(
            runtime.output(unknown, "report").await.unwrap_err(),
            RetrievalError::UnknownInvocation(unknown)
        );
        assert_eq!(
            runtime.output(id, "nope").await.unwrap_err(),
            RetrievalError::UnknownNode {
                graph: "triage".into(),
                node: "nope".into(),
            }
        );
        assert!(matches!(
            runtime.output_as::<i64>(id, "report").await.unwrap_err(),
            RetrievalError::Decode { index: 0, .. }
        ));
        assert!(runtime.status(unknown).await.is_err());
    }

    #[tokio::test]
    async fn test_structural_errors_are_reported_together() {
        let mut graph = Graph::new("broken", FunctionUnit::step("a", |x: i64| async move { Ok(x) }));
        graph.add_node(RouterUnit::new("r", |_: i64| Route::halt())).unwrap();
        graph.add_node(FunctionUnit::step("island", |x: i64| async move { Ok(x) })).unwrap();
        graph.add_edge("a", "r").unwrap();

        let failure = Runtime::local(graph).err().unwrap();
        assert_eq!(failure.graph, "broken");
        assert!(failure
            .errors
            .contains(&StructuralError::EmptyCandidateSet { router: "r".into() }));
        assert!(failure
            .errors
            .contains(&StructuralError::Orphaned { node: "island".into() }));
    }

    #[tokio::test]
    async fn test_structural_errors_at_construction() {
        let mut graph = Graph::new("g", FunctionUnit::step("a", |x: i64| async move { Ok(x) }));
        graph.add_node(FunctionUnit::step("b", |x: i64| async move { Ok(x) })).unwrap();

        assert_eq!(
            graph.add_node(FunctionUnit::step("b", |x: i64| async move { Ok(x) })),
            Err(StructuralError::DuplicateNode { node: "b".into() })
        );
        assert!(matches!(
            graph.add_edge("a", "missing"),
            Err(StructuralError::UnknownNode { .. })
        ));
        graph.add_edge("a", "b").unwrap();
        assert!(matches!(
            graph.add_edge("b", "a"),
            Err(StructuralError::EdgeIntoStart { .. })
        ));
        assert!(matches!(
            graph.route("b", ["a"]),
            Err(StructuralError::NotARouter { .. })
        ));
        assert!(matches!(
            graph.add_edge("a", "b"),
            Err(StructuralError::DuplicateEdge { .. })
        ));

        graph.add_node(FunctionUnit::step("c", |x: i64| async move { Ok(x) })).unwrap();
        graph.add_edge("b", "c").unwrap();
        assert!(matches!(
            graph.add_edge("c", "b"),
            Err(StructuralError::CyclicDependency { .. })
        ));
        assert!(graph.validate().is_ok());
    }

    async fn remote_runtime(wait: RemoteWait) -> Runtime {
        let graph = triage_graph();
        let pool = Arc::new(WorkerPool::start(UnitRegistry::from_graph(&graph), 2));
        let dispatcher = RemoteDispatcher::new(pool, wait).with_timeout(Duration::from_secs(5));
        Runtime::new(graph, Arc::new(dispatcher), settings(2)).unwrap()
    }

    #[tokio::test]
    async fn test_remote_dispatch_matches_local_outputs() {
        let local = Runtime::local(triage_graph()).unwrap();
        let local_id = local.run(TICKETS, true).await;

        for wait in [RemoteWait::Block, RemoteWait::Poll(Duration::from_millis(2))] {
            let remote = remote_runtime(wait).await;
            let remote_id = remote.run(TICKETS, true).await;
            assert_eq!(remote.status(remote_id).await.unwrap(), SessionState::Completed);

            for node in ["intake", "triage", "urgent", "routine", "report"] {
                assert_eq!(
                    remote.output(remote_id, node).await.unwrap(),
                    local.output(local_id, node).await.unwrap(),
                    "node {} differs under {:?}",
                    node,
                    wait
                );
            }
        }
    }

    #[tokio::test]
    async fn test_non_blocking_run_then_wait() {
        let mut graph = Graph::new(
            "slow",
            FunctionUnit::step("nap", |x: i64| async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(x + 1)
            }),
        );
        graph.add_node(FunctionUnit::step("double", |x: i64| async move { Ok(x * 2) })).unwrap();
        graph.add_edge("nap", "double").unwrap();

        let runtime = Runtime::local(graph).unwrap();
        let id = runtime.run(1, false).await;

        let early = runtime.status(id).await.unwrap();
        assert!(matches!(early, SessionState::Pending | SessionState::Running));
        assert!(runtime.output(id, "double").await.unwrap().is_empty());

        assert_eq!(runtime.wait(id).await.unwrap(), SessionState::Completed);
        assert_eq!(runtime.output(id, "double").await.unwrap(), vec![json!(4)]);
        assert!(runtime.invocations().await.contains(&id));
    }

    #[tokio::test]
    async fn test_cancel_drains_in_flight_and_stops_dispatch() {
        let after = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new(
            "cancel",
            FunctionUnit::step("long", |x: i64| async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok(x)
            }),
        );
        graph.add_node(counted_step("after", Arc::clone(&after))).unwrap();
        graph.add_edge("long", "after").unwrap();

        let runtime = Runtime::local(graph).unwrap();
        let id = runtime.run(9, false).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(runtime.cancel(id).await.unwrap());
        assert_eq!(
            runtime.wait(id).await.unwrap(),
            SessionState::Failed(ExecutionError::Cancelled)
        );
        assert_eq!(runtime.output(id, "long").await.unwrap(), vec![json!(9)]);
        assert!(runtime.output(id, "after").await.unwrap().is_empty());
        assert_eq!(after.load(Ordering::SeqCst), 0);
        assert!(!runtime.cancel(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_accepted_cancel_always_fails_invocation() {
        let mut graph = Graph::new("quick", FunctionUnit::step("a", |x: i64| async move { Ok(x) }));
        graph.add_node(FunctionUnit::step("b", |x: i64| async move { Ok(x + 1) })).unwrap();
        graph.add_edge("a", "b").unwrap();
        let runtime = Runtime::local(graph).unwrap();

        for round in 0..200u64 {
            let id = runtime.run(1, false).await;
            for _ in 0..(round % 4) {
                tokio::task::yield_now().await;
            }
            let accepted = runtime.cancel(id).await.unwrap();
            let state = runtime.wait(id).await.unwrap();
            if accepted {
                assert_eq!(state, SessionState::Failed(ExecutionError::Cancelled));
            } else {
                assert_eq!(state, SessionState::Completed);
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = Arc::clone(&calls);
        let graph = Graph::new(
            "flaky",
            FunctionUnit::step("flaky", move |x: i64| {
                let calls = Arc::clone(&calls_in);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(UnitError::failed("transient"))
                    } else {
                        Ok(x)
                    }
                }
            }),
        );

        let settings = ExecutorSettings {
            max_concurrency: 1,
            retry_attempts: 2,
        };
        let runtime = Runtime::new(graph, Arc::new(LocalDispatcher), settings).unwrap();
        let id = runtime.run(7, true).await;

        assert_eq!(runtime.status(id).await.unwrap(), SessionState::Completed);
        assert_eq!(runtime.output(id, "flaky").await.unwrap(), vec![json!(7)]);
        let session = runtime.session(id).await.unwrap();
        assert_eq!(session.records()[0].attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_slot_runs_in_rank_then_registration_order() {
        let mut graph = Graph::new("order", FunctionUnit::step("root", |x: i64| async move { Ok(x) }));
        for name in ["late", "early", "deep"] {
            graph.add_node(FunctionUnit::step(name, |x: i64| async move { Ok(x) })).unwrap();
        }
        graph.add_edge("root", "early").unwrap();
        graph.add_edge("root", "late").unwrap();
        graph.add_edge("early", "deep").unwrap();

        let runtime = Runtime::new(graph, Arc::new(LocalDispatcher), settings(1)).unwrap();
        let id = runtime.run(0, true).await;

        let session = runtime.session(id).await.unwrap();
        assert_eq!(session.committed(), ["root", "late", "early", "deep"].map(String::from));
    }
}
