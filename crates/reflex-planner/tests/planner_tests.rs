#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use reflex_core::*;
    use reflex_planner::*;
    use reflex_transaction::*;

    // ── Test fixtures ──────────────────────────────────────────

    #[derive(Default)]
    struct Seen {
        observations: Vec<Observation>,
        requests: Vec<Goal>,
        recalls: Vec<GoalId>,
    }

    /// Owns or observes timelines, records everything delivered to it, and
    /// publishes queued observations one per synchronization.
    struct Recorder {
        name: &'static str,
        decls: Vec<TimelineDeclaration>,
        feed: Arc<Mutex<Vec<Observation>>>,
        seen: Arc<Mutex<Seen>>,
    }

    impl Recorder {
        #[allow(clippy::type_complexity)]
        fn new(
            name: &'static str,
            decls: Vec<TimelineDeclaration>,
        ) -> (Self, Arc<Mutex<Seen>>, Arc<Mutex<Vec<Observation>>>) {
            let seen = Arc::new(Mutex::new(Seen::default()));
            let feed = Arc::new(Mutex::new(Vec::new()));
            let reactor = Recorder {
                name,
                decls,
                feed: Arc::clone(&feed),
                seen: Arc::clone(&seen),
            };
            (reactor, seen, feed)
        }
    }

    impl Reactor for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn declarations(&self) -> Vec<TimelineDeclaration> {
            self.decls.clone()
        }

        fn synchronize(&mut self, ctx: &mut TransactionContext<'_>) -> bool {
            let next = {
                let mut feed = self.feed.lock().unwrap();
                if feed.is_empty() { None } else { Some(feed.remove(0)) }
            };
            if let Some(obs) = next {
                ctx.post_observation(obs).unwrap();
            }
            true
        }

        fn notify(&mut self, _ctx: &mut TransactionContext<'_>, obs: Observation) {
            self.seen.lock().unwrap().observations.push(obs);
        }

        fn handle_request(&mut self, _ctx: &mut TransactionContext<'_>, goal: Goal) {
            self.seen.lock().unwrap().requests.push(goal);
        }

        fn handle_recall(&mut self, _ctx: &mut TransactionContext<'_>, id: GoalId) {
            self.seen.lock().unwrap().recalls.push(id);
        }
    }

    /// Archiver that records snapshot labels in order.
    #[derive(Clone, Default)]
    struct LabelArchiver {
        labels: Arc<Mutex<Vec<String>>>,
    }

    impl PlanArchiver for LabelArchiver {
        fn archive(&mut self, _reactor: &str, label: &str, _snapshot: &PlanSnapshot) {
            self.labels.lock().unwrap().push(label.to_string());
        }
    }

    /// A deliberative reactor owning "nav" with two declared predicates.
    fn nav_reactor(planner: MockPlanner) -> DeliberativeReactor<MockPlanner> {
        DeliberativeReactor::new("nav", planner)
            .with_declaration(TimelineDeclaration::internal("nav"))
            .with_predicate("nav", "Goto", [Variable::new("speed", Domain::int(0, 10))])
            .with_predicate("nav", "Idle", [])
    }

    /// A deliberative reactor planning over the external "antenna" timeline.
    fn antenna_client(planner: MockPlanner) -> DeliberativeReactor<MockPlanner> {
        DeliberativeReactor::new("mission", planner)
            .with_declaration(TimelineDeclaration::external("antenna"))
            .with_predicate("antenna", "TrackTarget", [])
    }

    fn attach(graph: &mut TransactionGraph, reactor: impl Reactor + 'static) -> ReactorId {
        let id = graph.attach(Box::new(reactor)).unwrap();
        graph.run_init(id).unwrap().unwrap();
        id
    }

    /// One full tick: tick starts in order, then deliver and synchronize
    /// per reactor. Panics if any reactor fails to synchronize.
    fn run_tick(graph: &mut TransactionGraph, order: &[ReactorId]) -> Tick {
        let tick = graph.advance_tick();
        for id in order {
            graph.run_tick_start(*id).unwrap();
        }
        for id in order {
            graph.deliver_pending(*id).unwrap();
            assert!(graph.run_synchronize(*id).unwrap());
        }
        tick
    }

    /// Round-robin deliberation until the reactor reports no work.
    fn run_deliberation(graph: &mut TransactionGraph, id: ReactorId) -> usize {
        let mut steps = 0;
        while graph.run_has_work(id).unwrap() {
            graph.run_resume(id).unwrap().unwrap();
            steps += 1;
            assert!(steps < 100, "deliberation did not converge");
        }
        steps
    }

    // ── Admission tests ────────────────────────────────────────

    #[test]
    fn test_request_admitted_into_ledger() {
        let mut graph = TransactionGraph::new(Some(100));
        let nav = attach(&mut graph, nav_reactor(MockPlanner::new()));
        graph.advance_tick();
        graph.run_tick_start(nav).unwrap();

        let goal = Goal::new("nav", "Goto").with_attribute("speed", Domain::int(2, 4));
        let gid = graph.submit_goal(goal).unwrap();
        graph.deliver_pending(nav).unwrap();

        let ledgers = graph.ledgers(nav).unwrap();
        assert_eq!(ledgers.active_requests.len(), 1);
        assert!(ledgers.active_requests.find_by_external(gid).is_some());
    }

    #[test]
    fn test_request_unknown_predicate_ignored() {
        let mut graph = TransactionGraph::new(Some(100));
        let nav = attach(&mut graph, nav_reactor(MockPlanner::new()));
        graph.advance_tick();

        graph.submit_goal(Goal::new("nav", "Warp")).unwrap();
        graph.deliver_pending(nav).unwrap();

        assert!(graph.ledgers(nav).unwrap().active_requests.is_empty());
    }

    #[test]
    fn test_request_conflicting_attributes_rejected() {
        let mut graph = TransactionGraph::new(Some(100));
        let nav = attach(&mut graph, nav_reactor(MockPlanner::new()));
        graph.advance_tick();

        let goal = Goal::new("nav", "Goto").with_attribute("speed", Domain::int(20, 30));
        graph.submit_goal(goal).unwrap();
        graph.deliver_pending(nav).unwrap();

        assert!(graph.ledgers(nav).unwrap().active_requests.is_empty());
    }

    #[test]
    fn test_recall_releases_admitted_request() {
        let mut graph = TransactionGraph::new(Some(100));
        let nav = attach(&mut graph, nav_reactor(MockPlanner::new()));
        graph.advance_tick();

        let gid = graph.submit_goal(Goal::new("nav", "Goto")).unwrap();
        graph.deliver_pending(nav).unwrap();
        assert_eq!(graph.ledgers(nav).unwrap().active_requests.len(), 1);

        graph.submit_recall(gid);
        graph.deliver_pending(nav).unwrap();
        assert!(graph.ledgers(nav).unwrap().active_requests.is_empty());
    }

    #[test]
    fn test_past_request_discarded_at_tick_start() {
        let mut graph = TransactionGraph::new(Some(100));
        let nav = attach(&mut graph, nav_reactor(MockPlanner::new()));
        graph.advance_tick();

        let scope = TemporalScope::new(
            TickInterval::singleton(1),
            TickInterval::singleton(1),
            TickInterval::singleton(2),
        );
        graph
            .submit_goal(Goal::new("nav", "Goto").with_scope(scope))
            .unwrap();
        graph.deliver_pending(nav).unwrap();
        assert_eq!(graph.ledgers(nav).unwrap().active_requests.len(), 1);

        // Still live at tick 2; its end bound has not passed yet.
        graph.advance_tick();
        graph.run_tick_start(nav).unwrap();
        assert_eq!(graph.ledgers(nav).unwrap().active_requests.len(), 1);

        graph.advance_tick();
        graph.run_tick_start(nav).unwrap();
        assert!(graph.ledgers(nav).unwrap().active_requests.is_empty());
    }

    // ── State publishing tests ─────────────────────────────────

    #[test]
    fn test_state_update_published_to_observers() {
        let mut graph = TransactionGraph::new(Some(100));
        let nav = attach(&mut graph, nav_reactor(MockPlanner::new().with_current("nav", "Idle")));
        let (recorder, seen, _) =
            Recorder::new("display", vec![TimelineDeclaration::observe("nav")]);
        let display = attach(&mut graph, recorder);

        run_tick(&mut graph, &[nav, display]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.observations.len(), 1);
        assert_eq!(seen.observations[0].timeline, "nav");
        assert_eq!(seen.observations[0].predicate, "Idle");
    }

    // ── Dispatch tests ─────────────────────────────────────────

    #[test]
    fn test_completed_plan_dispatches_goal() {
        let mut graph = TransactionGraph::new(None);
        let planner = MockPlanner::new().with_subgoal(
            "antenna",
            "TrackTarget",
            TickInterval::bounded(1, 10),
        );
        let (owner, seen, _) =
            Recorder::new("exec", vec![TimelineDeclaration::internal("antenna")]);
        let exec = attach(&mut graph, owner);
        let mission = attach(&mut graph, antenna_client(planner));

        run_tick(&mut graph, &[exec, mission]);
        assert_eq!(run_deliberation(&mut graph, mission), 1);
        assert!(graph.ledgers(mission).unwrap().dispatched.is_empty());

        // The round completed, so the next tick start dispatches.
        run_tick(&mut graph, &[exec, mission]);
        let dispatched = &graph.ledgers(mission).unwrap().dispatched;
        assert_eq!(dispatched.len(), 1);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.requests.len(), 1);
        assert_eq!(seen.requests[0].timeline, "antenna");
        assert_eq!(seen.requests[0].predicate, "TrackTarget");
        assert!(
            dispatched.find_by_external(seen.requests[0].id).is_some(),
            "ledger entry pairs the dispatched goal id"
        );
    }

    #[test]
    fn test_dispatch_not_repeated_for_same_token() {
        let mut graph = TransactionGraph::new(None);
        let planner = MockPlanner::new().with_subgoal(
            "antenna",
            "TrackTarget",
            TickInterval::bounded(1, 10),
        );
        let (owner, seen, _) =
            Recorder::new("exec", vec![TimelineDeclaration::internal("antenna")]);
        let exec = attach(&mut graph, owner);
        let mission = attach(&mut graph, antenna_client(planner));

        for _ in 0..4 {
            run_tick(&mut graph, &[exec, mission]);
            run_deliberation(&mut graph, mission);
        }

        assert_eq!(graph.ledgers(mission).unwrap().dispatched.len(), 1);
        assert_eq!(seen.lock().unwrap().requests.len(), 1);
    }

    #[test]
    fn test_dispatch_waits_for_window() {
        let mut graph = TransactionGraph::new(None);
        let planner = MockPlanner::new().with_subgoal(
            "antenna",
            "TrackTarget",
            TickInterval::bounded(5, 8),
        );
        let (owner, _, _) =
            Recorder::new("exec", vec![TimelineDeclaration::internal("antenna")]);
        let exec = attach(&mut graph, owner);
        let mission = attach(&mut graph, antenna_client(planner));

        // Lookahead 1: the window reaches tick 5 one tick early.
        for expect_empty in [true, true, true, false] {
            run_tick(&mut graph, &[exec, mission]);
            run_deliberation(&mut graph, mission);
            assert_eq!(
                graph.ledgers(mission).unwrap().dispatched.is_empty(),
                expect_empty
            );
        }
    }

    #[test]
    fn test_merge_confirmed_goal_released() {
        let mut graph = TransactionGraph::new(None);
        let planner = MockPlanner::new()
            .with_subgoal("antenna", "TrackTarget", TickInterval::bounded(1, 10))
            .with_merge_current("antenna");
        let (owner, _, feed) =
            Recorder::new("exec", vec![TimelineDeclaration::internal("antenna")]);
        let exec = attach(&mut graph, owner);
        let mission = attach(&mut graph, antenna_client(planner));

        run_tick(&mut graph, &[exec, mission]);
        run_deliberation(&mut graph, mission);

        // The owner confirms the goal by publishing the matching state.
        feed.lock()
            .unwrap()
            .push(Observation::new("antenna", "TrackTarget"));
        run_tick(&mut graph, &[exec, mission]);
        assert_eq!(graph.ledgers(mission).unwrap().dispatched.len(), 1);
        run_deliberation(&mut graph, mission);

        // Confirmed goals stop being tracked at the next tick start.
        run_tick(&mut graph, &[exec, mission]);
        assert!(graph.ledgers(mission).unwrap().dispatched.is_empty());
    }

    // ── Recovery tests ─────────────────────────────────────────

    #[test]
    fn test_sync_failure_recovers_with_scoped_relax() {
        let mut graph = TransactionGraph::new(Some(100));
        let planner = MockPlanner::new().with_sync_failures(1);
        let calls = planner.recorded_calls();
        let nav = attach(&mut graph, nav_reactor(planner));

        graph.advance_tick();
        graph.run_tick_start(nav).unwrap();
        assert_eq!(graph.run_synchronize(nav), Some(true));

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                BackendCall::Synchronize { now: 1 },
                BackendCall::Relax { forget_past: false },
                BackendCall::Synchronize { now: 1 },
                BackendCall::Propagate,
            ]
        );
    }

    #[test]
    fn test_full_relax_recalls_dropped_goals() {
        let mut graph = TransactionGraph::new(None);
        let planner = MockPlanner::new()
            .with_subgoal("antenna", "TrackTarget", TickInterval::bounded(1, 10))
            .with_sync_result(true)
            .with_sync_result(true)
            .with_sync_failures(2);
        let calls = planner.recorded_calls();
        let (owner, seen, _) =
            Recorder::new("exec", vec![TimelineDeclaration::internal("antenna")]);
        let exec = attach(&mut graph, owner);
        let mission = attach(&mut graph, antenna_client(planner));

        run_tick(&mut graph, &[exec, mission]);
        run_deliberation(&mut graph, mission);
        run_tick(&mut graph, &[exec, mission]);
        assert_eq!(graph.ledgers(mission).unwrap().dispatched.len(), 1);
        run_deliberation(&mut graph, mission);

        // Tick 3: synchronization fails, the scoped relax fails to help,
        // and forgetting the past drops the dispatched goal token.
        graph.advance_tick();
        graph.run_tick_start(exec).unwrap();
        graph.run_tick_start(mission).unwrap();
        graph.deliver_pending(mission).unwrap();
        assert_eq!(graph.run_synchronize(mission), Some(true));

        assert!(graph.ledgers(mission).unwrap().dispatched.is_empty());
        {
            let calls = calls.lock().unwrap();
            assert!(calls.contains(&BackendCall::Relax { forget_past: false }));
            assert!(calls.contains(&BackendCall::Relax { forget_past: true }));
        }

        // The recall reaches the owner of the timeline.
        graph.deliver_pending(exec).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.recalls.len(), 1);
        assert_eq!(seen.recalls[0], seen.requests[0].id);
    }

    #[test]
    fn test_sync_unrecoverable_returns_false() {
        let mut graph = TransactionGraph::new(Some(100));
        let planner = MockPlanner::new().with_sync_failures(3);
        let nav = attach(&mut graph, nav_reactor(planner));

        graph.advance_tick();
        graph.run_tick_start(nav).unwrap();
        assert_eq!(graph.run_synchronize(nav), Some(false));
    }

    // ── Deliberation tests ─────────────────────────────────────

    #[test]
    fn test_deliberation_steps_to_completion() {
        let mut graph = TransactionGraph::new(Some(100));
        let planner = MockPlanner::new().with_flaws(2);
        let calls = planner.recorded_calls();
        let nav = attach(&mut graph, nav_reactor(planner));

        run_tick(&mut graph, &[nav]);
        assert_eq!(run_deliberation(&mut graph, nav), 2);

        let calls = calls.lock().unwrap();
        let steps = calls
            .iter()
            .filter(|c| matches!(c, BackendCall::Step { .. }))
            .count();
        assert_eq!(steps, 2);
        assert_eq!(calls.last(), Some(&BackendCall::Clear));
    }

    #[test]
    fn test_deliberation_failure_relaxes_without_resync() {
        let mut graph = TransactionGraph::new(Some(100));
        let planner = MockPlanner::new()
            .with_status(SolverStatus::Working)
            .with_step_status(SolverStatus::Inconsistent);
        let calls = planner.recorded_calls();
        let nav = attach(&mut graph, nav_reactor(planner));

        run_tick(&mut graph, &[nav]);
        assert_eq!(graph.run_has_work(nav), Some(true));
        assert_eq!(graph.run_resume(nav), Some(Ok(())));

        // The scoped relax recovered, so the destructive one never runs,
        // and no re-synchronization happens until the next tick.
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                BackendCall::Synchronize { now: 1 },
                BackendCall::Propagate,
                BackendCall::Propagate,
                BackendCall::Step { now: 1 },
                BackendCall::Relax { forget_past: false },
            ]
        );
    }

    #[test]
    fn test_deliberation_unrecoverable_after_failed_relaxes() {
        let mut graph = TransactionGraph::new(Some(100));
        let planner = MockPlanner::new()
            .with_status(SolverStatus::Working)
            .with_step_status(SolverStatus::Inconsistent)
            .with_relax_failures(2);
        let calls = planner.recorded_calls();
        let nav = attach(&mut graph, nav_reactor(planner));

        run_tick(&mut graph, &[nav]);
        assert_eq!(graph.run_has_work(nav), Some(true));
        assert_eq!(
            graph.run_resume(nav),
            Some(Err(DeliberationError::Unrecoverable))
        );

        let calls = calls.lock().unwrap();
        assert!(calls.contains(&BackendCall::Relax { forget_past: false }));
        assert!(calls.contains(&BackendCall::Relax { forget_past: true }));
    }

    #[test]
    fn test_propagate_failure_skips_step_and_relaxes() {
        let mut graph = TransactionGraph::new(Some(100));
        let planner = MockPlanner::new()
            .with_status(SolverStatus::Working)
            .with_propagate_failures(1);
        let calls = planner.recorded_calls();
        let nav = attach(&mut graph, nav_reactor(planner));

        graph.advance_tick();
        graph.run_tick_start(nav).unwrap();
        assert_eq!(graph.run_has_work(nav), Some(true));
        assert_eq!(graph.run_resume(nav), Some(Ok(())));

        let calls = calls.lock().unwrap();
        assert!(!calls.iter().any(|c| matches!(c, BackendCall::Step { .. })));
        assert!(calls.contains(&BackendCall::Relax { forget_past: false }));
    }

    #[test]
    fn test_step_error_is_fatal() {
        let mut graph = TransactionGraph::new(Some(100));
        let planner = MockPlanner::new()
            .with_status(SolverStatus::Working)
            .with_step_error("solver crashed");
        let nav = attach(&mut graph, nav_reactor(planner));

        run_tick(&mut graph, &[nav]);
        assert_eq!(graph.run_has_work(nav), Some(true));
        assert_eq!(
            graph.run_resume(nav),
            Some(Err(DeliberationError::Failed("solver crashed".into())))
        );
    }

    // ── Archive tests ──────────────────────────────────────────

    #[test]
    fn test_snapshots_archived_at_fixed_points() {
        let mut graph = TransactionGraph::new(Some(100));
        let archiver = LabelArchiver::default();
        let labels = Arc::clone(&archiver.labels);
        let planner = MockPlanner::new().with_sync_failures(1).with_flaws(1);
        let nav = attach(
            &mut graph,
            nav_reactor(planner).with_archiver(archiver),
        );

        graph.advance_tick();
        graph.run_tick_start(nav).unwrap();
        assert_eq!(graph.run_synchronize(nav), Some(true));
        assert_eq!(run_deliberation(&mut graph, nav), 1);

        assert_eq!(
            *labels.lock().unwrap(),
            vec!["tick", "failed", "relax", "synch", "plan"]
        );
    }
}
