//! World-level tests: tick phases, scenarios and invariants

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use grid_traffic::simulation::{
    AgentId, AgentPool, AgentStep, CellType, Coordinate, Grid, Occupant, OccupantKind, SimAgent,
    SimConfig, SimError, SimId, SimWorld, TransportId,
};

const FIVE_AGENTS: &str = include_str!("../maps/five_agents.txt");

fn c(x: i32, y: i32) -> Coordinate {
    Coordinate::new(x, y)
}

fn quiet_config() -> SimConfig {
    SimConfig {
        spawn_probability: 0.0,
        ..SimConfig::with_seed(42)
    }
}

fn world_from(rows: &[Vec<u8>], config: SimConfig) -> SimWorld {
    let grid = Grid::from_codes(rows).expect("valid grid");
    SimWorld::new(grid, config).expect("world should build")
}

/// Every live entity sits in exactly one cell and no cell holds two
fn assert_occupancy_consistent(world: &SimWorld) {
    let occupants = world.occupants();
    assert_eq!(
        occupants.len(),
        world.live_agent_count() + world.live_transport_count(),
        "occupied cells must match live entities at tick {}",
        world.tick_count()
    );

    let mut seen: HashMap<Occupant, Coordinate> = HashMap::new();
    for (coord, occupant) in &occupants {
        assert!(
            seen.insert(*occupant, *coord).is_none(),
            "{:?} appears in two cells",
            occupant
        );
    }

    for status in world.agent_statuses() {
        assert_eq!(seen.get(&Occupant::Agent(status.id)), Some(&status.position));
    }
    for (id, slot) in world.transports() {
        assert_eq!(seen.get(&Occupant::Transport(*id)), Some(&slot.position));
    }
}

#[test]
fn test_single_agent_corridor_finishes_in_two_ticks() {
    let mut world = world_from(&[vec![2, 0, 4]], quiet_config());
    let id = AgentId(SimId(0));

    assert_eq!(world.live_agent_count(), 1);
    assert_eq!(world.render_ascii(), "A.F\n");
    assert!(!world.is_finished());

    world.tick().unwrap();
    let status = world.agent_status(id).unwrap();
    assert_eq!(status.position, c(1, 0));
    assert_eq!(status.success_steps, 1);

    world.tick().unwrap();
    let status = world.agent_status(id).unwrap();
    assert_eq!(status.position, c(2, 0));
    assert_eq!(status.success_steps, 2);
    assert_eq!(status.attempts, 2);
    assert_eq!(
        world.cell_view(c(2, 0)).unwrap().occupant,
        Some(OccupantKind::Agent)
    );
    // Harvesting happens at the start of the next tick
    assert!(!world.is_finished());
    assert!(world.finished_agents().is_empty());

    world.tick().unwrap();
    assert!(world.is_finished());
    let finished = world.finished_agents();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].id, id);
    assert_eq!(finished[0].success_steps, 2);
    assert_eq!(finished[0].attempts, 2);
    assert_eq!(finished[0].finish, c(2, 0));
    assert_eq!(finished[0].finished_at_tick, 3);
    assert_eq!(world.cell_view(c(2, 0)).unwrap().occupant, None);
    assert_eq!(world.occupied_cells(), 0);
}

#[test]
fn test_enclosed_agent_is_stranded_not_spawned() {
    let mut world = world_from(
        &[vec![1, 1, 1, 0], vec![1, 2, 1, 4], vec![1, 1, 1, 0]],
        quiet_config(),
    );

    assert_eq!(world.stranded_agents(), &[c(1, 1)]);
    assert_eq!(world.live_agent_count(), 0);
    assert!(world.is_finished());
    assert_eq!(world.cell_view(c(1, 1)).unwrap().occupant, None);

    for _ in 0..5 {
        world.tick().unwrap();
    }
    assert_eq!(world.stats().agents_stranded, 1);
    assert_eq!(world.stats().agents_spawned, 0);
}

#[test]
fn test_stranded_agent_does_not_stop_others() {
    let mut world = world_from(
        &[
            vec![1, 1, 1, 1, 1],
            vec![1, 2, 1, 1, 1],
            vec![1, 1, 1, 1, 1],
            vec![2, 0, 0, 0, 4],
        ],
        quiet_config(),
    );

    assert_eq!(world.stranded_agents(), &[c(1, 1)]);
    assert_eq!(world.live_agent_count(), 1);

    while !world.is_finished() {
        world.tick().unwrap();
        assert!(world.tick_count() < 20);
    }
    assert_eq!(world.finished_agents().len(), 1);
    assert_eq!(world.finished_agents()[0].success_steps, 4);
}

#[test]
fn test_contended_cell_lets_exactly_one_agent_through() {
    // Both agents route through (1, 0) to reach the finish below it
    let mut world = world_from(&[vec![2, 0, 2], vec![1, 4, 1]], quiet_config());
    assert_eq!(world.live_agent_count(), 2);

    world.tick().unwrap();
    let statuses: Vec<_> = world.agent_statuses().cloned().collect();
    assert_eq!(statuses.len(), 2);
    for status in &statuses {
        assert_eq!(status.attempts, 1);
        assert_eq!(status.route_len, 3);
    }
    let advanced: Vec<_> = statuses.iter().filter(|s| s.success_steps == 1).collect();
    let held: Vec<_> = statuses.iter().filter(|s| s.success_steps == 0).collect();
    assert_eq!(advanced.len(), 1);
    assert_eq!(held.len(), 1);
    assert_eq!(advanced[0].position, c(1, 0));
    assert_eq!(held[0].position, held[0].spawn);
    assert_occupancy_consistent(&world);

    while !world.is_finished() {
        world.tick().unwrap();
        assert_occupancy_consistent(&world);
        assert!(world.tick_count() < 20);
    }
    assert_eq!(world.finished_agents().len(), 2);
    for finished in world.finished_agents() {
        assert_eq!(finished.finish, c(1, 1));
        assert_eq!(finished.success_steps, 2);
        assert!(finished.attempts >= 2);
    }
}

#[test]
fn test_agent_despawn_order_follows_finish_registry() {
    let mut world = world_from(&[vec![2, 4], vec![2, 4]], quiet_config());
    world.tick().unwrap();
    world.tick().unwrap();

    let finished = world.finished_agents();
    assert_eq!(finished.len(), 2);
    assert_eq!(finished[0].finish, c(1, 0));
    assert_eq!(finished[1].finish, c(1, 1));
    for record in finished {
        assert_eq!(record.blocked_attempts(), 0);
        assert!(record.to_string().contains("attempts=1 (0 blocked)"));
    }
}

#[test]
fn test_blocked_attempts_are_recorded() {
    // The second agent waits one tick behind the first on the shared cell
    let mut world = world_from(&[vec![2, 0, 2], vec![1, 4, 1]], quiet_config());
    while !world.is_finished() {
        world.tick().unwrap();
        assert!(world.tick_count() < 20);
    }

    let total_blocked: usize = world
        .finished_agents()
        .iter()
        .map(|record| record.blocked_attempts())
        .sum();
    assert!(total_blocked >= 1);
}

#[test]
fn test_invariants_hold_on_bundled_map() {
    let grid = Grid::from_map_str(FIVE_AGENTS).unwrap();
    let config = SimConfig {
        spawn_probability: 0.3,
        ..SimConfig::with_seed(7)
    };
    let mut world = SimWorld::new(grid, config).unwrap();
    assert_eq!(world.live_agent_count(), 5);
    assert_occupancy_consistent(&world);

    let mut progress: HashMap<AgentId, usize> = HashMap::new();
    for _ in 0..400 {
        if world.is_finished() {
            break;
        }
        world.tick().unwrap();
        assert_occupancy_consistent(&world);

        for status in world.agent_statuses() {
            let previous = progress.insert(status.id, status.success_steps).unwrap_or(0);
            assert!(status.success_steps >= previous, "progress went backwards");
            assert!(status.success_steps <= status.route_len - 1);
            assert!(status.success_steps <= status.attempts);
        }
    }

    let stats = world.stats();
    assert_eq!(stats.agents_spawned, 5);
    assert_eq!(
        stats.agents_finished + stats.live_agents,
        stats.agents_spawned
    );
    assert_eq!(
        stats.transports_spawned,
        stats.transports_expired + stats.live_transports
    );
    for finished in world.finished_agents() {
        assert_eq!(finished.success_steps, finished.route_len - 1);
        assert_eq!(finished.success_steps, 14);
    }
}

#[test]
fn test_transport_despawns_exactly_at_lifespan() {
    let config = SimConfig {
        spawn_probability: 1.0,
        lifespan_range: 3..=3,
        ..SimConfig::with_seed(1)
    };
    let mut world = world_from(&[vec![3, 0, 0, 0]], config);

    let first = TransportId(SimId(0));
    assert_eq!(world.transport(first).unwrap().position, c(0, 0));

    for tick in 1..=3 {
        world.tick().unwrap();
        let slot = world.transport(first).expect("still alive before budget is used");
        assert_eq!(slot.transport.steps_taken, tick);
    }
    assert!(world.transport(first).unwrap().transport.is_expired());

    world.tick().unwrap();
    assert!(world.transport(first).is_none());
    assert_occupancy_consistent(&world);
}

#[test]
fn test_transport_lifespans_respected_over_long_run() {
    let grid = Grid::from_map_str(FIVE_AGENTS).unwrap();
    let config = SimConfig {
        spawn_probability: 0.5,
        ..SimConfig::with_seed(99)
    };
    let mut world = SimWorld::new(grid, config).unwrap();

    // id -> (lifespan, steps taken at last observation)
    let mut observed: HashMap<TransportId, (u32, u32)> = HashMap::new();
    for _ in 0..300 {
        world.tick().unwrap();

        let alive: HashMap<TransportId, (u32, u32)> = world
            .transports()
            .map(|(id, slot)| (*id, (slot.transport.lifespan, slot.transport.steps_taken)))
            .collect();

        for (id, (lifespan, steps)) in &observed {
            if !alive.contains_key(id) {
                assert_eq!(steps, lifespan, "{} removed early or late", id);
            }
        }
        for (lifespan, steps) in alive.values() {
            assert!(steps <= lifespan);
            assert!((15..=149).contains(lifespan));
        }
        observed = alive;
    }
    assert!(world.stats().transports_expired > 0);
}

#[test]
fn test_seeded_transport_traffic_is_reproducible() {
    let rows = vec![
        vec![1, 1, 1, 1, 1, 1],
        vec![3, 0, 0, 0, 0, 3],
        vec![1, 0, 1, 1, 0, 1],
        vec![3, 0, 0, 0, 0, 3],
    ];
    let config = SimConfig {
        spawn_probability: 0.2,
        ..SimConfig::with_seed(1234)
    };
    let mut a = world_from(&rows, config.clone());
    let mut b = world_from(&rows, config);
    assert_eq!(a.config().seed, Some(1234));

    for _ in 0..100 {
        a.tick().unwrap();
        b.tick().unwrap();
        assert_eq!(a.render_ascii(), b.render_ascii());
    }
    assert_eq!(a.stats(), b.stats());
}

#[test]
fn test_spawn_skips_occupied_transport_spawn() {
    let config = SimConfig {
        spawn_probability: 1.0,
        move_probability: 0.0,
        ..SimConfig::with_seed(3)
    };
    let mut world = world_from(&[vec![3, 0]], config);
    assert_eq!(world.live_transport_count(), 1);

    for _ in 0..5 {
        world.tick().unwrap();
        assert_eq!(world.live_transport_count(), 1);
    }
    assert_eq!(world.stats().transports_spawned, 1);
}

#[test]
fn test_transport_spawn_without_exits_never_spawns() {
    let config = SimConfig {
        spawn_probability: 1.0,
        ..SimConfig::with_seed(3)
    };
    let mut world = world_from(&[vec![1, 1, 1], vec![1, 3, 1], vec![1, 1, 1]], config);
    world.tick().unwrap();
    assert_eq!(world.live_transport_count(), 0);
}

#[test]
fn test_cell_view_reports_types_and_occupants() {
    let world = world_from(&[vec![2, 0, 4, 1]], quiet_config());

    let spawn = world.cell_view(c(0, 0)).unwrap();
    assert_eq!(spawn.cell_type, CellType::AgentSpawn);
    assert_eq!(spawn.occupant, Some(OccupantKind::Agent));

    let finish = world.cell_view(c(2, 0)).unwrap();
    assert_eq!(finish.cell_type, CellType::Finish);
    assert_eq!(finish.occupant, None);

    let wall = world.cell_view(c(3, 0)).unwrap();
    assert_eq!(wall.cell_type, CellType::Wall);
    assert_eq!(wall.occupant, None);

    assert!(world.cell_view(c(4, 0)).is_none());
    assert_eq!(world.width(), 4);
    assert_eq!(world.height(), 1);
}

#[test]
fn test_new_with_seed_uses_default_tuning() {
    let grid = Grid::from_codes(&[vec![2, 0, 4]]).unwrap();
    let world = SimWorld::new_with_seed(grid, 5).unwrap();

    let config = world.config();
    assert_eq!(config.seed, Some(5));
    assert_eq!(config.spawn_probability, 0.04);
    assert_eq!(config.move_probability, 0.7);
    assert_eq!(config.max_wait, 5);
    assert_eq!(config.lifespan_range, 15..=149);
    assert_eq!(world.live_agent_count(), 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let grid = Grid::from_codes(&[vec![2, 4]]).unwrap();
    let config = SimConfig {
        move_probability: 1.5,
        ..SimConfig::default()
    };
    assert!(matches!(
        SimWorld::new(grid, config),
        Err(SimError::InvalidConfig(_))
    ));

    let grid = Grid::from_codes(&[vec![2, 4]]).unwrap();
    let config = SimConfig {
        barrier_timeout: Duration::ZERO,
        ..SimConfig::default()
    };
    assert!(matches!(
        SimWorld::new(grid, config),
        Err(SimError::InvalidConfig(_))
    ));
}

#[test]
fn test_pool_barrier_collects_every_report() {
    let mut grid = Grid::from_codes(&[vec![2, 0, 4], vec![2, 0, 4]]).unwrap();
    let first = AgentId(SimId(0));
    let second = AgentId(SimId(1));
    grid.place(c(0, 0), Occupant::Agent(first)).unwrap();
    grid.place(c(0, 1), Occupant::Agent(second)).unwrap();
    let grid = Arc::new(Mutex::new(grid));

    let mut pool = AgentPool::new(Arc::clone(&grid));
    pool.spawn(SimAgent::new(first, c(0, 0), vec![c(0, 0), c(1, 0), c(2, 0)]))
        .unwrap();
    pool.spawn(SimAgent::new(second, c(0, 1), vec![c(0, 1), c(1, 1), c(2, 1)]))
        .unwrap();

    let mut outcomes = pool.step_all(Duration::from_secs(5)).unwrap();
    outcomes.sort_by_key(|(id, _)| *id);
    assert_eq!(
        outcomes,
        vec![
            (first, AgentStep::Moved(c(1, 0))),
            (second, AgentStep::Moved(c(1, 1)))
        ]
    );
    assert_eq!(pool.status(first).unwrap().position, c(1, 0));

    let agent = pool.despawn(first).unwrap();
    assert_eq!(agent.success_steps(), 1);
    assert_eq!(agent.attempts(), 1);
    assert!(!pool.contains(first));
    assert_eq!(pool.len(), 1);

    let outcomes = pool.step_all(Duration::from_secs(5)).unwrap();
    assert_eq!(outcomes, vec![(second, AgentStep::Moved(c(2, 1)))]);

    pool.shutdown();
    assert!(pool.is_empty());
}

#[test]
fn test_pool_surfaces_worker_step_errors() {
    // The agent was never placed, so its move finds an empty source cell
    let grid = Arc::new(Mutex::new(Grid::from_codes(&[vec![2, 0, 4]]).unwrap()));
    let mut pool = AgentPool::new(grid);
    let id = AgentId(SimId(0));
    pool.spawn(SimAgent::new(id, c(0, 0), vec![c(0, 0), c(1, 0), c(2, 0)]))
        .unwrap();

    let err = pool.step_all(Duration::from_secs(5)).unwrap_err();
    assert!(matches!(err, SimError::CellEmpty(coord) if coord == c(0, 0)));

    assert!(pool.is_failed());
    assert!(matches!(
        pool.step_all(Duration::from_secs(5)),
        Err(SimError::Halted)
    ));
}

#[test]
fn test_pool_barrier_times_out_and_stays_failed() {
    let mut grid = Grid::from_codes(&[vec![2, 0, 0, 4]]).unwrap();
    let id = AgentId(SimId(0));
    grid.place(c(0, 0), Occupant::Agent(id)).unwrap();
    let grid = Arc::new(Mutex::new(grid));

    let mut pool = AgentPool::new(Arc::clone(&grid));
    pool.spawn(SimAgent::new(id, c(0, 0), vec![c(0, 0), c(1, 0), c(2, 0), c(3, 0)]))
        .unwrap();

    // The worker cannot take its step while the grid is held
    let guard = grid.lock().unwrap();
    let err = pool.step_all(Duration::from_millis(50)).unwrap_err();
    assert!(matches!(
        err,
        SimError::BarrierTimeout { waiting: 1, .. }
    ));
    drop(guard);

    // The late step still lands on the grid, but its report must not be
    // taken as the result of a later barrier
    let err = pool.step_all(Duration::from_secs(5)).unwrap_err();
    assert!(matches!(err, SimError::Halted));
    assert!(pool.is_failed());
    assert_eq!(pool.status(id).unwrap().success_steps, 0);

    let agent = pool.despawn(id).unwrap();
    assert_eq!(agent.success_steps(), 1);
    assert_eq!(agent.attempts(), 1);
    assert_eq!(grid.lock().unwrap().occupant(c(1, 0)), Some(Occupant::Agent(id)));
}

#[test]
fn test_poisoned_grid_fails_the_barrier() {
    let mut grid = Grid::from_codes(&[vec![2, 0, 4]]).unwrap();
    let id = AgentId(SimId(0));
    grid.place(c(0, 0), Occupant::Agent(id)).unwrap();
    let grid = Arc::new(Mutex::new(grid));

    let mut pool = AgentPool::new(Arc::clone(&grid));
    pool.spawn(SimAgent::new(id, c(0, 0), vec![c(0, 0), c(1, 0), c(2, 0)]))
        .unwrap();

    let poisoner = Arc::clone(&grid);
    let _ = std::thread::spawn(move || {
        let _guard = poisoner.lock().unwrap();
        panic!("poison the grid lock");
    })
    .join();
    assert!(grid.is_poisoned());

    let err = pool.step_all(Duration::from_secs(5)).unwrap_err();
    assert!(matches!(err, SimError::GridPoisoned));
}

#[test]
fn test_failed_tick_halts_the_world() {
    let mut world = world_from(&[vec![2, 0, 0, 4]], quiet_config());
    assert!(!world.is_halted());

    // Take the agent off the grid behind the world's back so its next move
    // finds an empty source cell
    world.shared_grid().lock().unwrap().clear(c(0, 0));

    let err = world.tick().unwrap_err();
    assert!(matches!(err, SimError::CellEmpty(coord) if coord == c(0, 0)));
    assert!(world.is_halted());
    assert_eq!(world.tick_count(), 1);

    assert!(matches!(world.tick(), Err(SimError::Halted)));
    assert!(matches!(world.tick(), Err(SimError::Halted)));
    assert_eq!(world.tick_count(), 1);
}

#[test]
fn test_failed_harvest_leaves_later_agents_in_place() {
    // (0, 0) is a walled-off finish that comes first in the finish registry
    let mut world = world_from(
        &[vec![4, 1, 1], vec![1, 1, 1], vec![2, 4, 1]],
        quiet_config(),
    );
    let real = AgentId(SimId(0));
    world.tick().unwrap();
    assert_eq!(world.agent_status(real).unwrap().position, c(1, 2));

    let ghost = AgentId(SimId(99));
    world
        .shared_grid()
        .lock()
        .unwrap()
        .place(c(0, 0), Occupant::Agent(ghost))
        .unwrap();

    let err = world.tick().unwrap_err();
    assert!(matches!(err, SimError::WorkerDisconnected(id) if id == ghost));
    assert!(world.is_halted());

    // The real agent was never harvested: still on its finish and still live
    assert_eq!(
        world.cell_view(c(1, 2)).unwrap().occupant,
        Some(OccupantKind::Agent)
    );
    assert_eq!(world.live_agent_count(), 1);
    assert!(world.agent_status(real).is_some());
    assert!(world.finished_agents().is_empty());
}

#[test]
fn test_despawning_unknown_agent_fails() {
    let grid = Arc::new(Mutex::new(Grid::from_codes(&[vec![0]]).unwrap()));
    let mut pool = AgentPool::new(grid);
    assert!(matches!(
        pool.despawn(AgentId(SimId(9))),
        Err(SimError::WorkerDisconnected(_))
    ));
}

#[test]
fn test_shutdown_stops_all_workers() {
    let mut world = world_from(&[vec![2, 0, 0, 4], vec![2, 0, 0, 4]], quiet_config());
    assert_eq!(world.live_agent_count(), 2);
    world.shutdown();
    assert_eq!(world.live_agent_count(), 0);
    assert!(world.is_finished());
}

/// Test that the binary runs the bundled map to completion
#[test]
fn test_headless_binary_runs() {
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_grid_traffic"))
        .args(["--seed", "7", "--delay-ms", "0", "--max-ticks", "2000"])
        .env("RUST_LOG", "warn,grid_traffic=info")
        .output()
        .expect("Failed to execute simulation");

    assert!(
        output.status.success(),
        "Simulation failed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=== Final State ==="));
    assert!(stdout.contains("--- Finished Agents ---"));
}
