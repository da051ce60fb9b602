use portweave::{
    create_grid, run_optimizer, Connection, ConnectionId, MachineType, Orientation, OptimizerConfig,
};

fn main() {
    env_logger::init();

    let mut grid = create_grid(40, 40);
    let a = grid.place_machine(MachineType::Composer, 0, 0, Orientation::North).expect("place a");
    let b = grid.place_machine(MachineType::Composer, 20, 4, Orientation::North).expect("place b");
    let c = grid.place_machine(MachineType::Manifold, 10, 20, Orientation::East).expect("place c");

    grid.connections.insert(
        ConnectionId(0),
        Connection { id: ConnectionId(0), source_machine: a, source_port: 1, target_machine: c, target_port: 0 },
    );
    grid.connections.insert(
        ConnectionId(1),
        Connection { id: ConnectionId(1), source_machine: b, source_port: 1, target_machine: c, target_port: 1 },
    );

    let cfg = OptimizerConfig::default();
    let result = run_optimizer(&grid, &cfg);

    log::info!(
        "optimized layout: score={:.1} (belts={:.0}, area={:.0}, corners={:.0}), iterations={}",
        result.score.total,
        result.score.total_belts,
        result.score.area,
        result.score.corners,
        result.iterations,
    );
}
