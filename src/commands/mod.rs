// ABOUTME: Command implementations for the replication control surface
// ABOUTME: Exports seed-master, generate-master-data, seed-slave, and start-replication

pub mod generate;
pub mod replicate;
pub mod seed_master;
pub mod seed_slave;

pub use generate::generate;
pub use replicate::start_replication;
pub use seed_master::seed_master;
pub use seed_slave::seed_slave;
