pub mod discrete_accesses;
