mod provision_run_repository;

pub use provision_run_repository::*;
