mod provision_run;

pub use provision_run::*;
