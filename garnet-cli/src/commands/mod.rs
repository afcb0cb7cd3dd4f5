pub mod collectors;
pub mod run;
pub mod send;
