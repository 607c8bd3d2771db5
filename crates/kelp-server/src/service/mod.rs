//! Business services exposed over gRPC

pub mod master;

pub use master::MasterService;
