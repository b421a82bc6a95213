//! Domain model for condominium billing: obligations, payments, the links
//! that settle them, and the ports the engine talks to.

pub mod link;
pub mod money;
pub mod obligation;
pub mod payment;
pub mod ports;
pub mod status;
