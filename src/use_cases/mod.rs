//! Use cases (orchestration)
//!
//! Each use case sequences facade operations and certificate model edits,
//! stopping at the first failure. Hardware state changed before the failure
//! (a freshly minted key) stays changed.

mod cert_builder;
mod cert_store;
mod csr_builder;

pub use cert_builder::build_cert;
pub use cert_store::{read_cert, write_cert};
pub use csr_builder::build_csr;
