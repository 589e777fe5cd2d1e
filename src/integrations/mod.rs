//! External service integrations.

pub mod backend {
    pub use crate::backend::*;
}

pub mod viacep {
    pub use crate::viacep::*;
}
