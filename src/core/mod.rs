// Domain-layer modules and shared errors/models
pub mod validation {
    pub use crate::validation::*;
}

pub mod formatters {
    pub use crate::formatters::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod payload {
    pub use crate::payload::*;
}

pub mod errors {
    pub use crate::errors::*;
}
