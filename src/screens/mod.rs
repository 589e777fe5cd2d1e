// Thin namespace wrapper for screen controllers
pub mod registration {
    pub use crate::registration::*;
}

pub mod approval {
    pub use crate::approval::*;
}

pub mod profile {
    pub use crate::profile::*;
}

pub mod payment {
    pub use crate::payment::*;
}

pub mod navigation {
    pub use crate::navigation::*;
}
