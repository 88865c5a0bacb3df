mod session;
mod variation;

pub use session::*;
pub use variation::*;
