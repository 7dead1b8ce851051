// Network sources: the GET abstraction and its reqwest backend.

pub mod http_source;
pub mod traits;
