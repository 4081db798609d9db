//! Page retrieval through an anti-bot proxy.

mod flaresolverr;

pub use flaresolverr::{FlareSolverr, PageRetriever, RetrieveOptions, RetrievedPage};
