pub mod healpix;
pub mod linalg;

pub use healpix::{is_valid_nside, nest_to_ring, npix_to_nside, nside_to_npix};
pub use linalg::{SolveError, solve_information_system};
