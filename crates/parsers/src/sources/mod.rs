// ABOUTME: Hand-written adapters for sites that do not run a shared template.
// ABOUTME: Each adapter exposes NAME, descriptor(), default_config() and new(config).

pub mod mangago;
pub mod mangahere;
pub mod manhwa18;
pub mod readcomiconline;
pub mod sadscans;
pub mod scantrad_union;

pub use mangago::Mangago;
pub use mangahere::Mangahere;
pub use manhwa18::Manhwa18;
pub use readcomiconline::ReadComicOnline;
pub use sadscans::SadScans;
pub use scantrad_union::ScantradUnion;
