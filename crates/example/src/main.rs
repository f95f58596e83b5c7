//! Declares a handful of configuration globals and hammers them from a
//! thread pool.
use rayon::prelude::*;
use safe_global::safe_global;

mod conf {
    use super::safe_global;

    #[safe_global]
    pub static LIMIT: u32 = 42;

    #[safe_global]
    pub static mut HITS: u64 = 0;

    #[safe_global]
    pub static mut LAST_WORKER: Option<usize>;

    #[safe_global]
    pub static mut GREETING: Option<&'static str> = None;
}

pub fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    log::info!("limit is {}", conf::LIMIT.get());
    log::info!("last worker before start: {:?}", conf::LAST_WORKER.get());
    conf::GREETING.set(Some("hello"));

    (0..conf::LIMIT.get() as usize).into_par_iter().for_each(|worker| {
        conf::HITS.set(conf::HITS.get() + 1);
        conf::LAST_WORKER.set(Some(worker));
        log::debug!("worker {worker} sees greeting {:?}", conf::GREETING.get());
    });

    // Each `get`/`set` is atomic on its own, the read-modify-write above is not.
    log::info!(
        "{} hits recorded, last worker was {:?}",
        conf::HITS.get(),
        conf::LAST_WORKER.get()
    );
}
