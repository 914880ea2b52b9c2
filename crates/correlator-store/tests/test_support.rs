use correlator_store::config::DbConfig;
use correlator_store::pg::{build_pool, PgPool};
use once_cell::sync::Lazy;

pub static TEST_POOL: Lazy<Option<PgPool>> = Lazy::new(|| {
    if std::env::var("DATABASE_URL").is_err() {
        return None;
    }
    let cfg = match DbConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("could not load DbConfig for tests: {e}");
            return None;
        }
    };
    match build_pool(&cfg.url, 1, 1) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("could not build test pool: {e}");
            None
        }
    }
});

pub fn with_pool<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&PgPool) -> R,
{
    TEST_POOL.as_ref().map(|p| f(p))
}
