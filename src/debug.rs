use crate::state::State;

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber. `RUST_LOG` overrides the default
/// level, which is `trace` when single stepping is on.
pub fn init_logging(trace: bool) {
    let level = if trace { "trace" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub(crate) fn trace_step(xs: &State, xt: usize) {
    let name = xs.dict.word(xt).map(|w| w.name.clone()).unwrap_or_default();
    tracing::trace!(ip = xs.ip, word = %name, depth = xs.data_depth(), "step");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_trace_mode() {
        let mut xs = State::boot_with(Config {
            trace: true,
            ..Config::default()
        })
        .unwrap();
        xs.eval(": sq dup * ; 5 sq").unwrap();
        assert_eq!(Ok(25), xs.pop_data());
    }
}
