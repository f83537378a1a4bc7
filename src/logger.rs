use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

/// Installs the global logger. `RUST_LOG` overrides the default `info` level.
pub fn start_log() {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(buf, "{}: {}: {}", buf.timestamp(), record.level(), record.args())
        })
        .filter_level(LevelFilter::Info)
        .parse_default_env();

    // a second call (tests, embedding) keeps the first logger
    let _ = builder.try_init();
}
