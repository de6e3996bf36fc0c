pub fn engine_name() -> &'static str {
    "tplus"
}

pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
