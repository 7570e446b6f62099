#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    // tracing events fall through to `log` when no subscriber is installed;
    // RUST_LOG=jsonapi=debug shows them while testing
    let _ = env_logger::builder().is_test(true).try_init();
}
