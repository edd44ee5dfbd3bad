//! BSD/macOS kqueue 后端的 TCK 驱动入口。
#![cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]

use std::sync::Arc;
use webcraft_core::runtime::RuntimeProvider;
use webcraft_rt_kqueue::KqueueProvider;

#[test]
fn kqueue_backend_passes_the_shared_contract_suite() {
    let provider: Arc<dyn RuntimeProvider> =
        KqueueProvider::new().expect("kqueue must be available on the BSD/macOS CI runner");
    webcraft_rt_tck::run_full_suite(provider);
}
